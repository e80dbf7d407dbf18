//! Time series windows read from source tables

use crate::error::{EvalError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::{DataFrame, DataType, NamedFrom, Series, TimeUnit};
use serde::{Deserialize, Serialize};

/// Name of the time column in frames built by this crate
pub const TIME_COLUMN: &str = "time";

/// A single timestamped observation or prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    /// Timestamp, naive UTC
    pub time: NaiveDateTime,
    /// Observed or predicted value
    pub value: f64,
}

impl TimePoint {
    pub fn new(time: NaiveDateTime, value: f64) -> Self {
        Self { time, value }
    }
}

/// Ordered window of (timestamp, value) pairs, ascending by time.
///
/// Duplicate timestamps are kept as delivered by the source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesWindow {
    points: Vec<TimePoint>,
}

impl TimeSeriesWindow {
    /// Create a window, sorting the points by timestamp.
    ///
    /// The sort is stable so rows sharing a timestamp keep their source order.
    pub fn new(mut points: Vec<TimePoint>) -> Self {
        points.sort_by_key(|p| p.time);
        Self { points }
    }

    /// Create a window from (timestamp, value) pairs
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDateTime, f64)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(time, value)| TimePoint::new(time, value))
                .collect(),
        )
    }

    /// An empty window
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<TimePoint> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&TimePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&TimePoint> {
        self.points.last()
    }

    /// Earliest timestamp in the window
    pub fn first_time(&self) -> Option<NaiveDateTime> {
        self.first().map(|p| p.time)
    }

    /// Latest timestamp in the window
    pub fn last_time(&self) -> Option<NaiveDateTime> {
        self.last().map(|p| p.time)
    }

    /// Timestamps as a vector
    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.points.iter().map(|p| p.time).collect()
    }

    /// Values as a vector
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Split into the points at or before `boundary` and the points after it
    pub fn split_at_time(&self, boundary: NaiveDateTime) -> (Self, Self) {
        let idx = self.points.partition_point(|p| p.time <= boundary);
        (
            Self {
                points: self.points[..idx].to_vec(),
            },
            Self {
                points: self.points[idx..].to_vec(),
            },
        )
    }

    /// Convert to a two-column DataFrame (`time`, `value_column`)
    pub fn to_dataframe(&self, value_column: &str) -> Result<DataFrame> {
        let time = Series::new(
            TIME_COLUMN,
            self.points
                .iter()
                .map(|p| p.time.and_utc().timestamp_millis())
                .collect::<Vec<i64>>(),
        )
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        let values = Series::new(value_column, self.values());

        Ok(DataFrame::new(vec![time, values])?)
    }
}

/// Parse a caller-supplied timestamp.
///
/// Accepts RFC 3339 (offset is converted to UTC and dropped), ISO 8601
/// date-times with `T` or a space separator, and plain dates (midnight).
pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }

    Err(EvalError::InvalidDateFormat(input.to_string()))
}
