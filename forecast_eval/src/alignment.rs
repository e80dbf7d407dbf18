//! Temporal alignment of real and predicted series
//!
//! Predicted series rarely share timestamps with the observations they are
//! scored against, so rows are paired by nearest timestamp. For scoring over a
//! date range every method is joined onto a running frame in configuration
//! order, and only rows where every column found a partner within the
//! tolerance survive.

use crate::data::{TimeSeriesWindow, TIME_COLUMN};
use crate::error::{EvalError, Result};
use chrono::{DateTime, Duration, NaiveDateTime};
use polars::prelude::{DataFrame, DataType, NamedFrom, Series, TimeUnit};

/// Nearest-match tolerance used when scoring methods over a date range
pub const ALIGN_TOLERANCE_SECS: i64 = 300;

/// Column holding the observed values in an [`AlignedFrame`]
pub const REAL_COLUMN: &str = "real";

/// A predicted series split at the last known real timestamp
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Segments {
    /// Points at or before the last known real timestamp, used for scoring
    pub evaluation: TimeSeriesWindow,
    /// Points after it, the forward-looking forecast
    pub display: TimeSeriesWindow,
}

/// Latest timestamp of the anchor series
pub fn last_known_time(anchor: &TimeSeriesWindow) -> Option<NaiveDateTime> {
    anchor.last_time()
}

/// Split `candidate` into evaluation and display segments around `last_known`
pub fn split_segments(candidate: &TimeSeriesWindow, last_known: NaiveDateTime) -> Segments {
    let (evaluation, display) = candidate.split_at_time(last_known);
    Segments {
        evaluation,
        display,
    }
}

/// Index of the entry in `sorted` nearest to `target`, with its distance.
///
/// On equal distance the earlier entry wins; among equal timestamps the
/// lowest index wins.
fn nearest_index(sorted: &[NaiveDateTime], target: NaiveDateTime) -> Option<(usize, Duration)> {
    let after = sorted.partition_point(|t| *t < target);
    let after = sorted.get(after).map(|t| (after, *t - target));
    let before = match after {
        Some((0, _)) => None,
        Some((idx, _)) => Some(idx - 1),
        None => sorted.len().checked_sub(1),
    }
    .map(|idx| {
        let first = sorted.partition_point(|t| *t < sorted[idx]);
        (first, target - sorted[first])
    });

    match (before, after) {
        (Some(b), Some(a)) => Some(if b.1 <= a.1 { b } else { a }),
        (b, a) => b.or(a),
    }
}

/// For each `left` timestamp, the index of the nearest `right` timestamp.
///
/// Both slices must be sorted ascending. With a tolerance, partners further
/// away than the tolerance are reported as `None`.
pub fn nearest_indices(
    left: &[NaiveDateTime],
    right: &[NaiveDateTime],
    tolerance: Option<Duration>,
) -> Vec<Option<usize>> {
    left.iter()
        .map(|&t| {
            nearest_index(right, t).and_then(|(idx, distance)| match tolerance {
                Some(limit) if distance > limit => None,
                _ => Some(idx),
            })
        })
        .collect()
}

/// Observed and predicted values paired row by row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PairedSeries {
    /// Timestamps of the predicted points
    pub times: Vec<NaiveDateTime>,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
}

impl PairedSeries {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Pair every predicted point with its nearest observation, without tolerance
pub fn pair_nearest(predicted: &TimeSeriesWindow, real: &TimeSeriesWindow) -> PairedSeries {
    let real_times = real.timestamps();
    let matches = nearest_indices(&predicted.timestamps(), &real_times, None);

    let mut paired = PairedSeries::default();
    for (point, idx) in predicted.points().iter().zip(matches) {
        if let Some(idx) = idx {
            paired.times.push(point.time);
            paired.actual.push(real.points()[idx].value);
            paired.predicted.push(point.value);
        }
    }
    paired
}

/// Real values joined with zero or more method columns on a common time index
#[derive(Debug, Clone)]
pub struct AlignedFrame {
    df: DataFrame,
    methods: Vec<String>,
}

impl AlignedFrame {
    /// The underlying frame: `time`, `real`, then one column per method
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Methods present as columns, in join order
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn real_values(&self) -> Result<Vec<f64>> {
        self.column_as_f64(REAL_COLUMN)
    }

    pub fn method_values(&self, method: &str) -> Result<Vec<f64>> {
        self.column_as_f64(method)
    }

    pub fn timestamps(&self) -> Result<Vec<NaiveDateTime>> {
        let col = self.df.column(TIME_COLUMN)?.cast(&DataType::Int64)?;
        col.i64()?
            .into_iter()
            .flatten()
            .map(|ms| {
                DateTime::from_timestamp_millis(ms)
                    .map(|dt| dt.naive_utc())
                    .ok_or_else(|| {
                        EvalError::InternalComputation(format!("timestamp {} out of range", ms))
                    })
            })
            .collect()
    }

    fn column_as_f64(&self, name: &str) -> Result<Vec<f64>> {
        let col = self.df.column(name).map_err(|e| {
            EvalError::InternalComputation(format!("Column '{}' not found: {}", name, e))
        })?;
        Ok(col.f64()?.into_iter().flatten().collect())
    }
}

/// Join each method onto the real series by nearest timestamp.
///
/// Methods are joined in the given order. At each step the method's points
/// form the new time index and pick up the running frame's row nearest to
/// them within `tolerance`. Methods with empty windows are skipped. Rows
/// where any column is missing are dropped once all joins are done.
///
/// Method names must be unique and must not collide with the `time` or
/// `real` columns.
pub fn align_methods(
    real: &TimeSeriesWindow,
    methods: &[(String, TimeSeriesWindow)],
    tolerance: Duration,
) -> Result<AlignedFrame> {
    for (idx, (method, _)) in methods.iter().enumerate() {
        if method == TIME_COLUMN || method == REAL_COLUMN {
            return Err(EvalError::InvalidParameter(format!(
                "method name '{}' is reserved",
                method
            )));
        }
        if methods[..idx].iter().any(|(seen, _)| seen == method) {
            return Err(EvalError::InvalidParameter(format!(
                "method '{}' is configured twice",
                method
            )));
        }
    }

    let mut times = real.timestamps();
    let mut columns: Vec<(String, Vec<Option<f64>>)> = vec![(
        REAL_COLUMN.to_string(),
        real.values().into_iter().map(Some).collect(),
    )];
    let mut joined = Vec::new();

    for (method, window) in methods {
        if window.is_empty() {
            continue;
        }
        let method_times = window.timestamps();
        let matches = nearest_indices(&method_times, &times, Some(tolerance));

        for (_, values) in columns.iter_mut() {
            *values = matches
                .iter()
                .map(|m| m.and_then(|idx| values[idx]))
                .collect();
        }
        columns.push((method.clone(), window.values().into_iter().map(Some).collect()));
        times = method_times;
        joined.push(method.clone());
    }

    let time = Series::new(
        TIME_COLUMN,
        times
            .iter()
            .map(|t| t.and_utc().timestamp_millis())
            .collect::<Vec<i64>>(),
    )
    .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

    let mut series = vec![time];
    series.extend(
        columns
            .into_iter()
            .map(|(name, values)| Series::new(&name, values)),
    );

    let df = DataFrame::new(series)?.drop_nulls::<String>(None)?;
    Ok(AlignedFrame {
        df,
        methods: joined,
    })
}
