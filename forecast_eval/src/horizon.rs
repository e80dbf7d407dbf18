//! Sizing forecast horizons

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest horizon handed to forecasting methods
pub const MIN_HORIZON_POINTS: u64 = 5;

/// Horizons above this many points are clamped
pub const MAX_HORIZON_POINTS: u64 = 5000;

/// Share of the available history a clamped horizon may span
pub const HISTORY_SHARE: f64 = 0.2;

/// Unit a human-specified horizon is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
    /// Fixed 30-day month
    Month,
}

impl TimeUnit {
    /// Length of one unit in seconds
    pub fn seconds(self) -> u64 {
        match self {
            TimeUnit::Minute => 60,
            TimeUnit::Hour => 3_600,
            TimeUnit::Day => 86_400,
            TimeUnit::Month => 2_592_000,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "minute" => Ok(TimeUnit::Minute),
            "hour" => Ok(TimeUnit::Hour),
            "day" => Ok(TimeUnit::Day),
            "month" => Ok(TimeUnit::Month),
            other => Err(EvalError::InvalidHorizonUnit(other.to_string())),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Minute => "minute",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
            TimeUnit::Month => "month",
        };
        f.write_str(name)
    }
}

/// How a horizon point count was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HorizonPlan {
    pub total_seconds: u64,
    pub raw_points: u64,
    pub points: u64,
}

/// Convert `count` units into a bounded number of forecast points.
///
/// The raw count is `count * unit / discreteness`, floored. Fewer than
/// [`MIN_HORIZON_POINTS`] is raised to that minimum. More than
/// [`MAX_HORIZON_POINTS`] is clamped to the smaller of that maximum and 20% of
/// `available_rows`, and the minimum still applies after the clamp. Both
/// `count` and `discreteness` must be positive.
pub fn plan_horizon(
    count: u64,
    unit: TimeUnit,
    discreteness: u64,
    available_rows: u64,
) -> Result<HorizonPlan> {
    if count == 0 {
        return Err(EvalError::InvalidParameter(
            "horizon count must be positive".to_string(),
        ));
    }
    if discreteness == 0 {
        return Err(EvalError::InvalidParameter(
            "discreteness must be positive".to_string(),
        ));
    }

    let total_seconds = count.saturating_mul(unit.seconds());
    let raw_points = total_seconds / discreteness;

    let points = if raw_points > MAX_HORIZON_POINTS {
        let share = (HISTORY_SHARE * available_rows as f64).floor() as u64;
        MAX_HORIZON_POINTS.min(share)
    } else {
        raw_points
    }
    .max(MIN_HORIZON_POINTS);

    Ok(HorizonPlan {
        total_seconds,
        raw_points,
        points,
    })
}

/// Parse the unit and return only the point count
pub fn horizon_points(
    count: u64,
    time_interval: &str,
    discreteness: u64,
    available_rows: u64,
) -> Result<u64> {
    let unit: TimeUnit = time_interval.parse()?;
    Ok(plan_horizon(count, unit, discreteness, available_rows)?.points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_names_round_trip() {
        for unit in [TimeUnit::Minute, TimeUnit::Hour, TimeUnit::Day, TimeUnit::Month] {
            assert_eq!(unit.to_string().parse::<TimeUnit>().unwrap(), unit);
        }
    }

    #[test]
    fn unknown_unit_is_rejected() {
        assert!(matches!(
            "week".parse::<TimeUnit>(),
            Err(EvalError::InvalidHorizonUnit(u)) if u == "week"
        ));
        assert!("Hour".parse::<TimeUnit>().is_err());
    }

    #[test]
    fn zero_discreteness_is_rejected() {
        assert!(plan_horizon(1, TimeUnit::Hour, 0, 100).is_err());
    }
}
