//! Accuracy metrics for aligned forecasts

use crate::alignment::{AlignedFrame, PairedSeries};
use crate::error::Result;
use accuracy_math::{
    mean_absolute_error, mean_absolute_percentage_error, mean_absolute_range_normalized_error,
    mean_absolute_scaled_error, normalized_root_mean_squared_error, r2_score, round_to,
    root_mean_squared_error, sanitize, symmetric_mean_absolute_percentage_error,
    validate_pair, weighted_mean_absolute_percentage_error,
};
use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Decimal places kept in reported metrics
pub const METRIC_DECIMALS: u32 = 2;

/// Round to [`METRIC_DECIMALS`], then replace anything non-finite with 0
fn report_value(value: f64) -> f64 {
    sanitize(round_to(value, METRIC_DECIMALS))
}

/// Headline accuracy metrics for one method
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSet {
    #[serde(rename = "MAE")]
    pub mae: f64,
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    #[serde(rename = "R2")]
    pub r2: f64,
    #[serde(rename = "MAPE")]
    pub mape: f64,
}

impl MetricSet {
    /// Score `predicted` against `actual`. Every field is finite.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        validate_pair(actual, predicted)?;
        Ok(Self {
            mae: report_value(mean_absolute_error(actual, predicted)),
            rmse: report_value(root_mean_squared_error(actual, predicted)),
            r2: report_value(r2_score(actual, predicted)),
            mape: report_value(mean_absolute_percentage_error(actual, predicted)),
        })
    }
}

/// Headline metrics plus scale-free and naive-relative errors
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExtendedMetricSet {
    #[serde(flatten)]
    pub base: MetricSet,
    #[serde(rename = "SMAPE")]
    pub smape: f64,
    #[serde(rename = "NRMSE")]
    pub nrmse: f64,
    #[serde(rename = "MARNE")]
    pub marne: f64,
    #[serde(rename = "MASE")]
    pub mase: f64,
    #[serde(rename = "WMAPE")]
    pub wmape: f64,
}

impl ExtendedMetricSet {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        Ok(Self {
            base: MetricSet::compute(actual, predicted)?,
            smape: report_value(symmetric_mean_absolute_percentage_error(actual, predicted)),
            nrmse: report_value(normalized_root_mean_squared_error(actual, predicted)),
            marne: report_value(mean_absolute_range_normalized_error(actual, predicted)),
            mase: report_value(mean_absolute_scaled_error(actual, predicted)),
            wmape: report_value(weighted_mean_absolute_percentage_error(actual, predicted)),
        })
    }

    pub fn from_paired(paired: &PairedSeries) -> Result<Self> {
        Self::compute(&paired.actual, &paired.predicted)
    }
}

/// Metric sets keyed by method, in the order methods were configured.
///
/// Serializes as a JSON object whose keys keep that order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricReport {
    entries: Vec<(String, MetricSet)>,
}

impl MetricReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the metrics for `method`
    pub fn insert(&mut self, method: impl Into<String>, metrics: MetricSet) {
        let method = method.into();
        match self.entries.iter_mut().find(|(name, _)| *name == method) {
            Some(entry) => entry.1 = metrics,
            None => self.entries.push((method, metrics)),
        }
    }

    pub fn get(&self, method: &str) -> Option<&MetricSet> {
        self.entries
            .iter()
            .find(|(name, _)| name == method)
            .map(|(_, metrics)| metrics)
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricSet)> {
        self.entries.iter().map(|(name, m)| (name.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for MetricReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (method, metrics) in &self.entries {
            map.serialize_entry(method, metrics)?;
        }
        map.end()
    }
}

/// Score every method column of an aligned frame against its real column
pub fn compute_report(frame: &AlignedFrame) -> Result<MetricReport> {
    let actual = frame.real_values()?;
    let mut report = MetricReport::new();
    for method in frame.methods() {
        let predicted = frame.method_values(method)?;
        report.insert(method.clone(), MetricSet::compute(&actual, &predicted)?);
    }
    Ok(report)
}

/// [`compute_report`] on the blocking worker pool
pub async fn compute_report_offloaded(frame: AlignedFrame) -> Result<MetricReport> {
    tokio::task::spawn_blocking(move || compute_report(&frame)).await?
}

/// One predicted point next to the observation it was paired with
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub time: NaiveDateTime,
    pub predicted: f64,
    pub actual: f64,
    #[serde(rename = "MAE")]
    pub abs_error: f64,
    #[serde(rename = "RMSE")]
    pub root_squared_error: f64,
    #[serde(rename = "MAPE")]
    pub abs_percentage_error: f64,
}

/// Per-point errors for a paired series
pub fn comparison_rows(paired: &PairedSeries) -> Vec<ComparisonRow> {
    paired
        .times
        .iter()
        .zip(paired.actual.iter().zip(&paired.predicted))
        .map(|(&time, (&actual, &predicted))| {
            let diff = actual - predicted;
            ComparisonRow {
                time,
                predicted,
                actual,
                abs_error: diff.abs(),
                root_squared_error: (diff * diff).sqrt(),
                abs_percentage_error: sanitize((diff / actual).abs() * 100.0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn metric_set_is_rounded() {
        let m = MetricSet::compute(&[10.0, 20.0, 30.0], &[11.0, 19.0, 32.0]).unwrap();
        assert_relative_eq!(m.mae, 1.33);
        assert_relative_eq!(m.rmse, 1.41);
        assert_relative_eq!(m.r2, 0.97);
        assert_relative_eq!(m.mape, 7.22);
    }

    #[test]
    fn empty_input_reports_zeros() {
        let m = MetricSet::compute(&[], &[]).unwrap();
        assert_eq!(
            m,
            MetricSet {
                mae: 0.0,
                rmse: 0.0,
                r2: 0.0,
                mape: 0.0
            }
        );
    }

    #[test]
    fn mismatched_lengths_are_internal_errors() {
        assert!(matches!(
            MetricSet::compute(&[1.0], &[]),
            Err(crate::error::EvalError::InternalComputation(_))
        ));
    }

    #[test]
    fn report_keeps_insertion_order() {
        let mut report = MetricReport::new();
        let m = MetricSet::compute(&[1.0, 2.0], &[1.0, 2.0]).unwrap();
        report.insert("XGBoost", m);
        report.insert("LSTM", m);
        report.insert("ARIMA", m);
        let json = serde_json::to_string(&report).unwrap();
        let xgb = json.find("XGBoost").unwrap();
        let lstm = json.find("LSTM").unwrap();
        let arima = json.find("ARIMA").unwrap();
        assert!(xgb < lstm && lstm < arima);
        assert_eq!(report.methods().collect::<Vec<_>>(), vec!["XGBoost", "LSTM", "ARIMA"]);
    }

    #[test]
    fn comparison_row_with_zero_truth_is_finite() {
        let paired = PairedSeries {
            times: vec![chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()],
            actual: vec![0.0],
            predicted: vec![2.0],
        };
        let rows = comparison_rows(&paired);
        assert_eq!(rows[0].abs_error, 2.0);
        assert_eq!(rows[0].root_squared_error, 2.0);
        assert_eq!(rows[0].abs_percentage_error, 0.0);
    }
}
