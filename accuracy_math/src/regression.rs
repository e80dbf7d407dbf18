//! Regression accuracy metrics
//!
//! Contains the error measures used to score a forecast against observations:
//! - Scale-dependent errors (MAE, MSE, RMSE)
//! - Goodness of fit (R²)
//! - Percentage errors (MAPE, SMAPE, WMAPE)
//! - Range and naive-forecast normalized errors (NRMSE, MARNE, MASE)

use statrs::statistics::Statistics;

fn is_comparable(actual: &[f64], predicted: &[f64]) -> bool {
    !actual.is_empty() && actual.len() == predicted.len()
}

fn range(values: &[f64]) -> f64 {
    Statistics::max(values.iter()) - Statistics::min(values.iter())
}

/// Mean Absolute Error
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if !is_comparable(actual, predicted) {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .mean()
}

/// Mean Squared Error
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if !is_comparable(actual, predicted) {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .mean()
}

/// Root Mean Squared Error
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean_squared_error(actual, predicted).sqrt()
}

/// Coefficient of determination.
///
/// Fewer than two observations give `NaN`. A constant truth scores 1.0 when
/// predicted exactly and 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if !is_comparable(actual, predicted) || actual.len() < 2 {
        return f64::NAN;
    }

    let mean = actual.iter().mean();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Mean Absolute Percentage Error, in percent.
///
/// Any zero observation makes the result infinite or `NaN`.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if !is_comparable(actual, predicted) {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| ((a - p) / a).abs())
        .mean()
        * 100.0
}

/// Symmetric Mean Absolute Percentage Error, in percent (0 to 200)
pub fn symmetric_mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if !is_comparable(actual, predicted) {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| 2.0 * (p - a).abs() / (a.abs() + p.abs()))
        .mean()
        * 100.0
}

/// RMSE divided by the range of the observations
pub fn normalized_root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if !is_comparable(actual, predicted) {
        return f64::NAN;
    }
    root_mean_squared_error(actual, predicted) / range(actual)
}

/// MAE divided by the range of the observations
pub fn mean_absolute_range_normalized_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if !is_comparable(actual, predicted) {
        return f64::NAN;
    }
    mean_absolute_error(actual, predicted) / range(actual)
}

/// Mean Absolute Scaled Error against a lag-1 naive forecast.
///
/// The first observation has no naive prediction, so both the model and the
/// naive error are measured from the second observation on.
pub fn mean_absolute_scaled_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if !is_comparable(actual, predicted) || actual.len() < 2 {
        return f64::NAN;
    }
    let n = actual.len();
    let model = mean_absolute_error(&actual[1..], &predicted[1..]);
    let naive = mean_absolute_error(&actual[1..], &actual[..n - 1]);
    model / naive
}

/// Weighted Mean Absolute Percentage Error, in percent
pub fn weighted_mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if !is_comparable(actual, predicted) {
        return f64::NAN;
    }
    let abs_error: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();
    let abs_actual: f64 = actual.iter().map(|a| a.abs()).sum();
    abs_error / abs_actual * 100.0
}
