use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use forecast_eval::alignment::{align_methods, PairedSeries};
use forecast_eval::metrics::{
    comparison_rows, compute_report, compute_report_offloaded, ExtendedMetricSet, MetricSet,
};
use forecast_eval::TimeSeriesWindow;
use rstest::rstest;

fn at(minutes: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::minutes(minutes)
}

fn series(values: &[f64]) -> TimeSeriesWindow {
    TimeSeriesWindow::from_pairs(
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (at(i as i64 * 10), v)),
    )
}

#[test]
fn test_mape_with_zero_truth_is_sanitized() {
    let metrics = MetricSet::compute(&[0.0, 10.0], &[1.0, 11.0]).unwrap();
    assert_eq!(metrics.mape, 0.0);
    assert!(metrics.mae.is_finite());
    assert_relative_eq!(metrics.mae, 1.0);
}

#[test]
fn test_single_point_r2_is_reported_as_zero() {
    let metrics = MetricSet::compute(&[5.0], &[4.0]).unwrap();
    assert_eq!(metrics.r2, 0.0);
    assert_relative_eq!(metrics.mae, 1.0);
    assert_relative_eq!(metrics.mape, 20.0);
}

#[test]
fn test_constant_truth_r2_convention() {
    let perfect = MetricSet::compute(&[3.0, 3.0, 3.0], &[3.0, 3.0, 3.0]).unwrap();
    assert_eq!(perfect.r2, 1.0);

    let off = MetricSet::compute(&[3.0, 3.0, 3.0], &[2.0, 3.0, 4.0]).unwrap();
    assert_eq!(off.r2, 0.0);
}

#[rstest]
#[case(&[10.0, 20.0, 30.0, 40.0], &[10.0, 20.0, 30.0, 40.0], 0.0, 0.0)]
#[case(&[10.0, 20.0, 30.0, 40.0], &[12.0, 18.0, 32.0, 38.0], 2.0, 2.0)]
#[case(&[100.0, 200.0], &[103.0, 196.0], 3.5, 3.54)]
fn test_mae_and_rmse(
    #[case] actual: &[f64],
    #[case] predicted: &[f64],
    #[case] mae: f64,
    #[case] rmse: f64,
) {
    let metrics = MetricSet::compute(actual, predicted).unwrap();
    assert_relative_eq!(metrics.mae, mae);
    assert_relative_eq!(metrics.rmse, rmse);
}

#[test]
fn test_values_are_rounded_to_two_places() {
    let metrics = MetricSet::compute(&[3.0, 7.0, 11.0], &[3.5, 6.0, 12.0]).unwrap();
    // MAE = 2.5 / 3
    assert_eq!(metrics.mae, 0.83);
    assert_eq!(format!("{}", metrics.mape), "13.35");
}

#[test]
fn test_huge_errors_stay_finite() {
    let metrics = MetricSet::compute(&[0.0, 0.0], &[1e307, 1e307]).unwrap();
    for value in [metrics.mae, metrics.rmse, metrics.r2, metrics.mape] {
        assert!(value.is_finite(), "{}", value);
    }
    assert_eq!(metrics.mae, 1e307);

    let extended = ExtendedMetricSet::compute(&[0.0, 1.0, 0.0], &[f64::MAX, 1.0, 1e307]).unwrap();
    assert!(extended.base.mae.is_finite());
    assert!(extended.nrmse.is_finite());
    assert!(extended.wmape.is_finite());
}

#[test]
fn test_metric_set_serializes_with_report_keys() {
    let metrics = MetricSet::compute(&[1.0, 2.0], &[1.0, 2.0]).unwrap();
    let json = serde_json::to_value(metrics).unwrap();
    for key in ["MAE", "RMSE", "R2", "MAPE"] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
    assert_eq!(json["R2"], 1.0);
}

#[test]
fn test_extended_metrics() {
    let actual = [10.0, 20.0, 30.0, 40.0, 50.0];
    let predicted = [12.0, 18.0, 33.0, 37.0, 52.0];
    let extended = ExtendedMetricSet::compute(&actual, &predicted).unwrap();

    assert_relative_eq!(extended.base.mae, 2.4);
    assert_relative_eq!(extended.wmape, 8.0);
    assert_relative_eq!(extended.marne, 0.06);
    assert_relative_eq!(extended.mase, 0.25);
    assert!(extended.smape > 0.0);
    assert!(extended.nrmse > 0.0);

    let json = serde_json::to_value(extended).unwrap();
    assert_eq!(json["MAE"], 2.4);
    assert_eq!(json["WMAPE"], 8.0);
}

#[test]
fn test_report_over_aligned_frame() {
    let real = series(&[10.0, 20.0, 30.0]);
    let methods = vec![
        ("XGBoost".to_string(), series(&[11.0, 19.0, 32.0])),
        ("LSTM".to_string(), series(&[10.0, 20.0, 30.0])),
    ];
    let frame = align_methods(&real, &methods, Duration::seconds(300)).unwrap();
    let report = compute_report(&frame).unwrap();

    assert_eq!(report.methods().collect::<Vec<_>>(), vec!["XGBoost", "LSTM"]);
    let xgb = report.get("XGBoost").unwrap();
    assert_relative_eq!(xgb.mae, 1.33);
    assert_relative_eq!(xgb.r2, 0.97);
    let lstm = report.get("LSTM").unwrap();
    assert_eq!(lstm.mae, 0.0);
    assert_eq!(lstm.r2, 1.0);
}

#[tokio::test]
async fn test_offloaded_report_matches_inline() {
    let real = series(&[5.0, 6.0, 7.0, 8.0]);
    let methods = vec![("XGBoost".to_string(), series(&[5.5, 6.5, 6.5, 8.5]))];
    let frame = align_methods(&real, &methods, Duration::seconds(300)).unwrap();

    let inline = compute_report(&frame).unwrap();
    let offloaded = compute_report_offloaded(frame).await.unwrap();
    assert_eq!(inline, offloaded);
}

#[test]
fn test_comparison_rows() {
    let paired = PairedSeries {
        times: vec![at(0), at(10)],
        actual: vec![50.0, 40.0],
        predicted: vec![45.0, 42.0],
    };
    let rows = comparison_rows(&paired);

    assert_eq!(rows.len(), 2);
    assert_relative_eq!(rows[0].abs_error, 5.0);
    assert_relative_eq!(rows[0].root_squared_error, 5.0);
    assert_relative_eq!(rows[0].abs_percentage_error, 10.0);
    assert_relative_eq!(rows[1].abs_percentage_error, 5.0);

    let json = serde_json::to_value(&rows[1]).unwrap();
    assert_eq!(json["MAE"], 2.0);
    assert_eq!(json["actual"], 40.0);
    assert_eq!(json["predicted"], 42.0);
}
