use chrono::{Duration, NaiveDate, NaiveDateTime};
use forecast_eval::view::{ForecastViewBuilder, Legend};
use forecast_eval::{EvalError, TimeSeriesWindow};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn at(minutes: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 10)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        + Duration::minutes(minutes)
}

fn anchor() -> TimeSeriesWindow {
    TimeSeriesWindow::from_pairs(vec![(at(0), 10.0), (at(5), 12.0), (at(10), 11.0)])
}

#[test]
fn test_download_table_to_csv_file() {
    let view = ForecastViewBuilder::new("grid_load", "measured_at", anchor())
        .add_method(
            "XGBoost",
            TimeSeriesWindow::from_pairs(vec![(at(10), 11.5), (at(15), 13.0), (at(20), 14.0)]),
        )
        .add_method(
            "Prophet",
            TimeSeriesWindow::from_pairs(vec![(at(15), 12.5)]),
        )
        .build()
        .unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("grid_load.csv");
    view.table_to_download
        .write_csv(fs::File::create(&path).unwrap())
        .unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(
        lines,
        vec![
            "measured_at,XGBoost,Prophet",
            "2024-03-10 12:10:00,11,11",
            "2024-03-10 12:15:00,13,12.5",
            "2024-03-10 12:20:00,14,",
        ]
    );
}

#[test]
fn test_evaluation_points_feed_accuracy_table() {
    let view = ForecastViewBuilder::new("grid_load", "measured_at", anchor())
        .add_method(
            "LSTM",
            TimeSeriesWindow::from_pairs(vec![(at(4), 11.0), (at(10), 12.0), (at(15), 9.0)]),
        )
        .build()
        .unwrap();

    let table = view.metrix_tables.get("LSTM").unwrap();
    // 12:04 pairs with the 12:05 reading
    assert_eq!(table.metrics_table.len(), 2);
    assert_eq!(table.metrics_table[0].actual, 12.0);
    assert_eq!(table.summary.base.mae, 1.0);
    assert_eq!(table.text.de, "Prognosegenauigkeitsmetriken für LSTM");
}

#[test]
fn test_method_without_future_points() {
    let view = ForecastViewBuilder::new("grid_load", "measured_at", anchor())
        .add_method(
            "XGBoost",
            TimeSeriesWindow::from_pairs(vec![(at(0), 10.5), (at(5), 12.5)]),
        )
        .build()
        .unwrap();

    // Only the connecting real point is drawn
    let line = view.map_data.data.prediction("XGBoost").unwrap();
    assert_eq!(line.len(), 1);
    assert_eq!(line[0].time, at(10));
    assert!(view.table_to_download.is_empty());
    assert_eq!(view.metrix_tables.len(), 1);
}

#[test]
fn test_empty_methods_are_ignored() {
    let view = ForecastViewBuilder::new("grid_load", "measured_at", anchor())
        .add_method("XGBoost", TimeSeriesWindow::empty())
        .build()
        .unwrap();

    assert!(view.map_data.data.predictions.is_empty());
    assert!(view.metrix_tables.is_empty());
    assert_eq!(view.table_to_download.headers(), vec!["measured_at"]);
    assert_eq!(view.map_data.last_know_data, at(10));

    let json = view.to_keyed_json().unwrap();
    let data = &json[0]["grid_load"]["map_data"]["data"];
    assert_eq!(data["last_real_data"].as_array().unwrap().len(), 3);
    assert!(data["ensemble"].is_null());
    assert!(json[0]["grid_load"]["description"]["data_name"].is_null());
}

#[test]
fn test_empty_anchor_is_rejected() {
    let err = ForecastViewBuilder::new("grid_load", "measured_at", TimeSeriesWindow::empty())
        .build()
        .unwrap_err();
    assert!(matches!(err, EvalError::NoDataInSource(ref n) if n == "grid_load"));
}

#[test]
fn test_legend_colors() {
    let legend = Legend::for_methods(&["XGBoost".to_string(), "Prophet".to_string()]);

    assert_eq!(legend.get("real_data_line").unwrap().color, "#0000FF");
    assert_eq!(legend.get("LSTM_data_line").unwrap().color, "#FFA500");
    assert_eq!(legend.get("XGBoost_data_line").unwrap().color, "#a7f3d0");
    assert_eq!(
        legend.get("Prophet_data_line").unwrap().text.en,
        "Prophet current forecast"
    );
    assert_eq!(legend.keys().last(), Some("Ensemble_data_line"));
}
