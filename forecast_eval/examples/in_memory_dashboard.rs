use chrono::{Duration, NaiveDate};
use forecast_eval::config::{
    ConnectionSettings, ForecastConfig, ForecastMethodBinding, StaticConfigProvider,
    StaticConnectionResolver, TargetStorage,
};
use forecast_eval::settings::EngineSettings;
use forecast_eval::source::{MemorySource, MemorySourceFactory};
use forecast_eval::{ForecastService, TimeSeriesWindow};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = EngineSettings::default();
    forecast_eval::logging::init(&settings.log_filter);

    // Two days of hourly readings with a daily cycle
    let start = NaiveDate::from_ymd_opt(2024, 5, 1)
        .ok_or("bad date")?
        .and_hms_opt(0, 0, 0)
        .ok_or("bad time")?;
    let reading =
        |hour: i64| 20.0 + 5.0 * ((hour % 24) as f64 / 24.0 * std::f64::consts::TAU).sin();
    let real =
        TimeSeriesWindow::from_pairs((0..48).map(|h| (start + Duration::hours(h), reading(h))));

    // Predictions overlap the last six real hours and run twelve hours past them
    let xgboost = TimeSeriesWindow::from_pairs(
        (42..60).map(|h| (start + Duration::hours(h) + Duration::minutes(2), reading(h) + 0.4)),
    );
    let lstm = TimeSeriesWindow::from_pairs(
        (42..60).map(|h| (start + Duration::hours(h), reading(h) * 0.97)),
    );

    let source = MemorySource::new()
        .with_table("greenhouse", real)
        .with_table("xgb_greenhouse", xgboost)
        .with_table("lstm_greenhouse", lstm);

    let mut configs = StaticConfigProvider::new();
    configs.insert(
        1,
        ForecastConfig {
            data_name: "greenhouse_temp".to_string(),
            connection_id: 1,
            source_table: "greenhouse".to_string(),
            time_column: "measured_at".to_string(),
            target_column: "temp_c".to_string(),
            discreteness: 3600,
            horizon: 12,
            target_storage: TargetStorage::CoLocated,
            methods: vec![
                ForecastMethodBinding::new("XGBoost", "xgb_greenhouse"),
                ForecastMethodBinding::new("LSTM", "lstm_greenhouse"),
            ],
        },
    );
    let mut connections = StaticConnectionResolver::new();
    connections.insert(
        1,
        1,
        ConnectionSettings {
            schema: "PostgreSQL".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            user: "demo".to_string(),
            password: "demo".to_string(),
            db_name: "demo".to_string(),
        },
    );

    let service = ForecastService::new(
        configs,
        connections,
        MemorySourceFactory::new(source, MemorySource::new()),
        settings,
    );

    let dates = service.evaluate_dates(1, "greenhouse_temp").await?;
    println!("Default window: {} .. {}", dates.start_default_date, dates.end_default_date);

    let report = service
        .evaluate_metrics(1, "greenhouse_temp", "2024-05-02T18:00:00", "2024-05-02T23:59:59")
        .await?;
    for (method, metrics) in report.iter() {
        println!(
            "{:<8} MAE {:>6.2}  RMSE {:>6.2}  R2 {:>6.2}  MAPE {:>6.2}%",
            method, metrics.mae, metrics.rmse, metrics.r2, metrics.mape
        );
    }

    let view = service.build_dashboard_view(1, "greenhouse_temp").await?;
    println!("\nForecast table:");
    view.table_to_download.write_csv(std::io::stdout())?;

    Ok(())
}
