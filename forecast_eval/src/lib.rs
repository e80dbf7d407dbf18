//! # Forecast Eval
//!
//! Alignment and accuracy engine for externally produced time series forecasts.
//!
//! Forecasting methods (XGBoost, LSTM, ...) write their predictions to their
//! own tables. This crate reads those tables next to the observed series,
//! pairs predictions with observations despite mismatched sampling, scores
//! them, and assembles the payload the forecasting dashboard draws.
//!
//! ## Features
//!
//! - Bounded reads of `(timestamp, value)` windows from Postgres or memory
//! - Nearest-timestamp joins with a fixed tolerance and a pinned tie-break
//! - MAE, RMSE, R², MAPE and scale-free metrics, always finite and rounded
//! - Discreteness estimation and horizon sizing for new configurations
//! - Dashboard payload with a multi-language legend and CSV export
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forecast_eval::config::{StaticConfigProvider, StaticConnectionResolver};
//! use forecast_eval::settings::EngineSettings;
//! use forecast_eval::source::PgSourceFactory;
//! use forecast_eval::ForecastService;
//!
//! # async fn run() -> forecast_eval::Result<()> {
//! let settings = EngineSettings::from_env()?;
//! forecast_eval::logging::init(&settings.log_filter);
//!
//! let service = ForecastService::new(
//!     StaticConfigProvider::new(),
//!     StaticConnectionResolver::new(),
//!     PgSourceFactory::from_settings(&settings),
//!     settings,
//! );
//!
//! let report = service
//!     .evaluate_metrics(7, "boiler_temp", "2024-05-01", "2024-05-02")
//!     .await?;
//! for (method, metrics) in report.iter() {
//!     println!("{}: MAE {}", method, metrics.mae);
//! }
//! # Ok(())
//! # }
//! ```

pub mod alignment;
pub mod config;
pub mod data;
pub mod discreteness;
pub mod error;
pub mod horizon;
pub mod logging;
pub mod metrics;
pub mod service;
pub mod settings;
pub mod source;
pub mod view;

// Re-export commonly used types
pub use crate::alignment::{align_methods, AlignedFrame};
pub use crate::config::{ForecastConfig, ForecastMethodBinding, TargetStorage};
pub use crate::data::{TimePoint, TimeSeriesWindow};
pub use crate::error::{EvalError, Result};
pub use crate::metrics::{MetricReport, MetricSet};
pub use crate::service::{DateWindow, ForecastService};
pub use crate::view::DashboardView;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
