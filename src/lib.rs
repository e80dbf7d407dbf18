//! # Horizon
//!
//! Workspace root for the forecast accuracy engine.
//!
//! - [`forecast_eval`]: reading, aligning and scoring forecasts, and the dashboard payload
//! - [`accuracy_math`]: the numeric accuracy metrics
//!
//! ```
//! use horizon_workspace::accuracy_math::mean_absolute_error;
//!
//! assert_eq!(mean_absolute_error(&[1.0, 2.0], &[2.0, 2.0]), 0.5);
//! ```

pub use accuracy_math;
pub use forecast_eval;
