//! Error types for the forecast_eval crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Generic message shown to callers when a request fails for an internal reason
pub const PROCESSING_FAILED: &str = "Failed to process forecast data";

/// Custom error types for the forecast_eval crate
#[derive(Debug, Error)]
pub enum EvalError {
    /// No forecast configuration with this name for the organization
    #[error("Forecast configuration not found: {0}")]
    ConfigNotFound(String),

    /// No database connection with this id for the organization
    #[error("Connection not found: {0}")]
    ConnectionNotFound(i64),

    /// Connection uses a database kind the engine cannot read
    #[error("Unsupported connection schema: {0}")]
    UnsupportedSchema(String),

    /// The configuration has no prediction methods bound to it
    #[error("No prediction methods configured for {0}")]
    NoMethods(String),

    /// The real-data (anchor) table returned nothing
    #[error("No data in source table {0}")]
    NoDataInSource(String),

    /// A date supplied by the caller could not be parsed
    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    /// Horizon unit is not one of minute, hour, day, month
    #[error("Invalid horizon unit: {0}")]
    InvalidHorizonUnit(String),

    /// Discreteness needs at least two samples
    #[error("Insufficient sample: need at least 2 points, got {0}")]
    InsufficientSample(usize),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Table or column name that cannot be quoted safely
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Unexpected failure while aligning series or computing metrics
    #[error("Internal computation error: {0}")]
    InternalComputation(String),

    /// Error from the data store
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error writing CSV output
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from JSON (de)serialization
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl EvalError {
    /// Whether the error describes a problem with the caller's input or
    /// configuration, as opposed to a failure while processing.
    ///
    /// A configuration or connection that cannot be resolved, or an anchor
    /// series that cannot be read, is a processing failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EvalError::UnsupportedSchema(_)
                | EvalError::NoMethods(_)
                | EvalError::InvalidDateFormat(_)
                | EvalError::InvalidHorizonUnit(_)
                | EvalError::InsufficientSample(_)
                | EvalError::InvalidParameter(_)
                | EvalError::InvalidIdentifier(_)
        )
    }

    /// Message safe to return to a dashboard user.
    ///
    /// Validation errors keep their specific cause; everything else collapses
    /// to [`PROCESSING_FAILED`] and should be logged in full by the caller.
    pub fn public_message(&self) -> String {
        if self.is_validation() {
            self.to_string()
        } else {
            PROCESSING_FAILED.to_string()
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, EvalError>;

impl From<PolarsError> for EvalError {
    fn from(err: PolarsError) -> Self {
        EvalError::PolarsError(err.to_string())
    }
}

impl From<accuracy_math::MathError> for EvalError {
    fn from(err: accuracy_math::MathError) -> Self {
        EvalError::InternalComputation(err.to_string())
    }
}

impl From<tokio::task::JoinError> for EvalError {
    fn from(err: tokio::task::JoinError) -> Self {
        EvalError::InternalComputation(format!("metrics worker failed: {}", err))
    }
}
