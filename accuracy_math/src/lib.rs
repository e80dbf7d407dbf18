//! # Accuracy Math
//!
//! Accuracy metrics for point forecasts.
//! Every metric takes the observed values and the predicted values as two
//! equally long slices and returns a plain `f64`. Undefined results (empty
//! input, mismatched lengths, a zero denominator) come back as `NaN` or an
//! infinity rather than an error, so callers decide how to report them.

use thiserror::Error;

pub mod regression;
pub mod rounding;

pub use regression::{
    mean_absolute_error, mean_absolute_percentage_error, mean_absolute_range_normalized_error,
    mean_absolute_scaled_error, mean_squared_error, normalized_root_mean_squared_error, r2_score,
    root_mean_squared_error, symmetric_mean_absolute_percentage_error,
    weighted_mean_absolute_percentage_error,
};
pub use rounding::{round_to, sanitize};

/// Errors raised when paired inputs cannot be scored at all
#[derive(Error, Debug, PartialEq)]
pub enum MathError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for accuracy math operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Check that two series can be compared point by point.
pub fn validate_pair(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(MathError::InvalidInput(format!(
            "actual has {} values but predicted has {}",
            actual.len(),
            predicted.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_of_equal_length_is_valid() {
        assert!(validate_pair(&[1.0, 2.0], &[1.5, 2.5]).is_ok());
        assert!(validate_pair(&[], &[]).is_ok());
    }

    #[test]
    fn mismatched_pair_is_rejected() {
        let err = validate_pair(&[1.0, 2.0, 3.0], &[1.0]).unwrap_err();
        assert_eq!(
            err,
            MathError::InvalidInput("actual has 3 values but predicted has 1".to_string())
        );
    }
}
