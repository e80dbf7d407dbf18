//! Estimating the native sampling interval of a series

use crate::data::TimeSeriesWindow;
use crate::error::{EvalError, Result};

/// Mean gap between consecutive timestamps, in whole seconds.
///
/// The sample is ordered by time first, so the estimate never goes negative.
/// Sub-second gaps are averaged exactly and only the final mean is rounded.
pub fn estimate_discreteness(sample: &TimeSeriesWindow) -> Result<u64> {
    if sample.len() < 2 {
        return Err(EvalError::InsufficientSample(sample.len()));
    }

    let mut times = sample.timestamps();
    times.sort();

    let total_millis: i64 = times
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds())
        .sum();
    let mean_secs = total_millis as f64 / 1000.0 / (times.len() - 1) as f64;

    Ok(mean_secs.round() as u64)
}
