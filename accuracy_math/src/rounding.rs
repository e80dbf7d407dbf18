//! Helpers that turn raw metric values into reportable numbers

/// Round `value` to `decimals` places, half away from zero.
///
/// Values too large to scale are returned unchanged.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    if scaled.is_finite() {
        scaled.round() / factor
    } else {
        value
    }
}

/// Replace a value that has no finite meaning (`NaN`, `±inf`) with 0.0.
///
/// This hides undefined metrics behind a zero; callers that need to tell the
/// two apart must inspect the raw value first.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_two_places() {
        assert_eq!(round_to(3.14159, 2), 3.14);
        assert_eq!(round_to(2.0, 2), 2.0);
        assert_eq!(round_to(-1.006, 2), -1.01);
    }

    #[test]
    fn huge_values_survive_rounding() {
        assert_eq!(round_to(1e307, 2), 1e307);
        assert_eq!(round_to(-f64::MAX, 2), -f64::MAX);
    }

    #[test]
    fn sanitizes_non_finite_values() {
        assert_eq!(sanitize(f64::NAN), 0.0);
        assert_eq!(sanitize(f64::INFINITY), 0.0);
        assert_eq!(sanitize(f64::NEG_INFINITY), 0.0);
        assert_eq!(sanitize(12.5), 12.5);
    }
}
