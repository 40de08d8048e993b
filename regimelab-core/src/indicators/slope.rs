//! Least-squares slope of a series against its index.

/// OLS slope of `values` regressed on 0..n-1.
///
/// Returns 0.0 for fewer than two points and NaN if any value is NaN.
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let nf = n as f64;
    let mean_x = (nf - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / nf;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }

    num / den
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn slope_of_line() {
        let values: Vec<f64> = (0..10).map(|i| 3.0 + 2.5 * i as f64).collect();
        assert_approx(linear_slope(&values), 2.5, DEFAULT_EPSILON);
    }

    #[test]
    fn slope_of_flat_is_zero() {
        assert_eq!(linear_slope(&[7.0; 20]), 0.0);
    }

    #[test]
    fn slope_negative() {
        assert!(linear_slope(&[5.0, 4.0, 4.5, 2.0]) < 0.0);
    }

    #[test]
    fn slope_degenerate_inputs() {
        assert_eq!(linear_slope(&[]), 0.0);
        assert_eq!(linear_slope(&[42.0]), 0.0);
        assert!(linear_slope(&[1.0, f64::NAN, 3.0]).is_nan());
    }
}
