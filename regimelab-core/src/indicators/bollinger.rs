//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//! - Position: (close - lower) / (upper - lower), clamped to [0, 1]; 0.5 at zero width
//!
//! Uses sample stddev (divide by N-1).
//! Lookback: period - 1.

use super::{closes, rolling_mean, rolling_std, Indicator};
use crate::domain::Bar;

/// All Bollinger lines for one bar series.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
    pub position: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        Self {
            period,
            multiplier,
            name: format!("bb_position_{period}_{multiplier}"),
        }
    }

    pub fn compute_all(&self, bars: &[Bar]) -> BollingerBands {
        let close = closes(bars);
        let middle = rolling_mean(&close, self.period);
        let std = rolling_std(&close, self.period);

        let n = close.len();
        let mut upper = vec![f64::NAN; n];
        let mut lower = vec![f64::NAN; n];
        let mut position = vec![f64::NAN; n];

        for i in 0..n {
            if middle[i].is_nan() || std[i].is_nan() {
                continue;
            }
            upper[i] = middle[i] + self.multiplier * std[i];
            lower[i] = middle[i] - self.multiplier * std[i];
            position[i] = band_position(close[i], upper[i], lower[i]);
        }

        BollingerBands {
            upper,
            middle,
            lower,
            position,
        }
    }
}

/// Band width relative to the close below which the band is treated as flat.
const FLAT_WIDTH: f64 = 1e-9;

/// Where `close` sits inside the band, 0 at the lower band and 1 at the upper.
/// A band no wider than rounding noise puts the close at the middle.
pub fn band_position(close: f64, upper: f64, lower: f64) -> f64 {
    let width = upper - lower;
    if width.abs() <= FLAT_WIDTH * close.abs() {
        return 0.5;
    }
    ((close - lower) / width).clamp(0.0, 1.0)
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.compute_all(bars).position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn bollinger_middle_is_sma() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let bands = Bollinger::new(3, 2.0).compute_all(&bars);

        assert!(bands.middle[0].is_nan());
        assert!(bands.middle[1].is_nan());
        assert_approx(bands.middle[2], 11.0, DEFAULT_EPSILON);
        assert_approx(bands.middle[3], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_sample_stddev_width() {
        // Sample stddev of (10, 11, 12) = 1.0
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let bands = Bollinger::new(3, 2.0).compute_all(&bars);
        assert_approx(bands.upper[2], 13.0, DEFAULT_EPSILON);
        assert_approx(bands.lower[2], 9.0, DEFAULT_EPSILON);
        // (12 - 9) / 4
        assert_approx(bands.position[2], 0.75, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_bands_symmetric() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let bands = Bollinger::new(3, 2.0).compute_all(&bars);
        for i in 2..5 {
            let half_width = bands.upper[i] - bands.middle[i];
            assert_approx(bands.middle[i] - bands.lower[i], half_width, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn bollinger_constant_price_zero_width() {
        let bars = make_bars(&[100.0, 100.0, 100.0, 100.0]);
        let bands = Bollinger::new(3, 2.0).compute_all(&bars);
        assert_approx(bands.upper[2], 100.0, DEFAULT_EPSILON);
        assert_approx(bands.lower[2], 100.0, DEFAULT_EPSILON);
        assert_eq!(bands.position[3], 0.5);
    }

    #[test]
    fn bollinger_constant_inexact_price_is_mid_band() {
        for price in [0.1, 7.77, 33.33] {
            let bars = make_bars(&[price; 25]);
            let result = Bollinger::new(20, 2.0).compute(&bars);
            assert_eq!(result[24], 0.5, "price {price}");
        }
    }

    #[test]
    fn band_position_clamps() {
        assert_eq!(band_position(120.0, 110.0, 90.0), 1.0);
        assert_eq!(band_position(80.0, 110.0, 90.0), 0.0);
        assert_approx(band_position(95.0, 110.0, 90.0), 0.25, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_nan_propagation() {
        let mut bars = make_bars(&[10.0, 11.0, 12.0, 13.0]);
        bars[2].close = f64::NAN;
        let result = Bollinger::new(3, 2.0).compute(&bars);
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
    }

    #[test]
    fn bollinger_lookback() {
        assert_eq!(Bollinger::new(20, 2.0).lookback(), 19);
    }
}
