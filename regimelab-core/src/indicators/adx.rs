//! ADX: Average Directional Index.
//!
//! Steps:
//! 1. Compute +DM and -DM from consecutive bars (Wilder rules)
//! 2. Smooth +DM and -DM with a rolling mean over `period`
//! 3. +DI = 100 * smoothed(+DM) / ATR, -DI = 100 * smoothed(-DM) / ATR
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI), 0 when ATR or the DI sum is zero
//! 5. ADX = rolling mean of DX
//!
//! Lookback: 2 * period - 1.

use super::atr::true_range;
use super::{rolling_mean, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
        }
    }
}

/// Directional movement series. Index 0 is NaN (no previous bar).
pub fn directional_movement(bars: &[Bar]) -> (Vec<f64>, Vec<f64>) {
    let n = bars.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];

    for i in 1..n {
        let up_move = bars[i].high - bars[i - 1].high;
        let down_move = bars[i - 1].low - bars[i].low;
        if up_move.is_nan() || down_move.is_nan() {
            continue;
        }

        plus_dm[i] = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        minus_dm[i] = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };
    }

    (plus_dm, minus_dm)
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        (2 * self.period).saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        if n < 2 {
            return vec![f64::NAN; n];
        }

        let (plus_dm, minus_dm) = directional_movement(bars);
        let atr = rolling_mean(&true_range(bars), self.period);
        let smooth_plus = rolling_mean(&plus_dm, self.period);
        let smooth_minus = rolling_mean(&minus_dm, self.period);

        let mut dx = vec![f64::NAN; n];
        for i in 0..n {
            if atr[i].is_nan() || smooth_plus[i].is_nan() || smooth_minus[i].is_nan() {
                continue;
            }
            if atr[i] == 0.0 {
                dx[i] = 0.0;
                continue;
            }

            let plus_di = 100.0 * smooth_plus[i] / atr[i];
            let minus_di = 100.0 * smooth_minus[i] / atr[i];
            let di_sum = plus_di + minus_di;

            dx[i] = if di_sum == 0.0 {
                0.0
            } else {
                100.0 * (plus_di - minus_di).abs() / di_sum
            };
        }

        rolling_mean(&dx, self.period)
    }
}
