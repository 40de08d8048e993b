//! Stochastic oscillator (%K, %D).
//!
//! raw %K[t] = 100 * (close[t] - lowest_low) / (highest_high - lowest_low) over `k_period` bars
//! %K = `k_smooth`-bar mean of raw %K, %D = `d_period`-bar mean of %K.
//! A zero high-low range leaves raw %K undefined (NaN).
//! Lookback: k_period + k_smooth - 2 for %K.

use super::{rolling_mean, Indicator};
use crate::domain::Bar;

/// %K and %D lines for one bar series.
#[derive(Debug, Clone, PartialEq)]
pub struct StochasticLines {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    k_smooth: usize,
    d_period: usize,
    name: String,
}

impl Stochastic {
    pub fn new(k_period: usize, k_smooth: usize, d_period: usize) -> Self {
        assert!(
            k_period >= 1 && k_smooth >= 1 && d_period >= 1,
            "Stochastic periods must be >= 1"
        );
        Self {
            k_period,
            k_smooth,
            d_period,
            name: format!("stoch_{k_period}_{k_smooth}_{d_period}"),
        }
    }

    pub fn raw_k(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.k_period {
            return result;
        }

        for i in (self.k_period - 1)..n {
            let window = &bars[i + 1 - self.k_period..=i];
            let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            let highest = window
                .iter()
                .map(|b| b.high)
                .fold(f64::NEG_INFINITY, f64::max);
            let range = highest - lowest;
            if range.is_nan() || range == 0.0 {
                continue;
            }
            result[i] = 100.0 * (bars[i].close - lowest) / range;
        }

        result
    }

    pub fn compute_all(&self, bars: &[Bar]) -> StochasticLines {
        let k = rolling_mean(&self.raw_k(bars), self.k_smooth);
        let d = rolling_mean(&k, self.d_period);
        StochasticLines { k, d }
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.k_period + self.k_smooth - 2
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.compute_all(bars).k
    }
}
