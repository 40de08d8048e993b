//! MACD: Moving Average Convergence Divergence.
//!
//! line = EMA(fast) - EMA(slow)
//! signal = EMA(signal_period) of line
//! histogram = line - signal
//!
//! Lookback: slow - 1 for the line, slow + signal_period - 2 for signal and histogram.

use super::ema::ema_of_series;
use super::{closes, Indicator};
use crate::domain::Bar;

/// All MACD lines for one bar series.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdLines {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be below slow period");
        Self {
            fast,
            slow,
            signal,
            name: format!("macd_{fast}_{slow}_{signal}"),
        }
    }

    /// Bars before the histogram becomes defined.
    pub fn histogram_lookback(&self) -> usize {
        self.slow + self.signal - 2
    }

    pub fn compute_all(&self, bars: &[Bar]) -> MacdLines {
        let close = closes(bars);
        let fast = ema_of_series(&close, self.fast);
        let slow = ema_of_series(&close, self.slow);

        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_of_series(&line, self.signal);
        let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();

        MacdLines {
            line,
            signal,
            histogram,
        }
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.compute_all(bars).line
    }
}
