//! Synthetic bars for development and offline runs.
//!
//! A random walk seeded from the BLAKE3 hash of the symbol, so every symbol
//! gets its own path and the same symbol always gets the same one. Weekend
//! bars are skipped. Results on synthetic data are clearly fake.

use super::{DataError, DataProvider, FetchWindow};
use chrono::{Datelike, Duration, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regimelab_core::domain::Bar;

#[derive(Debug, Clone, Copy)]
pub struct SyntheticProvider {
    start_price: f64,
    /// Largest absolute per-bar return.
    max_step: f64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            start_price: 100.0,
            max_step: 0.02,
        }
    }
}

impl SyntheticProvider {
    pub fn new(start_price: f64, max_step: f64) -> Self {
        Self {
            start_price,
            max_step,
        }
    }

    pub fn generate(&self, symbol: &str, window: &FetchWindow) -> Vec<Bar> {
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let step = Duration::hours(window.interval.hours());
        let mut bars = Vec::new();
        let mut price = self.start_price;
        let mut current = window.start();

        while current <= window.end {
            let weekday = current.weekday();
            if weekday == Weekday::Sat || weekday == Weekday::Sun {
                current += step;
                continue;
            }

            let ret: f64 = rng.gen_range(-self.max_step..self.max_step);
            let open = price;
            let close = price * (1.0 + ret);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..self.max_step / 2.0));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..self.max_step / 2.0));
            let volume = rng.gen_range(100_000..2_000_000u64);

            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp: current,
                open,
                high,
                low,
                close,
                volume,
            });

            price = close;
            current += step;
        }

        bars
    }
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, symbol: &str, window: &FetchWindow) -> Result<Vec<Bar>, DataError> {
        if !(self.start_price > 0.0 && self.max_step > 0.0 && self.max_step < 1.0) {
            return Err(DataError::Other(format!(
                "invalid synthetic parameters: start_price={}, max_step={}",
                self.start_price, self.max_step
            )));
        }
        Ok(self.generate(symbol, window))
    }
}
