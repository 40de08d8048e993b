//! In-memory provider for tests and pre-loaded data.

use super::{DataError, DataProvider, FetchWindow};
use regimelab_core::domain::Bar;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    series: HashMap<String, Vec<Bar>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.insert(symbol, bars);
        self
    }

    pub fn insert(&mut self, symbol: &str, bars: Vec<Bar>) {
        self.series.insert(symbol.to_string(), bars);
    }
}

impl DataProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(&self, symbol: &str, window: &FetchWindow) -> Result<Vec<Bar>, DataError> {
        let bars = self
            .series
            .get(symbol)
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;
        Ok(bars
            .iter()
            .filter(|b| window.contains(b.timestamp))
            .cloned()
            .collect())
    }
}
