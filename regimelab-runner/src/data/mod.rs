//! Data acquisition behind a narrow provider trait.
//!
//! Every provider returns bars for one symbol over a `FetchWindow`. The runner
//! fetches everything up front, runs it through `ingest`, and only then starts
//! replay, so no I/O happens while scoring.

pub mod csv;
pub mod ingest;
pub mod memory;
pub mod synthetic;
pub mod yahoo;

pub use self::csv::CsvProvider;
pub use ingest::{
    dataset_hash, ingest, load_universe, resample, FetchFailure, IngestReport, LoadedUniverse,
};
pub use memory::InMemoryProvider;
pub use synthetic::SyntheticProvider;
pub use yahoo::YahooProvider;

use crate::config::{DataSection, DataSourceKind};
use chrono::{Duration, NaiveDateTime};
use regimelab_core::domain::Bar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: ::csv::Error,
    },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no usable bars for {symbol} in the requested window")]
    NoBars { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Bar resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Interval {
    #[serde(rename = "1h")]
    OneHour,
    #[default]
    #[serde(rename = "4h")]
    FourHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    pub fn hours(self) -> i64 {
        match self {
            Interval::OneHour => 1,
            Interval::FourHour => 4,
            Interval::OneDay => 24,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Interval::OneHour => "1h",
            Interval::FourHour => "4h",
            Interval::OneDay => "1d",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The trailing span of history to fetch, ending at `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub end: NaiveDateTime,
    pub history_days: u32,
    pub interval: Interval,
}

impl FetchWindow {
    pub fn new(end: NaiveDateTime, history_days: u32, interval: Interval) -> Self {
        Self {
            end,
            history_days,
            interval,
        }
    }

    /// Window ending now (UTC).
    pub fn ending_now(history_days: u32, interval: Interval) -> Self {
        Self::new(chrono::Utc::now().naive_utc(), history_days, interval)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.end - Duration::days(i64::from(self.history_days))
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start() && ts <= self.end
    }
}

/// Source of bars for one symbol at a time.
///
/// Implementations know nothing about scoring or replay; they only return
/// what the source holds for the window. Cleanup happens in `ingest`.
pub trait DataProvider: Send + Sync {
    fn name(&self) -> &str;

    fn fetch(&self, symbol: &str, window: &FetchWindow) -> Result<Vec<Bar>, DataError>;
}

/// Provider for the configured data source.
pub fn provider_for(section: &DataSection) -> Result<Box<dyn DataProvider>, DataError> {
    Ok(match section.source {
        DataSourceKind::Csv => Box::new(CsvProvider::new(section.csv_dir.clone())),
        DataSourceKind::Synthetic => Box::new(SyntheticProvider::default()),
        DataSourceKind::Yahoo => Box::new(YahooProvider::new()?),
    })
}
