//! CSV import: one `SYMBOL.csv` per symbol in a directory.
//!
//! Expected header: `timestamp,open,high,low,close,volume`. Timestamps may be
//! `YYYY-MM-DD HH:MM:SS`, RFC 3339, or a bare `YYYY-MM-DD` (midnight). Empty
//! price cells read as NaN and are dropped later by ingest.

use super::{DataError, DataProvider, FetchWindow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regimelab_core::domain::Bar;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    /// Read every row of a file, ignoring the fetch window.
    pub fn read_file(path: &Path, symbol: &str) -> Result<Vec<Bar>, DataError> {
        let file = File::open(path).map_err(|e| DataError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut reader = ::csv::ReaderBuilder::new()
            .trim(::csv::Trim::All)
            .from_reader(file);

        let mut bars = Vec::new();
        for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| csv_error(path, e))?;
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
                DataError::Other(format!(
                    "{}: unparseable timestamp '{}' on data row {}",
                    path.display(),
                    row.timestamp,
                    line + 1
                ))
            })?;
            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp,
                open: row.open.unwrap_or(f64::NAN),
                high: row.high.unwrap_or(f64::NAN),
                low: row.low.unwrap_or(f64::NAN),
                close: row.close.unwrap_or(f64::NAN),
                volume: row.volume.map(|v| v.max(0.0).round() as u64).unwrap_or(0),
            });
        }
        Ok(bars)
    }
}

fn csv_error(path: &Path, e: ::csv::Error) -> DataError {
    DataError::Csv {
        path: path.to_path_buf(),
        source: e,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, symbol: &str, window: &FetchWindow) -> Result<Vec<Bar>, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        let bars = Self::read_file(&path, symbol)?;
        Ok(bars
            .into_iter()
            .filter(|b| window.contains(b.timestamp))
            .collect())
    }
}
