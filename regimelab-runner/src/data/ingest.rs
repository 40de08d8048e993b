//! Cleanup of raw provider output and up-front loading of a whole universe.

use super::{DataError, DataProvider, FetchWindow};
use chrono::{DateTime, NaiveDateTime};
use regimelab_core::domain::Bar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Cleaned bars plus what was dropped on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub bars: Vec<Bar>,
    pub duplicates_dropped: usize,
    pub void_dropped: usize,
    pub insane_dropped: usize,
}

impl IngestReport {
    pub fn dropped(&self) -> usize {
        self.duplicates_dropped + self.void_dropped + self.insane_dropped
    }
}

/// Sort by timestamp, drop duplicate timestamps (first occurrence wins), and
/// drop void or inconsistent bars.
pub fn ingest(mut bars: Vec<Bar>) -> IngestReport {
    bars.sort_by_key(|b| b.timestamp);

    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    let mut duplicates_dropped = 0;
    let mut void_dropped = 0;
    let mut insane_dropped = 0;

    for bar in bars {
        if out.last().is_some_and(|prev| prev.timestamp == bar.timestamp) {
            duplicates_dropped += 1;
            continue;
        }
        if bar.is_void() {
            void_dropped += 1;
            continue;
        }
        if !bar.is_sane() {
            insane_dropped += 1;
            continue;
        }
        out.push(bar);
    }

    IngestReport {
        bars: out,
        duplicates_dropped,
        void_dropped,
        insane_dropped,
    }
}

/// Aggregate bars into buckets of `hours` hours, aligned to the Unix epoch.
///
/// Open is the first open, close the last close, high/low the extremes and
/// volume the sum. The bucket start becomes the timestamp. Input must be
/// sorted; `ingest` output is.
pub fn resample(bars: &[Bar], hours: i64) -> Vec<Bar> {
    if hours <= 1 {
        return bars.to_vec();
    }
    let span = hours * 3600;
    let mut out: Vec<Bar> = Vec::new();
    let mut current_key: Option<i64> = None;

    for bar in bars {
        let key = bar.timestamp.and_utc().timestamp().div_euclid(span);
        match out.last_mut() {
            Some(agg) if current_key == Some(key) => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume = agg.volume.saturating_add(bar.volume);
            }
            _ => {
                let start = DateTime::from_timestamp(key * span, 0)
                    .map(|dt| dt.naive_utc())
                    .unwrap_or(bar.timestamp);
                out.push(Bar {
                    timestamp: start,
                    ..bar.clone()
                });
                current_key = Some(key);
            }
        }
    }
    out
}

/// Deterministic BLAKE3 fingerprint over every bar, in symbol order.
pub fn dataset_hash(bars_by_symbol: &BTreeMap<String, Vec<Bar>>) -> String {
    let mut hasher = blake3::Hasher::new();
    for (symbol, bars) in bars_by_symbol {
        hasher.update(symbol.as_bytes());
        for bar in bars {
            hasher.update(&bar.timestamp.and_utc().timestamp().to_le_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// A symbol whose data could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub symbol: String,
    pub error: String,
}

/// Every symbol's bars, fetched and cleaned before any replay starts.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedUniverse {
    pub provider: String,
    pub window: FetchWindow,
    /// Requested symbols, in request order.
    pub symbols: Vec<String>,
    pub bars: BTreeMap<String, Vec<Bar>>,
    pub failures: Vec<FetchFailure>,
    pub dataset_hash: String,
    /// Latest bar timestamp per symbol.
    pub last_bar: BTreeMap<String, NaiveDateTime>,
}

impl LoadedUniverse {
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn failure(&self, symbol: &str) -> Option<&FetchFailure> {
        self.failures.iter().find(|f| f.symbol == symbol)
    }
}

/// Fetch and ingest every symbol. A symbol that fails (or yields no usable
/// bars) is recorded in `failures` and the rest continue.
pub fn load_universe(
    symbols: &[String],
    provider: &dyn DataProvider,
    window: &FetchWindow,
) -> LoadedUniverse {
    let mut bars_by_symbol = BTreeMap::new();
    let mut failures = Vec::new();

    for symbol in symbols {
        match fetch_clean(symbol, provider, window) {
            Ok(bars) => {
                bars_by_symbol.insert(symbol.clone(), bars);
            }
            Err(e) => {
                warn!(symbol = %symbol, provider = provider.name(), error = %e, "fetch failed");
                failures.push(FetchFailure {
                    symbol: symbol.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let last_bar = bars_by_symbol
        .iter()
        .filter_map(|(s, b)| b.last().map(|bar| (s.clone(), bar.timestamp)))
        .collect();
    let hash = dataset_hash(&bars_by_symbol);
    info!(
        provider = provider.name(),
        loaded = bars_by_symbol.len(),
        failed = failures.len(),
        dataset_hash = %hash,
        "universe loaded"
    );

    LoadedUniverse {
        provider: provider.name().to_string(),
        window: *window,
        symbols: symbols.to_vec(),
        bars: bars_by_symbol,
        failures,
        dataset_hash: hash,
        last_bar,
    }
}

fn fetch_clean(
    symbol: &str,
    provider: &dyn DataProvider,
    window: &FetchWindow,
) -> Result<Vec<Bar>, DataError> {
    let raw = provider.fetch(symbol, window)?;
    let report = ingest(raw);
    if report.dropped() > 0 {
        debug!(
            symbol,
            duplicates = report.duplicates_dropped,
            void = report.void_dropped,
            insane = report.insane_dropped,
            "bars dropped during ingest"
        );
    }
    if report.bars.is_empty() {
        return Err(DataError::NoBars {
            symbol: symbol.to_string(),
        });
    }
    Ok(report.bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{InMemoryProvider, Interval};
    use chrono::{Duration, NaiveDate};

    fn ts(h: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(h)
    }

    fn bar(h: i64, close: f64) -> Bar {
        Bar {
            symbol: "TEST".into(),
            timestamp: ts(h),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100,
        }
    }

    #[test]
    fn ingest_sorts_dedupes_and_drops_bad_bars() {
        let mut void = bar(3, 103.0);
        void.close = f64::NAN;
        let mut inverted = bar(4, 104.0);
        inverted.high = 90.0;
        let raw = vec![bar(2, 102.0), bar(0, 100.0), bar(2, 999.0), void, inverted, bar(1, 101.0)];

        let report = ingest(raw);
        let closes: Vec<f64> = report.bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![100.0, 101.0, 102.0]);
        assert_eq!(report.duplicates_dropped, 1);
        assert_eq!(report.void_dropped, 1);
        assert_eq!(report.insane_dropped, 1);
        assert_eq!(report.dropped(), 3);
    }

    #[test]
    fn resample_aggregates_four_hour_buckets() {
        let hourly: Vec<Bar> = (0..8).map(|h| bar(h, 100.0 + h as f64)).collect();
        let four = resample(&hourly, 4);

        assert_eq!(four.len(), 2);
        assert_eq!(four[0].timestamp, ts(0));
        assert_eq!(four[0].open, 100.0);
        assert_eq!(four[0].close, 103.0);
        assert_eq!(four[0].high, 104.0);
        assert_eq!(four[0].low, 99.0);
        assert_eq!(four[0].volume, 400);
        assert_eq!(four[1].timestamp, ts(4));
        assert_eq!(four[1].close, 107.0);
    }

    #[test]
    fn resample_partial_bucket_keeps_bucket_start() {
        let hourly = vec![bar(5, 100.0), bar(6, 101.0), bar(9, 102.0)];
        let four = resample(&hourly, 4);
        assert_eq!(four.len(), 2);
        assert_eq!(four[0].timestamp, ts(4));
        assert_eq!(four[0].close, 101.0);
        assert_eq!(four[1].timestamp, ts(8));
    }

    #[test]
    fn dataset_hash_is_deterministic_and_sensitive() {
        let mut a = BTreeMap::new();
        a.insert("X".to_string(), vec![bar(0, 100.0), bar(1, 101.0)]);
        let b = a.clone();
        assert_eq!(dataset_hash(&a), dataset_hash(&b));

        let mut c = a.clone();
        if let Some(bars) = c.get_mut("X") {
            bars[1].close = 101.5;
        }
        assert_ne!(dataset_hash(&a), dataset_hash(&c));
        assert_eq!(dataset_hash(&a).len(), 64);
    }

    #[test]
    fn load_universe_records_failures_and_continues() {
        let provider = InMemoryProvider::new().with_series("GOOD", vec![bar(1, 101.0), bar(0, 100.0)]);
        let window = FetchWindow::new(ts(24), 30, Interval::OneHour);
        let symbols = vec!["GOOD".to_string(), "MISSING".to_string()];

        let universe = load_universe(&symbols, &provider, &window);
        assert_eq!(universe.bars.len(), 1);
        assert_eq!(universe.bars["GOOD"][0].close, 100.0);
        assert_eq!(universe.failures.len(), 1);
        assert_eq!(universe.failures[0].symbol, "MISSING");
        assert_eq!(universe.last_bar["GOOD"], ts(1));
        assert_eq!(universe.provider, "memory");
    }
}
