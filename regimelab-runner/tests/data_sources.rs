//! Provider selection, CSV import through ingest, and resampling invariants.

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use std::fmt::Write as _;

use regimelab_core::domain::Bar;
use regimelab_runner::data::{ingest, resample};
use regimelab_runner::{
    load_universe, provider_for, DataSourceKind, FetchWindow, Interval, RegimeLabConfig,
};

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 2, 5)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

// ── CSV through config ───────────────────────────────────────────────

#[test]
fn csv_source_from_config_loads_and_cleans() {
    let dir = tempfile::tempdir().unwrap();
    let mut csv = String::from("timestamp,open,high,low,close,volume\n");
    for i in (0..10).rev() {
        let ts = start() + chrono::Duration::hours(4 * i);
        let close = 100.0 + i as f64;
        writeln!(csv, "{ts},{close},{},{},{close},500", close + 1.0, close - 1.0).unwrap();
    }
    // Duplicate timestamp and a row with a missing close
    writeln!(csv, "{},1,1,1,1,1", start()).unwrap();
    writeln!(csv, "{},100,101,99,,10", start() + chrono::Duration::hours(60)).unwrap();
    std::fs::write(dir.path().join("ACME.csv"), csv).unwrap();

    let config = RegimeLabConfig::from_toml(&format!(
        "[data]\nsource = \"csv\"\ncsv_dir = \"{}\"\n",
        dir.path().display().to_string().replace('\\', "/")
    ))
    .unwrap();
    assert_eq!(config.data.source, DataSourceKind::Csv);

    let provider = provider_for(&config.data).unwrap();
    let window = FetchWindow::new(start() + chrono::Duration::days(5), 30, Interval::FourHour);
    let universe = load_universe(&["ACME".to_string()], provider.as_ref(), &window);

    let bars = &universe.bars["ACME"];
    assert_eq!(bars.len(), 10);
    assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(bars[0].close, 100.0);
    assert!(universe.failures.is_empty());
}

#[test]
fn synthetic_source_from_config() {
    let config = RegimeLabConfig::from_toml("[data]\nsource = \"synthetic\"\n").unwrap();
    let provider = provider_for(&config.data).unwrap();
    let window = FetchWindow::new(start(), 20, Interval::OneDay);
    let universe = load_universe(&config.data.symbols, provider.as_ref(), &window);
    assert_eq!(universe.bars.len(), 5);
    assert_eq!(universe.symbols, config.data.symbols);
}

// ── Resampling (proptest) ────────────────────────────────────────────

fn arb_hourly() -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec((-0.01..0.01_f64, 0.0..0.005_f64, 1u64..10_000, 1i64..3), 1..80)
        .prop_map(|steps| {
            let mut close = 100.0;
            let mut ts = start();
            steps
                .into_iter()
                .map(|(ret, range, volume, gap)| {
                    let open = close;
                    close *= 1.0 + ret;
                    ts += chrono::Duration::hours(gap);
                    Bar {
                        symbol: "P".to_string(),
                        timestamp: ts,
                        open,
                        high: open.max(close) * (1.0 + range),
                        low: open.min(close) * (1.0 - range),
                        close,
                        volume,
                    }
                })
                .collect()
        })
}

proptest! {
    #[test]
    fn resample_preserves_volume_and_extremes(hourly in arb_hourly()) {
        let four = resample(&hourly, 4);

        prop_assert!(!four.is_empty());
        prop_assert!(four.len() <= hourly.len());
        prop_assert_eq!(
            four.iter().map(|b| b.volume).sum::<u64>(),
            hourly.iter().map(|b| b.volume).sum::<u64>()
        );
        let max_high = hourly.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let min_low = hourly.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        prop_assert_eq!(four.iter().map(|b| b.high).fold(f64::MIN, f64::max), max_high);
        prop_assert_eq!(four.iter().map(|b| b.low).fold(f64::MAX, f64::min), min_low);
        prop_assert_eq!(four[four.len() - 1].close, hourly[hourly.len() - 1].close);
        prop_assert!(four.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        prop_assert!(ingest(four.clone()).bars.len() == four.len());
    }
}
