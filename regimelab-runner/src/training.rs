//! Training corpus construction and weight store training.
//!
//! A sample pairs the snapshot at bar t (computed on the trailing lookback
//! window only) with the realized move from t to t+1. The final bar of each
//! series has no successor and never becomes a sample.

use crate::config::RegimeLabConfig;
use crate::error::RunError;
use rayon::prelude::*;
use regimelab_core::domain::{Bar, Direction};
use regimelab_core::features::FeatureExtractor;
use regimelab_core::weights::{Catalogue, TrainingSample, WeightStore, WeightTrainer};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Samples from every symbol, in symbol order.
pub fn build_corpus(
    bars_by_symbol: &BTreeMap<String, Vec<Bar>>,
    extractor: &FeatureExtractor,
    lookback: usize,
) -> Vec<TrainingSample> {
    let series: Vec<(&String, &Vec<Bar>)> = bars_by_symbol.iter().collect();
    let per_symbol: Vec<Vec<TrainingSample>> = series
        .par_iter()
        .map(|(symbol, bars)| symbol_samples(symbol, bars, extractor, lookback))
        .collect();
    per_symbol.into_iter().flatten().collect()
}

fn symbol_samples(
    symbol: &str,
    bars: &[Bar],
    extractor: &FeatureExtractor,
    lookback: usize,
) -> Vec<TrainingSample> {
    let first = lookback.max(extractor.warmup()).saturating_sub(1);
    let mut samples = Vec::new();
    let mut skipped = 0;

    for i in first..bars.len().saturating_sub(1) {
        match extractor.extract_at(bars, i, lookback) {
            Ok(snapshot) => samples.push(TrainingSample {
                snapshot,
                actual: Direction::of_move(bars[i].close, bars[i + 1].close),
            }),
            Err(e) => {
                skipped += 1;
                debug!(symbol, bar = i, error = %e, "sample skipped");
            }
        }
    }
    debug!(symbol, samples = samples.len(), skipped, "corpus built");
    samples
}

/// Train on a corpus and persist the store at `path`.
pub fn train_store(
    samples: &[TrainingSample],
    trainer: &WeightTrainer,
    path: &Path,
) -> Result<WeightStore, RunError> {
    let store = trainer.train(samples)?;
    store.save(path)?;
    if let Some(trained) = store.trained() {
        info!(
            path = %path.display(),
            samples = trained.sample_count,
            global_best = %trained.global_best,
            "weight store saved"
        );
    }
    Ok(store)
}

/// Corpus and trainer from config, store written to `weights.store_path`.
pub fn train_from_config(
    bars_by_symbol: &BTreeMap<String, Vec<Bar>>,
    config: &RegimeLabConfig,
) -> Result<WeightStore, RunError> {
    let extractor = config.extractor()?;
    let samples = build_corpus(bars_by_symbol, &extractor, config.backtest.lookback);
    let trainer = WeightTrainer::new(
        Catalogue::reference(),
        config.classifier(),
        config.training_method(),
    );
    train_store(&samples, &trainer, &config.weights.store_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use regimelab_core::features::FeatureConfig;

    fn bars(n: usize) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 / 4.0).sin() * 3.0;
                Bar {
                    symbol: "S".into(),
                    timestamp: base + chrono::Duration::hours(4 * i as i64),
                    open: close,
                    high: close + 0.5,
                    low: close - 0.5,
                    close,
                    volume: 1_000,
                }
            })
            .collect()
    }

    #[test]
    fn corpus_skips_warmup_and_final_bar() {
        let extractor = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        let mut map = BTreeMap::new();
        map.insert("A".to_string(), bars(100));
        map.insert("B".to_string(), bars(70));

        let samples = build_corpus(&map, &extractor, 60);
        // Bars 59..=98 for A and 59..=68 for B
        assert_eq!(samples.len(), 40 + 10);

        let a = &map["A"];
        assert_eq!(samples[0].snapshot.close, a[59].close);
        assert_eq!(samples[0].actual, Direction::of_move(a[59].close, a[60].close));
    }

    #[test]
    fn short_series_yields_no_samples() {
        let extractor = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        let mut map = BTreeMap::new();
        map.insert("A".to_string(), bars(40));
        assert!(build_corpus(&map, &extractor, 60).is_empty());
    }
}
