//! Criterion benchmarks for RegimeLab hot paths.
//!
//! Benchmarks:
//! 1. Feature extraction on a single 60-bar window
//! 2. Scoring a prepared snapshot
//! 3. Full bar-by-bar replay at several series lengths
//! 4. Weight training over a prepared corpus

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use regimelab_core::backtest::{BacktestConfig, Backtester, ScoringPredictor};
use regimelab_core::domain::{Bar, Direction};
use regimelab_core::features::{FeatureConfig, FeatureExtractor};
use regimelab_core::scoring::ScoringEngine;
use regimelab_core::weights::{StaticWeights, TrainingSample, WeightProvider, WeightTrainer};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0 + (i as f64 * 0.37).cos() * 2.0;
            let open = close - 0.3;
            Bar {
                symbol: "BENCH".to_string(),
                timestamp: base + chrono::Duration::hours(4 * i as i64),
                open,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1_000_000 + (i as u64 % 500_000),
            }
        })
        .collect()
}

fn extractor() -> FeatureExtractor {
    FeatureExtractor::new(FeatureConfig::default()).unwrap()
}

// ── 1. Feature extraction ────────────────────────────────────────────

fn bench_features(c: &mut Criterion) {
    let bars = make_bars(60);
    let extractor = extractor();
    c.bench_function("extract_60_bar_window", |b| {
        b.iter(|| extractor.extract(black_box(&bars)))
    });
}

// ── 2. Scoring ───────────────────────────────────────────────────────

fn bench_scoring(c: &mut Criterion) {
    let bars = make_bars(60);
    let snapshot = extractor().extract(&bars).unwrap();
    let selection = StaticWeights::default().select(&snapshot);
    let engine = ScoringEngine::new();
    c.bench_function("score_snapshot", |b| {
        b.iter(|| engine.predict(black_box(&snapshot), black_box(&selection)))
    });
}

// ── 3. Replay ────────────────────────────────────────────────────────

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");
    group.sample_size(20);

    let predictor = ScoringPredictor::new(extractor(), Arc::new(StaticWeights::default()));
    let backtester = Backtester::new(BacktestConfig::default());

    for &bar_count in &[250, 1000, 2500] {
        let bars = make_bars(bar_count);
        group.bench_with_input(BenchmarkId::new("static", bar_count), &bar_count, |b, _| {
            b.iter(|| backtester.run("BENCH", black_box(&bars), &predictor))
        });
    }

    group.finish();
}

// ── 4. Training ──────────────────────────────────────────────────────

fn bench_training(c: &mut Criterion) {
    let bars = make_bars(1000);
    let extractor = extractor();
    let samples: Vec<TrainingSample> = (59..bars.len() - 1)
        .filter_map(|i| {
            let snapshot = extractor.extract_at(&bars, i, 60).ok()?;
            Some(TrainingSample {
                snapshot,
                actual: Direction::of_move(bars[i].close, bars[i + 1].close),
            })
        })
        .collect();
    let trainer = WeightTrainer::default();

    c.bench_function("train_reference_catalogue_940_samples", |b| {
        b.iter(|| trainer.train(black_box(&samples)))
    });
}

criterion_group!(
    benches,
    bench_features,
    bench_scoring,
    bench_replay,
    bench_training
);
criterion_main!(benches);
