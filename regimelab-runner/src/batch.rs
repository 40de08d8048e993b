//! Multi-ticker replay and static-vs-adaptive comparison.
//!
//! All bars are loaded before replay starts; tickers then replay in parallel
//! with Rayon. A ticker that fails to load or replay becomes an outcome entry
//! and the batch continues.

use crate::data::{load_universe, DataProvider, FetchWindow, LoadedUniverse};
use crate::error::RunError;
use rayon::prelude::*;
use regimelab_core::backtest::{
    BacktestConfig, BacktestError, BacktestMetrics, BacktestReport, Backtester, Predictor,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Result of replaying one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickerOutcome {
    Completed { report: Box<BacktestReport> },
    /// Replay ran but never met the entry threshold.
    NoTrades { symbol: String, predictions: usize },
    Failed { symbol: String, error: String },
}

impl TickerOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            TickerOutcome::Completed { report } => &report.symbol,
            TickerOutcome::NoTrades { symbol, .. } | TickerOutcome::Failed { symbol, .. } => symbol,
        }
    }

    pub fn report(&self) -> Option<&BacktestReport> {
        match self {
            TickerOutcome::Completed { report } => Some(&**report),
            _ => None,
        }
    }
}

/// Aggregates over completed tickers. Averages are zero when none completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub tickers: usize,
    pub completed: usize,
    pub no_trades: usize,
    pub failed: usize,
    pub total_trades: usize,
    pub avg_total_return: f64,
    pub avg_win_rate: f64,
    pub avg_accuracy: f64,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[TickerOutcome]) -> Self {
        let metrics: Vec<&BacktestMetrics> = outcomes
            .iter()
            .filter_map(|o| o.report().map(|r| &r.metrics))
            .collect();

        Self {
            tickers: outcomes.len(),
            completed: metrics.len(),
            no_trades: outcomes
                .iter()
                .filter(|o| matches!(o, TickerOutcome::NoTrades { .. }))
                .count(),
            failed: outcomes
                .iter()
                .filter(|o| matches!(o, TickerOutcome::Failed { .. }))
                .count(),
            total_trades: metrics.iter().map(|m| m.trade_count).sum(),
            avg_total_return: mean(metrics.iter().map(|m| m.total_return)),
            avg_win_rate: mean(metrics.iter().map(|m| m.win_rate)),
            avg_accuracy: mean(metrics.iter().map(|m| m.prediction_accuracy)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub predictor: String,
    pub dataset_hash: String,
    pub run_fingerprint: String,
    pub outcomes: Vec<TickerOutcome>,
    pub summary: BatchSummary,
}

/// Fetch every symbol, then replay them in parallel.
pub fn run_batch(
    symbols: &[String],
    provider: &dyn DataProvider,
    window: &FetchWindow,
    config: &BacktestConfig,
    predictor: &dyn Predictor,
) -> Result<BatchReport, RunError> {
    let universe = load_universe(symbols, provider, window);
    if universe.is_empty() {
        return Err(RunError::NoData {
            requested: symbols.len(),
        });
    }
    Ok(replay_universe(&universe, &Backtester::new(config.clone()), predictor))
}

/// Replay every requested symbol of an already loaded universe.
pub fn replay_universe(
    universe: &LoadedUniverse,
    backtester: &Backtester,
    predictor: &dyn Predictor,
) -> BatchReport {
    let outcomes: Vec<TickerOutcome> = universe
        .symbols
        .par_iter()
        .map(|symbol| replay_one(universe, symbol, backtester, predictor))
        .collect();
    let summary = BatchSummary::from_outcomes(&outcomes);

    info!(
        predictor = predictor.name(),
        tickers = summary.tickers,
        completed = summary.completed,
        failed = summary.failed,
        trades = summary.total_trades,
        avg_return = summary.avg_total_return,
        avg_accuracy = summary.avg_accuracy,
        "batch complete"
    );

    BatchReport {
        predictor: predictor.name().to_string(),
        dataset_hash: universe.dataset_hash.clone(),
        run_fingerprint: run_fingerprint(backtester, &[predictor.name()], &universe.dataset_hash),
        outcomes,
        summary,
    }
}

fn replay_one(
    universe: &LoadedUniverse,
    symbol: &str,
    backtester: &Backtester,
    predictor: &dyn Predictor,
) -> TickerOutcome {
    let Some(bars) = universe.bars.get(symbol) else {
        let error = universe
            .failure(symbol)
            .map(|f| f.error.clone())
            .unwrap_or_else(|| "no data loaded".to_string());
        return TickerOutcome::Failed {
            symbol: symbol.to_string(),
            error,
        };
    };

    match backtester.run(symbol, bars, predictor) {
        Ok(report) => TickerOutcome::Completed {
            report: Box::new(report),
        },
        Err(BacktestError::NoTrades { predictions, .. }) => TickerOutcome::NoTrades {
            symbol: symbol.to_string(),
            predictions,
        },
        Err(e) => {
            warn!(symbol, error = %e, "replay failed");
            TickerOutcome::Failed {
                symbol: symbol.to_string(),
                error: e.to_string(),
            }
        }
    }
}

// ── Static vs adaptive ──────────────────────────────────────────────

/// The metrics compared between weighting modes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideMetrics {
    pub accuracy: f64,
    pub win_rate: f64,
    pub total_return: f64,
    pub profit_factor: f64,
    pub trades: usize,
}

impl From<&BacktestMetrics> for SideMetrics {
    fn from(m: &BacktestMetrics) -> Self {
        Self {
            accuracy: m.prediction_accuracy,
            win_rate: m.win_rate,
            total_return: m.total_return,
            profit_factor: m.profit_factor,
            trades: m.trade_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub symbol: String,
    pub static_weights: Option<SideMetrics>,
    pub adaptive_weights: Option<SideMetrics>,
}

impl ComparisonRow {
    /// Adaptive minus static accuracy, when both sides traded.
    pub fn accuracy_delta(&self) -> Option<f64> {
        Some(self.adaptive_weights?.accuracy - self.static_weights?.accuracy)
    }

    pub fn return_delta(&self) -> Option<f64> {
        Some(self.adaptive_weights?.total_return - self.static_weights?.total_return)
    }
}

/// Means over the tickers where a side completed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SideAverages {
    pub tickers: usize,
    pub accuracy: f64,
    pub win_rate: f64,
    pub total_return: f64,
    pub profit_factor: f64,
}

impl SideAverages {
    fn over<'a>(sides: impl Iterator<Item = &'a SideMetrics> + Clone) -> Self {
        Self {
            tickers: sides.clone().count(),
            accuracy: mean(sides.clone().map(|s| s.accuracy)),
            win_rate: mean(sides.clone().map(|s| s.win_rate)),
            total_return: mean(sides.clone().map(|s| s.total_return)),
            profit_factor: mean(sides.map(|s| s.profit_factor)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Higher average accuracy and higher average return.
    AdaptiveOutperforms,
    /// Higher average accuracy only.
    AccuracyOnly,
    NoClearAdvantage,
}

impl Verdict {
    pub fn decide(static_avg: &SideAverages, adaptive_avg: &SideAverages) -> Self {
        if static_avg.tickers == 0 || adaptive_avg.tickers == 0 {
            return Verdict::NoClearAdvantage;
        }
        let better_accuracy = adaptive_avg.accuracy > static_avg.accuracy;
        let better_return = adaptive_avg.total_return > static_avg.total_return;
        match (better_accuracy, better_return) {
            (true, true) => Verdict::AdaptiveOutperforms,
            (true, false) => Verdict::AccuracyOnly,
            _ => Verdict::NoClearAdvantage,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Verdict::AdaptiveOutperforms => "adaptive weights outperform on accuracy and return",
            Verdict::AccuracyOnly => "mixed: adaptive weights improve accuracy only",
            Verdict::NoClearAdvantage => "no clear advantage: keep static weights",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightingComparison {
    pub dataset_hash: String,
    pub run_fingerprint: String,
    pub rows: Vec<ComparisonRow>,
    pub static_avg: SideAverages,
    pub adaptive_avg: SideAverages,
    pub accuracy_delta: f64,
    pub return_delta: f64,
    pub verdict: Verdict,
}

/// Replay the same universe under both predictors and compare per ticker.
pub fn compare_weighting(
    universe: &LoadedUniverse,
    backtester: &Backtester,
    static_predictor: &dyn Predictor,
    adaptive_predictor: &dyn Predictor,
) -> WeightingComparison {
    let static_batch = replay_universe(universe, backtester, static_predictor);
    let adaptive_batch = replay_universe(universe, backtester, adaptive_predictor);

    let side = |o: &TickerOutcome| o.report().map(|r| SideMetrics::from(&r.metrics));
    let rows: Vec<ComparisonRow> = static_batch
        .outcomes
        .iter()
        .zip(&adaptive_batch.outcomes)
        .map(|(s, a)| ComparisonRow {
            symbol: s.symbol().to_string(),
            static_weights: side(s),
            adaptive_weights: side(a),
        })
        .collect();

    let static_avg = SideAverages::over(rows.iter().filter_map(|r| r.static_weights.as_ref()));
    let adaptive_avg = SideAverages::over(rows.iter().filter_map(|r| r.adaptive_weights.as_ref()));
    let verdict = Verdict::decide(&static_avg, &adaptive_avg);

    info!(
        static_accuracy = static_avg.accuracy,
        adaptive_accuracy = adaptive_avg.accuracy,
        static_return = static_avg.total_return,
        adaptive_return = adaptive_avg.total_return,
        verdict = ?verdict,
        "weighting comparison complete"
    );

    WeightingComparison {
        dataset_hash: universe.dataset_hash.clone(),
        run_fingerprint: run_fingerprint(
            backtester,
            &[static_predictor.name(), adaptive_predictor.name()],
            &universe.dataset_hash,
        ),
        rows,
        static_avg,
        adaptive_avg,
        accuracy_delta: adaptive_avg.accuracy - static_avg.accuracy,
        return_delta: adaptive_avg.total_return - static_avg.total_return,
        verdict,
    }
}

/// BLAKE3 over the backtest settings, predictor names and dataset hash.
/// Reruns with the same inputs share a fingerprint.
pub fn run_fingerprint(
    backtester: &Backtester,
    predictors: &[&str],
    dataset_hash: &str,
) -> String {
    let mut hasher = blake3::Hasher::new();
    let config = serde_json::to_string(backtester.config()).unwrap_or_default();
    hasher.update(config.as_bytes());
    for name in predictors {
        hasher.update(b"\x1f");
        hasher.update(name.as_bytes());
    }
    hasher.update(b"\x1e");
    hasher.update(dataset_hash.as_bytes());
    hasher.finalize().to_hex().to_string()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
