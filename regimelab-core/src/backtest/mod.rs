//! Bar-by-bar replay of a predictor against history.
//!
//! State machine: FLAT → LONG/SHORT open → FLAT. Per bar:
//! 1. Exits on the close (stop before target), filled at the level price
//! 2. Warm-up bars are skipped until a full lookback window exists
//! 3. Predict on the trailing window; failures skip the bar
//! 4. Record accuracy against the next close when one exists
//! 5. Enter at the close when flat, not on the final bar, and confident enough
//!
//! Any position still open after the final bar is closed at the last close.

pub mod exits;
pub mod metrics;
pub mod predictor;

pub use exits::{ExitLevels, ExitPolicy, PositionSizing};
pub use metrics::BacktestMetrics;
pub use predictor::{Predictor, ScoringPredictor};

use crate::domain::{Bar, Direction, ExitReason, Position, TradeRecord};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("no bars to replay")]
    EmptySeries,

    #[error("lookback {lookback} is shorter than the predictor warm-up of {warmup} bars")]
    LookbackBelowWarmup { lookback: usize, warmup: usize },

    #[error("{symbol}: replay completed without any trades ({predictions} predictions)")]
    NoTrades { symbol: String, predictions: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Bars in the trailing window handed to the predictor.
    pub lookback: usize,
    /// Entries require confidence strictly above this.
    pub min_confidence: f64,
    pub initial_capital: f64,
    pub exit_policy: ExitPolicy,
    pub sizing: PositionSizing,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            lookback: 60,
            min_confidence: 20.0,
            initial_capital: 10_000.0,
            exit_policy: ExitPolicy::default(),
            sizing: PositionSizing::default(),
        }
    }
}

/// One prediction made during replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub bar_index: usize,
    pub timestamp: NaiveDateTime,
    pub direction: Direction,
    pub score: f64,
    pub confidence: f64,
    /// Realized move to the next bar; `None` on the final bar.
    pub actual: Option<Direction>,
    pub correct: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub symbol: String,
    pub predictor: String,
    pub config: BacktestConfig,
    pub bars: usize,
    pub trades: Vec<TradeRecord>,
    pub predictions: Vec<PredictionRecord>,
    pub metrics: BacktestMetrics,
}

#[derive(Debug, Clone, Default)]
pub struct Backtester {
    config: BacktestConfig,
}

impl Backtester {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn run(
        &self,
        symbol: &str,
        bars: &[Bar],
        predictor: &dyn Predictor,
    ) -> Result<BacktestReport, BacktestError> {
        let cfg = &self.config;
        if bars.is_empty() {
            return Err(BacktestError::EmptySeries);
        }
        if cfg.lookback < predictor.warmup() {
            return Err(BacktestError::LookbackBelowWarmup {
                lookback: cfg.lookback,
                warmup: predictor.warmup(),
            });
        }

        let n = bars.len();
        let mut equity = cfg.initial_capital;
        let mut position: Option<Position> = None;
        let mut trades: Vec<TradeRecord> = Vec::new();
        let mut predictions: Vec<PredictionRecord> = Vec::new();
        let mut skipped_bars = 0;

        for i in 0..n {
            let bar = &bars[i];

            // 1. Exits
            if let Some(pos) = position.take() {
                match exit_fill(&pos, bar.close) {
                    Some((price, reason)) => {
                        let trade = close_position(symbol, pos, i, bar, price, reason);
                        equity += trade.pnl;
                        trades.push(trade);
                    }
                    None => position = Some(pos),
                }
            }

            // 2. Warm-up
            if i + 1 < cfg.lookback {
                continue;
            }
            // 3. Predict
            let prediction = match predictor.predict_at(bars, i, cfg.lookback) {
                Ok(p) => p,
                Err(e) => {
                    skipped_bars += 1;
                    debug!(symbol, bar = i, error = %e, "prediction failed; bar skipped");
                    continue;
                }
            };

            // 4. Accuracy bookkeeping
            let actual = bars.get(i + 1).map(|next| Direction::of_move(bar.close, next.close));
            predictions.push(PredictionRecord {
                bar_index: i,
                timestamp: bar.timestamp,
                direction: prediction.direction,
                score: prediction.score,
                confidence: prediction.confidence,
                actual,
                correct: actual.map(|a| a == prediction.direction),
            });

            // 5. Entry
            let is_final_bar = i + 1 == n;
            if position.is_some() || is_final_bar || prediction.confidence <= cfg.min_confidence {
                continue;
            }
            let levels = cfg.exit_policy.levels(
                prediction.direction,
                bar.close,
                prediction.indicators.atr,
                prediction.indicators.atr_percent,
            );
            let quantity = cfg.sizing.quantity(equity, levels.stop_distance);
            if !(quantity.is_finite() && quantity > 0.0) {
                debug!(symbol, bar = i, stop_distance = levels.stop_distance, "entry skipped: no valid size");
                continue;
            }
            debug!(
                symbol,
                bar = i,
                side = %prediction.direction,
                entry = bar.close,
                stop = levels.stop_loss,
                target = levels.take_profit,
                quantity,
                "position opened"
            );
            position = Some(Position {
                side: prediction.direction,
                entry_price: bar.close,
                stop_loss: levels.stop_loss,
                take_profit: levels.take_profit,
                quantity,
                entry_bar: i,
                entry_time: bar.timestamp,
                entry_confidence: prediction.confidence,
            });
        }

        // End of data: force close at the final close
        if let Some(pos) = position.take() {
            let last = &bars[n - 1];
            let trade = close_position(symbol, pos, n - 1, last, last.close, ExitReason::EndOfPeriod);
            trades.push(trade);
        }

        if trades.is_empty() {
            return Err(BacktestError::NoTrades {
                symbol: symbol.to_string(),
                predictions: predictions.len(),
            });
        }

        let metrics =
            BacktestMetrics::compute(&trades, &predictions, cfg.initial_capital, skipped_bars);
        info!(
            symbol,
            predictor = predictor.name(),
            trades = metrics.trade_count,
            win_rate = metrics.win_rate,
            total_return = metrics.total_return,
            accuracy = metrics.prediction_accuracy,
            "backtest complete"
        );

        Ok(BacktestReport {
            symbol: symbol.to_string(),
            predictor: predictor.name().to_string(),
            config: cfg.clone(),
            bars: n,
            trades,
            predictions,
            metrics,
        })
    }
}

/// Fill price and reason if `close` triggers an exit. The stop is checked first.
fn exit_fill(pos: &Position, close: f64) -> Option<(f64, ExitReason)> {
    if pos.stop_hit(close) {
        Some((pos.stop_loss, ExitReason::StopLoss))
    } else if pos.target_hit(close) {
        Some((pos.take_profit, ExitReason::TakeProfit))
    } else {
        None
    }
}

fn close_position(
    symbol: &str,
    pos: Position,
    exit_bar: usize,
    bar: &Bar,
    exit_price: f64,
    reason: ExitReason,
) -> TradeRecord {
    let sign = pos.side.sign();
    let pnl = sign * (exit_price - pos.entry_price) * pos.quantity;
    let pnl_pct = if pos.entry_price != 0.0 {
        sign * (exit_price - pos.entry_price) / pos.entry_price * 100.0
    } else {
        0.0
    };
    debug!(symbol, exit_bar, %reason, exit_price, pnl, "position closed");

    TradeRecord {
        symbol: symbol.to_string(),
        side: pos.side,
        entry_bar: pos.entry_bar,
        entry_time: pos.entry_time,
        entry_price: pos.entry_price,
        entry_confidence: pos.entry_confidence,
        stop_loss: pos.stop_loss,
        take_profit: pos.take_profit,
        exit_bar,
        exit_time: bar.timestamp,
        exit_price,
        exit_reason: reason,
        quantity: pos.quantity,
        pnl,
        pnl_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{test_timestamp, FeatureError, FeatureSnapshot};
    use crate::indicators::make_bars;
    use crate::scoring::ScoringEngine;
    use crate::weights::{WeightDistribution, WeightSelection, WeightSource};
    use crate::scoring::Prediction;

    /// Returns a fixed score for every bar, with ATR from a fixed percent of close.
    struct FixedScore {
        score: f64,
        warmup: usize,
    }

    impl Predictor for FixedScore {
        fn name(&self) -> &str {
            "fixed"
        }

        fn warmup(&self) -> usize {
            self.warmup
        }

        fn predict(&self, window: &[Bar]) -> Result<Prediction, FeatureError> {
            let last = window.last().ok_or(FeatureError::EmptyWindow)?;
            let snapshot = FeatureSnapshot::neutral(window.len() - 1, test_timestamp(), last.close);
            let mut p = ScoringEngine.predict(
                &snapshot,
                &WeightSelection {
                    weights: WeightDistribution::standard(),
                    source: WeightSource::Static,
                },
            );
            p.score = self.score;
            p.direction = ScoringEngine::direction_for(self.score);
            p.confidence = ScoringEngine::confidence_for(self.score);
            Ok(p)
        }
    }

    fn config(lookback: usize) -> BacktestConfig {
        BacktestConfig {
            lookback,
            exit_policy: ExitPolicy::FixedPercent { stop_pct: 2.0 },
            sizing: PositionSizing::FixedQuantity { quantity: 10.0 },
            ..BacktestConfig::default()
        }
    }

    #[test]
    fn empty_series_rejected() {
        let bt = Backtester::new(config(3));
        let err = bt.run("X", &[], &FixedScore { score: 0.9, warmup: 1 }).unwrap_err();
        assert_eq!(err, BacktestError::EmptySeries);
    }

    #[test]
    fn lookback_below_warmup_rejected() {
        let bt = Backtester::new(config(3));
        let bars = make_bars(&[100.0; 10]);
        let err = bt.run("X", &bars, &FixedScore { score: 0.9, warmup: 5 }).unwrap_err();
        assert_eq!(
            err,
            BacktestError::LookbackBelowWarmup {
                lookback: 3,
                warmup: 5
            }
        );
    }

    #[test]
    fn take_profit_exit_fills_at_target() {
        // Entry at bar 2 (close 100), target 104
        let bars = make_bars(&[100.0, 100.0, 100.0, 101.0, 105.0, 105.0]);
        let bt = Backtester::new(config(3));
        let report = bt.run("X", &bars, &FixedScore { score: 0.9, warmup: 1 }).unwrap();

        let first = &report.trades[0];
        assert_eq!(first.entry_bar, 2);
        assert_eq!(first.exit_bar, 4);
        assert_eq!(first.exit_reason, ExitReason::TakeProfit);
        assert!((first.exit_price - 104.0).abs() < 1e-9);
        assert!((first.pnl - 40.0).abs() < 1e-9);
    }

    #[test]
    fn low_confidence_never_trades() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 101.0, 103.0, 104.0]);
        let bt = Backtester::new(config(3));
        // Score 0.4 gives confidence 20, which does not clear the threshold
        let err = bt
            .run("X", &bars, &FixedScore { score: 0.4, warmup: 1 })
            .unwrap_err();
        assert_eq!(
            err,
            BacktestError::NoTrades {
                symbol: "X".into(),
                predictions: 4
            }
        );
    }

    #[test]
    fn accuracy_recorded_except_final_bar() {
        let bars = make_bars(&[100.0, 100.0, 100.0, 101.0, 102.0, 101.0]);
        let bt = Backtester::new(config(3));
        let report = bt.run("X", &bars, &FixedScore { score: 0.9, warmup: 1 }).unwrap();

        assert_eq!(report.predictions.len(), 4);
        assert_eq!(report.predictions[0].correct, Some(true)); // 100 → 101
        assert_eq!(report.predictions[2].correct, Some(false)); // 102 → 101
        assert_eq!(report.predictions[3].actual, None);
        assert!((report.metrics.prediction_accuracy - 2.0 / 3.0).abs() < 1e-12);
    }
}
