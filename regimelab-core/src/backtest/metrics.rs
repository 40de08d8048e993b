//! Backtest metrics: pure functions over the trade list, prediction log and
//! realized equity curve.

use super::PredictionRecord;
use crate::domain::TradeRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    /// Sum of trade PnL over initial capital, as a fraction.
    pub total_return: f64,
    pub final_equity: f64,
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    /// Gross profit over gross loss; 0 when there are no losing trades.
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// Largest peak-to-trough decline of realized equity, as a negative fraction.
    pub max_drawdown: f64,
    pub max_consecutive_losses: usize,
    pub prediction_accuracy: f64,
    pub predictions_scored: usize,
    pub predictions_correct: usize,
    pub skipped_bars: usize,
}

impl BacktestMetrics {
    pub fn compute(
        trades: &[TradeRecord],
        predictions: &[PredictionRecord],
        initial_capital: f64,
        skipped_bars: usize,
    ) -> Self {
        let curve = equity_curve(trades, initial_capital);
        let wins = trades.iter().filter(|t| t.is_winner()).count();
        let (scored, correct) = scored_predictions(predictions);
        Self {
            total_return: total_return(trades, initial_capital),
            final_equity: curve.last().copied().unwrap_or(initial_capital),
            trade_count: trades.len(),
            wins,
            losses: trades.len() - wins,
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            max_drawdown: max_drawdown(&curve),
            max_consecutive_losses: max_consecutive_losses(trades),
            prediction_accuracy: prediction_accuracy(predictions),
            predictions_scored: scored,
            predictions_correct: correct,
            skipped_bars,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Σ pnl / initial capital.
pub fn total_return(trades: &[TradeRecord], initial_capital: f64) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }
    trades.iter().map(|t| t.pnl).sum::<f64>() / initial_capital
}

/// Realized equity after each trade, starting with initial capital.
pub fn equity_curve(trades: &[TradeRecord], initial_capital: f64) -> Vec<f64> {
    let mut curve = Vec::with_capacity(trades.len() + 1);
    let mut equity = initial_capital;
    curve.push(equity);
    for t in trades {
        equity += t.pnl;
        curve.push(equity);
    }
    curve
}

/// Fraction of trades with pnl > 0.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Gross profit / |gross loss|.
///
/// Returns 0.0 when no trade lost money, so reports stay finite.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl.abs())
        .sum();

    if gross_loss == 0.0 {
        return 0.0;
    }
    gross_profit / gross_loss
}

pub fn avg_win(trades: &[TradeRecord]) -> f64 {
    mean(trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl))
}

/// Mean pnl of non-winning trades (zero or negative).
pub fn avg_loss(trades: &[TradeRecord]) -> f64 {
    mean(trades.iter().filter(|t| t.pnl <= 0.0).map(|t| t.pnl))
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

pub fn max_consecutive_losses(trades: &[TradeRecord]) -> usize {
    let mut max = 0;
    let mut current = 0;
    for t in trades {
        if t.is_winner() {
            current = 0;
        } else {
            current += 1;
            max = max.max(current);
        }
    }
    max
}

/// Correct directional calls over predictions with a known next bar.
pub fn prediction_accuracy(predictions: &[PredictionRecord]) -> f64 {
    let (scored, correct) = scored_predictions(predictions);
    if scored == 0 {
        return 0.0;
    }
    correct as f64 / scored as f64
}

fn scored_predictions(predictions: &[PredictionRecord]) -> (usize, usize) {
    let scored = predictions.iter().filter(|p| p.correct.is_some()).count();
    let correct = predictions.iter().filter(|p| p.correct == Some(true)).count();
    (scored, correct)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
