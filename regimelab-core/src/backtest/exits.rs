//! Bracket levels and position sizing for entries.
//!
//! The stop distance comes from the exit policy; the target always sits at
//! twice the stop distance on the other side of the entry.

use crate::domain::Direction;
use serde::{Deserialize, Serialize};

/// Target distance as a multiple of stop distance.
pub const REWARD_RISK: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Stop a fixed percent of the entry price away.
    FixedPercent { stop_pct: f64 },
    /// Stop `stop_atr` ATRs away.
    AtrMultiple { stop_atr: f64 },
    /// Stop percent = clamp(atr_percent * factor, min_pct, max_pct).
    AtrPercentScaled {
        factor: f64,
        min_pct: f64,
        max_pct: f64,
    },
}

impl Default for ExitPolicy {
    fn default() -> Self {
        ExitPolicy::AtrPercentScaled {
            factor: 1.5,
            min_pct: 1.5,
            max_pct: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitLevels {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub stop_distance: f64,
}

impl ExitPolicy {
    pub fn stop_distance(&self, entry: f64, atr: f64, atr_percent: f64) -> f64 {
        match *self {
            ExitPolicy::FixedPercent { stop_pct } => entry * stop_pct / 100.0,
            ExitPolicy::AtrMultiple { stop_atr } => atr * stop_atr,
            ExitPolicy::AtrPercentScaled {
                factor,
                min_pct,
                max_pct,
            } => entry * (atr_percent * factor).clamp(min_pct, max_pct) / 100.0,
        }
    }

    pub fn levels(&self, side: Direction, entry: f64, atr: f64, atr_percent: f64) -> ExitLevels {
        let distance = self.stop_distance(entry, atr, atr_percent);
        let sign = side.sign();
        ExitLevels {
            stop_loss: entry - sign * distance,
            take_profit: entry + sign * REWARD_RISK * distance,
            stop_distance: distance,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(format!("{name} must be positive, got {v}"))
            }
        };
        match *self {
            ExitPolicy::FixedPercent { stop_pct } => positive("stop_pct", stop_pct),
            ExitPolicy::AtrMultiple { stop_atr } => positive("stop_atr", stop_atr),
            ExitPolicy::AtrPercentScaled {
                factor,
                min_pct,
                max_pct,
            } => {
                positive("factor", factor)?;
                positive("min_pct", min_pct)?;
                positive("max_pct", max_pct)?;
                if min_pct > max_pct {
                    return Err(format!("min_pct ({min_pct}) exceeds max_pct ({max_pct})"));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PositionSizing {
    /// Risk `pct` percent of current equity between entry and stop.
    RiskPercent { pct: f64 },
    FixedQuantity { quantity: f64 },
}

impl Default for PositionSizing {
    fn default() -> Self {
        PositionSizing::RiskPercent { pct: 2.0 }
    }
}

impl PositionSizing {
    /// Quantity for an entry. Zero when no valid size exists.
    pub fn quantity(&self, equity: f64, stop_distance: f64) -> f64 {
        match *self {
            PositionSizing::RiskPercent { pct } => {
                if equity <= 0.0 || !stop_distance.is_finite() || stop_distance <= 0.0 {
                    return 0.0;
                }
                equity * pct / 100.0 / stop_distance
            }
            PositionSizing::FixedQuantity { quantity } => quantity,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let (name, v) = match *self {
            PositionSizing::RiskPercent { pct } => ("risk pct", pct),
            PositionSizing::FixedQuantity { quantity } => ("quantity", quantity),
        };
        if v.is_finite() && v > 0.0 {
            Ok(())
        } else {
            Err(format!("{name} must be positive, got {v}"))
        }
    }
}
