//! Volatility-level reweighting applied on top of any weight provider.
//!
//! High volatility leans on trend strength and volatility measures and caps
//! momentum's share; low volatility leans on momentum and trend. Normal
//! volatility leaves the weights untouched.

use super::provider::{WeightProvider, WeightSelection};
use super::WeightDistribution;
use crate::features::FeatureSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityLevel {
    Low,
    Normal,
    High,
}

impl fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VolatilityLevel::Low => "low",
            VolatilityLevel::Normal => "normal",
            VolatilityLevel::High => "high",
        })
    }
}

/// ATR% cut-offs: below `low_atr_pct` is low, above `high_atr_pct` is high.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityBands {
    pub low_atr_pct: f64,
    pub high_atr_pct: f64,
}

impl Default for VolatilityBands {
    fn default() -> Self {
        Self {
            low_atr_pct: 1.0,
            high_atr_pct: 2.5,
        }
    }
}

impl VolatilityBands {
    /// Both bounds inclusive to Normal. NaN reads as Normal.
    pub fn level(&self, atr_percent: f64) -> VolatilityLevel {
        if atr_percent < self.low_atr_pct {
            VolatilityLevel::Low
        } else if atr_percent > self.high_atr_pct {
            VolatilityLevel::High
        } else {
            VolatilityLevel::Normal
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let (lo, hi) = (self.low_atr_pct, self.high_atr_pct);
        if !(lo.is_finite() && hi.is_finite() && lo >= 0.0 && lo <= hi) {
            return Err(format!(
                "need 0 <= low_atr_pct <= high_atr_pct, got low={lo}, high={hi}"
            ));
        }
        Ok(())
    }
}

impl WeightDistribution {
    /// Scale, cap and floor the categories favoured at `level`, then renormalize.
    pub fn volatility_adjusted(&self, level: VolatilityLevel) -> Self {
        let [mut trend, mut momentum, mut volatility, mut trend_strength, stochastic] =
            self.as_array();
        match level {
            VolatilityLevel::Normal => return *self,
            VolatilityLevel::High => {
                trend_strength = (trend_strength * 1.5).min(0.35);
                volatility = (volatility * 1.3).min(0.30);
                momentum = (momentum * 0.8).max(0.15);
            }
            VolatilityLevel::Low => {
                momentum = (momentum * 1.3).min(0.35);
                trend = (trend * 1.2).min(0.30);
                volatility = (volatility * 0.7).max(0.10);
            }
        }
        // Each branch floors one category above zero, so the total is positive.
        Self::normalized([trend, momentum, volatility, trend_strength, stochastic])
            .unwrap_or(*self)
    }
}

/// Wraps a provider and reweights its selection for the snapshot's ATR%.
pub struct VolatilityAdjusted {
    inner: Arc<dyn WeightProvider>,
    bands: VolatilityBands,
    name: String,
}

impl VolatilityAdjusted {
    pub fn new(inner: Arc<dyn WeightProvider>, bands: VolatilityBands) -> Self {
        let name = format!("{}+volatility", inner.name());
        Self { inner, bands, name }
    }

    pub fn bands(&self) -> &VolatilityBands {
        &self.bands
    }
}

impl WeightProvider for VolatilityAdjusted {
    fn name(&self) -> &str {
        &self.name
    }

    fn select(&self, snapshot: &FeatureSnapshot) -> WeightSelection {
        let mut selection = self.inner.select(snapshot);
        let level = self.bands.level(snapshot.atr_percent);
        if level != VolatilityLevel::Normal {
            selection.weights = selection.weights.volatility_adjusted(level);
            debug!(
                %level,
                atr_percent = snapshot.atr_percent,
                bar_index = snapshot.bar_index,
                "volatility-adjusted weights"
            );
        }
        selection
    }
}
