//! Prediction output of the scoring engine.

use crate::backtest::exits::{ExitLevels, ExitPolicy};
use crate::domain::Direction;
use crate::features::{Feature, FeatureSnapshot};
use crate::weights::{Category, WeightDistribution, WeightSource};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Per-category sub-scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub trend: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub trend_strength: f64,
    pub stochastic: f64,
}

impl CategoryScores {
    /// Scores in [`Category::ALL`] order.
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.trend,
            self.momentum,
            self.volatility,
            self.trend_strength,
            self.stochastic,
        ]
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Trend => self.trend,
            Category::Momentum => self.momentum,
            Category::Volatility => self.volatility,
            Category::TrendStrength => self.trend_strength,
            Category::Stochastic => self.stochastic,
        }
    }
}

/// Indicator values reported alongside a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyIndicators {
    pub rsi: f64,
    pub adx: f64,
    pub macd_histogram: f64,
    pub bb_position: f64,
    pub atr: f64,
    pub atr_percent: f64,
}

impl KeyIndicators {
    pub fn from_snapshot(s: &FeatureSnapshot) -> Self {
        Self {
            rsi: s.rsi,
            adx: s.adx,
            macd_histogram: s.macd_histogram,
            bb_position: s.bb_position,
            atr: s.atr,
            atr_percent: s.atr_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub bar_index: usize,
    pub timestamp: NaiveDateTime,
    pub close: f64,

    pub direction: Direction,
    /// Weighted score in [0, 1].
    pub score: f64,
    /// Distance of the score from 0.5, scaled to [0, 100].
    pub confidence: f64,

    pub category_scores: CategoryScores,
    pub weights: WeightDistribution,
    pub weight_source: WeightSource,
    pub indicators: KeyIndicators,

    /// Informational only; never drives decisions.
    pub signals: Vec<String>,
    pub substituted: Vec<Feature>,
}

impl Prediction {
    pub fn is_long(&self) -> bool {
        self.direction.is_long()
    }

    /// Stop-loss and take-profit for an entry at this bar's close.
    pub fn trading_levels(&self, policy: &ExitPolicy) -> ExitLevels {
        policy.levels(
            self.direction,
            self.close,
            self.indicators.atr,
            self.indicators.atr_percent,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_timestamp;
    use crate::scoring::ScoringEngine;
    use crate::weights::WeightSelection;

    #[test]
    fn category_scores_follow_category_order() {
        let scores = CategoryScores {
            trend: 0.1,
            momentum: 0.2,
            volatility: 0.3,
            trend_strength: 0.4,
            stochastic: 0.5,
        };
        for (category, value) in Category::ALL.iter().zip(scores.as_array()) {
            assert_eq!(scores.get(*category), value);
        }
    }

    #[test]
    fn trading_levels_use_close_and_atr() {
        let mut s = FeatureSnapshot::neutral(0, test_timestamp(), 200.0);
        s.rsi = 20.0;
        let selection = WeightSelection {
            weights: WeightDistribution::standard(),
            source: WeightSource::Static,
        };
        let p = ScoringEngine.predict(&s, &selection);
        let levels = p.trading_levels(&ExitPolicy::AtrMultiple { stop_atr: 2.0 });
        // Neutral ATR = 2% of close = 4.0
        let expected_stop = if p.is_long() { 192.0 } else { 208.0 };
        assert!((levels.stop_loss - expected_stop).abs() < 1e-9);
    }

    #[test]
    fn prediction_serializes() {
        let s = FeatureSnapshot::neutral(5, test_timestamp(), 50.0);
        let selection = WeightSelection {
            weights: WeightDistribution::standard(),
            source: WeightSource::Static,
        };
        let p = ScoringEngine.predict(&s, &selection);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"direction\":\"SHORT\""));
        let back: Prediction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.bar_index, 5);
        assert_eq!(back.weight_source, WeightSource::Static);
    }
}
