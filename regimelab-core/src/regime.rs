//! Market regime classification from a feature snapshot.
//!
//! Trend strength comes from ADX, volatility from ATR as a percent of close.
//! The six labels collapse to four trained weight buckets.

use crate::features::FeatureSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendRegime {
    TrendingStrong,
    TrendingWeak,
    Ranging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRegime {
    LowVol,
    HighVol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegimeLabel {
    pub trend: TrendRegime,
    pub volatility: VolatilityRegime,
}

impl RegimeLabel {
    pub fn bucket(&self) -> WeightBucket {
        match (self.trend, self.volatility) {
            (TrendRegime::TrendingStrong, _) => WeightBucket::TrendingStrong,
            (TrendRegime::TrendingWeak, _) => WeightBucket::TrendingWeak,
            (TrendRegime::Ranging, VolatilityRegime::HighVol) => WeightBucket::RangingHighVol,
            (TrendRegime::Ranging, VolatilityRegime::LowVol) => WeightBucket::RangingLowVol,
        }
    }
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trend = match self.trend {
            TrendRegime::TrendingStrong => "trending_strong",
            TrendRegime::TrendingWeak => "trending_weak",
            TrendRegime::Ranging => "ranging",
        };
        let vol = match self.volatility {
            VolatilityRegime::LowVol => "low_vol",
            VolatilityRegime::HighVol => "high_vol",
        };
        write!(f, "{trend}_{vol}")
    }
}

/// Trained weight buckets. Strong and weak trends ignore volatility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WeightBucket {
    TrendingStrong,
    TrendingWeak,
    RangingHighVol,
    RangingLowVol,
}

impl WeightBucket {
    pub const ALL: [WeightBucket; 4] = [
        WeightBucket::TrendingStrong,
        WeightBucket::TrendingWeak,
        WeightBucket::RangingHighVol,
        WeightBucket::RangingLowVol,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WeightBucket::TrendingStrong => "trending_strong",
            WeightBucket::TrendingWeak => "trending_weak",
            WeightBucket::RangingHighVol => "ranging_high_vol",
            WeightBucket::RangingLowVol => "ranging_low_vol",
        }
    }
}

impl fmt::Display for WeightBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeThresholds {
    /// ADX strictly above this is a strong trend.
    pub strong_adx: f64,
    /// ADX strictly above this (and not strong) is a weak trend.
    pub weak_adx: f64,
    /// ATR percent strictly above this is high volatility.
    pub high_vol_atr_pct: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            strong_adx: 30.0,
            weak_adx: 20.0,
            high_vol_atr_pct: 2.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegimeClassifier {
    thresholds: RegimeThresholds,
}

impl RegimeClassifier {
    pub fn new(thresholds: RegimeThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RegimeThresholds {
        &self.thresholds
    }

    pub fn classify(&self, snapshot: &FeatureSnapshot) -> RegimeLabel {
        self.classify_values(snapshot.adx, snapshot.atr_percent)
    }

    pub fn classify_values(&self, adx: f64, atr_percent: f64) -> RegimeLabel {
        let t = &self.thresholds;
        let trend = if adx > t.strong_adx {
            TrendRegime::TrendingStrong
        } else if adx > t.weak_adx {
            TrendRegime::TrendingWeak
        } else {
            TrendRegime::Ranging
        };
        let volatility = if atr_percent > t.high_vol_atr_pct {
            VolatilityRegime::HighVol
        } else {
            VolatilityRegime::LowVol
        };
        RegimeLabel { trend, volatility }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(adx: f64, atr_pct: f64) -> RegimeLabel {
        RegimeClassifier::default().classify_values(adx, atr_pct)
    }

    #[test]
    fn thresholds_are_strict() {
        assert_eq!(classify(30.0, 1.0).trend, TrendRegime::TrendingWeak);
        assert_eq!(classify(30.01, 1.0).trend, TrendRegime::TrendingStrong);
        assert_eq!(classify(20.0, 1.0).trend, TrendRegime::Ranging);
        assert_eq!(classify(10.0, 2.5).volatility, VolatilityRegime::LowVol);
        assert_eq!(classify(10.0, 2.51).volatility, VolatilityRegime::HighVol);
    }

    #[test]
    fn bucket_collapse() {
        assert_eq!(classify(35.0, 4.0).bucket(), WeightBucket::TrendingStrong);
        assert_eq!(classify(35.0, 1.0).bucket(), WeightBucket::TrendingStrong);
        assert_eq!(classify(25.0, 4.0).bucket(), WeightBucket::TrendingWeak);
        assert_eq!(classify(25.0, 1.0).bucket(), WeightBucket::TrendingWeak);
        assert_eq!(classify(15.0, 4.0).bucket(), WeightBucket::RangingHighVol);
        assert_eq!(classify(15.0, 1.0).bucket(), WeightBucket::RangingLowVol);
    }

    #[test]
    fn label_display() {
        assert_eq!(classify(40.0, 3.0).to_string(), "trending_strong_high_vol");
        assert_eq!(classify(5.0, 1.0).to_string(), "ranging_low_vol");
    }

    #[test]
    fn custom_thresholds() {
        let classifier = RegimeClassifier::new(RegimeThresholds {
            strong_adx: 40.0,
            weak_adx: 25.0,
            high_vol_atr_pct: 1.0,
        });
        let label = classifier.classify_values(35.0, 1.5);
        assert_eq!(label.trend, TrendRegime::TrendingWeak);
        assert_eq!(label.volatility, VolatilityRegime::HighVol);
    }

    #[test]
    fn bucket_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&WeightBucket::RangingHighVol).unwrap(),
            "\"ranging_high_vol\""
        );
    }
}
