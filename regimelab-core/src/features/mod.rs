//! Feature snapshots: the fixed indicator set evaluated at one bar.
//!
//! A snapshot always holds a finite value for every [`Feature`]. Values that are
//! still undefined after warm-up are replaced with a neutral constant and the
//! feature is recorded in `substituted`.

pub mod extractor;

pub use extractor::{FeatureConfig, FeatureError, FeatureExtractor};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of the fixed indicator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Slope,
    SmaShort,
    SmaLong,
    EmaShort,
    EmaLong,
    Rsi,
    Macd,
    MacdSignal,
    MacdHistogram,
    BbPosition,
    Atr,
    AtrPercent,
    Adx,
    StochK,
    StochD,
    AvgVolume,
}

impl Feature {
    pub const ALL: [Feature; 16] = [
        Feature::Slope,
        Feature::SmaShort,
        Feature::SmaLong,
        Feature::EmaShort,
        Feature::EmaLong,
        Feature::Rsi,
        Feature::Macd,
        Feature::MacdSignal,
        Feature::MacdHistogram,
        Feature::BbPosition,
        Feature::Atr,
        Feature::AtrPercent,
        Feature::Adx,
        Feature::StochK,
        Feature::StochD,
        Feature::AvgVolume,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::Slope => "slope",
            Feature::SmaShort => "sma_short",
            Feature::SmaLong => "sma_long",
            Feature::EmaShort => "ema_short",
            Feature::EmaLong => "ema_long",
            Feature::Rsi => "rsi",
            Feature::Macd => "macd",
            Feature::MacdSignal => "macd_signal",
            Feature::MacdHistogram => "macd_histogram",
            Feature::BbPosition => "bb_position",
            Feature::Atr => "atr",
            Feature::AtrPercent => "atr_percent",
            Feature::Adx => "adx",
            Feature::StochK => "stoch_k",
            Feature::StochD => "stoch_d",
            Feature::AvgVolume => "avg_volume",
        }
    }

    /// Value used in place of an undefined indicator.
    pub fn neutral(&self, close: f64) -> f64 {
        match self {
            Feature::Slope => 0.0,
            Feature::SmaShort | Feature::SmaLong | Feature::EmaShort | Feature::EmaLong => close,
            Feature::Rsi => 50.0,
            Feature::Macd | Feature::MacdSignal | Feature::MacdHistogram => 0.0,
            Feature::BbPosition => 0.5,
            Feature::Atr => close * 0.02,
            Feature::AtrPercent => 2.0,
            Feature::Adx => 20.0,
            Feature::StochK | Feature::StochD => 50.0,
            Feature::AvgVolume => 0.0,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every feature evaluated at a single bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub bar_index: usize,
    pub timestamp: NaiveDateTime,
    pub close: f64,

    pub slope: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub ema_short: f64,
    pub ema_long: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub bb_position: f64,
    pub atr: f64,
    pub atr_percent: f64,
    pub adx: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub avg_volume: f64,

    /// Features that held a non-finite value and were replaced with their neutral constant.
    #[serde(default)]
    pub substituted: Vec<Feature>,
}

impl FeatureSnapshot {
    /// Snapshot with every feature at its neutral value.
    pub fn neutral(bar_index: usize, timestamp: NaiveDateTime, close: f64) -> Self {
        let mut snapshot = Self {
            bar_index,
            timestamp,
            close,
            slope: 0.0,
            sma_short: 0.0,
            sma_long: 0.0,
            ema_short: 0.0,
            ema_long: 0.0,
            rsi: 0.0,
            macd: 0.0,
            macd_signal: 0.0,
            macd_histogram: 0.0,
            bb_position: 0.0,
            atr: 0.0,
            atr_percent: 0.0,
            adx: 0.0,
            stoch_k: 0.0,
            stoch_d: 0.0,
            avg_volume: 0.0,
            substituted: Vec::new(),
        };
        for feature in Feature::ALL {
            snapshot.set(feature, feature.neutral(close));
        }
        snapshot
    }

    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Slope => self.slope,
            Feature::SmaShort => self.sma_short,
            Feature::SmaLong => self.sma_long,
            Feature::EmaShort => self.ema_short,
            Feature::EmaLong => self.ema_long,
            Feature::Rsi => self.rsi,
            Feature::Macd => self.macd,
            Feature::MacdSignal => self.macd_signal,
            Feature::MacdHistogram => self.macd_histogram,
            Feature::BbPosition => self.bb_position,
            Feature::Atr => self.atr,
            Feature::AtrPercent => self.atr_percent,
            Feature::Adx => self.adx,
            Feature::StochK => self.stoch_k,
            Feature::StochD => self.stoch_d,
            Feature::AvgVolume => self.avg_volume,
        }
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        let slot = match feature {
            Feature::Slope => &mut self.slope,
            Feature::SmaShort => &mut self.sma_short,
            Feature::SmaLong => &mut self.sma_long,
            Feature::EmaShort => &mut self.ema_short,
            Feature::EmaLong => &mut self.ema_long,
            Feature::Rsi => &mut self.rsi,
            Feature::Macd => &mut self.macd,
            Feature::MacdSignal => &mut self.macd_signal,
            Feature::MacdHistogram => &mut self.macd_histogram,
            Feature::BbPosition => &mut self.bb_position,
            Feature::Atr => &mut self.atr,
            Feature::AtrPercent => &mut self.atr_percent,
            Feature::Adx => &mut self.adx,
            Feature::StochK => &mut self.stoch_k,
            Feature::StochD => &mut self.stoch_d,
            Feature::AvgVolume => &mut self.avg_volume,
        };
        *slot = value;
    }

    /// Replace every non-finite feature with its neutral value.
    ///
    /// Returns the features replaced by this call; they are also appended to
    /// `substituted`.
    pub fn sanitize(&mut self) -> Vec<Feature> {
        let mut replaced = Vec::new();
        for feature in Feature::ALL {
            if !self.get(feature).is_finite() {
                self.set(feature, feature.neutral(self.close));
                replaced.push(feature);
                if !self.substituted.contains(&feature) {
                    self.substituted.push(feature);
                }
            }
        }
        replaced
    }

    pub fn is_substituted(&self, feature: Feature) -> bool {
        self.substituted.contains(&feature)
    }

    pub fn is_finite(&self) -> bool {
        Feature::ALL.iter().all(|f| self.get(*f).is_finite())
    }
}

#[cfg(test)]
pub(crate) fn test_timestamp() -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_features_listed_once() {
        let mut names: Vec<_> = Feature::ALL.iter().map(|f| f.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 16);
    }

    #[test]
    fn neutral_snapshot_values() {
        let s = FeatureSnapshot::neutral(0, test_timestamp(), 250.0);
        assert_eq!(s.rsi, 50.0);
        assert_eq!(s.sma_long, 250.0);
        assert_eq!(s.bb_position, 0.5);
        assert_eq!(s.atr, 5.0);
        assert_eq!(s.atr_percent, 2.0);
        assert_eq!(s.adx, 20.0);
        assert!(s.substituted.is_empty());
        assert!(s.is_finite());
    }

    #[test]
    fn get_set_roundtrip_every_feature() {
        let mut s = FeatureSnapshot::neutral(0, test_timestamp(), 100.0);
        for (i, feature) in Feature::ALL.iter().enumerate() {
            s.set(*feature, i as f64 + 0.5);
        }
        for (i, feature) in Feature::ALL.iter().enumerate() {
            assert_eq!(s.get(*feature), i as f64 + 0.5);
        }
    }

    #[test]
    fn sanitize_replaces_and_records() {
        let mut s = FeatureSnapshot::neutral(3, test_timestamp(), 100.0);
        s.stoch_k = f64::NAN;
        s.adx = f64::INFINITY;

        let replaced = s.sanitize();
        assert_eq!(replaced, vec![Feature::Adx, Feature::StochK]);
        assert_eq!(s.stoch_k, 50.0);
        assert_eq!(s.adx, 20.0);
        assert!(s.is_substituted(Feature::StochK));

        // A second pass finds nothing new
        assert!(s.sanitize().is_empty());
        assert_eq!(s.substituted.len(), 2);
    }

    #[test]
    fn feature_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Feature::MacdHistogram).unwrap(),
            "\"macd_histogram\""
        );
        assert_eq!(Feature::AtrPercent.to_string(), "atr_percent");
    }
}
