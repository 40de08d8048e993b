//! Weighted multi-indicator scoring.
//!
//! Five category sub-scores in [0, 1] are combined with a weight distribution
//! into a score. LONG iff score > 0.5; confidence is the distance from 0.5
//! scaled to [0, 100].

pub mod prediction;

pub use prediction::{CategoryScores, KeyIndicators, Prediction};

use crate::domain::Direction;
use crate::features::FeatureSnapshot;
use crate::weights::WeightSelection;

/// Relative tolerance under which two price-scaled values are treated as equal.
pub const PRICE_EPSILON: f64 = 1e-9;

/// `a` exceeds `b` by more than rounding noise at price level `scale`.
fn above(a: f64, b: f64, scale: f64) -> bool {
    a - b > PRICE_EPSILON * scale.abs()
}

/// `clamp((raw + offset) / span, 0, 1)`: maps a raw vote count onto [0, 1].
pub fn normalize(raw: f64, offset: f64, span: f64) -> f64 {
    ((raw + offset) / span).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn direction_for(score: f64) -> Direction {
        if score > 0.5 {
            Direction::Long
        } else {
            Direction::Short
        }
    }

    pub fn confidence_for(score: f64) -> f64 {
        ((score - 0.5).abs() * 200.0).clamp(0.0, 100.0)
    }

    /// Weight-independent category sub-scores for a finite snapshot.
    pub fn category_scores(&self, s: &FeatureSnapshot) -> CategoryScores {
        CategoryScores {
            trend: trend_score(s),
            momentum: normalize(momentum_raw(s), 2.0, 4.0),
            volatility: normalize(volatility_raw(s), 1.0, 2.0),
            trend_strength: (s.adx / 40.0).clamp(0.0, 1.0),
            stochastic: normalize(stochastic_raw(s), 1.0, 2.0),
        }
    }

    pub fn predict(&self, snapshot: &FeatureSnapshot, selection: &WeightSelection) -> Prediction {
        let mut s = snapshot.clone();
        s.sanitize();

        let category_scores = self.category_scores(&s);
        let score = selection.weights.combine(category_scores.as_array());

        let mut signals = Vec::new();
        if !matches!(selection.source, crate::weights::WeightSource::Static) {
            signals.push(selection.source.describe());
        }
        for feature in &s.substituted {
            signals.push(format!("{feature} undefined, neutral value substituted"));
        }
        signals.extend(describe_conditions(&s));

        Prediction {
            bar_index: s.bar_index,
            timestamp: s.timestamp,
            close: s.close,
            direction: Self::direction_for(score),
            score,
            confidence: Self::confidence_for(score),
            category_scores,
            weights: selection.weights,
            weight_source: selection.source.clone(),
            indicators: KeyIndicators::from_snapshot(&s),
            signals,
            substituted: s.substituted,
        }
    }
}

/// Slope, SMA and EMA votes. Differences within rounding of the close are ties.
fn trend_votes(s: &FeatureSnapshot) -> [bool; 3] {
    [
        above(s.slope, 0.0, s.close),
        above(s.sma_short, s.sma_long, s.close),
        above(s.ema_short, s.ema_long, s.close),
    ]
}

fn trend_score(s: &FeatureSnapshot) -> f64 {
    trend_votes(s).iter().filter(|v| **v).count() as f64 / 3.0
}

/// +1 bullish, -1 bearish, 0 when histogram and crossover disagree or tie.
fn macd_vote(s: &FeatureSnapshot) -> f64 {
    if above(s.macd_histogram, 0.0, s.close) && above(s.macd, s.macd_signal, s.close) {
        1.0
    } else if above(0.0, s.macd_histogram, s.close) && above(s.macd_signal, s.macd, s.close) {
        -1.0
    } else {
        0.0
    }
}

/// +1 when %K is above %D, -1 below, 0 on a tie.
fn stoch_cross(s: &FeatureSnapshot) -> f64 {
    if above(s.stoch_k, s.stoch_d, 100.0) {
        1.0
    } else if above(s.stoch_d, s.stoch_k, 100.0) {
        -1.0
    } else {
        0.0
    }
}

fn momentum_raw(s: &FeatureSnapshot) -> f64 {
    let mut raw = if s.rsi < 30.0 {
        2.0
    } else if s.rsi < 50.0 {
        1.0
    } else if s.rsi > 70.0 {
        -2.0
    } else {
        0.0
    };
    raw + macd_vote(s)
}

fn volatility_raw(s: &FeatureSnapshot) -> f64 {
    let mut raw = 0.0;
    if s.bb_position < 0.2 {
        raw += 1.0;
    } else if s.bb_position > 0.8 {
        raw -= 1.0;
    }
    if s.atr_percent < 1.0 {
        raw += 1.0;
    } else if s.atr_percent > 3.0 {
        raw -= 1.0;
    }
    raw
}

fn stochastic_raw(s: &FeatureSnapshot) -> f64 {
    let mut raw = 0.0;
    if s.stoch_k < 20.0 {
        raw += 1.0;
    } else if s.stoch_k > 80.0 {
        raw -= 1.0;
    }
    raw + 0.5 * stoch_cross(s)
}

/// Human-readable description of every condition evaluated, in category order.
fn describe_conditions(s: &FeatureSnapshot) -> Vec<String> {
    let mut out = Vec::new();

    let [slope_up, sma_up, ema_up] = trend_votes(s);
    out.push(if slope_up {
        "Positive slope (bullish)".to_string()
    } else {
        "Negative slope (bearish)".to_string()
    });
    out.push(if sma_up {
        "SMA20 > SMA50 (uptrend)".to_string()
    } else {
        "SMA20 <= SMA50 (downtrend)".to_string()
    });
    out.push(if ema_up {
        "EMA12 > EMA26 (bullish)".to_string()
    } else {
        "EMA12 <= EMA26 (bearish)".to_string()
    });

    out.push(
        if s.rsi < 30.0 {
            "RSI < 30 (Oversold - Strong Buy)"
        } else if s.rsi < 50.0 {
            "RSI 30-50 (Mild Buy)"
        } else if s.rsi > 70.0 {
            "RSI > 70 (Overbought - Strong Sell)"
        } else {
            "RSI 50-70 (Neutral)"
        }
        .to_string(),
    );
    let macd = macd_vote(s);
    if macd > 0.0 {
        out.push("MACD bullish (histogram > 0, MACD > Signal)".to_string());
    } else if macd < 0.0 {
        out.push("MACD bearish (histogram < 0, MACD < Signal)".to_string());
    }

    if s.bb_position < 0.2 {
        out.push("Price near lower Bollinger Band (Support)".to_string());
    } else if s.bb_position > 0.8 {
        out.push("Price near upper Bollinger Band (Resistance)".to_string());
    } else {
        out.push(format!("Price at {:.1}% of BB range", s.bb_position * 100.0));
    }
    if s.atr_percent < 1.0 {
        out.push("Low volatility (good for trending)".to_string());
    } else if s.atr_percent > 3.0 {
        out.push("High volatility (risky)".to_string());
    }

    if s.adx > 25.0 {
        out.push(format!("Strong trend (ADX: {:.1})", s.adx));
    } else if s.adx > 20.0 {
        out.push(format!("Moderate trend (ADX: {:.1})", s.adx));
    } else {
        out.push(format!("Weak/no trend (ADX: {:.1})", s.adx));
    }

    if s.stoch_k < 20.0 {
        out.push("Stochastic oversold (< 20)".to_string());
    } else if s.stoch_k > 80.0 {
        out.push("Stochastic overbought (> 80)".to_string());
    }
    let cross = stoch_cross(s);
    if cross > 0.0 {
        out.push("K > D (Bullish crossover)".to_string());
    } else if cross < 0.0 {
        out.push("K < D (Bearish crossover)".to_string());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{test_timestamp, Feature};
    use crate::regime::RegimeClassifier;
    use crate::weights::{WeightDistribution, WeightSource};

    fn static_selection() -> WeightSelection {
        WeightSelection {
            weights: WeightDistribution::standard(),
            source: WeightSource::Static,
        }
    }

    fn neutral() -> FeatureSnapshot {
        FeatureSnapshot::neutral(0, test_timestamp(), 100.0)
    }

    #[test]
    fn normalize_clamps() {
        assert_eq!(normalize(0.0, 2.0, 4.0), 0.5);
        assert_eq!(normalize(3.0, 2.0, 4.0), 1.0);
        assert_eq!(normalize(-5.0, 1.0, 2.0), 0.0);
    }

    #[test]
    fn direction_and_confidence() {
        assert_eq!(ScoringEngine::direction_for(0.5), Direction::Short);
        assert_eq!(ScoringEngine::direction_for(0.5000001), Direction::Long);
        assert_eq!(ScoringEngine::confidence_for(0.5), 0.0);
        assert_eq!(ScoringEngine::confidence_for(1.0), 100.0);
        assert_eq!(ScoringEngine::confidence_for(0.0), 100.0);
        assert!((ScoringEngine::confidence_for(0.6) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn neutral_snapshot_sub_scores() {
        let scores = ScoringEngine.category_scores(&neutral());
        assert_eq!(scores.trend, 0.0);
        assert_eq!(scores.momentum, 0.5);
        assert_eq!(scores.volatility, 0.5);
        assert_eq!(scores.trend_strength, 0.5);
        assert_eq!(scores.stochastic, 0.5);
    }

    #[test]
    fn oversold_bullish_snapshot_is_long() {
        let mut s = neutral();
        s.slope = 0.5;
        s.sma_short = 101.0;
        s.ema_short = 101.0;
        s.rsi = 25.0;
        s.macd = 0.4;
        s.macd_signal = 0.2;
        s.macd_histogram = 0.2;
        s.bb_position = 0.1;
        s.atr_percent = 0.8;
        s.adx = 45.0;
        s.stoch_k = 15.0;
        s.stoch_d = 10.0;

        let p = ScoringEngine.predict(&s, &static_selection());
        assert_eq!(p.category_scores.trend, 1.0);
        assert_eq!(p.category_scores.momentum, 1.0);
        assert_eq!(p.category_scores.volatility, 1.0);
        assert_eq!(p.category_scores.trend_strength, 1.0);
        assert_eq!(p.category_scores.stochastic, 1.0);
        assert_eq!(p.direction, Direction::Long);
        assert!(p.confidence > 99.0);
        assert!(p.signals.contains(&"RSI < 30 (Oversold - Strong Buy)".to_string()));
        assert!(p.signals.contains(&"K > D (Bullish crossover)".to_string()));
    }

    #[test]
    fn rounding_noise_is_a_tie() {
        let mut s = FeatureSnapshot::neutral(0, test_timestamp(), 33.33);
        s.sma_short = 33.33 + 1.4e-14;
        s.sma_long = 33.33;
        s.ema_short = 33.33 - 2.1e-14;
        s.ema_long = 33.33;
        s.slope = 1e-15;
        s.macd = -2.13e-14;
        s.macd_signal = -2.14e-14;
        s.macd_histogram = 3.2e-30;
        s.stoch_k = 50.0 + 1e-12;
        s.stoch_d = 50.0;

        let p = ScoringEngine.predict(&s, &static_selection());
        assert_eq!(p.category_scores.trend, 0.0);
        assert_eq!(p.category_scores.momentum, 0.5);
        assert_eq!(p.category_scores.stochastic, 0.5);
        assert!(p.signals.contains(&"SMA20 <= SMA50 (downtrend)".to_string()));
        assert!(!p.signals.iter().any(|l| l.starts_with("MACD")));
        assert!(!p.signals.iter().any(|l| l.starts_with("K ")));
    }

    #[test]
    fn real_crossings_still_vote() {
        let mut s = FeatureSnapshot::neutral(0, test_timestamp(), 0.1);
        s.sma_short = 0.1001;
        s.sma_long = 0.1;
        assert_eq!(ScoringEngine.category_scores(&s).trend, 1.0 / 3.0);
    }

    #[test]
    fn overbought_bearish_snapshot_is_short() {
        let mut s = neutral();
        s.slope = -0.5;
        s.sma_short = 99.0;
        s.ema_short = 99.0;
        s.rsi = 80.0;
        s.macd = -0.4;
        s.macd_signal = -0.2;
        s.macd_histogram = -0.2;
        s.bb_position = 0.95;
        s.atr_percent = 4.0;
        s.adx = 0.0;
        s.stoch_k = 90.0;
        s.stoch_d = 95.0;

        let p = ScoringEngine.predict(&s, &static_selection());
        assert_eq!(p.score, 0.0);
        assert_eq!(p.direction, Direction::Short);
        assert_eq!(p.confidence, 100.0);
        assert!(p.signals.contains(&"High volatility (risky)".to_string()));
    }

    #[test]
    fn non_finite_inputs_substituted() {
        let mut s = neutral();
        s.rsi = f64::NAN;
        s.stoch_d = f64::INFINITY;
        let p = ScoringEngine.predict(&s, &static_selection());
        assert_eq!(p.indicators.rsi, 50.0);
        assert_eq!(p.substituted, vec![Feature::Rsi, Feature::StochD]);
        assert!(p.signals.iter().any(|l| l == "rsi undefined, neutral value substituted"));
        assert!(p.score.is_finite());
    }

    #[test]
    fn fallback_source_adds_signal() {
        let label = RegimeClassifier::default().classify(&neutral());
        let selection = WeightSelection {
            weights: WeightDistribution::standard(),
            source: WeightSource::UntrainedFallback { label },
        };
        let p = ScoringEngine.predict(&neutral(), &selection);
        assert!(p.signals[0].contains("untrained"));
    }

    #[test]
    fn static_source_adds_no_source_signal() {
        let p = ScoringEngine.predict(&neutral(), &static_selection());
        assert_eq!(p.signals[0], "Negative slope (bearish)");
    }
}
