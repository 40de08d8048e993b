//! The seam between replay and scoring.

use crate::domain::Bar;
use crate::features::{FeatureError, FeatureExtractor, FeatureSnapshot};
use crate::scoring::{Prediction, ScoringEngine};
use crate::weights::WeightProvider;
use std::sync::Arc;

/// Produces a prediction at the last bar of a window.
pub trait Predictor: Send + Sync {
    fn name(&self) -> &str;

    /// Minimum window length accepted by `predict`.
    fn warmup(&self) -> usize;

    /// Prediction at the last bar of `window`. `bar_index` is relative to the window.
    fn predict(&self, window: &[Bar]) -> Result<Prediction, FeatureError>;

    /// Prediction at `bars[index]` from the trailing `lookback` bars, with
    /// `bar_index` set to `index`.
    fn predict_at(
        &self,
        bars: &[Bar],
        index: usize,
        lookback: usize,
    ) -> Result<Prediction, FeatureError> {
        let start = (index + 1).saturating_sub(lookback);
        let window = bars
            .get(start..=index)
            .ok_or(FeatureError::InsufficientData {
                required: index + 1,
                available: bars.len(),
            })?;
        let mut prediction = self.predict(window)?;
        prediction.bar_index = index;
        Ok(prediction)
    }
}

/// FeatureExtractor → WeightProvider → ScoringEngine.
#[derive(Clone)]
pub struct ScoringPredictor {
    extractor: FeatureExtractor,
    weights: Arc<dyn WeightProvider>,
    engine: ScoringEngine,
}

impl ScoringPredictor {
    pub fn new(extractor: FeatureExtractor, weights: Arc<dyn WeightProvider>) -> Self {
        Self {
            extractor,
            weights,
            engine: ScoringEngine::new(),
        }
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn weights(&self) -> &dyn WeightProvider {
        self.weights.as_ref()
    }

    fn score(&self, snapshot: &FeatureSnapshot) -> Prediction {
        let selection = self.weights.select(snapshot);
        self.engine.predict(snapshot, &selection)
    }
}

impl std::fmt::Debug for ScoringPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringPredictor")
            .field("weights", &self.weights.name())
            .field("warmup", &self.extractor.warmup())
            .finish()
    }
}

impl Predictor for ScoringPredictor {
    fn name(&self) -> &str {
        self.weights.name()
    }

    fn warmup(&self) -> usize {
        self.extractor.warmup()
    }

    fn predict(&self, window: &[Bar]) -> Result<Prediction, FeatureError> {
        let snapshot = self.extractor.extract(window)?;
        Ok(self.score(&snapshot))
    }

    fn predict_at(
        &self,
        bars: &[Bar],
        index: usize,
        lookback: usize,
    ) -> Result<Prediction, FeatureError> {
        let snapshot = self.extractor.extract_at(bars, index, lookback)?;
        Ok(self.score(&snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use crate::features::FeatureConfig;
    use crate::indicators::make_bars;
    use crate::weights::StaticWeights;

    fn predictor() -> ScoringPredictor {
        ScoringPredictor::new(
            FeatureExtractor::new(FeatureConfig::default()).unwrap(),
            Arc::new(StaticWeights::default()),
        )
    }

    #[test]
    fn short_window_is_an_error() {
        let bars = make_bars(&[100.0; 20]);
        assert!(matches!(
            predictor().predict(&bars),
            Err(FeatureError::InsufficientData { required: 50, .. })
        ));
    }

    #[test]
    fn warm_window_predicts_at_last_bar() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - 0.02 * (i * i) as f64).collect();
        let p = predictor().predict(&make_bars(&closes)).unwrap();
        assert_eq!(p.bar_index, 59);
        assert_eq!(p.close, closes[59]);
        assert!((0.0..=1.0).contains(&p.score));
        assert_eq!(p.direction, ScoringEngine::direction_for(p.score));
        assert_eq!(p.confidence, ScoringEngine::confidence_for(p.score));
        assert_eq!(p.direction == Direction::Long, p.score > 0.5);
    }

    #[test]
    fn predict_at_reports_absolute_bar_index() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + (i as f64 * 0.3).sin() * 4.0).collect();
        let bars = make_bars(&closes);
        let p = predictor();

        let at = p.predict_at(&bars, 119, 60).unwrap();
        let windowed = p.predict(&bars[60..120]).unwrap();
        assert_eq!(at.bar_index, 119);
        assert_eq!(windowed.bar_index, 59);
        assert_eq!(at.score, windowed.score);
        assert_eq!(at.timestamp, bars[119].timestamp);
    }

    #[test]
    fn default_predict_at_rebases_index() {
        struct Midpoint;
        impl Predictor for Midpoint {
            fn name(&self) -> &str {
                "midpoint"
            }
            fn warmup(&self) -> usize {
                50
            }
            fn predict(&self, window: &[Bar]) -> Result<Prediction, FeatureError> {
                predictor().predict(window)
            }
        }

        let closes: Vec<f64> = (0..90).map(|i| 80.0 + i as f64 * 0.1).collect();
        let bars = make_bars(&closes);
        assert_eq!(Midpoint.predict_at(&bars, 75, 60).unwrap().bar_index, 75);
        assert!(matches!(
            Midpoint.predict_at(&bars, 90, 60),
            Err(FeatureError::InsufficientData { required: 91, available: 90 })
        ));
    }

    #[test]
    fn name_and_warmup() {
        let p = predictor();
        assert_eq!(p.name(), "static");
        assert_eq!(p.warmup(), 50);
    }
}
