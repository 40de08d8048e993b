//! Prediction on the most recent bar, with bracket levels and sizing.

use crate::config::{RegimeLabConfig, WeightMode};
use crate::error::RunError;
use chrono::NaiveDateTime;
use regimelab_core::backtest::{ExitLevels, Predictor, ScoringPredictor};
use regimelab_core::domain::{Bar, Direction};
use regimelab_core::features::FeatureError;
use regimelab_core::regime::{RegimeLabel, WeightBucket};
use regimelab_core::scoring::Prediction;
use regimelab_core::weights::{
    RegimeAdaptiveWeights, StaticWeights, VolatilityAdjusted, WeightProvider, WeightStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Scoring predictor for a weighting mode. Adaptive mode loads the store at
/// `weights.store_path`; `weights.volatility.enabled` wraps either mode in
/// [`VolatilityAdjusted`].
pub fn predictor_for(
    config: &RegimeLabConfig,
    mode: WeightMode,
) -> Result<ScoringPredictor, RunError> {
    let weights: Arc<dyn WeightProvider> = match mode {
        WeightMode::Static => Arc::new(StaticWeights::default()),
        WeightMode::Adaptive => {
            let store = WeightStore::load(&config.weights.store_path)?;
            Arc::new(RegimeAdaptiveWeights::new(Arc::new(store), config.classifier()))
        }
    };
    let volatility = &config.weights.volatility;
    let weights: Arc<dyn WeightProvider> = if volatility.enabled {
        Arc::new(VolatilityAdjusted::new(weights, volatility.bands()))
    } else {
        weights
    };
    Ok(ScoringPredictor::new(config.extractor()?, weights))
}

/// What the latest bar says and what an entry would look like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub close: f64,
    pub direction: Direction,
    pub confidence: f64,
    pub regime: RegimeLabel,
    pub bucket: WeightBucket,
    pub levels: ExitLevels,
    /// Quantity an entry would take at the configured sizing and capital.
    pub quantity: f64,
    /// Confidence clears the entry threshold.
    pub actionable: bool,
    pub prediction: Prediction,
}

/// Score the trailing lookback window ending at the last bar.
pub fn predict_latest(
    symbol: &str,
    bars: &[Bar],
    predictor: &dyn Predictor,
    config: &RegimeLabConfig,
) -> Result<SignalReport, RunError> {
    let last = bars.last().ok_or(FeatureError::EmptyWindow)?;
    let prediction = predictor.predict_at(bars, bars.len() - 1, config.backtest.lookback)?;

    let regime = prediction.weight_source.regime().unwrap_or_else(|| {
        config
            .classifier()
            .classify_values(prediction.indicators.adx, prediction.indicators.atr_percent)
    });
    let levels = prediction.trading_levels(&config.risk.exit_policy);
    let quantity = config
        .risk
        .sizing
        .quantity(config.backtest.initial_capital, levels.stop_distance);
    let actionable = prediction.confidence > config.backtest.min_confidence;

    info!(
        symbol,
        direction = %prediction.direction,
        confidence = prediction.confidence,
        regime = %regime,
        source = %prediction.weight_source.describe(),
        actionable,
        "latest prediction"
    );

    Ok(SignalReport {
        symbol: symbol.to_string(),
        timestamp: last.timestamp,
        close: last.close,
        direction: prediction.direction,
        confidence: prediction.confidence,
        regime,
        bucket: regime.bucket(),
        levels,
        quantity,
        actionable,
        prediction,
    })
}
