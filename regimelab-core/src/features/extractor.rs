//! Feature extraction: bar window in, [`FeatureSnapshot`] at the last bar out.

use super::{Feature, FeatureSnapshot};
use crate::domain::Bar;
use crate::indicators::atr::atr_percent;
use crate::indicators::{
    closes, last, linear_slope, Adx, Atr, Bollinger, Ema, Indicator, Macd, Rsi, Sma, Stochastic,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("insufficient data: {required} bars required, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error("empty bar window")]
    EmptyWindow,

    #[error("bar {bar_index} has a non-finite close")]
    NonFiniteClose { bar_index: usize },

    #[error("invalid feature config: {0}")]
    InvalidConfig(String),
}

/// Indicator periods for the feature set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub sma_short: usize,
    pub sma_long: usize,
    pub ema_short: usize,
    pub ema_long: usize,
    pub rsi: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub atr: usize,
    pub adx: usize,
    pub stoch_k: usize,
    pub stoch_smooth: usize,
    pub stoch_d: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sma_short: 20,
            sma_long: 50,
            ema_short: 12,
            ema_long: 26,
            rsi: 14,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr: 14,
            adx: 14,
            stoch_k: 14,
            stoch_smooth: 3,
            stoch_d: 3,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), FeatureError> {
        let periods = [
            ("sma_short", self.sma_short),
            ("sma_long", self.sma_long),
            ("ema_short", self.ema_short),
            ("ema_long", self.ema_long),
            ("rsi", self.rsi),
            ("macd_signal", self.macd_signal),
            ("atr", self.atr),
            ("adx", self.adx),
            ("stoch_k", self.stoch_k),
            ("stoch_smooth", self.stoch_smooth),
            ("stoch_d", self.stoch_d),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, p)| *p == 0) {
            return Err(FeatureError::InvalidConfig(format!("{name} period must be >= 1")));
        }
        if self.bb_period < 2 {
            return Err(FeatureError::InvalidConfig(
                "bb_period must be >= 2".to_string(),
            ));
        }
        if self.ema_short >= self.ema_long {
            return Err(FeatureError::InvalidConfig(format!(
                "ema_short ({}) must be below ema_long ({})",
                self.ema_short, self.ema_long
            )));
        }
        if !self.bb_std_dev.is_finite() || self.bb_std_dev <= 0.0 {
            return Err(FeatureError::InvalidConfig(format!(
                "bb_std_dev must be positive, got {}",
                self.bb_std_dev
            )));
        }
        Ok(())
    }
}

/// Computes the full feature set over a trailing bar window.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    sma_short: Sma,
    sma_long: Sma,
    ema_short: Ema,
    ema_long: Ema,
    rsi: Rsi,
    macd: Macd,
    bollinger: Bollinger,
    atr: Atr,
    adx: Adx,
    stochastic: Stochastic,
    warmup: usize,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Result<Self, FeatureError> {
        config.validate()?;

        let sma_short = Sma::new(config.sma_short);
        let sma_long = Sma::new(config.sma_long);
        let ema_short = Ema::new(config.ema_short);
        let ema_long = Ema::new(config.ema_long);
        let rsi = Rsi::new(config.rsi);
        let macd = Macd::new(config.ema_short, config.ema_long, config.macd_signal);
        let bollinger = Bollinger::new(config.bb_period, config.bb_std_dev);
        let atr = Atr::new(config.atr);
        let adx = Adx::new(config.adx);
        let stochastic = Stochastic::new(config.stoch_k, config.stoch_smooth, config.stoch_d);

        let warmup = [
            sma_short.lookback(),
            sma_long.lookback(),
            ema_short.lookback(),
            ema_long.lookback(),
            rsi.lookback(),
            macd.histogram_lookback(),
            bollinger.lookback(),
            atr.lookback(),
            adx.lookback(),
            stochastic.lookback() + config.stoch_d - 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1;

        Ok(Self {
            config,
            sma_short,
            sma_long,
            ema_short,
            ema_long,
            rsi,
            macd,
            bollinger,
            atr,
            adx,
            stochastic,
            warmup,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Minimum window length that defines every indicator.
    pub fn warmup(&self) -> usize {
        self.warmup
    }

    /// Snapshot at the last bar of `window`.
    pub fn extract(&self, window: &[Bar]) -> Result<FeatureSnapshot, FeatureError> {
        let Some(current) = window.last() else {
            return Err(FeatureError::EmptyWindow);
        };
        self.snapshot(window, window.len() - 1, current)
    }

    /// Snapshot at `bars[index]`, computed over the trailing `lookback` bars.
    pub fn extract_at(
        &self,
        bars: &[Bar],
        index: usize,
        lookback: usize,
    ) -> Result<FeatureSnapshot, FeatureError> {
        if bars.is_empty() || lookback == 0 {
            return Err(FeatureError::EmptyWindow);
        }
        if index >= bars.len() {
            return Err(FeatureError::InsufficientData {
                required: index + 1,
                available: bars.len(),
            });
        }
        let start = (index + 1).saturating_sub(lookback);
        let window = &bars[start..=index];
        self.snapshot(window, index, &bars[index])
    }

    fn snapshot(
        &self,
        window: &[Bar],
        bar_index: usize,
        current: &Bar,
    ) -> Result<FeatureSnapshot, FeatureError> {
        if window.len() < self.warmup {
            return Err(FeatureError::InsufficientData {
                required: self.warmup,
                available: window.len(),
            });
        }
        let close = current.close;
        if !close.is_finite() {
            return Err(FeatureError::NonFiniteClose { bar_index });
        }

        let macd = self.macd.compute_all(window);
        let bands = self.bollinger.compute_all(window);
        let stoch = self.stochastic.compute_all(window);
        let atr = last(&self.atr.compute(window));

        let mut snapshot = FeatureSnapshot::neutral(bar_index, current.timestamp, close);
        let values = [
            (Feature::Slope, linear_slope(&closes(window))),
            (Feature::SmaShort, last(&self.sma_short.compute(window))),
            (Feature::SmaLong, last(&self.sma_long.compute(window))),
            (Feature::EmaShort, last(&self.ema_short.compute(window))),
            (Feature::EmaLong, last(&self.ema_long.compute(window))),
            (Feature::Rsi, last(&self.rsi.compute(window))),
            (Feature::Macd, last(&macd.line)),
            (Feature::MacdSignal, last(&macd.signal)),
            (Feature::MacdHistogram, last(&macd.histogram)),
            (Feature::BbPosition, last(&bands.position)),
            (Feature::Atr, atr),
            (Feature::AtrPercent, atr_percent(atr, close)),
            (Feature::Adx, last(&self.adx.compute(window))),
            (Feature::StochK, last(&stoch.k)),
            (Feature::StochD, last(&stoch.d)),
            (Feature::AvgVolume, average_volume(window)),
        ];
        for (feature, value) in values {
            snapshot.set(feature, value);
        }

        let replaced = snapshot.sanitize();
        if !replaced.is_empty() {
            trace!(bar_index, ?replaced, "undefined indicators replaced with neutral values");
        }
        Ok(snapshot)
    }
}

fn average_volume(window: &[Bar]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    window.iter().map(|b| b.volume as f64).sum::<f64>() / window.len() as f64
}
