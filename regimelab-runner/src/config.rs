//! TOML run configuration.
//!
//! Every section and field has a default, so an empty file is a valid config.
//!
//! ```toml
//! [backtest]
//! lookback = 60
//! min_confidence = 20.0
//!
//! [risk.exit_policy]
//! type = "atr_percent_scaled"
//! factor = 1.5
//! min_pct = 1.5
//! max_pct = 3.0
//!
//! [weights]
//! mode = "adaptive"
//! store_path = "weights/regime_weights.json"
//!
//! [weights.volatility]
//! enabled = true
//! low_atr_pct = 1.0
//! high_atr_pct = 2.5
//!
//! [data]
//! source = "yahoo"
//! interval = "4h"
//! symbols = ["AAPL", "MSFT"]
//! ```

use crate::data::{FetchWindow, Interval};
use regimelab_core::backtest::{BacktestConfig, ExitPolicy, PositionSizing};
use regimelab_core::features::{FeatureConfig, FeatureExtractor};
use regimelab_core::regime::{RegimeClassifier, RegimeThresholds};
use regimelab_core::weights::{TrainingMethod, VolatilityBands};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub lookback: usize,
    pub min_confidence: f64,
    pub initial_capital: f64,
}

impl Default for BacktestSection {
    fn default() -> Self {
        let d = BacktestConfig::default();
        Self {
            lookback: d.lookback,
            min_confidence: d.min_confidence,
            initial_capital: d.initial_capital,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSection {
    pub exit_policy: ExitPolicy,
    pub sizing: PositionSizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightMode {
    #[default]
    Static,
    Adaptive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsSection {
    pub mode: WeightMode,
    pub store_path: PathBuf,
    pub volatility: VolatilitySection,
}

impl Default for WeightsSection {
    fn default() -> Self {
        Self {
            mode: WeightMode::Static,
            store_path: PathBuf::from("weights/regime_weights.json"),
            volatility: VolatilitySection::default(),
        }
    }
}

/// Reweighting by ATR% level on top of either weight mode. Off by default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilitySection {
    pub enabled: bool,
    pub low_atr_pct: f64,
    pub high_atr_pct: f64,
}

impl Default for VolatilitySection {
    fn default() -> Self {
        let bands = VolatilityBands::default();
        Self {
            enabled: false,
            low_atr_pct: bands.low_atr_pct,
            high_atr_pct: bands.high_atr_pct,
        }
    }
}

impl VolatilitySection {
    pub fn bands(&self) -> VolatilityBands {
        VolatilityBands {
            low_atr_pct: self.low_atr_pct,
            high_atr_pct: self.high_atr_pct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMode {
    #[default]
    GlobalBest,
    PerRegime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    pub method: TrainingMode,
    /// Minimum samples for a bucket to get its own combination (per_regime).
    pub min_bucket_samples: usize,
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            method: TrainingMode::GlobalBest,
            min_bucket_samples: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    Csv,
    Synthetic,
    #[default]
    Yahoo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub source: DataSourceKind,
    pub csv_dir: PathBuf,
    pub interval: Interval,
    pub history_days: u32,
    pub symbols: Vec<String>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            source: DataSourceKind::Yahoo,
            csv_dir: PathBuf::from("data"),
            interval: Interval::FourHour,
            history_days: 90,
            symbols: ["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Complete configuration for a RegimeLab run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeLabConfig {
    pub backtest: BacktestSection,
    pub risk: RiskSection,
    pub weights: WeightsSection,
    pub regime: RegimeThresholds,
    pub training: TrainingSection,
    pub data: DataSection,
    pub features: FeatureConfig,
}

impl RegimeLabConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let extractor = self.extractor()?;
        let bt = &self.backtest;
        if bt.lookback < extractor.warmup() {
            return Err(ConfigError::Invalid(format!(
                "backtest.lookback ({}) must be at least the feature warm-up of {} bars",
                bt.lookback,
                extractor.warmup()
            )));
        }
        if !(0.0..=100.0).contains(&bt.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "backtest.min_confidence must be within [0, 100], got {}",
                bt.min_confidence
            )));
        }
        if !(bt.initial_capital.is_finite() && bt.initial_capital > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "backtest.initial_capital must be positive, got {}",
                bt.initial_capital
            )));
        }
        self.risk
            .exit_policy
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("risk.exit_policy: {e}")))?;
        self.risk
            .sizing
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("risk.sizing: {e}")))?;

        let r = &self.regime;
        if !(r.weak_adx <= r.strong_adx && r.high_vol_atr_pct > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "regime thresholds inconsistent: weak_adx={}, strong_adx={}, high_vol_atr_pct={}",
                r.weak_adx, r.strong_adx, r.high_vol_atr_pct
            )));
        }
        self.weights
            .volatility
            .bands()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("weights.volatility: {e}")))?;
        if self.training.method == TrainingMode::PerRegime && self.training.min_bucket_samples == 0 {
            return Err(ConfigError::Invalid(
                "training.min_bucket_samples must be positive for per_regime".into(),
            ));
        }
        if self.data.history_days == 0 {
            return Err(ConfigError::Invalid("data.history_days must be positive".into()));
        }
        Ok(())
    }

    pub fn extractor(&self) -> Result<FeatureExtractor, ConfigError> {
        FeatureExtractor::new(self.features.clone())
            .map_err(|e| ConfigError::Invalid(format!("features: {e}")))
    }

    pub fn classifier(&self) -> RegimeClassifier {
        RegimeClassifier::new(self.regime)
    }

    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            lookback: self.backtest.lookback,
            min_confidence: self.backtest.min_confidence,
            initial_capital: self.backtest.initial_capital,
            exit_policy: self.risk.exit_policy,
            sizing: self.risk.sizing,
        }
    }

    pub fn training_method(&self) -> TrainingMethod {
        match self.training.method {
            TrainingMode::GlobalBest => TrainingMethod::GlobalBest,
            TrainingMode::PerRegime => TrainingMethod::PerRegime {
                min_samples: self.training.min_bucket_samples,
            },
        }
    }

    /// Trailing fetch window ending now.
    pub fn fetch_window(&self) -> FetchWindow {
        FetchWindow::ending_now(self.data.history_days, self.data.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = RegimeLabConfig::from_toml("").unwrap();
        assert_eq!(config, RegimeLabConfig::default());
        assert_eq!(config.backtest.lookback, 60);
        assert_eq!(config.backtest.min_confidence, 20.0);
        assert_eq!(config.data.interval, Interval::FourHour);
        assert_eq!(config.data.history_days, 90);
        assert_eq!(config.data.symbols.len(), 5);
        assert_eq!(config.backtest_config(), BacktestConfig::default());
        assert_eq!(config.training_method(), TrainingMethod::GlobalBest);
        assert!(!config.weights.volatility.enabled);
        assert_eq!(config.weights.volatility.bands(), VolatilityBands::default());
    }

    #[test]
    fn parses_every_section() {
        let config = RegimeLabConfig::from_toml(
            r#"
            [backtest]
            lookback = 80
            min_confidence = 35.0
            initial_capital = 25000.0

            [risk.exit_policy]
            type = "fixed_percent"
            stop_pct = 2.5

            [risk.sizing]
            type = "fixed_quantity"
            quantity = 10.0

            [weights]
            mode = "adaptive"
            store_path = "out/store.json"

            [weights.volatility]
            enabled = true
            high_atr_pct = 3.0

            [regime]
            strong_adx = 35.0

            [training]
            method = "per_regime"
            min_bucket_samples = 50

            [data]
            source = "csv"
            csv_dir = "bars"
            interval = "1d"
            history_days = 365
            symbols = ["SPY"]

            [features]
            rsi = 10
            "#,
        )
        .unwrap();

        let bt = config.backtest_config();
        assert_eq!(bt.lookback, 80);
        assert_eq!(bt.exit_policy, ExitPolicy::FixedPercent { stop_pct: 2.5 });
        assert_eq!(bt.sizing, PositionSizing::FixedQuantity { quantity: 10.0 });
        assert_eq!(config.weights.mode, WeightMode::Adaptive);
        assert_eq!(config.weights.store_path, PathBuf::from("out/store.json"));
        assert!(config.weights.volatility.enabled);
        assert_eq!(
            config.weights.volatility.bands(),
            VolatilityBands {
                low_atr_pct: 1.0,
                high_atr_pct: 3.0,
            }
        );
        assert_eq!(config.regime.strong_adx, 35.0);
        assert_eq!(config.regime.weak_adx, 20.0);
        assert_eq!(
            config.training_method(),
            TrainingMethod::PerRegime { min_samples: 50 }
        );
        assert_eq!(config.data.source, DataSourceKind::Csv);
        assert_eq!(config.data.interval, Interval::OneDay);
        assert_eq!(config.data.symbols, vec!["SPY".to_string()]);
        assert_eq!(config.features.rsi, 10);
        assert_eq!(config.features.sma_long, 50);
    }

    #[test]
    fn lookback_below_warmup_rejected() {
        let err = RegimeLabConfig::from_toml("[backtest]\nlookback = 30\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("warm-up")));
    }

    #[test]
    fn out_of_range_values_rejected() {
        for toml in [
            "[backtest]\nmin_confidence = -1.0\n",
            "[backtest]\nmin_confidence = 101.0\n",
            "[backtest]\ninitial_capital = 0.0\n",
            "[risk.sizing]\ntype = \"risk_percent\"\npct = -2.0\n",
            "[risk.exit_policy]\ntype = \"atr_multiple\"\nstop_atr = 0.0\n",
            "[regime]\nweak_adx = 40.0\n",
            "[data]\nhistory_days = 0\n",
            "[weights.volatility]\nlow_atr_pct = 3.0\nhigh_atr_pct = 2.0\n",
            "[training]\nmethod = \"per_regime\"\nmin_bucket_samples = 0\n",
        ] {
            let err = RegimeLabConfig::from_toml(toml).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{toml}: {err}");
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = RegimeLabConfig::from_toml("[backtest\nlookback = 60").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        let err = RegimeLabConfig::from_toml("[weights]\nmode = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RegimeLabConfig::from_file(&dir.path().join("none.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
