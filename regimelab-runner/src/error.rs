use crate::config::ConfigError;
use crate::data::DataError;
use regimelab_core::backtest::BacktestError;
use regimelab_core::features::FeatureError;
use regimelab_core::weights::{StoreError, TrainingError};
use thiserror::Error;

/// Errors from runner operations.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Backtest(#[from] BacktestError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error("no data loaded for any of {requested} symbols")]
    NoData { requested: usize },
}
