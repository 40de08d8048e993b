//! RegimeLab Runner: configuration, data acquisition, batch replay, training.
//!
//! This crate builds on `regimelab-core` to provide:
//! - TOML configuration with validated defaults
//! - Data providers (CSV, synthetic, Yahoo, in-memory) and ingest cleanup
//! - Parallel multi-ticker replay with per-ticker outcomes
//! - Static vs regime-adaptive weighting comparison
//! - Training corpus construction and weight store persistence
//! - Latest-bar signal reports

pub mod batch;
pub mod config;
pub mod data;
pub mod error;
pub mod predict;
pub mod training;

pub use batch::{
    compare_weighting, replay_universe, run_batch, run_fingerprint, BatchReport, BatchSummary,
    ComparisonRow, SideAverages, SideMetrics, TickerOutcome, Verdict, WeightingComparison,
};
pub use config::{
    ConfigError, DataSourceKind, RegimeLabConfig, TrainingMode, VolatilitySection, WeightMode,
};
pub use data::{
    load_universe, provider_for, DataError, DataProvider, FetchWindow, Interval, LoadedUniverse,
};
pub use error::RunError;
pub use predict::{predict_latest, predictor_for, SignalReport};
pub use training::{build_corpus, train_from_config, train_store};
