//! RegimeLab Core: indicators, feature snapshots, regime-adaptive scoring, backtest replay.
//!
//! This crate contains the pure, synchronous heart of the system:
//! - Domain types (bars, directions, positions, trades)
//! - Indicator library with NaN warm-up prefixes and a look-ahead guard
//! - Feature snapshots with neutral substitution for undefined values
//! - Regime classification and weight buckets
//! - Weight distributions, selection, offline training and the persisted store
//! - Scoring engine producing directional predictions
//! - Bar-by-bar backtest replay with bracket exits and metrics
//!
//! No network or file I/O happens here except WeightStore save/load.

pub mod backtest;
pub mod domain;
pub mod features;
pub mod indicators;
pub mod regime;
pub mod scoring;
pub mod weights;
