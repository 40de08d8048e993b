//! WeightStore: trained bucket assignments persisted as a versioned JSON blob.
//!
//! - `Untrained` until a training run produces assignments
//! - Writes are atomic (write to .tmp, rename into place)
//! - Floats round-trip exactly
//! - Unknown schema versions are rejected, never guessed at

use super::training::{CandidateResult, TrainingMethod};
use super::WeightDistribution;
use crate::regime::WeightBucket;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("weight store I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("weight store JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported weight store schema version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// The combination chosen for one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketAssignment {
    pub combination: String,
    pub weights: WeightDistribution,
    /// Accuracy that justified the choice (bucket-local or whole-corpus).
    pub accuracy: f64,
    /// Samples observed in this bucket during training.
    pub samples: usize,
    /// True when the bucket had too few samples and took the global best.
    #[serde(default)]
    pub fell_back: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedWeights {
    pub method: TrainingMethod,
    pub sample_count: usize,
    pub global_best: String,
    pub assignments: BTreeMap<WeightBucket, BucketAssignment>,
    /// Every tested combination, in catalogue order.
    pub results: Vec<CandidateResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WeightStore {
    #[default]
    Untrained,
    Trained(TrainedWeights),
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    schema_version: u32,
    store: WeightStore,
}

#[derive(Deserialize)]
struct VersionHeader {
    schema_version: u32,
}

impl WeightStore {
    pub fn is_trained(&self) -> bool {
        matches!(self, WeightStore::Trained(_))
    }

    pub fn trained(&self) -> Option<&TrainedWeights> {
        match self {
            WeightStore::Trained(t) => Some(t),
            WeightStore::Untrained => None,
        }
    }

    pub fn assignment(&self, bucket: WeightBucket) -> Option<&BucketAssignment> {
        self.trained()?.assignments.get(&bucket)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        let envelope = Envelope {
            schema_version: SCHEMA_VERSION,
            store: self.clone(),
        };
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let header: VersionHeader = serde_json::from_str(json)?;
        if header.schema_version != SCHEMA_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: header.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        let envelope: Envelope = serde_json::from_str(json)?;
        Ok(envelope.store)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = self.to_json()?;
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(io_err)?;
        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            io_err(e)
        })
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let json = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}
