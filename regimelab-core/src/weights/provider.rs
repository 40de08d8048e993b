//! Weight selection at prediction time.

use super::store::WeightStore;
use super::WeightDistribution;
use crate::features::FeatureSnapshot;
use crate::regime::{RegimeClassifier, RegimeLabel, WeightBucket};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Chooses the category weights for one snapshot.
pub trait WeightProvider: Send + Sync {
    fn name(&self) -> &str;

    fn select(&self, snapshot: &FeatureSnapshot) -> WeightSelection;
}

/// Where a selection's weights came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightSource {
    Static,
    Regime {
        label: RegimeLabel,
        bucket: WeightBucket,
        combination: String,
    },
    /// The store has never been trained; defaults were used.
    UntrainedFallback { label: RegimeLabel },
    /// The store has no assignment for this bucket; defaults were used.
    MissingBucketFallback {
        label: RegimeLabel,
        bucket: WeightBucket,
    },
}

impl WeightSource {
    pub fn regime(&self) -> Option<RegimeLabel> {
        match self {
            WeightSource::Static => None,
            WeightSource::Regime { label, .. }
            | WeightSource::UntrainedFallback { label }
            | WeightSource::MissingBucketFallback { label, .. } => Some(*label),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            WeightSource::UntrainedFallback { .. } | WeightSource::MissingBucketFallback { .. }
        )
    }

    /// Human-readable line describing the selection.
    pub fn describe(&self) -> String {
        match self {
            WeightSource::Static => "Static weights".to_string(),
            WeightSource::Regime {
                label,
                combination,
                ..
            } => format!("Regime {label}: using '{combination}' weights"),
            WeightSource::UntrainedFallback { label } => {
                format!("Regime {label}: weight store untrained, using default weights")
            }
            WeightSource::MissingBucketFallback { label, bucket } => {
                format!("Regime {label}: no trained weights for bucket {bucket}, using default weights")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSelection {
    pub weights: WeightDistribution,
    pub source: WeightSource,
}

/// Fixed weights regardless of regime.
#[derive(Debug, Clone, Default)]
pub struct StaticWeights {
    weights: WeightDistribution,
}

impl StaticWeights {
    pub fn new(weights: WeightDistribution) -> Self {
        Self { weights }
    }
}

impl WeightProvider for StaticWeights {
    fn name(&self) -> &str {
        "static"
    }

    fn select(&self, _snapshot: &FeatureSnapshot) -> WeightSelection {
        WeightSelection {
            weights: self.weights,
            source: WeightSource::Static,
        }
    }
}

/// Classifies the regime and looks up the trained bucket assignment.
#[derive(Debug, Clone)]
pub struct RegimeAdaptiveWeights {
    store: Arc<WeightStore>,
    classifier: RegimeClassifier,
    fallback: WeightDistribution,
}

impl RegimeAdaptiveWeights {
    pub fn new(store: Arc<WeightStore>, classifier: RegimeClassifier) -> Self {
        if !store.is_trained() {
            warn!("weight store is untrained; adaptive weights will use defaults");
        }
        Self {
            store,
            classifier,
            fallback: WeightDistribution::standard(),
        }
    }

    pub fn store(&self) -> &WeightStore {
        &self.store
    }

    pub fn classifier(&self) -> &RegimeClassifier {
        &self.classifier
    }
}

impl WeightProvider for RegimeAdaptiveWeights {
    fn name(&self) -> &str {
        "adaptive"
    }

    fn select(&self, snapshot: &FeatureSnapshot) -> WeightSelection {
        let label = self.classifier.classify(snapshot);
        let bucket = label.bucket();

        if !self.store.is_trained() {
            return WeightSelection {
                weights: self.fallback,
                source: WeightSource::UntrainedFallback { label },
            };
        }

        match self.store.assignment(bucket) {
            Some(assignment) => WeightSelection {
                weights: assignment.weights,
                source: WeightSource::Regime {
                    label,
                    bucket,
                    combination: assignment.combination.clone(),
                },
            },
            None => {
                debug!(%bucket, bar_index = snapshot.bar_index, "no trained assignment for bucket");
                WeightSelection {
                    weights: self.fallback,
                    source: WeightSource::MissingBucketFallback { label, bucket },
                }
            }
        }
    }
}
