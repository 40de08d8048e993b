//! Offline weight training.
//!
//! Every catalogue candidate is replayed over a `(snapshot, realized direction)`
//! corpus. Category sub-scores do not depend on weights, so they are computed
//! once per sample and each candidate only re-combines them.

use super::catalogue::{Candidate, Catalogue};
use super::store::{BucketAssignment, TrainedWeights, WeightStore};
use super::WeightDistribution;
use crate::domain::Direction;
use crate::features::FeatureSnapshot;
use crate::regime::{RegimeClassifier, WeightBucket};
use crate::scoring::{CategoryScores, ScoringEngine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrainingError {
    #[error("training corpus is empty")]
    EmptyCorpus,

    #[error("candidate catalogue is empty")]
    EmptyCatalogue,
}

/// How trained buckets are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrainingMethod {
    /// Every bucket takes the candidate with the best whole-corpus accuracy.
    #[default]
    GlobalBest,
    /// Each bucket with at least `min_samples` samples takes its own best
    /// candidate; sparser buckets take the global best.
    PerRegime { min_samples: usize },
}

/// One observation: the features at bar t and the realized move to t+1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub snapshot: FeatureSnapshot,
    pub actual: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketAccuracy {
    pub correct: usize,
    pub samples: usize,
    pub accuracy: f64,
}

impl BucketAccuracy {
    fn new(correct: usize, samples: usize) -> Self {
        Self {
            correct,
            samples,
            accuracy: ratio(correct, samples),
        }
    }
}

/// Accuracy of one candidate over the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub name: String,
    pub weights: WeightDistribution,
    pub correct: usize,
    pub samples: usize,
    pub accuracy: f64,
    pub per_bucket: BTreeMap<WeightBucket, BucketAccuracy>,
}

#[derive(Debug, Clone)]
pub struct WeightTrainer {
    catalogue: Catalogue,
    classifier: RegimeClassifier,
    engine: ScoringEngine,
    method: TrainingMethod,
}

impl WeightTrainer {
    pub fn new(catalogue: Catalogue, classifier: RegimeClassifier, method: TrainingMethod) -> Self {
        Self {
            catalogue,
            classifier,
            engine: ScoringEngine,
            method,
        }
    }

    pub fn method(&self) -> TrainingMethod {
        self.method
    }

    /// Evaluate every candidate and build a trained store.
    pub fn train(&self, samples: &[TrainingSample]) -> Result<WeightStore, TrainingError> {
        if samples.is_empty() {
            return Err(TrainingError::EmptyCorpus);
        }
        if self.catalogue.is_empty() {
            return Err(TrainingError::EmptyCatalogue);
        }

        let prepared: Vec<(CategoryScores, WeightBucket, Direction)> = samples
            .iter()
            .map(|s| {
                let mut snapshot = s.snapshot.clone();
                snapshot.sanitize();
                let bucket = self.classifier.classify(&snapshot).bucket();
                (self.engine.category_scores(&snapshot), bucket, s.actual)
            })
            .collect();

        let mut bucket_sizes: BTreeMap<WeightBucket, usize> = BTreeMap::new();
        for (_, bucket, _) in &prepared {
            *bucket_sizes.entry(*bucket).or_default() += 1;
        }

        let results: Vec<CandidateResult> = self
            .catalogue
            .candidates()
            .iter()
            .map(|c| evaluate(c, &prepared))
            .collect();

        for r in &results {
            debug!(candidate = %r.name, accuracy = r.accuracy, correct = r.correct, "candidate evaluated");
        }

        let global = best_by(&results, |r| Some(r.accuracy)).unwrap_or(&results[0]);

        let mut assignments = BTreeMap::new();
        for bucket in WeightBucket::ALL {
            let samples_in_bucket = bucket_sizes.get(&bucket).copied().unwrap_or(0);
            let assignment = match self.method {
                TrainingMethod::PerRegime { min_samples }
                    if samples_in_bucket > 0 && samples_in_bucket >= min_samples =>
                {
                    let best = best_by(&results, |r| r.per_bucket.get(&bucket).map(|b| b.accuracy))
                        .unwrap_or(global);
                    BucketAssignment {
                        combination: best.name.clone(),
                        weights: best.weights,
                        accuracy: best
                            .per_bucket
                            .get(&bucket)
                            .map_or(best.accuracy, |b| b.accuracy),
                        samples: samples_in_bucket,
                        fell_back: false,
                    }
                }
                method => BucketAssignment {
                    combination: global.name.clone(),
                    weights: global.weights,
                    accuracy: global.accuracy,
                    samples: samples_in_bucket,
                    fell_back: matches!(method, TrainingMethod::PerRegime { .. }),
                },
            };
            assignments.insert(bucket, assignment);
        }

        info!(
            samples = samples.len(),
            method = ?self.method,
            global_best = %global.name,
            accuracy = global.accuracy,
            "weight training complete"
        );

        Ok(WeightStore::Trained(TrainedWeights {
            method: self.method,
            sample_count: samples.len(),
            global_best: global.name.clone(),
            assignments,
            results,
        }))
    }
}

impl Default for WeightTrainer {
    fn default() -> Self {
        Self::new(
            Catalogue::reference(),
            RegimeClassifier::default(),
            TrainingMethod::GlobalBest,
        )
    }
}

fn evaluate(
    candidate: &Candidate,
    prepared: &[(CategoryScores, WeightBucket, Direction)],
) -> CandidateResult {
    let mut correct = 0;
    let mut per_bucket: BTreeMap<WeightBucket, (usize, usize)> = BTreeMap::new();

    for (scores, bucket, actual) in prepared {
        let score = candidate.weights.combine(scores.as_array());
        let hit = ScoringEngine::direction_for(score) == *actual;
        let entry = per_bucket.entry(*bucket).or_default();
        entry.1 += 1;
        if hit {
            correct += 1;
            entry.0 += 1;
        }
    }

    CandidateResult {
        name: candidate.name.clone(),
        weights: candidate.weights,
        correct,
        samples: prepared.len(),
        accuracy: ratio(correct, prepared.len()),
        per_bucket: per_bucket
            .into_iter()
            .map(|(b, (c, n))| (b, BucketAccuracy::new(c, n)))
            .collect(),
    }
}

/// First result with the strictly highest key. Earlier entries win ties.
fn best_by<F>(results: &[CandidateResult], key: F) -> Option<&CandidateResult>
where
    F: Fn(&CandidateResult) -> Option<f64>,
{
    let mut best: Option<(&CandidateResult, f64)> = None;
    for r in results {
        let Some(k) = key(r) else { continue };
        match best {
            Some((_, best_k)) if k <= best_k => {}
            _ => best = Some((r, k)),
        }
    }
    best.map(|(r, _)| r)
}

fn ratio(correct: usize, samples: usize) -> f64 {
    if samples == 0 {
        0.0
    } else {
        correct as f64 / samples as f64
    }
}
