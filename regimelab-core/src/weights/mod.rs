//! Category weights: distributions, the candidate catalogue, persistence,
//! selection at prediction time, and offline training.

pub mod catalogue;
pub mod provider;
pub mod store;
pub mod training;
pub mod volatility;

pub use catalogue::{Candidate, Catalogue};
pub use provider::{RegimeAdaptiveWeights, StaticWeights, WeightProvider, WeightSelection, WeightSource};
pub use store::{BucketAssignment, StoreError, TrainedWeights, WeightStore};
pub use training::{
    CandidateResult, TrainingError, TrainingMethod, TrainingSample, WeightTrainer,
};
pub use volatility::{VolatilityAdjusted, VolatilityBands, VolatilityLevel};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Tolerance for a distribution summing to one.
pub const SUM_TOLERANCE: f64 = 1e-9;

/// The five scoring categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Trend,
    Momentum,
    Volatility,
    TrendStrength,
    Stochastic,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Trend,
        Category::Momentum,
        Category::Volatility,
        Category::TrendStrength,
        Category::Stochastic,
    ];

    fn index(self) -> usize {
        match self {
            Category::Trend => 0,
            Category::Momentum => 1,
            Category::Volatility => 2,
            Category::TrendStrength => 3,
            Category::Stochastic => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::Trend => "trend",
            Category::Momentum => "momentum",
            Category::Volatility => "volatility",
            Category::TrendStrength => "trend_strength",
            Category::Stochastic => "stochastic",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightError {
    #[error("weight for {category} is negative: {value}")]
    Negative { category: Category, value: f64 },

    #[error("weight for {category} is not finite")]
    NonFinite { category: Category },

    #[error("weights sum to {sum}, expected 1")]
    SumMismatch { sum: f64 },

    #[error("weights sum to zero and cannot be normalized")]
    ZeroTotal,
}

/// Non-negative category weights summing to one.
///
/// Construction validates; volatility adjustment returns a new renormalized value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights", into = "RawWeights")]
pub struct WeightDistribution {
    values: [f64; 5],
}

/// Serialized form, one named field per category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawWeights {
    trend: f64,
    momentum: f64,
    volatility: f64,
    trend_strength: f64,
    stochastic: f64,
}

impl TryFrom<RawWeights> for WeightDistribution {
    type Error = WeightError;

    fn try_from(raw: RawWeights) -> Result<Self, Self::Error> {
        Self::new(
            raw.trend,
            raw.momentum,
            raw.volatility,
            raw.trend_strength,
            raw.stochastic,
        )
    }
}

impl From<WeightDistribution> for RawWeights {
    fn from(w: WeightDistribution) -> Self {
        let [trend, momentum, volatility, trend_strength, stochastic] = w.values;
        Self {
            trend,
            momentum,
            volatility,
            trend_strength,
            stochastic,
        }
    }
}

impl WeightDistribution {
    /// Validated distribution. Weights must already sum to one.
    pub fn new(
        trend: f64,
        momentum: f64,
        volatility: f64,
        trend_strength: f64,
        stochastic: f64,
    ) -> Result<Self, WeightError> {
        let values = [trend, momentum, volatility, trend_strength, stochastic];
        check_components(&values)?;
        let sum: f64 = values.iter().sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(WeightError::SumMismatch { sum });
        }
        Ok(Self { values })
    }

    /// Scale arbitrary non-negative weights so they sum to one.
    pub fn normalized(values: [f64; 5]) -> Result<Self, WeightError> {
        check_components(&values)?;
        let sum: f64 = values.iter().sum();
        if sum <= 0.0 {
            return Err(WeightError::ZeroTotal);
        }
        Ok(Self {
            values: values.map(|v| v / sum),
        })
    }

    /// The reference distribution: trend .20, momentum .25, volatility .20,
    /// trend strength .20, stochastic .15.
    pub fn standard() -> Self {
        Self::from_trusted([0.20, 0.25, 0.20, 0.20, 0.15])
    }

    /// Built-in constants only; callers guarantee the invariants.
    pub(crate) const fn from_trusted(values: [f64; 5]) -> Self {
        Self { values }
    }

    pub fn get(&self, category: Category) -> f64 {
        self.values[category.index()]
    }

    pub fn as_array(&self) -> [f64; 5] {
        self.values
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Weighted sum of per-category values, accumulated in category order.
    pub fn combine(&self, scores: [f64; 5]) -> f64 {
        self.values
            .iter()
            .zip(scores)
            .fold(0.0, |acc, (w, s)| acc + w * s)
    }
}

impl Default for WeightDistribution {
    fn default() -> Self {
        Self::standard()
    }
}

fn check_components(values: &[f64; 5]) -> Result<(), WeightError> {
    for (category, &value) in Category::ALL.iter().zip(values) {
        if !value.is_finite() {
            return Err(WeightError::NonFinite {
                category: *category,
            });
        }
        if value < 0.0 {
            return Err(WeightError::Negative {
                category: *category,
                value,
            });
        }
    }
    Ok(())
}
