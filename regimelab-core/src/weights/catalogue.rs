//! Named candidate weight distributions evaluated during training.

use super::WeightDistribution;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub weights: WeightDistribution,
}

impl Candidate {
    pub fn new(name: impl Into<String>, weights: WeightDistribution) -> Self {
        Self {
            name: name.into(),
            weights,
        }
    }
}

/// Ordered set of candidates. Order breaks accuracy ties during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalogue {
    candidates: Vec<Candidate>,
}

// (name, [trend, momentum, volatility, trend_strength, stochastic])
const REFERENCE: [(&str, [f64; 5]); 6] = [
    ("standard", [0.20, 0.25, 0.20, 0.20, 0.15]),
    ("momentum_heavy", [0.15, 0.40, 0.15, 0.20, 0.10]),
    ("trend_heavy", [0.35, 0.15, 0.20, 0.25, 0.05]),
    ("volatility_aware", [0.15, 0.20, 0.35, 0.15, 0.15]),
    ("adx_focused", [0.15, 0.20, 0.15, 0.40, 0.10]),
    ("balanced", [0.20, 0.30, 0.25, 0.15, 0.10]),
];

impl Catalogue {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    /// The six built-in candidates.
    pub fn reference() -> Self {
        let candidates = REFERENCE
            .iter()
            .map(|(name, values)| Candidate::new(*name, WeightDistribution::from_trusted(*values)))
            .collect();
        Self { candidates }
    }

    pub fn find(&self, name: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.name == name)
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::reference()
    }
}
