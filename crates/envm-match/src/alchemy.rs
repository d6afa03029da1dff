use envm_core::errors::{EnvmError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::environment::Species;

/// Species-pair weighting supplied by the caller.
pub trait AlchemyMixer: Send + Sync {
    /// Similarity weight between environments centred on `a` and `b`.
    fn pair_weight(&self, a: Species, b: Species) -> f64;

    /// Penalty `mu >= 0` applied when exactly one side of a pair is a
    /// placeholder. Zero disables the penalty.
    fn missing_penalty(&self) -> f64;
}

/// `mixer.missing_penalty()`, rejected unless finite and non-negative.
pub(crate) fn checked_penalty<A: AlchemyMixer + ?Sized>(mixer: &A) -> Result<f64, EnvmError> {
    let mu = mixer.missing_penalty();
    if mu.is_finite() && mu >= 0.0 {
        Ok(mu)
    } else {
        Err(EnvmError::Numeric(
            ErrorInfo::new("invalid-mu", "missing-pair penalty must be finite and non-negative")
                .with_context("mu", mu),
        ))
    }
}

fn default_same_species() -> f64 {
    1.0
}

/// Explicit symmetric weight for one species pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairWeight {
    /// First species.
    pub a: Species,
    /// Second species.
    pub b: Species,
    /// Weight applied in both directions.
    pub weight: f64,
}

/// Table-driven [`AlchemyMixer`] with uniform fallbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alchemy {
    /// Weight between equal species without an explicit entry.
    #[serde(default = "default_same_species")]
    pub same_species: f64,
    /// Weight between different species without an explicit entry.
    #[serde(default)]
    pub cross_species: f64,
    /// Missing-pair penalty.
    #[serde(default)]
    pub mu: f64,
    /// Explicit overrides.
    #[serde(default)]
    pub pairs: Vec<PairWeight>,
}

impl Default for Alchemy {
    fn default() -> Self {
        Self {
            same_species: default_same_species(),
            cross_species: 0.0,
            mu: 0.0,
            pairs: Vec::new(),
        }
    }
}

impl Alchemy {
    /// Sets the missing-pair penalty.
    pub fn with_mu(mut self, mu: f64) -> Self {
        self.mu = mu;
        self
    }

    /// Sets the fallback weight between different species.
    pub fn with_cross_species(mut self, weight: f64) -> Self {
        self.cross_species = weight;
        self
    }

    /// Sets the weight for `(a, b)` and `(b, a)`, replacing an earlier entry.
    pub fn with_pair(mut self, a: Species, b: Species, weight: f64) -> Self {
        let (a, b) = (a.min(b), a.max(b));
        self.pairs.retain(|pair| (pair.a.min(pair.b), pair.a.max(pair.b)) != (a, b));
        self.pairs.push(PairWeight { a, b, weight });
        self
    }
}

impl AlchemyMixer for Alchemy {
    fn pair_weight(&self, a: Species, b: Species) -> f64 {
        self.pairs
            .iter()
            .find(|pair| (pair.a == a && pair.b == b) || (pair.a == b && pair.b == a))
            .map(|pair| pair.weight)
            .unwrap_or(if a == b {
                self.same_species
            } else {
                self.cross_species
            })
    }

    fn missing_penalty(&self) -> f64 {
        self.mu
    }
}
