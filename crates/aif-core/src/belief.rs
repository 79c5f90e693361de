//! Factorized belief state: one categorical distribution per hidden-state
//! factor.
//!
//! The mean-field approximation is explicit in the representation: the
//! posterior is a product of independent per-factor distributions, never a
//! flattened joint table. This keeps memory and compute linear in the sum of
//! factor sizes rather than their product.

use ndarray::Array1;
use serde::Serialize;
use thiserror::Error;

use aif_math::{argmax, entropy, is_normalized, one_hot};

use crate::model::GenerativeModel;

/// Errors raised when building a belief from raw vectors.
#[derive(Debug, Error)]
pub enum BeliefError {
    #[error("belief has no factors")]
    Empty,

    #[error("factor {factor} is not a distribution (sum={sum})")]
    NotNormalized { factor: usize, sum: f64 },
}

/// Result type for belief operations.
pub type Result<T> = std::result::Result<T, BeliefError>;

/// Per-factor posterior over hidden states.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Belief {
    factors: Vec<Array1<f64>>,
}

impl Belief {
    /// Build from per-factor distributions, validating each one.
    pub fn new(factors: Vec<Array1<f64>>) -> Result<Self> {
        if factors.is_empty() {
            return Err(BeliefError::Empty);
        }
        for (f, q) in factors.iter().enumerate() {
            if !is_normalized(&q.to_vec()) {
                return Err(BeliefError::NotNormalized {
                    factor: f,
                    sum: q.sum(),
                });
            }
        }
        Ok(Self { factors })
    }

    /// Initial belief: a copy of the model's prior D.
    pub fn from_prior(model: &GenerativeModel) -> Self {
        Self {
            factors: model.priors().to_vec(),
        }
    }

    /// Wrap factor distributions that are already normalized (softmax
    /// output inside the inference loop).
    pub(crate) fn from_normalized(factors: Vec<Array1<f64>>) -> Self {
        Self { factors }
    }

    /// Belief with all mass on one state index per factor.
    pub fn from_states(sizes: &[usize], states: &[usize]) -> Result<Self> {
        let factors = sizes
            .iter()
            .zip(states.iter())
            .map(|(&n, &s)| Array1::from_vec(one_hot(n, s)))
            .collect();
        Self::new(factors)
    }

    /// Number of hidden-state factors.
    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    /// Distribution for factor `f`.
    pub fn factor(&self, f: usize) -> &Array1<f64> {
        &self.factors[f]
    }

    /// All per-factor distributions.
    pub fn factors(&self) -> &[Array1<f64>] {
        &self.factors
    }

    /// Most likely state index per factor.
    pub fn argmax(&self) -> Vec<usize> {
        self.factors.iter().map(|q| argmax(&q.to_vec())).collect()
    }

    /// Total entropy: the sum of per-factor entropies (factors are
    /// independent under the mean-field approximation).
    pub fn entropy(&self) -> f64 {
        self.factors.iter().map(|q| entropy(&q.to_vec())).sum()
    }
}
