//! Action selection from policy scores.
//!
//! The policy posterior is `Q(π) ∝ E(π) · exp(−γ · G(π))`, where `E` is a
//! habit prior over policies (uniform unless overridden) and γ is the
//! precision parameter sharpening or flattening the posterior. Per-factor
//! action marginals sum `Q(π)` over all policies sharing a first-timestep
//! action; the selected action is the marginal's mode (deterministic mode)
//! or a categorical sample (stochastic mode) drawn from an explicit RNG.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use aif_math::{argmax, ln_floored, normalized, softmax};

use crate::model::ModelDimensions;
use crate::policy::{Policy, PolicyScore};

/// Errors raised during action selection.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no policy scores to select from")]
    EmptyScores,

    #[error("policy prior has length {actual}, expected {expected}")]
    PolicyPriorLength { expected: usize, actual: usize },
}

/// Result type for selection operations.
pub type Result<T> = std::result::Result<T, SelectionError>;

/// How the selected action is drawn from the per-factor marginals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Take the mode of each factor's action marginal.
    #[default]
    Deterministic,
    /// Sample each factor's action from its marginal.
    Stochastic,
}

/// Posterior over policies from their EFE scores.
///
/// `habits` overrides the uniform policy prior `E(π)`; it is normalized
/// before use, so callers may pass unnormalized weights.
pub fn policy_posterior(
    scores: &[PolicyScore],
    gamma: f64,
    habits: Option<&[f64]>,
) -> Result<Vec<f64>> {
    if scores.is_empty() {
        return Err(SelectionError::EmptyScores);
    }
    let ln_prior: Vec<f64> = match habits {
        Some(weights) => {
            if weights.len() != scores.len() {
                return Err(SelectionError::PolicyPriorLength {
                    expected: scores.len(),
                    actual: weights.len(),
                });
            }
            normalized(weights).iter().map(|&w| ln_floored(w)).collect()
        }
        None => vec![0.0; scores.len()],
    };
    let logits: Vec<f64> = scores
        .iter()
        .zip(ln_prior.iter())
        .map(|(s, lp)| lp - gamma * s.efe)
        .collect();
    Ok(softmax(&logits))
}

/// Per-factor marginal over first-timestep actions.
///
/// For uncontrollable factors the marginal is the trivial `[1.0]` over the
/// no-op action.
pub fn action_marginals(
    policies: &[Policy],
    q_pi: &[f64],
    dims: &ModelDimensions,
) -> Vec<Vec<f64>> {
    debug_assert_eq!(policies.len(), q_pi.len());
    let mut marginals: Vec<Vec<f64>> = dims
        .num_controls
        .iter()
        .map(|&u| vec![0.0; u])
        .collect();
    for (policy, &q) in policies.iter().zip(q_pi.iter()) {
        for (f, &u) in policy.first_step().iter().enumerate() {
            marginals[f][u] += q;
        }
    }
    for marginal in &mut marginals {
        let sum: f64 = marginal.iter().sum();
        if sum > 0.0 {
            for p in marginal.iter_mut() {
                *p /= sum;
            }
        }
    }
    marginals
}

/// Draw one action index per factor from the marginals.
///
/// Selected indices always lie within each factor's control range because
/// the marginals are indexed by admissible actions.
pub fn select_action(
    marginals: &[Vec<f64>],
    mode: SelectionMode,
    rng: &mut impl Rng,
) -> Vec<usize> {
    marginals
        .iter()
        .map(|marginal| match mode {
            SelectionMode::Deterministic => argmax(marginal),
            SelectionMode::Stochastic => sample_categorical(marginal, rng),
        })
        .collect()
}

/// Inverse-CDF sample from a categorical distribution.
pub fn sample_categorical(p: &[f64], rng: &mut impl Rng) -> usize {
    let draw: f64 = rng.random();
    let mut cumulative = 0.0;
    for (i, &pi) in p.iter().enumerate() {
        cumulative += pi;
        if draw < cumulative {
            return i;
        }
    }
    p.len() - 1
}
