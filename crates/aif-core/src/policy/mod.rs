//! Policy enumeration and expected-free-energy (EFE) scoring.
//!
//! A policy is a fixed sequence of per-factor action indices over the
//! planning horizon. The candidate space is the Cartesian product of
//! admissible actions across factors and timesteps, so it grows as
//! `(∏_f U_f)^H` — exhaustive enumeration is the intended design for small
//! state spaces and the scaling limit is documented, not worked around.
//!
//! Each policy is scored independently against the immutable model and a
//! read-only snapshot of the current belief:
//!
//! ```text
//! G(π) = Σ_τ Σ_m  KL(Qo_m,τ ‖ σ(C_m))  +  E_{Qs_τ}[H(A_m)]
//!        ---------- risk ----------      ------ ambiguity ------
//! ```
//!
//! Lower is better. Scoring runs on a rayon pool; the output order is the
//! enumeration order regardless of scheduling, so downstream selection is
//! deterministic under a fixed seed.

use ndarray::Array1;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use aif_math::kl_divergence;

use crate::belief::Belief;
use crate::model::{GenerativeModel, ModelDimensions};

/// Errors raised while building the policy space.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("planning horizon must be at least 1")]
    ZeroHorizon,
}

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// One candidate action sequence, indexed `[timestep][factor]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    steps: Vec<Vec<usize>>,
}

impl Policy {
    /// Planning horizon of this policy.
    pub fn horizon(&self) -> usize {
        self.steps.len()
    }

    /// Per-factor actions at timestep `t`.
    pub fn step(&self, t: usize) -> &[usize] {
        &self.steps[t]
    }

    /// Per-factor actions at the first timestep (what action selection
    /// marginalizes over).
    pub fn first_step(&self) -> &[usize] {
        &self.steps[0]
    }

    /// All timesteps.
    pub fn steps(&self) -> &[Vec<usize>] {
        &self.steps
    }
}

/// EFE score for one policy, with its risk/ambiguity decomposition.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyScore {
    /// Index of the policy in enumeration order.
    pub policy: usize,
    /// Expected free energy (risk + ambiguity); lower is better.
    pub efe: f64,
    /// Preference-divergence term.
    pub risk: f64,
    /// Expected-observation-entropy term; this is what drives
    /// information-seeking behavior.
    pub ambiguity: f64,
}

impl PolicyScore {
    /// Negated EFE, for display and logging (higher is better).
    pub fn negative_efe(&self) -> f64 {
        -self.efe
    }
}

/// Enumerate every policy over `horizon` timesteps in a fixed, documented
/// order: timesteps vary slowest, and within a timestep factor 0 is the
/// most significant digit.
pub fn enumerate_policies(dims: &ModelDimensions, horizon: usize) -> Result<Vec<Policy>> {
    if horizon == 0 {
        return Err(PolicyError::ZeroHorizon);
    }
    let per_step: usize = dims.num_controls.iter().product();
    let total = per_step.pow(horizon as u32);

    let mut policies = Vec::with_capacity(total);
    for mut code in 0..total {
        let mut steps = vec![vec![0usize; dims.num_factors()]; horizon];
        for t in (0..horizon).rev() {
            let mut step_code = code % per_step;
            code /= per_step;
            for f in (0..dims.num_factors()).rev() {
                steps[t][f] = step_code % dims.num_controls[f];
                step_code /= dims.num_controls[f];
            }
        }
        policies.push(Policy { steps });
    }
    Ok(policies)
}

/// Score every policy by expected free energy.
///
/// Policies are independent given the shared read-only model and belief
/// snapshot; scoring is parallel with output in enumeration order.
pub fn evaluate_policies(
    model: &GenerativeModel,
    belief: &Belief,
    policies: &[Policy],
) -> Vec<PolicyScore> {
    policies
        .par_iter()
        .enumerate()
        .map(|(index, policy)| score_policy(model, belief, policy, index))
        .collect()
}

/// Roll one policy forward from the current belief and accumulate its EFE.
fn score_policy(
    model: &GenerativeModel,
    belief: &Belief,
    policy: &Policy,
    index: usize,
) -> PolicyScore {
    let dims = model.dims();
    let mut qs: Vec<Array1<f64>> = belief.factors().to_vec();
    let mut risk = 0.0;
    let mut ambiguity = 0.0;

    for step in policy.steps() {
        for (f, &u) in step.iter().enumerate() {
            qs[f] = model.predict_factor(f, &qs[f], u);
        }
        for m in 0..dims.num_modalities() {
            let qo = model.expected_observation(m, &qs);
            risk += kl_divergence(&qo.to_vec(), &model.preference_dist(m).to_vec());
            ambiguity += model.expected_ambiguity(m, &qs);
        }
    }

    PolicyScore {
        policy: index,
        efe: risk + ambiguity,
        risk,
        ambiguity,
    }
}
