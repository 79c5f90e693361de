//! Agent configuration.

use serde::{Deserialize, Serialize};

use crate::action::SelectionMode;
use crate::inference::InferenceSettings;

/// Configuration for one agent instance.
///
/// Validated by [`Agent::new`](crate::agent::Agent::new); this struct itself
/// is plain data so it can be deserialized from caller-side config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Planning horizon `H` (number of future timesteps per policy).
    pub horizon: usize,
    /// Precision γ: how sharply the policy posterior favors low EFE.
    pub gamma: f64,
    /// Deterministic (argmax) or stochastic (sampled) action selection.
    pub mode: SelectionMode,
    /// Habit prior `E(π)` over enumerated policies; uniform when absent.
    /// May be unnormalized; length must match the policy count.
    pub policy_prior: Option<Vec<f64>>,
    /// Mean-field fixed-point settings for state inference.
    pub inference: InferenceSettings,
    /// RNG seed for reproducible stochastic selection; entropy-seeded when
    /// absent.
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            horizon: 1,
            gamma: 1.0,
            mode: SelectionMode::default(),
            policy_prior: None,
            inference: InferenceSettings::default(),
            seed: None,
        }
    }
}
