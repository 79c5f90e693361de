//! Crate-level error taxonomy.
//!
//! Construction-time problems (shapes, normalization) are fatal and leave
//! nothing partially built. Runtime domain errors (indices out of range,
//! out-of-sequence cycle calls) are surfaced synchronously to the caller
//! and never mutate the belief state. Numerical underflow is handled by
//! flooring probabilities before logarithms and is not an error.

use thiserror::Error;

use crate::action::SelectionError;
use crate::belief::BeliefError;
use crate::inference::InferenceError;
use crate::model::ModelError;
use crate::policy::PolicyError;

/// Any error surfaced by the agent's perception-action cycle.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("belief error: {0}")]
    Belief(#[from] BeliefError),

    #[error("inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("precision gamma={0} must be finite and non-negative")]
    InvalidPrecision(f64),

    #[error("observation already processed this timestep; score policies or select an action")]
    ObservationAlreadyProcessed,

    #[error("belief not updated this timestep; call infer_states first")]
    BeliefNotUpdated,

    #[error("policies not scored this timestep; call infer_policies first")]
    PoliciesNotScored,
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
