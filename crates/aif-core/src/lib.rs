//! Discrete active-inference agent for factorized POMDPs.
//!
//! This library implements the perception-action cycle of a discrete-state,
//! discrete-time active-inference agent:
//! - A generative model store holding factorized likelihood (A), transition
//!   (B), preference (C), and prior (D) tables
//! - Mean-field state inference over independent hidden-state factors
//! - Policy enumeration and expected-free-energy scoring
//! - Action selection from the policy posterior
//!
//! The task environment is an external collaborator; only its trait
//! interface lives here (`env::Environment`).

pub mod action;
pub mod agent;
pub mod belief;
pub mod config;
pub mod env;
pub mod error;
pub mod inference;
pub mod model;
pub mod policy;

pub use action::SelectionMode;
pub use agent::{Agent, Phase};
pub use belief::Belief;
pub use config::AgentConfig;
pub use env::Environment;
pub use error::AgentError;
pub use inference::InferenceSettings;
pub use model::{GenerativeModel, ModelDimensions, NormalizationPolicy};
pub use policy::{Policy, PolicyScore};
