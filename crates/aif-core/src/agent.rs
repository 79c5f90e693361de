//! The agent: one perception-action cycle per timestep.
//!
//! Cycle: `AwaitingObservation → BeliefUpdated → PoliciesScored →
//! ActionSelected → AwaitingObservation`. The granular methods
//! ([`Agent::infer_states`], [`Agent::infer_policies`],
//! [`Agent::sample_action`]) enforce that order; [`Agent::step`] runs a
//! whole cycle. A cycle abandoned between stages leaves the belief intact
//! because inference commits its posterior atomically.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::debug;

use crate::action::{action_marginals, policy_posterior, select_action, SelectionError};
use crate::belief::Belief;
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::inference::{infer_states, InferenceError, InferenceOutcome};
use crate::model::GenerativeModel;
use crate::policy::{enumerate_policies, evaluate_policies, Policy, PolicyScore};

/// Where the agent is within its per-timestep cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Ready for a new observation.
    AwaitingObservation,
    /// Belief updated from the latest observation.
    BeliefUpdated,
    /// Policy scores computed for the current belief.
    PoliciesScored,
}

/// Active-inference agent over a factorized POMDP.
pub struct Agent {
    model: GenerativeModel,
    config: AgentConfig,
    policies: Vec<Policy>,
    belief: Belief,
    rng: StdRng,
    phase: Phase,
    last_action: Option<Vec<usize>>,
    last_inference: Option<InferenceOutcome>,
    scores: Option<Vec<PolicyScore>>,
}

impl Agent {
    /// Build an agent, enumerating its policy space up front.
    ///
    /// Fails on a non-finite or negative precision, a zero horizon, a zero
    /// inference iteration cap, or a policy prior whose length does not
    /// match the policy count.
    pub fn new(model: GenerativeModel, config: AgentConfig) -> Result<Self> {
        if !config.gamma.is_finite() || config.gamma < 0.0 {
            return Err(AgentError::InvalidPrecision(config.gamma));
        }
        if config.inference.max_iterations == 0 {
            return Err(AgentError::Inference(InferenceError::ZeroIterationCap));
        }
        let policies = enumerate_policies(model.dims(), config.horizon)?;
        if let Some(prior) = &config.policy_prior {
            if prior.len() != policies.len() {
                return Err(AgentError::Selection(SelectionError::PolicyPriorLength {
                    expected: policies.len(),
                    actual: prior.len(),
                }));
            }
        }
        let belief = Belief::from_prior(&model);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        debug!(
            policies = policies.len(),
            horizon = config.horizon,
            "agent constructed"
        );
        Ok(Self {
            model,
            config,
            policies,
            belief,
            rng,
            phase: Phase::AwaitingObservation,
            last_action: None,
            last_inference: None,
            scores: None,
        })
    }

    /// Restore the initial belief and cycle phase.
    ///
    /// With a configured seed the RNG is reseeded too, so a reset agent
    /// replays a stochastic run exactly.
    pub fn reset(&mut self) {
        self.belief = Belief::from_prior(&self.model);
        self.phase = Phase::AwaitingObservation;
        self.last_action = None;
        self.last_inference = None;
        self.scores = None;
        if let Some(seed) = self.config.seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
    }

    /// Update the belief from a new observation (one index per modality).
    ///
    /// On error the belief is left unmodified.
    pub fn infer_states(&mut self, observation: &[usize]) -> Result<&Belief> {
        if self.phase != Phase::AwaitingObservation {
            return Err(AgentError::ObservationAlreadyProcessed);
        }
        let outcome = infer_states(
            &self.model,
            &self.belief,
            self.last_action.as_deref(),
            observation,
            &self.config.inference,
        )?;
        debug!(
            free_energy = outcome.free_energy,
            iterations = outcome.iterations,
            "belief updated"
        );
        self.belief = outcome.posterior.clone();
        self.last_inference = Some(outcome);
        self.phase = Phase::BeliefUpdated;
        Ok(&self.belief)
    }

    /// Score every policy by expected free energy for the current belief.
    pub fn infer_policies(&mut self) -> Result<&[PolicyScore]> {
        if self.phase != Phase::BeliefUpdated {
            return Err(AgentError::BeliefNotUpdated);
        }
        let scores = evaluate_policies(&self.model, &self.belief, &self.policies);
        if let Some(best) = scores
            .iter()
            .min_by(|a, b| a.efe.partial_cmp(&b.efe).unwrap_or(std::cmp::Ordering::Equal))
        {
            debug!(policy = best.policy, efe = best.efe, "policies scored");
        }
        self.scores = Some(scores);
        self.phase = Phase::PoliciesScored;
        Ok(self.scores.as_deref().unwrap_or(&[]))
    }

    /// Select one action index per factor from the policy posterior.
    pub fn sample_action(&mut self) -> Result<Vec<usize>> {
        if self.phase != Phase::PoliciesScored {
            return Err(AgentError::PoliciesNotScored);
        }
        let scores = self.scores.as_deref().unwrap_or(&[]);
        let q_pi = policy_posterior(
            scores,
            self.config.gamma,
            self.config.policy_prior.as_deref(),
        )?;
        let marginals = action_marginals(&self.policies, &q_pi, self.model.dims());
        let action = select_action(&marginals, self.config.mode, &mut self.rng);
        debug!(?action, "action selected");
        self.last_action = Some(action.clone());
        self.phase = Phase::AwaitingObservation;
        Ok(action)
    }

    /// Run one full cycle: belief update, policy scoring, action selection.
    pub fn step(&mut self, observation: &[usize]) -> Result<Vec<usize>> {
        self.infer_states(observation)?;
        self.infer_policies()?;
        self.sample_action()
    }

    /// Current cycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current factorized belief.
    pub fn belief(&self) -> &Belief {
        &self.belief
    }

    /// The enumerated policy space.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Policy scores from the latest `infer_policies` call.
    pub fn policy_scores(&self) -> Option<&[PolicyScore]> {
        self.scores.as_deref()
    }

    /// Diagnostics from the latest belief update.
    pub fn last_inference(&self) -> Option<&InferenceOutcome> {
        self.last_inference.as_ref()
    }

    /// The most recently selected action.
    pub fn last_action(&self) -> Option<&[usize]> {
        self.last_action.as_deref()
    }

    /// The generative model.
    pub fn model(&self) -> &GenerativeModel {
        &self.model
    }

    /// The configuration this agent was built with.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}
