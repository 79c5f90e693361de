//! Interface to the task-environment collaborator.
//!
//! The simulator itself is out of scope; the agent only requires that
//! observations come back as one index per modality, each within the
//! declared modality size. Implementations live with the caller (or in
//! this crate's integration tests).

/// A discrete task environment the agent acts in.
pub trait Environment {
    /// Start an episode and return the initial observation, one index per
    /// modality.
    fn reset(&mut self) -> Vec<usize>;

    /// Apply an action (one index per control factor) and return the next
    /// observation.
    ///
    /// Implementations must keep observation indices within the modality
    /// sizes declared to the agent's model; the agent rejects out-of-range
    /// indices with a domain error rather than clamping.
    fn step(&mut self, action: &[usize]) -> Vec<usize>;
}
