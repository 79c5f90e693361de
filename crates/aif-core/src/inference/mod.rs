//! Mean-field state inference for the factorized POMDP.
//!
//! Single-timestep fixed-point update:
//!
//! ```text
//! D_f      = B_f[:, :, u_f] · Qs_f(prev)        (predicted prior)
//! ln Qs_f  ∝ ln D_f + Σ_m ln E_{q(s_{-f})}[A_m[o_m | s_f, s_{-f}]]
//! ```
//!
//! Factors are coupled through shared modalities, so the per-factor softmax
//! updates sweep across factors (coordinate ascent) until the variational
//! free energy stops decreasing or the iteration cap is hit.
//!
//! The update is pure: the previous belief is read-only and the posterior is
//! returned to the caller, so an abandoned timestep never corrupts agent
//! state. All probabilities are floored before logarithms; degenerate
//! (one-hot-column) likelihoods collapse the posterior exactly.

use ndarray::{Array1, ArrayD, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use aif_math::{ln_floored, softmax};

use crate::belief::Belief;
use crate::model::{marginalize_states, GenerativeModel};

/// Errors raised while updating the belief state.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("expected {expected} observation indices (one per modality), got {actual}")]
    ModalityCountMismatch { expected: usize, actual: usize },

    #[error("observation {value} out of range for modality {modality} (size {size})")]
    ObservationOutOfRange {
        modality: usize,
        value: usize,
        size: usize,
    },

    #[error("expected {expected} action indices (one per factor), got {actual}")]
    ActionCountMismatch { expected: usize, actual: usize },

    #[error("action {value} out of range for factor {factor} (size {size})")]
    ActionOutOfRange {
        factor: usize,
        value: usize,
        size: usize,
    },

    #[error("belief has {actual} factors, model has {expected}")]
    FactorCountMismatch { expected: usize, actual: usize },

    #[error("max_iterations must be at least 1")]
    ZeroIterationCap,
}

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;

/// Fixed-point iteration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// Maximum number of coordinate-ascent sweeps across factors. Must be
    /// at least 1; a zero cap would return the predicted prior without ever
    /// reading the observation.
    pub max_iterations: usize,
    /// Stop early when a sweep improves the variational free energy by less
    /// than this.
    pub convergence_threshold: f64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            convergence_threshold: 1e-4,
        }
    }
}

/// Posterior belief plus fixed-point diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceOutcome {
    /// Updated per-factor posterior.
    pub posterior: Belief,
    /// Variational free energy at the final sweep (lower is better).
    pub free_energy: f64,
    /// Number of sweeps performed.
    pub iterations: usize,
    /// Posterior entropy minus previous-belief entropy.
    pub entropy_change: f64,
}

/// Update the belief from a new observation.
///
/// `action` is the action taken since `prev` was formed; `None` means the
/// first timestep, where the static prior D is the predicted prior. On any
/// error the caller's belief is untouched (the function never mutates its
/// inputs).
pub fn infer_states(
    model: &GenerativeModel,
    prev: &Belief,
    action: Option<&[usize]>,
    observation: &[usize],
    settings: &InferenceSettings,
) -> Result<InferenceOutcome> {
    let dims = model.dims();
    let num_factors = dims.num_factors();
    let num_modalities = dims.num_modalities();

    if settings.max_iterations == 0 {
        return Err(InferenceError::ZeroIterationCap);
    }
    if observation.len() != num_modalities {
        return Err(InferenceError::ModalityCountMismatch {
            expected: num_modalities,
            actual: observation.len(),
        });
    }
    for (m, &o) in observation.iter().enumerate() {
        if o >= dims.num_obs[m] {
            return Err(InferenceError::ObservationOutOfRange {
                modality: m,
                value: o,
                size: dims.num_obs[m],
            });
        }
    }
    if prev.num_factors() != num_factors {
        return Err(InferenceError::FactorCountMismatch {
            expected: num_factors,
            actual: prev.num_factors(),
        });
    }
    if let Some(action) = action {
        if action.len() != num_factors {
            return Err(InferenceError::ActionCountMismatch {
                expected: num_factors,
                actual: action.len(),
            });
        }
        for (f, &u) in action.iter().enumerate() {
            if u >= dims.num_controls[f] {
                return Err(InferenceError::ActionOutOfRange {
                    factor: f,
                    value: u,
                    size: dims.num_controls[f],
                });
            }
        }
    }

    // Step 1: predicted prior per factor.
    let predicted: Vec<Array1<f64>> = (0..num_factors)
        .map(|f| match action {
            Some(action) => model.predict_factor(f, prev.factor(f), action[f]),
            None => model.prior(f).clone(),
        })
        .collect();
    let ln_prior: Vec<Array1<f64>> = predicted.iter().map(|p| p.mapv(ln_floored)).collect();

    // Observed likelihood slices in log space, for the free-energy accuracy
    // term.
    let ln_lik: Vec<ArrayD<f64>> = (0..num_modalities)
        .map(|m| {
            model
                .likelihood(m)
                .index_axis(Axis(0), observation[m])
                .mapv(ln_floored)
        })
        .collect();

    // Steps 2-4: coordinate-ascent sweeps.
    let mut qs = predicted;
    let mut free_energy = f64::INFINITY;
    let mut iterations = 0;
    for _ in 0..settings.max_iterations {
        iterations += 1;
        for f in 0..num_factors {
            let mut ln_q = ln_prior[f].clone();
            for (m, &o) in observation.iter().enumerate() {
                let message = model.expected_observation_given(m, &qs, f);
                for (dst, v) in ln_q.iter_mut().zip(message.row(o).iter()) {
                    *dst += ln_floored(*v);
                }
            }
            qs[f] = Array1::from_vec(softmax(&ln_q.to_vec()));
        }
        let swept = variational_free_energy(&qs, &ln_prior, &ln_lik);
        let improved = free_energy - swept;
        free_energy = swept;
        if improved < settings.convergence_threshold {
            break;
        }
    }

    let posterior = Belief::from_normalized(qs);
    let entropy_change = posterior.entropy() - prev.entropy();
    Ok(InferenceOutcome {
        posterior,
        free_energy,
        iterations,
        entropy_change,
    })
}

/// Variational free energy of a factorized posterior:
/// complexity (KL from the predicted prior) minus accuracy
/// (expected log-likelihood of the observed outcome).
fn variational_free_energy(
    qs: &[Array1<f64>],
    ln_prior: &[Array1<f64>],
    ln_lik: &[ArrayD<f64>],
) -> f64 {
    let complexity: f64 = qs
        .iter()
        .zip(ln_prior.iter())
        .map(|(q, lp)| {
            q.iter()
                .zip(lp.iter())
                .map(|(&qi, &lpi)| if qi > 0.0 { qi * (ln_floored(qi) - lpi) } else { 0.0 })
                .sum::<f64>()
        })
        .sum();
    let accuracy: f64 = ln_lik
        .iter()
        .map(|lt| marginalize_states(lt.view(), qs, None).sum())
        .sum();
    complexity - accuracy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelDimensions, NormalizationPolicy};
    use ndarray::{arr1, Array3, ArrayD, IxDyn};

    /// Single factor (3 states, 3 move-to actions), one modality.
    /// `noise` = 0.0 gives an identity (deterministic) likelihood.
    fn single_factor_model(noise: f64) -> GenerativeModel {
        let dims = ModelDimensions::new(vec![3], vec![3], vec![3]).unwrap();
        let mut a = ArrayD::zeros(IxDyn(&[3, 3]));
        for s in 0..3 {
            for o in 0..3 {
                a[[o, s]] = if o == s { 1.0 - noise } else { noise / 2.0 };
            }
        }
        let mut b = Array3::zeros((3, 3, 3));
        for u in 0..3 {
            for s in 0..3 {
                b[(u, s, u)] = 1.0; // move-to-u regardless of origin
            }
        }
        GenerativeModel::new(dims, vec![a], vec![b], None, None, NormalizationPolicy::Strict)
            .unwrap()
    }

    #[test]
    fn test_uniform_likelihood_returns_predicted_prior() {
        // All columns uniform: the observation carries no information.
        let dims = ModelDimensions::new(vec![2], vec![3], vec![1]).unwrap();
        let a = ArrayD::from_elem(IxDyn(&[2, 3]), 0.5);
        let mut b = Array3::zeros((3, 3, 1));
        for s in 0..3 {
            b[(s, s, 0)] = 1.0;
        }
        let d = vec![arr1(&[0.6, 0.3, 0.1])];
        let model = GenerativeModel::new(
            dims,
            vec![a],
            vec![b],
            None,
            Some(d),
            NormalizationPolicy::Strict,
        )
        .unwrap();

        let prev = Belief::from_prior(&model);
        let outcome =
            infer_states(&model, &prev, None, &[1], &InferenceSettings::default()).unwrap();
        for (q, p) in outcome
            .posterior
            .factor(0)
            .iter()
            .zip(model.prior(0).iter())
        {
            assert!((q - p).abs() < 1e-10);
        }
    }

    #[test]
    fn test_deterministic_likelihood_collapses_belief() {
        let model = single_factor_model(0.0);
        let prev = Belief::new(vec![arr1(&[0.4, 0.3, 0.3])]).unwrap();
        let outcome =
            infer_states(&model, &prev, None, &[2], &InferenceSettings::default()).unwrap();
        let q = outcome.posterior.factor(0);
        assert!(q[2] > 1.0 - 1e-9);
        assert!(q[0] < 1e-9 && q[1] < 1e-9);
    }

    #[test]
    fn test_action_shifts_predicted_prior() {
        let model = single_factor_model(0.4);
        let prev = Belief::new(vec![arr1(&[1.0, 0.0, 0.0])]).unwrap();
        // Move to state 1, then observe noisily from state 1.
        let outcome = infer_states(
            &model,
            &prev,
            Some(&[1]),
            &[1],
            &InferenceSettings::default(),
        )
        .unwrap();
        assert_eq!(outcome.posterior.argmax(), vec![1]);
    }

    #[test]
    fn test_observation_out_of_range_rejected() {
        let model = single_factor_model(0.1);
        let prev = Belief::from_prior(&model);
        let result = infer_states(&model, &prev, None, &[3], &InferenceSettings::default());
        assert!(matches!(
            result,
            Err(InferenceError::ObservationOutOfRange { .. })
        ));
    }

    #[test]
    fn test_wrong_modality_count_rejected() {
        let model = single_factor_model(0.1);
        let prev = Belief::from_prior(&model);
        let result = infer_states(&model, &prev, None, &[0, 0], &InferenceSettings::default());
        assert!(matches!(
            result,
            Err(InferenceError::ModalityCountMismatch { .. })
        ));
    }

    #[test]
    fn test_action_out_of_range_rejected() {
        let model = single_factor_model(0.1);
        let prev = Belief::from_prior(&model);
        let result = infer_states(
            &model,
            &prev,
            Some(&[7]),
            &[0],
            &InferenceSettings::default(),
        );
        assert!(matches!(
            result,
            Err(InferenceError::ActionOutOfRange { .. })
        ));
    }

    #[test]
    fn test_coupled_factors_stay_normalized() {
        // One modality reads both factors, forcing cross-factor messages.
        let dims = ModelDimensions::new(vec![4], vec![2, 2], vec![1, 1]).unwrap();
        let mut a = ArrayD::zeros(IxDyn(&[4, 2, 2]));
        for s0 in 0..2 {
            for s1 in 0..2 {
                let joint = 2 * s0 + s1;
                for o in 0..4 {
                    a[[o, s0, s1]] = if o == joint { 0.7 } else { 0.1 };
                }
            }
        }
        let mut b = Array3::zeros((2, 2, 1));
        b[(0, 0, 0)] = 1.0;
        b[(1, 1, 0)] = 1.0;
        let model = GenerativeModel::new(
            dims,
            vec![a],
            vec![b.clone(), b],
            None,
            None,
            NormalizationPolicy::Strict,
        )
        .unwrap();

        let prev = Belief::from_prior(&model);
        let outcome =
            infer_states(&model, &prev, None, &[3], &InferenceSettings::default()).unwrap();
        // Observation 3 corresponds to (s0=1, s1=1).
        assert_eq!(outcome.posterior.argmax(), vec![1, 1]);
        for f in 0..2 {
            let sum: f64 = outcome.posterior.factor(f).sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
        assert!(outcome.free_energy.is_finite());
        assert!(outcome.iterations >= 1);
    }

    #[test]
    fn test_zero_iteration_cap_rejected() {
        // A zero cap would silently return the predicted prior with
        // infinite free energy instead of absorbing the observation.
        let model = single_factor_model(0.0);
        let prev = Belief::from_prior(&model);
        let settings = InferenceSettings {
            max_iterations: 0,
            convergence_threshold: 1e-4,
        };
        let result = infer_states(&model, &prev, None, &[2], &settings);
        assert!(matches!(result, Err(InferenceError::ZeroIterationCap)));
    }

    #[test]
    fn test_convergence_stops_early() {
        let model = single_factor_model(0.0);
        let prev = Belief::from_prior(&model);
        let settings = InferenceSettings {
            max_iterations: 50,
            convergence_threshold: 1e-8,
        };
        let outcome = infer_states(&model, &prev, None, &[0], &settings).unwrap();
        // A single-factor model reaches its fixed point in one sweep.
        assert!(outcome.iterations < 50);
    }
}
