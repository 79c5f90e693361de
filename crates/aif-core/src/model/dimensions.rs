//! Shape metadata for the generative model, validated once at construction.

use serde::{Deserialize, Serialize};

use crate::model::ModelError;

/// Sizes of every observation modality, hidden-state factor, and control
/// factor.
///
/// Factors with a single admissible action (`num_controls[f] == 1`) are
/// uncontrollable; the lone index 0 is their no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDimensions {
    /// Number of observation indices per modality.
    pub num_obs: Vec<usize>,
    /// Number of hidden-state indices per factor.
    pub num_states: Vec<usize>,
    /// Number of admissible actions per factor.
    pub num_controls: Vec<usize>,
}

impl ModelDimensions {
    /// Validate and build shape metadata.
    ///
    /// Every size must be at least 1 and `num_controls` must pair one entry
    /// with each hidden-state factor.
    pub fn new(
        num_obs: Vec<usize>,
        num_states: Vec<usize>,
        num_controls: Vec<usize>,
    ) -> Result<Self, ModelError> {
        if num_obs.is_empty() {
            return Err(ModelError::NoModalities);
        }
        if num_states.is_empty() {
            return Err(ModelError::NoFactors);
        }
        if num_controls.len() != num_states.len() {
            return Err(ModelError::ControlCountMismatch {
                factors: num_states.len(),
                controls: num_controls.len(),
            });
        }
        for (m, &size) in num_obs.iter().enumerate() {
            if size == 0 {
                return Err(ModelError::ZeroDimension {
                    table: "num_obs",
                    index: m,
                });
            }
        }
        for (f, &size) in num_states.iter().enumerate() {
            if size == 0 {
                return Err(ModelError::ZeroDimension {
                    table: "num_states",
                    index: f,
                });
            }
        }
        for (f, &size) in num_controls.iter().enumerate() {
            if size == 0 {
                return Err(ModelError::ZeroDimension {
                    table: "num_controls",
                    index: f,
                });
            }
        }
        Ok(Self {
            num_obs,
            num_states,
            num_controls,
        })
    }

    /// Number of observation modalities.
    pub fn num_modalities(&self) -> usize {
        self.num_obs.len()
    }

    /// Number of hidden-state factors.
    pub fn num_factors(&self) -> usize {
        self.num_states.len()
    }

    /// True if factor `f` has more than one admissible action.
    pub fn is_controllable(&self, f: usize) -> bool {
        self.num_controls[f] > 1
    }

    /// Indices of the controllable factors.
    pub fn controllable_factors(&self) -> Vec<usize> {
        (0..self.num_factors())
            .filter(|&f| self.is_controllable(f))
            .collect()
    }

    /// Size of the policy space for a planning horizon.
    ///
    /// Exponential in the horizon and in the number of simultaneously
    /// controllable factors; a known scaling limit of exhaustive
    /// enumeration.
    pub fn num_policies(&self, horizon: usize) -> usize {
        let per_step: usize = self.num_controls.iter().product();
        per_step.pow(horizon as u32)
    }

    /// Expected shape of the likelihood tensor for modality `m`:
    /// `(O_m, S_1, …, S_F)`.
    pub fn likelihood_shape(&self, m: usize) -> Vec<usize> {
        let mut shape = Vec::with_capacity(1 + self.num_factors());
        shape.push(self.num_obs[m]);
        shape.extend_from_slice(&self.num_states);
        shape
    }

    /// Expected shape of the transition tensor for factor `f`:
    /// `(S_f, S_f, U_f)`.
    pub fn transition_shape(&self, f: usize) -> (usize, usize, usize) {
        (self.num_states[f], self.num_states[f], self.num_controls[f])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_accept_valid() {
        let dims = ModelDimensions::new(vec![4, 3, 2], vec![4, 2], vec![4, 1]).unwrap();
        assert_eq!(dims.num_modalities(), 3);
        assert_eq!(dims.num_factors(), 2);
        assert!(dims.is_controllable(0));
        assert!(!dims.is_controllable(1));
        assert_eq!(dims.controllable_factors(), vec![0]);
    }

    #[test]
    fn test_dimensions_reject_mismatched_controls() {
        let result = ModelDimensions::new(vec![2], vec![3, 3], vec![3]);
        assert!(matches!(
            result,
            Err(ModelError::ControlCountMismatch { .. })
        ));
    }

    #[test]
    fn test_dimensions_reject_zero_sizes() {
        let result = ModelDimensions::new(vec![0], vec![2], vec![1]);
        assert!(matches!(result, Err(ModelError::ZeroDimension { .. })));
    }

    #[test]
    fn test_policy_space_size() {
        let dims = ModelDimensions::new(vec![4], vec![4, 2], vec![4, 1]).unwrap();
        assert_eq!(dims.num_policies(1), 4);
        assert_eq!(dims.num_policies(2), 16);
        assert_eq!(dims.num_policies(3), 64);
    }

    #[test]
    fn test_expected_shapes() {
        let dims = ModelDimensions::new(vec![4, 3], vec![4, 2], vec![4, 1]).unwrap();
        assert_eq!(dims.likelihood_shape(1), vec![3, 4, 2]);
        assert_eq!(dims.transition_shape(0), (4, 4, 4));
        assert_eq!(dims.transition_shape(1), (2, 2, 1));
    }
}
