//! Generative model store for the factorized POMDP.
//!
//! Holds the four probability tables of the generative model:
//! - `A` — per-modality observation likelihood, shape `(O_m, S_1, …, S_F)`
//! - `B` — per-factor transition likelihood, shape `(S_f, S_f, U_f)` indexed
//!   (next, previous, action)
//! - `C` — per-modality log-preferences over observations, never normalized
//!   in place (magnitude encodes preference strength)
//! - `D` — per-factor prior over initial hidden states
//!
//! Construction validates every shape against [`ModelDimensions`] and checks
//! column normalization: each likelihood column (fixed state configuration)
//! and each transition column (fixed previous state and action) must sum to
//! one. Callers opt into column-wise repair via
//! [`NormalizationPolicy::Repair`]; the default is to reject.
//!
//! The store also owns the conditional-expectation operator: contracting a
//! likelihood tensor against one belief vector per factor axis. The same
//! multilinear map drives state inference (one factor held free) and policy
//! rollout (full contraction), so it is implemented once here.

mod dimensions;

pub use dimensions::ModelDimensions;

use ndarray::{Array1, Array2, Array3, ArrayD, ArrayViewD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use aif_math::{entropy, normalize_in_place, softmax, NORMALIZATION_TOL, PROB_FLOOR};

/// Errors raised while constructing or validating a generative model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model has no observation modalities")]
    NoModalities,

    #[error("model has no hidden-state factors")]
    NoFactors,

    #[error("{factors} hidden-state factors but {controls} control entries")]
    ControlCountMismatch { factors: usize, controls: usize },

    #[error("{table}[{index}] has size zero")]
    ZeroDimension { table: &'static str, index: usize },

    #[error("expected {expected} likelihood tensors, got {actual}")]
    LikelihoodCount { expected: usize, actual: usize },

    #[error("likelihood tensor {modality} has shape {actual:?}, expected {expected:?}")]
    LikelihoodShape {
        modality: usize,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("expected {expected} transition tensors, got {actual}")]
    TransitionCount { expected: usize, actual: usize },

    #[error("transition tensor {factor} has shape {actual:?}, expected {expected:?}")]
    TransitionShape {
        factor: usize,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("expected {expected} preference vectors, got {actual}")]
    PreferenceCount { expected: usize, actual: usize },

    #[error("expected {expected} prior vectors, got {actual}")]
    PriorCount { expected: usize, actual: usize },

    #[error("preference vector {modality} has length {actual}, expected {expected}")]
    PreferenceLength {
        modality: usize,
        expected: usize,
        actual: usize,
    },

    #[error("prior vector {factor} has length {actual}, expected {expected}")]
    PriorLength {
        factor: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{table}[{index}] contains a negative probability")]
    NegativeEntry { table: &'static str, index: usize },

    #[error("{table}[{index}] has a column summing to {sum} (tolerance {tol})")]
    NotNormalized {
        table: &'static str,
        index: usize,
        sum: f64,
        tol: f64,
    },
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// What to do when a supplied table column does not sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationPolicy {
    /// Reject the table with [`ModelError::NotNormalized`].
    #[default]
    Strict,
    /// Rescale each offending column to sum to one. Idempotent on already
    /// normalized input; zero-mass columns become uniform.
    Repair,
}

/// The immutable generative model: A/B/C/D tables plus shape metadata.
///
/// Tables are validated at construction and never mutated afterwards, so
/// shared references can be handed to parallel policy-scoring workers
/// without locking.
#[derive(Debug, Clone)]
pub struct GenerativeModel {
    dims: ModelDimensions,
    a: Vec<ArrayD<f64>>,
    b: Vec<Array3<f64>>,
    c: Vec<Array1<f64>>,
    d: Vec<Array1<f64>>,
    /// Per-modality conditional entropy of A over the observation axis,
    /// shape `(S_1, …, S_F)`; precomputed for the ambiguity term.
    a_entropy: Vec<ArrayD<f64>>,
    /// Per-modality preference distribution `softmax(C_m)`.
    preference_dist: Vec<Array1<f64>>,
}

impl GenerativeModel {
    /// Build and validate a generative model.
    ///
    /// `c` defaults to all-zero log-preferences (no preference) and `d` to
    /// uniform priors when absent. Fails without partial construction on any
    /// shape mismatch; normalization violations are rejected or repaired
    /// according to `policy`.
    pub fn new(
        dims: ModelDimensions,
        a: Vec<ArrayD<f64>>,
        b: Vec<Array3<f64>>,
        c: Option<Vec<Array1<f64>>>,
        d: Option<Vec<Array1<f64>>>,
        policy: NormalizationPolicy,
    ) -> Result<Self> {
        let mut a = a;
        let mut b = b;

        if a.len() != dims.num_modalities() {
            return Err(ModelError::LikelihoodCount {
                expected: dims.num_modalities(),
                actual: a.len(),
            });
        }
        for (m, table) in a.iter().enumerate() {
            let expected = dims.likelihood_shape(m);
            if table.shape() != expected.as_slice() {
                return Err(ModelError::LikelihoodShape {
                    modality: m,
                    expected,
                    actual: table.shape().to_vec(),
                });
            }
        }

        if b.len() != dims.num_factors() {
            return Err(ModelError::TransitionCount {
                expected: dims.num_factors(),
                actual: b.len(),
            });
        }
        for (f, table) in b.iter().enumerate() {
            let (s, s2, u) = dims.transition_shape(f);
            if table.dim() != (s, s2, u) {
                return Err(ModelError::TransitionShape {
                    factor: f,
                    expected: vec![s, s2, u],
                    actual: table.shape().to_vec(),
                });
            }
        }

        let c = match c {
            Some(c) => {
                if c.len() != dims.num_modalities() {
                    return Err(ModelError::PreferenceCount {
                        expected: dims.num_modalities(),
                        actual: c.len(),
                    });
                }
                for (m, v) in c.iter().enumerate() {
                    if v.len() != dims.num_obs[m] {
                        return Err(ModelError::PreferenceLength {
                            modality: m,
                            expected: dims.num_obs[m],
                            actual: v.len(),
                        });
                    }
                }
                c
            }
            None => dims.num_obs.iter().map(|&n| Array1::zeros(n)).collect(),
        };

        let mut d = match d {
            Some(d) => {
                if d.len() != dims.num_factors() {
                    return Err(ModelError::PriorCount {
                        expected: dims.num_factors(),
                        actual: d.len(),
                    });
                }
                for (f, v) in d.iter().enumerate() {
                    if v.len() != dims.num_states[f] {
                        return Err(ModelError::PriorLength {
                            factor: f,
                            expected: dims.num_states[f],
                            actual: v.len(),
                        });
                    }
                }
                d
            }
            None => dims
                .num_states
                .iter()
                .map(|&n| Array1::from_elem(n, 1.0 / n as f64))
                .collect(),
        };

        for (m, table) in a.iter_mut().enumerate() {
            check_or_repair_columns(table.view_mut().into_dyn(), "A", m, policy)?;
        }
        for (f, table) in b.iter_mut().enumerate() {
            check_or_repair_columns(table.view_mut().into_dyn(), "B", f, policy)?;
        }
        for (f, v) in d.iter_mut().enumerate() {
            check_or_repair_columns(v.view_mut().into_dyn(), "D", f, policy)?;
        }

        let a_entropy = a
            .iter()
            .map(|table| {
                let plogp = table.mapv(|p| if p > PROB_FLOOR { p * p.ln() } else { 0.0 });
                -plogp.sum_axis(Axis(0))
            })
            .collect();
        let preference_dist = c
            .iter()
            .map(|v| Array1::from_vec(softmax(&v.to_vec())))
            .collect();

        Ok(Self {
            dims,
            a,
            b,
            c,
            d,
            a_entropy,
            preference_dist,
        })
    }

    /// Shape metadata.
    pub fn dims(&self) -> &ModelDimensions {
        &self.dims
    }

    /// Likelihood tensor for modality `m`.
    pub fn likelihood(&self, m: usize) -> &ArrayD<f64> {
        &self.a[m]
    }

    /// Transition tensor for factor `f`.
    pub fn transition(&self, f: usize) -> &Array3<f64> {
        &self.b[f]
    }

    /// Log-preference vector for modality `m` (unnormalized by design).
    pub fn preferences(&self, m: usize) -> &Array1<f64> {
        &self.c[m]
    }

    /// Preference distribution `softmax(C_m)`.
    pub fn preference_dist(&self, m: usize) -> &Array1<f64> {
        &self.preference_dist[m]
    }

    /// Prior over factor `f`'s initial state.
    pub fn prior(&self, f: usize) -> &Array1<f64> {
        &self.d[f]
    }

    /// All per-factor priors.
    pub fn priors(&self) -> &[Array1<f64>] {
        &self.d
    }

    /// True if every A column, B column, and D vector sums to one within
    /// tolerance. Always holds after successful construction.
    pub fn is_normalized(&self) -> bool {
        self.a
            .iter()
            .all(|t| columns_normalized(t.view().into_dyn()))
            && self
                .b
                .iter()
                .all(|t| columns_normalized(t.view().into_dyn()))
            && self
                .d
                .iter()
                .all(|v| columns_normalized(v.view().into_dyn()))
    }

    /// One transition step for factor `f`: `B_f[:, :, u] · q`.
    pub fn predict_factor(&self, f: usize, q: &Array1<f64>, u: usize) -> Array1<f64> {
        debug_assert!(u < self.dims.num_controls[f]);
        self.b[f].index_axis(Axis(2), u).dot(q)
    }

    /// Marginal observation distribution for modality `m` under per-factor
    /// beliefs: `Qo[o] = Σ_s A[o, s] ∏_f q_f(s_f)`.
    pub fn expected_observation(&self, m: usize, factors: &[Array1<f64>]) -> Array1<f64> {
        let table = &self.a[m];
        let values = (0..self.dims.num_obs[m])
            .map(|o| scalar(marginalize_states(table.index_axis(Axis(0), o), factors, None)))
            .collect::<Vec<f64>>();
        Array1::from_vec(values)
    }

    /// Conditional-expectation operator with factor `free` held free:
    /// a `(O_m, S_free)` matrix whose row `o` is the likelihood of `o`
    /// as a function of factor `free`, all other factors marginalized out.
    pub fn expected_observation_given(
        &self,
        m: usize,
        factors: &[Array1<f64>],
        free: usize,
    ) -> Array2<f64> {
        let table = &self.a[m];
        let rows = self.dims.num_obs[m];
        let cols = self.dims.num_states[free];
        let mut out = Array2::zeros((rows, cols));
        for o in 0..rows {
            let row = marginalize_states(table.index_axis(Axis(0), o), factors, Some(free));
            for (s, v) in row.iter().enumerate() {
                out[(o, s)] = *v;
            }
        }
        out
    }

    /// Expected conditional entropy of modality `m`'s likelihood under the
    /// given state beliefs: the ambiguity term of the expected free energy.
    pub fn expected_ambiguity(&self, m: usize, factors: &[Array1<f64>]) -> f64 {
        scalar(marginalize_states(
            self.a_entropy[m].view(),
            factors,
            None,
        ))
    }

    /// Entropy of the preference distribution for modality `m`.
    pub fn preference_entropy(&self, m: usize) -> f64 {
        entropy(&self.preference_dist[m].to_vec())
    }
}

/// Contract a state tensor of shape `(S_1, …, S_F)` against one weight
/// vector per factor axis, optionally holding one factor free.
///
/// Axes are contracted from the last factor to the first so remaining axis
/// indices stay stable. The result has rank 1 (the held factor) or rank 0.
pub(crate) fn marginalize_states(
    table: ArrayViewD<'_, f64>,
    weights: &[Array1<f64>],
    hold: Option<usize>,
) -> ArrayD<f64> {
    let mut result = table.to_owned();
    for f in (0..weights.len()).rev() {
        if hold == Some(f) {
            continue;
        }
        result = contract_axis(&result, f, &weights[f]);
    }
    result
}

/// Weighted sum of `arr` slices along `axis`.
fn contract_axis(arr: &ArrayD<f64>, axis: usize, w: &Array1<f64>) -> ArrayD<f64> {
    let mut shape = arr.shape().to_vec();
    shape.remove(axis);
    let mut out = ArrayD::<f64>::zeros(IxDyn(&shape));
    for (k, slice) in arr.axis_iter(Axis(axis)).enumerate() {
        out.scaled_add(w[k], &slice);
    }
    out
}

/// Extract the value of a rank-0 contraction result.
fn scalar(arr: ArrayD<f64>) -> f64 {
    debug_assert_eq!(arr.ndim(), 0);
    arr.sum()
}

/// True if every lane of `table` along axis 0 is a distribution.
fn columns_normalized(table: ArrayViewD<'_, f64>) -> bool {
    table.lanes(Axis(0)).into_iter().all(|lane| {
        lane.iter().all(|&p| p >= 0.0 && !p.is_nan())
            && (lane.sum() - 1.0).abs() <= NORMALIZATION_TOL
    })
}

/// Validate every column of `table` along axis 0, repairing under
/// [`NormalizationPolicy::Repair`].
fn check_or_repair_columns(
    mut table: ndarray::ArrayViewMutD<'_, f64>,
    name: &'static str,
    index: usize,
    policy: NormalizationPolicy,
) -> Result<()> {
    for lane in table.lanes(Axis(0)) {
        if lane.iter().any(|&p| p < 0.0 || p.is_nan()) {
            return Err(ModelError::NegativeEntry { table: name, index });
        }
    }
    let mut repaired = false;
    for mut lane in table.lanes_mut(Axis(0)) {
        let sum = lane.sum();
        if (sum - 1.0).abs() <= NORMALIZATION_TOL {
            continue;
        }
        match policy {
            NormalizationPolicy::Strict => {
                return Err(ModelError::NotNormalized {
                    table: name,
                    index,
                    sum,
                    tol: NORMALIZATION_TOL,
                });
            }
            NormalizationPolicy::Repair => {
                let mut column: Vec<f64> = lane.iter().copied().collect();
                normalize_in_place(&mut column);
                for (dst, src) in lane.iter_mut().zip(column.iter()) {
                    *dst = *src;
                }
                repaired = true;
            }
        }
    }
    if repaired {
        warn!(table = name, index, "normalization repaired by column rescale");
    }
    Ok(())
}
