//! Operations on probability simplexes (categorical distributions).
//!
//! Every vector here is a plain `&[f64]`; callers that hold `ndarray` views
//! pass slices. Entropies and divergences are in nats.

use crate::math::stable::{ln_floored, PROB_FLOOR};

/// Tolerance used when checking that a distribution sums to 1.
pub const NORMALIZATION_TOL: f64 = 1e-6;

/// True if `p` sums to 1 within [`NORMALIZATION_TOL`] and has no negative
/// entries.
pub fn is_normalized(p: &[f64]) -> bool {
    if p.is_empty() || p.iter().any(|&x| x < 0.0 || x.is_nan()) {
        return false;
    }
    (p.iter().sum::<f64>() - 1.0).abs() <= NORMALIZATION_TOL
}

/// Rescale `p` in place to sum to 1.
///
/// A zero-mass vector becomes uniform; this matches the repair semantics of
/// column normalization where an all-zero column carries no information.
pub fn normalize_in_place(p: &mut [f64]) {
    let sum: f64 = p.iter().sum();
    if sum <= 0.0 {
        let u = 1.0 / p.len() as f64;
        for x in p.iter_mut() {
            *x = u;
        }
        return;
    }
    for x in p.iter_mut() {
        *x /= sum;
    }
}

/// Normalized copy of `p`.
pub fn normalized(p: &[f64]) -> Vec<f64> {
    let mut out = p.to_vec();
    normalize_in_place(&mut out);
    out
}

/// Shannon entropy H(p) = -sum p ln p, treating 0 ln 0 as 0.
pub fn entropy(p: &[f64]) -> f64 {
    -p.iter()
        .map(|&x| if x > PROB_FLOOR { x * x.ln() } else { 0.0 })
        .sum::<f64>()
}

/// KL divergence D(p || q) with the probability floor applied to `q`.
pub fn kl_divergence(p: &[f64], q: &[f64]) -> f64 {
    debug_assert_eq!(p.len(), q.len());
    p.iter()
        .zip(q.iter())
        .map(|(&pi, &qi)| {
            if pi > PROB_FLOOR {
                pi * (pi.ln() - ln_floored(qi))
            } else {
                0.0
            }
        })
        .sum()
}

/// Cross-entropy -sum p ln q with the probability floor applied to `q`.
pub fn cross_entropy(p: &[f64], q: &[f64]) -> f64 {
    debug_assert_eq!(p.len(), q.len());
    -p.iter()
        .zip(q.iter())
        .map(|(&pi, &qi)| if pi > PROB_FLOOR { pi * ln_floored(qi) } else { 0.0 })
        .sum::<f64>()
}

/// Index of the largest entry; ties resolve to the lowest index.
pub fn argmax(p: &[f64]) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &x) in p.iter().enumerate() {
        if x > best_val {
            best = i;
            best_val = x;
        }
    }
    best
}

/// One-hot vector of length `len` with mass at `index`.
pub fn one_hot(len: usize, index: usize) -> Vec<f64> {
    let mut p = vec![0.0; len];
    p[index] = 1.0;
    p
}

/// Uniform distribution of length `len`.
pub fn uniform(len: usize) -> Vec<f64> {
    vec![1.0 / len as f64; len]
}
