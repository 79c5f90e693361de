//! Numerically stable primitives for log-domain probability math.

/// Floor applied to probabilities before taking logarithms.
///
/// Near-zero entries would otherwise drive `ln(0) = -inf` through belief
/// updates and free-energy sums.
pub const PROB_FLOOR: f64 = 1e-16;

/// Stable log(sum(exp(values))).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    for v in values {
        sum += (*v - max).exp();
    }
    max + sum.ln()
}

/// Stable log(exp(a) + exp(b)).
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    if a == f64::INFINITY || b == f64::INFINITY {
        return f64::INFINITY;
    }
    let m = a.max(b);
    let diff = (a - b).abs();
    m + (-diff).exp().ln_1p()
}

/// Natural log with the probability floor applied first.
pub fn ln_floored(p: f64) -> f64 {
    p.max(PROB_FLOOR).ln()
}

/// Softmax over log-domain scores via log-sum-exp.
///
/// Returns a normalized probability vector; an empty input yields an empty
/// vector. All -inf inputs degrade to uniform rather than NaN.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let lse = log_sum_exp(scores);
    if lse == f64::NEG_INFINITY {
        return vec![1.0 / scores.len() as f64; scores.len()];
    }
    scores.iter().map(|s| (s - lse).exp()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_sum_exp_basic() {
        assert!((log_sum_exp(&[0.0, 0.0]) - 2.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_log_sum_exp_empty_and_neg_inf() {
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
        assert_eq!(
            log_sum_exp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_log_add_exp_matches_direct() {
        let a = -1.3;
        let b = -4.7;
        let direct = ((a as f64).exp() + (b as f64).exp()).ln();
        assert!((log_add_exp(a, b) - direct).abs() < 1e-12);
    }

    #[test]
    fn test_softmax_normalizes() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        let sum: f64 = p.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn test_softmax_all_neg_inf_is_uniform() {
        let p = softmax(&[f64::NEG_INFINITY; 3]);
        for v in &p {
            assert!((v - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ln_floored_never_neg_inf() {
        assert!(ln_floored(0.0).is_finite());
        assert!((ln_floored(0.5) - 0.5_f64.ln()).abs() < 1e-15);
    }
}
