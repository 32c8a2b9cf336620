//! Beta-Poisson compound distribution.
//!
//! BP3: `V ~ Poisson(lambda * p)`, `p ~ Beta(alpha, beta)`.
//! BP4: `V = lambda2 * BP3(alpha, beta, lambda1)`.
//!
//! The mixing integral `∫ Beta(p; alpha, beta) Poisson(v; lambda p) dp` is
//! evaluated with a [`QUADRATURE_ORDER`]-point Gauss–Jacobi rule with
//! exponents `(beta - 1, alpha - 1)`; node `x` maps to `p = (x + 1) / 2`, and
//! the weighted sum is normalized by `1 / B(alpha, beta)` and
//! `2^(1 - alpha - beta)`. The normalization is combined with the rule's
//! `ln μ₀` in log space so large shapes do not overflow.

use rand::Rng;
use rand_distr::{Beta, Distribution, Poisson};
use tbk_core::{CompressedSample, Error, ModelKind, Result};

use crate::math::ln_beta;
use crate::poisson;
use crate::quadrature::GaussJacobi;

/// Number of Gauss–Jacobi nodes used for the mixing integral.
pub const QUADRATURE_ORDER: usize = 50;

/// Added to every probability before the logarithm so underflow gives a finite NLL.
pub const LIKELIHOOD_FLOOR: f64 = 1e-10;

fn check_positive(name: &str, v: f64) -> Result<()> {
    if !v.is_finite() || v <= 0.0 {
        return Err(Error::Validation(format!("{name} must be finite and > 0, got {v}")));
    }
    Ok(())
}

/// Draw `size` BP3 counts.
pub fn sample<R: Rng + ?Sized>(
    alpha: f64,
    beta: f64,
    lambda: f64,
    size: usize,
    rng: &mut R,
) -> Result<Vec<f64>> {
    check_positive("alpha", alpha)?;
    check_positive("beta", beta)?;
    check_positive("lambda", lambda)?;
    if size == 0 {
        return Err(Error::Validation("size must be >= 1".to_string()));
    }

    let activity = Beta::new(alpha, beta)
        .map_err(|e| Error::Validation(format!("invalid Beta({alpha}, {beta}): {e}")))?;

    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        let mean = lambda * activity.sample(rng);
        let count = if mean > 0.0 {
            Poisson::new(mean)
                .map_err(|e| Error::Computation(format!("invalid Poisson({mean}): {e}")))?
                .sample(rng)
        } else {
            0.0
        };
        out.push(count);
    }
    Ok(out)
}

/// Draw `size` BP4 counts: `lambda2 * BP3(alpha, beta, lambda1)`.
///
/// With `lambda2 == 1` this consumes the generator exactly like [`sample`].
pub fn sample4<R: Rng + ?Sized>(
    alpha: f64,
    beta: f64,
    lambda1: f64,
    lambda2: f64,
    size: usize,
    rng: &mut R,
) -> Result<Vec<f64>> {
    check_positive("lambda2", lambda2)?;
    let mut out = sample(alpha, beta, lambda1, size, rng)?;
    for v in &mut out {
        *v *= lambda2;
    }
    Ok(out)
}

/// Per-value BP4 probabilities.
///
/// NaN parameters (an optimizer probing invalid territory) or a NaN
/// quadrature result give an all-NaN vector.
pub fn likelihood4(alpha: f64, beta: f64, lambda1: f64, lambda2: f64, values: &[f64]) -> Vec<f64> {
    let nan = || vec![f64::NAN; values.len()];
    if [alpha, beta, lambda1, lambda2].iter().any(|p| p.is_nan()) {
        return nan();
    }

    let rule = match GaussJacobi::new(QUADRATURE_ORDER, beta - 1.0, alpha - 1.0) {
        Ok(rule) => rule,
        Err(_) => return nan(),
    };

    let ln_scale = rule.ln_mass() - ln_beta(alpha, beta)
        + (1.0 - alpha - beta) * std::f64::consts::LN_2;
    let scale = ln_scale.exp();
    let means: Vec<f64> = rule.nodes().iter().map(|&x| lambda1 * (x + 1.0) / 2.0).collect();

    let mut probs = Vec::with_capacity(values.len());
    for &v in values {
        let k = v / lambda2;
        let chance: f64 = means
            .iter()
            .zip(rule.unit_weights())
            .map(|(&mu, &w)| w * poisson::pmf_unchecked(k, mu))
            .sum();
        probs.push(scale * chance);
    }

    if probs.iter().any(|p| p.is_nan()) {
        return nan();
    }
    probs
}

/// Per-value BP3 probabilities (BP4 with `lambda2 = 1`).
pub fn likelihood3(alpha: f64, beta: f64, lambda: f64, values: &[f64]) -> Vec<f64> {
    likelihood4(alpha, beta, lambda, 1.0, values)
}

fn floored_nll(probs: &[f64], weights: Option<&[f64]>) -> f64 {
    match weights {
        Some(w) => -probs.iter().zip(w).map(|(&p, &c)| c * (p + LIKELIHOOD_FLOOR).ln()).sum::<f64>(),
        None => -probs.iter().map(|&p| (p + LIKELIHOOD_FLOOR).ln()).sum::<f64>(),
    }
}

/// Negative log-likelihood of `values` under BP3.
pub fn nll3(alpha: f64, beta: f64, lambda: f64, values: &[f64]) -> f64 {
    floored_nll(&likelihood3(alpha, beta, lambda, values), None)
}

/// Negative log-likelihood of `values` under BP4.
pub fn nll4(alpha: f64, beta: f64, lambda1: f64, lambda2: f64, values: &[f64]) -> f64 {
    floored_nll(&likelihood4(alpha, beta, lambda1, lambda2, values), None)
}

/// Per-value probabilities, dispatched on the arity of `params`.
pub fn likelihood(params: &[f64], values: &[f64]) -> Result<Vec<f64>> {
    Ok(match ModelKind::from_arity(params.len())? {
        ModelKind::Bp3 => likelihood3(params[0], params[1], params[2], values),
        ModelKind::Bp4 => likelihood4(params[0], params[1], params[2], params[3], values),
    })
}

/// Negative log-likelihood with per-value occurrence weights.
///
/// Equal to the unweighted NLL of the expanded sample.
pub fn nll_weighted(params: &[f64], values: &[f64], weights: &[f64]) -> Result<f64> {
    if values.len() != weights.len() {
        return Err(Error::Validation(format!(
            "values and weights length mismatch: {} != {}",
            values.len(),
            weights.len()
        )));
    }
    Ok(floored_nll(&likelihood(params, values)?, Some(weights)))
}

/// Negative log-likelihood of a raw sample; BP3 or BP4 by `params.len()`.
pub fn nll(params: &[f64], values: &[f64]) -> Result<f64> {
    Ok(floored_nll(&likelihood(params, values)?, None))
}

/// Negative log-likelihood of a compressed sample.
pub fn nll_compressed(params: &[f64], sample: &CompressedSample) -> Result<f64> {
    nll_weighted(params, sample.values(), &sample.weights())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use statrs::distribution::Continuous;

    #[test]
    fn test_bp4_reduces_to_bp3() {
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let bp3 = sample(2.0, 3.0, 1.0, 25, &mut rng).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            let bp4 = sample4(2.0, 3.0, 1.0, 1.0, 25, &mut rng).unwrap();
            assert_eq!(bp3, bp4);
        }
    }

    #[test]
    fn test_sample_mean() {
        let (alpha, beta, lambda) = (2.0, 0.5, 4.0);
        let mut rng = StdRng::seed_from_u64(7);
        let xs = sample(alpha, beta, lambda, 20_000, &mut rng).unwrap();
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        assert_relative_eq!(mean, lambda * alpha / (alpha + beta), max_relative = 0.03);
        assert!(xs.iter().all(|&v| v >= 0.0 && v.fract() == 0.0));
    }

    #[test]
    fn test_sample_invalid_args() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample(0.0, 1.0, 1.0, 5, &mut rng).is_err());
        assert!(sample(1.0, 1.0, -1.0, 5, &mut rng).is_err());
        assert!(sample(1.0, 1.0, 1.0, 0, &mut rng).is_err());
        assert!(sample4(1.0, 1.0, 1.0, 0.0, 5, &mut rng).is_err());
    }

    #[test]
    fn test_likelihood_normalized() {
        let values: Vec<f64> = (0..400).map(|k| k as f64).collect();
        for &(a, b, l) in &[(2.0, 3.0, 10.0), (0.4, 1.5, 30.0), (2.327, 0.255, 7.445)] {
            let total: f64 = likelihood3(a, b, l, &values).iter().sum();
            assert_relative_eq!(total, 1.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_likelihood_matches_direct_integration() {
        let (alpha, beta, lambda) = (2.5, 3.5, 12.0);
        let mixing = statrs::distribution::Beta::new(alpha, beta).unwrap();
        let n = 20_000;
        for k in [0.0, 1.0, 4.0, 9.0] {
            let direct: f64 = (0..n)
                .map(|i| {
                    let p = (i as f64 + 0.5) / n as f64;
                    let lp = mixing.ln_pdf(p) + poisson::logpmf_unchecked(k, lambda * p);
                    lp.exp() / n as f64
                })
                .sum();
            let quad = likelihood3(alpha, beta, lambda, &[k])[0];
            assert_relative_eq!(quad, direct, max_relative = 1e-5);
        }
    }

    #[test]
    fn test_nan_params_short_circuit() {
        let probs = likelihood3(f64::NAN, 1.0, 1.0, &[0.0, 1.0, 2.0]);
        assert_eq!(probs.len(), 3);
        assert!(probs.iter().all(|p| p.is_nan()));
        assert!(likelihood4(1.0, 1.0, 1.0, f64::NAN, &[1.0]).iter().all(|p| p.is_nan()));
    }

    #[test]
    fn test_floor_keeps_nll_finite() {
        // Essentially zero probability for an extreme count.
        let v = nll3(1.0, 1.0, 1.0, &[1000.0]);
        assert_relative_eq!(v, -LIKELIHOOD_FLOOR.ln(), max_relative = 1e-6);
    }

    #[test]
    fn test_compressed_matches_expanded() {
        let mut rng = StdRng::seed_from_u64(11);
        let raw = sample(1.5, 2.0, 20.0, 300, &mut rng).unwrap();
        let compressed = CompressedSample::from_values(&raw);
        let params = [1.4, 2.2, 19.0];
        let expanded = nll(&params, &raw).unwrap();
        let weighted = nll_compressed(&params, &compressed).unwrap();
        assert_relative_eq!(expanded, weighted, max_relative = 1e-12);
    }

    #[test]
    fn test_bp4_with_unit_scale_equals_bp3() {
        let values = [0.0, 2.0, 5.0, 11.0];
        let a = nll(&[1.2, 0.8, 9.0], &values).unwrap();
        let b = nll(&[1.2, 0.8, 9.0, 1.0], &values).unwrap();
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }

    #[test]
    fn test_dispatch_rejects_bad_arity() {
        assert!(nll(&[1.0, 1.0], &[1.0]).is_err());
        assert!(nll(&[1.0; 5], &[1.0]).is_err());
        assert!(nll_weighted(&[1.0; 3], &[1.0, 2.0], &[1.0]).is_err());
    }

    proptest! {
        #[test]
        fn prop_likelihood_is_probability(
            alpha in 0.05f64..50.0,
            beta in 0.05f64..50.0,
            lambda in 0.1f64..200.0,
            ks in proptest::collection::vec(0u32..300, 1..20),
        ) {
            let values: Vec<f64> = ks.iter().map(|&k| k as f64).collect();
            let probs = likelihood3(alpha, beta, lambda, &values);
            for p in probs {
                prop_assert!((0.0..=1.0 + 1e-9).contains(&p), "p={}", p);
            }
            prop_assert!(nll3(alpha, beta, lambda, &values).is_finite());
        }
    }
}
