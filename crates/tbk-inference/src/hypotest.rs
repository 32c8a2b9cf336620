//! Two-sample hypothesis tests on Beta-Poisson parameters.
//!
//! Both tests fit the two samples independently and produce one asymptotic
//! χ²₁ p-value per parameter. If either fit fails there are no p-values at all.

use crate::mle::MaximumLikelihoodEstimator;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tbk_core::{
    CompressedSample, Error, FitOutcome, FitResult, ModelKind, ParametricModel, Result,
    TwoSampleTest,
};

fn chi2_one_dof() -> Result<ChiSquared> {
    ChiSquared::new(1.0).map_err(|e| Error::Computation(e.to_string()))
}

fn compress(values: &[f64]) -> CompressedSample {
    CompressedSample::from_values(values)
}

fn fit_both(
    mle: &MaximumLikelihoodEstimator,
    values_1: &[f64],
    values_2: &[f64],
    model: ModelKind,
) -> (FitOutcome, FitOutcome) {
    (mle.fit(values_1, model), mle.fit(values_2, model))
}

/// Likelihood-ratio test: does sample 2 still fit with `θᵢ` fixed at sample 1's estimate?
///
/// For each parameter `i`, sample 2 is refitted with `θᵢ` pinned at `θ̂₁ᵢ`
/// (warm-started from `θ̂₂`). The statistic `2 · (constrained_nll − nll(θ̂₂))`
/// is clipped at zero. An aborted refit drops all p-values.
pub fn likelihood_ratio_test(
    mle: &MaximumLikelihoodEstimator,
    values_1: &[f64],
    values_2: &[f64],
    model: ModelKind,
) -> Result<TwoSampleTest> {
    let chi2 = chi2_one_dof()?;
    let (fit_1, fit_2) = fit_both(mle, values_1, values_2, model);
    let (Some(theta_1), Some(free_2)) = (fit_1.as_fit(), fit_2.as_fit()) else {
        return Ok(TwoSampleTest { fit_1, fit_2, p_values: None });
    };

    let p_values = constrained_p_values(mle, &chi2, theta_1, free_2, values_2, model);
    Ok(TwoSampleTest { fit_1, fit_2, p_values })
}

fn constrained_p_values(
    mle: &MaximumLikelihoodEstimator,
    chi2: &ChiSquared,
    fit_1: &FitResult,
    fit_2: &FitResult,
    values_2: &[f64],
    model: ModelKind,
) -> Option<Vec<f64>> {
    let sample = compress(values_2);
    let bounds = model.parameter_bounds();

    let mut p_values = Vec::with_capacity(fit_1.parameters.len());
    for (i, &fixed) in fit_1.parameters.iter().enumerate() {
        let mut pinned = bounds.clone();
        pinned[i] = (fixed, fixed);
        let mut init = fit_2.parameters.clone();
        init[i] = fixed;

        match mle.fit_from_with_bounds(&sample, &init, &pinned) {
            Ok(constrained) => {
                let stat = (2.0 * (constrained.fval - fit_2.nll)).max(0.0);
                p_values.push(chi2.sf(stat));
            }
            Err(e) => {
                log::warn!("LRT: constrained refit of parameter {i} aborted: {e}");
                return None;
            }
        }
    }
    Some(p_values)
}

/// Wald test: `W_i = (θ̂₁ᵢ − θ̂₂ᵢ)² / (Var₁ᵢ + Var₂ᵢ)`.
///
/// Variances come from each sample's inverse NLL Hessian; a sample without a
/// usable covariance drops all p-values.
pub fn wald_test(
    mle: &MaximumLikelihoodEstimator,
    values_1: &[f64],
    values_2: &[f64],
    model: ModelKind,
) -> Result<TwoSampleTest> {
    let chi2 = chi2_one_dof()?;
    let (fit_1, fit_2) = fit_both(mle, values_1, values_2, model);
    let (Some(r1), Some(r2)) = (fit_1.as_fit(), fit_2.as_fit()) else {
        return Ok(TwoSampleTest { fit_1, fit_2, p_values: None });
    };

    let bounds = model.parameter_bounds();
    let variances = |fit: &FitResult, values: &[f64]| -> Option<Vec<f64>> {
        match mle.covariance(&compress(values), &fit.parameters, &bounds) {
            Ok(Some(cov)) => Some(cov.diagonal().iter().copied().collect()),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Wald: covariance failed: {e}");
                None
            }
        }
    };

    let p_values = match (variances(r1, values_1), variances(r2, values_2)) {
        (Some(v1), Some(v2)) => Some(
            r1.parameters
                .iter()
                .zip(&r2.parameters)
                .zip(v1.iter().zip(&v2))
                .map(|((a, b), (va, vb))| chi2.sf((a - b).powi(2) / (va + vb)))
                .collect(),
        ),
        _ => None,
    };
    Ok(TwoSampleTest { fit_1, fit_2, p_values })
}
