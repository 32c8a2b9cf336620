//! Maximum Likelihood Estimation

use crate::moments::moment_based;
use crate::optimizer::{
    LbfgsbOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig, bounded_gradient,
};
use nalgebra::DMatrix;
use tbk_core::{
    CompressedSample, Error, FitFailure, FitOutcome, FitResult, ModelKind, ParametricModel, Result,
};

/// Negative log-likelihood of a compressed sample as an optimizer objective.
///
/// Evaluation points are expected inside `bounds`; the gradient is the
/// bounds-aware finite difference, which never leaves the box.
pub struct NllObjective<'a> {
    sample: &'a CompressedSample,
    weights: Vec<f64>,
    bounds: Vec<(f64, f64)>,
}

impl<'a> NllObjective<'a> {
    /// Objective over `sample` restricted to `bounds`.
    pub fn new(sample: &'a CompressedSample, bounds: &[(f64, f64)]) -> Self {
        Self { sample, weights: sample.weights(), bounds: bounds.to_vec() }
    }

    fn nll(&self, params: &[f64]) -> Result<f64> {
        let v = tbk_prob::nll_weighted(params, self.sample.values(), &self.weights)?;
        if !v.is_finite() {
            return Err(Error::Computation(format!("non-finite NLL at {params:?}")));
        }
        Ok(v)
    }
}

impl ObjectiveFunction for NllObjective<'_> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        self.nll(params)
    }

    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        bounded_gradient(|p| self.nll(p), params, &self.bounds)
    }
}

/// Whether a NaN-free sample is too small or too empty to fit.
pub fn is_degenerate(values: &[f64]) -> bool {
    values.len() < 2 || values.iter().all(|&v| v == 0.0)
}

/// Optimizer starting point for `model`, clamped into its bounds.
///
/// BP3 starts from the moment estimate unless it has a NaN or negative
/// component; BP4 always starts from the generic guess.
pub fn initial_guess(values: &[f64], model: ModelKind) -> Vec<f64> {
    let guess = match model {
        ModelKind::Bp3 => {
            let est = moment_based(values);
            if est.iter().any(|v| v.is_nan() || *v < 0.0) {
                model.generic_guess()
            } else {
                est.to_vec()
            }
        }
        ModelKind::Bp4 => model.generic_guess(),
    };
    model.clamp(&guess)
}

/// Maximum Likelihood Estimator
///
/// Fits Beta-Poisson models by minimizing the negative log-likelihood.
#[derive(Debug, Clone, Default)]
pub struct MaximumLikelihoodEstimator {
    config: OptimizerConfig,
}

impl MaximumLikelihoodEstimator {
    /// Create a new MLE with default configuration
    pub fn new() -> Self {
        Self { config: OptimizerConfig::default() }
    }

    /// Create MLE with custom optimizer configuration
    pub fn with_config(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Access the optimizer configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Fit `model` to a raw count sample.
    ///
    /// NaN entries are dropped first. Degenerate samples, non-convergence and
    /// optimizer aborts are reported as [`FitOutcome::Failed`].
    pub fn fit(&self, values: &[f64], model: ModelKind) -> FitOutcome {
        let clean: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if is_degenerate(&clean) {
            log::debug!("{model}: degenerate sample ({} observations)", clean.len());
            return FitOutcome::Failed(FitFailure::DegenerateSample);
        }

        let init = initial_guess(&clean, model);
        let sample = CompressedSample::from_values(&clean);
        let bounds = model.parameter_bounds();

        match self.fit_from_with_bounds(&sample, &init, &bounds) {
            Err(e) => {
                log::warn!("{model}: optimizer aborted: {e}");
                FitOutcome::Failed(FitFailure::Optimizer(e.to_string()))
            }
            Ok(r) if !r.converged => {
                log::warn!("{model}: no convergence after {} iterations ({})", r.n_iter, r.message);
                FitOutcome::Failed(FitFailure::NonConvergence)
            }
            Ok(r) => {
                log::debug!("{model}: {r}");
                FitOutcome::Fit(FitResult {
                    model,
                    parameters: r.parameters,
                    nll: r.fval,
                    n_iter: r.n_iter,
                    n_fev: r.n_fev,
                    n_gev: r.n_gev,
                    message: r.message,
                })
            }
        }
    }

    /// Minimize the NLL of `sample` from an explicit start inside explicit bounds.
    ///
    /// A bound `(v, v)` pins that parameter. Returns the raw optimizer result
    /// whether or not it converged.
    pub fn fit_from_with_bounds(
        &self,
        sample: &CompressedSample,
        init: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        ModelKind::from_arity(init.len())?;
        let objective = NllObjective::new(sample, bounds);
        self.minimize(&objective, init, bounds)
    }

    /// Minimize an arbitrary objective with this estimator's optimizer settings.
    pub fn minimize(
        &self,
        objective: &dyn ObjectiveFunction,
        init: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        LbfgsbOptimizer::new(self.config.clone()).minimize(objective, init, bounds)
    }

    /// Covariance of the estimate: inverse of the NLL Hessian at `params`.
    ///
    /// `Ok(None)` when the Hessian cannot be turned into a valid covariance.
    pub fn covariance(
        &self,
        sample: &CompressedSample,
        params: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<Option<DMatrix<f64>>> {
        ModelKind::from_arity(params.len())?;
        let objective = NllObjective::new(sample, bounds);
        let hessian = compute_hessian(&objective, params, bounds)?;
        let cov = invert_hessian(&hessian, params.len());
        if cov.is_none() {
            log::warn!("Hessian inversion failed at {params:?}; no covariance");
        }
        Ok(cov)
    }
}

/// Fit with the default optimizer settings.
pub fn maximum_likelihood(values: &[f64], model: ModelKind) -> FitOutcome {
    MaximumLikelihoodEstimator::new().fit(values, model)
}

/// Hessian by forward differences of the gradient, symmetrized.
///
/// H_{ij} ≈ (g_i(x + ε·e_j) − g_i(x)) / ε, stepping backwards when the
/// forward step would leave the box.
fn compute_hessian(
    objective: &dyn ObjectiveFunction,
    params: &[f64],
    bounds: &[(f64, f64)],
) -> Result<DMatrix<f64>> {
    let n = params.len();
    let grad_center = objective.gradient(params)?;

    let mut hessian = DMatrix::zeros(n, n);

    for j in 0..n {
        let mut eps = 1e-4 * params[j].abs().max(1.0);
        if params[j] + eps > bounds[j].1 {
            eps = -eps;
        }

        let mut params_step = params.to_vec();
        params_step[j] += eps;
        let grad_step = objective.gradient(&params_step)?;

        for i in 0..n {
            hessian[(i, j)] = (grad_step[i] - grad_center[i]) / eps;
        }
    }

    let ht = hessian.transpose();
    hessian = (&hessian + &ht) * 0.5;

    Ok(hessian)
}

/// Invert the Hessian via damped Cholesky, falling back to LU.
///
/// Returns `None` if no inverse with positive finite variances exists.
fn invert_hessian(hessian: &DMatrix<f64>, n: usize) -> Option<DMatrix<f64>> {
    if hessian.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let identity = DMatrix::identity(n, n);

    let diag_scale = (0..n).map(|i| hessian[(i, i)].abs()).fold(0.0_f64, f64::max).max(1.0);

    let mut h_damped = hessian.clone();
    let mut damping = 0.0_f64;
    let max_attempts = 10;

    for attempt in 0..max_attempts {
        if let Some(chol) = nalgebra::linalg::Cholesky::new(h_damped.clone()) {
            return Some(chol.solve(&identity));
        }

        if attempt + 1 == max_attempts {
            break;
        }

        let next_damping = if damping == 0.0 { diag_scale * 1e-9 } else { damping * 10.0 };
        let add = next_damping - damping;
        for i in 0..n {
            h_damped[(i, i)] += add;
        }
        damping = next_damping;
    }

    let cov = h_damped.lu().try_inverse()?;
    for i in 0..n {
        let v = cov[(i, i)];
        if !(v.is_finite() && v > 0.0) {
            return None;
        }
    }
    Some(cov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::clamp_params;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn bp3_sample(params: [f64; 3], n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        tbk_prob::sample(params[0], params[1], params[2], n, &mut rng).unwrap()
    }

    #[test]
    fn test_degenerate_samples() {
        for values in [vec![], vec![5.0], vec![0.0; 20], vec![f64::NAN, 3.0, f64::NAN]] {
            let out = maximum_likelihood(&values, ModelKind::Bp3);
            assert!(
                matches!(out, FitOutcome::Failed(FitFailure::DegenerateSample)),
                "values={values:?} gave {out:?}"
            );
        }
    }

    #[test]
    fn test_initial_guess() {
        // Negative moment estimate falls back to the generic guess.
        let guess = initial_guess(&[0.0, 1.0, 2.0, 3.0, 4.0], ModelKind::Bp3);
        assert_eq!(guess, vec![10.0, 10.0, 10.0]);

        let guess = initial_guess(&[0.0, 0.0, 1.0], ModelKind::Bp3);
        assert_eq!(guess, vec![10.0, 10.0, 10.0]);

        let guess = initial_guess(&[3.0, 5.0, 9.0], ModelKind::Bp4);
        assert_eq!(guess, vec![10.0, 10.0, 10.0, 0.5]);
    }

    #[test]
    fn test_initial_guess_uses_moments() {
        let values = bp3_sample([2.0, 4.0, 30.0], 400, 3);
        let est = moment_based(&values);
        let guess = initial_guess(&values, ModelKind::Bp3);
        if est.iter().all(|v| v.is_finite() && *v >= 0.0) {
            let clamped = clamp_params(&est, &ModelKind::Bp3.parameter_bounds());
            assert_eq!(guess, clamped);
        } else {
            assert_eq!(guess, vec![10.0, 10.0, 10.0]);
        }
    }

    #[test]
    fn test_fit_bp3_beats_truth() {
        let truth = [1.5, 6.0, 60.0];
        let values = bp3_sample(truth, 800, 42);
        let out = maximum_likelihood(&values, ModelKind::Bp3);
        let fit = out.as_fit().unwrap_or_else(|| panic!("fit failed: {out:?}"));

        assert_eq!(fit.parameters.len(), 3);
        let bounds = ModelKind::Bp3.parameter_bounds();
        for (&p, &(lo, hi)) in fit.parameters.iter().zip(&bounds) {
            assert!(p >= lo && p <= hi);
        }

        let nll_truth = tbk_prob::nll(&truth, &values).unwrap();
        assert!(fit.nll <= nll_truth + 1e-3, "fit nll {} > truth nll {}", fit.nll, nll_truth);
        assert_relative_eq!(fit.nll, tbk_prob::nll(&fit.parameters, &values).unwrap(), max_relative = 1e-9);
    }

    #[test]
    fn test_fit_ignores_nan_entries() {
        let values = bp3_sample([2.0, 3.0, 20.0], 200, 5);
        let mut with_nan = values.clone();
        with_nan.insert(7, f64::NAN);
        with_nan.push(f64::NAN);

        let a = maximum_likelihood(&values, ModelKind::Bp3);
        let b = maximum_likelihood(&with_nan, ModelKind::Bp3);
        assert_eq!(a.parameters(), b.parameters());
    }

    #[test]
    fn test_fit_bp4_arity_and_scale_bound() {
        let mut rng = StdRng::seed_from_u64(9);
        let values = tbk_prob::sample4(2.0, 3.0, 40.0, 0.5, 300, &mut rng).unwrap();
        let out = maximum_likelihood(&values, ModelKind::Bp4);
        if let FitOutcome::Fit(fit) = out {
            assert_eq!(fit.parameters.len(), 4);
            assert!(fit.parameters[3] > 0.0 && fit.parameters[3] <= 1.0);
        }
    }

    #[test]
    fn test_fit_from_with_bounds_pins_parameter() {
        let values = bp3_sample([2.0, 3.0, 20.0], 300, 8);
        let sample = CompressedSample::from_values(&values);
        let mut bounds = ModelKind::Bp3.parameter_bounds();
        bounds[0] = (2.5, 2.5);

        let mle = MaximumLikelihoodEstimator::new();
        let r = mle.fit_from_with_bounds(&sample, &[1.0, 3.0, 20.0], &bounds).unwrap();
        assert_eq!(r.parameters[0], 2.5);
    }

    #[test]
    fn test_fit_from_with_bounds_rejects_bad_arity() {
        let sample = CompressedSample::from_values(&[1.0, 2.0]);
        let mle = MaximumLikelihoodEstimator::new();
        assert!(mle.fit_from_with_bounds(&sample, &[1.0, 1.0], &[(0.0, 2.0); 2]).is_err());
    }

    #[test]
    fn test_covariance_positive_at_optimum() {
        let values = bp3_sample([1.5, 6.0, 60.0], 800, 42);
        let mle = MaximumLikelihoodEstimator::new();
        let fit = mle.fit(&values, ModelKind::Bp3);
        let Some(fit) = fit.as_fit() else {
            panic!("fit failed");
        };

        let sample = CompressedSample::from_values(&values);
        let cov = mle
            .covariance(&sample, &fit.parameters, &ModelKind::Bp3.parameter_bounds())
            .unwrap()
            .expect("covariance");
        for i in 0..3 {
            assert!(cov[(i, i)] > 0.0 && cov[(i, i)].is_finite());
        }
    }

    #[test]
    fn test_invert_hessian_rejects_non_finite() {
        let mut h = DMatrix::<f64>::identity(2, 2);
        h[(0, 1)] = f64::NAN;
        assert!(invert_hessian(&h, 2).is_none());

        let h = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 2.0]);
        let cov = invert_hessian(&h, 2).unwrap();
        assert_relative_eq!(cov[(0, 0)], 0.25, epsilon = 1e-12);
        assert_relative_eq!(cov[(1, 1)], 0.5, epsilon = 1e-12);
    }
}
