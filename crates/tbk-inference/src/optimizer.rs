//! Optimization algorithms
//!
//! Bounded minimization on top of argmin's L-BFGS. Box constraints are
//! enforced by clamping every evaluation point and projecting the gradient
//! at active bounds; a bound with `lo == hi` pins that parameter.

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tbk_core::{Error, Result};

/// Configuration for the bounded L-BFGS optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Maximum number of iterations
    pub max_iter: u64,
    /// Convergence tolerance for the gradient norm (the cost tolerance is derived from it)
    pub tol: f64,
    /// Number of corrections to approximate inverse Hessian
    pub m: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_iter: 1000, tol: 1e-6, m: 10 }
    }
}

/// Result of optimization
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best-fit parameters (inside the bounds)
    pub parameters: Vec<f64>,
    /// Function value at minimum
    pub fval: f64,
    /// Number of iterations
    pub n_iter: u64,
    /// Number of objective (cost) evaluations.
    pub n_fev: usize,
    /// Number of gradient evaluations.
    pub n_gev: usize,
    /// Convergence status
    pub converged: bool,
    /// Termination message
    pub message: String,
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OptimizationResult(fval={:.6}, n_iter={}, n_fev={}, n_gev={}, converged={})",
            self.fval, self.n_iter, self.n_fev, self.n_gev, self.converged
        )
    }
}

/// Objective function trait for optimization
pub trait ObjectiveFunction: Send + Sync {
    /// Evaluate function at given parameters
    fn eval(&self, params: &[f64]) -> Result<f64>;

    /// Compute gradient at given parameters
    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>>;
}

/// Finite-difference gradient that never evaluates outside `bounds`.
///
/// Central differences with step `ε^(1/3) · max(|x|, 1)`; next to a bound the
/// stencil is truncated to the one-sided difference, and a pinned component
/// (`lo == hi`) gets a zero derivative.
pub fn bounded_gradient(
    f: impl Fn(&[f64]) -> Result<f64>,
    params: &[f64],
    bounds: &[(f64, f64)],
) -> Result<Vec<f64>> {
    if params.len() != bounds.len() {
        return Err(Error::Validation(format!(
            "Parameter and bounds length mismatch: {} != {}",
            params.len(),
            bounds.len()
        )));
    }

    let step_scale = f64::EPSILON.cbrt();
    let mut grad = vec![0.0; params.len()];
    let mut shifted = params.to_vec();

    for (i, (&x, &(lo, hi))) in params.iter().zip(bounds).enumerate() {
        let h = step_scale * x.abs().max(1.0);
        let x_plus = (x + h).min(hi);
        let x_minus = (x - h).max(lo);
        if x_plus <= x_minus {
            continue;
        }

        shifted[i] = x_plus;
        let f_plus = f(&shifted)?;
        shifted[i] = x_minus;
        let f_minus = f(&shifted)?;
        shifted[i] = x;

        grad[i] = (f_plus - f_minus) / (x_plus - x_minus);
    }

    Ok(grad)
}

/// Wrapper to make ObjectiveFunction compatible with argmin
struct ArgminProblem<'a> {
    objective: &'a dyn ObjectiveFunction,
    bounds: &'a [(f64, f64)],
    counts: Arc<FuncCounts>,
}

/// Clamp each parameter into its `(lo, hi)` box.
pub fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds.iter()).map(|(&v, &(lo, hi))| v.clamp(lo, hi)).collect()
}

#[derive(Default)]
struct FuncCounts {
    cost: AtomicUsize,
    grad: AtomicUsize,
}

impl CostFunction for ArgminProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        self.counts.cost.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        self.objective.eval(&clamped).map_err(|e| argmin::core::Error::msg(e.to_string()))
    }
}

impl Gradient for ArgminProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(
        &self,
        params: &Self::Param,
    ) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        self.counts.grad.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        let mut g = self
            .objective
            .gradient(&clamped)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;

        // Projected gradient: at a bound, drop components that push further outside.
        const EPS: f64 = 1e-12;
        for (i, (&x, &(lo, hi))) in clamped.iter().zip(self.bounds.iter()).enumerate() {
            if x <= lo + EPS && g[i] > 0.0 {
                g[i] = 0.0;
            }
            if x >= hi - EPS && g[i] < 0.0 {
                g[i] = 0.0;
            }
        }

        Ok(g)
    }
}

/// L-BFGS optimizer with box constraints
pub struct LbfgsbOptimizer {
    config: OptimizerConfig,
}

impl LbfgsbOptimizer {
    /// Create new optimizer with given configuration
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Minimize objective function with bounds
    ///
    /// # Arguments
    /// * `objective` - Objective function to minimize
    /// * `init_params` - Initial parameter values (clamped into `bounds`)
    /// * `bounds` - Parameter bounds as (lower, upper) for each parameter
    ///
    /// Errors when the inputs are inconsistent, the objective fails at the
    /// starting point, or argmin aborts (line-search breakdown, objective
    /// error mid-run). A run that stops without converging is `Ok` with
    /// `converged == false`.
    pub fn minimize(
        &self,
        objective: &dyn ObjectiveFunction,
        init_params: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        if init_params.len() != bounds.len() {
            return Err(Error::Validation(format!(
                "Parameter and bounds length mismatch: {} != {}",
                init_params.len(),
                bounds.len()
            )));
        }
        if let Some(&(lo, hi)) = bounds.iter().find(|&&(lo, hi)| lo.is_nan() || hi.is_nan() || lo > hi) {
            return Err(Error::Validation(format!("Invalid bound ({lo}, {hi})")));
        }

        let init_clamped = clamp_params(init_params, bounds);
        objective.eval(&init_clamped)?;

        let counts = Arc::new(FuncCounts::default());
        counts.cost.fetch_add(1, Ordering::Relaxed);

        let problem = ArgminProblem { objective, bounds, counts: counts.clone() };

        let linesearch = MoreThuenteLineSearch::new();
        // Absolute, independent of the objective's magnitude.
        let tol_cost =
            if self.config.tol == 0.0 { 0.0 } else { (0.1 * self.config.tol).max(1e-12) };
        let solver = LBFGS::new(linesearch, self.config.m)
            .with_tolerance_grad(self.config.tol)
            .map_err(|e| Error::Validation(format!("Invalid optimizer configuration (tol): {e}")))?;
        let solver = solver.with_tolerance_cost(tol_cost).map_err(|e| {
            Error::Validation(format!("Invalid optimizer configuration (tol_cost): {e}"))
        })?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.param(init_clamped).max_iters(self.config.max_iter))
            .run()
            .map_err(|e| Error::Computation(format!("Optimization failed: {e}")))?;

        let state = res.state();
        let best_params_unclamped = state
            .get_best_param()
            .ok_or_else(|| Error::Computation("No best parameters found".to_string()))?
            .clone();
        let best_params = clamp_params(&best_params_unclamped, bounds);
        let fval = state.get_best_cost();
        let n_iter = state.get_iter();
        let n_fev = counts.cost.load(Ordering::Relaxed);
        let n_gev = counts.grad.load(Ordering::Relaxed);

        let termination = state.get_termination_status();
        let converged = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );
        let message = termination.to_string();

        Ok(OptimizationResult {
            parameters: best_params,
            fval,
            n_iter,
            n_fev,
            n_gev,
            converged,
            message,
        })
    }
}

impl Default for LbfgsbOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}
