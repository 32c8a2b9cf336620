//! Profile-likelihood confidence intervals for burst frequency and burst size.
//!
//! The profiled quantity is swept away from its estimate in both directions.
//! At each step it is pinned by a degenerate bound and the remaining
//! parameters are re-minimized, warm-started from the previous optimum. The
//! interval ends are where the curve `2 · (nll − min nll)` crosses
//! `χ²₁⁻¹(1 − alpha) / 2`, found by monotone cubic interpolation on each side
//! of the minimum.

use crate::interpolate::Pchip;
use crate::mle::{MaximumLikelihoodEstimator, NllObjective, is_degenerate};
use crate::optimizer::{ObjectiveFunction, OptimizationResult, bounded_gradient, clamp_params};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tbk_core::{
    CompressedSample, ConfidenceInterval, DerivedParameter, Error, FitOutcome, ModelKind,
    ParametricModel, Result,
};

/// Default significance level (95% intervals).
pub const DEFAULT_ALPHA: f64 = 0.05;
/// Default sweep step as a fraction of the starting value.
pub const DEFAULT_STEP_FRACTION: f64 = 0.05;
/// Default margin past the cutoff before a sweep may stop.
pub const DEFAULT_OVERSHOOT: f64 = 0.2;
/// Default per-direction budget of refit attempts.
pub const DEFAULT_MAX_STEPS: usize = 100;

/// Interval search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Significance level; the interval has coverage `1 - alpha`.
    pub alpha: f64,
    /// Step size as a fraction of the starting value.
    pub step_fraction: f64,
    /// How far past the cutoff the statistic must rise before a sweep stops.
    pub overshoot: f64,
    /// Refit attempts per direction, failed attempts included.
    pub max_steps: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            step_fraction: DEFAULT_STEP_FRACTION,
            overshoot: DEFAULT_OVERSHOOT,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl ProfileConfig {
    /// Reject settings the search cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(Error::Validation(format!("alpha must be in (0, 1), got {}", self.alpha)));
        }
        if !(self.step_fraction.is_finite() && self.step_fraction > 0.0) {
            return Err(Error::Validation(format!(
                "step_fraction must be finite and > 0, got {}",
                self.step_fraction
            )));
        }
        if !self.overshoot.is_finite() {
            return Err(Error::Validation("overshoot must be finite".to_string()));
        }
        Ok(())
    }

    /// Half the `1 - alpha` quantile of χ² with one degree of freedom.
    pub fn cutoff(&self) -> Result<f64> {
        self.validate()?;
        let chi2 = ChiSquared::new(1.0).map_err(|e| Error::Computation(e.to_string()))?;
        Ok(chi2.inverse_cdf(1.0 - self.alpha) / 2.0)
    }
}

/// One point of a profile curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    /// Value of the profiled quantity.
    pub value: f64,
    /// Minimized NLL with the quantity pinned at `value`.
    pub nll: f64,
    /// `2 · (nll − min nll)` over the whole curve.
    pub statistic: f64,
}

/// Profile curve in ascending order of the profiled quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCurve {
    /// Profiled quantity.
    pub parameter: DerivedParameter,
    /// Points: decreasing sweep (reversed), the estimate, increasing sweep.
    pub points: Vec<ProfilePoint>,
    /// Index of the minimum NLL; it belongs to both branches.
    pub min_index: usize,
    /// Statistic level that defines the interval ends.
    pub cutoff: f64,
}

impl ProfileCurve {
    fn assemble(
        parameter: DerivedParameter,
        decreasing: &[(f64, f64)],
        estimate: (f64, f64),
        increasing: &[(f64, f64)],
        cutoff: f64,
    ) -> Self {
        let raw: Vec<(f64, f64)> = decreasing
            .iter()
            .rev()
            .copied()
            .chain(std::iter::once(estimate))
            .chain(increasing.iter().copied())
            .collect();

        let mut min_index = 0;
        for (i, &(_, nll)) in raw.iter().enumerate() {
            if nll < raw[min_index].1 {
                min_index = i;
            }
        }
        let nll_min = raw[min_index].1;

        let points = raw
            .into_iter()
            .map(|(value, nll)| ProfilePoint { value, nll, statistic: 2.0 * (nll - nll_min) })
            .collect();
        Self { parameter, points, min_index, cutoff }
    }

    /// Points left of the minimum, the minimum included.
    pub fn left_branch(&self) -> &[ProfilePoint] {
        &self.points[..=self.min_index]
    }

    /// Points right of the minimum, the minimum included.
    pub fn right_branch(&self) -> &[ProfilePoint] {
        &self.points[self.min_index..]
    }

    /// Lowest-NLL point.
    pub fn minimum(&self) -> ProfilePoint {
        self.points[self.min_index]
    }

    /// Interval ends `(lower, upper)`.
    ///
    /// `None` where a branch cannot be inverted, or where the inverted value
    /// is not positive or lies on the wrong side of the minimum.
    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        let center = self.minimum().value;
        let keep = |side: &str, bound: Option<f64>, ok: bool| match bound {
            Some(v) if !ok => {
                log::debug!("{}: discarding {side} bound {v} (minimum at {center})", self.parameter);
                None
            }
            other => other,
        };

        let lower = invert_branch(self.left_branch(), self.cutoff);
        let upper = invert_branch(self.right_branch(), self.cutoff);
        (
            keep("lower", lower, lower.is_some_and(|v| v > 0.0 && v <= center)),
            keep("upper", upper, upper.is_some_and(|v| v > 0.0 && v >= center)),
        )
    }
}

/// Value where a branch's statistic reaches `cutoff`.
///
/// Fits the quantity as a monotone cubic of the statistic and evaluates at
/// the cutoff, extrapolating linearly when the branch stops short of it.
fn invert_branch(branch: &[ProfilePoint], cutoff: f64) -> Option<f64> {
    let mut pairs: Vec<(f64, f64)> = branch.iter().map(|p| (p.statistic, p.value)).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (stats, values): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();

    match Pchip::new(&stats, &values) {
        Ok(interp) => Some(interp.eval(cutoff)).filter(|v| v.is_finite()),
        Err(e) => {
            log::debug!("profile branch with {} points not invertible: {e}", branch.len());
            None
        }
    }
}

/// Confidence interval together with the curve it was read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileInterval {
    /// Point estimate and bounds.
    pub interval: ConfidenceInterval,
    /// Profile curve.
    pub curve: ProfileCurve,
}

/// Intervals for both derived quantities of one fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstIntervals {
    /// Burst frequency (`alpha`).
    pub burst_frequency: ProfileInterval,
    /// Burst size (`lambda / beta`).
    pub burst_size: ProfileInterval,
}

/// BP3 NLL in coordinates where the profiled quantity is a plain parameter.
///
/// Burst frequency: `[alpha, beta, lambda]` as is. Burst size:
/// `[alpha, burst_size, lambda]` with `beta = lambda / burst_size`.
struct ProfiledObjective<'a> {
    nll: NllObjective<'a>,
    parameter: DerivedParameter,
    bounds: Vec<(f64, f64)>,
}

impl ProfiledObjective<'_> {
    fn index(parameter: DerivedParameter) -> usize {
        match parameter {
            DerivedParameter::BurstFrequency => 0,
            DerivedParameter::BurstSize => 1,
        }
    }

    /// Map between natural and profiled coordinates; the map is its own inverse.
    fn swap_coordinates(parameter: DerivedParameter, params: &[f64]) -> Vec<f64> {
        match parameter {
            DerivedParameter::BurstFrequency => params.to_vec(),
            DerivedParameter::BurstSize => vec![params[0], params[2] / params[1], params[2]],
        }
    }
}

impl ObjectiveFunction for ProfiledObjective<'_> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        self.nll.eval(&Self::swap_coordinates(self.parameter, params))
    }

    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        bounded_gradient(|p| self.eval(p), params, &self.bounds)
    }
}

/// Sweep the parameter at `index` away from `start` in `direction` (±1).
///
/// `refit(init, value)` re-minimizes with the parameter pinned at `value`.
/// Returns the recorded `(value, nll)` pairs in sweep order.
fn sweep(
    start: &[f64],
    index: usize,
    direction: f64,
    config: &ProfileConfig,
    cutoff: f64,
    mut refit: impl FnMut(&[f64], f64) -> Result<OptimizationResult>,
) -> Vec<(f64, f64)> {
    let mut step = config.step_fraction * start[index];
    let mut position = start[index];
    let mut warm = start.to_vec();
    let mut points: Vec<(f64, f64)> = Vec::new();

    for _ in 0..config.max_steps {
        let candidate = position + direction * step;
        if candidate.is_nan() || candidate <= 0.0 {
            break;
        }

        let mut init = warm.clone();
        init[index] = candidate;
        let fit = match refit(&init, candidate) {
            Ok(fit) => fit,
            Err(e) => {
                log::debug!("profile refit at {candidate} aborted: {e}");
                break;
            }
        };
        if !fit.converged {
            step /= 2.0;
            continue;
        }

        position = candidate;
        warm = fit.parameters;
        points.push((candidate, fit.fval));

        if let [.., (_, previous), (_, last)] = points.as_slice() {
            let lowest = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
            if 2.0 * (last - lowest) > cutoff + config.overshoot && last > previous {
                break;
            }
        }
    }

    points
}

/// Profile-likelihood confidence interval of `parameter` around a BP3 estimate.
///
/// `point` must be the 3-vector `[alpha, beta, lambda]` fitted to `values`.
/// Bounds that cannot be located are `None`; only contract violations are errors.
pub fn confidence_interval(
    mle: &MaximumLikelihoodEstimator,
    point: &[f64],
    values: &[f64],
    parameter: DerivedParameter,
    config: &ProfileConfig,
) -> Result<ProfileInterval> {
    if point.len() != 3 {
        return Err(Error::Validation(format!(
            "confidence intervals need BP3 parameters [alpha, beta, lambda], got {} values",
            point.len()
        )));
    }
    let cutoff = config.cutoff()?;

    let clean: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if is_degenerate(&clean) {
        return Err(Error::Validation("cannot profile a degenerate sample".to_string()));
    }
    let sample = CompressedSample::from_values(&clean);
    let bounds = ModelKind::Bp3.parameter_bounds();
    let objective =
        ProfiledObjective { nll: NllObjective::new(&sample, &bounds), parameter, bounds: bounds.clone() };

    let start = clamp_params(&ProfiledObjective::swap_coordinates(parameter, point), &bounds);
    let mut origin = (start.clone(), objective.eval(&start)?);
    match mle.minimize(&objective, &start, &bounds) {
        Ok(free) if free.fval < origin.1 => origin = (free.parameters, free.fval),
        Ok(_) => {}
        Err(e) => log::debug!("{parameter}: free refit aborted, keeping the given estimate: {e}"),
    }
    let (origin_params, nll_hat) = origin;

    let index = ProfiledObjective::index(parameter);
    let refit = |init: &[f64], value: f64| {
        let mut pinned = bounds.clone();
        pinned[index] = (value, value);
        mle.minimize(&objective, init, &pinned)
    };
    let decreasing = sweep(&origin_params, index, -1.0, config, cutoff, refit);
    let increasing = sweep(&origin_params, index, 1.0, config, cutoff, refit);

    let curve = ProfileCurve::assemble(
        parameter,
        &decreasing,
        (origin_params[index], nll_hat),
        &increasing,
        cutoff,
    );
    let (lower, upper) = curve.bounds();
    if lower.is_none() || upper.is_none() {
        log::warn!("{parameter}: interval incomplete (lower={lower:?}, upper={upper:?})");
    }

    let estimate = parameter.evaluate(point);
    let profiled_minimum = curve.minimum().value;
    if (profiled_minimum - estimate).abs() > 1e-3 * estimate.abs() {
        log::warn!(
            "{parameter}: profile minimum at {profiled_minimum} differs from the estimate {estimate}; \
             the fit may not be at the likelihood minimum"
        );
    }

    let interval = ConfidenceInterval { parameter, estimate, lower, upper };
    Ok(ProfileInterval { interval, curve })
}

/// Burst frequency and burst size intervals for a BP3 fit; `None` for a failed fit.
pub fn confidence_intervals(
    mle: &MaximumLikelihoodEstimator,
    fit: &FitOutcome,
    values: &[f64],
    config: &ProfileConfig,
) -> Result<Option<BurstIntervals>> {
    let Some(fit) = fit.as_fit() else {
        return Ok(None);
    };
    let burst_frequency = confidence_interval(
        mle,
        &fit.parameters,
        values,
        DerivedParameter::BurstFrequency,
        config,
    )?;
    let burst_size =
        confidence_interval(mle, &fit.parameters, values, DerivedParameter::BurstSize, config)?;
    Ok(Some(BurstIntervals { burst_frequency, burst_size }))
}
