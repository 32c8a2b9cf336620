//! Common data types for TBK

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::traits::ParametricModel;
use crate::{Error, Result};

/// Beta-Poisson model family.
///
/// BP3 parameters are `[alpha, beta, lambda]`; BP4 adds a count scale
/// `lambda2` that divides observed values before the BP3 likelihood applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    /// Three-parameter Beta-Poisson.
    #[serde(rename = "BP3")]
    Bp3,
    /// Four-parameter Beta-Poisson (scaled BP3).
    #[serde(rename = "BP4")]
    Bp4,
}

impl ModelKind {
    /// Model matching a parameter vector arity, if any.
    pub fn from_arity(n: usize) -> Result<Self> {
        match n {
            3 => Ok(Self::Bp3),
            4 => Ok(Self::Bp4),
            other => Err(Error::Validation(format!(
                "Beta-Poisson parameter vectors have 3 or 4 entries, got {other}"
            ))),
        }
    }

    /// Starting point used when no data-driven guess is available.
    pub fn generic_guess(&self) -> Vec<f64> {
        match self {
            Self::Bp3 => vec![10.0, 10.0, 10.0],
            Self::Bp4 => vec![10.0, 10.0, 10.0, 0.5],
        }
    }

    /// Column labels used in exported tables (kinetic reading of the parameters).
    pub fn column_names(&self) -> &'static [&'static str] {
        match self {
            Self::Bp3 => &["k_on", "k_off", "k_syn"],
            Self::Bp4 => &["k_on", "k_off", "k_syn", "scale"],
        }
    }
}

impl ParametricModel for ModelKind {
    fn n_parameters(&self) -> usize {
        match self {
            Self::Bp3 => 3,
            Self::Bp4 => 4,
        }
    }

    fn parameter_names(&self) -> Vec<String> {
        match self {
            Self::Bp3 => vec!["alpha".into(), "beta".into(), "lambda".into()],
            Self::Bp4 => {
                vec!["alpha".into(), "beta".into(), "lambda1".into(), "lambda2".into()]
            }
        }
    }

    fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        match self {
            Self::Bp3 => vec![(1e-6, 1e6); 3],
            Self::Bp4 => vec![(1e-6, 1e6), (1e-6, 1e6), (1e-6, 1e6), (1e-6, 1.0)],
        }
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BP3" => Ok(Self::Bp3),
            "BP4" => Ok(Self::Bp4),
            _ => Err(Error::NotImplemented(format!("unknown model '{s}' (expected BP3 or BP4)"))),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bp3 => f.write_str("BP3"),
            Self::Bp4 => f.write_str("BP4"),
        }
    }
}

/// Distinct values of a count sample with their multiplicities.
///
/// Values are sorted ascending and unique; the counts sum to the number of
/// (non-NaN) observations that were compressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedSample {
    values: Vec<f64>,
    counts: Vec<u64>,
}

impl CompressedSample {
    /// Compress raw observations. NaN entries are skipped.
    pub fn from_values(raw: &[f64]) -> Self {
        let mut sorted: Vec<f64> = raw.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);

        let mut values: Vec<f64> = Vec::new();
        let mut counts: Vec<u64> = Vec::new();
        for v in sorted {
            match values.last() {
                Some(&last) if last == v => {
                    if let Some(c) = counts.last_mut() {
                        *c += 1;
                    }
                }
                _ => {
                    values.push(v);
                    counts.push(1);
                }
            }
        }
        Self { values, counts }
    }

    /// Distinct observed values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Occurrence count of each distinct value.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Occurrence counts as floating-point weights.
    pub fn weights(&self) -> Vec<f64> {
        self.counts.iter().map(|&c| c as f64).collect()
    }

    /// Number of observations represented.
    pub fn n_observations(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Number of distinct values.
    pub fn n_distinct(&self) -> usize {
        self.values.len()
    }

    /// Expand back into one entry per observation (ascending order).
    pub fn expand(&self) -> Vec<f64> {
        self.values
            .iter()
            .zip(&self.counts)
            .flat_map(|(&v, &c)| std::iter::repeat_n(v, c as usize))
            .collect()
    }
}

/// Successful maximum-likelihood fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    /// Model that was fitted.
    pub model: ModelKind,
    /// Best-fit parameter values (arity of `model`).
    pub parameters: Vec<f64>,
    /// Negative log-likelihood at the optimum.
    pub nll: f64,
    /// Optimizer iterations.
    pub n_iter: u64,
    /// Objective evaluations.
    pub n_fev: usize,
    /// Gradient evaluations.
    pub n_gev: usize,
    /// Optimizer termination message.
    pub message: String,
}

impl FitResult {
    /// Burst size `lambda / beta`.
    pub fn burst_size(&self) -> f64 {
        self.parameters[2] / self.parameters[1]
    }

    /// Burst frequency (`alpha`).
    pub fn burst_frequency(&self) -> f64 {
        self.parameters[0]
    }
}

/// Why no parameter estimate is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FitFailure {
    /// Fewer than two observations, or every observation is zero.
    DegenerateSample,
    /// The optimizer stopped without reporting convergence.
    NonConvergence,
    /// The optimizer aborted (line-search failure, non-finite objective, ...).
    Optimizer(String),
}

impl fmt::Display for FitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateSample => f.write_str("degenerate sample"),
            Self::NonConvergence => f.write_str("optimizer did not converge"),
            Self::Optimizer(msg) => write!(f, "optimizer error: {msg}"),
        }
    }
}

/// Outcome of a maximum-likelihood fit. A failed fit is ordinary data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FitOutcome {
    /// Converged estimate.
    Fit(FitResult),
    /// No estimate.
    Failed(FitFailure),
}

impl FitOutcome {
    /// Fitted parameters, if any.
    pub fn parameters(&self) -> Option<&[f64]> {
        match self {
            Self::Fit(r) => Some(&r.parameters),
            Self::Failed(_) => None,
        }
    }

    /// The successful fit, if any.
    pub fn as_fit(&self) -> Option<&FitResult> {
        match self {
            Self::Fit(r) => Some(r),
            Self::Failed(_) => None,
        }
    }

    /// `true` for [`FitOutcome::Fit`].
    pub fn is_fit(&self) -> bool {
        matches!(self, Self::Fit(_))
    }

    /// Parameters padded to `arity` with NaN for failed fits (tabular export).
    pub fn to_row(&self, arity: usize) -> Vec<f64> {
        match self {
            Self::Fit(r) => r.parameters.clone(),
            Self::Failed(_) => vec![f64::NAN; arity],
        }
    }
}

/// Biologically meaningful quantity derived from BP3 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedParameter {
    /// Gene activation rate (`alpha`).
    BurstFrequency,
    /// Products per burst (`lambda / beta`).
    BurstSize,
}

impl DerivedParameter {
    /// Value of the derived quantity at BP3 parameters `[alpha, beta, lambda]`.
    pub fn evaluate(&self, params: &[f64]) -> f64 {
        match self {
            Self::BurstFrequency => params[0],
            Self::BurstSize => params[2] / params[1],
        }
    }
}

impl fmt::Display for DerivedParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BurstFrequency => f.write_str("burst_freq"),
            Self::BurstSize => f.write_str("burst_size"),
        }
    }
}

/// Profile-likelihood confidence interval of a derived parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Which quantity the interval is for.
    pub parameter: DerivedParameter,
    /// Point estimate.
    pub estimate: f64,
    /// Lower bound (`None` when the left branch could not be inverted).
    pub lower: Option<f64>,
    /// Upper bound (`None` when the right branch could not be inverted).
    pub upper: Option<f64>,
}

impl ConfidenceInterval {
    /// `[estimate, lower, upper]` with NaN for missing bounds.
    pub fn to_row(&self) -> [f64; 3] {
        [self.estimate, self.lower.unwrap_or(f64::NAN), self.upper.unwrap_or(f64::NAN)]
    }

    /// Whether the estimate lies inside the interval (only meaningful with both bounds).
    pub fn contains_estimate(&self) -> Option<bool> {
        let (lo, hi) = (self.lower?, self.upper?);
        Some(lo <= self.estimate && self.estimate <= hi)
    }
}

/// Per-parameter comparison of two independently fitted samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoSampleTest {
    /// Fit of the first sample.
    pub fit_1: FitOutcome,
    /// Fit of the second sample.
    pub fit_2: FitOutcome,
    /// One p-value per parameter; `None` whenever either fit failed.
    pub p_values: Option<Vec<f64>>,
}

impl TwoSampleTest {
    /// Flattened `[θ₁…, θ₂…, p…]` row with NaN placeholders.
    pub fn to_row(&self, arity: usize) -> Vec<f64> {
        let mut row = self.fit_1.to_row(arity);
        row.extend(self.fit_2.to_row(arity));
        match &self.p_values {
            Some(p) => row.extend(p.iter().copied()),
            None => row.extend(std::iter::repeat_n(f64::NAN, arity)),
        }
        row
    }
}
