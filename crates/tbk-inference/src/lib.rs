//! # tbk-inference
//!
//! Parameter inference for the Beta-Poisson bursting model.
//!
//! This crate provides:
//! - the closed-form moment estimator used to seed the optimizer
//! - bounded maximum-likelihood estimation (argmin L-BFGS)
//! - profile-likelihood confidence intervals for burst frequency and burst size
//! - two-sample likelihood-ratio and Wald tests
//! - rayon batch helpers over many genes

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Rayon batch helpers (one independent job per gene).
pub mod batch;
/// Two-sample hypothesis tests.
pub mod hypotest;
/// Monotone cubic (PCHIP) interpolation.
pub mod interpolate;
/// Maximum-likelihood estimation via bounded L-BFGS.
pub mod mle;
/// Closed-form moment estimator.
pub mod moments;
/// Generic numerical optimizer (argmin backend).
pub mod optimizer;
/// Profile-likelihood confidence intervals.
pub mod profile_likelihood;

pub use batch::{confidence_batch, fit_batch, likelihood_ratio_batch, wald_batch};
pub use hypotest::{likelihood_ratio_test, wald_test};
pub use mle::{MaximumLikelihoodEstimator, maximum_likelihood};
pub use moments::moment_based;
pub use optimizer::{LbfgsbOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
pub use profile_likelihood::{
    BurstIntervals, ProfileConfig, ProfileCurve, ProfileInterval, ProfilePoint,
    confidence_interval, confidence_intervals,
};
