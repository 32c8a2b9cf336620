//! Probability building blocks for TBK.
//!
//! This crate hosts the probability math used by inference:
//! - the Poisson log-pmf
//! - Gauss–Jacobi quadrature for Beta-weighted integrals
//! - the Beta-Poisson (BP3/BP4) compound model: sampling and likelihoods

pub mod math;
pub mod beta_poisson;
pub mod poisson;
pub mod quadrature;

pub use beta_poisson::{
    LIKELIHOOD_FLOOR, QUADRATURE_ORDER, likelihood, likelihood3, likelihood4, nll, nll_compressed,
    nll_weighted, nll3, nll4, sample, sample4,
};
pub use quadrature::GaussJacobi;
