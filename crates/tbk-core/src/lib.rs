//! # tbk-core
//!
//! Shared vocabulary for the transcriptional bursting kinetics workspace:
//! the error type, the Beta-Poisson model kinds and their parameter boxes,
//! and the value types returned by inference (fit outcomes, confidence
//! intervals, two-sample tests).

#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::ParametricModel;
pub use types::{
    CompressedSample, ConfidenceInterval, DerivedParameter, FitFailure, FitOutcome, FitResult,
    ModelKind, TwoSampleTest,
};

/// Crate version, shared by the CLI `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
