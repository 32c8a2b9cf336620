//! Per-gene batch inference.
//!
//! Every gene is an independent job on the rayon pool: no shared mutable
//! state, and results come back in input order.

use crate::hypotest::{likelihood_ratio_test, wald_test};
use crate::mle::MaximumLikelihoodEstimator;
use crate::profile_likelihood::{BurstIntervals, ProfileConfig, confidence_intervals};
use rayon::prelude::*;
use tbk_core::{Error, FitOutcome, ModelKind, Result, TwoSampleTest};

/// Fit `model` to every row.
pub fn fit_batch(
    mle: &MaximumLikelihoodEstimator,
    rows: &[Vec<f64>],
    model: ModelKind,
) -> Vec<FitOutcome> {
    rows.par_iter().map(|values| mle.fit(values, model)).collect()
}

/// BP3 fit plus burst frequency / burst size intervals for every row.
///
/// Rows whose fit failed carry `None` intervals.
pub fn confidence_batch(
    mle: &MaximumLikelihoodEstimator,
    rows: &[Vec<f64>],
    config: &ProfileConfig,
) -> Result<Vec<(FitOutcome, Option<BurstIntervals>)>> {
    config.validate()?;
    rows.par_iter()
        .map(|values| {
            let fit = mle.fit(values, ModelKind::Bp3);
            let intervals = confidence_intervals(mle, &fit, values, config)?;
            Ok((fit, intervals))
        })
        .collect()
}

fn check_paired(rows_1: &[Vec<f64>], rows_2: &[Vec<f64>]) -> Result<()> {
    if rows_1.len() != rows_2.len() {
        return Err(Error::Validation(format!(
            "paired batches differ in length: {} != {}",
            rows_1.len(),
            rows_2.len()
        )));
    }
    Ok(())
}

/// Likelihood-ratio test for every pair of rows.
pub fn likelihood_ratio_batch(
    mle: &MaximumLikelihoodEstimator,
    rows_1: &[Vec<f64>],
    rows_2: &[Vec<f64>],
    model: ModelKind,
) -> Result<Vec<TwoSampleTest>> {
    check_paired(rows_1, rows_2)?;
    rows_1
        .par_iter()
        .zip(rows_2.par_iter())
        .map(|(a, b)| likelihood_ratio_test(mle, a, b, model))
        .collect()
}

/// Wald test for every pair of rows.
pub fn wald_batch(
    mle: &MaximumLikelihoodEstimator,
    rows_1: &[Vec<f64>],
    rows_2: &[Vec<f64>],
    model: ModelKind,
) -> Result<Vec<TwoSampleTest>> {
    check_paired(rows_1, rows_2)?;
    rows_1.par_iter().zip(rows_2.par_iter()).map(|(a, b)| wald_test(mle, a, b, model)).collect()
}
