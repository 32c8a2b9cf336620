//! Moment-based estimator for BP3 parameters.
//!
//! Closed-form recovery of `[alpha, beta, lambda]` from the first three
//! factorial moments of the sample (Peccoud & Ycart two-state model).

/// Estimate `[alpha, beta, lambda]` from factorial moments.
///
/// Returns a NaN triple when the sample is empty, when `E[X]` or `E[X(X-1)]`
/// is zero, or when either estimator denominator vanishes. Components may be
/// negative for samples the two-state model cannot explain; callers decide
/// what to do with them.
pub fn moment_based(values: &[f64]) -> [f64; 3] {
    const NAN3: [f64; 3] = [f64::NAN; 3];
    if values.is_empty() {
        return NAN3;
    }

    let n = values.len() as f64;
    let m1 = values.iter().sum::<f64>() / n;
    let m2 = values.iter().map(|&v| v * (v - 1.0)).sum::<f64>() / n;
    let m3 = values.iter().map(|&v| v * (v - 1.0) * (v - 2.0)).sum::<f64>() / n;

    if m1 == 0.0 || m2 == 0.0 {
        return NAN3;
    }

    let r1 = m1;
    let r2 = m2 / m1;
    let r3 = m3 / m2;

    let la_denom = r1 * r2 - 2.0 * r1 * r3 + r2 * r3;
    let nu_denom = r1 - 2.0 * r2 + r3;
    if la_denom == 0.0 || nu_denom == 0.0 {
        return NAN3;
    }

    let alpha = 2.0 * r1 * (r3 - r2) / la_denom;
    let beta = 2.0 * (r3 - r2) * (r1 - r3) * (r2 - r1) / (la_denom * nu_denom);
    let lambda = (2.0 * r1 * r3 - r1 * r2 - r2 * r3) / nu_denom;
    [alpha, beta, lambda]
}
