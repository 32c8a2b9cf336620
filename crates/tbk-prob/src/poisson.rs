//! Poisson distribution utilities.

use crate::math::ln_factorial;

/// Log-PMF of Poisson(`k` | `mu`) on a continuous support `k >= 0`.
///
/// `k ln(mu) - mu - ln Γ(k+1)`. Non-integer `k` arises from BP4 rescaling.
/// `mu == 0` is the point mass at zero.
#[inline]
pub fn logpmf_unchecked(k: f64, mu: f64) -> f64 {
    if mu == 0.0 {
        return if k == 0.0 { 0.0 } else { f64::NEG_INFINITY };
    }
    k * mu.ln() - mu - ln_factorial(k)
}

/// PMF of Poisson(`k` | `mu`).
#[inline]
pub fn pmf_unchecked(k: f64, mu: f64) -> f64 {
    logpmf_unchecked(k, mu).exp()
}
