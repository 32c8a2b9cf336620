//! Small numerically-stable math utilities used across probability code.

use statrs::function::gamma::ln_gamma;

/// `ln B(a, b)` via log-gamma.
#[inline]
pub fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// `ln Γ(k + 1)`, i.e. `ln k!` extended to real `k >= 0`.
#[inline]
pub fn ln_factorial(k: f64) -> f64 {
    ln_gamma(k + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ln_beta_known_values() {
        // B(1, 1) = 1, B(2, 3) = 1/12
        assert_relative_eq!(ln_beta(1.0, 1.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(ln_beta(2.0, 3.0), (1.0f64 / 12.0).ln(), epsilon = 1e-12);
        assert_relative_eq!(ln_beta(0.3, 4.5), ln_beta(4.5, 0.3), epsilon = 1e-12);
    }

    #[test]
    fn test_ln_factorial_integers() {
        assert_relative_eq!(ln_factorial(0.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(ln_factorial(5.0), 120f64.ln(), epsilon = 1e-10);
    }

    #[test]
    fn test_ln_beta_large_shapes_finite() {
        let v = ln_beta(1e6, 1e6);
        assert!(v.is_finite() && v < 0.0);
    }
}
