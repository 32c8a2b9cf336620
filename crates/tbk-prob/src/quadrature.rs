//! Gauss–Jacobi quadrature.
//!
//! Rule for `∫_{-1}^{1} f(x) (1 - x)^a (1 + x)^b dx` built with the
//! Golub–Welsch algorithm: the nodes are the eigenvalues of the symmetric
//! tridiagonal Jacobi matrix of the monic Jacobi recurrence, the weights are
//! `μ₀ v₀ᵢ²` where `v₀ᵢ` is the first component of the i-th normalized
//! eigenvector and `μ₀ = 2^(a+b+1) B(a+1, b+1)` is the total weight mass.

use nalgebra::{DMatrix, SymmetricEigen};
use tbk_core::{Error, Result};

use crate::math::ln_beta;

const MAX_EIGEN_ITER: usize = 10_000;

/// Gauss–Jacobi nodes and weights.
#[derive(Debug, Clone)]
pub struct GaussJacobi {
    nodes: Vec<f64>,
    unit_weights: Vec<f64>,
    ln_mass: f64,
}

impl GaussJacobi {
    /// Build an `n`-point rule for weight exponents `a` (at `x = 1`) and `b` (at `x = -1`).
    ///
    /// Requires `a > -1`, `b > -1`, both finite.
    pub fn new(n: usize, a: f64, b: f64) -> Result<Self> {
        if n == 0 {
            return Err(Error::Validation("quadrature order must be > 0".to_string()));
        }
        if !(a.is_finite() && b.is_finite() && a > -1.0 && b > -1.0) {
            return Err(Error::Validation(format!(
                "Jacobi exponents must be finite and > -1, got a={}, b={}",
                a, b
            )));
        }

        let jacobi = jacobi_matrix(n, a, b);
        let eig = SymmetricEigen::try_new(jacobi, f64::EPSILON, MAX_EIGEN_ITER).ok_or_else(|| {
            Error::Computation(format!("Jacobi matrix eigen-decomposition failed (a={a}, b={b})"))
        })?;

        let mut pairs: Vec<(f64, f64)> = (0..n)
            .map(|i| {
                let v0 = eig.eigenvectors[(0, i)];
                (eig.eigenvalues[i], v0 * v0)
            })
            .collect();
        if pairs.iter().any(|(x, w)| !x.is_finite() || !w.is_finite()) {
            return Err(Error::Computation("non-finite quadrature node or weight".to_string()));
        }
        pairs.sort_by(|l, r| l.0.total_cmp(&r.0));

        let ln_mass = (a + b + 1.0) * std::f64::consts::LN_2 + ln_beta(a + 1.0, b + 1.0);
        let (nodes, unit_weights) = pairs.into_iter().unzip();
        Ok(Self { nodes, unit_weights, ln_mass })
    }

    /// Nodes in ascending order, all inside `(-1, 1)`.
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Weights normalized to sum to one (`v₀ᵢ²`).
    pub fn unit_weights(&self) -> &[f64] {
        &self.unit_weights
    }

    /// `ln μ₀`, the log of the total weight mass.
    pub fn ln_mass(&self) -> f64 {
        self.ln_mass
    }
}

fn jacobi_matrix(n: usize, a: f64, b: f64) -> DMatrix<f64> {
    let ab = a + b;
    let mut m = DMatrix::zeros(n, n);
    for k in 0..n {
        let kf = k as f64;
        m[(k, k)] = if k == 0 {
            (b - a) / (ab + 2.0)
        } else {
            let s = 2.0 * kf + ab;
            (b * b - a * a) / (s * (s + 2.0))
        };

        if k + 1 < n {
            let j = kf + 1.0;
            // j = 1 has a removable (a + b + 1) factor.
            let off_sq = if k == 0 {
                4.0 * (1.0 + a) * (1.0 + b) / ((2.0 + ab).powi(2) * (3.0 + ab))
            } else {
                let s = 2.0 * j + ab;
                4.0 * j * (j + a) * (j + b) * (j + ab) / (s * s * (s + 1.0) * (s - 1.0))
            };
            let off = off_sq.sqrt();
            m[(k, k + 1)] = off;
            m[(k + 1, k)] = off;
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    impl GaussJacobi {
        fn weights(&self) -> Vec<f64> {
            let mass = self.ln_mass.exp();
            self.unit_weights.iter().map(|w| w * mass).collect()
        }

        /// `∫ f(x) (1-x)^a (1+x)^b dx`
        fn integrate(&self, f: impl Fn(f64) -> f64) -> f64 {
            let mass = self.ln_mass.exp();
            mass * self.nodes.iter().zip(&self.unit_weights).map(|(&x, &w)| w * f(x)).sum::<f64>()
        }
    }

    #[test]
    fn test_legendre_polynomial_exactness() {
        // a = b = 0 is Gauss–Legendre: exact through degree 2n-1.
        let rule = GaussJacobi::new(5, 0.0, 0.0).unwrap();
        assert_relative_eq!(rule.integrate(|_| 1.0), 2.0, epsilon = 1e-12);
        assert_relative_eq!(rule.integrate(|x| x.powi(8)), 2.0 / 9.0, epsilon = 1e-12);
        assert_relative_eq!(rule.integrate(|x| x.powi(9)), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_weights_sum_to_mass() {
        for &(a, b) in &[(0.5, -0.5), (2.0, 3.0), (-0.9, 4.0), (10.0, 0.1)] {
            let rule = GaussJacobi::new(50, a, b).unwrap();
            let total: f64 = rule.weights().iter().sum();
            assert_relative_eq!(total, rule.ln_mass().exp(), max_relative = 1e-10);
            let unit: f64 = rule.unit_weights().iter().sum();
            assert_relative_eq!(unit, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_beta_mean_via_mapped_nodes() {
        // Weight (1-x)^(beta-1) (1+x)^(alpha-1) is Beta(alpha, beta) on p = (x+1)/2.
        let (alpha, beta) = (2.327, 0.255);
        let rule = GaussJacobi::new(50, beta - 1.0, alpha - 1.0).unwrap();
        let mean: f64 = rule
            .nodes()
            .iter()
            .zip(rule.unit_weights())
            .map(|(&x, &w)| w * (x + 1.0) / 2.0)
            .sum();
        assert_relative_eq!(mean, alpha / (alpha + beta), epsilon = 1e-10);
    }

    #[test]
    fn test_nodes_sorted_inside_interval() {
        let rule = GaussJacobi::new(50, 3.0, -0.5).unwrap();
        assert!(rule.nodes().windows(2).all(|w| w[0] < w[1]));
        assert!(rule.nodes().iter().all(|&x| x > -1.0 && x < 1.0));
    }

    #[test]
    fn test_invalid_exponents() {
        assert!(GaussJacobi::new(10, -1.0, 0.0).is_err());
        assert!(GaussJacobi::new(10, 0.0, f64::NAN).is_err());
        assert!(GaussJacobi::new(0, 0.0, 0.0).is_err());
    }
}
