//! Piecewise cubic Hermite interpolation with Fritsch–Carlson slopes (PCHIP).
//!
//! The interpolant is monotone wherever the data are. Outside the data range
//! it is the straight line through the end point with the end segment's
//! secant slope.

use tbk_core::{Error, Result};

/// Monotone cubic interpolant through `(xs[i], ys[i])`.
#[derive(Debug, Clone)]
pub struct Pchip {
    xs: Vec<f64>,
    ys: Vec<f64>,
    slopes: Vec<f64>,
}

impl Pchip {
    /// Build the interpolant. `xs` must be strictly increasing; all data finite; at least two points.
    pub fn new(xs: &[f64], ys: &[f64]) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(Error::Validation(format!(
                "interp input length mismatch: {} != {}",
                xs.len(),
                ys.len()
            )));
        }
        if xs.len() < 2 {
            return Err(Error::Validation("interp requires >=2 points".to_string()));
        }
        if xs.iter().chain(ys).any(|v| !v.is_finite()) {
            return Err(Error::Validation("interp input must be finite".to_string()));
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Validation("interp x must be strictly increasing".to_string()));
        }

        let slopes = fritsch_carlson_slopes(xs, ys);
        Ok(Self { xs: xs.to_vec(), ys: ys.to_vec(), slopes })
    }

    /// Evaluate at `x`; linear beyond the first and last knots.
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        let secant = |k: usize| (self.ys[k + 1] - self.ys[k]) / (self.xs[k + 1] - self.xs[k]);
        if x < self.xs[0] {
            return self.ys[0] + secant(0) * (x - self.xs[0]);
        }
        if x > self.xs[n - 1] {
            return self.ys[n - 1] + secant(n - 2) * (x - self.xs[n - 1]);
        }

        let k = self.xs.partition_point(|&xi| xi <= x).saturating_sub(1).min(n - 2);
        let h = self.xs[k + 1] - self.xs[k];
        let delta = secant(k);
        let (d0, d1) = (self.slopes[k], self.slopes[k + 1]);
        let c2 = (3.0 * delta - 2.0 * d0 - d1) / h;
        let c3 = (d0 + d1 - 2.0 * delta) / (h * h);

        let t = x - self.xs[k];
        self.ys[k] + t * (d0 + t * (c2 + t * c3))
    }
}

fn fritsch_carlson_slopes(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<f64> = (0..n - 1).map(|k| (ys[k + 1] - ys[k]) / h[k]).collect();

    if n == 2 {
        return vec![delta[0]; 2];
    }

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        if delta[k - 1] * delta[k] <= 0.0 {
            continue;
        }
        let w1 = 2.0 * h[k] + h[k - 1];
        let w2 = h[k] + 2.0 * h[k - 1];
        d[k] = (w1 + w2) / (w1 / delta[k - 1] + w2 / delta[k]);
    }

    d[0] = edge_slope(h[0], h[1], delta[0], delta[1]);
    d[n - 1] = edge_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    d
}

/// One-sided three-point end slope, limited to keep the end piece monotone.
fn edge_slope(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if d.signum() != m0.signum() || m0 == 0.0 {
        0.0
    } else if m0.signum() != m1.signum() && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_reproduces_data_points() {
        let xs = [0.0, 0.5, 1.7, 3.0, 4.2];
        let ys = [1.0, 0.2, -0.4, 2.5, 2.6];
        let p = Pchip::new(&xs, &ys).unwrap();
        for (&x, &y) in xs.iter().zip(&ys) {
            assert_relative_eq!(p.eval(x), y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_two_points_is_linear() {
        let p = Pchip::new(&[0.0, 2.0], &[1.0, 5.0]).unwrap();
        assert_relative_eq!(p.eval(1.0), 3.0, epsilon = 1e-12);
        assert_relative_eq!(p.eval(-1.0), -1.0, epsilon = 1e-12);
        assert_relative_eq!(p.eval(4.0), 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_input() {
        assert!(Pchip::new(&[1.0], &[1.0]).is_err());
        assert!(Pchip::new(&[1.0, 1.0], &[1.0, 2.0]).is_err());
        assert!(Pchip::new(&[2.0, 1.0], &[1.0, 2.0]).is_err());
        assert!(Pchip::new(&[0.0, f64::NAN], &[1.0, 2.0]).is_err());
        assert!(Pchip::new(&[0.0, 1.0], &[1.0]).is_err());
    }

    #[test]
    fn test_extrapolation_is_linear() {
        // Last segment rises by 0.1 over 1.5 while the interior curves steeply;
        // a continued cubic would turn over past x = 3.
        let p = Pchip::new(&[0.0, 0.4, 1.5, 3.0], &[0.0, 1.6, 1.9, 2.0]).unwrap();

        let right_slope = 0.1 / 1.5;
        for dx in [0.5, 2.0, 10.0] {
            assert_relative_eq!(p.eval(3.0 + dx), 2.0 + right_slope * dx, epsilon = 1e-12);
        }
        let left_slope = 1.6 / 0.4;
        assert_relative_eq!(p.eval(-0.25), -0.25 * left_slope, epsilon = 1e-12);
        assert!(p.eval(50.0) > p.eval(3.0));
    }

    #[test]
    fn test_flat_segment_stays_flat() {
        let p = Pchip::new(&[0.0, 1.0, 2.0, 3.0], &[0.0, 1.0, 1.0, 2.0]).unwrap();
        for i in 0..=20 {
            let x = 1.0 + i as f64 / 20.0;
            assert_relative_eq!(p.eval(x), 1.0, epsilon = 1e-12);
        }
    }

    proptest! {
        #[test]
        fn prop_monotone_data_gives_monotone_interpolant(
            steps in proptest::collection::vec((0.05f64..3.0, 0.0f64..5.0), 2..12),
        ) {
            let mut xs = vec![0.0];
            let mut ys = vec![0.0];
            for (dx, dy) in &steps {
                xs.push(xs.last().unwrap() + dx);
                ys.push(ys.last().unwrap() + dy);
            }
            let p = Pchip::new(&xs, &ys).unwrap();

            let (lo, hi) = (xs[0], *xs.last().unwrap());
            let mut prev = p.eval(lo);
            for i in 1..=400 {
                let x = lo + (hi - lo) * i as f64 / 400.0;
                let y = p.eval(x);
                prop_assert!(y >= prev - 1e-9, "not monotone at x={}: {} < {}", x, y, prev);
                prev = y;
            }
        }
    }
}
