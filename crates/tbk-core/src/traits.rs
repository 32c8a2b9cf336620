//! Core traits for TBK

/// A parametric count model with a fixed box of admissible parameters.
pub trait ParametricModel {
    /// Number of parameters
    fn n_parameters(&self) -> usize;

    /// Parameter names
    fn parameter_names(&self) -> Vec<String>;

    /// Parameter bounds (min, max)
    fn parameter_bounds(&self) -> Vec<(f64, f64)>;

    /// Clamp `params` into [`ParametricModel::parameter_bounds`].
    fn clamp(&self, params: &[f64]) -> Vec<f64> {
        params
            .iter()
            .zip(self.parameter_bounds())
            .map(|(&v, (lo, hi))| v.clamp(lo, hi))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UnitBox;

    impl ParametricModel for UnitBox {
        fn n_parameters(&self) -> usize {
            2
        }

        fn parameter_names(&self) -> Vec<String> {
            vec!["x".into(), "y".into()]
        }

        fn parameter_bounds(&self) -> Vec<(f64, f64)> {
            vec![(0.0, 1.0), (0.0, 1.0)]
        }
    }

    #[test]
    fn test_clamp_into_box() {
        assert_eq!(UnitBox.clamp(&[-3.0, 0.25]), vec![0.0, 0.25]);
        assert_eq!(UnitBox.clamp(&[7.0, 1.0]), vec![1.0, 1.0]);
        assert_eq!(UnitBox.n_parameters(), UnitBox.parameter_names().len());
    }
}
