//! Shared test utilities for the raster contextualization workspace.
//!
//! Geometry, STAC and WCS fixtures, a GeoTIFF writer for fixture files and
//! float assertions that understand NaN cells.
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, fixtures, write_test_geotiff};
//! ```

pub mod fixtures;
pub mod geotiff;

pub use geotiff::*;

/// `|left - right| <= epsilon`, after casting both sides to `f64`. NaN never passes.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert that two value slices are equal, treating NaN as equal to NaN.
#[macro_export]
macro_rules! assert_values_eq {
    ($left:expr, $right:expr) => {{
        let left: &[f64] = &$left;
        let right: &[f64] = &$right;
        assert_eq!(left.len(), right.len(), "length mismatch");
        for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            if !(l == r || (l.is_nan() && r.is_nan())) {
                panic!("values differ at {}: `{:?}` != `{:?}`", i, l, r);
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_rejects_nan() {
        assert_approx_eq!(f64::NAN, 1.0, 0.001);
    }

    #[test]
    fn test_assert_values_eq_with_nan() {
        assert_values_eq!(vec![1.0, f64::NAN], vec![1.0, f64::NAN]);
    }
}
