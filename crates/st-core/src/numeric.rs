use crate::StError;

/// Floating point type used throughout the workspace.
pub type Real = f64;

/// Scale used when shifting decimal attributes read from the network file.
pub const DECIMAL_SCALE: Real = 1e6;

#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-6,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, StError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(StError::NonFinite { what, value: v })
    }
}

/// Add two decimal values on an integer grid of [`DECIMAL_SCALE`].
///
/// `9.99 - 0.01` yields `9.98` rather than `9.980000000000000426`.
pub fn scaled_add(a: Real, b: Real) -> Real {
    ((a * DECIMAL_SCALE).round() + (b * DECIMAL_SCALE).round()) / DECIMAL_SCALE
}

/// Ratio in percent, zero when the denominator is zero.
pub fn percent_of(part: Real, whole: Real) -> Real {
    if whole == 0.0 { 0.0 } else { part / whole * 100.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        assert!(format!("{err}").contains("Non-finite"));
    }

    #[test]
    fn scaled_add_has_no_float_drift() {
        assert_eq!(scaled_add(9.99, -0.01).to_string(), "9.98");
        assert_eq!(scaled_add(0.1, 0.2).to_string(), "0.3");
        assert_eq!(scaled_add(-1.5, 0.25), -1.25);
    }

    #[test]
    fn percent_of_zero_whole_is_zero() {
        assert_eq!(percent_of(5.0, 0.0), 0.0);
        assert_eq!(percent_of(1.0, 4.0), 25.0);
    }

    proptest! {
        #[test]
        fn share_of_whole_stays_in_range(whole in 0.001f64..1.0e9, frac in 0.0f64..=1.0) {
            let p = percent_of(whole * frac, whole);
            prop_assert!((0.0..=100.0 + 1e-9).contains(&p));
        }
    }
}
