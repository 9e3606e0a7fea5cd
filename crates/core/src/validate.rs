//! Stateless validation checks
//!
//! Each check fails fast with a named [`Violation`] instead of clamping. The
//! same checks run at every stage boundary: on construction (grid, target
//! ACF, requested orders) and on the fitted coefficients before they are
//! published to the realization engine.

use nalgebra::DMatrix;

use crate::core_types::{Array3, Shape3, Violation, AXIS_NAMES};

/// Relative slack allowed when checking `|acf(k)| <= acf(0)`
const ACF_BOUND_SLACK: f64 = 1e-9;

/// Every value must be finite
///
/// # Errors
///
/// [`Violation::NonFinite`] naming the first offending index.
pub fn check_finite(what: &'static str, values: &[f64]) -> Result<(), Violation> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(Violation::NonFinite { what, index }),
        None => Ok(()),
    }
}

/// Scalar must be finite and strictly positive
///
/// # Errors
///
/// [`Violation::NonFinite`] or [`Violation::NotPositive`].
pub fn check_positive(what: &'static str, value: f64) -> Result<(), Violation> {
    if !value.is_finite() {
        return Err(Violation::NonFinite { what, index: 0 });
    }
    if value <= 0.0 {
        return Err(Violation::NotPositive { what, value });
    }
    Ok(())
}

/// Array extent must equal the declared one
///
/// # Errors
///
/// [`Violation::ShapeMismatch`].
pub fn check_shape(what: &'static str, expected: Shape3, actual: Shape3) -> Result<(), Violation> {
    if expected == actual {
        Ok(())
    } else {
        Err(Violation::ShapeMismatch {
            what,
            expected,
            actual,
        })
    }
}

/// Point counts non-zero, spacings finite and positive
///
/// # Errors
///
/// [`Violation::EmptyGrid`], [`Violation::NonFinite`] or
/// [`Violation::NotPositive`].
pub fn check_grid(points: Shape3, delta: [f64; 3]) -> Result<(), Violation> {
    for (axis, n) in points.to_array().into_iter().enumerate() {
        if n == 0 {
            return Err(Violation::EmptyGrid {
                axis: AXIS_NAMES[axis],
            });
        }
    }
    check_finite("grid spacing", &delta)?;
    for d in delta {
        check_positive("grid spacing", d)?;
    }
    Ok(())
}

/// Target autocovariance must be usable by the solvers
///
/// Finite everywhere, positive at zero lag, and no lag larger in magnitude
/// than the zero-lag variance.
///
/// # Errors
///
/// [`Violation::NonFinite`], [`Violation::NotPositive`] or
/// [`Violation::DegenerateAcf`].
pub fn check_acf(acf: &Array3) -> Result<(), Violation> {
    if acf.is_empty() {
        return Err(Violation::DegenerateAcf {
            reason: "ACF has no samples",
        });
    }
    check_finite("target ACF", acf.as_slice())?;
    let variance = acf.get(0, 0, 0);
    check_positive("zero-lag ACF", variance)?;
    let bound = variance * (1.0 + ACF_BOUND_SLACK);
    if acf.as_slice().iter().any(|v| v.abs() > bound) {
        return Err(Violation::DegenerateAcf {
            reason: "a lag exceeds the zero-lag variance",
        });
    }
    Ok(())
}

/// The block-Toeplitz matrix `M[i][j] = acf(|i - j|)` over every lag box
/// index below `extent` must be positive definite
///
/// Lags are mirrored per axis when the matrix is assembled, exactly as the
/// solvers read them, so an ACF that is not even along each axis (a
/// propagating wave, for one) usually fails here.
///
/// # Errors
///
/// [`Violation::IndefiniteAcf`].
pub fn check_acf_definite(acf: &Array3, extent: Shape3) -> Result<(), Violation> {
    let extent = extent.min(acf.shape());
    let lags: Vec<_> = extent.indices().collect();
    let n = lags.len();
    if n == 0 {
        return Ok(());
    }
    let m = DMatrix::from_fn(n, n, |r, c| {
        let (a, b) = (lags[r], lags[c]);
        acf.lag(
            a.0 as isize - b.0 as isize,
            a.1 as isize - b.1 as isize,
            a.2 as isize - b.2 as isize,
        )
    });
    match m.cholesky() {
        Some(_) => Ok(()),
        None => Err(Violation::IndefiniteAcf { extent }),
    }
}

/// An active AR part must leave a white-noise variance below the target
/// variance
///
/// # Errors
///
/// [`Violation::ExcessVariance`].
pub fn check_ar_variance(white_noise: f64, target: f64, phi: &Array3) -> Result<(), Violation> {
    if white_noise >= target && phi.max_abs() > 0.0 {
        Err(Violation::ExcessVariance { white_noise, target })
    } else {
        Ok(())
    }
}

/// Filter order must only reference lags the ACF provides
///
/// # Errors
///
/// [`Violation::OrderTooLarge`].
pub fn check_order_fits(
    what: &'static str,
    order: Shape3,
    acf_shape: Shape3,
) -> Result<(), Violation> {
    let extent = order.extent();
    if acf_shape.contains(extent) {
        Ok(())
    } else {
        Err(Violation::OrderTooLarge {
            what,
            order,
            limit: Shape3::new(
                acf_shape.t.saturating_sub(1),
                acf_shape.x.saturating_sub(1),
                acf_shape.y.saturating_sub(1),
            ),
        })
    }
}

/// Coefficient array matches its order and is finite
///
/// # Errors
///
/// [`Violation::ShapeMismatch`] or [`Violation::NonFinite`].
pub fn check_coefficients(
    what: &'static str,
    coefficients: &Array3,
    order: Shape3,
) -> Result<(), Violation> {
    check_shape(what, order.extent(), coefficients.shape())?;
    check_finite(what, coefficients.as_slice())
}
