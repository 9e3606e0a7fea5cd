//! Yule-Walker solver for AR coefficients
//!
//! The normal equations for an AR filter with order `p` (lags `0..=p` on
//! each axis) form a block-Toeplitz system: for every pair of non-zero lags
//! `i`, `j` in the coefficient box, `M[i][j] = acf(|i - j|)` and the
//! right-hand side is `acf(i)`.
//!
//! # Strategies
//!
//! - [`SolveStrategy::Levinson`]: Levinson-Durbin recursion, O(p²), only
//!   for orders with a single active axis.
//! - [`SolveStrategy::Cholesky`]: direct factorization of the SPD system.
//! - [`SolveStrategy::Gauss`]: LU with partial pivoting.
//! - [`SolveStrategy::Auto`]: Levinson for one active axis, Cholesky
//!   otherwise, LU if the matrix turns out not to be positive definite.
//!
//! # Order determination
//!
//! Candidate order `d` is `min(d, max_order)` on every axis. The order grows
//! until the relative variance reduction `|Δσ²| / acf(0)` falls below the
//! threshold, and the last order that still helped is kept.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::residual::ar_variance;
use crate::core_types::{ArmaError, Array3, ConvergenceError, NumericalError, Shape3};
use crate::validate;

/// How the normal equations are solved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolveStrategy {
    /// Pick by order shape and definiteness
    #[default]
    Auto,
    /// Cholesky factorization, fails on an indefinite matrix
    Cholesky,
    /// LU with partial pivoting
    Gauss,
    /// Levinson-Durbin recursion for single-axis orders
    Levinson,
}

/// Yule-Walker solver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YuleWalkerConfig {
    /// Solution strategy
    pub strategy: SolveStrategy,
    /// Treat the AR order as a maximum and grow towards it
    pub determine_order: bool,
    /// Stop growing when `|Δσ²| / acf(0)` falls below this
    pub variance_threshold: f64,
    /// Return the last order when the maximum is hit without convergence
    pub accept_unconverged: bool,
    /// Keep trailing near-zero coefficient planes
    pub do_not_chop: bool,
    /// Planes with every `|phi|` below this are chopped
    pub chop_epsilon: f64,
}

impl Default for YuleWalkerConfig {
    fn default() -> Self {
        Self {
            strategy: SolveStrategy::Auto,
            determine_order: false,
            variance_threshold: 1e-6,
            accept_unconverged: true,
            do_not_chop: true,
            chop_epsilon: 1e-10,
        }
    }
}

/// AR coefficients and diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct YuleWalkerFit {
    /// Coefficients, extent `order + 1`, `phi(0,0,0) = 0`
    pub phi: Array3,
    /// Order of `phi`
    pub order: Shape3,
    /// White-noise variance
    pub variance: f64,
    /// False when order determination hit the maximum order
    pub converged: bool,
    /// Strategy that produced the solution
    pub strategy: SolveStrategy,
    /// Rough condition number of the system (1 for the trivial order)
    pub condition_estimate: f64,
    /// Candidate orders solved during order determination
    pub orders_tried: usize,
}

/// Solve for AR coefficients as configured
///
/// With `determine_order` the order is searched up to `order`, otherwise it
/// is used as given. Trailing planes are chopped afterwards unless
/// `do_not_chop` is set.
///
/// # Errors
///
/// Domain errors for orders the ACF cannot support, numerical errors for an
/// indefinite or singular system, and an order-selection convergence error
/// when the maximum is hit and `accept_unconverged` is off.
pub fn solve(acf: &Array3, order: Shape3, config: &YuleWalkerConfig) -> Result<YuleWalkerFit, ArmaError> {
    let fit = if config.determine_order {
        determine_order(acf, order, config)?
    } else {
        solve_order(acf, order, config.strategy)?
    };
    if config.do_not_chop {
        Ok(fit)
    } else {
        Ok(chop(acf, fit, config.chop_epsilon))
    }
}

/// Solve the normal equations at a fixed order
///
/// # Errors
///
/// See [`solve`].
pub fn solve_order(acf: &Array3, order: Shape3, strategy: SolveStrategy) -> Result<YuleWalkerFit, ArmaError> {
    validate::check_order_fits("AR", order, acf.shape())?;
    if order.is_zero() {
        return Ok(YuleWalkerFit {
            phi: Array3::zeros(order.extent()),
            order,
            variance: acf.get(0, 0, 0),
            converged: true,
            strategy,
            condition_estimate: 1.0,
            orders_tried: 0,
        });
    }

    let single_axis = order.active_axes() == 1;
    if matches!(strategy, SolveStrategy::Auto | SolveStrategy::Levinson) {
        if single_axis {
            if let Some((phi, cond)) = solve_levinson(acf, order) {
                return finish(acf, phi, order, SolveStrategy::Levinson, cond);
            }
            debug!(%order, "reflection coefficient left the unit disk, using Cholesky");
        } else if strategy == SolveStrategy::Levinson {
            debug!(%order, "Levinson recursion needs a single active axis, using Cholesky");
        }
    }

    let (phi, used, cond) = match strategy {
        SolveStrategy::Gauss => {
            let (phi, cond) = solve_lu(acf, order)?;
            (phi, SolveStrategy::Gauss, cond)
        }
        SolveStrategy::Cholesky | SolveStrategy::Levinson => {
            let (phi, cond) = solve_cholesky(acf, order)?;
            (phi, SolveStrategy::Cholesky, cond)
        }
        SolveStrategy::Auto => match solve_cholesky(acf, order) {
            Ok((phi, cond)) => (phi, SolveStrategy::Cholesky, cond),
            Err(e) => {
                warn!(%order, error = %e, "falling back to LU with partial pivoting");
                let (phi, cond) = solve_lu(acf, order)?;
                (phi, SolveStrategy::Gauss, cond)
            }
        },
    };
    finish(acf, phi, order, used, cond)
}

/// Grow the order until the variance stops improving
///
/// # Errors
///
/// See [`solve`].
pub fn determine_order(
    acf: &Array3,
    max_order: Shape3,
    config: &YuleWalkerConfig,
) -> Result<YuleWalkerFit, ArmaError> {
    validate::check_order_fits("AR", max_order, acf.shape())?;
    let acf0 = acf.get(0, 0, 0);
    let mut best = solve_order(acf, Shape3::zero(), config.strategy)?;
    let mut converged = max_order.is_zero();
    let mut tried = 0;
    let mut last_delta = f64::INFINITY;

    for d in 1..=max_order.max_component() {
        let candidate = Shape3::splat(d).min(max_order);
        let fit = match solve_order(acf, candidate, config.strategy) {
            Ok(fit) => fit,
            Err(ArmaError::Numerical(e)) if tried > 0 => {
                warn!(order = %candidate, error = %e, "stopping order search at last solvable order");
                break;
            }
            Err(e) => return Err(e),
        };
        tried += 1;
        last_delta = (best.variance - fit.variance).abs() / acf0;
        debug!(order = %candidate, variance = fit.variance, delta = last_delta, "order candidate");
        if last_delta < config.variance_threshold {
            converged = true;
            break;
        }
        best = fit;
    }

    if !converged {
        if !config.accept_unconverged {
            return Err(ConvergenceError::OrderSelection {
                max_order,
                last_delta,
            }
            .into());
        }
        warn!(%max_order, last_delta, "order selection hit the maximum order");
    }
    best.converged = converged;
    best.orders_tried = tried;
    Ok(best)
}

/// Remove trailing coefficient planes whose entries are all below `epsilon`
#[must_use]
pub fn chop(acf: &Array3, fit: YuleWalkerFit, epsilon: f64) -> YuleWalkerFit {
    let mut order = fit.order.to_array();
    for axis in 0..3 {
        while order[axis] > 0 {
            let extent = Shape3::from_array(order).extent();
            let plane_max = extent
                .indices()
                .filter(|&(t, x, y)| [t, x, y][axis] == order[axis])
                .map(|(t, x, y)| fit.phi.get(t, x, y).abs())
                .fold(0.0, f64::max);
            if plane_max >= epsilon {
                break;
            }
            order[axis] -= 1;
        }
    }
    let order = Shape3::from_array(order);
    if order == fit.order {
        return fit;
    }
    debug!(from = %fit.order, to = %order, "chopped trailing AR coefficients");
    let phi = fit.phi.corner(order.extent());
    YuleWalkerFit {
        variance: ar_variance(acf, &phi),
        phi,
        order,
        ..fit
    }
}

fn finish(
    acf: &Array3,
    phi: Array3,
    order: Shape3,
    strategy: SolveStrategy,
    condition_estimate: f64,
) -> Result<YuleWalkerFit, ArmaError> {
    if phi.as_slice().iter().any(|v| !v.is_finite()) {
        return Err(NumericalError::NonFinite {
            stage: "Yule-Walker solution",
        }
        .into());
    }
    let variance = ar_variance(acf, &phi);
    if !variance.is_finite() {
        return Err(NumericalError::NonFinite {
            stage: "AR white-noise variance",
        }
        .into());
    }
    if variance <= 0.0 {
        return Err(NumericalError::NonPositiveVariance { value: variance }.into());
    }
    Ok(YuleWalkerFit {
        phi,
        order,
        variance,
        converged: true,
        strategy,
        condition_estimate,
        orders_tried: 1,
    })
}

/// Non-zero lags of the coefficient box in storage order
fn unknown_lags(order: Shape3) -> Vec<(usize, usize, usize)> {
    order.extent().indices().skip(1).collect()
}

fn block_system(acf: &Array3, lags: &[(usize, usize, usize)]) -> (DMatrix<f64>, DVector<f64>) {
    let n = lags.len();
    let m = DMatrix::from_fn(n, n, |r, c| {
        let (a, b) = (lags[r], lags[c]);
        acf.lag(
            a.0 as isize - b.0 as isize,
            a.1 as isize - b.1 as isize,
            a.2 as isize - b.2 as isize,
        )
    });
    let rhs = DVector::from_fn(n, |r, _| acf.get(lags[r].0, lags[r].1, lags[r].2));
    (m, rhs)
}

fn scatter(order: Shape3, lags: &[(usize, usize, usize)], x: &DVector<f64>) -> Array3 {
    let mut phi = Array3::zeros(order.extent());
    for (i, &(t, xx, y)) in lags.iter().enumerate() {
        phi.set(t, xx, y, x[i]);
    }
    phi
}

fn diagonal_ratio(diag: impl Iterator<Item = f64>) -> f64 {
    let (lo, hi) = diag.fold((f64::INFINITY, 0.0_f64), |(lo, hi), d| {
        (lo.min(d.abs()), hi.max(d.abs()))
    });
    if lo > 0.0 {
        hi / lo
    } else {
        f64::INFINITY
    }
}

fn solve_cholesky(acf: &Array3, order: Shape3) -> Result<(Array3, f64), ArmaError> {
    let lags = unknown_lags(order);
    let (m, rhs) = block_system(acf, &lags);
    let chol = m
        .cholesky()
        .ok_or(NumericalError::NotPositiveDefinite { order })?;
    let x = chol.solve(&rhs);
    let ratio = diagonal_ratio(chol.l().diagonal().iter().copied());
    Ok((scatter(order, &lags, &x), ratio * ratio))
}

fn solve_lu(acf: &Array3, order: Shape3) -> Result<(Array3, f64), ArmaError> {
    let lags = unknown_lags(order);
    let (m, rhs) = block_system(acf, &lags);
    let lu = m.lu();
    let x = lu.solve(&rhs).ok_or(NumericalError::Singular { order })?;
    let cond = diagonal_ratio(lu.u().diagonal().iter().copied());
    Ok((scatter(order, &lags, &x), cond))
}

/// Levinson-Durbin along the single active axis of `order`
///
/// Returns `None` when a reflection coefficient reaches the unit circle,
/// i.e. the Toeplitz matrix is not positive definite.
fn solve_levinson(acf: &Array3, order: Shape3) -> Option<(Array3, f64)> {
    let axis = order.to_array().iter().position(|&p| p > 0)?;
    let p = order.axis(axis);
    let r: Vec<f64> = (0..=p)
        .map(|k| {
            let mut lag = [0usize; 3];
            lag[axis] = k;
            acf.get(lag[0], lag[1], lag[2])
        })
        .collect();

    let mut a = vec![0.0; p + 1];
    let mut error = r[0];
    for m in 1..=p {
        let acc = r[m] - (1..m).map(|j| a[j] * r[m - j]).sum::<f64>();
        let k = acc / error;
        if k.is_nan() || k.abs() >= 1.0 {
            return None;
        }
        let prev = a.clone();
        a[m] = k;
        for j in 1..m {
            a[j] = prev[j] - k * prev[m - j];
        }
        error *= 1.0 - k * k;
    }

    let mut phi = Array3::zeros(order.extent());
    for (k, &coef) in a.iter().enumerate().skip(1) {
        let mut lag = [0usize; 3];
        lag[axis] = k;
        phi.set(lag[0], lag[1], lag[2], coef);
    }
    Some((phi, r[0] / error))
}
