//! Fixed-point solver for MA coefficients
//!
//! # Implementation
//!
//! Box-Jenkins iteration. For every non-zero lag `k`, from the last lag back
//! to the first:
//!
//! ```text
//! theta(k) = -acf(k) / var + Σ_{l ≥ k, l ≠ k} theta(l) · theta(l - k)
//! ```
//!
//! where `theta(0)` is treated as zero during the sweep and reset to `-1`
//! afterwards. Updated values are used as soon as they are available
//! (Gauss-Seidel). The white-noise variance follows from the zero lag:
//! `var = acf(0) / Σ theta²`.
//!
//! # References
//!
//! - Box, G.E.P., Jenkins, G.M. & Reinsel, G.C. (2008) "Time Series
//!   Analysis", appendix A6.2

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::residual::ma_residual;
use crate::core_types::{ArmaError, Array3, ConvergenceError, NumericalError, Shape3};
use crate::validate;

/// MA solver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaSolverConfig {
    /// Iteration cap
    pub max_iterations: usize,
    /// Stop when the largest ACF residual falls below this
    pub max_residual: f64,
    /// Stop once an iterate's white-noise variance is at or below this
    pub min_variance: f64,
    /// Stop when the variance changes by less than this between iterations
    pub variance_delta: f64,
    /// Turn a non-converged fit into an error instead of a flag
    pub require_convergence: bool,
}

impl Default for MaSolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            max_residual: 1e-5,
            min_variance: 1e-6,
            variance_delta: 1e-5,
            require_convergence: false,
        }
    }
}

/// Why the iteration stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Largest residual below tolerance
    ResidualTolerance,
    /// Variance change below the configured delta
    VarianceStalled,
    /// Iteration cap reached
    MaxIterations,
    /// A step would have pushed the variance below the floor
    VarianceFloor,
}

impl Termination {
    /// True only when the residual tolerance was met; a stalled variance
    /// is reported as not converged
    #[must_use]
    pub fn is_converged(self) -> bool {
        matches!(self, Termination::ResidualTolerance)
    }
}

/// Result of an MA fit
#[derive(Debug, Clone, PartialEq)]
pub struct MaFit {
    /// Box-Jenkins coefficients, `theta(0,0,0) = -1`
    pub theta: Array3,
    /// Order of `theta`
    pub order: Shape3,
    /// White-noise variance
    pub variance: f64,
    /// Largest residual fell below the tolerance
    pub converged: bool,
    /// Iterations performed
    pub iterations: usize,
    /// Largest ACF residual of the returned coefficients
    pub max_residual: f64,
    /// Stop reason
    pub termination: Termination,
}

fn initial_theta(order: Shape3) -> Array3 {
    let mut theta = Array3::zeros(order.extent());
    theta.set(0, 0, 0, -1.0);
    theta
}

/// One Gauss-Seidel sweep, in place
fn sweep(acf: &Array3, theta: &mut Array3, variance: f64) {
    let shape = theta.shape();
    theta.set(0, 0, 0, 0.0);
    for (i, j, k) in shape.indices().rev() {
        if (i, j, k) == (0, 0, 0) {
            continue;
        }
        let mut sum = 0.0;
        for l0 in i..shape.t {
            for l1 in j..shape.x {
                for l2 in k..shape.y {
                    if (l0, l1, l2) == (i, j, k) {
                        continue;
                    }
                    sum += theta.get(l0, l1, l2) * theta.get(l0 - i, l1 - j, l2 - k);
                }
            }
        }
        theta.set(i, j, k, -acf.get(i, j, k) / variance + sum);
    }
    theta.set(0, 0, 0, -1.0);
}

/// Fit MA coefficients of `order` to `acf`
///
/// Convergence failures are reported through [`MaFit::converged`] unless
/// `require_convergence` is set. When the fit does not converge, the
/// coefficients with the lowest residual seen are returned.
///
/// # Errors
///
/// Domain errors for orders the ACF cannot support, a numerical error if an
/// iterate turns non-finite, and a convergence error under
/// `require_convergence`.
pub fn solve(acf: &Array3, order: Shape3, config: &MaSolverConfig) -> Result<MaFit, ArmaError> {
    validate::check_order_fits("MA", order, acf.shape())?;
    let acf0 = acf.get(0, 0, 0);
    validate::check_positive("zero-lag ACF", acf0)?;

    let mut theta = initial_theta(order);
    let mut variance = acf0;
    let mut residual = ma_residual(acf, &theta, variance);
    let mut best = (theta.clone(), variance, residual);
    let mut iterations = 0;
    let mut termination = Termination::MaxIterations;

    if order.is_zero() || residual < config.max_residual {
        termination = Termination::ResidualTolerance;
    } else {
        while iterations < config.max_iterations {
            let mut next = theta.clone();
            sweep(acf, &mut next, variance);
            if next.as_slice().iter().any(|v| !v.is_finite()) {
                return Err(NumericalError::NonFinite {
                    stage: "MA iteration",
                }
                .into());
            }
            let next_variance = acf0 / next.sum_of_squares();
            if next_variance <= config.min_variance {
                termination = Termination::VarianceFloor;
                break;
            }
            iterations += 1;

            let delta = (next_variance - variance).abs();
            theta = next;
            variance = next_variance;
            residual = ma_residual(acf, &theta, variance);
            if residual < best.2 {
                best = (theta.clone(), variance, residual);
            }
            if residual < config.max_residual {
                termination = Termination::ResidualTolerance;
                break;
            }
            if delta < config.variance_delta {
                termination = Termination::VarianceStalled;
                break;
            }
        }
    }

    let converged = termination.is_converged();
    if !converged {
        (theta, variance, residual) = best;
        warn!(
            %order,
            iterations,
            residual,
            ?termination,
            "MA solver stopped before reaching tolerance"
        );
        if config.require_convergence {
            return Err(ConvergenceError::MovingAverage {
                iterations,
                max_residual: residual,
            }
            .into());
        }
    } else {
        debug!(%order, iterations, residual, variance, ?termination, "MA solver converged");
    }

    Ok(MaFit {
        theta,
        order,
        variance,
        converged,
        iterations,
        max_residual: residual,
        termination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::residual::ma_autocovariance;
    use approx::assert_relative_eq;

    fn ma1_acf() -> Array3 {
        let mut acf = Array3::zeros(Shape3::new(3, 1, 1));
        acf.set(0, 0, 0, 1.25);
        acf.set(1, 0, 0, -0.5);
        acf
    }

    #[test]
    fn test_ma1_exact_solution() {
        let config = MaSolverConfig {
            max_residual: 1e-12,
            variance_delta: 0.0,
            ..MaSolverConfig::default()
        };
        let fit = solve(&ma1_acf(), Shape3::new(1, 0, 0), &config).unwrap();
        assert!(fit.converged);
        assert_eq!(fit.termination, Termination::ResidualTolerance);
        assert_relative_eq!(fit.theta.get(0, 0, 0), -1.0);
        assert_relative_eq!(fit.theta.get(1, 0, 0), 0.5, epsilon = 1e-9);
        assert_relative_eq!(fit.variance, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_order_is_white_noise() {
        let fit = solve(&ma1_acf(), Shape3::zero(), &MaSolverConfig::default()).unwrap();
        assert!(fit.converged);
        assert_eq!(fit.iterations, 0);
        assert_eq!(fit.variance, 1.25);
        assert_eq!(fit.theta.as_slice(), &[-1.0]);
    }

    #[test]
    fn test_recovers_known_ma_filter() {
        // build the ACF of a 2D MA filter and fit it back
        let mut truth = Array3::zeros(Shape3::new(2, 2, 1));
        truth.set(0, 0, 0, -1.0);
        truth.set(1, 0, 0, 0.3);
        truth.set(0, 1, 0, -0.2);
        truth.set(1, 1, 0, 0.1);
        let acf = Array3::from_fn(Shape3::new(3, 3, 1), |t, x, y| {
            ma_autocovariance(&truth, 2.0, (t, x, y))
        });
        let config = MaSolverConfig {
            max_residual: 1e-10,
            variance_delta: 0.0,
            max_iterations: 5000,
            ..MaSolverConfig::default()
        };
        let fit = solve(&acf, Shape3::new(1, 1, 0), &config).unwrap();
        assert!(fit.converged, "{:?}", fit.termination);
        assert!(fit.max_residual < 1e-10);
        for (t, x, y) in Shape3::new(2, 2, 1).indices() {
            assert_relative_eq!(
                ma_autocovariance(&fit.theta, fit.variance, (t, x, y)),
                acf.get(t, x, y),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_iteration_cap_returns_best_and_flag() {
        let acf = Array3::from_fn(Shape3::new(1, 1, 8), |_, _, y| (-0.5 * y as f64).exp());
        let config = MaSolverConfig {
            max_iterations: 3,
            max_residual: 1e-14,
            variance_delta: 0.0,
            ..MaSolverConfig::default()
        };
        let fit = solve(&acf, Shape3::new(0, 0, 5), &config).unwrap();
        assert!(!fit.converged);
        assert_eq!(fit.termination, Termination::MaxIterations);
        assert_eq!(fit.iterations, 3);
        assert!(fit.max_residual.is_finite());

        let strict = MaSolverConfig {
            require_convergence: true,
            ..config
        };
        assert!(matches!(
            solve(&acf, Shape3::new(0, 0, 5), &strict),
            Err(ArmaError::Convergence(ConvergenceError::MovingAverage { iterations: 3, .. }))
        ));
    }

    #[test]
    fn test_variance_floor_halts_early() {
        let config = MaSolverConfig {
            min_variance: 1.2,
            max_residual: 1e-14,
            variance_delta: 0.0,
            ..MaSolverConfig::default()
        };
        let fit = solve(&ma1_acf(), Shape3::new(1, 0, 0), &config).unwrap();
        assert_eq!(fit.termination, Termination::VarianceFloor);
        assert!(!fit.converged);
        assert!(fit.variance >= 1.2);
    }

    #[test]
    fn test_variance_floor_is_inclusive() {
        // the first sweep gives theta_1 = 0.4 and variance 1.25 / 1.16
        let config = MaSolverConfig {
            min_variance: 1.25 / (1.0 + 0.4 * 0.4),
            max_residual: 1e-14,
            variance_delta: 0.0,
            ..MaSolverConfig::default()
        };
        let fit = solve(&ma1_acf(), Shape3::new(1, 0, 0), &config).unwrap();
        assert_eq!(fit.termination, Termination::VarianceFloor);
        assert_eq!(fit.iterations, 0);
    }
}
