//! Error taxonomy
//!
//! Four families of failure, matching how the caller is expected to react:
//!
//! - [`Violation`]: invalid input. Always fatal, no retry.
//! - [`NumericalError`]: the fit broke down (indefinite or singular system,
//!   non-finite iterate). Caller may retry with a smaller order.
//! - [`ConvergenceError`]: only produced when strict convergence was
//!   requested; otherwise convergence is reported through result flags.
//! - [`ResourceError`]: not enough precomputed PRNG streams.

use std::fmt;

use super::grid::Shape3;

/// A named, fail-fast validation failure
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// Array or scalar contains NaN or infinity
    NonFinite {
        /// What was checked
        what: &'static str,
        /// Flat index of the first offending element
        index: usize,
    },
    /// Scalar that must be strictly positive is not
    NotPositive {
        /// What was checked
        what: &'static str,
        /// Offending value
        value: f64,
    },
    /// Array extent does not match the declared shape
    ShapeMismatch {
        /// What was checked
        what: &'static str,
        /// Declared extent
        expected: Shape3,
        /// Actual extent
        actual: Shape3,
    },
    /// Buffer length does not match the declared shape
    LengthMismatch {
        /// What was checked
        what: &'static str,
        /// Required length
        expected: usize,
        /// Actual length
        actual: usize,
    },
    /// Filter order needs lags the ACF does not provide
    OrderTooLarge {
        /// Which filter part
        what: &'static str,
        /// Requested order
        order: Shape3,
        /// Largest supported order
        limit: Shape3,
    },
    /// Grid has no points along an axis
    EmptyGrid {
        /// Axis name
        axis: &'static str,
    },
    /// AR characteristic polynomial vanishes on the closed unit polydisk
    Unstable {
        /// Variable whose root test failed
        axis: &'static str,
        /// Largest Schur-Cohn reflection coefficient magnitude
        reflection: f64,
    },
    /// ACF cannot be a covariance (bad zero lag, lag above variance)
    DegenerateAcf {
        /// Description of the defect
        reason: &'static str,
    },
    /// ACF block-Toeplitz matrix is not positive definite, so no stationary
    /// process has this autocovariance
    IndefiniteAcf {
        /// Lag extent of the matrix that failed
        extent: Shape3,
    },
    /// AR white-noise variance is not below the target variance
    ExcessVariance {
        /// Fitted white-noise variance
        white_noise: f64,
        /// Target variance `acf(0,0,0)`
        target: f64,
    },
    /// Two PRNG partitions would share a stream
    DuplicateStream {
        /// Position of the repeated stream id
        index: usize,
    },
    /// A coefficient fixed by convention has another value
    FixedCoefficient {
        /// Which coefficient
        what: &'static str,
        /// Required value
        expected: f64,
        /// Stored value
        actual: f64,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NonFinite { what, index } => {
                write!(f, "{what} has a non-finite value at index {index}")
            }
            Violation::NotPositive { what, value } => {
                write!(f, "{what} must be positive, got {value}")
            }
            Violation::ShapeMismatch {
                what,
                expected,
                actual,
            } => write!(f, "{what} has shape {actual}, expected {expected}"),
            Violation::LengthMismatch {
                what,
                expected,
                actual,
            } => write!(f, "{what} has length {actual}, expected {expected}"),
            Violation::OrderTooLarge { what, order, limit } => {
                write!(f, "{what} order {order} exceeds the supported {limit}")
            }
            Violation::EmptyGrid { axis } => write!(f, "grid has no points along {axis}"),
            Violation::Unstable { axis, reflection } => write!(
                f,
                "AR part is unstable along {axis} (reflection coefficient {reflection:.6})"
            ),
            Violation::DegenerateAcf { reason } => write!(f, "degenerate ACF: {reason}"),
            Violation::IndefiniteAcf { extent } => write!(
                f,
                "ACF is not positive definite over lag extent {extent}; \
                 a covariance must be even along every axis"
            ),
            Violation::ExcessVariance { white_noise, target } => write!(
                f,
                "AR white-noise variance {white_noise:.6} is not below the target variance {target:.6}"
            ),
            Violation::DuplicateStream { index } => {
                write!(f, "stream id at position {index} is already in use")
            }
            Violation::FixedCoefficient {
                what,
                expected,
                actual,
            } => write!(f, "{what} must be {expected}, got {actual}"),
        }
    }
}

/// Failure of a numerical method
#[derive(Debug, Clone, PartialEq)]
pub enum NumericalError {
    /// Yule-Walker matrix is not positive definite
    NotPositiveDefinite {
        /// Order being solved
        order: Shape3,
    },
    /// Linear system is singular even with pivoting
    Singular {
        /// Order being solved
        order: Shape3,
    },
    /// An iterate or solution contains NaN or infinity
    NonFinite {
        /// Stage that produced it
        stage: &'static str,
    },
    /// Fitted white-noise variance is zero or negative
    NonPositiveVariance {
        /// Offending value
        value: f64,
    },
    /// Fitted coefficients failed the final validation gate
    Rejected(Violation),
}

impl fmt::Display for NumericalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericalError::NotPositiveDefinite { order } => write!(
                f,
                "autocovariance matrix for order {order} is not positive definite"
            ),
            NumericalError::Singular { order } => {
                write!(f, "autocovariance matrix for order {order} is singular")
            }
            NumericalError::NonFinite { stage } => write!(f, "{stage} produced non-finite values"),
            NumericalError::NonPositiveVariance { value } => {
                write!(f, "white-noise variance {value} is not positive")
            }
            NumericalError::Rejected(v) => write!(f, "fitted model rejected: {v}"),
        }
    }
}

/// Iteration limit reached when the caller required convergence
#[derive(Debug, Clone, PartialEq)]
pub enum ConvergenceError {
    /// Order selection hit the maximum order while variance still dropped
    OrderSelection {
        /// Hard maximum order
        max_order: Shape3,
        /// Last relative variance reduction
        last_delta: f64,
    },
    /// MA iteration stopped before reaching tolerance
    MovingAverage {
        /// Iterations performed
        iterations: usize,
        /// Best residual reached
        max_residual: f64,
    },
}

impl fmt::Display for ConvergenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvergenceError::OrderSelection {
                max_order,
                last_delta,
            } => write!(
                f,
                "order selection reached {max_order} without converging (last delta {last_delta:e})"
            ),
            ConvergenceError::MovingAverage {
                iterations,
                max_residual,
            } => write!(
                f,
                "MA solver did not converge in {iterations} iterations (residual {max_residual:e})"
            ),
        }
    }
}

/// Exhausted a precomputed resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// More partitions than precomputed stream parameters
    InsufficientStreams {
        /// Partitions requested
        requested: usize,
        /// Stream parameter sets available
        available: usize,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::InsufficientStreams {
                requested,
                available,
            } => write!(
                f,
                "requested {requested} PRNG streams but only {available} are available"
            ),
        }
    }
}

/// Top-level error for every fallible operation in the crate
#[derive(Debug, Clone, PartialEq)]
pub enum ArmaError {
    /// Invalid parameters or inputs
    Domain(Violation),
    /// Numerical breakdown while fitting
    Numerical(NumericalError),
    /// Strict convergence requested and not reached
    Convergence(ConvergenceError),
    /// Precomputed resources exhausted
    Resource(ResourceError),
    /// Generation requested before coefficients were published
    NotFitted,
}

impl fmt::Display for ArmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmaError::Domain(e) => write!(f, "Domain error: {e}"),
            ArmaError::Numerical(e) => write!(f, "Numerical error: {e}"),
            ArmaError::Convergence(e) => write!(f, "Convergence failure: {e}"),
            ArmaError::Resource(e) => write!(f, "Resource error: {e}"),
            ArmaError::NotFitted => write!(f, "Model has no published coefficients"),
        }
    }
}

impl std::error::Error for ArmaError {}

impl From<Violation> for ArmaError {
    fn from(v: Violation) -> Self {
        ArmaError::Domain(v)
    }
}

impl From<NumericalError> for ArmaError {
    fn from(e: NumericalError) -> Self {
        ArmaError::Numerical(e)
    }
}

impl From<ConvergenceError> for ArmaError {
    fn from(e: ConvergenceError) -> Self {
        ArmaError::Convergence(e)
    }
}

impl From<ResourceError> for ArmaError {
    fn from(e: ResourceError) -> Self {
        ArmaError::Resource(e)
    }
}
