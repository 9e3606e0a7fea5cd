//! Filter evaluator trait definition
//!
//! This module defines the `FilterEvaluator` trait: the "apply filter"
//! capability of the realization engine. The direct recurrence and the
//! Fourier-domain convolution both implement it, and so can an external
//! accelerated evaluator.

use crate::core_types::{ArmaError, Array3};

/// Backend-agnostic application of a causal ARMA filter
///
/// Both operations work time-major on `(t, x, y)` arrays and only write time
/// slices `t >= t_from`. Slices before `t_from` are history: they are read
/// but never modified. Neighbours at negative indices contribute nothing.
pub trait FilterEvaluator: Send + Sync {
    /// Moving-average feed-forward
    ///
    /// Computes `output(t) = Σ_k kernel(k) · noise(t - k)` for every cell of
    /// `output` with time index at least `t_from`.
    ///
    /// # Arguments
    ///
    /// * `kernel` - MA kernel with `kernel(0,0,0) = 1`
    /// * `noise` - Scaled white noise, same shape as `output`
    /// * `output` - Destination
    /// * `t_from` - First time slice to compute
    ///
    /// # Errors
    ///
    /// Returns a domain error if `noise` and `output` differ in shape.
    fn apply_moving_average(
        &self,
        kernel: &Array3,
        noise: &Array3,
        output: &mut Array3,
        t_from: usize,
    ) -> Result<(), ArmaError>;

    /// Autoregressive feedback, in place
    ///
    /// On entry `field` holds the MA output; on return every slice from
    /// `t_from` holds `field(t) + Σ_{k≠0} phi(k) · field(t - k)`, evaluated in
    /// causal order so each term reads already-final values.
    ///
    /// # Arguments
    ///
    /// * `phi` - AR coefficients with `phi(0,0,0)` ignored
    /// * `field` - MA output in, realization out
    /// * `t_from` - First time slice to compute
    ///
    /// # Errors
    ///
    /// Implementations may fail on backend errors; the built-in ones do not.
    fn apply_autoregressive(
        &self,
        phi: &Array3,
        field: &mut Array3,
        t_from: usize,
    ) -> Result<(), ArmaError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Check if this evaluator runs on external hardware
    ///
    /// # Returns
    ///
    /// `true` for accelerated evaluators, `false` for the built-in CPU ones
    fn is_accelerated(&self) -> bool {
        false
    }
}
