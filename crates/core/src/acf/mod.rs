//! Target autocovariance generation
//!
//! Produces the autocovariance function (ACF) that the model is fitted to,
//! sampled at non-negative lags on a [`Grid`]. Lag `(t, x, y)` sits at
//! physical offset `(t·Δt, x·Δx, y·Δy)`.
//!
//! # Analytic functions
//!
//! With `γ` the zero-lag variance, `α` the per-axis decay rates, `ω` the
//! angular frequency and `β` the wave numbers:
//!
//! - Exponential decay: `γ · exp(-(α_t·τ + α_x·ξ + α_y·η))`
//! - Standing wave: `γ · exp(-α·lag) · cos(ω·τ) · cos(β_x·ξ) · cos(β_y·η)`
//! - Propagating wave: `γ · exp(-α·lag) · cos(ω·τ - β_x·ξ - β_y·η)`
//!
//! [`plain_wave`] builds an empirical ACF from a synthetic wave surface
//! instead.
//!
//! # References
//!
//! - Degtyarev, A. & Reed, A. (2011) "Modelling of incident waves near the
//!   ship's hull (application of autoregressive approach in problems of
//!   simulation of rough seas)"
//! - Box, G.E.P. & Jenkins, G.M. (1976) "Time Series Analysis: Forecasting
//!   and Control"

pub mod plain_wave;

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use tracing::debug;

use crate::core_types::{ArmaError, Array3, Grid, Violation};
use crate::validate;

pub use plain_wave::{PlainWave, WaveProfile};

/// Shape of the analytic autocovariance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcfFunction {
    /// Separable exponential decay, no oscillation
    #[default]
    ExponentialDecay,
    /// Decaying standing wave
    StandingWave,
    /// Decaying wave travelling along the wave vector
    PropagatingWave,
}

/// Wave parameters from which the target ACF is derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcfParams {
    /// Functional form
    pub function: AcfFunction,
    /// Zero-lag variance `γ`
    pub amplitude: f64,
    /// Angular frequency `ω` (radians per unit time)
    pub velocity: f64,
    /// Decay rates `α` along `(t, x, y)` (per unit length)
    pub decay: [f64; 3],
    /// Wave numbers `β` along `(x, y)` (radians per unit length)
    pub wave_number: [f64; 2],
}

impl Default for AcfParams {
    fn default() -> Self {
        Self::exponential(1.0, 2.0)
    }
}

impl AcfParams {
    /// Isotropic exponential decay with the given correlation length
    #[must_use]
    pub fn exponential(amplitude: f64, correlation_length: f64) -> Self {
        Self::exponential_anisotropic(amplitude, [correlation_length; 3])
    }

    /// Exponential decay with a separate correlation length per axis
    #[must_use]
    pub fn exponential_anisotropic(amplitude: f64, correlation_length: [f64; 3]) -> Self {
        Self {
            function: AcfFunction::ExponentialDecay,
            amplitude,
            velocity: 0.0,
            decay: correlation_length.map(|l| 1.0 / l),
            wave_number: [0.0; 2],
        }
    }

    /// Standing wave from period and wave lengths
    ///
    /// # Arguments
    ///
    /// * `amplitude` - Zero-lag variance
    /// * `period` - Wave period (time units)
    /// * `wave_length` - Wave length along `(x, y)`; infinite means no
    ///   variation along that axis
    /// * `decay` - Decay rates along `(t, x, y)`
    #[must_use]
    pub fn standing_wave(amplitude: f64, period: f64, wave_length: [f64; 2], decay: [f64; 3]) -> Self {
        Self {
            function: AcfFunction::StandingWave,
            amplitude,
            velocity: TAU / period,
            decay,
            wave_number: wave_length.map(|l| TAU / l),
        }
    }

    /// Propagating wave from period and wave lengths
    ///
    /// Arguments as in [`AcfParams::standing_wave`].
    #[must_use]
    pub fn propagating_wave(
        amplitude: f64,
        period: f64,
        wave_length: [f64; 2],
        decay: [f64; 3],
    ) -> Self {
        Self {
            function: AcfFunction::PropagatingWave,
            ..Self::standing_wave(amplitude, period, wave_length, decay)
        }
    }

    /// Check the derived physical quantities
    ///
    /// # Errors
    ///
    /// Returns a violation if the variance or a decay rate is not finite
    /// and positive, or the frequency or a wave number is not finite and
    /// non-negative.
    pub fn validate(&self) -> Result<(), Violation> {
        validate::check_positive("ACF amplitude", self.amplitude)?;
        for alpha in self.decay {
            validate::check_positive("ACF decay rate", alpha)?;
        }
        validate::check_finite("wave frequency", &[self.velocity])?;
        validate::check_finite("wave number", &self.wave_number)?;
        if self.velocity < 0.0 {
            return Err(Violation::NotPositive {
                what: "wave frequency",
                value: self.velocity,
            });
        }
        Ok(())
    }

    /// ACF value at a physical lag `(τ, ξ, η)`
    #[must_use]
    pub fn evaluate(&self, lag: [f64; 3]) -> f64 {
        let [tau, xi, eta] = lag;
        let envelope = self.amplitude
            * (-(self.decay[0] * tau.abs() + self.decay[1] * xi.abs() + self.decay[2] * eta.abs()))
                .exp();
        let [bx, by] = self.wave_number;
        match self.function {
            AcfFunction::ExponentialDecay => envelope,
            AcfFunction::StandingWave => {
                envelope * (self.velocity * tau).cos() * (bx * xi).cos() * (by * eta).cos()
            }
            AcfFunction::PropagatingWave => {
                envelope * (self.velocity * tau - bx * xi - by * eta).cos()
            }
        }
    }
}

/// Sample the ACF described by `params` on `grid`
///
/// The result has the grid's point counts: entry `(t, x, y)` is the
/// covariance at lag `(t·Δt, x·Δx, y·Δy)`.
///
/// # Errors
///
/// Returns a domain error if the parameters are invalid or the sampled ACF
/// is not a usable covariance.
pub fn generate(params: &AcfParams, grid: &Grid) -> Result<Array3, ArmaError> {
    params.validate()?;
    let [dt, dx, dy] = grid.delta();
    let acf = Array3::from_fn(grid.points(), |t, x, y| {
        params.evaluate([t as f64 * dt, x as f64 * dx, y as f64 * dy])
    });
    validate::check_acf(&acf)?;
    debug!(
        function = ?params.function,
        shape = %acf.shape(),
        variance = params.amplitude,
        "generated target ACF"
    );
    Ok(acf)
}
