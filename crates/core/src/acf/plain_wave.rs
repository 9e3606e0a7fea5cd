//! Empirical ACF of a synthetic plain wave
//!
//! Instead of an analytic formula, the ACF is measured on a deterministic
//! wave surface:
//!
//! 1. Sample the wave on a box centred at the origin with the grid's
//!    spacing, doubling the box until the surface variance settles.
//! 2. Damp the surface with `exp(-Σ α_i·|c_i|)` around the centre and rescale
//!    it back to the undamped variance.
//! 3. Take the circular autocovariance `IFFT(|FFT(s)|²) / N` of the centred
//!    result and keep the first half of the lags on every axis.
//!
//! The zero lag therefore equals the variance of the settled wave, which
//! for a cosine profile of amplitude `A` approaches `A²/2`.

use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use tracing::debug;

use crate::core_types::{ArmaError, Array3, Grid, Shape3, Violation};
use crate::spectral::{pad_complex, FftCache};
use crate::stats;
use crate::validate;

/// Largest box size tried for grids of up to half this many points
const MIN_SYNTHESIS_SIZE: usize = 128;

/// Relative variance change below which the surface counts as settled
pub const DEFAULT_VARIANCE_EPSILON: f64 = 1e-3;

/// Surface profile of the plain wave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveProfile {
    /// `A·sin(φ)`
    Sine,
    /// `A·cos(φ)`
    Cosine,
    /// Third-order Stokes wave with steeper crests
    Stokes,
    /// `A·sin(k·r)·cos(ω·t)`
    Standing,
}

/// Parameters of a plain wave and its damping envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainWave {
    /// Surface profile
    pub profile: WaveProfile,
    /// Wave amplitude `A`
    pub amplitude: f64,
    /// Wave period
    pub period: f64,
    /// Wave length along `(x, y)`; infinite means no variation
    pub wave_length: [f64; 2],
    /// Envelope decay rates along `(t, x, y)`
    pub decay: [f64; 3],
    /// Settling threshold for the surface variance, relative
    pub variance_epsilon: f64,
}

/// The settled wave surface and the box size it was sampled on
#[derive(Debug, Clone, PartialEq)]
pub struct SettledSurface {
    /// Elevation, `size + 1` points on every axis the grid spans
    pub surface: Array3,
    /// Box size in grid steps (a power of two)
    pub size: usize,
    /// Variance of `surface`
    pub variance: f64,
}

impl PlainWave {
    /// Wave with the default settling threshold
    #[must_use]
    pub fn new(
        profile: WaveProfile,
        amplitude: f64,
        period: f64,
        wave_length: [f64; 2],
        decay: [f64; 3],
    ) -> Self {
        Self {
            profile,
            amplitude,
            period,
            wave_length,
            decay,
            variance_epsilon: DEFAULT_VARIANCE_EPSILON,
        }
    }

    /// Angular frequency `ω`
    #[must_use]
    pub fn velocity(&self) -> f64 {
        TAU / self.period
    }

    /// Wave numbers `(k_x, k_y)`
    #[must_use]
    pub fn wave_number(&self) -> [f64; 2] {
        self.wave_length.map(|l| TAU / l)
    }

    fn validate(&self) -> Result<(), ArmaError> {
        validate::check_positive("wave amplitude", self.amplitude)?;
        validate::check_positive("wave period", self.period)?;
        for l in self.wave_length {
            // infinite wave lengths are allowed
            if l.is_nan() || l <= 0.0 {
                return Err(Violation::NotPositive {
                    what: "wave length",
                    value: l,
                }
                .into());
            }
        }
        for alpha in self.decay {
            validate::check_positive("envelope decay rate", alpha)?;
        }
        validate::check_positive("variance settling threshold", self.variance_epsilon)?;
        Ok(())
    }

    /// Surface elevation at time `t` and position `(x, y)`
    #[must_use]
    pub fn elevation(&self, t: f64, x: f64, y: f64) -> f64 {
        let [kx, ky] = self.wave_number();
        let w = self.velocity();
        let a = self.amplitude;
        let phase = kx * x + ky * y - w * t;
        match self.profile {
            WaveProfile::Sine => a * phase.sin(),
            WaveProfile::Cosine => a * phase.cos(),
            WaveProfile::Stokes => {
                let ka = kx.hypot(ky) * a;
                a * (phase.cos()
                    + 0.5 * ka * (2.0 * phase).cos()
                    + 0.375 * ka * ka * (3.0 * phase).cos())
            }
            WaveProfile::Standing => a * (kx * x + ky * y).sin() * (w * t).cos(),
        }
    }

    /// Sample the wave surface on `grid`, starting at the origin
    #[must_use]
    pub fn surface(&self, grid: &Grid) -> Array3 {
        let [dt, dx, dy] = grid.delta();
        Array3::from_fn(grid.points(), |t, x, y| {
            self.elevation(t as f64 * dt, x as f64 * dx, y as f64 * dy)
        })
    }

    /// Box of `size + 1` points centred at the origin on every axis the
    /// grid spans, a single point at the origin on the others
    fn centred_box(grid: &Grid, size: usize) -> (Shape3, [f64; 3]) {
        let points = grid.points().to_array().map(|n| if n > 1 { size + 1 } else { 1 });
        let origin = points.map(|n| (n / 2) as f64);
        (Shape3::from_array(points), origin)
    }

    fn sample_box(&self, grid: &Grid, size: usize) -> Array3 {
        let [dt, dx, dy] = grid.delta();
        let (shape, [ot, ox, oy]) = Self::centred_box(grid, size);
        Array3::from_fn(shape, |t, x, y| {
            self.elevation(
                (t as f64 - ot) * dt,
                (x as f64 - ox) * dx,
                (y as f64 - oy) * dy,
            )
        })
    }

    /// Double the sampling box until the surface variance settles and half
    /// the box covers the grid
    ///
    /// # Errors
    ///
    /// Returns a domain error for invalid parameters.
    pub fn settled_surface(&self, grid: &Grid) -> Result<SettledSurface, ArmaError> {
        self.validate()?;
        let needed = grid.points().max_component();
        let limit = MIN_SYNTHESIS_SIZE.max(2 * needed);
        let mut size = 2;
        let mut previous: Option<f64> = None;
        loop {
            let surface = self.sample_box(grid, size);
            let variance = stats::variance(&surface);
            let settled = previous
                .is_some_and(|v0| (variance - v0).abs() <= self.variance_epsilon * variance);
            debug!(size, variance, settled, "plain wave surface");
            if (settled && size / 2 >= needed) || size >= limit {
                return Ok(SettledSurface {
                    surface,
                    size,
                    variance,
                });
            }
            previous = Some(variance);
            size *= 2;
        }
    }

    /// Multiply the settled surface by the decay envelope around its centre
    /// and restore its variance
    ///
    /// # Errors
    ///
    /// [`Violation::DegenerateAcf`] when the wave has no variance on this
    /// grid.
    pub fn damped(&self, settled: &SettledSurface, grid: &Grid) -> Result<Array3, ArmaError> {
        let [dt, dx, dy] = grid.delta();
        let [at, ax, ay] = self.decay;
        let (_, [ot, ox, oy]) = Self::centred_box(grid, settled.size);
        let mut damped = Array3::from_fn(settled.surface.shape(), |t, x, y| {
            let envelope = (-(at * (t as f64 - ot).abs() * dt
                + ax * (x as f64 - ox).abs() * dx
                + ay * (y as f64 - oy).abs() * dy))
                .exp();
            settled.surface.get(t, x, y) * envelope
        });
        let damped_variance = stats::variance(&damped);
        if settled.variance <= 0.0 || damped_variance <= 0.0 {
            return Err(Violation::DegenerateAcf {
                reason: "plain wave has no variance on this grid",
            }
            .into());
        }
        let scale = (settled.variance / damped_variance).sqrt();
        for v in damped.as_mut_slice() {
            *v *= scale;
        }
        Ok(damped)
    }

    /// Empirical ACF of the damped wave, sampled on `grid`
    ///
    /// The result has the grid's point counts and its zero lag equals the
    /// settled surface variance.
    ///
    /// # Errors
    ///
    /// Returns a domain error for invalid parameters or when the surface
    /// carries no variance on this grid.
    pub fn acf(&self, grid: &Grid) -> Result<Array3, ArmaError> {
        let settled = self.settled_surface(grid)?;
        let damped = self.damped(&settled, grid)?;
        let acf = circular_autocovariance(&damped).corner(grid.points());
        validate::check_acf(&acf)?;
        debug!(
            profile = ?self.profile,
            size = settled.size,
            variance = acf.get(0, 0, 0),
            "generated plain wave ACF"
        );
        Ok(acf)
    }
}

/// `IFFT(|FFT(s - mean)|²) / N²` over the whole box
fn circular_autocovariance(field: &Array3) -> Array3 {
    let shape = field.shape();
    let mean = stats::mean(field);
    let centred = Array3::from_fn(shape, |t, x, y| field.get(t, x, y) - mean);
    let cache = FftCache::new();
    let mut spectrum = pad_complex(&centred, shape);
    cache.plan3(shape, false).process(&mut spectrum);
    for c in &mut spectrum {
        *c = Complex64::new(c.norm_sqr(), 0.0);
    }
    cache.plan3(shape, true).process(&mut spectrum);
    let n = shape.volume() as f64;
    Array3::from_fn(shape, |t, x, y| {
        spectrum[(t * shape.x + x) * shape.y + y].re / (n * n)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArmaModel, ModelConfig};
    use approx::assert_relative_eq;

    fn wave(profile: WaveProfile) -> PlainWave {
        PlainWave::new(profile, 1.5, 8.0, [8.0, 16.0], [0.05, 0.05, 0.05])
    }

    #[test]
    fn test_surface_settles_before_acf() {
        let grid = Grid::unit(Shape3::splat(16)).unwrap();
        let settled = wave(WaveProfile::Cosine).settled_surface(&grid).unwrap();
        assert!(settled.size.is_power_of_two());
        assert!(settled.size >= 32);
        assert_eq!(settled.surface.shape(), Shape3::splat(settled.size + 1));

        // the doubling from 16 to 32 steps is the first to move the
        // variance by less than the threshold
        assert_eq!(settled.size, 32);
        let half = stats::variance(&wave(WaveProfile::Cosine).sample_box(&grid, 16));
        assert!((settled.variance - half).abs() <= 1e-3 * settled.variance);
        let quarter = stats::variance(&wave(WaveProfile::Cosine).sample_box(&grid, 8));
        assert!((half - quarter).abs() > 1e-3 * half);
    }

    #[test]
    fn test_zero_lag_is_wave_variance() {
        let grid = Grid::unit(Shape3::splat(16)).unwrap();
        let w = wave(WaveProfile::Cosine);
        let acf = w.acf(&grid).unwrap();
        assert_eq!(acf.shape(), Shape3::splat(16));
        let settled = w.settled_surface(&grid).unwrap();
        assert_relative_eq!(acf.get(0, 0, 0), settled.variance, epsilon = 1e-10);
        // A·cos has variance A²/2
        assert_relative_eq!(acf.get(0, 0, 0), 1.5 * 1.5 / 2.0, max_relative = 1e-3);

        let doubled = PlainWave {
            amplitude: 3.0,
            ..w
        };
        assert_relative_eq!(
            doubled.acf(&grid).unwrap().get(0, 0, 0),
            4.0 * acf.get(0, 0, 0),
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_damping_keeps_variance() {
        let grid = Grid::new(Shape3::new(8, 8, 1), [0.5, 1.0, 1.0]).unwrap();
        let w = PlainWave {
            decay: [0.3, 0.2, 0.2],
            ..wave(WaveProfile::Sine)
        };
        let settled = w.settled_surface(&grid).unwrap();
        assert_eq!(settled.surface.shape().y, 1);
        let damped = w.damped(&settled, &grid).unwrap();
        assert_relative_eq!(stats::variance(&damped), settled.variance, epsilon = 1e-10);

        // two steps out in t (Δt = 0.5) and one in x shrink by exp(0.3 + 0.2)
        let c = settled.size / 2;
        let ratio = |t: usize, x: usize| damped.get(t, x, 0) / settled.surface.get(t, x, 0);
        assert_relative_eq!(
            ratio(c + 1, c + 1) / ratio(c + 3, c + 2),
            0.5_f64.exp(),
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_acf_matches_circular_sum() {
        let grid = Grid::unit(Shape3::new(6, 5, 4)).unwrap();
        let w = PlainWave {
            decay: [0.1, 0.2, 0.3],
            ..wave(WaveProfile::Stokes)
        };
        let damped = w.damped(&w.settled_surface(&grid).unwrap(), &grid).unwrap();
        let s = damped.shape();
        let mean = stats::mean(&damped);
        let (kt, kx, ky) = (1, 2, 1);
        let mut sum = 0.0;
        for (t, x, y) in s.indices() {
            let lagged = damped.get((t + kt) % s.t, (x + kx) % s.x, (y + ky) % s.y);
            sum += (damped.get(t, x, y) - mean) * (lagged - mean);
        }
        let acf = w.acf(&grid).unwrap();
        assert_relative_eq!(acf.get(kt, kx, ky), sum / s.volume() as f64, epsilon = 1e-9);
    }

    #[test]
    fn test_every_profile_gives_valid_acf() {
        let grid = Grid::new(Shape3::new(8, 8, 8), [0.5, 1.0, 1.0]).unwrap();
        for profile in [
            WaveProfile::Sine,
            WaveProfile::Cosine,
            WaveProfile::Stokes,
            WaveProfile::Standing,
        ] {
            let acf = wave(profile).acf(&grid).unwrap();
            assert!(acf.get(0, 0, 0) > 0.0, "{profile:?}");
        }
    }

    #[test]
    fn test_plain_wave_acf_fits_along_time() {
        let grid = Grid::new(Shape3::new(16, 8, 8), [0.5, 1.0, 1.0]).unwrap();
        let w = PlainWave {
            decay: [0.3; 3],
            ..wave(WaveProfile::Cosine)
        };
        let acf = w.acf(&grid).unwrap();
        let acf0 = acf.get(0, 0, 0);
        let mut model = ArmaModel::new(grid, acf, ModelConfig::ar(Shape3::new(1, 0, 0))).unwrap();
        let report = model.fit().unwrap();
        assert!(report.white_noise_variance > 0.0 && report.white_noise_variance < acf0);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let grid = Grid::unit(Shape3::splat(4)).unwrap();
        let w = PlainWave {
            wave_length: [0.0, 1.0],
            ..wave(WaveProfile::Sine)
        };
        assert!(matches!(w.acf(&grid), Err(ArmaError::Domain(_))));
        let w = PlainWave {
            variance_epsilon: 0.0,
            ..wave(WaveProfile::Sine)
        };
        assert!(matches!(w.acf(&grid), Err(ArmaError::Domain(_))));
    }
}
