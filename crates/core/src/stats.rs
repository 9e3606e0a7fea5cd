//! Sample statistics of realizations
//!
//! Used to check generated surfaces against the target ACF. The empirical
//! ACF is the biased estimator (divided by the cell count, not by the
//! number of overlapping pairs), which keeps it positive semi-definite.
//!
//! [`WaveField`] cuts a realization into individual waves along every axis:
//! crests and troughs are located by a parabola through each strict local
//! extremum and its two neighbours, and every pair of adjacent opposite
//! extrema is half a wave.

use rayon::prelude::*;
use std::fmt;
use tracing::debug;

use crate::core_types::{Array3, Grid, Shape3, AXIS_NAMES};

/// Sample mean, zero for an empty field
#[must_use]
pub fn mean(field: &Array3) -> f64 {
    if field.is_empty() {
        return 0.0;
    }
    field.as_slice().iter().sum::<f64>() / field.len() as f64
}

/// Sample variance about the mean, zero for an empty field
#[must_use]
pub fn variance(field: &Array3) -> f64 {
    if field.is_empty() {
        return 0.0;
    }
    let m = mean(field);
    field.as_slice().iter().map(|v| (v - m) * (v - m)).sum::<f64>() / field.len() as f64
}

/// Empirical autocovariance at non-negative lags up to `max_lag`
///
/// The result has extent `max_lag + 1` clipped to the field. Lags are
/// evaluated in parallel, each with a fixed summation order.
#[must_use]
pub fn empirical_acf(field: &Array3, max_lag: Shape3) -> Array3 {
    let s = field.shape();
    let extent = max_lag.extent().min(s);
    if field.is_empty() {
        return Array3::zeros(extent);
    }
    let m = mean(field);
    let n = field.len() as f64;
    let centered: Vec<f64> = field.as_slice().iter().map(|v| v - m).collect();
    let at = |t: usize, x: usize, y: usize| centered[(t * s.x + x) * s.y + y];

    let lags: Vec<(usize, usize, usize)> = extent.indices().collect();
    let values: Vec<f64> = lags
        .par_iter()
        .map(|&(kt, kx, ky)| {
            let mut sum = 0.0;
            for t in 0..s.t - kt {
                for x in 0..s.x - kx {
                    for y in 0..s.y - ky {
                        sum += at(t, x, y) * at(t + kt, x + kx, y + ky);
                    }
                }
            }
            sum / n
        })
        .collect();
    Array3::from_fn(extent, |t, x, y| values[(t * extent.x + x) * extent.y + y])
}

/// Crest or trough
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Local maximum
    Crest,
    /// Local minimum
    Trough,
}

/// Interpolated extremum of a 1-D profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveFeature {
    /// Position of the parabola vertex
    pub x: f64,
    /// Elevation at the vertex
    pub z: f64,
    /// Crest or trough
    pub kind: FeatureKind,
}

/// One wave of a profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wave {
    /// Crest-to-trough elevation difference
    pub height: f64,
    /// Wave length, or period for profiles along time
    pub length: f64,
}

/// Crests and troughs of `elevation` sampled every `spacing`
///
/// Plateaus are not extrema.
#[must_use]
pub fn find_extrema(elevation: &[f64], spacing: f64) -> Vec<WaveFeature> {
    elevation
        .windows(3)
        .enumerate()
        .filter_map(|(i, w)| {
            let (z0, z1, z2) = (w[0], w[1], w[2]);
            let kind = if z1 > z0 && z1 > z2 {
                FeatureKind::Crest
            } else if z1 < z0 && z1 < z2 {
                FeatureKind::Trough
            } else {
                return None;
            };
            // parabola z = a·s² + b·s + c with s = -1, 0, 1 at the samples
            let a = 0.5 * (z0 + z2) - z1;
            let b = 0.5 * (z2 - z0);
            let s = -b / (2.0 * a);
            Some(WaveFeature {
                x: (i as f64 + 1.0 + s) * spacing,
                z: z1 - b * b / (4.0 * a),
                kind,
            })
        })
        .collect()
}

/// Waves between adjacent crest-trough pairs
///
/// Each pair is half a wave: the length is twice their distance, the height
/// their elevation difference. Repeated features of one kind are skipped.
#[must_use]
pub fn factor_waves(features: &[WaveFeature]) -> Vec<Wave> {
    features
        .windows(2)
        .filter(|w| w[0].kind != w[1].kind)
        .map(|w| Wave {
            height: (w[0].z - w[1].z).abs(),
            length: 2.0 * (w[0].x - w[1].x).abs(),
        })
        .collect()
}

/// Waves of a realization along each axis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveField {
    /// Along time, `length` is the period
    pub along_t: Vec<Wave>,
    /// Along x
    pub along_x: Vec<Wave>,
    /// Along y
    pub along_y: Vec<Wave>,
}

impl WaveField {
    /// Cut every line of `field` parallel to an axis into waves
    ///
    /// Lines are processed in parallel and concatenated in index order.
    #[must_use]
    pub fn extract(field: &Array3, grid: &Grid) -> Self {
        let delta = grid.delta();
        Self {
            along_t: waves_along(field, 0, delta[0]),
            along_x: waves_along(field, 1, delta[1]),
            along_y: waves_along(field, 2, delta[2]),
        }
    }

    /// Wave periods
    #[must_use]
    pub fn periods(&self) -> Vec<f64> {
        self.along_t.iter().map(|w| w.length).collect()
    }

    /// Wave lengths along x
    #[must_use]
    pub fn lengths_x(&self) -> Vec<f64> {
        self.along_x.iter().map(|w| w.length).collect()
    }

    /// Wave lengths along y
    #[must_use]
    pub fn lengths_y(&self) -> Vec<f64> {
        self.along_y.iter().map(|w| w.length).collect()
    }

    /// Wave heights along x
    #[must_use]
    pub fn heights_x(&self) -> Vec<f64> {
        self.along_x.iter().map(|w| w.height).collect()
    }

    /// Wave heights along y
    #[must_use]
    pub fn heights_y(&self) -> Vec<f64> {
        self.along_y.iter().map(|w| w.height).collect()
    }
}

fn waves_along(field: &Array3, axis: usize, spacing: f64) -> Vec<Wave> {
    let s = field.shape();
    let n = s.axis(axis);
    let (a, b) = match axis {
        0 => (s.x, s.y),
        1 => (s.t, s.y),
        _ => (s.t, s.x),
    };
    let per_line: Vec<Vec<Wave>> = (0..a * b)
        .into_par_iter()
        .map(|line| {
            let (i, j) = (line / b, line % b);
            let profile: Vec<f64> = (0..n)
                .map(|k| match axis {
                    0 => field.get(k, i, j),
                    1 => field.get(i, k, j),
                    _ => field.get(i, j, k),
                })
                .collect();
            factor_waves(&find_extrema(&profile, spacing))
        })
        .collect();
    per_line.into_iter().flatten().collect()
}

/// Count, mean and sample standard deviation of a series
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeriesSummary {
    /// Number of values
    pub count: usize,
    /// Mean, zero when empty
    pub mean: f64,
    /// Standard deviation with `n - 1` in the denominator, zero for fewer
    /// than two values
    pub std_dev: f64,
}

impl SeriesSummary {
    /// Summarize `values`
    #[must_use]
    pub fn of(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self::default();
        }
        let mean = values.iter().sum::<f64>() / count as f64;
        let std_dev = if count > 1 {
            let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
            (ss / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        Self {
            count,
            mean,
            std_dev,
        }
    }
}

/// Elevation and wave statistics of one realization
#[derive(Debug, Clone, PartialEq)]
pub struct WaveSummary {
    /// Surface elevation
    pub elevation: SeriesSummary,
    /// Wave heights along x
    pub heights_x: SeriesSummary,
    /// Wave heights along y
    pub heights_y: SeriesSummary,
    /// Wave lengths along x
    pub lengths_x: SeriesSummary,
    /// Wave lengths along y
    pub lengths_y: SeriesSummary,
    /// Wave periods
    pub periods: SeriesSummary,
}

impl WaveSummary {
    fn rows(&self) -> [(&'static str, &SeriesSummary); 6] {
        [
            ("elevation", &self.elevation),
            ("wave height x", &self.heights_x),
            ("wave height y", &self.heights_y),
            ("wave length x", &self.lengths_x),
            ("wave length y", &self.lengths_y),
            ("wave period", &self.periods),
        ]
    }
}

impl fmt::Display for WaveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<16}{:>10}{:>14}{:>14}", "Property", "Count", "Mean", "Std dev")?;
        for (name, s) in self.rows() {
            writeln!(f, "{name:<16}{:>10}{:>14.6}{:>14.6}", s.count, s.mean, s.std_dev)?;
        }
        Ok(())
    }
}

/// Elevation and per-axis wave statistics of `field` sampled on `grid`
#[must_use]
pub fn summarize(field: &Array3, grid: &Grid) -> WaveSummary {
    let waves = WaveField::extract(field, grid);
    let summary = WaveSummary {
        elevation: SeriesSummary::of(field.as_slice()),
        heights_x: SeriesSummary::of(&waves.heights_x()),
        heights_y: SeriesSummary::of(&waves.heights_y()),
        lengths_x: SeriesSummary::of(&waves.lengths_x()),
        lengths_y: SeriesSummary::of(&waves.lengths_y()),
        periods: SeriesSummary::of(&waves.periods()),
    };
    for (axis, found) in [&waves.along_t, &waves.along_x, &waves.along_y].iter().enumerate() {
        debug!(axis = AXIS_NAMES[axis], waves = found.len(), "waves extracted");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::TAU;

    #[test]
    fn test_mean_and_variance() {
        let a = Array3::from_vec(Shape3::new(1, 2, 2), vec![1.0, 2.0, 3.0, 6.0]).unwrap();
        assert_relative_eq!(mean(&a), 3.0);
        assert_relative_eq!(variance(&a), 3.5);
        assert_eq!(mean(&Array3::zeros(Shape3::zero())), 0.0);
    }

    #[test]
    fn test_empirical_acf_of_alternating_series() {
        let a = Array3::from_fn(Shape3::new(1, 1, 8), |_, _, y| if y % 2 == 0 { 1.0 } else { -1.0 });
        let acf = empirical_acf(&a, Shape3::new(0, 0, 2));
        assert_eq!(acf.shape(), Shape3::new(1, 1, 3));
        assert_relative_eq!(acf.get(0, 0, 0), 1.0);
        assert_relative_eq!(acf.get(0, 0, 1), -7.0 / 8.0);
        assert_relative_eq!(acf.get(0, 0, 2), 6.0 / 8.0);
    }

    #[test]
    fn test_lag_extent_is_clipped() {
        let a = Array3::with_value(Shape3::new(2, 3, 1), 1.0);
        let acf = empirical_acf(&a, Shape3::splat(5));
        assert_eq!(acf.shape(), Shape3::new(2, 3, 1));
        assert!(acf.max_abs() < 1e-15);
    }

    #[test]
    fn test_extrema_of_sampled_sine() {
        // 16 samples per wave, crests and troughs on grid points
        let profile: Vec<f64> = (0..64).map(|i| 1.5 * (TAU * i as f64 / 16.0).sin()).collect();
        let features = find_extrema(&profile, 0.5);
        assert_eq!(features.len(), 8);
        assert_eq!(features[0].kind, FeatureKind::Crest);
        assert_eq!(features[1].kind, FeatureKind::Trough);
        assert_relative_eq!(features[0].x, 2.0, epsilon = 1e-9);
        assert_relative_eq!(features[1].z, -1.5, epsilon = 1e-9);

        let waves = factor_waves(&features);
        assert_eq!(waves.len(), 7);
        for w in &waves {
            assert_relative_eq!(w.height, 3.0, epsilon = 1e-9);
            assert_relative_eq!(w.length, 8.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_vertex_lies_between_samples() {
        // z = -(x - 1.3)² sampled at 0, 1, 2
        let profile = [-1.69, -0.09, -0.49];
        let features = find_extrema(&profile, 1.0);
        assert_eq!(features.len(), 1);
        assert_relative_eq!(features[0].x, 1.3, epsilon = 1e-12);
        assert_relative_eq!(features[0].z, 0.0, epsilon = 1e-12);
        assert!(find_extrema(&[1.0, 1.0, 1.0, 2.0], 1.0).is_empty());
        assert!(factor_waves(&features).is_empty());
    }

    #[test]
    fn test_propagating_wave_summary() {
        let grid = Grid::new(Shape3::new(32, 32, 4), [0.25, 0.5, 1.0]).unwrap();
        // period 4 along t, length 8 along x, flat along y
        let field = Array3::from_fn(grid.points(), |t, x, _| {
            2.0 * (TAU * (x as f64 * 0.5 / 8.0 - t as f64 * 0.25 / 4.0)).cos()
        });
        let waves = WaveField::extract(&field, &grid);
        assert!(waves.along_y.is_empty());
        assert!(!waves.along_t.is_empty() && !waves.along_x.is_empty());
        for p in waves.periods() {
            assert_relative_eq!(p, 4.0, epsilon = 1e-9);
        }
        for l in waves.lengths_x() {
            assert_relative_eq!(l, 8.0, epsilon = 1e-9);
        }

        let summary = summarize(&field, &grid);
        assert_relative_eq!(summary.heights_x.mean, 4.0, epsilon = 1e-9);
        assert!(summary.heights_x.std_dev < 1e-9);
        assert_eq!(summary.heights_y.count, 0);
        assert_eq!(summary.periods.count, waves.along_t.len());
        assert!(summary.elevation.mean.abs() < 1e-12);
        assert_relative_eq!(variance(&field), 2.0, epsilon = 1e-12);
        let table = summary.to_string();
        assert!(table.contains("wave period"), "{table}");
        assert_eq!(table.lines().count(), 7);
    }
}
