//! Nonlinear inertialess transform (NIT)
//!
//! Gives the surface a non-Gaussian marginal distribution while keeping its
//! autocovariance. A Gaussian field `X` with correlation `ρ` is mapped
//! pointwise through `f(u) = σ·F⁻¹(Φ(u))`, where `F` is the target CDF. The
//! covariance of `f(X)` is `Σ c_m²·ρ^m/m!` in terms of the Gram-Charlier
//! coefficients `c_m` of `f`, so:
//!
//! 1. before the fit, every target ACF value is solved for the latent `ρ`
//!    ([`NitTransform::latent_acf`]), and the model is fitted to that;
//! 2. after generation, every value of the realization goes through `f`
//!    ([`NitTransform::transform_realization`]).
//!
//! `f` is tabulated on nodes in `[-nsigma, nsigma]` and interpolated by a
//! least-squares polynomial, whose Hermite expansion gives `c_m`.

mod distribution;
mod series;

pub use distribution::{erfc, normal_cdf, normal_pdf, TargetDistribution};
pub use series::{Bisection, HermiteSeries};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core_types::{ArmaError, Array3, Violation};
use crate::profiler::ProfilerScope;
use crate::validate;
use series::{eval_polynomial, fit_polynomial};

/// Transform settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NitConfig {
    /// Marginal distribution of the output
    pub distribution: TargetDistribution,
    /// Coefficients in the interpolating polynomial
    pub interpolation_order: usize,
    /// Nodes the polynomial is fitted through
    pub interpolation_nodes: usize,
    /// Most Gram-Charlier terms kept
    pub gram_charlier_order: usize,
    /// Half-width of the node range, in standard deviations
    pub nsigma: f64,
    /// Bracket width at which root solves stop
    pub tolerance: f64,
    /// Halvings per root solve
    pub max_iterations: usize,
}

impl Default for NitConfig {
    fn default() -> Self {
        Self {
            distribution: TargetDistribution::default(),
            interpolation_order: 12,
            interpolation_nodes: 100,
            gram_charlier_order: 10,
            nsigma: 5.0,
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

impl NitConfig {
    /// # Errors
    ///
    /// [`Violation::NotPositive`] for a zero count or a non-positive width,
    /// [`Violation::NonFinite`] for non-finite distribution moments.
    pub fn validate(&self) -> Result<(), Violation> {
        validate::check_positive("NIT nsigma", self.nsigma)?;
        validate::check_positive("NIT tolerance", self.tolerance)?;
        for (what, n) in [
            ("NIT interpolation order", self.interpolation_order),
            ("NIT interpolation nodes", self.interpolation_nodes),
            ("NIT Gram-Charlier order", self.gram_charlier_order),
            ("NIT iterations", self.max_iterations),
        ] {
            validate::check_positive(what, n as f64)?;
        }
        if self.interpolation_nodes < self.interpolation_order {
            return Err(Violation::NotPositive {
                what: "NIT nodes beyond the interpolation order",
                value: self.interpolation_nodes as f64 - self.interpolation_order as f64,
            });
        }
        if let TargetDistribution::GramCharlier { skewness, kurtosis } = self.distribution {
            validate::check_finite("NIT skewness", &[skewness])?;
            validate::check_positive("NIT kurtosis", kurtosis)?;
        }
        Ok(())
    }

    fn bisection(&self) -> Bisection {
        Bisection {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
        }
    }

    /// Standardized target quantile of a standard normal value
    fn quantile(&self, u: f64) -> f64 {
        let p = normal_cdf(u);
        let width = 2.0 * self.nsigma;
        self.bisection()
            .solve(|z| self.distribution.cdf(z) - p, -width, width)
    }
}

/// Fitted transform for one target ACF
#[derive(Debug, Clone, PartialEq)]
pub struct NitTransform {
    config: NitConfig,
    /// `sqrt(acf(0))` of the target
    std_dev: f64,
    /// `sqrt(latent acf(0))`, scales realization values to unit variance
    latent_std_dev: f64,
    series: HermiteSeries,
    latent_acf: Array3,
}

impl NitTransform {
    /// Fit the transform and solve the latent ACF
    ///
    /// With a normal target the transform is the identity and the latent
    /// ACF is `acf` itself.
    ///
    /// # Errors
    ///
    /// [`ArmaError::Domain`] for invalid settings or an ACF with a
    /// non-positive zero lag, [`ArmaError::Numerical`] when the
    /// interpolation fails.
    pub fn new(config: &NitConfig, acf: &Array3) -> Result<Self, ArmaError> {
        let _scope = ProfilerScope::new("nit_transform_acf");
        config.validate()?;
        let variance = acf.get(0, 0, 0);
        validate::check_positive("ACF variance", variance)?;
        let std_dev = variance.sqrt();

        if config.distribution.is_normal() {
            return Ok(Self {
                config: config.clone(),
                std_dev,
                latent_std_dev: std_dev,
                series: HermiteSeries::expand(&[0.0, std_dev], variance, 2),
                latent_acf: acf.clone(),
            });
        }

        let n = config.interpolation_nodes;
        let nodes: Vec<f64> = (0..n)
            .map(|i| -config.nsigma + 2.0 * config.nsigma * i as f64 / (n - 1).max(1) as f64)
            .collect();
        let values: Vec<f64> = nodes
            .par_iter()
            .map(|&u| std_dev * config.quantile(u))
            .collect();
        let poly = fit_polynomial(&nodes, &values, config.interpolation_order)?;
        let residual = nodes
            .iter()
            .zip(&values)
            .map(|(&u, v)| (eval_polynomial(&poly, u) - v).abs())
            .fold(0.0, f64::max);
        let series = HermiteSeries::expand(&poly, variance, config.gram_charlier_order);
        debug!(
            residual,
            terms = series.coefs.len(),
            error = series.error,
            "Gram-Charlier expansion"
        );

        let bisection = config.bisection();
        let latent: Vec<f64> = acf
            .as_slice()
            .par_iter()
            .map(|&gamma| bisection.solve(|rho| series.covariance(rho) - gamma, -1.0, 1.0))
            .collect();
        let latent_acf = Array3::from_vec(acf.shape(), latent)?;
        validate::check_acf(&latent_acf)?;
        info!(
            target_variance = variance,
            latent_variance = latent_acf.get(0, 0, 0),
            terms = series.coefs.len(),
            "ACF transformed for non-Gaussian marginal"
        );
        Ok(Self {
            config: config.clone(),
            std_dev,
            latent_std_dev: latent_acf.get(0, 0, 0).sqrt(),
            series,
            latent_acf,
        })
    }

    /// ACF the Gaussian model has to reproduce
    pub fn latent_acf(&self) -> &Array3 {
        &self.latent_acf
    }

    /// Gram-Charlier coefficients of the pointwise map
    pub fn series(&self) -> &HermiteSeries {
        &self.series
    }

    /// True when realizations pass through unchanged
    pub fn is_identity(&self) -> bool {
        self.config.distribution.is_normal()
    }

    /// Map one latent value to the target marginal
    pub fn apply(&self, x: f64) -> f64 {
        self.std_dev * self.config.quantile(x / self.latent_std_dev)
    }

    /// Map a realization of the latent model to the target marginal in place
    pub fn transform_realization(&self, field: &mut Array3) {
        if self.is_identity() {
            return;
        }
        let _scope = ProfilerScope::new("nit_transform_realization");
        field.as_mut_slice().par_iter_mut().for_each(|x| *x = self.apply(*x));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acf::{self, AcfParams};
    use crate::core_types::{Grid, Shape3};
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, StandardNormal};

    fn skewed(skewness: f64, kurtosis: f64) -> NitConfig {
        NitConfig {
            distribution: TargetDistribution::GramCharlier { skewness, kurtosis },
            ..NitConfig::default()
        }
    }

    fn target_acf() -> Array3 {
        let grid = Grid::new(Shape3::new(6, 6, 6), [1.0; 3]).unwrap();
        acf::generate(&AcfParams::exponential_anisotropic(2.25, [2.0, 3.0, 4.0]), &grid).unwrap()
    }

    #[test]
    fn test_normal_target_is_identity() {
        let acf = target_acf();
        let nit = NitTransform::new(&NitConfig::default(), &acf).unwrap();
        assert!(nit.is_identity());
        assert_eq!(nit.latent_acf(), &acf);
        let mut field = acf.clone();
        nit.transform_realization(&mut field);
        assert_eq!(field, acf);
    }

    #[test]
    fn test_latent_acf_is_a_correlation() {
        let acf = target_acf();
        let nit = NitTransform::new(&skewed(0.3, 3.5), &acf).unwrap();
        let latent = nit.latent_acf();
        assert_relative_eq!(latent.get(0, 0, 0), 1.0, epsilon = 2e-3);
        for (t, x, y) in acf.shape().indices().skip(1) {
            let expected = acf.get(t, x, y) / 2.25;
            let got = latent.get(t, x, y);
            assert!(got > 0.0 && got < latent.get(0, 0, 0));
            assert_relative_eq!(got, expected, max_relative = 0.02, epsilon = 1e-4);
        }
        // the solved ρ reproduces the target through the series
        let rho = latent.get(1, 1, 0);
        assert_relative_eq!(nit.series().covariance(rho), acf.get(1, 1, 0), epsilon = 1e-4);
    }

    #[test]
    fn test_realization_gets_target_moments() {
        let acf = target_acf();
        let nit = NitTransform::new(&skewed(0.3, 3.5), &acf).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let shape = Shape3::new(100, 100, 10);
        let scale = nit.latent_acf().get(0, 0, 0).sqrt();
        let mut field = Array3::from_fn(shape, |_, _, _| {
            let u: f64 = StandardNormal.sample(&mut rng);
            scale * u
        });
        nit.transform_realization(&mut field);

        let values = field.as_slice();
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let moment = |k: i32| values.iter().map(|v| (v - mean).powi(k)).sum::<f64>() / n;
        assert!(mean.abs() < 0.03, "mean {mean}");
        assert_relative_eq!(var, 2.25, max_relative = 0.03);
        assert_relative_eq!(moment(3) / var.powf(1.5), 0.3, epsilon = 0.05);
        assert_relative_eq!(moment(4) / (var * var), 3.5, epsilon = 0.15);
    }

    #[test]
    fn test_symmetric_target_keeps_odd_map() {
        let nit = NitTransform::new(&skewed(0.0, 3.6), &target_acf()).unwrap();
        assert_relative_eq!(nit.apply(0.0), 0.0, epsilon = 1e-5);
        assert_relative_eq!(nit.apply(1.2), -nit.apply(-1.2), epsilon = 1e-5);
        assert!(nit.series().coefs[0].abs() < 1e-5);
    }

    #[test]
    fn test_rejects_bad_settings() {
        let acf = target_acf();
        let mut config = skewed(0.3, 3.5);
        config.nsigma = 0.0;
        assert!(matches!(
            NitTransform::new(&config, &acf),
            Err(ArmaError::Domain(Violation::NotPositive { .. }))
        ));
        let mut config = skewed(0.3, 3.5);
        config.interpolation_nodes = 4;
        assert!(NitTransform::new(&config, &acf).is_err());
        let flat = Array3::zeros(Shape3::splat(2));
        assert!(NitTransform::new(&skewed(0.3, 3.5), &flat).is_err());
    }
}
