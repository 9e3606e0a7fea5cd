//! Marginal distributions used by the transform
//!
//! Only CDFs are needed: the transform maps a value through the source CDF
//! and back through the inverse of the target one.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Complementary error function, fractional error below 1.2e-7
///
/// Chebyshev fit from Numerical Recipes (`erfcc`).
#[must_use]
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -1.26551223
        + t * (1.00002368
            + t * (0.37409196
                + t * (0.09678418
                    + t * (-0.18628806
                        + t * (0.27886807
                            + t * (-1.13520398
                                + t * (1.48851587 + t * (-0.82215223 + t * 0.17087277))))))));
    let r = t * (-z * z + poly).exp();
    if x >= 0.0 {
        r
    } else {
        2.0 - r
    }
}

/// Standard normal density
#[must_use]
pub fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
}

/// Standard normal CDF
#[must_use]
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z * FRAC_1_SQRT_2)
}

/// Target marginal distribution of the surface elevation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TargetDistribution {
    /// Keep the Gaussian marginal; the transform is the identity
    Normal,
    /// Gram-Charlier series with the given skewness and kurtosis
    /// (`kurtosis = 3` for the normal distribution)
    GramCharlier {
        /// Third standardized moment
        skewness: f64,
        /// Fourth standardized moment
        kurtosis: f64,
    },
}

impl Default for TargetDistribution {
    fn default() -> Self {
        TargetDistribution::GramCharlier {
            skewness: 0.0,
            kurtosis: 3.0,
        }
    }
}

impl TargetDistribution {
    /// CDF of the standardized distribution
    #[must_use]
    pub fn cdf(&self, z: f64) -> f64 {
        match *self {
            TargetDistribution::Normal => normal_cdf(z),
            TargetDistribution::GramCharlier { skewness, kurtosis } => {
                let correction = skewness / 6.0 * (z * z - 1.0)
                    + (kurtosis - 3.0) / 24.0 * (z * z * z - 3.0 * z);
                normal_cdf(z) - normal_pdf(z) * correction
            }
        }
    }

    /// True when the target is exactly the Gaussian the model produces
    #[must_use]
    pub fn is_normal(&self) -> bool {
        match *self {
            TargetDistribution::Normal => true,
            TargetDistribution::GramCharlier { skewness, kurtosis } => {
                skewness == 0.0 && kurtosis == 3.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normal_cdf_reference_values() {
        assert_relative_eq!(normal_cdf(0.0), 0.5, epsilon = 1e-7);
        assert_relative_eq!(normal_cdf(1.0), 0.841_344_746, epsilon = 1e-7);
        assert_relative_eq!(normal_cdf(-1.96), 0.024_997_895, epsilon = 1e-7);
        assert_relative_eq!(normal_cdf(-5.0), 2.866_515_7e-7, max_relative = 1e-5);
        assert_relative_eq!(erfc(0.5) + erfc(-0.5), 2.0, epsilon = 1e-15);
    }

    #[test]
    fn test_gram_charlier_reduces_to_normal() {
        let gc = TargetDistribution::default();
        assert!(gc.is_normal());
        for z in [-2.0, -0.3, 0.0, 1.1, 3.0] {
            assert_relative_eq!(gc.cdf(z), normal_cdf(z), epsilon = 1e-15);
        }
    }

    #[test]
    fn test_positive_skew_lowers_the_median_quantile() {
        let skewed = TargetDistribution::GramCharlier {
            skewness: 0.4,
            kurtosis: 3.0,
        };
        // more mass left of zero: F(0) = 0.5 + φ(0)·s/6
        assert_relative_eq!(
            skewed.cdf(0.0),
            0.5 + normal_pdf(0.0) * 0.4 / 6.0,
            epsilon = 1e-7
        );
        assert!(!skewed.is_normal());
        assert_relative_eq!(skewed.cdf(8.0), 1.0, epsilon = 1e-9);
        assert_relative_eq!(skewed.cdf(-8.0), 0.0, epsilon = 1e-9);
    }
}
