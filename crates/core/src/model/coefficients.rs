//! Fitted coefficients and their validation
//!
//! [`FittedCoefficients`] is the persisted form of a model: both orders,
//! both coefficient arrays and the white-noise variance. Loading one back
//! goes through [`FittedCoefficients::validate`] before it is used.

use serde::{Deserialize, Serialize};

use crate::core_types::{Array3, Shape3, Violation};
use crate::fit::check_ar_stability;
use crate::validate;

/// Which parts of the filter are active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Neither part: scaled white noise
    WhiteNoise,
    /// Autoregressive only
    Ar,
    /// Moving average only
    Ma,
    /// Both parts
    Arma,
}

impl ModelKind {
    /// Tag derived from the two orders
    #[must_use]
    pub fn from_orders(ar_order: Shape3, ma_order: Shape3) -> Self {
        match (ar_order.is_zero(), ma_order.is_zero()) {
            (true, true) => ModelKind::WhiteNoise,
            (false, true) => ModelKind::Ar,
            (true, false) => ModelKind::Ma,
            (false, false) => ModelKind::Arma,
        }
    }
}

/// Coefficients of a fitted ARMA model
///
/// `phi` has extent `ar_order + 1` with `phi(0,0,0) = 0`; `theta` has extent
/// `ma_order + 1` with `theta(0,0,0) = -1` (Box-Jenkins sign convention).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedCoefficients {
    /// AR order
    pub ar_order: Shape3,
    /// MA order
    pub ma_order: Shape3,
    /// AR coefficients
    pub phi: Array3,
    /// MA coefficients
    pub theta: Array3,
    /// Variance of the driving white noise
    pub white_noise_variance: f64,
}

impl FittedCoefficients {
    /// Coefficients of a filter that passes noise through unchanged
    #[must_use]
    pub fn white_noise(variance: f64) -> Self {
        Self {
            ar_order: Shape3::zero(),
            ma_order: Shape3::zero(),
            phi: Array3::zeros(Shape3::splat(1)),
            theta: Array3::with_value(Shape3::splat(1), -1.0),
            white_noise_variance: variance,
        }
    }

    /// Active parts of the filter
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        ModelKind::from_orders(self.ar_order, self.ma_order)
    }

    /// Feed-forward kernel `c(k) = -theta(k)`, so `c(0,0,0) = 1`
    #[must_use]
    pub fn ma_kernel(&self) -> Array3 {
        Array3::from_fn(self.theta.shape(), |t, x, y| -self.theta.get(t, x, y))
    }

    /// Check shapes, finiteness, the fixed zero-lag values, the variance and
    /// AR stability
    ///
    /// # Errors
    ///
    /// The first violation found.
    pub fn validate(&self) -> Result<(), Violation> {
        validate::check_coefficients("AR coefficients", &self.phi, self.ar_order)?;
        validate::check_coefficients("MA coefficients", &self.theta, self.ma_order)?;
        validate::check_positive("white-noise variance", self.white_noise_variance)?;
        let phi0 = self.phi.get(0, 0, 0);
        if phi0 != 0.0 {
            return Err(Violation::FixedCoefficient {
                what: "AR coefficient at lag zero",
                expected: 0.0,
                actual: phi0,
            });
        }
        let theta0 = self.theta.get(0, 0, 0);
        if theta0 != -1.0 {
            return Err(Violation::FixedCoefficient {
                what: "MA coefficient at lag zero",
                expected: -1.0,
                actual: theta0,
            });
        }
        check_ar_stability(&self.phi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ar1(value: f64) -> FittedCoefficients {
        let mut phi = Array3::zeros(Shape3::new(2, 1, 1));
        phi.set(1, 0, 0, value);
        FittedCoefficients {
            ar_order: Shape3::new(1, 0, 0),
            ma_order: Shape3::zero(),
            phi,
            theta: Array3::with_value(Shape3::splat(1), -1.0),
            white_noise_variance: 0.19,
        }
    }

    #[test]
    fn test_kind_from_orders() {
        assert_eq!(ar1(0.5).kind(), ModelKind::Ar);
        assert_eq!(FittedCoefficients::white_noise(1.0).kind(), ModelKind::WhiteNoise);
        assert_eq!(
            ModelKind::from_orders(Shape3::zero(), Shape3::new(0, 0, 2)),
            ModelKind::Ma
        );
        assert_eq!(
            ModelKind::from_orders(Shape3::splat(1), Shape3::splat(1)),
            ModelKind::Arma
        );
    }

    #[test]
    fn test_ma_kernel_flips_sign() {
        let mut c = FittedCoefficients::white_noise(1.0);
        c.ma_order = Shape3::new(0, 1, 0);
        c.theta = Array3::from_vec(Shape3::new(1, 2, 1), vec![-1.0, 0.25]).unwrap();
        assert_eq!(c.ma_kernel().as_slice(), &[1.0, -0.25]);
    }

    #[test]
    fn test_validate_checks() {
        assert!(ar1(0.5).validate().is_ok());
        assert!(matches!(ar1(1.2).validate(), Err(Violation::Unstable { .. })));

        let mut bad = ar1(0.5);
        bad.white_noise_variance = 0.0;
        assert!(matches!(bad.validate(), Err(Violation::NotPositive { .. })));

        let mut bad = ar1(0.5);
        bad.phi.set(1, 0, 0, f64::NAN);
        assert!(matches!(bad.validate(), Err(Violation::NonFinite { .. })));

        let mut bad = ar1(0.5);
        bad.ar_order = Shape3::new(2, 0, 0);
        assert!(matches!(bad.validate(), Err(Violation::ShapeMismatch { .. })));

        let mut bad = ar1(0.5);
        bad.theta.set(0, 0, 0, 1.0);
        assert!(matches!(
            bad.validate(),
            Err(Violation::FixedCoefficient { expected, .. }) if expected == -1.0
        ));
    }
}
