//! ARMA model assembly
//!
//! [`ArmaModel`] owns the grid, the target ACF and the configuration, fits
//! AR and MA coefficients, and publishes them only once they pass
//! validation. Pure AR, pure MA and white noise are the same type with a
//! zero order on one or both parts; [`ModelKind`] names which.
//!
//! # Fitting pipeline
//!
//! 1. The ACF must be positive definite over the lags both orders need
//! 2. AR coefficients from the Yule-Walker equations (optionally growing the
//!    order until the variance settles), with a white-noise variance below
//!    `acf(0)`
//! 3. For a mixed model, the AR part is removed from the ACF
//! 4. MA coefficients by fixed-point iteration against the remaining ACF
//! 5. Validation (shapes, finiteness, variance, AR stability), then publish
//!
//! With a non-Gaussian marginal configured, steps 1-4 run on the latent ACF
//! solved by [`NitTransform`], and realizations are mapped back through it.

pub mod coefficients;
pub mod config;

pub use coefficients::{FittedCoefficients, ModelKind};
pub use config::{ModelConfig, DEFAULT_SEED};

use std::sync::Arc;
use tracing::info;

use crate::acf::{self, AcfParams};
use crate::core_types::{ArmaError, Array3, Grid, NumericalError, Shape3};
use crate::fit::{
    ar_variance, ma_residual, ma_solver, remove_ar, yule_walker, yule_walker_residual,
    SolveStrategy, Termination,
};
use crate::nit::NitTransform;
use crate::profiler::ProfilerScope;
use crate::realization::create_evaluator;
use crate::validate;

/// Common interface of the stochastic surface models
pub trait StochasticModel {
    /// Publish previously fitted coefficients after validating them
    ///
    /// # Errors
    ///
    /// A domain error if the coefficients fail validation.
    fn read_parameters(&mut self, coefficients: FittedCoefficients) -> Result<(), ArmaError>;

    /// Validate the published coefficients
    ///
    /// # Errors
    ///
    /// [`ArmaError::NotFitted`] or the first violation found.
    fn validate(&self) -> Result<(), ArmaError>;

    /// Filter unit-variance white `noise` into a realization of the same
    /// shape
    ///
    /// # Errors
    ///
    /// [`ArmaError::NotFitted`] or a domain error for non-finite noise.
    fn generate(&self, noise: &Array3) -> Result<Array3, ArmaError>;

    /// Variance of the driving white noise
    ///
    /// # Errors
    ///
    /// [`ArmaError::NotFitted`].
    fn white_noise_variance(&self) -> Result<f64, ArmaError>;
}

/// Summary of one call to [`ArmaModel::fit`]
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Active parts
    pub kind: ModelKind,
    /// AR order actually used
    pub ar_order: Shape3,
    /// MA order
    pub ma_order: Shape3,
    /// Order selection settled before the maximum
    pub ar_converged: bool,
    /// Strategy that solved the Yule-Walker system
    pub ar_strategy: SolveStrategy,
    /// Rough condition number of the Yule-Walker system
    pub condition_estimate: f64,
    /// MA residual fell below the tolerance
    pub ma_converged: bool,
    /// MA iterations performed
    pub ma_iterations: usize,
    /// Largest MA residual
    pub ma_residual: f64,
    /// MA stop reason
    pub ma_termination: Termination,
    /// Published white-noise variance
    pub white_noise_variance: f64,
}

impl FitReport {
    /// True when both parts converged
    #[must_use]
    pub fn converged(&self) -> bool {
        self.ar_converged && self.ma_converged
    }
}

/// ARMA model of a wavy surface
#[derive(Debug)]
pub struct ArmaModel {
    grid: Arc<Grid>,
    acf: Arc<Array3>,
    config: ModelConfig,
    published: Option<Arc<FittedCoefficients>>,
    transform: Option<Arc<NitTransform>>,
    last_report: Option<FitReport>,
}

impl ArmaModel {
    /// Create a model from a target ACF
    ///
    /// # Arguments
    ///
    /// * `grid` - Realization grid
    /// * `acf` - Target autocovariance at non-negative lags
    /// * `config` - Orders and solver settings
    ///
    /// # Errors
    ///
    /// A domain error if the ACF is not a usable covariance or an order
    /// needs lags the ACF does not have.
    pub fn new(grid: Grid, acf: Array3, config: ModelConfig) -> Result<Self, ArmaError> {
        validate::check_acf(&acf)?;
        check_orders(&config, acf.shape())?;
        Ok(Self {
            grid: Arc::new(grid),
            acf: Arc::new(acf),
            config,
            published: None,
            transform: None,
            last_report: None,
        })
    }

    /// Create a model whose ACF is generated from wave parameters on `grid`
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`], plus invalid parameters.
    pub fn from_params(grid: Grid, params: &AcfParams, config: ModelConfig) -> Result<Self, ArmaError> {
        let acf = acf::generate(params, &grid)?;
        Self::new(grid, acf, config)
    }

    /// Realization grid
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Target ACF
    #[must_use]
    pub fn acf(&self) -> &Array3 {
        &self.acf
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Replace the target ACF and drop published coefficients
    ///
    /// # Errors
    ///
    /// Same checks as [`Self::new`]; the model is unchanged on error.
    pub fn set_acf(&mut self, acf: Array3) -> Result<(), ArmaError> {
        validate::check_acf(&acf)?;
        check_orders(&self.config, acf.shape())?;
        self.acf = Arc::new(acf);
        self.clear();
        Ok(())
    }

    /// Replace both orders and drop published coefficients
    ///
    /// # Errors
    ///
    /// A domain error if an order does not fit the ACF.
    pub fn set_orders(&mut self, ar_order: Shape3, ma_order: Shape3) -> Result<(), ArmaError> {
        let config = ModelConfig {
            ar_order,
            ma_order,
            ..self.config.clone()
        };
        self.set_config(config)
    }

    /// Replace the whole configuration and drop published coefficients
    ///
    /// # Errors
    ///
    /// A domain error if an order does not fit the ACF.
    pub fn set_config(&mut self, config: ModelConfig) -> Result<(), ArmaError> {
        check_orders(&config, self.acf.shape())?;
        self.config = config;
        self.clear();
        Ok(())
    }

    fn clear(&mut self) {
        self.published = None;
        self.transform = None;
        self.last_report = None;
    }

    /// Marginal transform of the published model, if one is configured
    #[must_use]
    pub fn transform(&self) -> Option<Arc<NitTransform>> {
        self.transform.clone()
    }

    /// ACF the Gaussian filter is fitted to: the latent one under a
    /// transform, the target otherwise
    fn fitting_acf(&self) -> &Array3 {
        match &self.transform {
            Some(t) => t.latent_acf(),
            None => &self.acf,
        }
    }

    fn build_transform(&self) -> Result<Option<Arc<NitTransform>>, ArmaError> {
        self.config
            .nit
            .as_ref()
            .map(|nit| NitTransform::new(nit, &self.acf).map(Arc::new))
            .transpose()
    }

    /// Model kind: from the published coefficients once fitted, from the
    /// configured orders before
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        match &self.published {
            Some(c) => c.kind(),
            None => ModelKind::from_orders(self.config.ar_order, self.config.ma_order),
        }
    }

    /// `(ar_order, ma_order)`, published values once fitted
    #[must_use]
    pub fn order(&self) -> (Shape3, Shape3) {
        match &self.published {
            Some(c) => (c.ar_order, c.ma_order),
            None => (self.config.ar_order, self.config.ma_order),
        }
    }

    /// Published coefficients
    ///
    /// # Errors
    ///
    /// [`ArmaError::NotFitted`] before a successful fit or load.
    pub fn coefficients(&self) -> Result<Arc<FittedCoefficients>, ArmaError> {
        self.published.clone().ok_or(ArmaError::NotFitted)
    }

    /// Report of the last successful fit
    #[must_use]
    pub fn last_report(&self) -> Option<&FitReport> {
        self.last_report.as_ref()
    }

    /// True if coefficients are published and valid
    #[must_use]
    pub fn is_valid(&self) -> bool {
        StochasticModel::validate(self).is_ok()
    }

    /// Fit coefficients to the target ACF and publish them
    ///
    /// # Errors
    ///
    /// A domain error when the ACF is not positive definite over the lags
    /// the orders need, numerical errors from either solver, convergence
    /// errors when strict convergence is configured, and
    /// [`NumericalError::Rejected`] when the result fails validation.
    /// Nothing is published on error.
    pub fn fit(&mut self) -> Result<FitReport, ArmaError> {
        let _scope = ProfilerScope::new("fit");
        let transform = self.build_transform()?;
        let acf = match &transform {
            Some(t) => t.latent_acf(),
            None => &*self.acf,
        };
        let config = &self.config;

        let extent = config.ar_order.extent().max(config.ma_order.extent());
        validate::check_acf_definite(acf, extent)?;

        let ar = yule_walker::solve(acf, config.ar_order, &config.yule_walker)?;
        validate::check_ar_variance(ar.variance, acf.get(0, 0, 0), &ar.phi)
            .map_err(NumericalError::Rejected)?;

        let ma_extent = config.ma_order.extent();
        let ma = if ar.order.is_zero() {
            ma_solver::solve(acf, config.ma_order, &config.ma_solver)?
        } else {
            let target = remove_ar(acf, &ar.phi, ma_extent);
            ma_solver::solve(&target, config.ma_order, &config.ma_solver)?
        };

        let white_noise_variance = if config.ma_order.is_zero() {
            ar.variance
        } else {
            ma.variance
        };

        let coefficients = FittedCoefficients {
            ar_order: ar.order,
            ma_order: config.ma_order,
            phi: ar.phi,
            theta: ma.theta,
            white_noise_variance,
        };
        coefficients.validate().map_err(NumericalError::Rejected)?;

        let report = FitReport {
            kind: coefficients.kind(),
            ar_order: coefficients.ar_order,
            ma_order: coefficients.ma_order,
            ar_converged: ar.converged,
            ar_strategy: ar.strategy,
            condition_estimate: ar.condition_estimate,
            ma_converged: ma.converged,
            ma_iterations: ma.iterations,
            ma_residual: ma.max_residual,
            ma_termination: ma.termination,
            white_noise_variance,
        };
        info!(
            "Fitted {:?} model: AR {}, MA {}, white-noise variance {:.6e}",
            report.kind, report.ar_order, report.ma_order, white_noise_variance
        );
        self.published = Some(Arc::new(coefficients));
        self.transform = transform;
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Largest gap between the target ACF and the ACF implied by the
    /// published filter, relative to the zero-lag variance
    ///
    /// The AR part is checked against the Yule-Walker equations, the MA part
    /// against the ACF left after removing the AR part. Under a marginal
    /// transform the latent ACF is the reference.
    ///
    /// # Errors
    ///
    /// [`ArmaError::NotFitted`], or a domain error if the published orders
    /// need lags the ACF does not have.
    pub fn verify(&self) -> Result<f64, ArmaError> {
        let c = self.coefficients()?;
        let acf = self.fitting_acf();
        validate::check_order_fits("AR", c.ar_order, acf.shape())?;
        validate::check_order_fits("MA", c.ma_order, acf.shape())?;
        let acf0 = acf.get(0, 0, 0);

        let mut worst: f64 = 0.0;
        if !c.ar_order.is_zero() {
            let variance = ar_variance(acf, &c.phi);
            worst = worst.max(yule_walker_residual(acf, &c.phi, variance));
        }
        let target = if c.ar_order.is_zero() {
            acf.corner(c.ma_order.extent())
        } else {
            remove_ar(acf, &c.phi, c.ma_order.extent())
        };
        worst = worst.max(ma_residual(&target, &c.theta, c.white_noise_variance));
        Ok(worst / acf0)
    }
}

impl StochasticModel for ArmaModel {
    fn read_parameters(&mut self, coefficients: FittedCoefficients) -> Result<(), ArmaError> {
        coefficients.validate()?;
        let transform = self.build_transform()?;
        info!(
            "Loaded {:?} coefficients: AR {}, MA {}",
            coefficients.kind(),
            coefficients.ar_order,
            coefficients.ma_order
        );
        self.published = Some(Arc::new(coefficients));
        self.transform = transform;
        self.last_report = None;
        Ok(())
    }

    fn validate(&self) -> Result<(), ArmaError> {
        let c = self.published.as_ref().ok_or(ArmaError::NotFitted)?;
        c.validate()?;
        Ok(())
    }

    fn generate(&self, noise: &Array3) -> Result<Array3, ArmaError> {
        let c = self.coefficients()?;
        validate::check_finite("noise", noise.as_slice())?;
        let std_dev = c.white_noise_variance.sqrt();
        let mut scaled = noise.clone();
        for v in scaled.as_mut_slice() {
            *v *= std_dev;
        }

        let kernel = c.ma_kernel();
        let evaluator = create_evaluator(&self.config.realization, kernel.len());
        let mut field = Array3::zeros(noise.shape());
        evaluator.apply_moving_average(&kernel, &scaled, &mut field, 0)?;
        evaluator.apply_autoregressive(&c.phi, &mut field, 0)?;
        if let Some(transform) = &self.transform {
            transform.transform_realization(&mut field);
        }
        Ok(field)
    }

    fn white_noise_variance(&self) -> Result<f64, ArmaError> {
        Ok(self.coefficients()?.white_noise_variance)
    }
}

fn check_orders(config: &ModelConfig, acf_shape: Shape3) -> Result<(), ArmaError> {
    validate::check_order_fits("AR", config.ar_order, acf_shape)?;
    validate::check_order_fits("MA", config.ma_order, acf_shape)?;
    Ok(())
}
