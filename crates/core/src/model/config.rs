//! Model configuration

use serde::{Deserialize, Serialize};

use crate::core_types::Shape3;
use crate::fit::{MaSolverConfig, YuleWalkerConfig};
use crate::nit::NitConfig;
use crate::realization::RealizationConfig;

/// Default master seed
pub const DEFAULT_SEED: u64 = 0;

/// Configuration for fitting and realizing an ARMA model.
///
/// Orders are per-axis lag counts in `(t, x, y)` order. A zero order
/// disables that part: `ar_order = 0` gives a pure MA model and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// AR order (or maximum order under order determination).
    pub ar_order: Shape3,

    /// MA order.
    pub ma_order: Shape3,

    /// Yule-Walker solver settings.
    pub yule_walker: YuleWalkerConfig,

    /// MA solver settings.
    pub ma_solver: MaSolverConfig,

    /// Realization settings.
    pub realization: RealizationConfig,

    /// Master seed for the PRNG bank.
    pub seed: u64,

    /// Non-Gaussian marginal; `None` keeps the Gaussian output.
    #[serde(default)]
    pub nit: Option<NitConfig>,
}

impl Default for ModelConfig {
    /// Pure AR model of order one on every axis.
    fn default() -> Self {
        Self::ar(Shape3::splat(1))
    }
}

impl ModelConfig {
    /// Create a configuration with both parts and default solver settings.
    ///
    /// # Arguments
    ///
    /// * `ar_order` - Autoregressive order
    /// * `ma_order` - Moving-average order
    #[must_use]
    pub fn arma(ar_order: Shape3, ma_order: Shape3) -> Self {
        Self {
            ar_order,
            ma_order,
            yule_walker: YuleWalkerConfig::default(),
            ma_solver: MaSolverConfig::default(),
            realization: RealizationConfig::default(),
            seed: DEFAULT_SEED,
            nit: None,
        }
    }

    /// Pure AR model.
    #[must_use]
    pub fn ar(order: Shape3) -> Self {
        Self::arma(order, Shape3::zero())
    }

    /// Pure MA model.
    #[must_use]
    pub fn ma(order: Shape3) -> Self {
        Self::arma(Shape3::zero(), order)
    }

    /// No filter at all: realizations are white noise with the ACF's
    /// zero-lag variance.
    #[must_use]
    pub fn white_noise() -> Self {
        Self::arma(Shape3::zero(), Shape3::zero())
    }

    /// Same configuration with another master seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Same configuration with a transformed marginal distribution.
    #[must_use]
    pub fn with_nit(mut self, nit: NitConfig) -> Self {
        self.nit = Some(nit);
        self
    }
}
