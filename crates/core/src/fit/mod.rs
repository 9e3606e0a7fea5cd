//! Coefficient fitting
//!
//! - [`yule_walker`]: AR coefficients from the block-Toeplitz normal
//!   equations, with optional order determination.
//! - [`ma_solver`]: MA coefficients by fixed-point iteration.
//! - [`residual`]: autocovariance identities (AR removal, implied ACFs).
//! - [`stability`]: characteristic-root check of the AR part.

pub mod ma_solver;
pub mod residual;
pub mod stability;
pub mod yule_walker;

pub use ma_solver::{MaFit, MaSolverConfig, Termination};
pub use residual::{
    ar_impulse_response, ar_variance, implied_ar_acf, implied_ma_acf, ma_autocovariance,
    ma_residual, remove_ar, yule_walker_residual,
};
pub use stability::check_ar_stability;
pub use yule_walker::{SolveStrategy, YuleWalkerConfig, YuleWalkerFit};
