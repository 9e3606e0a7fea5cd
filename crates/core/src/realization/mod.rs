//! Surface realization module
//!
//! Turns a fitted ARMA model into wavy-surface realizations. The core
//! abstraction is the `FilterEvaluator` trait, which applies the causal
//! filter (MA feed-forward, then AR feedback) to noise drawn from the PRNG
//! bank.
//!
//! # Evaluator Selection
//!
//! The path is chosen per model from [`RealizationConfig`]:
//! 1. `Direct`: spatial-domain sums, always available
//! 2. `Fourier`: overlap-add FFT convolution for the MA part
//! 3. `Auto`: Fourier once the MA kernel reaches `fft_threshold` taps
//!
//! An external accelerated evaluator can replace both through
//! [`SurfaceEngine::with_evaluator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use arma_surface_core::{ArmaModel, ModelConfig, AcfParams, Grid, Shape3};
//! use arma_surface_core::prng::StreamTable;
//! use arma_surface_core::realization::SurfaceEngine;
//!
//! let grid = Grid::unit(Shape3::new(64, 32, 32))?;
//! let mut model = ArmaModel::from_params(grid, &AcfParams::default(), ModelConfig::ar(Shape3::splat(2)))?;
//! model.fit()?;
//! let surface = SurfaceEngine::new(&model, &StreamTable::default())?.generate()?;
//! ```

mod direct;
mod engine;
mod fourier;
pub mod partition;
#[allow(clippy::module_name_repetitions)]
mod r#trait;

// Re-exports
pub use direct::{DirectEvaluator, DEFAULT_AR_BLOCK};
pub use engine::{SurfaceEngine, SurfaceStream};
pub use fourier::FourierEvaluator;
pub use partition::{NoisePartitions, DEFAULT_PARTITION_SHAPE};
pub use r#trait::FilterEvaluator;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core_types::Shape3;

/// Which evaluator runs the MA part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RealizationPath {
    /// Pick by kernel size
    #[default]
    Auto,
    /// Always sum in the spatial domain
    Direct,
    /// Always convolve through the FFT
    Fourier,
}

/// Realization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizationConfig {
    /// Evaluator selection
    pub path: RealizationPath,
    /// MA kernel size (in taps) from which `Auto` switches to Fourier
    pub fft_threshold: usize,
    /// Noise tile edge along `x` and `y`
    pub partition_shape: [usize; 2],
    /// Block edge of the AR wavefront
    pub ar_block: Shape3,
}

impl Default for RealizationConfig {
    fn default() -> Self {
        Self {
            path: RealizationPath::Auto,
            fft_threshold: 128,
            partition_shape: DEFAULT_PARTITION_SHAPE,
            ar_block: DEFAULT_AR_BLOCK,
        }
    }
}

impl RealizationConfig {
    /// Same settings with a fixed evaluator path
    #[must_use]
    pub fn with_path(mut self, path: RealizationPath) -> Self {
        self.path = path;
        self
    }
}

/// Create a filter evaluator for an MA kernel of `kernel_taps` cells
///
/// # Arguments
///
/// * `config` - Realization settings
/// * `kernel_taps` - Number of cells in the MA kernel
///
/// # Returns
///
/// A boxed `FilterEvaluator` for the selected path
#[must_use]
pub fn create_evaluator(config: &RealizationConfig, kernel_taps: usize) -> Box<dyn FilterEvaluator> {
    let fourier = match config.path {
        RealizationPath::Direct => false,
        RealizationPath::Fourier => true,
        RealizationPath::Auto => kernel_taps >= config.fft_threshold,
    };
    if fourier {
        info!(
            "Using Fourier evaluator ({} MA taps, threshold {})",
            kernel_taps, config.fft_threshold
        );
        Box::new(FourierEvaluator::new(config.ar_block))
    } else {
        info!(
            "Using direct evaluator ({} MA taps, threshold {})",
            kernel_taps, config.fft_threshold
        );
        Box::new(DirectEvaluator::new(config.ar_block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_switches_on_threshold() {
        let config = RealizationConfig {
            fft_threshold: 10,
            ..RealizationConfig::default()
        };
        assert_eq!(create_evaluator(&config, 9).name(), "direct");
        assert_eq!(create_evaluator(&config, 10).name(), "fourier");
        assert!(!create_evaluator(&config, 10).is_accelerated());
    }

    #[test]
    fn test_explicit_paths() {
        let direct = RealizationConfig::default().with_path(RealizationPath::Direct);
        let fourier = RealizationConfig::default().with_path(RealizationPath::Fourier);
        assert_eq!(create_evaluator(&direct, 10_000).name(), "direct");
        assert_eq!(create_evaluator(&fourier, 1).name(), "fourier");
    }
}
