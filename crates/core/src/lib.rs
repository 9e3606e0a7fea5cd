//! ARMA Wavy Surface Core Library
//!
//! Generates realizations of a random field over a regular `(t, x, y)` grid
//! whose autocovariance matches a target, by fitting an autoregressive
//! moving-average filter and driving it with reproducible white noise.
//!
//! ## Pipeline
//!
//! - [`acf`]: target autocovariance from wave parameters or a synthetic wave
//! - [`fit`]: Yule-Walker (AR) and fixed-point (MA) coefficient solvers
//! - [`model`]: assembles, validates and publishes the fitted filter
//! - [`nit`]: optional non-Gaussian marginal, applied around the fit
//! - [`prng`]: one independent, seekable noise stream per partition
//! - [`realization`]: applies the filter to noise, direct or via FFT
//! - [`stats`]: sample statistics for checking realizations
//!
//! Results are bit-identical for any number of worker threads.

// Core types and utilities
pub mod core_types;
pub mod profiler;
pub mod spectral;
pub mod validate;

// Pipeline stages
pub mod acf;
pub mod fit;
pub mod model;
pub mod nit;
pub mod prng;
pub mod realization;
pub mod stats;

// Re-export core types
pub use core_types::{
    ArmaError, Array3, ConvergenceError, Grid, NumericalError, ResourceError, Shape3, Violation,
};

// Re-export pipeline entry points
pub use acf::{AcfFunction, AcfParams, PlainWave, WaveProfile};
pub use model::{ArmaModel, FitReport, FittedCoefficients, ModelConfig, ModelKind, StochasticModel};
pub use nit::{NitConfig, NitTransform, TargetDistribution};
pub use prng::{PrngBank, StreamState, StreamTable};
pub use realization::{
    FilterEvaluator, RealizationConfig, RealizationPath, SurfaceEngine, SurfaceStream,
};
