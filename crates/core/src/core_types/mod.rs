//! Core types and utilities

pub mod array;
pub mod error;
pub mod grid;

pub use array::Array3;
pub use error::{ArmaError, ConvergenceError, NumericalError, ResourceError, Violation};
pub use grid::{Grid, Shape3, AXIS_NAMES};
