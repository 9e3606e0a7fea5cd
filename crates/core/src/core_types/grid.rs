//! Grid and per-axis shape types
//!
//! Every array in the crate is indexed `(t, x, y)`: time first, then the two
//! spatial axes. A [`Shape3`] doubles as a point count (for grids and arrays)
//! and as a filter order (for AR/MA parts), where order `p` on an axis spans
//! lags `0..=p`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ArmaError;
use crate::validate;

/// Axis names in storage order, used in diagnostics
pub const AXIS_NAMES: [&str; 3] = ["t", "x", "y"];

/// Per-axis extent or filter order in `(t, x, y)` order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Shape3 {
    /// Temporal axis
    pub t: usize,
    /// First spatial axis
    pub x: usize,
    /// Second spatial axis
    pub y: usize,
}

impl Shape3 {
    /// Create a shape from its three components
    #[must_use]
    pub const fn new(t: usize, x: usize, y: usize) -> Self {
        Self { t, x, y }
    }

    /// Same value on every axis
    #[must_use]
    pub const fn splat(n: usize) -> Self {
        Self::new(n, n, n)
    }

    /// All-zero shape (no dependence on any axis)
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    /// Components as an array in `(t, x, y)` order
    #[must_use]
    pub const fn to_array(self) -> [usize; 3] {
        [self.t, self.x, self.y]
    }

    /// Build from an array in `(t, x, y)` order
    #[must_use]
    pub const fn from_array(a: [usize; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    /// Component along `axis` (0 = t, 1 = x, 2 = y)
    ///
    /// # Panics
    ///
    /// Panics if `axis > 2`
    #[must_use]
    pub fn axis(self, axis: usize) -> usize {
        self.to_array()[axis]
    }

    /// Number of cells spanned (product of components)
    #[must_use]
    pub const fn volume(self) -> usize {
        self.t * self.x * self.y
    }

    /// True when every component is zero
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.t == 0 && self.x == 0 && self.y == 0
    }

    /// Array extent of a filter with this order (`order + 1` per axis)
    #[must_use]
    pub const fn extent(self) -> Self {
        Self::new(self.t + 1, self.x + 1, self.y + 1)
    }

    /// Number of axes with a non-zero component
    #[must_use]
    pub fn active_axes(self) -> usize {
        self.to_array().iter().filter(|&&n| n > 0).count()
    }

    /// Largest component
    #[must_use]
    pub fn max_component(self) -> usize {
        self.t.max(self.x).max(self.y)
    }

    /// Component-wise minimum
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.t.min(other.t), self.x.min(other.x), self.y.min(other.y))
    }

    /// Component-wise maximum
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.t.max(other.t), self.x.max(other.x), self.y.max(other.y))
    }

    /// True when `other` is no larger than `self` on every axis
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        other.t <= self.t && other.x <= self.x && other.y <= self.y
    }

    /// Iterate every index of a box with this extent in `(t, x, y)` order
    pub fn indices(self) -> impl DoubleEndedIterator<Item = (usize, usize, usize)> + Clone {
        let Self { t: _, x: nx, y: ny } = self;
        let plane = nx * ny;
        (0..self.volume()).map(move |i| (i / plane, (i / ny) % nx, i % ny))
    }
}

impl fmt::Display for Shape3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.t, self.x, self.y)
    }
}

/// Axis-aligned `(t, x, y)` index space with physical spacing
///
/// Point counts and spacings are checked on construction; a `Grid` is
/// immutable afterwards and meant to be shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    points: Shape3,
    delta: [f64; 3],
}

impl Grid {
    /// Create a grid
    ///
    /// # Arguments
    ///
    /// * `points` - Number of points along `(t, x, y)`
    /// * `delta` - Physical spacing along `(t, x, y)`
    ///
    /// # Errors
    ///
    /// Returns a domain error if any count is zero or any spacing is not
    /// finite and strictly positive.
    pub fn new(points: Shape3, delta: [f64; 3]) -> Result<Self, ArmaError> {
        validate::check_grid(points, delta)?;
        Ok(Self { points, delta })
    }

    /// Grid with unit spacing on every axis
    ///
    /// # Errors
    ///
    /// Returns a domain error if any count is zero.
    pub fn unit(points: Shape3) -> Result<Self, ArmaError> {
        Self::new(points, [1.0; 3])
    }

    /// Point counts along `(t, x, y)`
    #[must_use]
    pub fn points(&self) -> Shape3 {
        self.points
    }

    /// Spacing along `(t, x, y)`
    #[must_use]
    pub fn delta(&self) -> [f64; 3] {
        self.delta
    }

    /// Total number of cells
    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.points.volume()
    }

    /// Physical length covered along `axis`
    #[must_use]
    pub fn length(&self, axis: usize) -> f64 {
        self.delta[axis] * (self.points.axis(axis).saturating_sub(1)) as f64
    }

    /// Same spacing with different point counts
    ///
    /// # Errors
    ///
    /// Returns a domain error if any count is zero.
    pub fn with_points(&self, points: Shape3) -> Result<Self, ArmaError> {
        Self::new(points, self.delta)
    }
}
