//! Dense 3D arrays in `(t, x, y)` order
//!
//! [`Array3`] backs ACFs, filter coefficients, noise and realizations. Data
//! is a flat `Vec<f64>` with `index = (t * nx + x) * ny + y`, so one time
//! slice is a contiguous `nx * ny` chunk.

use serde::{Deserialize, Serialize};

use super::error::{ArmaError, Violation};
use super::grid::Shape3;

/// Dense 3D array of `f64` stored time-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Array3 {
    shape: Shape3,
    data: Vec<f64>,
}

impl Array3 {
    /// Create an array of the given shape filled with zeros
    #[must_use]
    pub fn zeros(shape: Shape3) -> Self {
        Self::with_value(shape, 0.0)
    }

    /// Create an array of the given shape filled with `value`
    #[must_use]
    pub fn with_value(shape: Shape3, value: f64) -> Self {
        Self {
            shape,
            data: vec![value; shape.volume()],
        }
    }

    /// Create an array by evaluating `f(t, x, y)` at every index
    pub fn from_fn(shape: Shape3, mut f: impl FnMut(usize, usize, usize) -> f64) -> Self {
        let data = shape.indices().map(|(t, x, y)| f(t, x, y)).collect();
        Self { shape, data }
    }

    /// Wrap an existing buffer
    ///
    /// # Errors
    ///
    /// Returns a domain error if `data.len()` differs from `shape.volume()`.
    pub fn from_vec(shape: Shape3, data: Vec<f64>) -> Result<Self, ArmaError> {
        if data.len() != shape.volume() {
            return Err(Violation::LengthMismatch {
                what: "array data",
                expected: shape.volume(),
                actual: data.len(),
            }
            .into());
        }
        Ok(Self { shape, data })
    }

    /// Extent along `(t, x, y)`
    #[must_use]
    pub fn shape(&self) -> Shape3 {
        self.shape
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for an array with a zero-length axis
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat view in storage order
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable flat view in storage order
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Consume the array and return its buffer
    #[must_use]
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Number of elements in one time slice
    #[must_use]
    pub fn plane_len(&self) -> usize {
        self.shape.x * self.shape.y
    }

    /// Flat offset of `(t, x, y)`
    #[inline]
    #[must_use]
    pub fn offset(&self, t: usize, x: usize, y: usize) -> usize {
        (t * self.shape.x + x) * self.shape.y + y
    }

    /// Value at `(t, x, y)`
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds
    #[inline]
    #[must_use]
    pub fn get(&self, t: usize, x: usize, y: usize) -> f64 {
        assert!(
            t < self.shape.t && x < self.shape.x && y < self.shape.y,
            "Index out of bounds"
        );
        self.data[self.offset(t, x, y)]
    }

    /// Set the value at `(t, x, y)`
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds
    #[inline]
    pub fn set(&mut self, t: usize, x: usize, y: usize, value: f64) {
        assert!(
            t < self.shape.t && x < self.shape.x && y < self.shape.y,
            "Index out of bounds"
        );
        let i = self.offset(t, x, y);
        self.data[i] = value;
    }

    /// Value at `(t, x, y)` or `None` outside the array
    #[must_use]
    pub fn try_get(&self, t: usize, x: usize, y: usize) -> Option<f64> {
        (t < self.shape.t && x < self.shape.x && y < self.shape.y)
            .then(|| self.data[self.offset(t, x, y)])
    }

    /// Symmetric lag lookup used for autocovariances
    ///
    /// Negative lags read `acf(|dt|, |dx|, |dy|)`; lags beyond the sampled
    /// extent read as zero.
    #[inline]
    #[must_use]
    pub fn lag(&self, dt: isize, dx: isize, dy: isize) -> f64 {
        self.try_get(dt.unsigned_abs(), dx.unsigned_abs(), dy.unsigned_abs())
            .unwrap_or(0.0)
    }

    /// Fill every element with `value`
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Contiguous view of time slice `t`
    #[must_use]
    pub fn slice_t(&self, t: usize) -> &[f64] {
        let plane = self.plane_len();
        &self.data[t * plane..(t + 1) * plane]
    }

    /// Copy of the time slices `start..start + count`
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the time extent
    #[must_use]
    pub fn time_range(&self, start: usize, count: usize) -> Self {
        assert!(start + count <= self.shape.t, "Time range out of bounds");
        let plane = self.plane_len();
        Self {
            shape: Shape3::new(count, self.shape.x, self.shape.y),
            data: self.data[start * plane..(start + count) * plane].to_vec(),
        }
    }

    /// Copy of the last `count` time slices, or all of them if fewer exist
    #[must_use]
    pub fn tail_t(&self, count: usize) -> Self {
        let count = count.min(self.shape.t);
        self.time_range(self.shape.t - count, count)
    }

    /// Stack `other` after `self` along the time axis
    ///
    /// # Errors
    ///
    /// Returns a shape violation if the spatial extents differ
    pub fn concat_t(&self, other: &Self) -> Result<Self, ArmaError> {
        if (self.shape.x, self.shape.y) != (other.shape.x, other.shape.y) {
            return Err(Violation::ShapeMismatch {
                what: "time concatenation",
                expected: Shape3::new(other.shape.t, self.shape.x, self.shape.y),
                actual: other.shape,
            }
            .into());
        }
        let mut data = Vec::with_capacity(self.data.len() + other.data.len());
        data.extend_from_slice(&self.data);
        data.extend_from_slice(&other.data);
        Ok(Self {
            shape: Shape3::new(self.shape.t + other.shape.t, self.shape.x, self.shape.y),
            data,
        })
    }

    /// Copy of the leading corner with the given extent
    ///
    /// # Panics
    ///
    /// Panics if `extent` is larger than the array on any axis
    #[must_use]
    pub fn corner(&self, extent: Shape3) -> Self {
        assert!(self.shape.contains(extent), "Corner exceeds array extent");
        Self::from_fn(extent, |t, x, y| self.get(t, x, y))
    }

    /// Largest absolute value, zero for an empty array
    #[must_use]
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
    }

    /// Sum of squares of all elements
    #[must_use]
    pub fn sum_of_squares(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_layout_is_time_major() {
        let mut a = Array3::zeros(Shape3::new(2, 3, 4));
        a.set(1, 2, 3, 7.5);
        assert_eq!(a.get(1, 2, 3), 7.5);
        assert_eq!(a.as_slice()[(3 + 2) * 4 + 3], 7.5);
        assert_eq!(a.slice_t(1).len(), 12);
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Array3::from_vec(Shape3::new(1, 2, 2), vec![0.0; 3]).is_err());
        assert!(Array3::from_vec(Shape3::new(1, 2, 2), vec![0.0; 4]).is_ok());
    }

    #[test]
    fn test_symmetric_lag_lookup() {
        let a = Array3::from_fn(Shape3::new(3, 3, 3), |t, x, y| (t * 100 + x * 10 + y) as f64);
        assert_eq!(a.lag(-1, 2, -2), 122.0);
        assert_eq!(a.lag(0, 0, 0), 0.0);
        assert_eq!(a.lag(3, 0, 0), 0.0);
        assert_eq!(a.lag(0, -4, 0), 0.0);
    }

    #[test]
    fn test_time_range_and_corner() {
        let a = Array3::from_fn(Shape3::new(4, 2, 2), |t, x, y| (t * 4 + x * 2 + y) as f64);
        let r = a.time_range(1, 2);
        assert_eq!(r.shape(), Shape3::new(2, 2, 2));
        assert_eq!(r.get(0, 0, 0), 4.0);
        let c = a.corner(Shape3::new(2, 1, 2));
        assert_eq!(c.as_slice(), &[0.0, 1.0, 4.0, 5.0]);
    }

    #[test]
    fn test_tail_and_concat_along_time() {
        let a = Array3::from_fn(Shape3::new(3, 1, 2), |t, _, y| (t * 2 + y) as f64);
        let tail = a.tail_t(2);
        assert_eq!(tail.as_slice(), &[2.0, 3.0, 4.0, 5.0]);
        assert_eq!(a.tail_t(10).shape().t, 3);
        let joined = a.time_range(0, 1).concat_t(&tail).unwrap();
        assert_eq!(joined, a);
        assert!(a.concat_t(&Array3::zeros(Shape3::new(1, 2, 2))).is_err());
    }

    #[test]
    #[should_panic(expected = "Index out of bounds")]
    fn test_bounds_check() {
        let a = Array3::zeros(Shape3::splat(2));
        let _ = a.get(2, 0, 0);
    }
}
