//! Direct (spatial-domain) filter evaluator
//!
//! This module provides the always-available implementation of the
//! `FilterEvaluator` trait. The MA part is an explicit sum over kernel taps,
//! parallel over time slices. The AR part is a causal in-place recurrence
//! evaluated block by block along wavefront diagonals, so independent blocks
//! run on Rayon while every cell still sees its predecessors finalized.

use rayon::prelude::*;

use super::FilterEvaluator;
use crate::core_types::{ArmaError, Array3, Shape3};
use crate::validate;

/// Default AR block edge
pub const DEFAULT_AR_BLOCK: Shape3 = Shape3::splat(16);

/// Non-zero taps of `coefficients` as `(t, x, y, value)` in storage order
fn taps(coefficients: &Array3, skip_origin: bool) -> Vec<(usize, usize, usize, f64)> {
    coefficients
        .shape()
        .indices()
        .skip(usize::from(skip_origin))
        .map(|(t, x, y)| (t, x, y, coefficients.get(t, x, y)))
        .filter(|&(.., v)| v != 0.0)
        .collect()
}

/// One block of the AR sweep: origin and extent in cells
#[derive(Debug, Clone, Copy)]
struct Block {
    origin: (usize, usize, usize),
    extent: Shape3,
}

impl Block {
    #[inline]
    fn local(&self, t: usize, x: usize, y: usize) -> Option<usize> {
        let (t0, x0, y0) = self.origin;
        (t >= t0 && x >= x0 && y >= y0)
            .then(|| ((t - t0) * self.extent.x + (x - x0)) * self.extent.y + (y - y0))
    }
}

/// Evaluate one block against the shared field, returning its final values
///
/// Every tap points to a cell that is either earlier in this block (already
/// in `local`) or in a block on an earlier diagonal (already final in
/// `field`). Predecessors never exceed the current cell on any axis, so the
/// upper bound of the block needs no check.
fn sweep_block(field: &Array3, taps: &[(usize, usize, usize, f64)], block: Block) -> Vec<f64> {
    let (t0, x0, y0) = block.origin;
    let e = block.extent;
    let data = field.as_slice();
    let mut local = Vec::with_capacity(e.volume());
    for t in t0..t0 + e.t {
        for x in x0..x0 + e.x {
            let start = field.offset(t, x, y0);
            local.extend_from_slice(&data[start..start + e.y]);
        }
    }

    for (lt, lx, ly) in e.indices() {
        let (t, x, y) = (t0 + lt, x0 + lx, y0 + ly);
        let here = (lt * e.x + lx) * e.y + ly;
        let mut acc = local[here];
        for &(kt, kx, ky, p) in taps {
            if kt > t || kx > x || ky > y {
                continue;
            }
            let (st, sx, sy) = (t - kt, x - kx, y - ky);
            let v = match block.local(st, sx, sy) {
                Some(i) => local[i],
                None => data[field.offset(st, sx, sy)],
            };
            acc += p * v;
        }
        local[here] = acc;
    }
    local
}

/// In-place causal AR recurrence from `t_from` onward
///
/// Blocks of edge `block` are grouped by the diagonal `i + j + k`; blocks on
/// one diagonal are independent and evaluated in parallel, then written back
/// in a fixed order. The result does not depend on the number of threads.
pub(crate) fn ar_sweep(phi: &Array3, field: &mut Array3, t_from: usize, block: Shape3) {
    let taps = taps(phi, true);
    let shape = field.shape();
    if taps.is_empty() || t_from >= shape.t || shape.volume() == 0 {
        return;
    }
    let edge = Shape3::new(block.t.max(1), block.x.max(1), block.y.max(1));
    let span = shape.t - t_from;
    let counts = Shape3::new(
        span.div_ceil(edge.t),
        shape.x.div_ceil(edge.x),
        shape.y.div_ceil(edge.y),
    );
    let make = |i: usize, j: usize, k: usize| {
        let origin = (t_from + i * edge.t, j * edge.x, k * edge.y);
        Block {
            origin,
            extent: Shape3::new(
                edge.t.min(shape.t - origin.0),
                edge.x.min(shape.x - origin.1),
                edge.y.min(shape.y - origin.2),
            ),
        }
    };

    let last_diagonal = counts.t + counts.x + counts.y - 3;
    for s in 0..=last_diagonal {
        let blocks: Vec<Block> = counts
            .indices()
            .filter(|&(i, j, k)| i + j + k == s)
            .map(|(i, j, k)| make(i, j, k))
            .collect();

        let shared: &Array3 = field;
        let results: Vec<Vec<f64>> = blocks
            .par_iter()
            .map(|&b| sweep_block(shared, &taps, b))
            .collect();

        for (b, values) in blocks.iter().zip(results) {
            let (t0, x0, y0) = b.origin;
            let e = b.extent;
            let rows = (t0..t0 + e.t).flat_map(|t| (x0..x0 + e.x).map(move |x| (t, x)));
            for ((t, x), row) in rows.zip(values.chunks_exact(e.y)) {
                let start = field.offset(t, x, y0);
                field.as_mut_slice()[start..start + e.y].copy_from_slice(row);
            }
        }
    }
}

/// Spatial-domain evaluator running on Rayon
#[derive(Debug, Clone)]
pub struct DirectEvaluator {
    ar_block: Shape3,
}

impl DirectEvaluator {
    /// Create a direct evaluator with the given AR block edge
    #[must_use]
    pub fn new(ar_block: Shape3) -> Self {
        Self { ar_block }
    }

    /// Block edge used by the AR wavefront
    #[must_use]
    pub fn ar_block(&self) -> Shape3 {
        self.ar_block
    }
}

impl Default for DirectEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_AR_BLOCK)
    }
}

impl FilterEvaluator for DirectEvaluator {
    fn apply_moving_average(
        &self,
        kernel: &Array3,
        noise: &Array3,
        output: &mut Array3,
        t_from: usize,
    ) -> Result<(), ArmaError> {
        validate::check_shape("noise", output.shape(), noise.shape())?;
        let shape = output.shape();
        let plane = output.plane_len();
        if t_from >= shape.t || plane == 0 {
            return Ok(());
        }
        let taps = taps(kernel, false);
        let src = noise.as_slice();

        output.as_mut_slice()[t_from * plane..]
            .par_chunks_mut(plane)
            .enumerate()
            .for_each(|(i, slab)| {
                let t = t_from + i;
                for x in 0..shape.x {
                    for y in 0..shape.y {
                        let mut acc = 0.0;
                        for &(kt, kx, ky, c) in &taps {
                            if kt > t || kx > x || ky > y {
                                continue;
                            }
                            acc += c * src[((t - kt) * shape.x + (x - kx)) * shape.y + (y - ky)];
                        }
                        slab[x * shape.y + y] = acc;
                    }
                }
            });
        Ok(())
    }

    fn apply_autoregressive(
        &self,
        phi: &Array3,
        field: &mut Array3,
        t_from: usize,
    ) -> Result<(), ArmaError> {
        ar_sweep(phi, field, t_from, self.ar_block);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn noise(shape: Shape3) -> Array3 {
        Array3::from_fn(shape, |t, x, y| {
            ((t * 31 + x * 17 + y * 7) % 13) as f64 / 6.5 - 1.0
        })
    }

    fn naive_ar(phi: &Array3, field: &mut Array3) {
        let s = field.shape();
        for (t, x, y) in s.indices() {
            let mut acc = field.get(t, x, y);
            for (kt, kx, ky) in phi.shape().indices().skip(1) {
                if kt <= t && kx <= x && ky <= y {
                    acc += phi.get(kt, kx, ky) * field.get(t - kt, x - kx, y - ky);
                }
            }
            field.set(t, x, y, acc);
        }
    }

    #[test]
    fn test_ma_identity_kernel_copies_noise() {
        let shape = Shape3::new(3, 4, 5);
        let w = noise(shape);
        let mut out = Array3::zeros(shape);
        let kernel = Array3::with_value(Shape3::new(1, 1, 1), 1.0);
        DirectEvaluator::default()
            .apply_moving_average(&kernel, &w, &mut out, 0)
            .unwrap();
        assert_eq!(out, w);
    }

    #[test]
    fn test_ma_respects_t_from() {
        let shape = Shape3::new(4, 2, 2);
        let w = noise(shape);
        let mut out = Array3::with_value(shape, 9.0);
        let mut kernel = Array3::zeros(Shape3::new(2, 1, 1));
        kernel.set(0, 0, 0, 1.0);
        kernel.set(1, 0, 0, 0.5);
        DirectEvaluator::default()
            .apply_moving_average(&kernel, &w, &mut out, 2)
            .unwrap();
        assert_eq!(out.slice_t(0), &[9.0; 4]);
        assert_eq!(out.slice_t(1), &[9.0; 4]);
        assert_relative_eq!(out.get(2, 1, 1), w.get(2, 1, 1) + 0.5 * w.get(1, 1, 1));
    }

    #[test]
    fn test_ma_shape_mismatch_is_domain_error() {
        let mut out = Array3::zeros(Shape3::new(2, 2, 2));
        let w = Array3::zeros(Shape3::new(2, 2, 3));
        let kernel = Array3::with_value(Shape3::new(1, 1, 1), 1.0);
        assert!(matches!(
            DirectEvaluator::default().apply_moving_average(&kernel, &w, &mut out, 0),
            Err(ArmaError::Domain(_))
        ));
    }

    #[test]
    fn test_blocked_ar_matches_naive_sweep() {
        let shape = Shape3::new(9, 7, 6);
        let phi = Array3::from_fn(Shape3::new(2, 3, 2), |t, x, y| {
            0.05 * (t as f64 + 1.0) - 0.03 * x as f64 + 0.02 * y as f64
        });
        let mut expected = noise(shape);
        naive_ar(&phi, &mut expected);

        for edge in [Shape3::splat(1), Shape3::new(2, 3, 4), Shape3::splat(16)] {
            let mut field = noise(shape);
            DirectEvaluator::new(edge)
                .apply_autoregressive(&phi, &mut field, 0)
                .unwrap();
            assert_eq!(field, expected, "edge {edge}");
        }
    }

    #[test]
    fn test_ar_leaves_history_untouched() {
        let shape = Shape3::new(5, 3, 3);
        let mut phi = Array3::zeros(Shape3::new(2, 1, 1));
        phi.set(1, 0, 0, 0.5);
        let mut field = noise(shape);
        let before = field.clone();
        DirectEvaluator::default()
            .apply_autoregressive(&phi, &mut field, 3)
            .unwrap();
        assert_eq!(field.slice_t(2), before.slice_t(2));
        let expected = before.get(3, 1, 2) + 0.5 * before.get(2, 1, 2);
        assert_relative_eq!(field.get(3, 1, 2), expected);
        assert_relative_eq!(
            field.get(4, 1, 2),
            before.get(4, 1, 2) + 0.5 * expected
        );
    }
}
