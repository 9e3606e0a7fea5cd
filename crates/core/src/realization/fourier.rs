//! Fourier-domain filter evaluator
//!
//! The MA part is a linear convolution computed by overlap-add: the noise is
//! cut into blocks, each block is convolved with the kernel through a padded
//! FFT, and the block outputs are summed back into place. The kernel
//! spectrum is computed once per call. Blocks sharing a time row are
//! transformed in parallel and accumulated in a fixed order.
//!
//! The AR recurrence is causal and has no cheap spectral form, so it shares
//! the wavefront sweep with the direct evaluator.

use rayon::prelude::*;
use rustfft::num_complex::Complex64;

use super::direct::{ar_sweep, DEFAULT_AR_BLOCK};
use super::FilterEvaluator;
use crate::core_types::{ArmaError, Array3, Shape3};
use crate::spectral::{pad_complex, FftCache};
use crate::validate;

/// Smallest overlap-add block edge
const MIN_BLOCK: usize = 32;

fn block_len(n: usize, taps: usize) -> usize {
    n.min((4 * taps).max(MIN_BLOCK)).max(1)
}

/// FFT-based evaluator with a shared plan cache
pub struct FourierEvaluator {
    cache: FftCache,
    ar_block: Shape3,
}

impl FourierEvaluator {
    /// Create an evaluator with an empty plan cache
    #[must_use]
    pub fn new(ar_block: Shape3) -> Self {
        Self {
            cache: FftCache::new(),
            ar_block,
        }
    }

    /// Number of FFT plans built so far
    #[must_use]
    pub fn cached_plans(&self) -> usize {
        self.cache.len()
    }

    /// Overlap-add convolution of `noise` with `kernel` over the whole array
    fn convolve(&self, kernel: &Array3, noise: &Array3, t_from: usize) -> Vec<f64> {
        let shape = noise.shape();
        let k = kernel.shape();
        let b = Shape3::new(
            block_len(shape.t, k.t),
            block_len(shape.x, k.x),
            block_len(shape.y, k.y),
        );
        let padded = Shape3::new(b.t + k.t - 1, b.x + k.x - 1, b.y + k.y - 1);
        let forward = self.cache.plan3(padded, false);
        let inverse = self.cache.plan3(padded, true);
        let scale = 1.0 / padded.volume() as f64;

        let mut spectrum = pad_complex(kernel, padded);
        forward.process(&mut spectrum);

        let mut sum = vec![0.0; shape.volume()];
        let columns: Vec<(usize, usize)> = (0..shape.x.div_ceil(b.x))
            .flat_map(|j| (0..shape.y.div_ceil(b.y)).map(move |l| (j * b.x, l * b.y)))
            .collect();

        for t0 in (0..shape.t).step_by(b.t) {
            let et = b.t.min(shape.t - t0);
            // this block's output ends before the first slice we need
            if t0 + et + k.t - 1 <= t_from {
                continue;
            }
            let outputs: Vec<Vec<Complex64>> = columns
                .par_iter()
                .map(|&(x0, y0)| {
                    let ex = b.x.min(shape.x - x0);
                    let ey = b.y.min(shape.y - y0);
                    let mut buf = vec![Complex64::new(0.0, 0.0); padded.volume()];
                    for (t, x, y) in Shape3::new(et, ex, ey).indices() {
                        buf[(t * padded.x + x) * padded.y + y] =
                            Complex64::new(noise.get(t0 + t, x0 + x, y0 + y), 0.0);
                    }
                    forward.process(&mut buf);
                    for (v, s) in buf.iter_mut().zip(&spectrum) {
                        *v *= *s;
                    }
                    inverse.process(&mut buf);
                    buf
                })
                .collect();

            for (&(x0, y0), buf) in columns.iter().zip(&outputs) {
                for (t, x, y) in padded.indices() {
                    let (gt, gx, gy) = (t0 + t, x0 + x, y0 + y);
                    if gt < shape.t && gx < shape.x && gy < shape.y {
                        sum[(gt * shape.x + gx) * shape.y + gy] +=
                            buf[(t * padded.x + x) * padded.y + y].re * scale;
                    }
                }
            }
        }
        sum
    }
}

impl Default for FourierEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_AR_BLOCK)
    }
}

impl FilterEvaluator for FourierEvaluator {
    fn apply_moving_average(
        &self,
        kernel: &Array3,
        noise: &Array3,
        output: &mut Array3,
        t_from: usize,
    ) -> Result<(), ArmaError> {
        validate::check_shape("noise", output.shape(), noise.shape())?;
        let plane = output.plane_len();
        if t_from >= output.shape().t || plane == 0 {
            return Ok(());
        }
        let sum = self.convolve(kernel, noise, t_from);
        output.as_mut_slice()[t_from * plane..].copy_from_slice(&sum[t_from * plane..]);
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
        "fourier"
    }
}
