//! Separable 3D FFT on top of `rustfft`
//!
//! A 3D transform is three passes of 1D transforms, one per axis. The `y`
//! axis is contiguous and transformed in place in one call; the `x` and `t`
//! axes are gathered into a scratch line first. Plans are cached per
//! `(length, direction)` so repeated convolutions of the same shape (the
//! streaming windows) do not re-plan.

use rustc_hash::FxHashMap;
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::{Arc, Mutex, PoisonError};

use crate::core_types::{Array3, Shape3};

/// Thread-safe cache of planned 1D FFTs
#[derive(Default)]
pub struct FftCache {
    plans: Mutex<FxHashMap<(usize, bool), Arc<dyn Fft<f64>>>>,
}

impl FftCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Planned transform of length `len`, inverse when `inverse` is set
    pub fn plan(&self, len: usize, inverse: bool) -> Arc<dyn Fft<f64>> {
        let mut plans = self.plans.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(plans.entry((len, inverse)).or_insert_with(|| {
            let mut planner = FftPlanner::new();
            if inverse {
                planner.plan_fft_inverse(len)
            } else {
                planner.plan_fft_forward(len)
            }
        }))
    }

    /// Plans for all three axes of `shape`
    pub fn plan3(&self, shape: Shape3, inverse: bool) -> Fft3 {
        Fft3 {
            shape,
            axes: [
                self.plan(shape.t, inverse),
                self.plan(shape.x, inverse),
                self.plan(shape.y, inverse),
            ],
        }
    }

    /// Number of cached plans
    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when nothing has been planned yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A planned separable 3D transform for one shape and direction
#[derive(Clone)]
pub struct Fft3 {
    shape: Shape3,
    axes: [Arc<dyn Fft<f64>>; 3],
}

impl Fft3 {
    /// Shape this plan transforms
    #[must_use]
    pub fn shape(&self) -> Shape3 {
        self.shape
    }

    /// Transform `data` in place (unnormalized)
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` differs from the planned volume
    pub fn process(&self, data: &mut [Complex64]) {
        let Shape3 { t: nt, x: nx, y: ny } = self.shape;
        assert_eq!(data.len(), self.shape.volume(), "FFT buffer size mismatch");
        if data.is_empty() {
            return;
        }

        // y: contiguous runs of ny
        self.axes[2].process(data);

        let mut line = vec![Complex64::new(0.0, 0.0); nx.max(nt)];

        // x: stride ny inside each time slice
        if nx > 1 {
            let line = &mut line[..nx];
            for t in 0..nt {
                for y in 0..ny {
                    for x in 0..nx {
                        line[x] = data[(t * nx + x) * ny + y];
                    }
                    self.axes[1].process(line);
                    for x in 0..nx {
                        data[(t * nx + x) * ny + y] = line[x];
                    }
                }
            }
        }

        // t: stride nx * ny
        if nt > 1 {
            let plane = nx * ny;
            let line = &mut line[..nt];
            for p in 0..plane {
                for t in 0..nt {
                    line[t] = data[t * plane + p];
                }
                self.axes[0].process(line);
                for t in 0..nt {
                    data[t * plane + p] = line[t];
                }
            }
        }
    }
}

/// Zero-pad `src` into a complex buffer of extent `padded`
///
/// # Panics
///
/// Panics if `padded` is smaller than the source on any axis
#[must_use]
pub fn pad_complex(src: &Array3, padded: Shape3) -> Vec<Complex64> {
    let s = src.shape();
    assert!(padded.contains(s), "Padding smaller than source");
    let mut out = vec![Complex64::new(0.0, 0.0); padded.volume()];
    for (t, x, y) in s.indices() {
        out[(t * padded.x + x) * padded.y + y] = Complex64::new(src.get(t, x, y), 0.0);
    }
    out
}
