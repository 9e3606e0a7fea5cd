//! Autocovariance identities shared by the solvers and the verify step
//!
//! Sign conventions: `phi(0)` is unused (kept at zero), and the MA array
//! stores Box-Jenkins coefficients with `theta(0) = -1`, so the MA kernel is
//! `c(k) = -theta(k)`.

use crate::core_types::{Array3, Shape3};

#[inline]
fn diff(a: (usize, usize, usize), b: (usize, usize, usize)) -> (isize, isize, isize) {
    (
        a.0 as isize - b.0 as isize,
        a.1 as isize - b.1 as isize,
        a.2 as isize - b.2 as isize,
    )
}

/// White-noise variance of an AR fit: `acf(0) - Σ_{k≠0} phi(k)·acf(k)`
#[must_use]
pub fn ar_variance(acf: &Array3, phi: &Array3) -> f64 {
    let explained: f64 = phi
        .shape()
        .indices()
        .skip(1)
        .map(|(t, x, y)| phi.get(t, x, y) * acf.get(t, x, y))
        .sum();
    acf.get(0, 0, 0) - explained
}

/// Largest violation of the Yule-Walker equations by `phi` and `variance`
///
/// Row `k ≠ 0` checks `acf(k) = Σ_{l≠0} phi(l)·acf(k - l)`; row zero checks
/// the variance identity.
#[must_use]
pub fn yule_walker_residual(acf: &Array3, phi: &Array3, variance: f64) -> f64 {
    let shape = phi.shape();
    let mut worst = (ar_variance(acf, phi) - variance).abs();
    for k in shape.indices().skip(1) {
        let predicted: f64 = shape
            .indices()
            .skip(1)
            .map(|l| {
                let (dt, dx, dy) = diff(k, l);
                phi.get(l.0, l.1, l.2) * acf.lag(dt, dx, dy)
            })
            .sum();
        worst = worst.max((acf.get(k.0, k.1, k.2) - predicted).abs());
    }
    worst
}

/// Autocovariance of the AR residual `y = z - Σ phi(k)·z(· - k)`
///
/// With `a_0 = 1` and `a_k = -phi(k)`, `acf_y(h) = Σ_{i,j} a_i·a_j·acf(h + i - j)`
/// for every lag `h` inside `extent`. Lags beyond the target extent count as
/// zero.
#[must_use]
pub fn remove_ar(acf: &Array3, phi: &Array3, extent: Shape3) -> Array3 {
    let shape = phi.shape();
    let taps: Vec<((usize, usize, usize), f64)> = shape
        .indices()
        .map(|(t, x, y)| {
            let a = if (t, x, y) == (0, 0, 0) {
                1.0
            } else {
                -phi.get(t, x, y)
            };
            ((t, x, y), a)
        })
        .filter(|&(_, a)| a != 0.0)
        .collect();
    Array3::from_fn(extent, |ht, hx, hy| {
        let mut sum = 0.0;
        for &(i, ai) in &taps {
            for &(j, aj) in &taps {
                let (dt, dx, dy) = diff(i, j);
                sum += ai * aj * acf.lag(ht as isize + dt, hx as isize + dx, hy as isize + dy);
            }
        }
        sum
    })
}

/// Autocovariance induced by MA coefficients at a non-negative lag
///
/// `variance · Σ_l theta(l)·theta(l - k)` over `l ≥ k` inside the box.
#[must_use]
pub fn ma_autocovariance(theta: &Array3, variance: f64, lag: (usize, usize, usize)) -> f64 {
    let s = theta.shape();
    let (kt, kx, ky) = lag;
    if kt >= s.t || kx >= s.x || ky >= s.y {
        return 0.0;
    }
    let mut sum = 0.0;
    for t in kt..s.t {
        for x in kx..s.x {
            for y in ky..s.y {
                sum += theta.get(t, x, y) * theta.get(t - kt, x - kx, y - ky);
            }
        }
    }
    variance * sum
}

/// Largest absolute gap between target and MA-induced autocovariance over
/// the lags spanned by `theta`
#[must_use]
pub fn ma_residual(acf: &Array3, theta: &Array3, variance: f64) -> f64 {
    theta
        .shape()
        .indices()
        .map(|k| (acf.get(k.0, k.1, k.2) - ma_autocovariance(theta, variance, k)).abs())
        .fold(0.0, f64::max)
}

/// Autocovariance of the MA filter `theta` at every lag inside `extent`
#[must_use]
pub fn implied_ma_acf(theta: &Array3, variance: f64, extent: Shape3) -> Array3 {
    Array3::from_fn(extent, |t, x, y| ma_autocovariance(theta, variance, (t, x, y)))
}

/// Impulse response of the AR recurrence `h = δ + Σ_{k≠0} phi(k)·h(· - k)`
/// truncated to `support`
#[must_use]
pub fn ar_impulse_response(phi: &Array3, support: Shape3) -> Array3 {
    let mut h = Array3::zeros(support);
    if support.volume() == 0 {
        return h;
    }
    let lags: Vec<_> = phi.shape().indices().skip(1).collect();
    for (t, x, y) in support.indices() {
        let mut acc = if (t, x, y) == (0, 0, 0) { 1.0 } else { 0.0 };
        for &(kt, kx, ky) in &lags {
            if kt <= t && kx <= x && ky <= y {
                acc += phi.get(kt, kx, ky) * h.get(t - kt, x - kx, y - ky);
            }
        }
        h.set(t, x, y, acc);
    }
    h
}

/// Autocovariance of the AR process driven by white noise of `variance`
///
/// Computed from the impulse response truncated to `support`, so `support`
/// should be large enough for the response to have decayed.
#[must_use]
pub fn implied_ar_acf(phi: &Array3, variance: f64, extent: Shape3, support: Shape3) -> Array3 {
    let h = ar_impulse_response(phi, support);
    Array3::from_fn(extent, |kt, kx, ky| {
        if kt >= support.t || kx >= support.x || ky >= support.y {
            return 0.0;
        }
        let mut sum = 0.0;
        for t in 0..support.t - kt {
            for x in 0..support.x - kx {
                for y in 0..support.y - ky {
                    sum += h.get(t, x, y) * h.get(t + kt, x + kx, y + ky);
                }
            }
        }
        variance * sum
    })
}
