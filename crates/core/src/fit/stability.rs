//! Stability check for the AR part
//!
//! The recurrence is stable when the characteristic polynomial
//! `B(z_t, z_x, z_y) = 1 - Σ_{k≠0} phi(k)·z^k` has no zero on the closed
//! unit polydisk. That is tested one variable at a time, `y` first:
//!
//! 1. `B(0, 0, z_y)` has no zero for `|z_y| ≤ 1`;
//! 2. `B(0, z_x, z_y)` has no zero for `|z_x| ≤ 1` with `z_y` on the circle;
//! 3. `B(z_t, z_x, z_y)` has no zero for `|z_t| ≤ 1` with `(z_x, z_y)` on
//!    the torus.
//!
//! Each one-variable polynomial goes through the Schur-Cohn step-down,
//! which is root-free on the closed disk iff every reflection coefficient
//! has magnitude below one. The circle and the torus are sampled.

use rayon::prelude::*;
use rustfft::num_complex::Complex64;
use std::f64::consts::TAU;

use crate::core_types::{Array3, Violation, AXIS_NAMES};

/// Reflection coefficients must stay this far below one
const STABILITY_MARGIN: f64 = 1e-9;

/// Leading coefficients below this put a root at the origin
const DEGENERATE_LEAD: f64 = 1e-12;

/// Circle samples per unit of polynomial degree
const SAMPLES_PER_DEGREE: usize = 16;

/// Fewest samples taken on any circle
const MIN_SAMPLES: usize = 32;

/// Largest reflection coefficient magnitude of `poly = [b_0, …, b_m]`
///
/// Below one iff `b_0 + b_1·z + … + b_m·z^m` has no zero with `|z| ≤ 1`.
/// A vanishing `b_0` gives infinity.
#[must_use]
pub fn schur_cohn(poly: &[Complex64]) -> f64 {
    let Some(&lead) = poly.first() else {
        return 0.0;
    };
    if lead.norm() < DEGENERATE_LEAD {
        return f64::INFINITY;
    }
    let mut a: Vec<Complex64> = poly.iter().map(|c| c / lead).collect();
    let mut worst = 0.0_f64;
    while a.len() > 1 {
        let m = a.len() - 1;
        let k = a[m];
        let k_norm = k.norm();
        worst = worst.max(k_norm);
        if k_norm >= 1.0 - STABILITY_MARGIN || !k_norm.is_finite() {
            return worst.max(k_norm);
        }
        let scale = 1.0 - k_norm * k_norm;
        a = (0..m).map(|j| (a[j] - k * a[m - j].conj()) / scale).collect();
    }
    worst
}

/// `z^0, z^1, …, z^(n-1)`
fn powers(z: Complex64, n: usize) -> Vec<Complex64> {
    std::iter::successors(Some(Complex64::new(1.0, 0.0)), |p| Some(p * z))
        .take(n)
        .collect()
}

/// Points on the unit circle, enough to resolve a polynomial of `degree`
fn circle(degree: usize) -> Vec<Complex64> {
    let n = (SAMPLES_PER_DEGREE * degree).max(MIN_SAMPLES);
    (0..n)
        .map(|i| Complex64::from_polar(1.0, TAU * i as f64 / n as f64))
        .collect()
}

/// Coefficients of `B` as a polynomial along `axis`, the other variables
/// fixed at `point`
fn axis_polynomial(phi: &Array3, axis: usize, point: [Complex64; 3]) -> Vec<Complex64> {
    let shape = phi.shape();
    let table: Vec<Vec<Complex64>> = (0..3).map(|d| powers(point[d], shape.axis(d))).collect();
    let mut poly = vec![Complex64::new(0.0, 0.0); shape.axis(axis)];
    poly[0] = Complex64::new(1.0, 0.0);
    for (t, x, y) in shape.indices().skip(1) {
        let idx = [t, x, y];
        let mut weight = Complex64::new(phi.get(t, x, y), 0.0);
        for d in (0..3).filter(|&d| d != axis) {
            weight *= table[d][idx[d]];
        }
        poly[idx[axis]] -= weight;
    }
    poly
}

fn unstable(axis: usize, reflection: f64) -> Violation {
    Violation::Unstable {
        axis: AXIS_NAMES[axis],
        reflection,
    }
}

/// Reject AR coefficients whose characteristic polynomial vanishes on the
/// closed unit polydisk
///
/// # Errors
///
/// [`Violation::Unstable`] naming the variable whose step failed and the
/// largest reflection coefficient seen there.
pub fn check_ar_stability(phi: &Array3) -> Result<(), Violation> {
    let shape = phi.shape();
    let zero = Complex64::new(0.0, 0.0);
    let bad = |r: f64| r.is_nan() || r >= 1.0 - STABILITY_MARGIN;

    if shape.y > 1 {
        let r = schur_cohn(&axis_polynomial(phi, 2, [zero; 3]));
        if bad(r) {
            return Err(unstable(2, r));
        }
    }

    let ys = if shape.y > 1 { circle(shape.y - 1) } else { vec![zero] };
    if shape.x > 1 {
        let r = ys
            .par_iter()
            .map(|&zy| schur_cohn(&axis_polynomial(phi, 1, [zero, zero, zy])))
            .reduce(|| 0.0, f64::max);
        if bad(r) {
            return Err(unstable(1, r));
        }
    }

    let xs = if shape.x > 1 { circle(shape.x - 1) } else { vec![zero] };
    if shape.t > 1 {
        let r = xs
            .par_iter()
            .map(|&zx| {
                ys.iter()
                    .map(|&zy| schur_cohn(&axis_polynomial(phi, 0, [zero, zx, zy])))
                    .fold(0.0, f64::max)
            })
            .reduce(|| 0.0, f64::max);
        if bad(r) {
            return Err(unstable(0, r));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Shape3;
    use crate::fit::ar_impulse_response;
    use approx::assert_relative_eq;

    fn real(coefs: &[f64]) -> Vec<Complex64> {
        coefs.iter().map(|&c| Complex64::new(c, 0.0)).collect()
    }

    /// `phi(1,0,0) = a`, `phi(0,1,0) = b`, `phi(1,1,0) = c`
    fn quarter_plane(a: f64, b: f64, c: f64) -> Array3 {
        let mut phi = Array3::zeros(Shape3::new(2, 2, 1));
        phi.set(1, 0, 0, a);
        phi.set(0, 1, 0, b);
        phi.set(1, 1, 0, c);
        phi
    }

    #[test]
    fn test_ar1_reflection_is_coefficient() {
        assert_relative_eq!(schur_cohn(&real(&[1.0, -0.6])), 0.6);
        let mut phi = Array3::zeros(Shape3::new(2, 1, 1));
        phi.set(1, 0, 0, 0.6);
        assert!(check_ar_stability(&phi).is_ok());
        phi.set(1, 0, 0, 1.0);
        assert!(matches!(
            check_ar_stability(&phi),
            Err(Violation::Unstable { axis: "t", .. })
        ));
    }

    #[test]
    fn test_ar2_complex_roots() {
        // 1 - z + 0.5·z^2 has both roots at |z| = sqrt(2)
        assert_relative_eq!(schur_cohn(&real(&[1.0, -1.0, 0.5])), 2.0 / 3.0, epsilon = 1e-12);
        let mut phi = Array3::zeros(Shape3::new(1, 1, 3));
        phi.set(0, 0, 1, 1.0);
        phi.set(0, 0, 2, -0.5);
        assert!(check_ar_stability(&phi).is_ok());
        // 1 - 2.5·z + z^2 has a root at 0.5
        assert!(schur_cohn(&real(&[1.0, -2.5, 1.0])) >= 1.0);
    }

    #[test]
    fn test_separable_filter_is_stable() {
        let (a, b, c) = (0.9, 0.5, -0.3);
        let phi = Array3::from_fn(Shape3::splat(2), |t, x, y| {
            if (t, x, y) == (0, 0, 0) {
                return 0.0;
            }
            let f = |on: usize, v: f64| if on == 1 { v } else { 1.0 };
            let sign = if (t + x + y) % 2 == 1 { 1.0 } else { -1.0 };
            sign * f(t, a) * f(x, b) * f(y, c)
        });
        assert!(check_ar_stability(&phi).is_ok());
    }

    #[test]
    fn test_filter_with_stable_marginals_is_rejected() {
        // Collapsing the other axis at z = 1 leaves 2.2 + 2.1·z_t, whose
        // root lies outside the disk, yet the response diverges.
        let phi = quarter_plane(-1.2, -1.2, -0.9);
        let h = ar_impulse_response(&phi, Shape3::new(40, 40, 1));
        assert!(h.max_abs() > 1e6);
        assert!(matches!(
            check_ar_stability(&phi),
            Err(Violation::Unstable { axis: "x", reflection }) if reflection > 1.0
        ));
    }

    #[test]
    fn test_torus_step_catches_coupled_root() {
        // B(z_t, 1) = 0.5 - z_t vanishes at z_t = 0.5
        let phi = quarter_plane(0.5, 0.5, 0.5);
        assert!(matches!(
            check_ar_stability(&phi),
            Err(Violation::Unstable { axis: "t", .. })
        ));
        assert!(ar_impulse_response(&phi, Shape3::new(40, 40, 1)).max_abs() > 1e3);
    }

    #[test]
    fn test_verdict_matches_impulse_response() {
        let support = Shape3::new(60, 60, 1);
        let steps = [-0.9, -0.6, -0.3, 0.0, 0.3, 0.6, 0.9];
        for &a in &steps {
            for &b in &steps {
                for &c in &steps {
                    let phi = quarter_plane(a, b, c);
                    let h = ar_impulse_response(&phi, support);
                    if check_ar_stability(&phi).is_err() {
                        assert!(h.max_abs() > 100.0, "a={a} b={b} c={c}");
                        continue;
                    }
                    let tail = (0..60)
                        .map(|i| h.get(59, i, 0).abs().max(h.get(i, 59, 0).abs()))
                        .fold(0.0, f64::max);
                    assert!(tail < 0.05 * h.max_abs().max(1.0), "a={a} b={b} c={c}");
                }
            }
        }
    }

    #[test]
    fn test_degenerate_lead_is_unstable() {
        let mut phi = Array3::zeros(Shape3::new(2, 2, 1));
        phi.set(0, 1, 0, 1.0);
        phi.set(1, 0, 0, 0.2);
        assert!(check_ar_stability(&phi).is_err());
        assert!(schur_cohn(&real(&[0.0, 1.0])).is_infinite());
    }
}
