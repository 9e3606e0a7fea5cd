//! Polynomial and Hermite series used by the transform
//!
//! Polynomials are stored as coefficient vectors, lowest power first.
//! Hermite polynomials are the probabilists' ones, orthogonal under the
//! standard normal weight with `E[He_m·He_n] = m!·δ_mn`.

use nalgebra::{DMatrix, DVector};

use crate::core_types::NumericalError;

/// Stopping rule shared by every bisection in the transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bisection {
    /// Stop once the bracket is this narrow
    pub tolerance: f64,
    /// Upper bound on halvings
    pub max_iterations: usize,
}

impl Bisection {
    /// Root of `f` in `[lo, hi]`
    ///
    /// Without a sign change the endpoint with the smaller `|f|` is
    /// returned, which clamps a target outside the range of `f`.
    pub fn solve(&self, f: impl Fn(f64) -> f64, mut lo: f64, mut hi: f64) -> f64 {
        let mut f_lo = f(lo);
        let f_hi = f(hi);
        if f_lo * f_hi > 0.0 {
            return if f_lo.abs() < f_hi.abs() { lo } else { hi };
        }
        for _ in 0..self.max_iterations {
            let mid = 0.5 * (lo + hi);
            let f_mid = f(mid);
            if f_mid == 0.0 || hi - lo <= self.tolerance {
                return mid;
            }
            if f_lo * f_mid < 0.0 {
                hi = mid;
            } else {
                lo = mid;
                f_lo = f_mid;
            }
        }
        0.5 * (lo + hi)
    }
}

/// Horner evaluation
#[must_use]
pub fn eval_polynomial(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        for (j, &bj) in b.iter().enumerate() {
            out[i + j] += ai * bj;
        }
    }
    out
}

/// `He_0 … He_{n-1}` by `He_{m+1} = x·He_m - m·He_{m-1}`
#[must_use]
pub fn hermite_polynomials(n: usize) -> Vec<Vec<f64>> {
    let mut out: Vec<Vec<f64>> = Vec::with_capacity(n);
    for m in 0..n {
        let next = match m {
            0 => vec![1.0],
            1 => vec![0.0, 1.0],
            _ => {
                let mut next = vec![0.0; m + 1];
                next[1..].copy_from_slice(&out[m - 1]);
                for (k, c) in out[m - 2].iter().enumerate() {
                    next[k] -= (m - 1) as f64 * c;
                }
                next
            }
        };
        out.push(next);
    }
    out
}

/// `E[U^k]` for a standard normal `U`: `(k-1)!!` for even `k`, else zero
#[must_use]
pub fn normal_moment(k: usize) -> f64 {
    if k % 2 == 1 {
        return 0.0;
    }
    (1..k).step_by(2).map(|j| j as f64).product()
}

/// Least-squares polynomial with `order` coefficients through `(xs, ys)`
///
/// Abscissae are scaled into `[-1, 1]` before the fit and the coefficients
/// scaled back, which keeps the Vandermonde matrix well conditioned.
///
/// # Errors
///
/// [`NumericalError::NonFinite`] when the SVD solve fails or gives a
/// non-finite coefficient.
pub fn fit_polynomial(xs: &[f64], ys: &[f64], order: usize) -> Result<Vec<f64>, NumericalError> {
    let failed = NumericalError::NonFinite {
        stage: "CDF interpolation",
    };
    let scale = xs.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    if scale == 0.0 || order == 0 {
        return Err(failed);
    }
    let vandermonde = DMatrix::from_fn(xs.len(), order, |i, j| (xs[i] / scale).powi(j as i32));
    let rhs = DVector::from_column_slice(ys);
    let solution = vandermonde
        .svd(true, true)
        .solve(&rhs, 1e-12)
        .map_err(|_| failed.clone())?;
    let coefs: Vec<f64> = solution
        .iter()
        .enumerate()
        .map(|(j, b)| b / scale.powi(j as i32))
        .collect();
    if coefs.iter().any(|c| !c.is_finite()) {
        return Err(failed);
    }
    Ok(coefs)
}

/// Gram-Charlier expansion of `f(U) = poly(U)` for a standard normal `U`
#[derive(Debug, Clone, PartialEq)]
pub struct HermiteSeries {
    /// `c_m = E[f(U)·He_m(U)]`
    pub coefs: Vec<f64>,
    /// `|variance - Σ c_m²/m!|` after the last kept term
    pub error: f64,
}

impl HermiteSeries {
    /// Expand `poly` term by term while the truncation error keeps falling
    ///
    /// Terms that leave the error unchanged (zero by symmetry) are kept;
    /// the first term that raises it ends the expansion.
    #[must_use]
    pub fn expand(poly: &[f64], variance: f64, max_order: usize) -> Self {
        let hermite = hermite_polynomials(max_order);
        let slack = 1e-12 * variance.abs().max(1.0);
        let mut coefs = Vec::with_capacity(max_order);
        let mut error = f64::INFINITY;
        let mut sum = 0.0;
        let mut factorial = 1.0;
        for (m, he) in hermite.iter().enumerate() {
            let c: f64 = multiply(poly, he)
                .iter()
                .enumerate()
                .map(|(k, p)| p * normal_moment(k))
                .sum();
            let next = sum + c * c / factorial;
            let next_error = (variance - next).abs();
            if next_error > error + slack {
                break;
            }
            coefs.push(c);
            sum = next;
            error = next_error;
            factorial *= (m + 1) as f64;
        }
        Self { coefs, error }
    }

    /// `E[f(U)·f(V)]` for standard normals with correlation `rho`
    #[must_use]
    pub fn covariance(&self, rho: f64) -> f64 {
        let mut factorial = 1.0;
        let mut power = 1.0;
        let mut sum = 0.0;
        for (m, c) in self.coefs.iter().enumerate() {
            if m > 0 {
                factorial *= m as f64;
                power *= rho;
            }
            sum += c * c * power / factorial;
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const BISECTION: Bisection = Bisection {
        tolerance: 1e-10,
        max_iterations: 100,
    };

    #[test]
    fn test_bisection_finds_root_and_clamps() {
        let root = BISECTION.solve(|x| x * x - 2.0, 0.0, 2.0);
        assert_relative_eq!(root, 2.0_f64.sqrt(), epsilon = 1e-9);
        assert_eq!(BISECTION.solve(|x| x - 5.0, -1.0, 1.0), 1.0);
        assert_eq!(BISECTION.solve(|x| x + 5.0, -1.0, 1.0), -1.0);
    }

    #[test]
    fn test_hermite_recurrence() {
        let he = hermite_polynomials(5);
        assert_eq!(he[2], vec![-1.0, 0.0, 1.0]);
        assert_eq!(he[3], vec![0.0, -3.0, 0.0, 1.0]);
        assert_eq!(he[4], vec![3.0, 0.0, -6.0, 0.0, 1.0]);
        assert_eq!(normal_moment(4), 3.0);
        assert_eq!(normal_moment(6), 15.0);
        assert_eq!(normal_moment(0), 1.0);
        assert_eq!(normal_moment(5), 0.0);
    }

    #[test]
    fn test_fit_recovers_cubic() {
        let xs: Vec<f64> = (0..50).map(|i| -5.0 + 10.0 * i as f64 / 49.0).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 0.5 - 2.0 * x + 0.1 * x * x * x).collect();
        let coefs = fit_polynomial(&xs, &ys, 6).unwrap();
        let expected = [0.5, -2.0, 0.0, 0.1, 0.0, 0.0];
        for (c, e) in coefs.iter().zip(expected) {
            assert_relative_eq!(*c, e, epsilon = 1e-9);
        }
        assert!(fit_polynomial(&[0.0, 0.0], &[1.0, 1.0], 2).is_err());
    }

    #[test]
    fn test_expansion_of_linear_map_is_exact() {
        let series = HermiteSeries::expand(&[0.0, 1.5], 2.25, 10);
        assert_relative_eq!(series.coefs[1], 1.5);
        assert!(series.coefs.iter().skip(2).all(|c| *c == 0.0));
        assert!(series.error < 1e-12);
        assert_relative_eq!(series.covariance(0.4), 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_square_has_lag_one_covariance() {
        // U² = He_2 + 1, so E[U²V²] = 1 + 2ρ²
        let series = HermiteSeries::expand(&[0.0, 0.0, 1.0], 3.0, 10);
        assert_relative_eq!(series.coefs[0], 1.0);
        assert_relative_eq!(series.coefs[2], 2.0);
        assert_relative_eq!(series.covariance(0.5), 1.5, epsilon = 1e-12);
        assert_relative_eq!(series.covariance(1.0), 3.0, epsilon = 1e-12);
    }
}
