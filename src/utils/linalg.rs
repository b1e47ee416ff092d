//! Dense linear algebra helpers built on nalgebra.

use crate::error::{ForecastError, Result};
use nalgebra::DMatrix;
use nalgebra::Normed;

/// Symmetric Toeplitz matrix from an autocovariance sequence:
/// `T[i, j] = gamma[stride * |i - j|]`.
pub fn toeplitz_from_autocov(gamma: &[f64], dim: usize, stride: usize) -> Result<DMatrix<f64>> {
    let needed = stride * (dim.saturating_sub(1)) + 1;
    if gamma.len() < needed {
        return Err(ForecastError::ShapeMismatch {
            expected: needed,
            got: gamma.len(),
        });
    }
    Ok(DMatrix::from_fn(dim, dim, |i, j| {
        gamma[stride * i.abs_diff(j)]
    }))
}

/// Gershgorin lower bound on the spectrum of a symmetric matrix:
/// `min_i (a_ii - sum_{j != i} |a_ij|)`.
pub fn gershgorin_lower_bound(m: &DMatrix<f64>) -> f64 {
    let n = m.nrows();
    let mut bound = f64::INFINITY;
    for i in 0..n {
        let mut radius = 0.0;
        for j in 0..n {
            if j != i {
                radius += m[(i, j)].abs();
            }
        }
        bound = bound.min(m[(i, i)] - radius);
    }
    bound
}

/// Lower Cholesky factor of a symmetric matrix, regularized up front.
///
/// The diagonal is lifted by `|lambda_min| + eps` using the Gershgorin lower
/// bound before the first factorization attempt, never only after a failure.
/// One stronger lift is retried; a second failure is `CholeskyFailed`.
pub fn spd_lower_factor(m: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = m.nrows();
    if n == 0 || m.ncols() != n {
        return Err(ForecastError::ShapeMismatch {
            expected: n,
            got: m.ncols(),
        });
    }
    if m.iter().any(|x| !x.is_finite()) {
        return Err(ForecastError::NonFinite("covariance matrix".into()));
    }

    let scale = m.diagonal().amax().max(1.0);
    let eps = 1e-10 * scale;
    let bound = gershgorin_lower_bound(m);
    let lift = if bound < eps { bound.abs() + eps } else { 0.0 };

    for attempt in 0..2 {
        let boost = lift * 10f64.powi(attempt * 3) + eps * 10f64.powi(attempt * 3);
        let mut regularized = m.clone();
        for i in 0..n {
            regularized[(i, i)] += boost;
        }
        if let Some(chol) = regularized.cholesky() {
            return Ok(chol.l());
        }
    }
    Err(ForecastError::CholeskyFailed)
}

/// Largest root modulus of the characteristic polynomial
/// `z^p - c_1 z^(p-1) - ... - c_p`, via companion-matrix eigenvalues.
///
/// For an AR(p) with lag polynomial `1 - c_1 B - ... - c_p B^p` the process
/// is stationary exactly when this modulus is below one; the same check on
/// negated MA coefficients gives invertibility.
pub fn max_companion_root_modulus(coeffs: &[f64]) -> f64 {
    let p = coeffs.len();
    if p == 0 || coeffs.iter().all(|c| *c == 0.0) {
        return 0.0;
    }
    let companion = DMatrix::from_fn(p, p, |i, j| {
        if i == 0 {
            coeffs[j]
        } else if j + 1 == i {
            1.0
        } else {
            0.0
        }
    });
    companion
        .complex_eigenvalues()
        .iter()
        .map(|z| z.norm())
        .fold(0.0, f64::max)
}
