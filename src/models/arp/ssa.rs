//! Singular-spectrum-analysis smoothing.
//!
//! Embeds a series into its trajectory matrix, keeps the leading eigenmodes
//! of the lag covariance, and reconstructs by diagonal averaging.

use crate::error::{ForecastError, Result};
use nalgebra::{DMatrix, SymmetricEigen};

/// Smooth a series by rank-truncated SSA reconstruction.
///
/// `window` is the embedding length (at most half the series), `rank` the
/// number of leading components kept.
pub fn ssa_smooth(series: &[f64], window: usize, rank: usize) -> Result<Vec<f64>> {
    let n = series.len();
    if window < 2 || window > n / 2 {
        return Err(ForecastError::InvalidInput(format!(
            "ssa window {window} invalid for series of length {n}"
        )));
    }
    if rank == 0 {
        return Err(ForecastError::InvalidInput("ssa rank must be positive".into()));
    }
    if series.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::NonFinite("ssa input".into()));
    }

    let l = window;
    let k = n - l + 1;
    let trajectory = DMatrix::from_fn(l, k, |i, j| series[i + j]);

    // Eigenmodes of the lag covariance, strongest first.
    let lag_cov = &trajectory * trajectory.transpose();
    let eigen = SymmetricEigen::new(lag_cov);
    let mut order: Vec<usize> = (0..l).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut reconstructed = DMatrix::zeros(l, k);
    for &idx in order.iter().take(rank.min(l)) {
        let u = eigen.eigenvectors.column(idx).clone_owned();
        // Rank-one component: u (u^T X).
        let weights = u.transpose() * &trajectory;
        reconstructed += &u * &weights;
    }

    // Diagonal averaging back to a series.
    let mut out = vec![0.0; n];
    let mut counts = vec![0usize; n];
    for i in 0..l {
        for j in 0..k {
            out[i + j] += reconstructed[(i, j)];
            counts[i + j] += 1;
        }
    }
    for (value, count) in out.iter_mut().zip(&counts) {
        *value /= *count as f64;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constant_series_is_reproduced() {
        let series = vec![7.0; 40];
        let smoothed = ssa_smooth(&series, 10, 1).unwrap();
        for v in smoothed {
            assert_relative_eq!(v, 7.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn sinusoid_survives_with_rank_two() {
        let series: Vec<f64> = (0..80)
            .map(|t| (2.0 * std::f64::consts::PI * t as f64 / 20.0).sin())
            .collect();
        let smoothed = ssa_smooth(&series, 12, 2).unwrap();
        for (s, v) in series.iter().zip(&smoothed) {
            assert!((s - v).abs() < 0.05, "sinusoid distorted: {s} vs {v}");
        }
    }

    #[test]
    fn noise_is_attenuated() {
        let clean: Vec<f64> = (0..100).map(|t| (t as f64 / 15.0).sin() * 10.0).collect();
        let noisy: Vec<f64> = clean
            .iter()
            .enumerate()
            .map(|(t, v)| v + ((t as f64 * 12.9898).sin() * 43758.5453).fract() * 2.0)
            .collect();
        let smoothed = ssa_smooth(&noisy, 15, 2).unwrap();

        let err = |a: &[f64]| -> f64 {
            a.iter()
                .zip(&clean)
                .map(|(x, c)| (x - c).powi(2))
                .sum::<f64>()
        };
        assert!(
            err(&smoothed) < err(&noisy),
            "smoothing must reduce distance to the clean signal"
        );
    }

    #[test]
    fn window_bounds_checked() {
        assert!(ssa_smooth(&[1.0; 10], 1, 1).is_err());
        assert!(ssa_smooth(&[1.0; 10], 6, 1).is_err());
        assert!(ssa_smooth(&[1.0; 10], 5, 0).is_err());
        assert!(ssa_smooth(&[1.0; 10], 5, 1).is_ok());
    }
}
