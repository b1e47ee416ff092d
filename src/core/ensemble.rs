//! Monte-Carlo ensemble container.

use crate::error::{ForecastError, Result};
use crate::utils::stats;

/// A `weeks x n_real` ensemble of weekly trajectories.
///
/// Storage is realization-major (`trajectories[j][k]` is week `k` of
/// realization `j`), so per-week reductions iterate realizations in index
/// order and summation order is fixed regardless of thread count.
#[derive(Debug, Clone)]
pub struct Ensemble {
    weeks: usize,
    trajectories: Vec<Vec<f64>>,
}

impl Ensemble {
    /// Build from realization trajectories of uniform length.
    pub fn from_trajectories(trajectories: Vec<Vec<f64>>) -> Result<Self> {
        let weeks = trajectories
            .first()
            .map(|t| t.len())
            .ok_or_else(|| ForecastError::InvalidInput("empty ensemble".into()))?;
        for t in &trajectories {
            if t.len() != weeks {
                return Err(ForecastError::ShapeMismatch {
                    expected: weeks,
                    got: t.len(),
                });
            }
        }
        Ok(Self {
            weeks,
            trajectories,
        })
    }

    pub fn weeks(&self) -> usize {
        self.weeks
    }

    pub fn n_real(&self) -> usize {
        self.trajectories.len()
    }

    pub fn trajectory(&self, j: usize) -> &[f64] {
        &self.trajectories[j]
    }

    /// All realizations of week `k`, in realization order.
    pub fn week_values(&self, k: usize) -> Vec<f64> {
        self.trajectories.iter().map(|t| t[k]).collect()
    }

    /// Per-week ensemble mean, summed by realization then by week.
    pub fn week_mean(&self, k: usize) -> f64 {
        let mut acc = 0.0;
        for t in &self.trajectories {
            acc += t[k];
        }
        acc / self.trajectories.len() as f64
    }

    /// Per-week percentile across realizations.
    pub fn week_percentile(&self, k: usize, p: f64) -> f64 {
        stats::percentile(&self.week_values(k), p)
    }

    /// Mean trajectory over all realizations.
    pub fn mean_trajectory(&self) -> Vec<f64> {
        (0..self.weeks).map(|k| self.week_mean(k)).collect()
    }

    /// Whole-matrix coefficient of variation.
    pub fn coefficient_of_variation(&self) -> f64 {
        let flat: Vec<f64> = self
            .trajectories
            .iter()
            .flat_map(|t| t.iter().copied())
            .collect();
        stats::coefficient_of_variation(&flat)
    }

    /// Reject ensembles containing non-finite values.
    pub fn ensure_finite(&self, context: &str) -> Result<()> {
        for t in &self.trajectories {
            if t.iter().any(|v| !v.is_finite()) {
                return Err(ForecastError::NonFinite(context.to_string()));
            }
        }
        Ok(())
    }
}
