//! Accuracy metrics for retrospective forecast scoring.

use crate::error::{ForecastError, Result};
use crate::utils::stats::mean;

/// Point-forecast accuracy against a held-out season.
#[derive(Debug, Clone)]
pub struct AccuracyMetrics {
    /// Mean absolute error.
    pub mae: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Symmetric mean absolute percentage error, in percent.
    pub smape: f64,
}

/// Score point predictions against observed values.
pub fn score_forecast(actual: &[f64], predicted: &[f64]) -> Result<AccuracyMetrics> {
    if actual.is_empty() {
        return Err(ForecastError::InvalidInput("empty scoring window".into()));
    }
    if actual.len() != predicted.len() {
        return Err(ForecastError::ShapeMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }

    let abs_errors: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .collect();
    let mae = mean(&abs_errors);
    let rmse = mean(
        &actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).powi(2))
            .collect::<Vec<_>>(),
    )
    .sqrt();
    let smape = 100.0
        * mean(
            &actual
                .iter()
                .zip(predicted)
                .map(|(a, p)| {
                    let denom = a.abs() + p.abs();
                    if denom == 0.0 {
                        0.0
                    } else {
                        2.0 * (a - p).abs() / denom
                    }
                })
                .collect::<Vec<_>>(),
        );

    Ok(AccuracyMetrics { mae, rmse, smape })
}

/// Fraction of observations falling inside a central prediction band.
pub fn interval_coverage(actual: &[f64], lower: &[f64], upper: &[f64]) -> Result<f64> {
    if actual.len() != lower.len() || actual.len() != upper.len() {
        return Err(ForecastError::ShapeMismatch {
            expected: actual.len(),
            got: lower.len().min(upper.len()),
        });
    }
    if actual.is_empty() {
        return Err(ForecastError::InvalidInput("empty scoring window".into()));
    }
    let inside = actual
        .iter()
        .zip(lower.iter().zip(upper))
        .filter(|(a, (lo, hi))| **lo <= **a && **a <= **hi)
        .count();
    Ok(inside as f64 / actual.len() as f64)
}
