//! Constrained calibration of the growth decision vector.
//!
//! Minimizes a model/data misfit over the 13-dimensional box, treating the
//! Monte-Carlo ensemble distributionally: matching the mean trajectory and
//! the total spread avoids overfitting any single historical season. Each
//! objective evaluation reuses the same seed, so the surface the simplex
//! walks is deterministic.

use crate::config::{ClimateMode, Misfit};
use crate::core::Ensemble;
use crate::error::{ForecastError, Result};
use crate::models::clidengo::monte_carlo::{run_monte_carlo, ClidengoParams, ClimateHistory};
use crate::models::clidengo::growth::SimGrid;
use crate::utils::minimize::{midpoint, minimize_box, MinimizeOptions};
use crate::utils::stats;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Penalty value returned when an objective evaluation fails numerically.
const EVAL_PENALTY: f64 = 1e12;

/// Everything the misfit needs besides the decision vector.
pub struct CalibrationInputs<'a> {
    /// Training cumulative-cases matrix, one column per season (52 x K).
    pub observed_cumulative: &'a [Vec<f64>],
    pub history: &'a ClimateHistory,
    pub opening_cases: &'a [f64],
    pub mode: ClimateMode,
    pub n_real: usize,
    pub seed: u64,
    pub misfit: Misfit,
    /// Configured starting values for the lag coordinates; the default
    /// (-7, -7, -7) coincides with the box midpoint.
    pub lags_hint: [i32; 3],
}

/// Calibration outcome.
#[derive(Debug, Clone)]
pub struct CalibrationResult {
    pub params: ClidengoParams,
    pub objective: f64,
    pub initial_objective: f64,
    pub iterations: usize,
    pub restarted: bool,
}

fn column_means(matrix: &[Vec<f64>]) -> Vec<f64> {
    let weeks = matrix.first().map(|c| c.len()).unwrap_or(0);
    (0..weeks)
        .map(|k| {
            let mut acc = 0.0;
            for column in matrix {
                acc += column[k];
            }
            acc / matrix.len() as f64
        })
        .collect()
}

fn matrix_cv(matrix: &[Vec<f64>]) -> f64 {
    let flat: Vec<f64> = matrix.iter().flat_map(|c| c.iter().copied()).collect();
    stats::std_dev(&flat) / stats::mean(&flat)
}

fn mse_misfit(ensemble: &Ensemble, observed_mean: &[f64]) -> f64 {
    let weeks = ensemble.weeks();
    let ensemble_mean = ensemble.mean_trajectory();
    let mut mean_term = 0.0;
    for k in 0..weeks {
        mean_term += (ensemble_mean[k] - observed_mean[k]).powi(2);
    }
    let mut spread_term = 0.0;
    for j in 0..ensemble.n_real() {
        let trajectory = ensemble.trajectory(j);
        for k in 0..weeks {
            spread_term += (trajectory[k] - ensemble_mean[k]).powi(2);
        }
    }
    mean_term + spread_term / ensemble.n_real() as f64
}

fn mean_variance_misfit(
    ensemble: &Ensemble,
    observed: &[Vec<f64>],
    observed_mean: &[f64],
    weight: f64,
) -> f64 {
    let ensemble_mean = ensemble.mean_trajectory();
    let mut num = 0.0;
    let mut den = 0.0;
    for (u, d) in ensemble_mean.iter().zip(observed_mean) {
        num += (u - d).powi(2);
        den += d.powi(2);
    }
    let mean_term = if den > 0.0 { num / den } else { num };

    let cov_model = ensemble.coefficient_of_variation();
    let cov_data = matrix_cv(observed);
    let cov_term = if cov_data.abs() > 0.0 {
        ((cov_model - cov_data) / cov_data).powi(2)
    } else {
        cov_model.powi(2)
    };

    weight * mean_term + (1.0 - weight) * cov_term
}

fn evaluate(x: &[f64], inputs: &CalibrationInputs<'_>, observed_mean: &[f64]) -> f64 {
    let params = match ClidengoParams::from_vector(x) {
        Ok(p) => p,
        Err(_) => return EVAL_PENALTY,
    };
    let run = match run_monte_carlo(
        &params,
        inputs.history,
        inputs.opening_cases,
        inputs.mode,
        inputs.n_real,
        inputs.seed,
        &SimGrid::new(observed_mean.len()),
    ) {
        Ok(run) => run,
        Err(_) => return EVAL_PENALTY,
    };
    let value = match inputs.misfit {
        Misfit::Mse => mse_misfit(&run.cumulative, observed_mean),
        Misfit::MeanVariance { weight } => mean_variance_misfit(
            &run.cumulative,
            inputs.observed_cumulative,
            observed_mean,
            weight,
        ),
    };
    if value.is_finite() {
        value
    } else {
        EVAL_PENALTY
    }
}

/// Calibrate the decision vector against the training seasons.
///
/// Starts from the midpoint of the box; if the optimizer fails to reduce the
/// objective, one restart from a perturbed initial guess is attempted before
/// reporting `ModelFit`.
pub fn calibrate(inputs: &CalibrationInputs<'_>) -> Result<CalibrationResult> {
    if inputs.observed_cumulative.len() < 2 {
        return Err(ForecastError::InsufficientData {
            needed: 2,
            got: inputs.observed_cumulative.len(),
        });
    }
    let observed_mean = column_means(inputs.observed_cumulative);

    let bounds = ClidengoParams::bounds();
    let opts = MinimizeOptions::default();

    let mut start = midpoint(&bounds);
    for (i, lag) in inputs.lags_hint.iter().enumerate() {
        start[10 + i] = *lag as f64;
    }
    let initial_objective = evaluate(&start, inputs, &observed_mean);
    debug!(initial_objective, "calibration start");

    let outcome = minimize_box(
        |x| evaluate(x, inputs, &observed_mean),
        &bounds,
        &start,
        &opts,
    )?;

    if outcome.value < initial_objective {
        let params = ClidengoParams::from_vector(&outcome.point)?;
        info!(
            objective = outcome.value,
            iterations = outcome.iterations,
            "calibration converged"
        );
        return Ok(CalibrationResult {
            params,
            objective: outcome.value,
            initial_objective,
            iterations: outcome.iterations,
            restarted: false,
        });
    }

    // Single restart from a perturbed initial guess.
    let mut rng = StdRng::seed_from_u64(inputs.seed ^ 0x5ca1ab1e);
    let perturbed: Vec<f64> = bounds
        .iter()
        .zip(&start)
        .map(|((lo, hi), x)| {
            let width = hi - lo;
            (x + rng.gen_range(-0.25..=0.25) * width).clamp(*lo, *hi)
        })
        .collect();
    let retry = minimize_box(
        |x| evaluate(x, inputs, &observed_mean),
        &bounds,
        &perturbed,
        &opts,
    )?;

    let retry_initial = evaluate(&perturbed, inputs, &observed_mean);
    if retry.value < initial_objective.min(retry_initial) {
        let params = ClidengoParams::from_vector(&retry.point)?;
        info!(
            objective = retry.value,
            iterations = retry.iterations,
            "calibration converged after restart"
        );
        return Ok(CalibrationResult {
            params,
            objective: retry.value,
            initial_objective,
            iterations: retry.iterations,
            restarted: true,
        });
    }

    Err(ForecastError::ModelFit(
        "optimizer did not reduce the objective from the initial point".into(),
    ))
}
