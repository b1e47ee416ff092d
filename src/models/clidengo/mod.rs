//! CLiDENGO: climate-modulated beta-logistic growth forecaster.

mod calibrate;
mod growth;
mod monte_carlo;

pub use calibrate::{calibrate, CalibrationInputs, CalibrationResult};
pub use growth::{integrate_growth, GrowthParams, GrowthPath, SimGrid, SuitabilitySeries};
pub use monte_carlo::{
    run_monte_carlo, ClidengoParams, ClimateHistory, ClimateSeries, GrowthCv, MonteCarloRun,
    CV_GAMMA_MAX, CV_UNIFORM_MAX,
};

use crate::calendar::SEASON_WEEKS;
use crate::config::ModelConfig;
use crate::core::TrainingSpan;
use crate::error::{ForecastError, Result};
use crate::quantile::{PointStat, QuantileBands};
use tracing::info;

/// Calibrated parameters and assembled bands for one regional run.
#[derive(Debug, Clone)]
pub struct ClidengoForecast {
    pub calibration: CalibrationResult,
    pub bands: QuantileBands,
}

/// Calibrate on the training span, then re-run the Monte-Carlo forecaster at
/// full ensemble size and assemble the incidence bands. The point forecast
/// is the ensemble mean.
pub fn forecast(
    span: &TrainingSpan,
    history: &ClimateHistory,
    config: &ModelConfig,
) -> Result<ClidengoForecast> {
    if span.seasons().len() < 2 {
        return Err(ForecastError::InsufficientData {
            needed: 2 * SEASON_WEEKS,
            got: span.seasons().len() * SEASON_WEEKS,
        });
    }

    let observed_cumulative = span.cumulative_case_matrix();
    let opening_cases = span.season_opening_cases();

    let inputs = CalibrationInputs {
        observed_cumulative: &observed_cumulative,
        history,
        opening_cases: &opening_cases,
        mode: config.climate_mode,
        n_real: config.n_real_calibrate,
        seed: config.seed,
        misfit: config.misfit,
        lags_hint: config.lags,
    };
    let calibration = calibrate(&inputs)?;
    info!(
        region = %config.region,
        objective = calibration.objective,
        restarted = calibration.restarted,
        "growth model calibrated"
    );

    let run = run_monte_carlo(
        &calibration.params,
        history,
        &opening_cases,
        config.climate_mode,
        config.n_real_forecast,
        config.seed,
        &SimGrid::new(SEASON_WEEKS),
    )?;

    let bands = QuantileBands::from_ensemble(&run.incidence, PointStat::Mean)?;
    Ok(ClidengoForecast { bands, calibration })
}
