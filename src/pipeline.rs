//! Per-region forecast pipeline.
//!
//! Ingested records flow through training-span selection, the configured
//! model family, quantile assembly, and date attachment. Failures carry the
//! region and component tags; a failed region produces no output rows.

use crate::calendar::SEASON_WEEKS;
use crate::config::{ModelConfig, ModelFamily};
use crate::core::{positive_floor, ClimateVar, TrainingSpan, WeeklyRecord};
use crate::error::{Component, ForecastError, RegionFailure, TagFailure};
use crate::models::{arp, clidengo, sarimax};
use crate::models::clidengo::{ClimateHistory, ClimateSeries};
use crate::quantile::{attach_dates, ForecastRow, QuantileBands};
use tracing::info;

/// Externally smoothed climate baselines over the whole training seasons,
/// one series per covariate, aligned with the raw seasonal series.
#[derive(Debug, Clone)]
pub struct ClimateBaselines {
    pub temp: Vec<f64>,
    pub precip: Vec<f64>,
    pub humid: Vec<f64>,
}

/// Per-week seasonal mean of a `52 * K` series, tiled back to full length.
///
/// The degenerate baseline used when no external smoother output is
/// supplied: residuals then measure deviation from the seasonal mean.
fn seasonal_mean_baseline(raw: &[f64]) -> Vec<f64> {
    let n_seasons = raw.len() / SEASON_WEEKS;
    let mut skeleton = vec![0.0; SEASON_WEEKS];
    for (i, s) in skeleton.iter_mut().enumerate() {
        let mut acc = 0.0;
        for k in 0..n_seasons {
            acc += raw[k * SEASON_WEEKS + i];
        }
        *s = acc / n_seasons as f64;
    }
    (0..raw.len())
        .map(|i| skeleton[i % SEASON_WEEKS])
        .collect()
}

fn climate_series(
    span: &TrainingSpan,
    var: ClimateVar,
    external: Option<&[f64]>,
) -> Result<ClimateSeries, ForecastError> {
    let mut raw = span.seasonal_climate_series(var);
    positive_floor(&mut raw);
    let mut baseline = match external {
        Some(series) => {
            if series.len() != raw.len() {
                return Err(ForecastError::ShapeMismatch {
                    expected: raw.len(),
                    got: series.len(),
                });
            }
            series.to_vec()
        }
        None => seasonal_mean_baseline(&raw),
    };
    positive_floor(&mut baseline);
    Ok(ClimateSeries { raw, baseline })
}

/// Map a CLiDENGO stage error to the component that raised it.
fn clidengo_component(error: &ForecastError) -> Component {
    match error {
        ForecastError::CholeskyFailed | ForecastError::NonFinite(_) => {
            Component::ClimateGenerator
        }
        ForecastError::ModelFit(_) => Component::Calibrator,
        ForecastError::IntegrationFailure(_) => Component::MonteCarlo,
        _ => Component::MonteCarlo,
    }
}

/// Run one region end to end, returning the 52 dated forecast rows.
pub fn run_region(
    config: &ModelConfig,
    records: &[WeeklyRecord],
    baselines: Option<&ClimateBaselines>,
) -> Result<Vec<ForecastRow>, RegionFailure> {
    let region = config.region.as_str();
    config.validate().tag(region, Component::Ingest)?;

    let train_end = config.window.train_end(config.final_year);
    let span =
        TrainingSpan::select(records, train_end).tag(region, Component::Ingest)?;
    info!(
        region,
        seasons = span.seasons().len(),
        prefix_weeks = span.prefix().len(),
        train_end = %train_end,
        "training span selected"
    );

    let bands: QuantileBands = match config.model {
        ModelFamily::Clidengo => {
            let history = ClimateHistory {
                temp: climate_series(
                    &span,
                    ClimateVar::Temperature,
                    baselines.map(|b| b.temp.as_slice()),
                )
                .tag(region, Component::ClimateGenerator)?,
                precip: climate_series(
                    &span,
                    ClimateVar::Precipitation,
                    baselines.map(|b| b.precip.as_slice()),
                )
                .tag(region, Component::ClimateGenerator)?,
                humid: climate_series(
                    &span,
                    ClimateVar::Humidity,
                    baselines.map(|b| b.humid.as_slice()),
                )
                .tag(region, Component::ClimateGenerator)?,
            };
            clidengo::forecast(&span, &history, config)
                .map_err(|e| {
                    let component = clidengo_component(&e);
                    RegionFailure::new(region, component, e)
                })?
                .bands
        }
        ModelFamily::Sarimax => {
            sarimax::forecast(&span, config).tag(region, Component::Sarimax)?
        }
        ModelFamily::Arp => arp::forecast(&span, config).tag(region, Component::Arp)?,
    };

    let rows = bands.finalize().tag(region, Component::Assembler)?;
    let window = config.window.forecast_window(config.final_year);
    attach_dates(&rows, &window).tag(region, Component::Assembler)
}
