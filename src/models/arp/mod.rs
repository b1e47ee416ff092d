//! ARp: high-order autoregressive excitation forecaster.
//!
//! Fits AR(p) on `log2(cases)`, simulates forward with Gaussian excitations,
//! back-transforms, and smooths the per-week quantile tracks with SSA before
//! cropping to the forecast season.

mod model;
mod ssa;

pub use model::{fit_ar, ArFit};
pub use ssa::ssa_smooth;

use crate::calendar::SEASON_WEEKS;
use crate::config::ModelConfig;
use crate::core::{positive_floor, TrainingSpan};
use crate::error::{ForecastError, Result};
use crate::quantile::{PercentileTracks, QuantileBands};
use crate::utils::stats::percentile;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

/// Simulation length: the 52-week reporting season plus lead-in and tail
/// margin for the smoother.
const SIM_WEEKS: usize = 79;

/// Quantile ranks carried through smoothing.
const TRACK_PERCENTS: [f64; 9] = [2.5, 5.0, 10.0, 25.0, 50.0, 75.0, 90.0, 95.0, 97.5];

/// SSA embedding window and rank for the quantile tracks.
const SSA_WINDOW: usize = 13;
const SSA_RANK: usize = 3;

/// Fit and simulate the ARp forecaster, returning assembled bands for the
/// 52-week forecast season. The point forecast is the median track.
pub fn forecast(span: &TrainingSpan, config: &ModelConfig) -> Result<QuantileBands> {
    let mut cases = span.case_series();
    positive_floor(&mut cases);
    if cases.iter().any(|v| *v <= 0.0) {
        return Err(ForecastError::InvalidInput(
            "case series has no positive entries to floor against".into(),
        ));
    }

    let z: Vec<f64> = cases.iter().map(|c| c.log2()).collect();
    let fit = fit_ar(&z, config.ar_order, SEASON_WEEKS)?;
    info!(
        region = %config.region,
        order = fit.order(),
        sigma = fit.sigma(),
        "ar model fitted"
    );

    let mean = z.iter().sum::<f64>() / z.len() as f64;
    let mut rng = StdRng::seed_from_u64(config.seed);

    // Weekly pools across runs, realization-major fill order.
    let mut pools: Vec<Vec<f64>> = vec![Vec::with_capacity(config.n_real_arp); SIM_WEEKS];
    for _ in 0..config.n_real_arp {
        let run = fit.simulate_run(SIM_WEEKS, &mut rng);
        for (week, value) in run.into_iter().enumerate() {
            pools[week].push((value + mean).exp2());
        }
    }

    // Quantile tracks over the full simulation length.
    let mut tracks: Vec<Vec<f64>> = TRACK_PERCENTS
        .iter()
        .map(|p| pools.iter().map(|pool| percentile(pool, *p)).collect())
        .collect();

    // SSA smoothing of each track, clipped at zero.
    for track in tracks.iter_mut() {
        let smoothed = ssa_smooth(track, SSA_WINDOW, SSA_RANK)?;
        *track = smoothed.into_iter().map(|v| v.max(0.0)).collect();
    }

    // Independent smoothing can let adjacent quantile tracks cross; restore
    // the ordering week by week.
    for week in 0..SIM_WEEKS {
        let mut floor = f64::NEG_INFINITY;
        for track in tracks.iter_mut() {
            if track[week] < floor {
                track[week] = floor;
            }
            floor = track[week];
        }
    }

    // Crop to the forecast season: simulation weeks 16..=67.
    let start = config.report_start - 1;
    let end = start + SEASON_WEEKS;
    if SIM_WEEKS < end {
        return Err(ForecastError::ShapeMismatch {
            expected: end,
            got: SIM_WEEKS,
        });
    }
    let cropped: Vec<Vec<f64>> = tracks
        .into_iter()
        .map(|track| track[start..end].to_vec())
        .collect();

    let tracks = PercentileTracks::new(TRACK_PERCENTS.to_vec(), cropped)?;
    QuantileBands::from_percentile_tracks(&tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{season_window, Epiweek, ValidationWindow};
    use crate::config::{ModelConfig, ModelFamily};
    use crate::core::WeeklyRecord;

    fn record(ew: Epiweek, cases: u32) -> WeeklyRecord {
        WeeklyRecord {
            epiweek: ew,
            cases,
            temp_min: 18.0,
            temp_med: 24.0,
            temp_max: 31.0,
            precip_min: 0.0,
            precip_med: 0.6,
            precip_max: 2.1,
            rel_humid_min: 55.0,
            rel_humid_med: 72.0,
            rel_humid_max: 90.0,
            thermal_range: None,
            rainy_days: None,
        }
    }

    fn span_with_seasonal_cases(n_seasons: usize, final_year: i32) -> TrainingSpan {
        let first_year = final_year - n_seasons as i32;
        let mut records = Vec::new();
        for s in 0..n_seasons {
            for (w, ew) in season_window(first_year + s as i32).iter().enumerate() {
                let phase = 2.0 * std::f64::consts::PI * w as f64 / 52.0;
                let cases = (120.0 + 80.0 * phase.sin()).max(1.0) as u32;
                records.push(record(*ew, cases));
            }
        }
        let mut ew = Epiweek::new(final_year, 41).unwrap();
        for w in 0..37 {
            let phase = 2.0 * std::f64::consts::PI * w as f64 / 52.0;
            records.push(record(ew, (120.0 + 80.0 * phase.sin()).max(1.0) as u32));
            ew = ew.succ();
        }
        TrainingSpan::select(&records, Epiweek::new(final_year + 1, 25).unwrap()).unwrap()
    }

    #[test]
    fn forecast_has_52_ordered_weeks() {
        let span = span_with_seasonal_cases(4, 2022);
        let mut config = ModelConfig::new("SP", ValidationWindow::T3, 2023)
            .with_model(ModelFamily::Arp);
        config.n_real_arp = 400;
        let bands = forecast(&span, &config).unwrap();
        assert_eq!(bands.weeks(), SEASON_WEEKS);
        let rows = bands.finalize().unwrap();
        assert_eq!(rows.len(), SEASON_WEEKS);
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let span = span_with_seasonal_cases(4, 2022);
        let mut config = ModelConfig::new("SP", ValidationWindow::T3, 2023)
            .with_model(ModelFamily::Arp);
        config.n_real_arp = 200;
        let a = forecast(&span, &config).unwrap();
        let b = forecast(&span, &config).unwrap();
        assert_eq!(a.finalize().unwrap(), b.finalize().unwrap());
    }

    #[test]
    fn short_span_is_rejected() {
        let span = span_with_seasonal_cases(1, 2022);
        let config = ModelConfig::new("SP", ValidationWindow::T3, 2023)
            .with_model(ModelFamily::Arp);
        assert!(matches!(
            forecast(&span, &config),
            Err(ForecastError::InsufficientData { .. })
        ));
    }
}
