//! Monte-Carlo ensemble generation for the climate-modulated growth model.
//!
//! Draws parameter, initial-condition, and climate realizations from an
//! explicit parent generator, then integrates the growth ODE per realization.
//! Every random draw happens on the parent thread before the parallel
//! integration fan-out, so output is identical at any thread count.

use crate::climate::{synthesize_climate, Briere, ClimateGenConfig};
use crate::config::ClimateMode;
use crate::core::Ensemble;
use crate::error::{ForecastError, Result};
use crate::models::clidengo::growth::{
    integrate_growth, GrowthParams, SimGrid, SuitabilitySeries,
};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Gamma;
use rayon::prelude::*;
use tracing::debug;

/// Briere response applied to max-normalized climate trajectories.
const BRIERE_X_MIN: f64 = 0.0;
const BRIERE_X_MAX: f64 = 1.0;
const BRIERE_AMPLITUDE: f64 = 1.0;

/// Upper bound keeping the Gamma-distributed draws proper.
pub const CV_GAMMA_MAX: f64 = std::f64::consts::FRAC_1_SQRT_2;
/// Upper bound keeping the Uniform-distributed draws inside their support.
pub const CV_UNIFORM_MAX: f64 = 0.577_350_269_189_625_8; // 1/sqrt(3)

/// Coefficients of variation for the per-realization parameter draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthCv {
    pub r0: f64,
    pub k: f64,
    pub q: f64,
    pub p: f64,
    pub alpha: f64,
}

/// Full CLiDENGO decision vector: mean growth parameters, their spread
/// coefficients, and the three integer climate lags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClidengoParams {
    pub growth: GrowthParams,
    pub cv: GrowthCv,
    /// Weekly lags (temperature, precipitation, humidity); negative values
    /// mean the climate signal leads incidence.
    pub lags: [i32; 3],
}

impl ClidengoParams {
    /// Box bounds of the 13-dimensional decision vector, in vector order.
    pub fn bounds() -> [(f64, f64); 13] {
        [
            (0.0, 5.0),            // r0
            (1.0, 5e5),            // K
            (0.0, 1.0),            // q
            (1.0, 10.0),           // p
            (1.0, 2.0),            // alpha
            (0.0, CV_GAMMA_MAX),   // cv_r0
            (0.0, CV_UNIFORM_MAX), // cv_K
            (0.0, CV_UNIFORM_MAX), // cv_q
            (0.0, CV_GAMMA_MAX),   // cv_p
            (0.0, CV_UNIFORM_MAX), // cv_alpha
            (-12.0, -2.0),         // lag_T
            (-12.0, -2.0),         // lag_P
            (-12.0, -2.0),         // lag_H
        ]
    }

    /// Decode the 13-vector `(r0, K, q, p, alpha, cv_r0, cv_K, cv_q, cv_p,
    /// cv_alpha, lag_T, lag_P, lag_H)`, rounding lags to integers.
    pub fn from_vector(x: &[f64]) -> Result<Self> {
        if x.len() != 13 {
            return Err(ForecastError::ShapeMismatch {
                expected: 13,
                got: x.len(),
            });
        }
        let params = Self {
            growth: GrowthParams {
                r0: x[0],
                k: x[1],
                q: x[2],
                p: x[3],
                alpha: x[4],
            },
            cv: GrowthCv {
                r0: x[5],
                k: x[6],
                q: x[7],
                p: x[8],
                alpha: x[9],
            },
            lags: [
                x[10].round() as i32,
                x[11].round() as i32,
                x[12].round() as i32,
            ],
        };
        params.validate()?;
        Ok(params)
    }

    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.growth.r0,
            self.growth.k,
            self.growth.q,
            self.growth.p,
            self.growth.alpha,
            self.cv.r0,
            self.cv.k,
            self.cv.q,
            self.cv.p,
            self.cv.alpha,
            self.lags[0] as f64,
            self.lags[1] as f64,
            self.lags[2] as f64,
        ]
    }

    pub fn validate(&self) -> Result<()> {
        self.growth.validate()?;
        let cv_ok = (0.0..=CV_GAMMA_MAX + 1e-12).contains(&self.cv.r0)
            && (0.0..=CV_UNIFORM_MAX + 1e-12).contains(&self.cv.k)
            && (0.0..=CV_UNIFORM_MAX + 1e-12).contains(&self.cv.q)
            && (0.0..=CV_GAMMA_MAX + 1e-12).contains(&self.cv.p)
            && (0.0..=CV_UNIFORM_MAX + 1e-12).contains(&self.cv.alpha);
        if !cv_ok {
            return Err(ForecastError::InvalidInput(format!(
                "cv coefficients out of range: {:?}",
                self.cv
            )));
        }
        for lag in self.lags {
            if !(-12..=-2).contains(&lag) {
                return Err(ForecastError::InvalidInput(format!(
                    "climate lag {lag} outside [-12, -2]"
                )));
            }
        }
        Ok(())
    }
}

/// Raw training climate with its smoothed baseline, one pair per covariate.
#[derive(Debug, Clone)]
pub struct ClimateSeries {
    pub raw: Vec<f64>,
    pub baseline: Vec<f64>,
}

/// The three training climate series a regional run draws from.
#[derive(Debug, Clone)]
pub struct ClimateHistory {
    pub temp: ClimateSeries,
    pub precip: ClimateSeries,
    pub humid: ClimateSeries,
}

/// Cumulative and incidence ensembles from one Monte-Carlo run.
#[derive(Debug, Clone)]
pub struct MonteCarloRun {
    pub cumulative: Ensemble,
    pub incidence: Ensemble,
}

/// Circular shift matching the sign convention of the climate lags: a
/// negative lag rotates the trajectory left, so week `t` sees the climate of
/// week `t + |lag|`.
fn circular_shift(values: &mut [f64], lag: i32) {
    let n = values.len();
    if n == 0 {
        return;
    }
    let offset = lag.unsigned_abs() as usize % n;
    if offset == 0 {
        return;
    }
    if lag < 0 {
        values.rotate_left(offset);
    } else {
        values.rotate_right(offset);
    }
}

fn draw_gamma(mean: f64, cv: f64, rng: &mut StdRng) -> Result<f64> {
    if cv <= 1e-12 || mean <= 0.0 {
        return Ok(mean);
    }
    let shape = 1.0 / (cv * cv);
    let scale = mean * cv * cv;
    let gamma = Gamma::new(shape, scale).map_err(|e| {
        ForecastError::NumericalFailure(format!("gamma draw (shape {shape}, scale {scale}): {e}"))
    })?;
    Ok(gamma.sample(rng))
}

fn draw_uniform(mean: f64, cv: f64, rng: &mut StdRng) -> f64 {
    if cv <= 1e-12 {
        return mean;
    }
    let half_width = 3f64.sqrt() * cv * mean.abs();
    let dist = Uniform::new_inclusive(mean - half_width, mean + half_width);
    dist.sample(rng)
}

/// Generate the forecast ensemble for one decision vector.
///
/// `opening_cases` is the empirical pool of observed EW-41 counts used for
/// the initial-condition draws. `history` provides the raw/baseline climate
/// series over whole training seasons.
pub fn run_monte_carlo(
    params: &ClidengoParams,
    history: &ClimateHistory,
    opening_cases: &[f64],
    mode: ClimateMode,
    n_real: usize,
    seed: u64,
    grid: &SimGrid,
) -> Result<MonteCarloRun> {
    params.validate()?;
    if n_real == 0 {
        return Err(ForecastError::InvalidInput("n_real must be positive".into()));
    }
    if opening_cases.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let briere = Briere::new(BRIERE_X_MIN, BRIERE_X_MAX, BRIERE_AMPLITUDE)?;
    let gen_cfg = ClimateGenConfig {
        win_len: 52,
        stride: 1,
        n_samp: grid.weeks,
    };

    // Climate synthesis first, one ensemble per active covariate, each
    // realization circularly shifted by its lag.
    let mut forcings: Vec<Vec<SuitabilitySeries>> = vec![Vec::new(); n_real];
    let active: Vec<(&ClimateSeries, i32)> = match mode {
        ClimateMode::T => vec![(&history.temp, params.lags[0])],
        ClimateMode::TP => vec![
            (&history.temp, params.lags[0]),
            (&history.precip, params.lags[1]),
        ],
        ClimateMode::TPH => vec![
            (&history.temp, params.lags[0]),
            (&history.precip, params.lags[1]),
            (&history.humid, params.lags[2]),
        ],
    };
    for (series, lag) in active {
        let ensemble =
            synthesize_climate(&series.raw, &series.baseline, &gen_cfg, n_real, &mut rng)?;
        for (j, forcing) in forcings.iter_mut().enumerate() {
            let mut trajectory = ensemble.trajectory(j).to_vec();
            circular_shift(&mut trajectory, lag);
            forcing.push(SuitabilitySeries::from_climate(&briere, &trajectory)?);
        }
    }

    // Parameter and initial-condition draws, sequential on the parent rng.
    let mut draws = Vec::with_capacity(n_real);
    for _ in 0..n_real {
        let realization = GrowthParams {
            r0: draw_gamma(params.growth.r0, params.cv.r0, &mut rng)?,
            k: draw_uniform(params.growth.k, params.cv.k, &mut rng),
            q: draw_uniform(params.growth.q, params.cv.q, &mut rng),
            p: 1.0 + draw_gamma(params.growth.p, params.cv.p, &mut rng)?,
            alpha: draw_uniform(params.growth.alpha, params.cv.alpha, &mut rng),
        };
        let c0 = opening_cases[rng.gen_range(0..opening_cases.len())];
        draws.push((realization, c0));
    }

    debug!(n_real, mode = ?mode, "integrating growth ensemble");

    // Pure integration fan-out.
    let paths: Vec<Result<(Vec<f64>, Vec<f64>)>> = draws
        .par_iter()
        .zip(forcings.par_iter())
        .map(|((realization, c0), forcing)| {
            let path = integrate_growth(realization, forcing, *c0, grid)?;
            Ok((path.cumulative, path.incidence))
        })
        .collect();

    let mut cumulative = Vec::with_capacity(n_real);
    let mut incidence = Vec::with_capacity(n_real);
    for path in paths {
        let (c, d) = path?;
        cumulative.push(c);
        incidence.push(d);
    }

    let run = MonteCarloRun {
        cumulative: Ensemble::from_trajectories(cumulative)?,
        incidence: Ensemble::from_trajectories(incidence)?,
    };
    run.cumulative.ensure_finite("cumulative ensemble")?;
    run.incidence.ensure_finite("incidence ensemble")?;
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n_seasons: usize) -> ClimateHistory {
        let series = |level: f64, amp: f64| -> ClimateSeries {
            let mut raw = Vec::new();
            let mut baseline = Vec::new();
            for k in 0..n_seasons {
                for i in 0..52 {
                    let phase = 2.0 * std::f64::consts::PI * i as f64 / 52.0;
                    let base = level + amp * phase.sin();
                    let t = (k * 52 + i) as f64;
                    let hash = (t * 12.9898).sin() * 43758.5453;
                    baseline.push(base);
                    raw.push(base * (1.0 + 0.04 * (hash - hash.floor() - 0.5)));
                }
            }
            ClimateSeries { raw, baseline }
        };
        ClimateHistory {
            temp: series(25.0, 5.0),
            precip: series(0.8, 0.4),
            humid: series(70.0, 10.0),
        }
    }

    fn base_params() -> ClidengoParams {
        ClidengoParams {
            growth: GrowthParams {
                r0: 1.2,
                k: 5000.0,
                q: 0.8,
                p: 1.5,
                alpha: 1.2,
            },
            cv: GrowthCv {
                r0: 0.1,
                k: 0.1,
                q: 0.05,
                p: 0.1,
                alpha: 0.05,
            },
            lags: [-8, -6, -4],
        }
    }

    #[test]
    fn vector_round_trip() {
        let params = base_params();
        let decoded = ClidengoParams::from_vector(&params.to_vector()).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn vector_rejects_wrong_length() {
        assert!(ClidengoParams::from_vector(&[0.0; 12]).is_err());
    }

    #[test]
    fn cv_bounds_enforced() {
        let mut params = base_params();
        params.cv.r0 = 0.8; // above 1/sqrt(2)
        assert!(params.validate().is_err());
        let mut params = base_params();
        params.cv.k = 0.6; // above 1/sqrt(3)
        assert!(params.validate().is_err());
    }

    #[test]
    fn circular_shift_convention() {
        let mut v = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        circular_shift(&mut v, -2);
        assert_eq!(v, vec![3.0, 4.0, 5.0, 1.0, 2.0]);
        let mut v = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        circular_shift(&mut v, 2);
        assert_eq!(v, vec![4.0, 5.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn ensemble_shapes() {
        let run = run_monte_carlo(
            &base_params(),
            &history(3),
            &[40.0, 55.0, 70.0],
            ClimateMode::TPH,
            16,
            30_081_984,
            &SimGrid::new(52),
        )
        .unwrap();
        assert_eq!(run.cumulative.weeks(), 52);
        assert_eq!(run.cumulative.n_real(), 16);
        assert_eq!(run.incidence.weeks(), 52);
        assert_eq!(run.incidence.n_real(), 16);
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let make = || {
            run_monte_carlo(
                &base_params(),
                &history(3),
                &[40.0, 55.0],
                ClimateMode::TPH,
                8,
                42,
                &SimGrid::new(52),
            )
            .unwrap()
        };
        let a = make();
        let b = make();
        for j in 0..8 {
            assert_eq!(a.cumulative.trajectory(j), b.cumulative.trajectory(j));
            assert_eq!(a.incidence.trajectory(j), b.incidence.trajectory(j));
        }
    }

    #[test]
    fn zero_cv_degenerates_to_parameter_point_mass() {
        let mut params = base_params();
        params.cv = GrowthCv {
            r0: 0.0,
            k: 0.0,
            q: 0.0,
            p: 0.0,
            alpha: 0.0,
        };
        // Single opening value: only climate sampling noise remains.
        let run = run_monte_carlo(
            &params,
            &history(3),
            &[50.0],
            ClimateMode::T,
            8,
            7,
            &SimGrid::new(52),
        )
        .unwrap();
        // All trajectories start from the same state.
        for j in 0..8 {
            assert_eq!(run.cumulative.trajectory(j)[0], 50.0);
        }
    }

    #[test]
    fn lag_shifts_produce_different_forecasts() {
        let mut lagged = base_params();
        lagged.lags = [-12, -6, -4];
        let mut near = base_params();
        near.lags = [-2, -6, -4];

        let run_a = run_monte_carlo(
            &lagged,
            &history(3),
            &[50.0],
            ClimateMode::T,
            32,
            42,
            &SimGrid::new(52),
        )
        .unwrap();
        let run_b = run_monte_carlo(
            &near,
            &history(3),
            &[50.0],
            ClimateMode::T,
            32,
            42,
            &SimGrid::new(52),
        )
        .unwrap();

        let mean_a = run_a.incidence.mean_trajectory();
        let mean_b = run_b.incidence.mean_trajectory();
        let dist: f64 = mean_a
            .iter()
            .zip(&mean_b)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt();
        assert!(dist > 0.0, "lag change must move the forecast");
    }

    #[test]
    fn empty_opening_pool_is_insufficient() {
        let res = run_monte_carlo(
            &base_params(),
            &history(2),
            &[],
            ClimateMode::T,
            4,
            1,
            &SimGrid::new(52),
        );
        assert!(matches!(
            res,
            Err(ForecastError::InsufficientData { .. })
        ));
    }
}
