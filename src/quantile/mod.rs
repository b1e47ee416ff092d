//! Quantile assembly and final output shaping.
//!
//! Every model family funnels through this module: an ensemble, a Gaussian
//! band description, or precomputed percentile tracks become the four central
//! prediction intervals plus the point forecast, then one shared finalization
//! applies the output contract (round, clip, zero-to-one remap, ordering
//! self-check).

use crate::calendar::Epiweek;
use crate::core::Ensemble;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

/// Central interval levels, narrowest first.
pub const LEVELS: [f64; 4] = [50.0, 80.0, 90.0, 95.0];

/// Point-forecast statistic; per-model, never unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointStat {
    /// Ensemble mean (CLiDENGO).
    Mean,
    /// 50th percentile (SARIMAX, ARp).
    Median,
}

/// Lower percentile rank for a central level: `(100 - L) / 2`.
fn rank_minus(level: f64) -> f64 {
    (100.0 - level) / 2.0
}

/// Upper percentile rank for a central level: `(100 + L) / 2`.
fn rank_plus(level: f64) -> f64 {
    (100.0 + level) / 2.0
}

/// Per-week forecast bands on the real (case-count) scale, pre-rounding.
#[derive(Debug, Clone)]
pub struct QuantileBands {
    pred: Vec<f64>,
    /// Indexed in LEVELS order: 50, 80, 90, 95.
    lower: [Vec<f64>; 4],
    upper: [Vec<f64>; 4],
}

/// Named percentile trajectories, the ARp hand-off shape.
#[derive(Debug, Clone)]
pub struct PercentileTracks {
    percents: Vec<f64>,
    tracks: Vec<Vec<f64>>,
}

impl PercentileTracks {
    pub fn new(percents: Vec<f64>, tracks: Vec<Vec<f64>>) -> Result<Self> {
        if percents.len() != tracks.len() {
            return Err(ForecastError::ShapeMismatch {
                expected: percents.len(),
                got: tracks.len(),
            });
        }
        let weeks = tracks.first().map(|t| t.len()).unwrap_or(0);
        if tracks.iter().any(|t| t.len() != weeks) {
            return Err(ForecastError::InvalidInput(
                "percentile tracks must share one length".into(),
            ));
        }
        Ok(Self { percents, tracks })
    }

    pub fn track(&self, percent: f64) -> Option<&[f64]> {
        self.percents
            .iter()
            .position(|p| (p - percent).abs() < 1e-9)
            .map(|i| self.tracks[i].as_slice())
    }

}

impl QuantileBands {
    pub fn weeks(&self) -> usize {
        self.pred.len()
    }

    pub fn pred(&self) -> &[f64] {
        &self.pred
    }

    pub fn lower(&self, index: usize) -> &[f64] {
        &self.lower[index]
    }

    pub fn upper(&self, index: usize) -> &[f64] {
        &self.upper[index]
    }

    /// Assemble from a Monte-Carlo ensemble.
    pub fn from_ensemble(ensemble: &Ensemble, stat: PointStat) -> Result<Self> {
        ensemble.ensure_finite("forecast ensemble")?;
        let weeks = ensemble.weeks();
        let pred = (0..weeks)
            .map(|k| match stat {
                PointStat::Mean => ensemble.week_mean(k),
                PointStat::Median => ensemble.week_percentile(k, 50.0),
            })
            .collect();
        let mut lower: [Vec<f64>; 4] = Default::default();
        let mut upper: [Vec<f64>; 4] = Default::default();
        for (i, level) in LEVELS.iter().enumerate() {
            lower[i] = (0..weeks)
                .map(|k| ensemble.week_percentile(k, rank_minus(*level)))
                .collect();
            upper[i] = (0..weeks)
                .map(|k| ensemble.week_percentile(k, rank_plus(*level)))
                .collect();
        }
        Ok(Self { pred, lower, upper })
    }

    /// Assemble symmetric Gaussian bands on a latent scale and map every
    /// bound through `back`, clipping the result at zero.
    ///
    /// Used by SARIMAX with `back = exp(y) - 100`.
    pub fn from_gaussian<F>(latent_mean: &[f64], latent_se: &[f64], back: F) -> Result<Self>
    where
        F: Fn(f64) -> f64,
    {
        if latent_mean.len() != latent_se.len() {
            return Err(ForecastError::ShapeMismatch {
                expected: latent_mean.len(),
                got: latent_se.len(),
            });
        }
        if latent_mean
            .iter()
            .chain(latent_se)
            .any(|v| !v.is_finite())
        {
            return Err(ForecastError::NonFinite("gaussian band input".into()));
        }
        let normal = Normal::new(0.0, 1.0).expect("unit normal");
        let pred: Vec<f64> = latent_mean.iter().map(|&m| back(m).max(0.0)).collect();
        let mut lower: [Vec<f64>; 4] = Default::default();
        let mut upper: [Vec<f64>; 4] = Default::default();
        for (i, level) in LEVELS.iter().enumerate() {
            let z = normal.inverse_cdf(rank_plus(*level) / 100.0);
            lower[i] = latent_mean
                .iter()
                .zip(latent_se)
                .map(|(m, s)| back(m - z * s).max(0.0))
                .collect();
            upper[i] = latent_mean
                .iter()
                .zip(latent_se)
                .map(|(m, s)| back(m + z * s).max(0.0))
                .collect();
        }
        Ok(Self { pred, lower, upper })
    }

    /// Assemble from precomputed percentile tracks. The nine ranks
    /// 2.5, 5, 10, 25, 50, 75, 90, 95, 97.5 must all be present; the point
    /// forecast is the 50th-percentile track.
    pub fn from_percentile_tracks(tracks: &PercentileTracks) -> Result<Self> {
        let need = |p: f64| -> Result<Vec<f64>> {
            tracks
                .track(p)
                .map(|t| t.to_vec())
                .ok_or_else(|| {
                    ForecastError::InvalidInput(format!("missing percentile track {p}"))
                })
        };
        let pred = need(50.0)?;
        let lower = [need(25.0)?, need(10.0)?, need(5.0)?, need(2.5)?];
        let upper = [need(75.0)?, need(90.0)?, need(95.0)?, need(97.5)?];
        Ok(Self { pred, lower, upper })
    }

    /// Apply the output contract: round to integers, clip negatives at zero,
    /// remap exact zeros to one, and verify row-wise ordering.
    pub fn finalize(&self) -> Result<Vec<BandRow>> {
        let shape = |v: f64| -> Result<u32> {
            if !v.is_finite() {
                return Err(ForecastError::NonFinite("final band value".into()));
            }
            let rounded = v.round().max(0.0);
            let as_int = rounded as u32;
            Ok(if as_int == 0 { 1 } else { as_int })
        };

        let mut rows = Vec::with_capacity(self.weeks());
        for k in 0..self.weeks() {
            let row = BandRow {
                lower_95: shape(self.lower[3][k])?,
                lower_90: shape(self.lower[2][k])?,
                lower_80: shape(self.lower[1][k])?,
                lower_50: shape(self.lower[0][k])?,
                pred: shape(self.pred[k])?,
                upper_50: shape(self.upper[0][k])?,
                upper_80: shape(self.upper[1][k])?,
                upper_90: shape(self.upper[2][k])?,
                upper_95: shape(self.upper[3][k])?,
            };
            row.check_ordering(k)?;
            rows.push(row);
        }
        Ok(rows)
    }
}

/// One finalized forecast week without its date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandRow {
    pub lower_95: u32,
    pub lower_90: u32,
    pub lower_80: u32,
    pub lower_50: u32,
    pub pred: u32,
    pub upper_50: u32,
    pub upper_80: u32,
    pub upper_90: u32,
    pub upper_95: u32,
}

impl BandRow {
    fn check_ordering(&self, week: usize) -> Result<()> {
        let ordered = self.lower_95 <= self.lower_90
            && self.lower_90 <= self.lower_80
            && self.lower_80 <= self.lower_50
            && self.lower_50 <= self.pred
            && self.pred <= self.upper_50
            && self.upper_50 <= self.upper_80
            && self.upper_80 <= self.upper_90
            && self.upper_90 <= self.upper_95;
        if ordered {
            Ok(())
        } else {
            Err(ForecastError::OutputContract(format!(
                "band ordering violated at week {}",
                week + 1
            )))
        }
    }
}

/// One finalized forecast week as written to the output CSV.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub lower_95: u32,
    pub lower_90: u32,
    pub lower_80: u32,
    pub lower_50: u32,
    pub pred: u32,
    pub upper_50: u32,
    pub upper_80: u32,
    pub upper_90: u32,
    pub upper_95: u32,
}

/// Zip finalized bands with the epiweeks of the forecast season.
pub fn attach_dates(rows: &[BandRow], window: &[Epiweek]) -> Result<Vec<ForecastRow>> {
    if rows.len() != window.len() {
        return Err(ForecastError::ShapeMismatch {
            expected: window.len(),
            got: rows.len(),
        });
    }
    rows.iter()
        .zip(window)
        .map(|(row, ew)| {
            Ok(ForecastRow {
                date: ew.to_date()?,
                lower_95: row.lower_95,
                lower_90: row.lower_90,
                lower_80: row.lower_80,
                lower_50: row.lower_50,
                pred: row.pred,
                upper_50: row.upper_50,
                upper_80: row.upper_80,
                upper_90: row.upper_90,
                upper_95: row.upper_95,
            })
        })
        .collect()
}
