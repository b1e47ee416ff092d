//! Weekly observations and training-span selection.

use crate::calendar::{Epiweek, SEASON_WEEKS};
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// One aggregated week for a region. Immutable after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRecord {
    pub epiweek: Epiweek,
    pub cases: u32,
    pub temp_min: f64,
    pub temp_med: f64,
    pub temp_max: f64,
    pub precip_min: f64,
    pub precip_med: f64,
    pub precip_max: f64,
    pub rel_humid_min: f64,
    pub rel_humid_med: f64,
    pub rel_humid_max: f64,
    pub thermal_range: Option<f64>,
    pub rainy_days: Option<f64>,
}

/// Climate covariate selected for modeling (the weekly medians).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimateVar {
    Temperature,
    Precipitation,
    Humidity,
}

impl ClimateVar {
    pub fn value(&self, record: &WeeklyRecord) -> f64 {
        match self {
            ClimateVar::Temperature => record.temp_med,
            ClimateVar::Precipitation => record.precip_med,
            ClimateVar::Humidity => record.rel_humid_med,
        }
    }
}

/// Replace non-positive entries by half the smallest positive finite value.
///
/// Keeps log transforms well defined on series where missing weeks were
/// aggregated to zero. A series with no positive entries is left unchanged.
pub fn positive_floor(values: &mut [f64]) {
    let smallest = values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold(f64::INFINITY, f64::min);
    if !smallest.is_finite() {
        return;
    }
    let floor = smallest / 2.0;
    for v in values.iter_mut() {
        if !(*v > 0.0) {
            *v = floor;
        }
    }
}

/// Exactly 52 consecutive weekly records spanning EW 41(Y) .. EW 40(Y+1).
#[derive(Debug, Clone)]
pub struct Season {
    start_year: i32,
    records: Vec<WeeklyRecord>,
}

impl Season {
    /// Validate contiguity and the season window.
    pub fn from_records(records: Vec<WeeklyRecord>) -> Result<Self> {
        if records.len() != SEASON_WEEKS {
            return Err(ForecastError::ShapeMismatch {
                expected: SEASON_WEEKS,
                got: records.len(),
            });
        }
        let first = records[0].epiweek;
        if first.week() != 41 {
            return Err(ForecastError::InvalidInput(format!(
                "season must start at epiweek 41, got {first}"
            )));
        }
        let mut expected = first;
        for record in &records[1..] {
            expected = expected.succ();
            if record.epiweek != expected {
                return Err(ForecastError::InvalidInput(format!(
                    "season weeks not contiguous: expected {expected}, got {}",
                    record.epiweek
                )));
            }
        }
        Ok(Self {
            start_year: first.year(),
            records,
        })
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn records(&self) -> &[WeeklyRecord] {
        &self.records
    }

    pub fn cases(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.cases as f64).collect()
    }

    /// Cumulative cases across the season, week by week.
    pub fn cumulative_cases(&self) -> Vec<f64> {
        let mut acc = 0.0;
        self.records
            .iter()
            .map(|r| {
                acc += r.cases as f64;
                acc
            })
            .collect()
    }

    pub fn climate(&self, var: ClimateVar) -> Vec<f64> {
        self.records.iter().map(|r| var.value(r)).collect()
    }
}

/// K whole training seasons plus the partial prefix up to the forecast
/// origin. Owned per region; read-only once materialized.
#[derive(Debug, Clone)]
pub struct TrainingSpan {
    seasons: Vec<Season>,
    prefix: Vec<WeeklyRecord>,
}

impl TrainingSpan {
    /// Select the training span from chronologically sorted records.
    ///
    /// Whole seasons are those ending strictly before the season containing
    /// `train_end`; the prefix covers EW 41 of the last training year up to
    /// and including `train_end`. Data later than `train_end` never enters
    /// the span.
    pub fn select(records: &[WeeklyRecord], train_end: Epiweek) -> Result<Self> {
        let usable: Vec<WeeklyRecord> = records
            .iter()
            .filter(|r| r.epiweek <= train_end)
            .cloned()
            .collect();
        if usable.is_empty() {
            return Err(ForecastError::InsufficientData {
                needed: SEASON_WEEKS,
                got: 0,
            });
        }

        // Year of the season in progress at the training end: EW 41..52
        // belong to the season of the same year, EW 1..40 to the previous.
        let open_season_year = if train_end.week() >= 41 {
            train_end.year()
        } else {
            train_end.year() - 1
        };

        let mut seasons = Vec::new();
        let mut cursor_year = open_season_year - 1;
        // Walk backwards collecting whole seasons until the data runs out.
        loop {
            match Self::extract_season(&usable, cursor_year) {
                Some(season) => {
                    seasons.push(season);
                    cursor_year -= 1;
                }
                None => break,
            }
        }
        seasons.reverse();

        if seasons.is_empty() {
            return Err(ForecastError::InsufficientData {
                needed: SEASON_WEEKS,
                got: usable.len(),
            });
        }

        let prefix_start = Epiweek::new(open_season_year, 41)?;
        let prefix: Vec<WeeklyRecord> = usable
            .iter()
            .filter(|r| r.epiweek >= prefix_start)
            .cloned()
            .collect();

        Ok(Self { seasons, prefix })
    }

    fn extract_season(records: &[WeeklyRecord], start_year: i32) -> Option<Season> {
        let start = Epiweek::new(start_year, 41).ok()?;
        let first = records.iter().position(|r| r.epiweek == start)?;
        let slice = records.get(first..first + SEASON_WEEKS)?;
        Season::from_records(slice.to_vec()).ok()
    }

    pub fn seasons(&self) -> &[Season] {
        &self.seasons
    }

    pub fn prefix(&self) -> &[WeeklyRecord] {
        &self.prefix
    }

    /// All records in chronological order: whole seasons then the prefix.
    pub fn all_records(&self) -> Vec<WeeklyRecord> {
        let mut out = Vec::new();
        for season in &self.seasons {
            out.extend_from_slice(season.records());
        }
        out.extend_from_slice(&self.prefix);
        out
    }

    /// Concatenated case series over whole seasons and prefix.
    pub fn case_series(&self) -> Vec<f64> {
        self.all_records().iter().map(|r| r.cases as f64).collect()
    }

    /// Climate series over the whole seasons only (length `52 * K`), the
    /// shape the climate generator requires.
    pub fn seasonal_climate_series(&self, var: ClimateVar) -> Vec<f64> {
        self.seasons
            .iter()
            .flat_map(|s| s.climate(var))
            .collect()
    }

    /// Cumulative-cases matrix, one column per whole season (52 x K).
    pub fn cumulative_case_matrix(&self) -> Vec<Vec<f64>> {
        self.seasons.iter().map(|s| s.cumulative_cases()).collect()
    }

    /// Observed season-opening (EW 41) case counts, the empirical pool for
    /// initial-condition draws.
    pub fn season_opening_cases(&self) -> Vec<f64> {
        let mut pool: Vec<f64> = self
            .seasons
            .iter()
            .map(|s| s.records()[0].cases as f64)
            .collect();
        if let Some(first) = self.prefix.first() {
            if first.epiweek.week() == 41 {
                pool.push(first.cases as f64);
            }
        }
        pool
    }
}
