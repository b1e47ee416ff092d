//! Epiweek arithmetic and date conversion.
//!
//! An epiweek is a `(year, week)` pair with `1 <= week <= 52`, encoded as the
//! six-digit integer `YYYYWW`. Week 53 is never used; seasons are forced to
//! 52 weeks. A season runs from EW 41 of year Y through EW 40 of year Y+1.

use crate::error::{ForecastError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Weeks in a season (and in an epidemiological year).
pub const SEASON_WEEKS: usize = 52;

/// Epiweek a season opens on.
const SEASON_START_WEEK: u32 = 41;

/// An epidemiological week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Epiweek {
    year: i32,
    week: u32,
}

impl Epiweek {
    /// Create an epiweek, rejecting weeks outside `1..=52`.
    pub fn new(year: i32, week: u32) -> Result<Self> {
        if !(1..=SEASON_WEEKS as u32).contains(&week) {
            return Err(ForecastError::InvalidEpiweek { year, week });
        }
        Ok(Self { year, week })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    /// Six-digit `YYYYWW` encoding.
    pub fn to_yyyyww(&self) -> u32 {
        self.year as u32 * 100 + self.week
    }

    /// Parse a `YYYYWW` string. Rejects anything that is not six digits.
    pub fn parse_yyyyww(s: &str) -> Result<Self> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ForecastError::InvalidInput(format!(
                "epiweek must be six digits, got '{s}'"
            )));
        }
        let year: i32 = s[..4].parse().expect("digits checked");
        let week: u32 = s[4..].parse().expect("digits checked");
        Self::new(year, week)
    }

    /// Build from the encoded integer form.
    pub fn from_yyyyww(encoded: u32) -> Result<Self> {
        Self::new((encoded / 100) as i32, encoded % 100)
    }

    /// The Sunday that opens this epiweek: the day before the ISO Monday of
    /// week `(year, week)`, where ISO week 1 contains Jan 4.
    pub fn to_date(&self) -> Result<NaiveDate> {
        let monday = NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon).ok_or(
            ForecastError::InvalidEpiweek {
                year: self.year,
                week: self.week,
            },
        )?;
        Ok(monday - Duration::days(1))
    }

    /// Inverse of [`Epiweek::to_date`]: the epiweek whose opening Sunday is
    /// the week containing `date`. Dates falling in ISO week 53 are folded
    /// into week 52.
    pub fn from_date(date: NaiveDate) -> Result<Self> {
        // Our weeks open on Sunday, so the owning ISO week is that of the
        // following Monday.
        let monday_aligned = date + Duration::days(1);
        let iso = monday_aligned.iso_week();
        let week = iso.week().min(SEASON_WEEKS as u32);
        Self::new(iso.year(), week)
    }

    /// Next epiweek, wrapping week 52 into week 1 of the following year.
    pub fn succ(&self) -> Self {
        if self.week == SEASON_WEEKS as u32 {
            Self {
                year: self.year + 1,
                week: 1,
            }
        } else {
            Self {
                year: self.year,
                week: self.week + 1,
            }
        }
    }
}

impl std::fmt::Display for Epiweek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.week)
    }
}

/// The 52 epiweeks of the season starting EW 41 of `start_year`:
/// EW 41(Y) ... EW 52(Y), EW 1(Y+1) ... EW 40(Y+1).
pub fn season_window(start_year: i32) -> [Epiweek; SEASON_WEEKS] {
    let mut weeks = [Epiweek {
        year: start_year,
        week: SEASON_START_WEEK,
    }; SEASON_WEEKS];
    for k in 1..SEASON_WEEKS {
        weeks[k] = weeks[k - 1].succ();
    }
    weeks
}

/// Retrospective forecast origin used for evaluation.
///
/// Each window fixes the training end at EW 25 of a year relative to the
/// final data year; the forecast season opens at EW 41 of that same year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationWindow {
    T1,
    T2,
    T3,
}

impl ValidationWindow {
    /// Year offset back from the final data year.
    fn year_offset(&self) -> i32 {
        match self {
            ValidationWindow::T1 => 2,
            ValidationWindow::T2 => 1,
            ValidationWindow::T3 => 0,
        }
    }

    /// Training end: EW 25 of the resolved year.
    pub fn train_end(&self, final_year: i32) -> Epiweek {
        Epiweek {
            year: final_year - self.year_offset(),
            week: 25,
        }
    }

    /// First epiweek of the forecast season (EW 41 of the resolved year).
    pub fn season_start(&self, final_year: i32) -> Epiweek {
        Epiweek {
            year: final_year - self.year_offset(),
            week: SEASON_START_WEEK,
        }
    }

    /// The full 52-week forecast window.
    pub fn forecast_window(&self, final_year: i32) -> [Epiweek; SEASON_WEEKS] {
        season_window(final_year - self.year_offset())
    }
}

impl std::str::FromStr for ValidationWindow {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "T1" => Ok(ValidationWindow::T1),
            "T2" => Ok(ValidationWindow::T2),
            "T3" => Ok(ValidationWindow::T3),
            other => Err(ForecastError::InvalidInput(format!(
                "unknown validation window '{other}' (expected T1, T2, or T3)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn rejects_week_53_and_zero() {
        assert!(matches!(
            Epiweek::new(2024, 53),
            Err(ForecastError::InvalidEpiweek { week: 53, .. })
        ));
        assert!(Epiweek::new(2024, 0).is_err());
        assert!(Epiweek::new(2024, 52).is_ok());
    }

    #[test]
    fn parse_rejects_malformed_strings() {
        assert!(Epiweek::parse_yyyyww("2024").is_err());
        assert!(Epiweek::parse_yyyyww("20240101").is_err());
        assert!(Epiweek::parse_yyyyww("2024ab").is_err());
        assert!(Epiweek::parse_yyyyww("202453").is_err());

        let ew = Epiweek::parse_yyyyww("202341").unwrap();
        assert_eq!(ew.year(), 2023);
        assert_eq!(ew.week(), 41);
    }

    #[test]
    fn dates_are_sundays() {
        for week in [1, 10, 25, 41, 52] {
            let d = Epiweek::new(2023, week).unwrap().to_date().unwrap();
            assert_eq!(d.weekday(), Weekday::Sun, "week {week}");
        }
    }

    #[test]
    fn ew41_2023_opens_october_8() {
        let d = Epiweek::new(2023, 41).unwrap().to_date().unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2023, 10, 8).unwrap());
    }

    #[test]
    fn ew40_2024_opens_september_29() {
        let d = Epiweek::new(2024, 40).unwrap().to_date().unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 9, 29).unwrap());
    }

    #[test]
    fn date_round_trip() {
        for year in 2019..=2025 {
            for week in 1..=52 {
                let ew = Epiweek::new(year, week).unwrap();
                let back = Epiweek::from_date(ew.to_date().unwrap()).unwrap();
                assert_eq!(back, ew, "round trip failed at {ew}");
            }
        }
    }

    #[test]
    fn season_window_wraps_year_boundary() {
        let window = season_window(2023);
        assert_eq!(window[0], Epiweek::new(2023, 41).unwrap());
        assert_eq!(window[11], Epiweek::new(2023, 52).unwrap());
        assert_eq!(window[12], Epiweek::new(2024, 1).unwrap());
        assert_eq!(window[51], Epiweek::new(2024, 40).unwrap());
    }

    #[test]
    fn season_window_dates_are_consecutive_sundays() {
        let window = season_window(2023);
        let mut prev = window[0].to_date().unwrap();
        assert_eq!(prev.weekday(), Weekday::Sun);
        for ew in &window[1..] {
            let d = ew.to_date().unwrap();
            assert_eq!(d - prev, Duration::days(7));
            prev = d;
        }
    }

    #[test]
    fn validation_windows_resolve_years_explicitly() {
        assert_eq!(
            ValidationWindow::T1.train_end(2024),
            Epiweek::new(2022, 25).unwrap()
        );
        assert_eq!(
            ValidationWindow::T2.train_end(2024),
            Epiweek::new(2023, 25).unwrap()
        );
        assert_eq!(
            ValidationWindow::T3.train_end(2024),
            Epiweek::new(2024, 25).unwrap()
        );
        assert_eq!(
            ValidationWindow::T3.season_start(2024),
            Epiweek::new(2024, 41).unwrap()
        );
    }

    #[test]
    fn succ_wraps() {
        let ew = Epiweek::new(2023, 52).unwrap();
        assert_eq!(ew.succ(), Epiweek::new(2024, 1).unwrap());
    }
}
