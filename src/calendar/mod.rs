//! Epidemiological week calendar.

mod epiweek;

pub use epiweek::{season_window, Epiweek, ValidationWindow, SEASON_WEEKS};
