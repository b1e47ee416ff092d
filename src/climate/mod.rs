//! Climate covariates: suitability response and synthetic trajectory
//! generation.

mod briere;
mod generator;

pub use briere::{normalize_by_max, Briere};
pub use generator::{expected_levels, synthesize_climate, ClimateGenConfig};
