//! Core data model: weekly observations, seasons, training spans, ensembles.

mod ensemble;
mod observation;

pub use ensemble::Ensemble;
pub use observation::{
    positive_floor, ClimateVar, Season, TrainingSpan, WeeklyRecord,
};
