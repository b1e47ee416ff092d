//! # dfense-forecast
//!
//! Probabilistic forecasting of weekly dengue incidence for Brazilian
//! states. Three model families share one input contract (aggregated weekly
//! cases plus climate covariates) and one output contract (a point forecast
//! with four central prediction intervals over a 52-week season):
//!
//! - CLiDENGO: a climate-modulated beta-logistic growth simulator driven by
//!   synthetic climate trajectories and Monte-Carlo parameter draws;
//! - SARIMAX: seasonal ARIMA on log-offset cases with climate regressors;
//! - ARp: a high-order autoregressive model simulated forward with Gaussian
//!   excitations and SSA-smoothed quantile tracks.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod calendar;
pub mod climate;
pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod quantile;
pub mod utils;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::calendar::{Epiweek, ValidationWindow};
    pub use crate::config::{ClimateMode, Misfit, ModelConfig, ModelFamily, SarimaxOrders};
    pub use crate::core::{TrainingSpan, WeeklyRecord};
    pub use crate::error::{Component, ForecastError, RegionFailure, Result};
    pub use crate::pipeline::{run_region, ClimateBaselines};
    pub use crate::quantile::ForecastRow;
}
