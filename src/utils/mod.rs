//! Numerical utilities shared by the forecasting models.

pub mod linalg;
pub mod metrics;
pub mod minimize;
pub mod stats;

pub use metrics::{interval_coverage, score_forecast, AccuracyMetrics};
pub use minimize::{midpoint, minimize_box, MinimizeOptions, MinimizeOutcome};
pub use stats::{autocovariance, mean, percentile, quantile_normal, std_dev, variance};
