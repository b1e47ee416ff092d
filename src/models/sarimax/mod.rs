//! SARIMAX forecaster on log-offset cases with climate regressors.

mod auto;
mod diff;
mod model;
mod outlier;

pub use auto::{search_orders, OrderSearch};
pub use diff::Differencer;
pub use model::SarimaxModel;
pub use outlier::{intervention_dummies, screen_additive_outliers, OutlierScreen};

use crate::calendar::SEASON_WEEKS;
use crate::config::ModelConfig;
use crate::core::{ClimateVar, TrainingSpan};
use crate::error::{ForecastError, Result};
use crate::quantile::QuantileBands;
use tracing::info;

/// Seasonal period of the weekly series.
const PERIOD: usize = 52;

/// Variance-stabilizing offset on the case counts.
const LOG_OFFSET: f64 = 100.0;

/// Rolling 52-week mean of a series; shorter windows at the start average
/// whatever history is available.
fn rolling_annual_mean(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut acc = 0.0;
    for t in 0..values.len() {
        acc += values[t];
        if t >= PERIOD {
            acc -= values[t - PERIOD];
        }
        let window = (t + 1).min(PERIOD);
        out.push(acc / window as f64);
    }
    out
}

/// Naive seasonal replay for future regressor values: the average of the
/// observations one and two years earlier.
fn seasonal_replay(history: &[f64], horizon: usize) -> Vec<f64> {
    let n = history.len();
    let mut extended = history.to_vec();
    for h in 0..horizon {
        let t = n + h;
        let one_year = extended[t - PERIOD];
        let value = if t >= 2 * PERIOD {
            0.5 * (one_year + extended[t - 2 * PERIOD])
        } else {
            one_year
        };
        extended.push(value);
    }
    extended[n..].to_vec()
}

/// Fit the configured SARIMAX and assemble the 52-week forecast bands.
///
/// The model runs on `log(cases + 100)` with the weekly median temperature
/// and the rolling annual precipitation mean as regressors; symmetric
/// Gaussian bands on the log scale are back-transformed through
/// `exp(y) - 100` and the reporting slice (horizon weeks 16..=67) is kept.
pub fn forecast(span: &TrainingSpan, config: &ModelConfig) -> Result<QuantileBands> {
    if span.seasons().len() < 3 {
        return Err(ForecastError::InsufficientData {
            needed: 3 * SEASON_WEEKS,
            got: span.seasons().len() * SEASON_WEEKS,
        });
    }

    let records = span.all_records();
    let n = records.len();
    let y: Vec<f64> = records
        .iter()
        .map(|r| (r.cases as f64 + LOG_OFFSET).ln())
        .collect();

    let temp: Vec<f64> = records
        .iter()
        .map(|r| ClimateVar::Temperature.value(r))
        .collect();
    let precip: Vec<f64> = records
        .iter()
        .map(|r| ClimateVar::Precipitation.value(r))
        .collect();
    let precip_annual = rolling_annual_mean(&precip);

    let mut xreg = vec![temp.clone(), precip_annual.clone()];
    if config.intervention {
        let screen = screen_additive_outliers(&y, PERIOD);
        if !screen.indices.is_empty() {
            info!(
                region = %config.region,
                outliers = ?screen.indices,
                "adding intervention dummies"
            );
            xreg.extend(intervention_dummies(n, &screen.indices));
        }
    }

    let model = SarimaxModel::fit(&y, &xreg, config.sarimax_orders, PERIOD)?;
    info!(
        region = %config.region,
        orders = ?model.orders(),
        aic = model.aic(),
        "sarimax fitted"
    );

    let horizon = config.forecast_horizon;
    let mut xreg_future = vec![
        seasonal_replay(&temp, horizon),
        seasonal_replay(&precip_annual, horizon),
    ];
    // Intervention dummies are historical one-offs: zero over the horizon.
    for _ in 2..xreg.len() {
        xreg_future.push(vec![0.0; horizon]);
    }

    let (mean, se) = model.forecast(horizon, &xreg_future)?;

    // Reporting slice: horizon weeks 16..=67 cover EW 41 .. EW 40.
    let start = config.report_start - 1;
    let end = start + SEASON_WEEKS;
    if mean.len() < end {
        return Err(ForecastError::ShapeMismatch {
            expected: end,
            got: mean.len(),
        });
    }
    QuantileBands::from_gaussian(&mean[start..end], &se[start..end], |v| v.exp() - LOG_OFFSET)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rolling_mean_handles_warmup() {
        let values: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let rolled = rolling_annual_mean(&values);
        assert_relative_eq!(rolled[0], 0.0);
        assert_relative_eq!(rolled[1], 0.5);
        // Full window: mean of values[t-51..=t].
        assert_relative_eq!(rolled[55], (4..=55).sum::<usize>() as f64 / 52.0);
    }

    #[test]
    fn seasonal_replay_averages_two_years() {
        let mut history = vec![0.0; 156];
        for (t, value) in history.iter_mut().enumerate() {
            *value = (t % 52) as f64 + if t >= 104 { 10.0 } else { 0.0 };
        }
        let future = seasonal_replay(&history, 4);
        // mean(value one year back, value two years back):
        // one year back carries the +10 offset, two years back does not.
        assert_relative_eq!(future[0], 5.0);
        assert_relative_eq!(future[1], 6.0);
    }

    #[test]
    fn seasonal_replay_recurses_beyond_one_year() {
        let history: Vec<f64> = (0..104).map(|t| (t % 52) as f64).collect();
        let future = seasonal_replay(&history, 60);
        // Past the first synthetic year the replay reads its own output.
        assert_eq!(future.len(), 60);
        assert_relative_eq!(future[52], future[0], epsilon = 1e-12);
    }
}
