//! Per-(region, window) model configuration.
//!
//! One immutable record drives a whole regional run; components receive it
//! by reference and nothing mutates it after construction.

use crate::calendar::ValidationWindow;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Which climate factors modulate the growth rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClimateMode {
    /// Temperature only.
    T,
    /// Temperature x precipitation.
    TP,
    /// Temperature x precipitation x humidity (canonical).
    TPH,
}

/// Calibration misfit functional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Misfit {
    /// Squared mean error plus total ensemble spread.
    Mse,
    /// Weighted relative mean error and coefficient-of-variation mismatch.
    MeanVariance { weight: f64 },
}

/// Model family producing the forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFamily {
    Clidengo,
    Sarimax,
    Arp,
}

/// SARIMAX orders `(p, d, q) x (P, D, Q)` with the weekly period 52 implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SarimaxOrders {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub cap_p: usize,
    pub cap_d: usize,
    pub cap_q: usize,
}

impl SarimaxOrders {
    pub fn new(p: usize, d: usize, q: usize, cap_p: usize, cap_d: usize, cap_q: usize) -> Self {
        Self {
            p,
            d,
            q,
            cap_p,
            cap_d,
            cap_q,
        }
    }
}

impl Default for SarimaxOrders {
    /// The long-horizon-stable default `(1, 0, 1) x (1, 1, 1)`.
    fn default() -> Self {
        Self::new(1, 0, 1, 1, 1, 1)
    }
}

/// Immutable configuration for one regional forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Region label (Brazilian federative unit).
    pub region: String,
    /// Retrospective window fixing the forecast origin.
    pub window: ValidationWindow,
    /// Final data year the windows are anchored to.
    pub final_year: i32,
    /// Model family to run.
    pub model: ModelFamily,
    /// Forecast horizon in weeks from the origin.
    pub forecast_horizon: usize,
    /// First horizon week of the reporting slice.
    pub report_start: usize,
    /// Ensemble size during calibration.
    pub n_real_calibrate: usize,
    /// Ensemble size for the final forecast.
    pub n_real_forecast: usize,
    /// Monte-Carlo runs for the ARp simulation.
    pub n_real_arp: usize,
    /// Climate modulation mode.
    pub climate_mode: ClimateMode,
    /// Weekly climate lags (temperature, precipitation, humidity);
    /// negative means climate leads incidence.
    pub lags: [i32; 3],
    /// Manual SARIMAX orders for this window.
    pub sarimax_orders: SarimaxOrders,
    /// Autoregressive order for the ARp model.
    pub ar_order: usize,
    /// Process-wide seed for all Monte-Carlo draws.
    pub seed: u64,
    /// Calibration misfit functional.
    pub misfit: Misfit,
    /// Whether SARIMAX may add additive-outlier intervention dummies.
    pub intervention: bool,
}

impl ModelConfig {
    pub fn new(region: impl Into<String>, window: ValidationWindow, final_year: i32) -> Self {
        Self {
            region: region.into(),
            window,
            final_year,
            model: ModelFamily::Clidengo,
            forecast_horizon: 67,
            report_start: 16,
            n_real_calibrate: 32,
            n_real_forecast: 1024,
            n_real_arp: 10_000,
            climate_mode: ClimateMode::TPH,
            lags: [-7, -7, -7],
            sarimax_orders: SarimaxOrders::default(),
            ar_order: 92,
            seed: 30_081_984,
            misfit: Misfit::Mse,
            intervention: false,
        }
    }

    pub fn with_model(mut self, model: ModelFamily) -> Self {
        self.model = model;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_climate_mode(mut self, mode: ClimateMode) -> Self {
        self.climate_mode = mode;
        self
    }

    pub fn with_lags(mut self, lags: [i32; 3]) -> Self {
        self.lags = lags;
        self
    }

    pub fn with_sarimax_orders(mut self, orders: SarimaxOrders) -> Self {
        self.sarimax_orders = orders;
        self
    }

    pub fn with_ensemble_sizes(mut self, calibrate: usize, forecast: usize) -> Self {
        self.n_real_calibrate = calibrate;
        self.n_real_forecast = forecast;
        self
    }

    pub fn with_misfit(mut self, misfit: Misfit) -> Self {
        self.misfit = misfit;
        self
    }

    /// Validate cross-field constraints before a run.
    pub fn validate(&self) -> Result<()> {
        if self.forecast_horizon < self.report_start + 51 {
            return Err(ForecastError::InvalidInput(format!(
                "horizon {} too short for the 52-week slice starting at week {}",
                self.forecast_horizon, self.report_start
            )));
        }
        if self.n_real_calibrate == 0 || self.n_real_forecast == 0 || self.n_real_arp == 0 {
            return Err(ForecastError::InvalidInput(
                "ensemble sizes must be positive".into(),
            ));
        }
        for lag in self.lags {
            if !(-12..=-2).contains(&lag) {
                return Err(ForecastError::InvalidInput(format!(
                    "climate lag {lag} outside [-12, -2]"
                )));
            }
        }
        if self.ar_order == 0 {
            return Err(ForecastError::InvalidInput(
                "ar_order must be positive".into(),
            ));
        }
        if let Misfit::MeanVariance { weight } = self.misfit {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ForecastError::InvalidInput(format!(
                    "misfit weight {weight} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}
