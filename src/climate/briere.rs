//! Generalized Briere suitability response.
//!
//! Maps a climate value to a growth-suitability weight through a smooth,
//! bounded hump with softplus-rounded shoulders. Callers normalize sampled
//! series by their own maximum so the effective response lies in [0, 1].

use crate::error::{ForecastError, Result};

/// Softplus with sharpness `beta`, evaluated in the overflow-safe form
/// `(log1p(exp(-|bt|)) + max(bt, 0)) / b`.
fn softplus(beta: f64, t: f64) -> f64 {
    let bt = beta * t;
    ((-bt.abs()).exp().ln_1p() + bt.max(0.0)) / beta
}

/// Smooth generalized Briere function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Briere {
    x_min: f64,
    x_max: f64,
    a: f64,
    m: f64,
    delta: f64,
    beta: f64,
}

impl Briere {
    /// Default shape: `m = 2`, `delta = 1`, `beta = 50`.
    pub fn new(x_min: f64, x_max: f64, a: f64) -> Result<Self> {
        Self::with_shape(x_min, x_max, a, 2.0, 1.0, 50.0)
    }

    pub fn with_shape(
        x_min: f64,
        x_max: f64,
        a: f64,
        m: f64,
        delta: f64,
        beta: f64,
    ) -> Result<Self> {
        if !(x_max > x_min) {
            return Err(ForecastError::InvalidInput(format!(
                "Briere requires x_max > x_min, got [{x_min}, {x_max}]"
            )));
        }
        if a < 0.0 || m < 1.0 || !(0.0..=1.0).contains(&delta) || beta <= 0.0 {
            return Err(ForecastError::InvalidInput(
                "Briere shape constraints: a >= 0, m >= 1, delta in [0,1], beta > 0".into(),
            ));
        }
        Ok(Self {
            x_min,
            x_max,
            a,
            m,
            delta,
            beta,
        })
    }

    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    /// Suitability weight at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        let rise = softplus(self.beta, x - self.x_min);
        let fall = softplus(self.beta, self.x_max - x).powf(1.0 / self.m);
        self.a * (x * rise * fall).max(0.0).powf(self.delta)
    }

    /// Evaluate over a trajectory.
    pub fn eval_series(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }
}

/// Scale a sampled suitability series by its own maximum, mapping it into
/// [0, 1]. A non-positive maximum leaves the series untouched.
pub fn normalize_by_max(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 {
        for v in values.iter_mut() {
            *v /= max;
        }
    }
}
