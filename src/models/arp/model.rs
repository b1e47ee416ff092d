//! High-order autoregressive fit and Gaussian-excitation simulation.

use crate::error::{ForecastError, Result};
use crate::utils::stats::autocovariance;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

/// A fitted AR(p) model on the transformed case series.
#[derive(Debug, Clone)]
pub struct ArFit {
    order: usize,
    /// Prediction coefficients: `z_t ~ sum_j coeffs[j] * z_{t-1-j}`.
    coeffs: Vec<f64>,
    /// Excitation standard deviation from the seasonal error reshape.
    sigma: f64,
    /// Last `order` observations, oldest first: the simulation state.
    state: Vec<f64>,
}

/// Fit AR(`order`) by Yule-Walker on the sample autocovariance, solved with
/// the Levinson-Durbin recursion.
pub fn fit_ar(z: &[f64], order: usize, season_len: usize) -> Result<ArFit> {
    let n = z.len();
    if order == 0 {
        return Err(ForecastError::InvalidInput("ar order must be positive".into()));
    }
    if n < order + season_len {
        return Err(ForecastError::InsufficientData {
            needed: order + season_len,
            got: n,
        });
    }
    if z.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::NonFinite("ar input".into()));
    }

    let gamma = autocovariance(z, order);
    if gamma[0] <= 0.0 {
        return Err(ForecastError::NumericalFailure(
            "zero-variance series cannot drive an AR fit".into(),
        ));
    }

    // Levinson-Durbin recursion.
    let mut coeffs: Vec<f64> = Vec::with_capacity(order);
    let mut error = gamma[0];
    for k in 1..=order {
        let mut acc = gamma[k];
        for (j, a) in coeffs.iter().enumerate() {
            acc -= a * gamma[k - 1 - j];
        }
        let reflection = acc / error;
        let mut next = coeffs.clone();
        next.push(reflection);
        for j in 0..coeffs.len() {
            next[j] = coeffs[j] - reflection * coeffs[coeffs.len() - 1 - j];
        }
        coeffs = next;
        error *= 1.0 - reflection * reflection;
        if !(error > 0.0) {
            return Err(ForecastError::NumericalFailure(format!(
                "Levinson-Durbin breakdown at lag {k}"
            )));
        }
    }

    // Inverse filter: recover the modeling errors over the training span.
    let mean = z.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = z.iter().map(|v| v - mean).collect();
    let errors: Vec<f64> = (order..n)
        .map(|t| {
            let mut e = centered[t];
            for (j, a) in coeffs.iter().enumerate() {
                e -= a * centered[t - 1 - j];
            }
            e
        })
        .collect();

    // Reshape into whole seasons and take the overall sample deviation.
    let whole = (errors.len() / season_len) * season_len;
    let pool = if whole > 0 {
        &errors[errors.len() - whole..]
    } else {
        &errors[..]
    };
    let pool_mean = pool.iter().sum::<f64>() / pool.len() as f64;
    let sigma = (pool
        .iter()
        .map(|e| (e - pool_mean).powi(2))
        .sum::<f64>()
        / (pool.len() - 1) as f64)
        .sqrt();

    Ok(ArFit {
        order,
        coeffs,
        sigma,
        state: centered[n - order..].to_vec(),
    })
}

impl ArFit {
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Simulate one forward run of `steps` values (centered scale), starting
    /// from the fitted state, with fresh Gaussian excitations.
    pub fn simulate_run(&self, steps: usize, rng: &mut StdRng) -> Vec<f64> {
        let mut buffer = self.state.clone();
        let mut run = Vec::with_capacity(steps);
        for _ in 0..steps {
            let t = buffer.len();
            let mut value = self.sigma * rng.sample::<f64, _>(StandardNormal);
            for (j, a) in self.coeffs.iter().enumerate() {
                value += a * buffer[t - 1 - j];
            }
            buffer.push(value);
            run.push(value);
        }
        run
    }

    /// The mean that was removed before fitting must be restored by the
    /// caller; simulation runs live on the centered scale.
    pub fn state(&self) -> &[f64] {
        &self.state
    }
}
