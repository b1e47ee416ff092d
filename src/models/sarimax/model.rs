//! Seasonal ARIMA with exogenous regressors.
//!
//! Regression with SARIMA errors, estimated by conditional least squares:
//! the noise series `y - X b` is differenced, a multiplicative seasonal
//! ARMA is fitted to it, and all parameters (regression coefficients
//! included) are optimized jointly. Forecast standard errors come from the
//! psi-weight expansion of the full lag polynomial, differencing operators
//! included.

use crate::config::SarimaxOrders;
use crate::error::{ForecastError, Result};
use crate::models::sarimax::diff::Differencer;
use crate::utils::linalg::max_companion_root_modulus;
use crate::utils::minimize::{minimize_box, MinimizeOptions};
use tracing::debug;

/// Polynomial product; index = lag, entry = coefficient.
fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// AR-side polynomial `1 - c_1 B^stride - ... - c_k B^(k stride)`.
fn ar_poly(coeffs: &[f64], stride: usize) -> Vec<f64> {
    let mut out = vec![0.0; coeffs.len() * stride + 1];
    out[0] = 1.0;
    for (i, c) in coeffs.iter().enumerate() {
        out[(i + 1) * stride] = -c;
    }
    out
}

/// MA-side polynomial `1 + c_1 B^stride + ... + c_k B^(k stride)`.
fn ma_poly(coeffs: &[f64], stride: usize) -> Vec<f64> {
    let mut out = vec![0.0; coeffs.len() * stride + 1];
    out[0] = 1.0;
    for (i, c) in coeffs.iter().enumerate() {
        out[(i + 1) * stride] = *c;
    }
    out
}

/// `(1 - B^stride)^order`.
fn diff_poly(order: usize, stride: usize) -> Vec<f64> {
    let mut out = vec![1.0];
    let factor = ar_poly(&[1.0], stride);
    for _ in 0..order {
        out = poly_mul(&out, &factor);
    }
    out
}

/// Psi weights of `A(B) y = M(B) e` up to `count` terms.
fn psi_weights(full_ar: &[f64], full_ma: &[f64], count: usize) -> Vec<f64> {
    let mut psi = vec![0.0; count];
    if count == 0 {
        return psi;
    }
    psi[0] = 1.0;
    for j in 1..count {
        let mut value = if j < full_ma.len() { full_ma[j] } else { 0.0 };
        for i in 1..full_ar.len().min(j + 1) {
            value -= full_ar[i] * psi[j - i];
        }
        psi[j] = value;
    }
    psi
}

/// Fitted SARIMAX model.
#[derive(Debug, Clone)]
pub struct SarimaxModel {
    orders: SarimaxOrders,
    period: usize,
    beta: Vec<f64>,
    intercept: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    sar: Vec<f64>,
    sma: Vec<f64>,
    sigma2: f64,
    aic: f64,
    differencer: Differencer,
    diff_noise: Vec<f64>,
    residuals: Vec<f64>,
}

struct CssContext<'a> {
    orders: &'a SarimaxOrders,
    period: usize,
}

impl CssContext<'_> {
    fn start(&self) -> usize {
        let o = self.orders;
        let s = self.period;
        let max_ar = if o.cap_p > 0 { o.p + o.cap_p * s } else { o.p };
        let max_ma = if o.cap_q > 0 { o.q + o.cap_q * s } else { o.q };
        max_ar.max(max_ma)
    }

    /// One-step predictions on the differenced scale; returns residuals and
    /// the conditional sum of squares.
    fn residuals(
        &self,
        series: &[f64],
        intercept: f64,
        ar: &[f64],
        ma: &[f64],
        sar: &[f64],
        sma: &[f64],
    ) -> (Vec<f64>, f64) {
        let n = series.len();
        let s = self.period;
        let start = self.start();
        let mut residuals = vec![0.0; n];
        let mut css = 0.0;

        for t in start..n {
            let mut pred = intercept;
            for (i, phi) in ar.iter().enumerate() {
                pred += phi * series[t - (i + 1)];
            }
            for (j, sphi) in sar.iter().enumerate() {
                let lag = (j + 1) * s;
                if t >= lag {
                    pred += sphi * series[t - lag];
                }
            }
            // Multiplicative interaction of the two AR factors.
            for (i, phi) in ar.iter().enumerate() {
                for (j, sphi) in sar.iter().enumerate() {
                    let lag = (i + 1) + (j + 1) * s;
                    if t >= lag {
                        pred -= phi * sphi * series[t - lag];
                    }
                }
            }
            for (i, theta) in ma.iter().enumerate() {
                pred += theta * residuals[t - (i + 1)];
            }
            for (j, stheta) in sma.iter().enumerate() {
                let lag = (j + 1) * s;
                if t >= lag {
                    pred += stheta * residuals[t - lag];
                }
            }
            for (i, theta) in ma.iter().enumerate() {
                for (j, stheta) in sma.iter().enumerate() {
                    let lag = (i + 1) + (j + 1) * s;
                    if t >= lag {
                        pred += theta * stheta * residuals[t - lag];
                    }
                }
            }

            let error = series[t] - pred;
            residuals[t] = error;
            css += error * error;
        }
        (residuals, css)
    }
}

impl SarimaxModel {
    /// Fit to `y` with regressor columns `xreg` (possibly empty).
    pub fn fit(
        y: &[f64],
        xreg: &[Vec<f64>],
        orders: SarimaxOrders,
        period: usize,
    ) -> Result<Self> {
        let n = y.len();
        for column in xreg {
            if column.len() != n {
                return Err(ForecastError::ShapeMismatch {
                    expected: n,
                    got: column.len(),
                });
            }
        }
        if y.iter().any(|v| !v.is_finite())
            || xreg.iter().flatten().any(|v| !v.is_finite())
        {
            return Err(ForecastError::NonFinite("sarimax input".into()));
        }

        let context = CssContext {
            orders: &orders,
            period,
        };
        let loss = orders.d + orders.cap_d * period;
        let min_len = loss + context.start() + 4;
        if n < min_len {
            return Err(ForecastError::InsufficientData {
                needed: min_len,
                got: n,
            });
        }

        let n_x = xreg.len();
        let n_coeffs = orders.p + orders.q + orders.cap_p + orders.cap_q;
        let n_params = n_x + 1 + n_coeffs;

        // Parameter packing: [beta..., intercept, ar, ma, sar, sma].
        let mut bounds = Vec::with_capacity(n_params);
        for _ in 0..n_x {
            bounds.push((-50.0, 50.0));
        }
        bounds.push((-50.0, 50.0));
        for _ in 0..n_coeffs {
            bounds.push((-0.99, 0.99));
        }

        let mut initial = vec![0.0; n_params];
        {
            // Start the intercept at the differenced-noise mean under b = 0.
            let mut scratch = Differencer::new(orders.d, orders.cap_d, period);
            let differenced = scratch.transform(y)?;
            initial[n_x] =
                differenced.iter().sum::<f64>() / differenced.len() as f64;
        }
        for i in 0..n_coeffs {
            initial[n_x + 1 + i] = 0.1 / (i + 1) as f64;
        }

        let unpack = |params: &[f64]| -> (Vec<f64>, f64, Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
            let beta = params[..n_x].to_vec();
            let intercept = params[n_x];
            let mut idx = n_x + 1;
            let ar = params[idx..idx + orders.p].to_vec();
            idx += orders.p;
            let ma = params[idx..idx + orders.q].to_vec();
            idx += orders.q;
            let sar = params[idx..idx + orders.cap_p].to_vec();
            idx += orders.cap_p;
            let sma = params[idx..idx + orders.cap_q].to_vec();
            (beta, intercept, ar, ma, sar, sma)
        };

        let objective = |params: &[f64]| -> f64 {
            let (beta, intercept, ar, ma, sar, sma) = unpack(params);
            let noise: Vec<f64> = y
                .iter()
                .enumerate()
                .map(|(t, value)| {
                    let mut v = *value;
                    for (b, column) in beta.iter().zip(xreg) {
                        v -= b * column[t];
                    }
                    v
                })
                .collect();
            let mut differencer = Differencer::new(orders.d, orders.cap_d, period);
            let differenced = match differencer.transform(&noise) {
                Ok(series) => series,
                Err(_) => return f64::MAX,
            };
            let (_, css) = context.residuals(&differenced, intercept, &ar, &ma, &sar, &sma);
            if css.is_finite() {
                css
            } else {
                f64::MAX
            }
        };

        let opts = MinimizeOptions {
            max_iter: 2000,
            tolerance: 1e-8,
            ..Default::default()
        };
        let outcome = minimize_box(objective, &bounds, &initial, &opts)?;
        debug!(
            css = outcome.value,
            iterations = outcome.iterations,
            "sarimax css optimized"
        );

        let (beta, intercept, ar, ma, sar, sma) = unpack(&outcome.point);

        // Rebuild the fitted state with the optimal parameters.
        let noise: Vec<f64> = y
            .iter()
            .enumerate()
            .map(|(t, value)| {
                let mut v = *value;
                for (b, column) in beta.iter().zip(xreg) {
                    v -= b * column[t];
                }
                v
            })
            .collect();
        let mut differencer = Differencer::new(orders.d, orders.cap_d, period);
        let diff_noise = differencer.transform(&noise)?;
        let (residuals, css) = context.residuals(&diff_noise, intercept, &ar, &ma, &sar, &sma);

        let start = context.start();
        let n_eff = diff_noise.len().saturating_sub(start);
        if n_eff == 0 {
            return Err(ForecastError::InsufficientData {
                needed: start + 1,
                got: diff_noise.len(),
            });
        }
        let sigma2 = css / n_eff as f64;
        let k = n_params as f64;
        let ll = -0.5
            * n_eff as f64
            * (1.0 + sigma2.max(1e-300).ln() + (2.0 * std::f64::consts::PI).ln());
        let aic = -2.0 * ll + 2.0 * k;

        let model = Self {
            orders,
            period,
            beta,
            intercept,
            ar,
            ma,
            sar,
            sma,
            sigma2,
            aic,
            differencer,
            diff_noise,
            residuals,
        };
        model.verify_roots()?;
        Ok(model)
    }

    /// Reject non-stationary AR or non-invertible MA polynomials.
    fn verify_roots(&self) -> Result<()> {
        let full_ar = poly_mul(&ar_poly(&self.ar, 1), &ar_poly(&self.sar, self.period));
        let phi: Vec<f64> = full_ar[1..].iter().map(|a| -a).collect();
        if max_companion_root_modulus(&phi) >= 1.0 {
            return Err(ForecastError::ModelFit(
                "fitted AR polynomial is non-stationary".into(),
            ));
        }
        let full_ma = poly_mul(&ma_poly(&self.ma, 1), &ma_poly(&self.sma, self.period));
        let theta: Vec<f64> = full_ma[1..].iter().map(|m| -m).collect();
        if max_companion_root_modulus(&theta) >= 1.0 {
            return Err(ForecastError::ModelFit(
                "fitted MA polynomial is non-invertible".into(),
            ));
        }
        Ok(())
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    pub fn orders(&self) -> SarimaxOrders {
        self.orders
    }

    /// Forecast means and standard errors on the modeling scale.
    ///
    /// `xreg_future` must carry one column per fitted regressor, each of
    /// length `horizon`.
    pub fn forecast(&self, horizon: usize, xreg_future: &[Vec<f64>]) -> Result<(Vec<f64>, Vec<f64>)> {
        if xreg_future.len() != self.beta.len() {
            return Err(ForecastError::ShapeMismatch {
                expected: self.beta.len(),
                got: xreg_future.len(),
            });
        }
        for column in xreg_future {
            if column.len() != horizon {
                return Err(ForecastError::ShapeMismatch {
                    expected: horizon,
                    got: column.len(),
                });
            }
        }
        if horizon == 0 {
            return Ok((vec![], vec![]));
        }

        let s = self.period;
        let mut extended = self.diff_noise.clone();
        let mut extended_residuals = self.residuals.clone();

        for _ in 0..horizon {
            let t = extended.len();
            let r = extended_residuals.len();
            let mut pred = self.intercept;
            for (i, phi) in self.ar.iter().enumerate() {
                let lag = i + 1;
                if t >= lag {
                    pred += phi * extended[t - lag];
                }
            }
            for (j, sphi) in self.sar.iter().enumerate() {
                let lag = (j + 1) * s;
                if t >= lag {
                    pred += sphi * extended[t - lag];
                }
            }
            for (i, phi) in self.ar.iter().enumerate() {
                for (j, sphi) in self.sar.iter().enumerate() {
                    let lag = (i + 1) + (j + 1) * s;
                    if t >= lag {
                        pred -= phi * sphi * extended[t - lag];
                    }
                }
            }
            for (i, theta) in self.ma.iter().enumerate() {
                let lag = i + 1;
                if r >= lag {
                    pred += theta * extended_residuals[r - lag];
                }
            }
            for (j, stheta) in self.sma.iter().enumerate() {
                let lag = (j + 1) * s;
                if r >= lag {
                    pred += stheta * extended_residuals[r - lag];
                }
            }
            for (i, theta) in self.ma.iter().enumerate() {
                for (j, stheta) in self.sma.iter().enumerate() {
                    let lag = (i + 1) + (j + 1) * s;
                    if r >= lag {
                        pred += theta * stheta * extended_residuals[r - lag];
                    }
                }
            }
            extended.push(pred);
            extended_residuals.push(0.0);
        }

        let forecast_diff = &extended[self.diff_noise.len()..];
        let noise_forecast = self.differencer.integrate(forecast_diff);

        let mean: Vec<f64> = noise_forecast
            .iter()
            .enumerate()
            .map(|(h, value)| {
                let mut v = *value;
                for (b, column) in self.beta.iter().zip(xreg_future) {
                    v += b * column[h];
                }
                v
            })
            .collect();

        // Forecast-error variance via the psi weights of the full operator,
        // differencing included.
        let full_ar = poly_mul(
            &poly_mul(&ar_poly(&self.ar, 1), &ar_poly(&self.sar, self.period)),
            &poly_mul(
                &diff_poly(self.orders.d, 1),
                &diff_poly(self.orders.cap_d, self.period),
            ),
        );
        let full_ma = poly_mul(&ma_poly(&self.ma, 1), &ma_poly(&self.sma, self.period));
        let psi = psi_weights(&full_ar, &full_ma, horizon);

        let mut cumulative = 0.0;
        let se: Vec<f64> = psi
            .iter()
            .map(|w| {
                cumulative += w * w;
                (self.sigma2 * cumulative).sqrt()
            })
            .collect();

        for value in mean.iter().chain(&se) {
            if !value.is_finite() {
                return Err(ForecastError::NonFinite("sarimax forecast".into()));
            }
        }
        Ok((mean, se))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn poly_helpers() {
        // (1 - 0.5B)(1 - B) = 1 - 1.5B + 0.5B^2.
        let product = poly_mul(&ar_poly(&[0.5], 1), &diff_poly(1, 1));
        assert_relative_eq!(product[0], 1.0);
        assert_relative_eq!(product[1], -1.5);
        assert_relative_eq!(product[2], 0.5);

        // Seasonal stride embeds the gap.
        let seasonal = ar_poly(&[0.3], 4);
        assert_eq!(seasonal.len(), 5);
        assert_relative_eq!(seasonal[4], -0.3);
    }

    #[test]
    fn psi_weights_random_walk() {
        // ARIMA(0,1,0): psi_j = 1 for all j, so variance grows linearly.
        let full_ar = diff_poly(1, 1);
        let psi = psi_weights(&full_ar, &[1.0], 6);
        for w in &psi {
            assert_relative_eq!(*w, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn psi_weights_ar1() {
        // AR(1) with phi = 0.5: psi_j = 0.5^j.
        let psi = psi_weights(&ar_poly(&[0.5], 1), &[1.0], 5);
        for (j, w) in psi.iter().enumerate() {
            assert_relative_eq!(*w, 0.5_f64.powi(j as i32), epsilon = 1e-12);
        }
    }

    fn ar1_series(n: usize, phi: f64) -> Vec<f64> {
        let mut y = vec![5.0];
        for t in 1..n {
            let shock = ((t as f64 * 12.9898).sin() * 43758.5453).fract() - 0.5;
            y.push(phi * y[t - 1] + shock);
        }
        y
    }

    #[test]
    fn fits_ar1_sign_and_scale() {
        let y = ar1_series(300, 0.7);
        let model = SarimaxModel::fit(&y, &[], SarimaxOrders::new(1, 0, 0, 0, 0, 0), 1).unwrap();
        assert!(
            model.ar[0] > 0.4 && model.ar[0] < 0.95,
            "phi = {}",
            model.ar[0]
        );
    }

    #[test]
    fn recovers_regression_coefficient() {
        let n = 240;
        let x: Vec<f64> = (0..n).map(|t| (t as f64 * 0.23).sin()).collect();
        let noise = ar1_series(n, 0.4);
        let y: Vec<f64> = (0..n).map(|t| 2.0 * x[t] + 0.3 * noise[t]).collect();
        let model = SarimaxModel::fit(
            &y,
            &[x.clone()],
            SarimaxOrders::new(1, 0, 0, 0, 0, 0),
            1,
        )
        .unwrap();
        assert!(
            (model.beta()[0] - 2.0).abs() < 0.3,
            "beta = {}",
            model.beta()[0]
        );
    }

    #[test]
    fn forecast_shapes_and_growing_se() {
        let y = ar1_series(200, 0.6);
        let model = SarimaxModel::fit(&y, &[], SarimaxOrders::new(1, 1, 1, 0, 0, 0), 1).unwrap();
        let (mean, se) = model.forecast(12, &[]).unwrap();
        assert_eq!(mean.len(), 12);
        assert_eq!(se.len(), 12);
        assert_relative_eq!(se[0], model.sigma2().sqrt(), epsilon = 1e-9);
        for w in se.windows(2) {
            assert!(w[1] >= w[0] - 1e-12, "se must be non-decreasing");
        }
    }

    #[test]
    fn seasonal_fit_replays_pattern() {
        let period = 12;
        let n = 8 * period;
        let y: Vec<f64> = (0..n)
            .map(|t| {
                10.0 + 3.0 * (2.0 * std::f64::consts::PI * (t % period) as f64 / period as f64).sin()
            })
            .collect();
        let model = SarimaxModel::fit(
            &y,
            &[],
            SarimaxOrders::new(1, 0, 1, 0, 1, 1),
            period,
        )
        .unwrap();
        let (mean, _) = model.forecast(period, &[]).unwrap();
        for (h, value) in mean.iter().enumerate() {
            let expected = 10.0
                + 3.0
                    * (2.0 * std::f64::consts::PI * ((n + h) % period) as f64 / period as f64)
                        .sin();
            assert!(
                (value - expected).abs() < 0.8,
                "week {h}: {value} vs {expected}"
            );
        }
    }

    #[test]
    fn xreg_columns_must_match_length() {
        let y = vec![1.0; 50];
        let x = vec![1.0; 40];
        assert!(SarimaxModel::fit(&y, &[x], SarimaxOrders::default(), 52).is_err());
    }

    #[test]
    fn forecast_requires_future_regressors() {
        let y = ar1_series(200, 0.5);
        let x: Vec<f64> = (0..200).map(|t| (t as f64 * 0.1).cos()).collect();
        let model = SarimaxModel::fit(
            &y,
            &[x],
            SarimaxOrders::new(1, 0, 0, 0, 0, 0),
            1,
        )
        .unwrap();
        assert!(model.forecast(5, &[]).is_err());
        assert!(model.forecast(5, &[vec![0.0; 4]]).is_err());
        assert!(model.forecast(5, &[vec![0.0; 5]]).is_ok());
    }

    #[test]
    fn insufficient_data_rejected() {
        let y = vec![1.0; 60];
        assert!(matches!(
            SarimaxModel::fit(&y, &[], SarimaxOrders::default(), 52),
            Err(ForecastError::InsufficientData { .. })
        ));
    }
}
