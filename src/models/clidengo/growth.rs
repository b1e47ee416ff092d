//! Climate-modulated beta-logistic growth dynamics.
//!
//! Integrates `dC/dt = r_eff(t) * C^q * (1 - (C/K)^alpha)^p` over the weekly
//! grid, where `r_eff` is the baseline rate scaled by up to three Briere
//! suitability factors evaluated on normalized climate trajectories.

use crate::climate::{normalize_by_max, Briere};
use crate::error::{ForecastError, Result};

/// Growth parameters of a single realization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthParams {
    /// Baseline rate, in `[0, 5]`.
    pub r0: f64,
    /// Final size, in `[1, 5e5]`.
    pub k: f64,
    /// Initial-growth profile, in `[0, 1]`.
    pub q: f64,
    /// Late-time sharpness, in `[1, 10]`.
    pub p: f64,
    /// Asymmetry, in `[1, 2]`.
    pub alpha: f64,
}

impl GrowthParams {
    pub fn validate(&self) -> Result<()> {
        let in_range = (0.0..=5.0).contains(&self.r0)
            && (1.0..=5e5).contains(&self.k)
            && (0.0..=1.0).contains(&self.q)
            && (1.0..=10.0).contains(&self.p)
            && (1.0..=2.0).contains(&self.alpha);
        if in_range {
            Ok(())
        } else {
            Err(ForecastError::InvalidInput(format!(
                "growth parameters out of range: {self:?}"
            )))
        }
    }
}

/// Weekly integration grid: nodes `t = 1..=weeks`, `dt = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimGrid {
    pub weeks: usize,
}

impl SimGrid {
    pub fn new(weeks: usize) -> Self {
        Self { weeks }
    }
}

/// A suitability series on the weekly grid, normalized to `[0, 1]`, with
/// linear interpolation for sub-step solver samples.
#[derive(Debug, Clone)]
pub struct SuitabilitySeries {
    values: Vec<f64>,
}

impl SuitabilitySeries {
    /// Map a climate trajectory through the Briere response.
    ///
    /// Both the input trajectory and the response are scaled by their own
    /// maxima, so the series is invariant to the climate units.
    pub fn from_climate(briere: &Briere, trajectory: &[f64]) -> Result<Self> {
        if trajectory.is_empty() {
            return Err(ForecastError::InvalidInput(
                "empty climate trajectory".into(),
            ));
        }
        if trajectory.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::NonFinite("climate trajectory".into()));
        }
        let mut normalized = trajectory.to_vec();
        normalize_by_max(&mut normalized);
        let mut values = briere.eval_series(&normalized);
        normalize_by_max(&mut values);
        Ok(Self { values })
    }

    /// Constant suitability, for climate-mode factors switched off.
    pub fn constant(value: f64, weeks: usize) -> Self {
        Self {
            values: vec![value; weeks],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Linear interpolation at time `t` on the 1-based weekly grid; exact at
    /// integer nodes, clamped outside `[1, weeks]`.
    pub fn at(&self, t: f64) -> f64 {
        let n = self.values.len();
        if n == 1 {
            return self.values[0];
        }
        let clamped = t.clamp(1.0, n as f64);
        let idx = (clamped - 1.0).floor() as usize;
        if idx >= n - 1 {
            return self.values[n - 1];
        }
        let frac = clamped - 1.0 - idx as f64;
        self.values[idx] + frac * (self.values[idx + 1] - self.values[idx])
    }
}

/// Integrated path on the weekly grid.
#[derive(Debug, Clone)]
pub struct GrowthPath {
    /// Cumulative cases `C(t_k)`.
    pub cumulative: Vec<f64>,
    /// Right-hand side `dC(t_k)` at each node.
    pub incidence: Vec<f64>,
}

// Dormand-Prince 5(4) coefficients.
const A2: [f64; 1] = [1.0 / 5.0];
const A3: [f64; 2] = [3.0 / 40.0, 9.0 / 40.0];
const A4: [f64; 3] = [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0];
const A5: [f64; 4] = [
    19372.0 / 6561.0,
    -25360.0 / 2187.0,
    64448.0 / 6561.0,
    -212.0 / 729.0,
];
const A6: [f64; 5] = [
    9017.0 / 3168.0,
    -355.0 / 33.0,
    46732.0 / 5247.0,
    49.0 / 176.0,
    -5103.0 / 18656.0,
];
const B5: [f64; 6] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];
const B4: [f64; 7] = [
    5179.0 / 57600.0,
    0.0,
    7571.0 / 16695.0,
    393.0 / 640.0,
    -92097.0 / 339200.0,
    187.0 / 2100.0,
    1.0 / 40.0,
];
const C_NODES: [f64; 5] = [1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];

const RTOL: f64 = 1e-6;
const ATOL: f64 = 1e-9;
const MAX_STEPS_PER_WEEK: usize = 10_000;

/// Advance a scalar ODE from `t0` to `t1` with adaptive Dormand-Prince 5(4).
fn rk45_advance<F>(f: &F, t0: f64, t1: f64, y0: f64) -> Result<f64>
where
    F: Fn(f64, f64) -> f64,
{
    let mut t = t0;
    let mut y = y0;
    let mut h = t1 - t0;
    let mut steps = 0;

    while t < t1 {
        if t1 - t <= f64::EPSILON * t1.max(1.0) {
            break;
        }
        if steps > MAX_STEPS_PER_WEEK {
            return Err(ForecastError::IntegrationFailure(format!(
                "step limit exceeded near t = {t:.3}"
            )));
        }
        steps += 1;
        h = h.min(t1 - t);

        let k1 = f(t, y);
        let k2 = f(t + C_NODES[0] * h, y + h * A2[0] * k1);
        let k3 = f(t + C_NODES[1] * h, y + h * (A3[0] * k1 + A3[1] * k2));
        let k4 = f(
            t + C_NODES[2] * h,
            y + h * (A4[0] * k1 + A4[1] * k2 + A4[2] * k3),
        );
        let k5 = f(
            t + C_NODES[3] * h,
            y + h * (A5[0] * k1 + A5[1] * k2 + A5[2] * k3 + A5[3] * k4),
        );
        let k6 = f(
            t + C_NODES[4] * h,
            y + h * (A6[0] * k1 + A6[1] * k2 + A6[2] * k3 + A6[3] * k4 + A6[4] * k5),
        );

        let y5 = y + h * (B5[0] * k1 + B5[2] * k3 + B5[3] * k4 + B5[4] * k5 + B5[5] * k6);
        let k7 = f(t + h, y5);
        let y4 = y + h
            * (B4[0] * k1 + B4[2] * k3 + B4[3] * k4 + B4[4] * k5 + B4[5] * k6 + B4[6] * k7);

        if !y5.is_finite() || !y4.is_finite() {
            return Err(ForecastError::IntegrationFailure(format!(
                "non-finite state near t = {t:.3}"
            )));
        }

        let tol = ATOL + RTOL * y.abs().max(y5.abs());
        let err = (y5 - y4).abs();

        if err <= tol {
            t += h;
            y = y5;
        }
        let ratio = if err > 0.0 { tol / err } else { 10.0 };
        h *= (0.9 * ratio.powf(0.2)).clamp(0.2, 5.0);
        if h <= f64::EPSILON * t1 {
            return Err(ForecastError::IntegrationFailure(format!(
                "step underflow near t = {t:.3}"
            )));
        }
    }
    Ok(y)
}

/// Integrate one realization over the weekly grid.
///
/// Returns both the cumulative state and the right-hand side at each node.
/// The growth term clamps `1 - (C/K)^alpha` at zero so the state never
/// crosses the carrying capacity.
pub fn integrate_growth(
    params: &GrowthParams,
    forcing: &[SuitabilitySeries],
    c0: f64,
    grid: &SimGrid,
) -> Result<GrowthPath> {
    if grid.weeks == 0 {
        return Err(ForecastError::InvalidInput("empty simulation grid".into()));
    }
    for series in forcing {
        if series.len() != grid.weeks {
            return Err(ForecastError::ShapeMismatch {
                expected: grid.weeks,
                got: series.len(),
            });
        }
    }
    if !c0.is_finite() || c0 < 0.0 {
        return Err(ForecastError::InvalidInput(format!(
            "initial condition must be a non-negative finite value, got {c0}"
        )));
    }

    let rhs = |t: f64, c: f64| -> f64 {
        if c <= 0.0 {
            return 0.0;
        }
        let mut rate = params.r0;
        for series in forcing {
            rate *= series.at(t);
        }
        let saturation = (1.0 - (c / params.k).powf(params.alpha)).max(0.0);
        rate * c.powf(params.q) * saturation.powf(params.p)
    };

    let mut cumulative = Vec::with_capacity(grid.weeks);
    let mut incidence = Vec::with_capacity(grid.weeks);

    let mut state = c0;
    cumulative.push(state);
    incidence.push(rhs(1.0, state));
    for week in 1..grid.weeks {
        let t0 = week as f64;
        let t1 = t0 + 1.0;
        state = rk45_advance(&rhs, t0, t1, state)?;
        if !state.is_finite() {
            return Err(ForecastError::IntegrationFailure(format!(
                "non-finite state at week {}",
                week + 1
            )));
        }
        cumulative.push(state);
        incidence.push(rhs(t1, state));
    }

    Ok(GrowthPath {
        cumulative,
        incidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat_forcing(weeks: usize) -> Vec<SuitabilitySeries> {
        vec![SuitabilitySeries::constant(1.0, weeks)]
    }

    fn params() -> GrowthParams {
        GrowthParams {
            r0: 0.8,
            k: 1000.0,
            q: 1.0,
            p: 1.0,
            alpha: 1.0,
        }
    }

    #[test]
    fn parameter_ranges() {
        assert!(params().validate().is_ok());
        let mut bad = params();
        bad.r0 = 5.5;
        assert!(bad.validate().is_err());
        let mut bad = params();
        bad.alpha = 0.5;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn logistic_limit_matches_closed_form() {
        // q = p = alpha = 1 is plain logistic growth with rate r and
        // capacity K; compare against the analytic solution at t = 52.
        let grid = SimGrid::new(52);
        let p = params();
        let c0 = 10.0;
        let path = integrate_growth(&p, &flat_forcing(52), c0, &grid).unwrap();

        let t = 51.0; // elapsed time from the first node
        let expected = p.k / (1.0 + (p.k / c0 - 1.0) * (-p.r0 * t).exp());
        assert_relative_eq!(path.cumulative[51], expected, max_relative = 1e-4);
    }

    #[test]
    fn zero_suitability_freezes_the_state() {
        let grid = SimGrid::new(52);
        let forcing = vec![SuitabilitySeries::constant(0.0, 52)];
        let path = integrate_growth(&params(), &forcing, 25.0, &grid).unwrap();
        for (c, d) in path.cumulative.iter().zip(&path.incidence) {
            assert_relative_eq!(*c, 25.0, epsilon = 1e-9);
            assert_relative_eq!(*d, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn state_never_exceeds_capacity() {
        let grid = SimGrid::new(52);
        let mut p = params();
        p.r0 = 5.0;
        p.q = 0.9;
        p.alpha = 2.0;
        p.p = 1.5;
        let path = integrate_growth(&p, &flat_forcing(52), 900.0, &grid).unwrap();
        for c in &path.cumulative {
            assert!(*c <= p.k * (1.0 + 1e-9), "C = {c} exceeded K = {}", p.k);
        }
        // Monotone non-decreasing cumulative state.
        for w in path.cumulative.windows(2) {
            assert!(w[1] >= w[0] - 1e-9);
        }
    }

    #[test]
    fn incidence_is_rhs_at_nodes() {
        let grid = SimGrid::new(10);
        let p = params();
        let path = integrate_growth(&p, &flat_forcing(10), 10.0, &grid).unwrap();
        // At the first node the rhs is exactly r0 * C0 * (1 - C0/K).
        let expected = p.r0 * 10.0 * (1.0 - 10.0 / p.k);
        assert_relative_eq!(path.incidence[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn zero_initial_condition_stays_zero() {
        let grid = SimGrid::new(20);
        let path = integrate_growth(&params(), &flat_forcing(20), 0.0, &grid).unwrap();
        assert!(path.cumulative.iter().all(|c| *c == 0.0));
    }

    #[test]
    fn forcing_length_must_match_grid() {
        let grid = SimGrid::new(52);
        let forcing = vec![SuitabilitySeries::constant(1.0, 40)];
        assert!(matches!(
            integrate_growth(&params(), &forcing, 10.0, &grid),
            Err(ForecastError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn interpolation_is_exact_at_nodes_and_linear_between() {
        let series = SuitabilitySeries {
            values: vec![0.0, 1.0, 0.5],
        };
        assert_relative_eq!(series.at(1.0), 0.0);
        assert_relative_eq!(series.at(2.0), 1.0);
        assert_relative_eq!(series.at(3.0), 0.5);
        assert_relative_eq!(series.at(1.5), 0.5);
        assert_relative_eq!(series.at(2.5), 0.75);
        // Clamped outside the grid.
        assert_relative_eq!(series.at(0.0), 0.0);
        assert_relative_eq!(series.at(9.0), 0.5);
    }

    #[test]
    fn suitability_from_climate_is_normalized() {
        let briere = Briere::new(0.0, 1.0, 1.0).unwrap();
        let trajectory: Vec<f64> = (0..52)
            .map(|i| 20.0 + 8.0 * (2.0 * std::f64::consts::PI * i as f64 / 52.0).sin())
            .collect();
        let series = SuitabilitySeries::from_climate(&briere, &trajectory).unwrap();
        let max = series.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_relative_eq!(max, 1.0);
        assert!(series.values.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
