//! Box-constrained local minimization.
//!
//! A Nelder-Mead simplex search with every trial point projected back into
//! the feasible box. Bounds are mandatory: all callers in this crate minimize
//! over physically bounded parameters.

use crate::error::{ForecastError, Result};

/// Options for [`minimize_box`].
#[derive(Debug, Clone)]
pub struct MinimizeOptions {
    /// Iteration cap.
    pub max_iter: usize,
    /// Convergence tolerance on both the value spread and the simplex size.
    pub tolerance: f64,
    /// Initial simplex step as a fraction of each box width.
    pub step_fraction: f64,
}

impl Default for MinimizeOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tolerance: 1e-6,
            step_fraction: 0.10,
        }
    }
}

/// Outcome of a box-constrained minimization.
#[derive(Debug, Clone)]
pub struct MinimizeOutcome {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Midpoint of a box, the canonical initial guess.
pub fn midpoint(bounds: &[(f64, f64)]) -> Vec<f64> {
    bounds.iter().map(|(lo, hi)| 0.5 * (lo + hi)).collect()
}

fn project(point: &mut [f64], bounds: &[(f64, f64)]) {
    for (x, (lo, hi)) in point.iter_mut().zip(bounds) {
        *x = x.clamp(*lo, *hi);
    }
}

fn simplex_diameter(simplex: &[Vec<f64>]) -> f64 {
    let mut diam: f64 = 0.0;
    for v in &simplex[1..] {
        let d = v
            .iter()
            .zip(&simplex[0])
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt();
        diam = diam.max(d);
    }
    diam
}

/// Minimize `objective` over the box `bounds` starting from `start`.
///
/// Standard reflection/expansion/contraction/shrink moves with coefficients
/// (1, 2, 0.5, 0.5). Every candidate is clamped into the box before
/// evaluation, so the objective is never probed outside its domain.
pub fn minimize_box<F>(
    mut objective: F,
    bounds: &[(f64, f64)],
    start: &[f64],
    opts: &MinimizeOptions,
) -> Result<MinimizeOutcome>
where
    F: FnMut(&[f64]) -> f64,
{
    let n = bounds.len();
    if n == 0 || start.len() != n {
        return Err(ForecastError::ShapeMismatch {
            expected: n,
            got: start.len(),
        });
    }
    for (lo, hi) in bounds {
        if !(lo.is_finite() && hi.is_finite() && hi >= lo) {
            return Err(ForecastError::InvalidInput(
                "minimization bounds must be finite with hi >= lo".into(),
            ));
        }
    }

    // Initial simplex: the start plus one vertex stepped along each axis by a
    // fraction of the box width (stepping inward when at the upper face).
    let mut simplex = Vec::with_capacity(n + 1);
    let mut first = start.to_vec();
    project(&mut first, bounds);
    simplex.push(first);
    for i in 0..n {
        let (lo, hi) = bounds[i];
        let width = hi - lo;
        let step = if width > 0.0 {
            opts.step_fraction * width
        } else {
            0.0
        };
        let mut vertex = simplex[0].clone();
        vertex[i] = if vertex[i] + step <= hi {
            vertex[i] + step
        } else {
            vertex[i] - step
        };
        project(&mut vertex, bounds);
        simplex.push(vertex);
    }

    let mut values: Vec<f64> = simplex.iter().map(|v| objective(v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < opts.max_iter {
        iterations += 1;

        // Order so that simplex[0] is best and simplex[n] is worst.
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| {
            values[a]
                .partial_cmp(&values[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let reordered: Vec<Vec<f64>> = order.iter().map(|&i| simplex[i].clone()).collect();
        let reordered_vals: Vec<f64> = order.iter().map(|&i| values[i]).collect();
        simplex = reordered;
        values = reordered_vals;

        if values[n] - values[0] < opts.tolerance || simplex_diameter(&simplex) < opts.tolerance {
            converged = true;
            break;
        }

        // Centroid of all but the worst vertex.
        let mut centroid = vec![0.0; n];
        for v in &simplex[..n] {
            for (c, x) in centroid.iter_mut().zip(v) {
                *c += x;
            }
        }
        for c in &mut centroid {
            *c /= n as f64;
        }

        let blend = |a: &[f64], b: &[f64], t: f64| -> Vec<f64> {
            let mut out: Vec<f64> =
                a.iter().zip(b).map(|(x, y)| x + t * (y - x)).collect();
            project(&mut out, bounds);
            out
        };

        // Reflection.
        let reflected = blend(&centroid, &simplex[n], -1.0);
        let f_reflected = objective(&reflected);

        if f_reflected < values[0] {
            // Expansion.
            let expanded = blend(&centroid, &reflected, 2.0);
            let f_expanded = objective(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        // Contraction toward the better of worst/reflected.
        let (anchor, f_anchor) = if f_reflected < values[n] {
            (reflected.clone(), f_reflected)
        } else {
            (simplex[n].clone(), values[n])
        };
        let contracted = blend(&centroid, &anchor, 0.5);
        let f_contracted = objective(&contracted);
        if f_contracted < f_anchor {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        // Shrink toward the best vertex.
        let best = simplex[0].clone();
        for i in 1..=n {
            let mut v = blend(&best, &simplex[i], 0.5);
            project(&mut v, bounds);
            values[i] = objective(&v);
            simplex[i] = v;
        }
    }

    let best = values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);

    Ok(MinimizeOutcome {
        point: simplex[best].clone(),
        value: values[best],
        iterations,
        converged,
    })
}
