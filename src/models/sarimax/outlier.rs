//! Additive-outlier screening for intervention dummies.
//!
//! Flags observations whose seasonally differenced value is extreme under a
//! modified z-score (median / MAD), and builds one indicator regressor per
//! flagged week. Disabled by default in the forecaster configuration.

use crate::utils::stats::median;

/// Modified z-score threshold; the conventional cut for MAD-based screens.
const DEFAULT_THRESHOLD: f64 = 3.5;

/// Cap on the number of intervention dummies added to the regressor set.
const MAX_DUMMIES: usize = 3;

/// Detected additive outliers, strongest first.
#[derive(Debug, Clone)]
pub struct OutlierScreen {
    pub indices: Vec<usize>,
    pub scores: Vec<f64>,
}

/// Screen a series for additive outliers on the seasonally differenced
/// scale.
pub fn screen_additive_outliers(values: &[f64], period: usize) -> OutlierScreen {
    if values.len() <= period {
        return OutlierScreen {
            indices: vec![],
            scores: vec![],
        };
    }

    let differenced: Vec<f64> = (period..values.len())
        .map(|t| values[t] - values[t - period])
        .collect();
    let center = median(&differenced);
    let deviations: Vec<f64> = differenced.iter().map(|v| (v - center).abs()).collect();
    let mad = median(&deviations);
    if !(mad > 0.0) {
        return OutlierScreen {
            indices: vec![],
            scores: vec![],
        };
    }

    let mut flagged: Vec<(usize, f64)> = differenced
        .iter()
        .enumerate()
        .filter_map(|(i, v)| {
            let score = 0.6745 * (v - center).abs() / mad;
            if score > DEFAULT_THRESHOLD {
                Some((i + period, score))
            } else {
                None
            }
        })
        .collect();
    flagged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    flagged.truncate(MAX_DUMMIES);

    OutlierScreen {
        indices: flagged.iter().map(|(i, _)| *i).collect(),
        scores: flagged.iter().map(|(_, s)| *s).collect(),
    }
}

/// Build indicator regressor columns for the flagged weeks, extended with
/// zeros over the forecast horizon by the caller.
pub fn intervention_dummies(n: usize, indices: &[usize]) -> Vec<Vec<f64>> {
    indices
        .iter()
        .map(|&idx| {
            let mut column = vec![0.0; n];
            if idx < n {
                column[idx] = 1.0;
            }
            column
        })
        .collect()
}
