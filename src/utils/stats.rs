//! Statistical primitives: moments, percentiles, autocovariance.

/// Mean of a slice. NaN for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n-1 denominator). NaN for fewer than two values.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Coefficient of variation: std / mean over the whole slice.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    std_dev(values) / mean(values)
}

/// Percentile with midpoint plotting positions and linear interpolation.
///
/// Sorted values are placed at positions `100 * (i - 0.5) / n`; queries
/// outside the position range clamp to the extreme order statistics. This
/// matches the convention the rest of the quantile pipeline is calibrated
/// against.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }

    let rank = p / 100.0 * n as f64 - 0.5;
    if rank <= 0.0 {
        return sorted[0];
    }
    if rank >= (n - 1) as f64 {
        return sorted[n - 1];
    }
    let lo = rank.floor() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + frac * (sorted[lo + 1] - sorted[lo])
}

/// Median (50th percentile).
pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Sample autocovariance sequence up to `max_lag` inclusive.
///
/// `gamma[h] = (1 / (n - h)) * sum_t (x[t+h] - mu) * (x[t] - mu)`.
pub fn autocovariance(values: &[f64], max_lag: usize) -> Vec<f64> {
    let n = values.len();
    let mu = mean(values);
    let mut gamma = Vec::with_capacity(max_lag + 1);
    for h in 0..=max_lag {
        if h >= n {
            gamma.push(0.0);
            continue;
        }
        let mut acc = 0.0;
        for t in 0..n - h {
            acc += (values[t + h] - mu) * (values[t] - mu);
        }
        gamma.push(acc / (n - h) as f64);
    }
    gamma
}

/// Standard normal quantile, Abramowitz and Stegun 26.2.23.
///
/// Accurate to about 4.5e-4; the SARIMAX interval path uses the exact
/// statrs inverse CDF instead.
pub fn quantile_normal(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let (tail, sign) = if p < 0.5 { (p, -1.0) } else { (1.0 - p, 1.0) };
    let t = (-2.0 * tail.ln()).sqrt();

    let num = 2.515517 + t * (0.802853 + t * 0.010328);
    let den = 1.0 + t * (1.432788 + t * (0.189269 + t * 0.001308));
    sign * (t - num / den)
}
