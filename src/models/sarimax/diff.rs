//! Regular and seasonal differencing with invertible state.
//!
//! A `Differencer` applies `(1-B)^d (1-B^s)^D`, remembering each
//! intermediate series so forecasts on the differenced scale can be
//! integrated back without the caller tracking tails.

use crate::error::{ForecastError, Result};

#[derive(Debug, Clone)]
enum Stage {
    /// Regular difference; holds the series the stage consumed.
    Regular { prior: Vec<f64> },
    /// Seasonal difference at the given period.
    Seasonal { prior: Vec<f64>, period: usize },
}

/// Differencing operator with recorded state.
#[derive(Debug, Clone)]
pub struct Differencer {
    d: usize,
    cap_d: usize,
    period: usize,
    stages: Vec<Stage>,
}

impl Differencer {
    pub fn new(d: usize, cap_d: usize, period: usize) -> Self {
        Self {
            d,
            cap_d,
            period,
            stages: Vec::new(),
        }
    }

    /// Total observations consumed by the operator.
    pub fn loss(&self) -> usize {
        self.d + self.cap_d * self.period
    }

    /// Apply the operator, recording state for later integration.
    pub fn transform(&mut self, series: &[f64]) -> Result<Vec<f64>> {
        if series.len() <= self.loss() {
            return Err(ForecastError::InsufficientData {
                needed: self.loss() + 1,
                got: series.len(),
            });
        }
        self.stages.clear();
        let mut current = series.to_vec();
        for _ in 0..self.d {
            let next: Vec<f64> = current.windows(2).map(|w| w[1] - w[0]).collect();
            self.stages.push(Stage::Regular { prior: current });
            current = next;
        }
        for _ in 0..self.cap_d {
            let s = self.period;
            let next: Vec<f64> = (s..current.len())
                .map(|i| current[i] - current[i - s])
                .collect();
            self.stages.push(Stage::Seasonal {
                prior: current,
                period: s,
            });
            current = next;
        }
        Ok(current)
    }

    /// Integrate a forecast from the differenced scale back to the original,
    /// reversing the recorded stages.
    pub fn integrate(&self, forecast: &[f64]) -> Vec<f64> {
        let mut current = forecast.to_vec();
        for stage in self.stages.iter().rev() {
            match stage {
                Stage::Seasonal { prior, period } => {
                    let s = *period;
                    let mut integrated = Vec::with_capacity(current.len());
                    for (h, &value) in current.iter().enumerate() {
                        let anchor = if h < s {
                            prior[prior.len() - s + h]
                        } else {
                            integrated[h - s]
                        };
                        integrated.push(value + anchor);
                    }
                    current = integrated;
                }
                Stage::Regular { prior } => {
                    let mut acc = *prior.last().expect("transform rejected empty input");
                    for value in current.iter_mut() {
                        acc += *value;
                        *value = acc;
                    }
                }
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_when_orders_are_zero() {
        let mut diff = Differencer::new(0, 0, 52);
        let series = vec![1.0, 2.0, 3.0];
        assert_eq!(diff.transform(&series).unwrap(), series);
        assert_eq!(diff.integrate(&[4.0, 5.0]), vec![4.0, 5.0]);
    }

    #[test]
    fn regular_difference_and_integration_round_trip() {
        let mut diff = Differencer::new(1, 0, 52);
        let series = vec![10.0, 12.0, 15.0, 19.0, 24.0];
        let differenced = diff.transform(&series).unwrap();
        assert_eq!(differenced, vec![2.0, 3.0, 4.0, 5.0]);

        // Forecast differences continue the pattern.
        let restored = diff.integrate(&[6.0, 7.0]);
        assert_relative_eq!(restored[0], 30.0);
        assert_relative_eq!(restored[1], 37.0);
    }

    #[test]
    fn seasonal_difference_removes_stable_pattern() {
        let mut diff = Differencer::new(0, 1, 4);
        let series = vec![1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0];
        let differenced = diff.transform(&series).unwrap();
        assert_eq!(differenced, vec![0.0; 4]);

        // Zero forecast differences replay the last season.
        let restored = diff.integrate(&[0.0; 6]);
        assert_eq!(restored, vec![1.0, 2.0, 3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn combined_regular_and_seasonal_forecast_continuation() {
        let mut diff = Differencer::new(1, 1, 4);
        // Trend plus seasonal pattern: fully removed by (1-B)(1-B^4).
        let value = |i: usize| 0.5 * i as f64 + [0.0, 2.0, 1.0, -1.0][i % 4];
        let series: Vec<f64> = (0..16).map(value).collect();
        let differenced = diff.transform(&series).unwrap();
        assert_eq!(differenced.len(), 16 - 1 - 4);
        assert!(differenced.iter().all(|v| v.abs() < 1e-12));

        // Zero forecast differences must continue the trend and the season.
        let restored = diff.integrate(&[0.0; 6]);
        for (h, r) in restored.iter().enumerate() {
            assert_relative_eq!(*r, value(16 + h), epsilon = 1e-12);
        }
    }

    #[test]
    fn insufficient_length_rejected() {
        let mut diff = Differencer::new(1, 1, 52);
        assert!(matches!(
            diff.transform(&[1.0; 53]),
            Err(ForecastError::InsufficientData { .. })
        ));
        assert!(diff.transform(&[1.0; 54]).is_ok());
    }

    #[test]
    fn loss_counts_consumed_observations() {
        assert_eq!(Differencer::new(1, 1, 52).loss(), 53);
        assert_eq!(Differencer::new(2, 0, 52).loss(), 2);
        assert_eq!(Differencer::new(0, 2, 4).loss(), 8);
    }
}
