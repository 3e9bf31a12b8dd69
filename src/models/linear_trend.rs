//! Autoregressive linear-trend backend
//!
//! Fits an AR(p) structure on a d-times differenced series by ordinary
//! least squares and forecasts the full horizon directly by unrolling the
//! autoregression, re-integrating through the differencing levels.

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::metrics::{self, ModelMetrics};
use crate::models::{FittedModel, ForecastModel, Hyperparameters, ModelKind};
use crate::utils;
use serde::{Deserialize, Serialize};

/// Untrained AR configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTrendModel {
    ar_order: usize,
    difference_order: usize,
    validation_split: f64,
}

/// Prepared training data for the AR backend
#[derive(Debug, Clone)]
pub struct LinearTrendPrepared {
    values: Vec<f64>,
    split_at: usize,
}

/// Fitted AR state: coefficients over the differenced series plus an
/// intercept, and the validation residual spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedLinearTrend {
    ar_order: usize,
    difference_order: usize,
    /// AR coefficients for lags 1..=p, then the intercept
    coefficients: Vec<f64>,
    residual_std: f64,
}

impl LinearTrendModel {
    /// Build the backend from hyperparameters, validating ranges:
    /// `ar_order` in 1..=30 (default 7), `difference_order` in 0..=2
    /// (default 1), `validation_split` in (0, 1) (default 0.2).
    pub fn from_hyperparameters(hp: &Hyperparameters) -> Result<Self> {
        Ok(Self {
            ar_order: hp.usize_in_range("ar_order", 7, 1, 30)?,
            difference_order: hp.usize_in_range("difference_order", 1, 0, 2)?,
            validation_split: hp.validation_split()?,
        })
    }
}

impl ForecastModel for LinearTrendModel {
    type Prepared = LinearTrendPrepared;
    type Fitted = FittedLinearTrend;

    fn kind(&self) -> ModelKind {
        ModelKind::LinearTrend
    }

    fn prepare(&self, series: &TimeSeries) -> Result<LinearTrendPrepared> {
        let values = series.quantities();
        let split_at = utils::validation_split_index(values.len(), self.validation_split)?;
        Ok(LinearTrendPrepared { values, split_at })
    }

    fn train(&self, prepared: &LinearTrendPrepared) -> Result<(FittedLinearTrend, ModelMetrics)> {
        let p = self.ar_order;
        let d = self.difference_order;
        let train_values = &prepared.values[..prepared.split_at];
        let val_values = &prepared.values[prepared.split_at..];

        let diffed = difference(train_values, d);
        if diffed.len() < p + 1 {
            return Err(ForecastError::InsufficientData {
                required: p + d + 1,
                actual: train_values.len(),
            });
        }

        let mut design = Vec::with_capacity(diffed.len() - p);
        let mut targets = Vec::with_capacity(diffed.len() - p);
        for t in p..diffed.len() {
            let mut row = Vec::with_capacity(p + 1);
            for lag in 1..=p {
                row.push(diffed[t - lag]);
            }
            row.push(1.0);
            design.push(row);
            targets.push(diffed[t]);
        }

        // Tiny ridge keeps a constant (all-zero differenced) series solvable
        let coefficients = utils::solve_least_squares(&design, &targets, 1e-8, Some(p))?;

        let mut fitted = FittedLinearTrend {
            ar_order: p,
            difference_order: d,
            coefficients,
            residual_std: 0.0,
        };

        // Held-out tail validation: a genuine multi-step forecast from the
        // end of the training slice, compared against the unseen tail
        let val_forecast = fitted.forecast_values(train_values, val_values.len())?;
        let metrics = metrics::evaluate_forecast(val_values, &val_forecast)?;
        fitted.residual_std = metrics::residual_std(val_values, &val_forecast);

        Ok((fitted, metrics))
    }
}

impl FittedLinearTrend {
    /// Forecast `horizon` values following the end of `values`
    fn forecast_values(&self, values: &[f64], horizon: usize) -> Result<Vec<f64>> {
        let p = self.ar_order;
        let d = self.difference_order;

        if values.len() < p + d {
            return Err(ForecastError::InsufficientData {
                required: p + d,
                actual: values.len(),
            });
        }

        // Last value of each differencing level, for re-integration
        let mut level_last = Vec::with_capacity(d);
        let mut level = values.to_vec();
        for _ in 0..d {
            level_last.push(*level.last().unwrap_or(&0.0));
            level = difference(&level, 1);
        }

        let mut work = level; // the d-times differenced series
        let mut forecasts = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let intercept = self.coefficients[p];
            let mut next = intercept;
            for lag in 1..=p {
                next += self.coefficients[lag - 1] * work[work.len() - lag];
            }
            work.push(next);

            let mut value = next;
            for k in (0..d).rev() {
                value += level_last[k];
                level_last[k] = value;
            }
            forecasts.push(value);
        }

        Ok(forecasts)
    }
}

impl FittedModel for FittedLinearTrend {
    fn kind(&self) -> ModelKind {
        ModelKind::LinearTrend
    }

    fn predict(&self, context: &TimeSeries, horizon: usize) -> Result<Vec<f64>> {
        self.forecast_values(&context.quantities(), horizon)
    }

    fn evaluate(&self, series: &TimeSeries) -> Result<ModelMetrics> {
        let values = series.quantities();
        let warmup = self.ar_order + self.difference_order;
        if values.len() <= warmup {
            return Err(ForecastError::InsufficientData {
                required: warmup + 1,
                actual: values.len(),
            });
        }

        let mut predictions = Vec::with_capacity(values.len() - warmup);
        for t in warmup..values.len() {
            predictions.push(self.forecast_values(&values[..t], 1)?[0]);
        }
        metrics::evaluate_forecast(&values[warmup..], &predictions)
    }

    fn residual_std(&self) -> f64 {
        self.residual_std
    }
}

/// Iterated first differences
fn difference(values: &[f64], order: usize) -> Vec<f64> {
    let mut current = values.to_vec();
    for _ in 0..order {
        current = current.windows(2).map(|w| w[1] - w[0]).collect();
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic_history;
    use chrono::NaiveDate;

    fn series() -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        synthetic_history("SKU-1", start, 120, 7).unwrap()
    }

    #[test]
    fn test_train_and_forecast_direct_horizon() {
        let model = LinearTrendModel::from_hyperparameters(&Hyperparameters::new()).unwrap();
        let data = series();
        let prepared = model.prepare(&data).unwrap();
        let (fitted, metrics) = model.train(&prepared).unwrap();

        assert!(metrics.mae >= 0.0);
        assert!(metrics.r2 <= 1.0);

        let forecast = fitted.predict(&data, 14).unwrap();
        assert_eq!(forecast.len(), 14);
        assert!(forecast.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_difference_round_trip_levels() {
        let values = vec![1.0, 3.0, 6.0, 10.0];
        assert_eq!(difference(&values, 1), vec![2.0, 3.0, 4.0]);
        assert_eq!(difference(&values, 2), vec![1.0, 1.0]);
    }

    #[test]
    fn test_rejects_out_of_range_hyperparameters() {
        let hp = Hyperparameters::new().set("ar_order", 0u64);
        assert!(LinearTrendModel::from_hyperparameters(&hp).is_err());

        let hp = Hyperparameters::new().set("validation_split", 1.2);
        assert!(LinearTrendModel::from_hyperparameters(&hp).is_err());
    }

    #[test]
    fn test_short_context_fails() {
        let model = LinearTrendModel::from_hyperparameters(&Hyperparameters::new()).unwrap();
        let data = series();
        let prepared = model.prepare(&data).unwrap();
        let (fitted, _) = model.train(&prepared).unwrap();

        let short = data.head(3);
        assert!(matches!(
            fitted.predict(&short, 5),
            Err(ForecastError::InsufficientData { .. })
        ));
    }
}
