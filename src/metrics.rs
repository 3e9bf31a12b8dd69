//! Accuracy metrics for forecast evaluation

use crate::error::{ForecastError, Result};
use crate::utils;
use serde::{Deserialize, Serialize};

/// Validation metrics for a trained model. Always derived from held-out
/// data, never user-supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error, in percent
    pub mape: f64,
    /// Coefficient of determination (at most 1, can be negative)
    pub r2: f64,
    /// Percentage of actuals falling inside predicted intervals, when
    /// intervals were evaluated
    pub coverage: Option<f64>,
}

impl std::fmt::Display for ModelMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Model Metrics:")?;
        writeln!(f, "  MAE:  {:.4}", self.mae)?;
        writeln!(f, "  RMSE: {:.4}", self.rmse)?;
        writeln!(f, "  MAPE: {:.4}%", self.mape)?;
        writeln!(f, "  R2:   {:.4}", self.r2)?;
        if let Some(coverage) = self.coverage {
            writeln!(f, "  Coverage: {:.2}%", coverage)?;
        }
        Ok(())
    }
}

/// MAPE with zero-actual points excluded from the aggregate, alongside the
/// count of excluded points. An all-zero actual series yields a MAPE of 0.
pub fn mape_excluding_zeros(actual: &[f64], predicted: &[f64]) -> (f64, usize) {
    let mut sum = 0.0;
    let mut counted = 0usize;
    let mut excluded = 0usize;
    for (&a, &p) in actual.iter().zip(predicted.iter()) {
        if a == 0.0 {
            excluded += 1;
        } else {
            sum += ((a - p) / a).abs() * 100.0;
            counted += 1;
        }
    }
    let mape = if counted > 0 { sum / counted as f64 } else { 0.0 };
    (mape, excluded)
}

/// Compare predictions against actual values and compute the full metric
/// set. Both slices must have the same non-zero length.
pub fn evaluate_forecast(actual: &[f64], predicted: &[f64]) -> Result<ModelMetrics> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(ForecastError::Validation(
            "Actual and predicted values must have the same non-zero length".to_string(),
        ));
    }

    let n = actual.len() as f64;
    let errors: Vec<f64> = actual
        .iter()
        .zip(predicted.iter())
        .map(|(&a, &p)| a - p)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let rmse = (errors.iter().map(|e| e.powi(2)).sum::<f64>() / n).sqrt();
    let (mape, _) = mape_excluding_zeros(actual, predicted);

    let actual_mean = utils::mean(actual);
    let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|&a| (a - actual_mean).powi(2)).sum();
    // A constant actual series makes R2 undefined; report 0
    let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    Ok(ModelMetrics {
        mae,
        rmse,
        mape,
        r2,
        coverage: None,
    })
}

/// Percentage of actual values falling within `[lower, upper]`
pub fn coverage(actual: &[f64], lower: &[f64], upper: &[f64]) -> Result<f64> {
    if actual.len() != lower.len() || actual.len() != upper.len() || actual.is_empty() {
        return Err(ForecastError::Validation(
            "Actual values and bounds must have the same non-zero length".to_string(),
        ));
    }

    let inside = actual
        .iter()
        .zip(lower.iter().zip(upper.iter()))
        .filter(|(&a, (&lo, &hi))| a >= lo && a <= hi)
        .count();
    Ok(inside as f64 / actual.len() as f64 * 100.0)
}

/// Population standard deviation of the residuals `actual - predicted`
pub fn residual_std(actual: &[f64], predicted: &[f64]) -> f64 {
    let residuals: Vec<f64> = actual
        .iter()
        .zip(predicted.iter())
        .map(|(&a, &p)| a - p)
        .collect();
    utils::std_dev(&residuals)
}
