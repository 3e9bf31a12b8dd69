//! Confidence bounds for predictions

use crate::error::{ForecastError, Result};
use crate::models::PredictionPoint;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Supported confidence levels for prediction intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    #[serde(rename = "0.90")]
    Ninety,
    #[serde(rename = "0.95")]
    NinetyFive,
    #[serde(rename = "0.99")]
    NinetyNine,
}

impl ConfidenceLevel {
    /// Parse a numeric confidence level; only 0.90, 0.95 and 0.99 are
    /// accepted.
    pub fn from_f64(level: f64) -> Result<Self> {
        match level {
            l if (l - 0.90).abs() < 1e-9 => Ok(ConfidenceLevel::Ninety),
            l if (l - 0.95).abs() < 1e-9 => Ok(ConfidenceLevel::NinetyFive),
            l if (l - 0.99).abs() < 1e-9 => Ok(ConfidenceLevel::NinetyNine),
            other => Err(ForecastError::Validation(format!(
                "Confidence level must be one of 0.90, 0.95, 0.99; got {}",
                other
            ))),
        }
    }

    pub fn value(self) -> f64 {
        match self {
            ConfidenceLevel::Ninety => 0.90,
            ConfidenceLevel::NinetyFive => 0.95,
            ConfidenceLevel::NinetyNine => 0.99,
        }
    }

    /// Two-sided standard-normal quantile for this level
    /// (1.645 / 1.960 / 2.576)
    pub fn z_score(self) -> f64 {
        let normal = Normal::new(0.0, 1.0).expect("standard normal parameters are valid");
        normal.inverse_cdf(0.5 + self.value() / 2.0)
    }
}

/// Derives confidence bounds for point predictions.
///
/// Backends without native interval output get symmetric bounds at
/// `value ± z * residual_std` from the validation residual distribution.
/// Callers that skip intervals never touch residual statistics.
#[derive(Debug, Clone, Copy)]
pub struct UncertaintyEstimator;

impl UncertaintyEstimator {
    /// Symmetric residual-based bounds around each value
    pub fn residual_bounds(
        values: &[f64],
        residual_std: f64,
        level: ConfidenceLevel,
    ) -> Vec<(f64, f64)> {
        let margin = level.z_score() * residual_std;
        values.iter().map(|&v| (v - margin, v + margin)).collect()
    }

    /// Attach precomputed bounds to prediction points
    pub fn attach(points: &mut [PredictionPoint], bounds: &[(f64, f64)]) {
        for (point, &(lower, upper)) in points.iter_mut().zip(bounds.iter()) {
            point.lower_bound = Some(lower);
            point.upper_bound = Some(upper);
        }
    }
}
