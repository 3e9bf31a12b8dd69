//! Recurrent-sequence backend
//!
//! Operates on fixed-length windows of min-max scaled features and learns a
//! one-step-ahead predictor with closed-form ridge regression over the
//! flattened window. Multi-step horizons are driven by the
//! [`RecursiveForecaster`](crate::forecaster::RecursiveForecaster).

use crate::data::{TimeSeries, FEATURE_COLUMNS, TARGET_FEATURE};
use crate::error::{ForecastError, Result};
use crate::forecaster::{OneStepPredictor, RecursiveForecaster};
use crate::metrics::{self, ModelMetrics};
use crate::models::{FittedModel, ForecastModel, Hyperparameters, ModelKind};
use crate::preprocess::{MinMaxScaler, SequenceWindower, WindowPair};
use crate::utils;
use serde::{Deserialize, Serialize};

/// Untrained recurrent-sequence configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrentModel {
    window_len: usize,
    batch_size: usize,
    regularization: f64,
    target_index: usize,
    validation_split: f64,
}

/// Prepared training data: scaled windows split into a training head and a
/// validation tail, plus the scaler fitted on the training slice only.
#[derive(Debug, Clone)]
pub struct RecurrentPrepared {
    scaler: MinMaxScaler,
    train_pairs: Vec<WindowPair>,
    val_pairs: Vec<WindowPair>,
}

/// Fitted recurrent-sequence state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedRecurrent {
    window_len: usize,
    target_index: usize,
    /// Weights over the flattened window, intercept last
    weights: Vec<f64>,
    scaler: MinMaxScaler,
    residual_std: f64,
}

impl RecurrentModel {
    /// Build the backend from hyperparameters, validating ranges:
    /// `window` in 2..=90 (default 14), `batch_size` at least 1 (default
    /// 16), non-negative `regularization` (default 0.1), `target_index`
    /// naming the feature slot the prediction re-enters the window at
    /// (default the quantity column), `validation_split` in (0, 1).
    pub fn from_hyperparameters(hp: &Hyperparameters) -> Result<Self> {
        Ok(Self {
            window_len: hp.usize_in_range("window", 14, 2, 90)?,
            batch_size: hp.usize_in_range("batch_size", 16, 1, 4096)?,
            regularization: hp.f64_non_negative("regularization", 0.1)?,
            target_index: hp.usize_in_range("target_index", TARGET_FEATURE, 0, FEATURE_COLUMNS - 1)?,
            validation_split: hp.validation_split()?,
        })
    }
}

impl ForecastModel for RecurrentModel {
    type Prepared = RecurrentPrepared;
    type Fitted = FittedRecurrent;

    fn kind(&self) -> ModelKind {
        ModelKind::RecurrentSequence
    }

    fn prepare(&self, series: &TimeSeries) -> Result<RecurrentPrepared> {
        let matrix = series.feature_matrix();
        let split_at = utils::validation_split_index(matrix.len(), self.validation_split)?;

        // The scaler must only ever see the training slice
        let scaler = MinMaxScaler::fit(&matrix[..split_at])?;
        let scaled = scaler.transform(&matrix)?;

        let windower = SequenceWindower::new(self.window_len)?;
        let pairs = windower.windows(&scaled, self.target_index)?;
        let (train_pairs, val_pairs): (Vec<_>, Vec<_>) = pairs
            .into_iter()
            .partition(|pair| pair.target_row < split_at);

        Ok(RecurrentPrepared {
            scaler,
            train_pairs,
            val_pairs,
        })
    }

    fn train(&self, prepared: &RecurrentPrepared) -> Result<(FittedRecurrent, ModelMetrics)> {
        if prepared.train_pairs.len() < self.batch_size {
            return Err(ForecastError::InsufficientData {
                required: self.batch_size,
                actual: prepared.train_pairs.len(),
            });
        }
        if prepared.val_pairs.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        let design: Vec<Vec<f64>> = prepared.train_pairs.iter().map(flatten_window).collect();
        let targets: Vec<f64> = prepared.train_pairs.iter().map(|p| p.target).collect();
        let intercept = design[0].len() - 1;
        let weights =
            utils::solve_least_squares(&design, &targets, self.regularization.max(1e-8), Some(intercept))?;

        let fitted = FittedRecurrent {
            window_len: self.window_len,
            target_index: self.target_index,
            weights,
            scaler: prepared.scaler.clone(),
            residual_std: 0.0,
        };

        // One-step validation on the held-out tail windows, in the
        // original scale
        let mut actual = Vec::with_capacity(prepared.val_pairs.len());
        let mut predicted = Vec::with_capacity(prepared.val_pairs.len());
        for pair in &prepared.val_pairs {
            let value = fitted.predict_window(&pair.window)?;
            predicted.push(fitted.scaler.inverse_value(self.target_index, value));
            actual.push(fitted.scaler.inverse_value(self.target_index, pair.target));
        }
        let model_metrics = metrics::evaluate_forecast(&actual, &predicted)?;
        let residual_std = metrics::residual_std(&actual, &predicted);

        Ok((
            FittedRecurrent {
                residual_std,
                ..fitted
            },
            model_metrics,
        ))
    }
}

impl FittedRecurrent {
    /// Scaler fitted on the training slice
    pub fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }

    /// One-step predictions limited to positions with genuine historical
    /// context; returns fewer than `horizon` values when the context is
    /// short (truncation, not failure).
    pub fn predict_direct(&self, context: &TimeSeries, horizon: usize) -> Result<Vec<f64>> {
        let scaled = self.scaler.transform(&context.feature_matrix())?;
        RecursiveForecaster::direct(self, &self.scaler, &scaled, horizon)
    }
}

impl OneStepPredictor for FittedRecurrent {
    fn window_len(&self) -> usize {
        self.window_len
    }

    fn target_index(&self) -> usize {
        self.target_index
    }

    fn predict_window(&self, window: &[Vec<f64>]) -> Result<f64> {
        if window.len() != self.window_len {
            return Err(ForecastError::Validation(format!(
                "Expected a window of {} rows, got {}",
                self.window_len,
                window.len()
            )));
        }
        let mut features: Vec<f64> = Vec::with_capacity(self.weights.len());
        for row in window {
            features.extend_from_slice(row);
        }
        features.push(1.0);
        if features.len() != self.weights.len() {
            return Err(ForecastError::Validation(
                "Window width does not match the fitted feature count".to_string(),
            ));
        }
        Ok(utils::dot(&features, &self.weights))
    }
}

impl FittedModel for FittedRecurrent {
    fn kind(&self) -> ModelKind {
        ModelKind::RecurrentSequence
    }

    fn predict(&self, context: &TimeSeries, horizon: usize) -> Result<Vec<f64>> {
        let scaled = self.scaler.transform(&context.feature_matrix())?;
        RecursiveForecaster::recursive(self, &self.scaler, &scaled, horizon)
    }

    fn evaluate(&self, series: &TimeSeries) -> Result<ModelMetrics> {
        let matrix = series.feature_matrix();
        let scaled = self.scaler.transform(&matrix)?;
        let windower = SequenceWindower::new(self.window_len)?;
        let pairs = windower.windows(&scaled, self.target_index)?;

        let mut actual = Vec::with_capacity(pairs.len());
        let mut predicted = Vec::with_capacity(pairs.len());
        for pair in &pairs {
            let value = self.predict_window(&pair.window)?;
            predicted.push(self.scaler.inverse_value(self.target_index, value));
            actual.push(self.scaler.inverse_value(self.target_index, pair.target));
        }
        metrics::evaluate_forecast(&actual, &predicted)
    }

    fn residual_std(&self) -> f64 {
        self.residual_std
    }
}

/// Flatten a window into one design row with a trailing intercept column
fn flatten_window(pair: &WindowPair) -> Vec<f64> {
    let mut row = Vec::with_capacity(pair.window.len() * pair.window[0].len() + 1);
    for features in &pair.window {
        row.extend_from_slice(features);
    }
    row.push(1.0);
    row
}
