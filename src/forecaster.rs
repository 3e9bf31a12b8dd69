//! Multi-step rollout for one-step-ahead sequence models

use crate::error::{ForecastError, Result};
use crate::preprocess::MinMaxScaler;

/// A model limited to predicting the single step following a fixed-length
/// window of normalized feature rows.
pub trait OneStepPredictor {
    /// Length of the input window
    fn window_len(&self) -> usize;

    /// Declared feature column the predicted target occupies when a window
    /// is rolled forward
    fn target_index(&self) -> usize;

    /// Predict the next target value, in normalized space
    fn predict_window(&self, window: &[Vec<f64>]) -> Result<f64>;
}

/// Drives step-by-step forecasting for one-step models.
///
/// The recursion operates in normalized space: each predicted value is
/// written into the target slot of a fresh window (oldest row dropped,
/// newest appended) and becomes part of the next step's input, so forecast
/// error compounds with the horizon. Every emitted value is inverse-scaled
/// independently.
#[derive(Debug, Clone, Copy)]
pub struct RecursiveForecaster;

impl RecursiveForecaster {
    /// Roll the model forward for exactly `horizon` steps.
    pub fn recursive<M: OneStepPredictor>(
        model: &M,
        scaler: &MinMaxScaler,
        scaled_history: &[Vec<f64>],
        horizon: usize,
    ) -> Result<Vec<f64>> {
        let window_len = model.window_len();
        if scaled_history.len() < window_len {
            return Err(ForecastError::InsufficientData {
                required: window_len,
                actual: scaled_history.len(),
            });
        }

        let seed: Vec<Vec<f64>> = scaled_history[scaled_history.len() - window_len..].to_vec();
        let target = model.target_index();

        // A pure fold over the horizon: every step builds a new window
        // instead of mutating shared state
        let mut outputs = Vec::with_capacity(horizon);
        let mut window = seed;
        for _ in 0..horizon {
            let predicted = model.predict_window(&window)?;
            outputs.push(scaler.inverse_value(target, predicted));

            let mut next_row = window[window.len() - 1].clone();
            next_row[target] = predicted;
            let mut next_window = Vec::with_capacity(window_len);
            next_window.extend_from_slice(&window[1..]);
            next_window.push(next_row);
            window = next_window;
        }

        Ok(outputs)
    }

    /// One-step predictions over genuine historical context only.
    ///
    /// Emits at most `len(history) - window_len` predictions regardless of
    /// the requested horizon; callers detect truncation by comparing the
    /// returned count against the horizon.
    pub fn direct<M: OneStepPredictor>(
        model: &M,
        scaler: &MinMaxScaler,
        scaled_history: &[Vec<f64>],
        horizon: usize,
    ) -> Result<Vec<f64>> {
        let window_len = model.window_len();
        if scaled_history.len() <= window_len {
            return Err(ForecastError::InsufficientData {
                required: window_len + 1,
                actual: scaled_history.len(),
            });
        }

        let target = model.target_index();
        let available = scaled_history.len() - window_len;
        let steps = horizon.min(available);

        let mut outputs = Vec::with_capacity(steps);
        for i in 0..steps {
            let window = &scaled_history[i..i + window_len];
            let predicted = model.predict_window(window)?;
            outputs.push(scaler.inverse_value(target, predicted));
        }

        Ok(outputs)
    }
}
