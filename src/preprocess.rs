//! Feature scaling and sequence windowing for the sequence backends

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Fitted per-feature min-max transform to `[0, 1]`.
///
/// The transform is affine, so `inverse_transform(transform(x)) == x` up to
/// floating point tolerance. Values outside the fitted range extrapolate
/// beyond `[0, 1]` without failing; the fit must come from the training
/// slice only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    mins: Vec<f64>,
    ranges: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit per-column bounds from a feature matrix
    pub fn fit(matrix: &[Vec<f64>]) -> Result<Self> {
        let n_features = Self::check_shape(matrix)?;

        let mut mins = vec![f64::INFINITY; n_features];
        let mut maxs = vec![f64::NEG_INFINITY; n_features];
        for row in matrix {
            for (col, &value) in row.iter().enumerate() {
                if !value.is_finite() {
                    return Err(ForecastError::Validation(
                        "Scaler input must be finite".to_string(),
                    ));
                }
                mins[col] = mins[col].min(value);
                maxs[col] = maxs[col].max(value);
            }
        }

        let ranges = mins
            .iter()
            .zip(maxs.iter())
            .map(|(&lo, &hi)| hi - lo)
            .collect();
        Ok(Self { mins, ranges })
    }

    fn check_shape(matrix: &[Vec<f64>]) -> Result<usize> {
        let n_features = matrix.first().map_or(0, |row| row.len());
        if n_features == 0 {
            return Err(ForecastError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        if matrix.iter().any(|row| row.len() != n_features) {
            return Err(ForecastError::Validation(
                "Feature matrix rows must have equal width".to_string(),
            ));
        }
        Ok(n_features)
    }

    /// Number of feature columns the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.mins.len()
    }

    /// Scale a single value from feature column `col`
    pub fn transform_value(&self, col: usize, value: f64) -> f64 {
        // A constant column keeps a unit scale so the transform stays
        // invertible for values off the training constant
        if self.ranges[col] == 0.0 {
            value - self.mins[col]
        } else {
            (value - self.mins[col]) / self.ranges[col]
        }
    }

    /// Undo the scaling for a single value from feature column `col`
    pub fn inverse_value(&self, col: usize, scaled: f64) -> f64 {
        if self.ranges[col] == 0.0 {
            scaled + self.mins[col]
        } else {
            self.mins[col] + scaled * self.ranges[col]
        }
    }

    /// Scale a full feature matrix
    pub fn transform(&self, matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.apply(matrix, |scaler, col, v| scaler.transform_value(col, v))
    }

    /// Undo the scaling for a full feature matrix
    pub fn inverse_transform(&self, matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.apply(matrix, |scaler, col, v| scaler.inverse_value(col, v))
    }

    fn apply(
        &self,
        matrix: &[Vec<f64>],
        f: impl Fn(&Self, usize, f64) -> f64,
    ) -> Result<Vec<Vec<f64>>> {
        let n_features = Self::check_shape(matrix)?;
        if n_features != self.n_features() {
            return Err(ForecastError::Validation(format!(
                "Scaler fitted on {} features, got {}",
                self.n_features(),
                n_features
            )));
        }

        Ok(matrix
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(col, &v)| f(self, col, v))
                    .collect()
            })
            .collect())
    }
}

/// One (input window, target) training pair
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPair {
    /// `window_len` consecutive feature rows
    pub window: Vec<Vec<f64>>,
    /// Target value at the position immediately after the window
    pub target: f64,
    /// Row index of the target within the source matrix
    pub target_row: usize,
}

/// Slices a normalized feature matrix into fixed-length input windows with
/// one-step-ahead targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceWindower {
    window_len: usize,
}

impl SequenceWindower {
    pub fn new(window_len: usize) -> Result<Self> {
        if window_len == 0 {
            return Err(ForecastError::InvalidHyperparameter(
                "Window length must be at least 1".to_string(),
            ));
        }
        Ok(Self { window_len })
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Produce exactly `N - L` pairs for a matrix of length `N` and window
    /// length `L`; window `i` covers rows `[i, i + L)` and the target is
    /// `target_index` of row `i + L`.
    pub fn windows(&self, matrix: &[Vec<f64>], target_index: usize) -> Result<Vec<WindowPair>> {
        let n = matrix.len();
        if n <= self.window_len {
            return Err(ForecastError::InsufficientData {
                required: self.window_len + 1,
                actual: n,
            });
        }
        if matrix.iter().any(|row| target_index >= row.len()) {
            return Err(ForecastError::Validation(format!(
                "Target feature index {} out of bounds",
                target_index
            )));
        }

        Ok((0..n - self.window_len)
            .map(|i| WindowPair {
                window: matrix[i..i + self.window_len].to_vec(),
                target: matrix[i + self.window_len][target_index],
                target_row: i + self.window_len,
            })
            .collect())
    }
}
