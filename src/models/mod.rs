//! Forecasting model abstraction and the interchangeable backends
//!
//! Every backend exposes the same four-operation capability set: prepare
//! the series, train on the prepared data, predict over a horizon, and
//! evaluate against a series. Heterogeneous fitted states are carried by
//! the tagged [`FittedState`] enum so callers can swap strategies without
//! knowing which one is behind a forecast.

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::metrics::ModelMetrics;
use crate::preprocess::MinMaxScaler;
use crate::uncertainty::ConfidenceLevel;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub mod additive;
pub mod linear_trend;
pub mod recurrent;

pub use additive::{AdditiveModel, FittedAdditive, SeasonalComponent};
pub use linear_trend::{FittedLinearTrend, LinearTrendModel};
pub use recurrent::{FittedRecurrent, RecurrentModel};

/// The interchangeable forecasting strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// Autoregressive/differencing structure; predicts a full horizon directly
    LinearTrend,
    /// Trend plus calendar seasonality fit via regression; predicts any date
    AdditiveDecomposition,
    /// Fixed-length window one-step predictor driven recursively
    RecurrentSequence,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::LinearTrend,
        ModelKind::AdditiveDecomposition,
        ModelKind::RecurrentSequence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::LinearTrend => "linear-trend",
            ModelKind::AdditiveDecomposition => "additive-decomposition",
            ModelKind::RecurrentSequence => "recurrent-sequence",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear-trend" => Ok(ModelKind::LinearTrend),
            "additive-decomposition" => Ok(ModelKind::AdditiveDecomposition),
            "recurrent-sequence" => Ok(ModelKind::RecurrentSequence),
            other => Err(ForecastError::Validation(format!(
                "Unknown model kind '{}'",
                other
            ))),
        }
    }
}

/// Model choice on a forecast request: a fixed kind, or automatic
/// selection from previously computed validation metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelChoice {
    Auto,
    Kind(ModelKind),
}

/// Model-specific tunables, opaque to the orchestration layer beyond the
/// validation each backend applies to its own keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters(Map<String, Value>);

impl Hyperparameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Float value for `key`, or `default` when absent. Fails when present
    /// but not numeric.
    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64> {
        match self.0.get(key) {
            None => Ok(default),
            Some(value) => value.as_f64().ok_or_else(|| {
                ForecastError::InvalidHyperparameter(format!("'{}' must be a number", key))
            }),
        }
    }

    /// Float value for `key` restricted to the open interval `(lo, hi)`
    pub fn f64_in_open_range(&self, key: &str, default: f64, lo: f64, hi: f64) -> Result<f64> {
        let value = self.f64_or(key, default)?;
        if value <= lo || value >= hi {
            return Err(ForecastError::InvalidHyperparameter(format!(
                "'{}' must be in ({}, {}), got {}",
                key, lo, hi, value
            )));
        }
        Ok(value)
    }

    /// Non-negative float value for `key`
    pub fn f64_non_negative(&self, key: &str, default: f64) -> Result<f64> {
        let value = self.f64_or(key, default)?;
        if !value.is_finite() || value < 0.0 {
            return Err(ForecastError::InvalidHyperparameter(format!(
                "'{}' must be a non-negative finite number, got {}",
                key, value
            )));
        }
        Ok(value)
    }

    /// Integer value for `key` restricted to `lo..=hi`
    pub fn usize_in_range(&self, key: &str, default: usize, lo: usize, hi: usize) -> Result<usize> {
        let value = match self.0.get(key) {
            None => default,
            Some(value) => value.as_u64().ok_or_else(|| {
                ForecastError::InvalidHyperparameter(format!(
                    "'{}' must be a non-negative integer",
                    key
                ))
            })? as usize,
        };
        if value < lo || value > hi {
            return Err(ForecastError::InvalidHyperparameter(format!(
                "'{}' must be between {} and {}, got {}",
                key, lo, hi, value
            )));
        }
        Ok(value)
    }

    /// Boolean value for `key`, or `default` when absent
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.0.get(key) {
            None => Ok(default),
            Some(value) => value.as_bool().ok_or_else(|| {
                ForecastError::InvalidHyperparameter(format!("'{}' must be a boolean", key))
            }),
        }
    }

    /// String value for `key`, or `default` when absent
    pub fn str_or(&self, key: &str, default: &str) -> Result<String> {
        match self.0.get(key) {
            None => Ok(default.to_string()),
            Some(value) => value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| {
                    ForecastError::InvalidHyperparameter(format!("'{}' must be a string", key))
                }),
        }
    }

    /// Validation split from the tail of the series, in the open
    /// interval `(0, 1)`. Shared by every backend.
    pub fn validation_split(&self) -> Result<f64> {
        self.f64_in_open_range("validation_split", 0.2, 0.0, 1.0)
    }
}

/// One forecasted point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
}

/// Result of a forecast request. Transient: recomputed per request and
/// owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub entity_id: String,
    pub model_kind: ModelKind,
    pub model_version: u32,
    pub generated_at: DateTime<Utc>,
    pub horizon_days: usize,
    pub predictions: Vec<PredictionPoint>,
    /// Sum of the predicted values across the horizon
    pub total: f64,
    pub confidence_level: Option<ConfidenceLevel>,
}

/// A forecasting strategy that can be fitted to an observation history
pub trait ForecastModel {
    /// Data shape the backend trains on
    type Prepared;
    /// Fitted state the backend produces
    type Fitted: FittedModel;

    fn kind(&self) -> ModelKind;

    /// Turn a raw series into the backend's training representation
    fn prepare(&self, series: &TimeSeries) -> Result<Self::Prepared>;

    /// Fit on prepared data, returning the fitted state and metrics
    /// computed on an unshuffled validation split from the series tail
    fn train(&self, prepared: &Self::Prepared) -> Result<(Self::Fitted, ModelMetrics)>;
}

/// Immutable fitted state produced by a successful `train` or `load`
pub trait FittedModel {
    fn kind(&self) -> ModelKind;

    /// Forecast `horizon` consecutive daily values following the end of
    /// `context`
    fn predict(&self, context: &TimeSeries, horizon: usize) -> Result<Vec<f64>>;

    /// Back-test the fitted state against an observed series
    fn evaluate(&self, series: &TimeSeries) -> Result<ModelMetrics>;

    /// Standard deviation of the validation residuals, for interval
    /// estimation
    fn residual_std(&self) -> f64;
}

fn fit<M: ForecastModel>(model: &M, series: &TimeSeries) -> Result<(M::Fitted, ModelMetrics)> {
    let prepared = model.prepare(series)?;
    model.train(&prepared)
}

/// Fitted model state, tagged by kind. Opaque to callers beyond the
/// [`FittedModel`] capability set; serializable as the persisted artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FittedState {
    LinearTrend(FittedLinearTrend),
    AdditiveDecomposition(FittedAdditive),
    RecurrentSequence(FittedRecurrent),
}

impl FittedState {
    pub fn kind(&self) -> ModelKind {
        match self {
            FittedState::LinearTrend(_) => ModelKind::LinearTrend,
            FittedState::AdditiveDecomposition(_) => ModelKind::AdditiveDecomposition,
            FittedState::RecurrentSequence(_) => ModelKind::RecurrentSequence,
        }
    }

    pub fn predict(&self, context: &TimeSeries, horizon: usize) -> Result<Vec<f64>> {
        match self {
            FittedState::LinearTrend(m) => m.predict(context, horizon),
            FittedState::AdditiveDecomposition(m) => m.predict(context, horizon),
            FittedState::RecurrentSequence(m) => m.predict(context, horizon),
        }
    }

    pub fn evaluate(&self, series: &TimeSeries) -> Result<ModelMetrics> {
        match self {
            FittedState::LinearTrend(m) => m.evaluate(series),
            FittedState::AdditiveDecomposition(m) => m.evaluate(series),
            FittedState::RecurrentSequence(m) => m.evaluate(series),
        }
    }

    pub fn residual_std(&self) -> f64 {
        match self {
            FittedState::LinearTrend(m) => m.residual_std(),
            FittedState::AdditiveDecomposition(m) => m.residual_std(),
            FittedState::RecurrentSequence(m) => m.residual_std(),
        }
    }

    /// Scaler fitted during training, for backends that normalize features
    pub fn scaler_state(&self) -> Option<&MinMaxScaler> {
        match self {
            FittedState::RecurrentSequence(m) => Some(m.scaler()),
            _ => None,
        }
    }

    /// Whether the backend produces its own interval output
    pub fn has_native_intervals(&self) -> bool {
        matches!(self, FittedState::AdditiveDecomposition(_))
    }

    /// Encode the state as an opaque artifact blob
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a state from a persisted artifact blob
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(blob)?)
    }
}

/// Validate that the hyperparameters are complete and in range for the
/// chosen kind, without training anything. Used synchronously at
/// submission time.
pub fn validate_hyperparameters(kind: ModelKind, hyperparameters: &Hyperparameters) -> Result<()> {
    match kind {
        ModelKind::LinearTrend => LinearTrendModel::from_hyperparameters(hyperparameters).map(|_| ()),
        ModelKind::AdditiveDecomposition => {
            AdditiveModel::from_hyperparameters(hyperparameters).map(|_| ())
        }
        ModelKind::RecurrentSequence => {
            RecurrentModel::from_hyperparameters(hyperparameters).map(|_| ())
        }
    }
}

/// Train a model of the requested kind on the series.
///
/// Fails with `InsufficientData` below `min_observations` points and with
/// `InvalidHyperparameter` when a tunable is absent or out of range.
pub fn train_model(
    kind: ModelKind,
    series: &TimeSeries,
    hyperparameters: &Hyperparameters,
    min_observations: usize,
) -> Result<(FittedState, ModelMetrics)> {
    if series.len() < min_observations {
        return Err(ForecastError::InsufficientData {
            required: min_observations,
            actual: series.len(),
        });
    }

    match kind {
        ModelKind::LinearTrend => {
            let model = LinearTrendModel::from_hyperparameters(hyperparameters)?;
            let (fitted, metrics) = fit(&model, series)?;
            Ok((FittedState::LinearTrend(fitted), metrics))
        }
        ModelKind::AdditiveDecomposition => {
            let model = AdditiveModel::from_hyperparameters(hyperparameters)?;
            let (fitted, metrics) = fit(&model, series)?;
            Ok((FittedState::AdditiveDecomposition(fitted), metrics))
        }
        ModelKind::RecurrentSequence => {
            let model = RecurrentModel::from_hyperparameters(hyperparameters)?;
            let (fitted, metrics) = fit(&model, series)?;
            Ok((FittedState::RecurrentSequence(fitted), metrics))
        }
    }
}
