//! Error types for the forecast_engine crate

use crate::models::ModelKind;
use thiserror::Error;

/// Custom error types for the forecast_engine crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data validation or ingestion
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not enough observations or windows to proceed
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// A required hyperparameter is missing or outside its valid range
    #[error("Invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),

    /// Requested horizon is outside the engine-wide bounds
    #[error("Invalid horizon: {requested} (must be between 1 and {max})")]
    InvalidHorizon { requested: usize, max: usize },

    /// A prediction was requested for a model kind that has not been trained
    #[error("Model not trained: {0}")]
    ModelNotTrained(String),

    /// Auto-selection found no trained model at all for the entity
    #[error("No trained model for entity '{entity_id}'")]
    NoTrainedModel { entity_id: String },

    /// A training task for the same (entity, kind) pair is already in flight
    #[error("Training already in flight for entity '{entity_id}' and kind '{kind}'")]
    DuplicateTraining { entity_id: String, kind: ModelKind },

    /// Unknown training task id
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Numeric failure during model fitting
    #[error("Training error: {0}")]
    Training(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from CSV parsing
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error from model artifact serialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;
