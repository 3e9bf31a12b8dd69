//! # Forecast Engine
//!
//! A Rust library for multi-model time series forecasting over entity
//! histories (for example per-SKU daily sales).
//!
//! ## Features
//!
//! - Time series ingestion with ordering and duplicate-date resolution
//! - Interchangeable forecasting backends (linear trend, additive
//!   decomposition, recurrent sequence) behind one capability set
//! - Recursive multi-step prediction for one-step sequence models
//! - Versioned model registry with metric-gated promotion
//! - Automatic model selection from persisted validation metrics
//! - Residual-based and native confidence intervals
//! - Background training tasks and concurrent batch forecasting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use forecast_engine::config::EngineConfig;
//! use forecast_engine::data::InMemoryTimeSeriesStore;
//! use forecast_engine::engine::ForecastEngine;
//! use forecast_engine::models::{Hyperparameters, ModelChoice, ModelKind};
//! use forecast_engine::registry::InMemoryArtifactStore;
//! use forecast_engine::uncertainty::ConfidenceLevel;
//!
//! # async fn run() -> forecast_engine::error::Result<()> {
//! let engine = ForecastEngine::new(
//!     EngineConfig::default(),
//!     Arc::new(InMemoryTimeSeriesStore::new()),
//!     Arc::new(InMemoryArtifactStore::new()),
//! );
//!
//! // Queue a training task and poll it to completion
//! let task = engine
//!     .submit_training("SKU-1", ModelKind::AdditiveDecomposition, Hyperparameters::new())
//!     .await?;
//! let status = engine.task_status(&task.task_id)?;
//!
//! // Forecast a week ahead with 95% intervals
//! let forecast = engine.forecast(
//!     "SKU-1",
//!     7,
//!     ModelChoice::Auto,
//!     Some(ConfidenceLevel::NinetyFive),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod forecaster;
pub mod metrics;
pub mod models;
pub mod preprocess;
pub mod registry;
pub mod selection;
pub mod tasks;
pub mod uncertainty;
pub mod utils;

// Re-export commonly used types
pub use crate::config::EngineConfig;
pub use crate::data::{Observation, TimeSeries, TimeSeriesStore};
pub use crate::engine::ForecastEngine;
pub use crate::error::ForecastError;
pub use crate::models::{ForecastResult, Hyperparameters, ModelChoice, ModelKind};
pub use crate::uncertainty::ConfidenceLevel;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
