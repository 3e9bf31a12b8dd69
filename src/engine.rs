//! Top-level forecasting engine
//!
//! Ties the store, the model registry, the training task manager, and the
//! batch orchestrator together behind one facade. The engine is cheap to
//! clone; every clone shares the same underlying state.

use crate::batch::{BatchEntry, BatchOrchestrator};
use crate::config::EngineConfig;
use crate::data::{IngestSummary, Observation, TimeSeries, TimeSeriesStore};
use crate::error::{ForecastError, Result};
use crate::models::{
    FittedState, ForecastResult, Hyperparameters, ModelChoice, ModelKind, PredictionPoint,
};
use crate::registry::{ArtifactStore, ModelRegistry, TrainedModel};
use crate::selection::ModelSelector;
use crate::tasks::{TrainingTask, TrainingTaskManager};
use crate::uncertainty::{ConfidenceLevel, UncertaintyEstimator};
use crate::utils;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Multi-model forecasting engine
#[derive(Clone)]
pub struct ForecastEngine {
    config: EngineConfig,
    store: Arc<dyn TimeSeriesStore>,
    registry: Arc<ModelRegistry>,
    tasks: Arc<TrainingTaskManager>,
}

impl ForecastEngine {
    /// Build an engine over the given stores and start its training
    /// workers. Must be called from within a tokio runtime.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn TimeSeriesStore>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        let registry = Arc::new(ModelRegistry::new(artifacts));
        let tasks = Arc::new(TrainingTaskManager::new(
            config.clone(),
            Arc::clone(&store),
            Arc::clone(&registry),
        ));
        Self {
            config,
            store,
            registry,
            tasks,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Queue a background training task
    pub async fn submit_training(
        &self,
        entity_id: &str,
        kind: ModelKind,
        hyperparameters: Hyperparameters,
    ) -> Result<TrainingTask> {
        self.tasks.submit(entity_id, kind, hyperparameters).await
    }

    pub fn task_status(&self, task_id: &str) -> Result<TrainingTask> {
        self.tasks.status(task_id)
    }

    pub fn withdraw_task(&self, task_id: &str) -> Result<TrainingTask> {
        self.tasks.withdraw(task_id)
    }

    /// Forecast `horizon_days` consecutive daily values for an entity,
    /// serving the chosen kind's active model or, under automatic choice,
    /// the active model with the best validation metrics. Interval bounds
    /// are attached when a confidence level is requested.
    pub fn forecast(
        &self,
        entity_id: &str,
        horizon_days: usize,
        choice: ModelChoice,
        intervals: Option<ConfidenceLevel>,
    ) -> Result<ForecastResult> {
        if horizon_days < 1 || horizon_days > self.config.max_horizon_days {
            return Err(ForecastError::InvalidHorizon {
                requested: horizon_days,
                max: self.config.max_horizon_days,
            });
        }

        let model = self.resolve_model(entity_id, choice)?;
        let state = self.registry.load_state(&model.model_id)?;
        let history = self.store.get_history(entity_id)?;
        let last_date = history.last_date().ok_or_else(|| {
            ForecastError::Validation(format!("Entity '{}' has no observations", entity_id))
        })?;

        let values = state.predict(&history, horizon_days)?;
        let dates = utils::future_dates(last_date, horizon_days);
        let mut predictions: Vec<PredictionPoint> = dates
            .into_iter()
            .zip(values.iter())
            .map(|(date, &value)| PredictionPoint {
                date,
                value,
                lower_bound: None,
                upper_bound: None,
            })
            .collect();

        if let Some(level) = intervals {
            let bounds = match &state {
                FittedState::AdditiveDecomposition(fitted) => {
                    fitted.native_intervals(&values, level)
                }
                _ => UncertaintyEstimator::residual_bounds(&values, state.residual_std(), level),
            };
            UncertaintyEstimator::attach(&mut predictions, &bounds);
        }

        let total = values.iter().sum();
        info!(
            entity_id,
            kind = %model.model_kind,
            version = model.version,
            horizon_days,
            "Forecast served"
        );
        Ok(ForecastResult {
            entity_id: entity_id.to_string(),
            model_kind: model.model_kind,
            model_version: model.version,
            generated_at: Utc::now(),
            horizon_days,
            predictions,
            total,
            confidence_level: intervals,
        })
    }

    /// Forecast many entities concurrently with shared request settings
    pub async fn batch_forecast(
        &self,
        entity_ids: Vec<String>,
        horizon_days: usize,
        choice: ModelChoice,
        intervals: Option<ConfidenceLevel>,
    ) -> Result<Vec<BatchEntry>> {
        let engine = self.clone();
        BatchOrchestrator::run(
            entity_ids,
            self.config.max_batch_entities,
            move |entity_id| engine.forecast(entity_id, horizon_days, choice, intervals),
        )
        .await
    }

    /// Registered model metadata, optionally filtered
    pub fn list_models(
        &self,
        kind: Option<ModelKind>,
        active_only: bool,
    ) -> Result<Vec<TrainedModel>> {
        self.registry.list_models(kind, active_only)
    }

    pub fn get_model(&self, model_id: &str) -> Result<TrainedModel> {
        self.registry.get_model(model_id)
    }

    /// Append observations to an entity's history
    pub fn append_history(
        &self,
        entity_id: &str,
        observations: Vec<Observation>,
    ) -> Result<IngestSummary> {
        self.store.append(entity_id, observations)
    }

    /// Full ordered history for an entity
    pub fn history(&self, entity_id: &str) -> Result<TimeSeries> {
        self.store.get_history(entity_id)
    }

    fn resolve_model(&self, entity_id: &str, choice: ModelChoice) -> Result<TrainedModel> {
        match choice {
            ModelChoice::Kind(kind) => self.registry.active_model(entity_id, kind),
            ModelChoice::Auto => {
                let candidates = self.registry.active_models(entity_id)?;
                ModelSelector::select(entity_id, &candidates).cloned()
            }
        }
    }
}
