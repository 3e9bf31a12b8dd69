//! Trained model registry and artifact persistence
//!
//! The registry keeps versioned metadata per `(entity, kind)` pair and
//! promotes at most one version per pair to active. Fitted states are
//! persisted as opaque blobs through an [`ArtifactStore`] and rehydrated
//! on demand, so metadata stays cheap to list and snapshot.

use crate::error::{ForecastError, Result};
use crate::metrics::ModelMetrics;
use crate::models::{FittedState, Hyperparameters, ModelKind};
use crate::preprocess::MinMaxScaler;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Persisted metadata for one trained model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub model_id: String,
    pub entity_id: String,
    pub model_kind: ModelKind,
    /// Monotonic per `(entity, kind)` pair, starting at 1
    pub version: u32,
    pub hyperparameters: Hyperparameters,
    /// Feature scaler captured at fit time, for backends that normalize
    pub fitted_scaler_state: Option<MinMaxScaler>,
    pub trained_at: DateTime<Utc>,
    pub metrics: ModelMetrics,
    pub is_active: bool,
}

/// Storage for fitted state blobs, keyed by model id
pub trait ArtifactStore: Send + Sync {
    fn save(&self, model_id: &str, blob: Vec<u8>) -> Result<()>;
    fn load(&self, model_id: &str) -> Result<Vec<u8>>;
}

/// Process-local artifact store
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn save(&self, model_id: &str, blob: Vec<u8>) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| ForecastError::Training("Artifact store lock poisoned".to_string()))?;
        blobs.insert(model_id.to_string(), blob);
        Ok(())
    }

    fn load(&self, model_id: &str) -> Result<Vec<u8>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| ForecastError::Training("Artifact store lock poisoned".to_string()))?;
        blobs.get(model_id).cloned().ok_or_else(|| {
            ForecastError::Validation(format!("No artifact stored for model '{}'", model_id))
        })
    }
}

/// Versioned registry of trained models.
///
/// Writers take the map-level lock for the whole register operation, so
/// version numbers and the single-active invariant hold under concurrent
/// training completions.
pub struct ModelRegistry {
    models: RwLock<HashMap<(String, ModelKind), Vec<TrainedModel>>>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl ModelRegistry {
    pub fn new(artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
            artifacts,
        }
    }

    /// Register a freshly trained model: persist its fitted state, assign
    /// the next version for its `(entity, kind)` pair, and promote it to
    /// active when it beats the incumbent's validation MAPE (or when no
    /// incumbent exists). A non-promoted version stays queryable but is
    /// never served.
    pub fn register(
        &self,
        entity_id: &str,
        kind: ModelKind,
        hyperparameters: Hyperparameters,
        state: &FittedState,
        metrics: ModelMetrics,
    ) -> Result<TrainedModel> {
        let mut models = self
            .models
            .write()
            .map_err(|_| ForecastError::Training("Model registry lock poisoned".to_string()))?;
        let versions = models
            .entry((entity_id.to_string(), kind))
            .or_default();

        let version = versions.iter().map(|m| m.version).max().unwrap_or(0) + 1;
        let model_id = format!("{}_{}_v{}", entity_id, kind, version);
        self.artifacts.save(&model_id, state.to_blob()?)?;

        let incumbent_mape = versions
            .iter()
            .find(|m| m.is_active)
            .map(|m| m.metrics.mape);
        let promote = match incumbent_mape {
            None => true,
            Some(active_mape) => metrics.mape < active_mape,
        };
        if promote {
            for existing in versions.iter_mut() {
                existing.is_active = false;
            }
        }

        let record = TrainedModel {
            model_id,
            entity_id: entity_id.to_string(),
            model_kind: kind,
            version,
            hyperparameters,
            fitted_scaler_state: state.scaler_state().cloned(),
            trained_at: Utc::now(),
            metrics,
            is_active: promote,
        };
        info!(
            entity_id,
            kind = %kind,
            version,
            mape = record.metrics.mape,
            promoted = promote,
            "Registered trained model"
        );
        versions.push(record.clone());
        Ok(record)
    }

    /// The active model for an entity and kind
    pub fn active_model(&self, entity_id: &str, kind: ModelKind) -> Result<TrainedModel> {
        let models = self
            .models
            .read()
            .map_err(|_| ForecastError::Training("Model registry lock poisoned".to_string()))?;
        models
            .get(&(entity_id.to_string(), kind))
            .and_then(|versions| versions.iter().find(|m| m.is_active))
            .cloned()
            .ok_or_else(|| {
                ForecastError::ModelNotTrained(format!(
                    "No active {} model for entity '{}'",
                    kind, entity_id
                ))
            })
    }

    /// All active models for an entity, across kinds. Empty when nothing
    /// has been trained.
    pub fn active_models(&self, entity_id: &str) -> Result<Vec<TrainedModel>> {
        let models = self
            .models
            .read()
            .map_err(|_| ForecastError::Training("Model registry lock poisoned".to_string()))?;
        let mut active: Vec<TrainedModel> = ModelKind::ALL
            .iter()
            .filter_map(|&kind| {
                models
                    .get(&(entity_id.to_string(), kind))
                    .and_then(|versions| versions.iter().find(|m| m.is_active))
                    .cloned()
            })
            .collect();
        active.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        Ok(active)
    }

    /// List registered model metadata, optionally filtered by kind and
    /// restricted to active versions. Sorted by model id for stable output.
    pub fn list_models(
        &self,
        kind: Option<ModelKind>,
        active_only: bool,
    ) -> Result<Vec<TrainedModel>> {
        let models = self
            .models
            .read()
            .map_err(|_| ForecastError::Training("Model registry lock poisoned".to_string()))?;
        let mut listed: Vec<TrainedModel> = models
            .values()
            .flatten()
            .filter(|m| kind.map_or(true, |k| m.model_kind == k))
            .filter(|m| !active_only || m.is_active)
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        Ok(listed)
    }

    /// Metadata for one model id, active or not
    pub fn get_model(&self, model_id: &str) -> Result<TrainedModel> {
        let models = self
            .models
            .read()
            .map_err(|_| ForecastError::Training("Model registry lock poisoned".to_string()))?;
        models
            .values()
            .flatten()
            .find(|m| m.model_id == model_id)
            .cloned()
            .ok_or_else(|| {
                ForecastError::Validation(format!("Unknown model id '{}'", model_id))
            })
    }

    /// Rehydrate the fitted state for a registered model
    pub fn load_state(&self, model_id: &str) -> Result<FittedState> {
        let blob = self.artifacts.load(model_id)?;
        FittedState::from_blob(&blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic_history;
    use crate::models::train_model;
    use chrono::NaiveDate;

    fn registry() -> ModelRegistry {
        ModelRegistry::new(Arc::new(InMemoryArtifactStore::new()))
    }

    fn trained_state() -> (FittedState, ModelMetrics) {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = synthetic_history("SKU-1", start, 120, 7).unwrap();
        train_model(
            ModelKind::LinearTrend,
            &series,
            &Hyperparameters::new(),
            30,
        )
        .unwrap()
    }

    #[test]
    fn test_first_registration_is_active_v1() {
        let registry = registry();
        let (state, metrics) = trained_state();

        let record = registry
            .register("SKU-1", ModelKind::LinearTrend, Hyperparameters::new(), &state, metrics)
            .unwrap();
        assert_eq!(record.version, 1);
        assert!(record.is_active);

        let active = registry
            .active_model("SKU-1", ModelKind::LinearTrend)
            .unwrap();
        assert_eq!(active.model_id, record.model_id);
    }

    #[test]
    fn test_worse_retrain_does_not_demote_incumbent() {
        let registry = registry();
        let (state, metrics) = trained_state();

        let mut worse = metrics.clone();
        worse.mape += 10.0;

        registry
            .register("SKU-1", ModelKind::LinearTrend, Hyperparameters::new(), &state, metrics)
            .unwrap();
        let second = registry
            .register("SKU-1", ModelKind::LinearTrend, Hyperparameters::new(), &state, worse)
            .unwrap();

        assert_eq!(second.version, 2);
        assert!(!second.is_active);
        let active = registry
            .active_model("SKU-1", ModelKind::LinearTrend)
            .unwrap();
        assert_eq!(active.version, 1);
    }

    #[test]
    fn test_better_retrain_takes_over() {
        let registry = registry();
        let (state, metrics) = trained_state();

        let mut better = metrics.clone();
        better.mape = (better.mape - 1.0).max(0.0);

        registry
            .register("SKU-1", ModelKind::LinearTrend, Hyperparameters::new(), &state, metrics)
            .unwrap();
        registry
            .register("SKU-1", ModelKind::LinearTrend, Hyperparameters::new(), &state, better)
            .unwrap();

        let active = registry
            .active_model("SKU-1", ModelKind::LinearTrend)
            .unwrap();
        assert_eq!(active.version, 2);
        assert_eq!(
            registry.list_models(Some(ModelKind::LinearTrend), true).unwrap().len(),
            1
        );
        assert_eq!(registry.list_models(None, false).unwrap().len(), 2);
    }

    #[test]
    fn test_state_round_trips_through_artifacts() {
        let registry = registry();
        let (state, metrics) = trained_state();
        let record = registry
            .register("SKU-1", ModelKind::LinearTrend, Hyperparameters::new(), &state, metrics)
            .unwrap();

        let restored = registry.load_state(&record.model_id).unwrap();
        assert_eq!(restored.kind(), ModelKind::LinearTrend);
    }

    #[test]
    fn test_missing_lookups_fail() {
        let registry = registry();
        assert!(matches!(
            registry.active_model("SKU-404", ModelKind::LinearTrend),
            Err(ForecastError::ModelNotTrained(_))
        ));
        assert!(registry.get_model("nope").is_err());
        assert!(registry.active_models("SKU-404").unwrap().is_empty());
    }
}
