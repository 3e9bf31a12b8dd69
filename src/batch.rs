//! Fan-out forecasting over many entities
//!
//! A batch runs each entity's forecast on the blocking thread pool and
//! collects per-entity outcomes. One entity failing never aborts the
//! batch; its entry carries the error while the rest carry results.

use crate::error::{ForecastError, Result};
use crate::models::ForecastResult;
use tokio::task::JoinSet;
use tracing::warn;

/// Outcome for one entity in a batch
#[derive(Debug)]
pub struct BatchEntry {
    pub entity_id: String,
    pub outcome: Result<ForecastResult>,
}

pub struct BatchOrchestrator;

impl BatchOrchestrator {
    /// Forecast every entity through `forecast`, concurrently. Entries
    /// come back in the input order. Fails up front when the batch is
    /// empty or larger than `max_entities`.
    pub async fn run<F>(
        entity_ids: Vec<String>,
        max_entities: usize,
        forecast: F,
    ) -> Result<Vec<BatchEntry>>
    where
        F: Fn(&str) -> Result<ForecastResult> + Send + Sync + Clone + 'static,
    {
        if entity_ids.is_empty() {
            return Err(ForecastError::Validation(
                "Batch must name at least one entity".to_string(),
            ));
        }
        if entity_ids.len() > max_entities {
            return Err(ForecastError::Validation(format!(
                "Batch of {} entities exceeds the limit of {}",
                entity_ids.len(),
                max_entities
            )));
        }

        let mut join_set = JoinSet::new();
        for (index, entity_id) in entity_ids.iter().cloned().enumerate() {
            let forecast = forecast.clone();
            join_set.spawn_blocking(move || {
                let outcome = forecast(&entity_id);
                (index, entity_id, outcome)
            });
        }

        let mut entries: Vec<Option<BatchEntry>> = Vec::new();
        entries.resize_with(entity_ids.len(), || None);
        while let Some(joined) = join_set.join_next().await {
            let (index, entity_id, outcome) = joined
                .map_err(|err| ForecastError::Training(format!("Batch worker panicked: {}", err)))?;
            if let Err(reason) = &outcome {
                warn!(entity_id = %entity_id, %reason, "Batch entry failed");
            }
            entries[index] = Some(BatchEntry { entity_id, outcome });
        }

        Ok(entries.into_iter().flatten().collect())
    }
}
