//! Automatic model selection from persisted validation metrics

use crate::error::{ForecastError, Result};
use crate::registry::TrainedModel;
use std::cmp::Ordering;

/// Chooses the best-performing trained model for an entity.
///
/// Selection is a pure function of the persisted metrics: lowest
/// validation MAPE wins, ties break by lowest RMSE, then by the most
/// recent `trained_at`. No new computation happens here, so repeated
/// calls over the same registry snapshot are deterministic.
#[derive(Debug, Clone, Copy)]
pub struct ModelSelector;

impl ModelSelector {
    pub fn select<'a>(
        entity_id: &str,
        candidates: &'a [TrainedModel],
    ) -> Result<&'a TrainedModel> {
        candidates
            .iter()
            .min_by(|a, b| Self::rank(a, b))
            .ok_or_else(|| ForecastError::NoTrainedModel {
                entity_id: entity_id.to_string(),
            })
    }

    fn rank(a: &TrainedModel, b: &TrainedModel) -> Ordering {
        cmp_metric(a.metrics.mape, b.metrics.mape)
            .then_with(|| cmp_metric(a.metrics.rmse, b.metrics.rmse))
            .then_with(|| b.trained_at.cmp(&a.trained_at))
    }
}

/// Lower is better; NaN sorts last so a degenerate metric never wins
fn cmp_metric(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}
