use chrono::NaiveDate;
use forecast_engine::config::EngineConfig;
use forecast_engine::data::{synthetic_history, InMemoryTimeSeriesStore};
use forecast_engine::engine::ForecastEngine;
use forecast_engine::error::ForecastError;
use forecast_engine::models::{Hyperparameters, ModelChoice, ModelKind};
use forecast_engine::registry::InMemoryArtifactStore;
use forecast_engine::tasks::TaskState;
use forecast_engine::uncertainty::ConfidenceLevel;
use std::sync::Arc;
use std::time::Duration;

fn engine() -> ForecastEngine {
    ForecastEngine::new(
        EngineConfig::default(),
        Arc::new(InMemoryTimeSeriesStore::new()),
        Arc::new(InMemoryArtifactStore::new()),
    )
}

async fn train(engine: &ForecastEngine, entity: &str, kind: ModelKind) -> String {
    let task = engine
        .submit_training(entity, kind, Hyperparameters::new())
        .await
        .unwrap();
    loop {
        let status = engine.task_status(&task.task_id).unwrap();
        match status.state {
            TaskState::Completed => return status.model_id.unwrap(),
            TaskState::Failed => panic!("training failed: {:?}", status.error),
            _ => tokio::time::sleep(Duration::from_millis(25)).await,
        }
    }
}

fn seed(engine: &ForecastEngine, entity: &str, days: usize, rng_seed: u64) -> NaiveDate {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let history = synthetic_history(entity, start, days, rng_seed).unwrap();
    engine
        .append_history(entity, history.observations().to_vec())
        .unwrap();
    history.last_date().unwrap()
}

#[tokio::test]
async fn test_train_then_forecast_with_intervals() {
    let engine = engine();
    let last_date = seed(&engine, "SKU-1", 400, 21);
    train(&engine, "SKU-1", ModelKind::AdditiveDecomposition).await;

    let forecast = engine
        .forecast(
            "SKU-1",
            7,
            ModelChoice::Kind(ModelKind::AdditiveDecomposition),
            Some(ConfidenceLevel::NinetyFive),
        )
        .unwrap();

    assert_eq!(forecast.entity_id, "SKU-1");
    assert_eq!(forecast.model_kind, ModelKind::AdditiveDecomposition);
    assert_eq!(forecast.model_version, 1);
    assert_eq!(forecast.horizon_days, 7);
    assert_eq!(forecast.predictions.len(), 7);
    assert_eq!(forecast.confidence_level, Some(ConfidenceLevel::NinetyFive));

    // Dates are consecutive days starting right after the history
    for (offset, point) in forecast.predictions.iter().enumerate() {
        let expected = last_date + chrono::Duration::days(offset as i64 + 1);
        assert_eq!(point.date, expected);
        let lower = point.lower_bound.unwrap();
        let upper = point.upper_bound.unwrap();
        assert!(lower <= point.value && point.value <= upper);
    }

    let sum: f64 = forecast.predictions.iter().map(|p| p.value).sum();
    assert!((forecast.total - sum).abs() < 1e-9);
}

#[tokio::test]
async fn test_forecast_without_intervals_has_no_bounds() {
    let engine = engine();
    seed(&engine, "SKU-1", 200, 5);
    train(&engine, "SKU-1", ModelKind::LinearTrend).await;

    let forecast = engine
        .forecast("SKU-1", 30, ModelChoice::Kind(ModelKind::LinearTrend), None)
        .unwrap();
    assert_eq!(forecast.predictions.len(), 30);
    assert!(forecast
        .predictions
        .iter()
        .all(|p| p.lower_bound.is_none() && p.upper_bound.is_none()));
    assert!(forecast.confidence_level.is_none());
}

#[tokio::test]
async fn test_horizon_limits() {
    let engine = engine();
    seed(&engine, "SKU-1", 200, 5);
    train(&engine, "SKU-1", ModelKind::LinearTrend).await;

    for bad in [0usize, 366] {
        assert!(matches!(
            engine.forecast("SKU-1", bad, ModelChoice::Auto, None),
            Err(ForecastError::InvalidHorizon { requested, max })
                if requested == bad && max == 365
        ));
    }
    assert!(engine
        .forecast("SKU-1", 365, ModelChoice::Auto, None)
        .is_ok());
}

#[tokio::test]
async fn test_auto_selection_picks_the_best_active_model() {
    let engine = engine();
    seed(&engine, "SKU-1", 400, 21);
    for kind in ModelKind::ALL {
        train(&engine, "SKU-1", kind).await;
    }

    let active = engine.list_models(None, true).unwrap();
    assert_eq!(active.len(), 3);
    let best_kind = active
        .iter()
        .min_by(|a, b| a.metrics.mape.partial_cmp(&b.metrics.mape).unwrap())
        .unwrap()
        .model_kind;

    let forecast = engine.forecast("SKU-1", 14, ModelChoice::Auto, None).unwrap();
    assert_eq!(forecast.model_kind, best_kind);
}

#[tokio::test]
async fn test_untrained_entity_cannot_be_forecast() {
    let engine = engine();
    seed(&engine, "SKU-1", 200, 5);

    assert!(matches!(
        engine.forecast("SKU-1", 7, ModelChoice::Auto, None),
        Err(ForecastError::NoTrainedModel { .. })
    ));
    assert!(matches!(
        engine.forecast("SKU-1", 7, ModelChoice::Kind(ModelKind::LinearTrend), None),
        Err(ForecastError::ModelNotTrained(_))
    ));
}

#[tokio::test]
async fn test_model_listing_and_lookup() {
    let engine = engine();
    seed(&engine, "SKU-1", 200, 5);
    let model_id = train(&engine, "SKU-1", ModelKind::LinearTrend).await;

    let listed = engine
        .list_models(Some(ModelKind::LinearTrend), false)
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].model_id, model_id);

    let fetched = engine.get_model(&model_id).unwrap();
    assert_eq!(fetched.entity_id, "SKU-1");
    assert!(fetched.is_active);
    assert!(engine.get_model("bogus").is_err());

    assert!(engine
        .list_models(Some(ModelKind::RecurrentSequence), false)
        .unwrap()
        .is_empty());
}
