use chrono::NaiveDate;
use forecast_engine::config::EngineConfig;
use forecast_engine::data::{
    synthetic_history, IngestSummary, InMemoryTimeSeriesStore, Observation, TimeSeries,
    TimeSeriesStore,
};
use forecast_engine::error::{ForecastError, Result};
use forecast_engine::models::{Hyperparameters, ModelKind};
use forecast_engine::registry::{InMemoryArtifactStore, ModelRegistry};
use forecast_engine::tasks::{FailureKind, TaskState, TrainingTask, TrainingTaskManager};
use std::sync::Arc;
use std::time::Duration;

/// Store whose reads block, keeping training tasks in flight long enough
/// to observe intermediate states.
struct SlowStore {
    inner: InMemoryTimeSeriesStore,
    delay: Duration,
}

impl TimeSeriesStore for SlowStore {
    fn get_history(&self, entity_id: &str) -> Result<TimeSeries> {
        std::thread::sleep(self.delay);
        self.inner.get_history(entity_id)
    }

    fn append(&self, entity_id: &str, observations: Vec<Observation>) -> Result<IngestSummary> {
        self.inner.append(entity_id, observations)
    }
}

fn seeded_store(days: usize) -> InMemoryTimeSeriesStore {
    let store = InMemoryTimeSeriesStore::new();
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let history = synthetic_history("SKU-1", start, days, 11).unwrap();
    store
        .append("SKU-1", history.observations().to_vec())
        .unwrap();
    store
}

fn manager(store: Arc<dyn TimeSeriesStore>, workers: usize) -> TrainingTaskManager {
    let config = EngineConfig {
        training_workers: workers,
        ..EngineConfig::default()
    };
    let registry = Arc::new(ModelRegistry::new(Arc::new(InMemoryArtifactStore::new())));
    TrainingTaskManager::new(config, store, registry)
}

async fn poll_terminal(manager: &TrainingTaskManager, task_id: &str) -> TrainingTask {
    for _ in 0..400 {
        let status = manager.status(task_id).unwrap();
        if matches!(status.state, TaskState::Completed | TaskState::Failed) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("Task {} never reached a terminal state", task_id);
}

#[tokio::test]
async fn test_task_runs_to_completion() {
    let manager = manager(Arc::new(seeded_store(200)), 2);
    let task = manager
        .submit("SKU-1", ModelKind::LinearTrend, Hyperparameters::new())
        .await
        .unwrap();
    assert_eq!(task.state, TaskState::Queued);
    assert!(task.completed_at.is_none());

    let finished = poll_terminal(&manager, &task.task_id).await;
    assert_eq!(finished.state, TaskState::Completed);
    assert!(finished.error.is_none());
    assert!(finished.model_id.is_some());
    assert!(finished.completed_at.is_some());
}

#[tokio::test]
async fn test_short_history_fails_with_insufficient_data() {
    let manager = manager(Arc::new(seeded_store(10)), 2);
    let task = manager
        .submit("SKU-1", ModelKind::LinearTrend, Hyperparameters::new())
        .await
        .unwrap();

    let finished = poll_terminal(&manager, &task.task_id).await;
    assert_eq!(finished.state, TaskState::Failed);
    let failure = finished.error.expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::InsufficientData);
    assert!(finished.model_id.is_none());
}

#[tokio::test]
async fn test_invalid_hyperparameters_fail_at_submission() {
    let manager = manager(Arc::new(seeded_store(200)), 2);
    let bad = Hyperparameters::new().set("window", 1000);

    assert!(matches!(
        manager
            .submit("SKU-1", ModelKind::RecurrentSequence, bad)
            .await,
        Err(ForecastError::InvalidHyperparameter(_))
    ));
}

#[tokio::test]
async fn test_duplicate_in_flight_training_is_rejected() {
    let store = SlowStore {
        inner: seeded_store(200),
        delay: Duration::from_millis(300),
    };
    let manager = manager(Arc::new(store), 2);

    let first = manager
        .submit("SKU-1", ModelKind::LinearTrend, Hyperparameters::new())
        .await
        .unwrap();
    let second = manager
        .submit("SKU-1", ModelKind::LinearTrend, Hyperparameters::new())
        .await;
    assert!(matches!(
        second,
        Err(ForecastError::DuplicateTraining { .. })
    ));

    // A different kind for the same entity is not a duplicate
    manager
        .submit("SKU-1", ModelKind::AdditiveDecomposition, Hyperparameters::new())
        .await
        .unwrap();

    // Once the first finishes, the pair can be trained again
    poll_terminal(&manager, &first.task_id).await;
    manager
        .submit("SKU-1", ModelKind::LinearTrend, Hyperparameters::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_withdraw_only_applies_to_queued_tasks() {
    // One worker, blocked by the first task, keeps the second queued
    let store = SlowStore {
        inner: seeded_store(200),
        delay: Duration::from_millis(500),
    };
    let manager = manager(Arc::new(store), 1);

    let blocking = manager
        .submit("SKU-1", ModelKind::LinearTrend, Hyperparameters::new())
        .await
        .unwrap();
    let queued = manager
        .submit("SKU-1", ModelKind::AdditiveDecomposition, Hyperparameters::new())
        .await
        .unwrap();

    let withdrawn = manager.withdraw(&queued.task_id).unwrap();
    assert_eq!(withdrawn.state, TaskState::Failed);
    assert_eq!(
        withdrawn.error.as_ref().map(|e| e.kind),
        Some(FailureKind::Withdrawn)
    );

    // A withdrawn task stays withdrawn after the worker drains the queue
    let finished = poll_terminal(&manager, &blocking.task_id).await;
    assert_eq!(finished.state, TaskState::Completed);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let still = manager.status(&queued.task_id).unwrap();
    assert_eq!(
        still.error.as_ref().map(|e| e.kind),
        Some(FailureKind::Withdrawn)
    );

    // Terminal tasks cannot be withdrawn
    assert!(manager.withdraw(&blocking.task_id).is_err());
}

#[tokio::test]
async fn test_unknown_task_id() {
    let manager = manager(Arc::new(seeded_store(200)), 1);
    assert!(matches!(
        manager.status("task-999999"),
        Err(ForecastError::TaskNotFound(_))
    ));
    assert!(matches!(
        manager.withdraw("task-999999"),
        Err(ForecastError::TaskNotFound(_))
    ));
}
