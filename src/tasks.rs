//! Background training task lifecycle
//!
//! Training requests are validated synchronously, queued, and executed by
//! a fixed pool of workers. Each task moves through queued, running, and a
//! terminal completed or failed state; terminal states never change again.
//! The blocking numerical work runs on the blocking thread pool so the
//! async workers stay responsive.

use crate::config::EngineConfig;
use crate::data::TimeSeriesStore;
use crate::error::{ForecastError, Result};
use crate::models::{self, Hyperparameters, ModelKind};
use crate::registry::ModelRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

/// Lifecycle state of a training task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed,
}

/// Category of a training failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    InsufficientData,
    InvalidHyperparameters,
    DataAccess,
    Training,
    Withdrawn,
}

/// Structured reason recorded on a failed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&ForecastError> for TrainingFailure {
    fn from(err: &ForecastError) -> Self {
        let kind = match err {
            ForecastError::InsufficientData { .. } => FailureKind::InsufficientData,
            ForecastError::InvalidHyperparameter(_) => FailureKind::InvalidHyperparameters,
            ForecastError::Validation(_) | ForecastError::Io(_) | ForecastError::Csv(_) => {
                FailureKind::DataAccess
            }
            _ => FailureKind::Training,
        };
        TrainingFailure {
            kind,
            message: err.to_string(),
        }
    }
}

/// Observable record of one training task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingTask {
    pub task_id: String,
    pub entity_id: String,
    pub model_kind: ModelKind,
    pub state: TaskState,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<TrainingFailure>,
    /// Registered model id, set on completion
    pub model_id: Option<String>,
}

struct TrainingJob {
    task_id: String,
    entity_id: String,
    kind: ModelKind,
    hyperparameters: Hyperparameters,
}

/// Queues training work and tracks task records for polling.
pub struct TrainingTaskManager {
    config: EngineConfig,
    tasks: Arc<RwLock<HashMap<String, TrainingTask>>>,
    queue: mpsc::Sender<TrainingJob>,
    next_id: AtomicU64,
}

impl TrainingTaskManager {
    /// Start the manager and its worker pool. Must be called from within a
    /// tokio runtime.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn TimeSeriesStore>,
        registry: Arc<ModelRegistry>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<TrainingJob>(config.training_queue_depth);
        let tasks: Arc<RwLock<HashMap<String, TrainingTask>>> =
            Arc::new(RwLock::new(HashMap::new()));

        let receiver = Arc::new(Mutex::new(receiver));
        for worker in 0..config.training_workers.max(1) {
            let receiver = Arc::clone(&receiver);
            let tasks = Arc::clone(&tasks);
            let store = Arc::clone(&store);
            let registry = Arc::clone(&registry);
            let min_observations = config.min_training_observations;
            tokio::spawn(async move {
                worker_loop(worker, receiver, tasks, store, registry, min_observations).await;
            });
        }

        Self {
            config,
            tasks,
            queue: sender,
            next_id: AtomicU64::new(1),
        }
    }

    /// Submit a training task. Hyperparameters are validated here so a
    /// malformed request fails immediately instead of after dequeue; at
    /// most one task per `(entity, kind)` pair may be in flight.
    pub async fn submit(
        &self,
        entity_id: &str,
        kind: ModelKind,
        hyperparameters: Hyperparameters,
    ) -> Result<TrainingTask> {
        if entity_id.trim().is_empty() {
            return Err(ForecastError::Validation(
                "Entity id must not be empty".to_string(),
            ));
        }
        models::validate_hyperparameters(kind, &hyperparameters)?;

        let task = {
            let mut tasks = self.tasks.write().map_err(lock_poisoned)?;
            let in_flight = tasks.values().any(|t| {
                t.entity_id == entity_id
                    && t.model_kind == kind
                    && matches!(t.state, TaskState::Queued | TaskState::Running)
            });
            if in_flight {
                return Err(ForecastError::DuplicateTraining {
                    entity_id: entity_id.to_string(),
                    kind,
                });
            }

            let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
            let task = TrainingTask {
                task_id: format!("task-{:06}", seq),
                entity_id: entity_id.to_string(),
                model_kind: kind,
                state: TaskState::Queued,
                submitted_at: Utc::now(),
                completed_at: None,
                error: None,
                model_id: None,
            };
            tasks.insert(task.task_id.clone(), task.clone());
            task
        };

        let job = TrainingJob {
            task_id: task.task_id.clone(),
            entity_id: entity_id.to_string(),
            kind,
            hyperparameters,
        };
        if self.queue.send(job).await.is_err() {
            let mut tasks = self.tasks.write().map_err(lock_poisoned)?;
            if let Some(record) = tasks.get_mut(&task.task_id) {
                record.state = TaskState::Failed;
                record.completed_at = Some(Utc::now());
                record.error = Some(TrainingFailure {
                    kind: FailureKind::Training,
                    message: "Training queue is closed".to_string(),
                });
            }
            return Err(ForecastError::Training(
                "Training queue is closed".to_string(),
            ));
        }

        info!(task_id = %task.task_id, entity_id, kind = %kind, "Queued training task");
        Ok(task)
    }

    /// Current record for a task id
    pub fn status(&self, task_id: &str) -> Result<TrainingTask> {
        let tasks = self.tasks.read().map_err(lock_poisoned)?;
        tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| ForecastError::TaskNotFound(task_id.to_string()))
    }

    /// Withdraw a task that has not started running. A withdrawn task
    /// reaches the failed state with a withdrawal reason and is skipped by
    /// the workers; running and terminal tasks cannot be withdrawn.
    pub fn withdraw(&self, task_id: &str) -> Result<TrainingTask> {
        let mut tasks = self.tasks.write().map_err(lock_poisoned)?;
        let record = tasks
            .get_mut(task_id)
            .ok_or_else(|| ForecastError::TaskNotFound(task_id.to_string()))?;
        if record.state != TaskState::Queued {
            return Err(ForecastError::Validation(format!(
                "Task '{}' is not queued and cannot be withdrawn",
                task_id
            )));
        }
        record.state = TaskState::Failed;
        record.completed_at = Some(Utc::now());
        record.error = Some(TrainingFailure {
            kind: FailureKind::Withdrawn,
            message: "Withdrawn before execution".to_string(),
        });
        warn!(task_id, "Training task withdrawn");
        Ok(record.clone())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn lock_poisoned<T>(_: T) -> ForecastError {
    ForecastError::Training("Task table lock poisoned".to_string())
}

async fn worker_loop(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<TrainingJob>>>,
    tasks: Arc<RwLock<HashMap<String, TrainingTask>>>,
    store: Arc<dyn TimeSeriesStore>,
    registry: Arc<ModelRegistry>,
    min_observations: usize,
) {
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(job) = job else { break };

        // Withdrawn jobs still arrive on the channel; only queued tasks run
        let claimed = {
            let mut tasks = match tasks.write() {
                Ok(tasks) => tasks,
                Err(_) => break,
            };
            match tasks.get_mut(&job.task_id) {
                Some(record) if record.state == TaskState::Queued => {
                    record.state = TaskState::Running;
                    true
                }
                _ => false,
            }
        };
        if !claimed {
            continue;
        }
        info!(worker, task_id = %job.task_id, "Training task started");

        let store = Arc::clone(&store);
        let registry = Arc::clone(&registry);
        let entity_id = job.entity_id.clone();
        let kind = job.kind;
        let hyperparameters = job.hyperparameters.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let series = store.get_history(&entity_id)?;
            let (state, metrics) =
                models::train_model(kind, &series, &hyperparameters, min_observations)?;
            registry.register(&entity_id, kind, hyperparameters, &state, metrics)
        })
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(join_err) => Err(ForecastError::Training(format!(
                "Training worker panicked: {}",
                join_err
            ))),
        };

        let Ok(mut tasks) = tasks.write() else { break };
        let Some(record) = tasks.get_mut(&job.task_id) else {
            continue;
        };
        record.completed_at = Some(Utc::now());
        match result {
            Ok(trained) => {
                record.state = TaskState::Completed;
                record.model_id = Some(trained.model_id.clone());
                info!(
                    worker,
                    task_id = %job.task_id,
                    model_id = %trained.model_id,
                    "Training task completed"
                );
            }
            Err(err) => {
                record.state = TaskState::Failed;
                record.error = Some(TrainingFailure::from(&err));
                error!(worker, task_id = %job.task_id, %err, "Training task failed");
            }
        }
    }
}
