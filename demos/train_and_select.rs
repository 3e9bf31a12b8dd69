//! Train every backend for a few SKUs, let automatic selection pick the
//! best one, and run a batch forecast.

use forecast_engine::config::EngineConfig;
use forecast_engine::data::{synthetic_history, InMemoryTimeSeriesStore};
use forecast_engine::engine::ForecastEngine;
use forecast_engine::error::Result;
use forecast_engine::models::{Hyperparameters, ModelChoice, ModelKind};
use forecast_engine::registry::InMemoryArtifactStore;
use forecast_engine::tasks::TaskState;
use forecast_engine::uncertainty::ConfidenceLevel;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let engine = ForecastEngine::new(
        EngineConfig::default(),
        Arc::new(InMemoryTimeSeriesStore::new()),
        Arc::new(InMemoryArtifactStore::new()),
    );

    let skus = ["SKU-1", "SKU-2", "SKU-3"];
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    for (i, sku) in skus.iter().enumerate() {
        let history = synthetic_history(sku, start, 540, 100 + i as u64)?;
        engine.append_history(sku, history.observations().to_vec())?;
    }

    // Queue every backend for every SKU, then wait for the pool to drain
    let mut task_ids = Vec::new();
    for sku in &skus {
        for kind in ModelKind::ALL {
            let task = engine
                .submit_training(sku, kind, Hyperparameters::new())
                .await?;
            task_ids.push(task.task_id);
        }
    }
    for task_id in &task_ids {
        loop {
            let status = engine.task_status(task_id)?;
            match status.state {
                TaskState::Completed | TaskState::Failed => break,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    }

    println!("Active models:");
    for model in engine.list_models(None, true)? {
        println!(
            "  {}  MAPE {:5.2}%  RMSE {:8.2}",
            model.model_id, model.metrics.mape, model.metrics.rmse
        );
    }

    for sku in &skus {
        let forecast = engine.forecast(sku, 30, ModelChoice::Auto, None)?;
        println!(
            "{}: auto-selected {} v{}, 30-day total {:.1}",
            sku, forecast.model_kind, forecast.model_version, forecast.total
        );
    }

    // Batch the same request across all SKUs plus one unknown entity
    let mut entities: Vec<String> = skus.iter().map(|s| s.to_string()).collect();
    entities.push("SKU-404".to_string());
    let entries = engine
        .batch_forecast(
            entities,
            7,
            ModelChoice::Auto,
            Some(ConfidenceLevel::Ninety),
        )
        .await?;
    println!("\nBatch outcomes:");
    for entry in &entries {
        match &entry.outcome {
            Ok(forecast) => println!("  {}: total {:.1}", entry.entity_id, forecast.total),
            Err(reason) => println!("  {}: failed ({})", entry.entity_id, reason),
        }
    }

    Ok(())
}
