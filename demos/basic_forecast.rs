//! Train one model in the background and forecast two weeks ahead.

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
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let engine = ForecastEngine::new(
        EngineConfig::default(),
        Arc::new(InMemoryTimeSeriesStore::new()),
        Arc::new(InMemoryArtifactStore::new()),
    );

    // Two years of synthetic daily sales for one SKU
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    let history = synthetic_history("SKU-1", start, 730, 42)?;
    let summary = engine.append_history("SKU-1", history.observations().to_vec())?;
    println!(
        "Ingested {} observations for {}",
        summary.records_total, summary.entity_id
    );

    let task = engine
        .submit_training(
            "SKU-1",
            ModelKind::AdditiveDecomposition,
            Hyperparameters::new(),
        )
        .await?;
    println!("Submitted training task {}", task.task_id);

    let finished = loop {
        let status = engine.task_status(&task.task_id)?;
        match status.state {
            TaskState::Completed | TaskState::Failed => break status,
            _ => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    };
    if let Some(error) = &finished.error {
        println!("Training failed: {}", error.message);
        return Ok(());
    }
    println!("Trained model {}", finished.model_id.as_deref().unwrap_or("?"));

    let forecast = engine.forecast(
        "SKU-1",
        14,
        ModelChoice::Kind(ModelKind::AdditiveDecomposition),
        Some(ConfidenceLevel::NinetyFive),
    )?;
    println!(
        "\n14-day forecast ({} v{}), total {:.1}:",
        forecast.model_kind, forecast.model_version, forecast.total
    );
    for point in &forecast.predictions {
        println!(
            "  {}  {:8.1}  [{:8.1}, {:8.1}]",
            point.date,
            point.value,
            point.lower_bound.unwrap_or(f64::NAN),
            point.upper_bound.unwrap_or(f64::NAN),
        );
    }

    Ok(())
}
