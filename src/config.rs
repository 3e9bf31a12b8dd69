//! Engine-wide configuration

/// Limits and defaults shared by every component of the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Largest forecast horizon accepted, in days
    pub max_horizon_days: usize,
    /// Minimum number of observations before an entity is eligible for training
    pub min_training_observations: usize,
    /// Largest number of entities accepted in one batch forecast
    pub max_batch_entities: usize,
    /// Number of workers draining the training queue
    pub training_workers: usize,
    /// Capacity of the training queue
    pub training_queue_depth: usize,
    /// Fraction of the series tail held out for validation when a request
    /// does not override `validation_split`
    pub default_validation_split: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_horizon_days: 365,
            min_training_observations: 30,
            max_batch_entities: 100,
            training_workers: 4,
            training_queue_depth: 256,
            default_validation_split: 0.2,
        }
    }
}
