//! Observation history handling and the time-series store contract

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// Column index of the forecast target within [`TimeSeries::feature_matrix`]
pub const TARGET_FEATURE: usize = 0;

/// Number of feature columns produced by [`TimeSeries::feature_matrix`]
pub const FEATURE_COLUMNS: usize = 2;

/// A single recorded data point for an entity. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Calendar date of the observation
    pub date: NaiveDate,
    /// Units sold (or observed) on that date
    pub quantity: u64,
    /// Revenue observed on that date
    pub revenue: f64,
}

impl Observation {
    /// Create a validated observation. Revenue must be finite and non-negative.
    pub fn new(date: NaiveDate, quantity: u64, revenue: f64) -> Result<Self> {
        if !revenue.is_finite() || revenue < 0.0 {
            return Err(ForecastError::Validation(format!(
                "Revenue must be a non-negative finite number, got {} on {}",
                revenue, date
            )));
        }
        Ok(Self {
            date,
            quantity,
            revenue,
        })
    }
}

/// Ordered observation history for one entity.
///
/// Dates are strictly increasing; duplicate dates collapse to the latest
/// record. An entity becomes eligible for training once the history reaches
/// the engine's minimum observation count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    entity_id: String,
    observations: Vec<Observation>,
}

impl TimeSeries {
    /// Build a series from unordered observations, sorting by date and
    /// collapsing duplicate dates keep-last.
    pub fn new(entity_id: impl Into<String>, observations: Vec<Observation>) -> Result<Self> {
        let entity_id = entity_id.into();
        if entity_id.is_empty() {
            return Err(ForecastError::Validation(
                "Entity id must not be empty".to_string(),
            ));
        }

        let mut series = Self {
            entity_id,
            observations: Vec::new(),
        };
        series.merge(observations);
        Ok(series)
    }

    fn merge(&mut self, incoming: Vec<Observation>) {
        self.observations.extend(incoming);
        // Stable sort keeps insertion order among equal dates, so keeping
        // the last record per date implements the keep-latest policy.
        self.observations.sort_by_key(|obs| obs.date);
        let mut deduped: Vec<Observation> = Vec::with_capacity(self.observations.len());
        for obs in self.observations.drain(..) {
            match deduped.last_mut() {
                Some(last) if last.date == obs.date => *last = obs,
                _ => deduped.push(obs),
            }
        }
        self.observations = deduped;
    }

    /// Append further observations, preserving ordering and the
    /// keep-latest duplicate policy.
    pub fn append(&mut self, observations: Vec<Observation>) {
        self.merge(observations);
    }

    /// Entity this history belongs to
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series holds no observations
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// The observations, ordered by date
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Target values (quantities) as floats, ordered by date
    pub fn quantities(&self) -> Vec<f64> {
        self.observations
            .iter()
            .map(|obs| obs.quantity as f64)
            .collect()
    }

    /// Ordered dates of the series
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|obs| obs.date).collect()
    }

    /// Date of the most recent observation
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|obs| obs.date)
    }

    /// First and last observed dates
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.observations.first(), self.observations.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        }
    }

    /// Per-date feature rows `[quantity, revenue]`, ordered by date.
    /// The forecast target occupies column [`TARGET_FEATURE`].
    pub fn feature_matrix(&self) -> Vec<Vec<f64>> {
        self.observations
            .iter()
            .map(|obs| vec![obs.quantity as f64, obs.revenue])
            .collect()
    }

    /// Sub-series covering the first `n` observations
    pub fn head(&self, n: usize) -> TimeSeries {
        TimeSeries {
            entity_id: self.entity_id.clone(),
            observations: self.observations[..n.min(self.observations.len())].to_vec(),
        }
    }
}

/// Summary returned after appending history to a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub entity_id: String,
    pub records_total: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

/// Read/append contract for per-entity observation history.
///
/// The engine only requires this contract; the backing technology is a
/// collaborator concern.
pub trait TimeSeriesStore: Send + Sync {
    /// Full ordered history for an entity. Fails with a validation error
    /// for unknown entities.
    fn get_history(&self, entity_id: &str) -> Result<TimeSeries>;

    /// Append validated observations, creating the entity when absent.
    fn append(&self, entity_id: &str, observations: Vec<Observation>) -> Result<IngestSummary>;
}

/// In-memory time series store
#[derive(Debug, Default)]
pub struct InMemoryTimeSeriesStore {
    series: RwLock<HashMap<String, TimeSeries>>,
}

impl InMemoryTimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimeSeriesStore for InMemoryTimeSeriesStore {
    fn get_history(&self, entity_id: &str) -> Result<TimeSeries> {
        let series = self
            .series
            .read()
            .map_err(|_| ForecastError::Validation("Time series store lock poisoned".to_string()))?;
        series
            .get(entity_id)
            .cloned()
            .ok_or_else(|| {
                ForecastError::Validation(format!("No history recorded for entity '{}'", entity_id))
            })
    }

    fn append(&self, entity_id: &str, observations: Vec<Observation>) -> Result<IngestSummary> {
        for obs in &observations {
            // Re-run observation-level validation at the store boundary
            Observation::new(obs.date, obs.quantity, obs.revenue)?;
        }

        let mut series = self
            .series
            .write()
            .map_err(|_| ForecastError::Validation("Time series store lock poisoned".to_string()))?;
        let entry = match series.get_mut(entity_id) {
            Some(existing) => {
                existing.append(observations);
                existing
            }
            None => {
                let created = TimeSeries::new(entity_id, observations)?;
                series.entry(entity_id.to_string()).or_insert(created)
            }
        };

        Ok(IngestSummary {
            entity_id: entity_id.to_string(),
            records_total: entry.len(),
            date_range: entry.date_range(),
        })
    }
}

/// Loader for observation history files
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load observations from a CSV file with `date,quantity,revenue`
    /// columns (dates formatted `YYYY-MM-DD`).
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Observation>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut observations = Vec::new();
        for record in reader.deserialize() {
            let obs: Observation = record?;
            observations.push(Observation::new(obs.date, obs.quantity, obs.revenue)?);
        }
        Ok(observations)
    }
}

/// Generate a reproducible synthetic history: linear trend plus yearly and
/// weekly seasonality with Gaussian noise, clamped non-negative.
pub fn synthetic_history(
    entity_id: &str,
    start: NaiveDate,
    days: usize,
    seed: u64,
) -> Result<TimeSeries> {
    let noise = Normal::new(0.0, 10.0)
        .map_err(|e| ForecastError::Validation(format!("Noise distribution: {}", e)))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut observations = Vec::with_capacity(days);
    for i in 0..days {
        let t = i as f64;
        let trend = 100.0 + 100.0 * t / days.max(1) as f64;
        let yearly = 30.0 * (2.0 * std::f64::consts::PI * t / 365.0).sin();
        let weekly = 10.0 * (2.0 * std::f64::consts::PI * t / 7.0).sin();
        let value = (trend + yearly + weekly + noise.sample(&mut rng)).max(0.0);

        let date = start + chrono::Duration::days(i as i64);
        observations.push(Observation {
            date,
            quantity: value.round() as u64,
            revenue: value * 10.0,
        });
    }

    TimeSeries::new(entity_id, observations)
}
