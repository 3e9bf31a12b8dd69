//! Additive-decomposition backend
//!
//! Decomposes the series into a linear trend plus Fourier seasonal
//! components fit by regression over calendar features. Any future (or
//! interleaved historical) date can be predicted directly, and interval
//! output comes natively from the model's own residual spread.

use crate::data::{Observation, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::metrics::{self, ModelMetrics};
use crate::models::{FittedModel, ForecastModel, Hyperparameters, ModelKind};
use crate::uncertainty::ConfidenceLevel;
use crate::utils;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Days of revenue history averaged as the future value of an external
/// regressor
const REGRESSOR_LOOKBACK: usize = 28;

/// How the seasonal effect combines with the trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityMode {
    Additive,
    /// Fit on `ln(1 + y)` so seasonal effects scale with the level
    Multiplicative,
}

/// One seasonal component expressed as a truncated Fourier series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalComponent {
    pub name: String,
    pub period_days: f64,
    pub fourier_order: usize,
}

impl SeasonalComponent {
    fn validate(&self) -> Result<()> {
        if !self.period_days.is_finite() || self.period_days <= 0.0 {
            return Err(ForecastError::InvalidHyperparameter(format!(
                "Seasonal component '{}' must have a positive period",
                self.name
            )));
        }
        if self.fourier_order == 0 || self.fourier_order > 20 {
            return Err(ForecastError::InvalidHyperparameter(format!(
                "Seasonal component '{}' must have a fourier_order in 1..=20",
                self.name
            )));
        }
        Ok(())
    }
}

/// Untrained additive-decomposition configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AdditiveModel {
    mode: SeasonalityMode,
    components: Vec<SeasonalComponent>,
    regressors: Vec<String>,
    validation_split: f64,
}

/// Prepared training data for the additive backend
#[derive(Debug, Clone)]
pub struct AdditivePrepared {
    series: TimeSeries,
    split_at: usize,
}

/// Fitted additive-decomposition state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedAdditive {
    mode: SeasonalityMode,
    /// Origin of the trend index
    start_date: NaiveDate,
    components: Vec<SeasonalComponent>,
    regressors: Vec<String>,
    /// Intercept, trend slope, Fourier pairs per component, regressors
    coefficients: Vec<f64>,
    /// In-sample residual spread in fitting space; the native interval source
    sigma_native: f64,
    /// Validation residual spread in the original space
    residual_std: f64,
    /// Future stand-in value per declared regressor
    regressor_fallback: Vec<f64>,
}

impl AdditiveModel {
    /// Build the backend from hyperparameters.
    ///
    /// Recognized keys: `seasonality_mode` (`additive`/`multiplicative`),
    /// `weekly_seasonality` and `yearly_seasonality` flags with their
    /// `*_fourier_order` counterparts, `custom_seasonalities` (a list of
    /// `{name, period_days, fourier_order}`), `regressors` (external
    /// feature names; only `revenue` is available), and
    /// `validation_split`.
    pub fn from_hyperparameters(hp: &Hyperparameters) -> Result<Self> {
        let mode = match hp.str_or("seasonality_mode", "additive")?.as_str() {
            "additive" => SeasonalityMode::Additive,
            "multiplicative" => SeasonalityMode::Multiplicative,
            other => {
                return Err(ForecastError::InvalidHyperparameter(format!(
                    "'seasonality_mode' must be 'additive' or 'multiplicative', got '{}'",
                    other
                )))
            }
        };

        let mut components = Vec::new();
        if hp.bool_or("weekly_seasonality", true)? {
            components.push(SeasonalComponent {
                name: "weekly".to_string(),
                period_days: 7.0,
                fourier_order: hp.usize_in_range("weekly_fourier_order", 3, 1, 10)?,
            });
        }
        if hp.bool_or("yearly_seasonality", true)? {
            components.push(SeasonalComponent {
                name: "yearly".to_string(),
                period_days: 365.25,
                fourier_order: hp.usize_in_range("yearly_fourier_order", 3, 1, 20)?,
            });
        }
        if let Some(value) = hp.get("custom_seasonalities") {
            let custom: Vec<SeasonalComponent> = serde_json::from_value(value.clone())
                .map_err(|e| {
                    ForecastError::InvalidHyperparameter(format!(
                        "'custom_seasonalities' must be a list of {{name, period_days, fourier_order}}: {}",
                        e
                    ))
                })?;
            components.extend(custom);
        }
        for component in &components {
            component.validate()?;
        }
        if components.is_empty() {
            return Err(ForecastError::InvalidHyperparameter(
                "At least one seasonal component is required".to_string(),
            ));
        }

        let regressors: Vec<String> = match hp.get("regressors") {
            None => Vec::new(),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                ForecastError::InvalidHyperparameter(format!(
                    "'regressors' must be a list of feature names: {}",
                    e
                ))
            })?,
        };
        for name in &regressors {
            if name != "revenue" {
                return Err(ForecastError::InvalidHyperparameter(format!(
                    "Unknown regressor '{}'; available: revenue",
                    name
                )));
            }
        }

        Ok(Self {
            mode,
            components,
            regressors,
            validation_split: hp.validation_split()?,
        })
    }
}

impl ForecastModel for AdditiveModel {
    type Prepared = AdditivePrepared;
    type Fitted = FittedAdditive;

    fn kind(&self) -> ModelKind {
        ModelKind::AdditiveDecomposition
    }

    fn prepare(&self, series: &TimeSeries) -> Result<AdditivePrepared> {
        let split_at = utils::validation_split_index(series.len(), self.validation_split)?;
        Ok(AdditivePrepared {
            series: series.clone(),
            split_at,
        })
    }

    fn train(&self, prepared: &AdditivePrepared) -> Result<(FittedAdditive, ModelMetrics)> {
        let observations = prepared.series.observations();
        let train_obs = &observations[..prepared.split_at];
        let val_obs = &observations[prepared.split_at..];
        let start_date = train_obs[0].date;

        let regressor_fallback = trailing_regressor_means(&self.regressors, train_obs);

        let design: Vec<Vec<f64>> = train_obs
            .iter()
            .map(|obs| {
                design_row(
                    &self.components,
                    start_date,
                    obs.date,
                    &regressor_values(&self.regressors, obs),
                )
            })
            .collect();
        let targets: Vec<f64> = train_obs
            .iter()
            .map(|obs| forward(self.mode, obs.quantity as f64))
            .collect();

        // Tiny ridge guards against collinear Fourier columns on short spans
        let coefficients = utils::solve_least_squares(&design, &targets, 1e-6, Some(0))?;

        let fit_values: Vec<f64> = design
            .iter()
            .map(|row| utils::dot(row, &coefficients))
            .collect();
        let residuals: Vec<f64> = targets
            .iter()
            .zip(fit_values.iter())
            .map(|(&y, &f)| y - f)
            .collect();
        let sigma_native = utils::std_dev(&residuals);

        let mut fitted = FittedAdditive {
            mode: self.mode,
            start_date,
            components: self.components.clone(),
            regressors: self.regressors.clone(),
            coefficients,
            sigma_native,
            residual_std: 0.0,
            regressor_fallback,
        };

        // Validate on the unseen tail, with interval coverage at 95%
        let val_actual: Vec<f64> = val_obs.iter().map(|obs| obs.quantity as f64).collect();
        let val_pred: Vec<f64> = val_obs
            .iter()
            .map(|obs| fitted.predict_observation(obs))
            .collect();
        let mut model_metrics = metrics::evaluate_forecast(&val_actual, &val_pred)?;

        let bounds = fitted.native_intervals(&val_pred, ConfidenceLevel::NinetyFive);
        let lower: Vec<f64> = bounds.iter().map(|b| b.0).collect();
        let upper: Vec<f64> = bounds.iter().map(|b| b.1).collect();
        model_metrics.coverage = Some(metrics::coverage(&val_actual, &lower, &upper)?);

        fitted.residual_std = metrics::residual_std(&val_actual, &val_pred);

        Ok((fitted, model_metrics))
    }
}

impl FittedAdditive {
    /// Predicted value for a single date with explicit regressor values
    fn predict_date(&self, date: NaiveDate, regressor_values: &[f64]) -> f64 {
        let row = design_row(&self.components, self.start_date, date, regressor_values);
        backward(self.mode, utils::dot(&row, &self.coefficients))
    }

    /// Predicted value for an observed point, using its actual regressor
    /// values; this is the interleaved-historical back-testing path
    fn predict_observation(&self, obs: &Observation) -> f64 {
        self.predict_date(obs.date, &regressor_values(&self.regressors, obs))
    }

    /// Predict arbitrary dates, holding external regressors at the
    /// trailing mean observed in `context` (or the training fallback when
    /// the context carries no usable history).
    pub fn predict_dates(&self, context: &TimeSeries, dates: &[NaiveDate]) -> Vec<f64> {
        let fallback = if context.is_empty() {
            self.regressor_fallback.clone()
        } else {
            trailing_regressor_means(&self.regressors, context.observations())
        };
        dates
            .iter()
            .map(|&date| self.predict_date(date, &fallback))
            .collect()
    }

    /// Interval output from the model's own residual spread. Bounds are
    /// computed in fitting space, so multiplicative intervals widen with
    /// the level.
    pub fn native_intervals(
        &self,
        values: &[f64],
        level: ConfidenceLevel,
    ) -> Vec<(f64, f64)> {
        let margin = level.z_score() * self.sigma_native;
        values
            .iter()
            .map(|&v| {
                let center = forward(self.mode, v);
                (
                    backward(self.mode, center - margin),
                    backward(self.mode, center + margin),
                )
            })
            .collect()
    }

    /// Relative variance share of the trend and each seasonal component
    /// over a one-year grid, in percent
    pub fn component_importance(&self) -> Vec<(String, f64)> {
        let grid: Vec<NaiveDate> = (0..365)
            .map(|i| self.start_date + chrono::Duration::days(i))
            .collect();

        let mut shares: Vec<(String, f64)> = Vec::new();
        let trend: Vec<f64> = grid
            .iter()
            .map(|date| {
                let t = (*date - self.start_date).num_days() as f64;
                self.coefficients[1] * t
            })
            .collect();
        shares.push(("trend".to_string(), variance(&trend)));

        let mut offset = 2;
        for component in &self.components {
            let width = 2 * component.fourier_order;
            let partial: Vec<f64> = grid
                .iter()
                .map(|date| {
                    let day = date.num_days_from_ce() as f64;
                    let mut sum = 0.0;
                    for k in 1..=component.fourier_order {
                        let phase = 2.0 * PI * k as f64 * day / component.period_days;
                        let base = offset + 2 * (k - 1);
                        sum += self.coefficients[base] * phase.sin()
                            + self.coefficients[base + 1] * phase.cos();
                    }
                    sum
                })
                .collect();
            shares.push((component.name.clone(), variance(&partial)));
            offset += width;
        }

        let total: f64 = shares.iter().map(|(_, v)| v).sum();
        if total > 0.0 {
            for share in &mut shares {
                share.1 = share.1 / total * 100.0;
            }
        }
        shares
    }
}

impl FittedModel for FittedAdditive {
    fn kind(&self) -> ModelKind {
        ModelKind::AdditiveDecomposition
    }

    fn predict(&self, context: &TimeSeries, horizon: usize) -> Result<Vec<f64>> {
        let last = context.last_date().ok_or_else(|| {
            ForecastError::InsufficientData {
                required: 1,
                actual: 0,
            }
        })?;
        Ok(self.predict_dates(context, &utils::future_dates(last, horizon)))
    }

    fn evaluate(&self, series: &TimeSeries) -> Result<ModelMetrics> {
        let actual: Vec<f64> = series
            .observations()
            .iter()
            .map(|obs| obs.quantity as f64)
            .collect();
        let predicted: Vec<f64> = series
            .observations()
            .iter()
            .map(|obs| self.predict_observation(obs))
            .collect();
        metrics::evaluate_forecast(&actual, &predicted)
    }

    fn residual_std(&self) -> f64 {
        self.residual_std
    }
}

fn forward(mode: SeasonalityMode, value: f64) -> f64 {
    match mode {
        SeasonalityMode::Additive => value,
        SeasonalityMode::Multiplicative => (1.0 + value.max(0.0)).ln(),
    }
}

fn backward(mode: SeasonalityMode, value: f64) -> f64 {
    match mode {
        SeasonalityMode::Additive => value,
        SeasonalityMode::Multiplicative => value.exp() - 1.0,
    }
}

/// Calendar feature row: intercept, trend index, Fourier terms per
/// component, then external regressor values
fn design_row(
    components: &[SeasonalComponent],
    start_date: NaiveDate,
    date: NaiveDate,
    regressor_values: &[f64],
) -> Vec<f64> {
    let t = (date - start_date).num_days() as f64;
    let day = date.num_days_from_ce() as f64;

    let width = 2 + components.iter().map(|c| 2 * c.fourier_order).sum::<usize>()
        + regressor_values.len();
    let mut row = Vec::with_capacity(width);
    row.push(1.0);
    row.push(t);
    for component in components {
        for k in 1..=component.fourier_order {
            let phase = 2.0 * PI * k as f64 * day / component.period_days;
            row.push(phase.sin());
            row.push(phase.cos());
        }
    }
    row.extend_from_slice(regressor_values);
    row
}

fn regressor_values(regressors: &[String], obs: &Observation) -> Vec<f64> {
    regressors
        .iter()
        .map(|name| match name.as_str() {
            "revenue" => obs.revenue,
            _ => 0.0,
        })
        .collect()
}

/// Mean of each regressor over the trailing lookback window
fn trailing_regressor_means(regressors: &[String], observations: &[Observation]) -> Vec<f64> {
    let tail_start = observations.len().saturating_sub(REGRESSOR_LOOKBACK);
    let tail = &observations[tail_start..];
    regressors
        .iter()
        .map(|name| {
            let values: Vec<f64> = tail
                .iter()
                .map(|obs| regressor_values(std::slice::from_ref(name), obs)[0])
                .collect();
            utils::mean(&values)
        })
        .collect()
}

fn variance(values: &[f64]) -> f64 {
    let sd = utils::std_dev(values);
    sd * sd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic_history;
    use chrono::NaiveDate;
    use serde_json::json;

    fn series() -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        synthetic_history("SKU-1", start, 180, 11).unwrap()
    }

    fn train_default(data: &TimeSeries) -> (FittedAdditive, ModelMetrics) {
        let model = AdditiveModel::from_hyperparameters(&Hyperparameters::new()).unwrap();
        let prepared = model.prepare(data).unwrap();
        model.train(&prepared).unwrap()
    }

    #[test]
    fn test_train_reports_coverage() {
        let (_, metrics) = train_default(&series());
        let coverage = metrics.coverage.expect("additive training computes coverage");
        assert!((0.0..=100.0).contains(&coverage));
        assert!(metrics.mape >= 0.0);
    }

    #[test]
    fn test_predicts_any_future_date_directly() {
        let data = series();
        let (fitted, _) = train_default(&data);

        let far = data.last_date().unwrap() + chrono::Duration::days(300);
        let values = fitted.predict_dates(&data, &[far]);
        assert_eq!(values.len(), 1);
        assert!(values[0].is_finite());
    }

    #[test]
    fn test_native_intervals_bracket_predictions() {
        let data = series();
        let (fitted, _) = train_default(&data);
        let values = fitted.predict(&data, 7).unwrap();

        let bounds = fitted.native_intervals(&values, ConfidenceLevel::NinetyFive);
        for (value, (lower, upper)) in values.iter().zip(bounds.iter()) {
            assert!(lower <= value && value <= upper);
        }
    }

    #[test]
    fn test_custom_seasonality_and_regressor() {
        let hp = Hyperparameters::new()
            .set(
                "custom_seasonalities",
                json!([{ "name": "monthly", "period_days": 30.5, "fourier_order": 2 }]),
            )
            .set("regressors", json!(["revenue"]));
        let model = AdditiveModel::from_hyperparameters(&hp).unwrap();

        let data = series();
        let prepared = model.prepare(&data).unwrap();
        let (fitted, _) = model.train(&prepared).unwrap();
        assert_eq!(fitted.predict(&data, 5).unwrap().len(), 5);

        let importance = fitted.component_importance();
        assert!(importance.iter().any(|(name, _)| name == "monthly"));
        let total: f64 = importance.iter().map(|(_, share)| share).sum();
        assert!((total - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_unknown_regressor() {
        let hp = Hyperparameters::new().set("regressors", json!(["weather"]));
        assert!(matches!(
            AdditiveModel::from_hyperparameters(&hp),
            Err(ForecastError::InvalidHyperparameter(_))
        ));
    }

    #[test]
    fn test_multiplicative_mode_stays_positive() {
        let hp = Hyperparameters::new().set("seasonality_mode", "multiplicative");
        let model = AdditiveModel::from_hyperparameters(&hp).unwrap();
        let data = series();
        let prepared = model.prepare(&data).unwrap();
        let (fitted, _) = model.train(&prepared).unwrap();

        let values = fitted.predict(&data, 10).unwrap();
        assert!(values.iter().all(|v| *v > -1.0));
    }
}
