use chrono::NaiveDate;
use forecast_engine::data::{
    synthetic_history, DataLoader, InMemoryTimeSeriesStore, Observation, TimeSeries,
    TimeSeriesStore,
};
use forecast_engine::error::ForecastError;
use pretty_assertions::assert_eq;
use std::io::Write;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_series_orders_and_deduplicates() {
    let observations = vec![
        Observation::new(date(2024, 1, 3), 30, 300.0).unwrap(),
        Observation::new(date(2024, 1, 1), 10, 100.0).unwrap(),
        Observation::new(date(2024, 1, 2), 20, 200.0).unwrap(),
        // Same date again: the later record wins
        Observation::new(date(2024, 1, 2), 25, 250.0).unwrap(),
    ];

    let series = TimeSeries::new("SKU-1", observations).unwrap();
    assert_eq!(series.len(), 3);
    assert_eq!(
        series.dates(),
        vec![date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)]
    );
    assert_eq!(series.quantities(), vec![10.0, 25.0, 30.0]);
    assert_eq!(series.last_date(), Some(date(2024, 1, 3)));
}

#[test]
fn test_negative_revenue_is_rejected() {
    assert!(Observation::new(date(2024, 1, 1), 5, -1.0).is_err());
    assert!(Observation::new(date(2024, 1, 1), 5, f64::NAN).is_err());
}

#[test]
fn test_store_append_and_lookup() {
    let store = InMemoryTimeSeriesStore::new();
    let first = vec![
        Observation::new(date(2024, 1, 1), 10, 100.0).unwrap(),
        Observation::new(date(2024, 1, 2), 20, 200.0).unwrap(),
    ];
    let summary = store.append("SKU-1", first).unwrap();
    assert_eq!(summary.records_total, 2);

    // Appending overlaps the second date; keep-latest applies
    let second = vec![
        Observation::new(date(2024, 1, 2), 99, 990.0).unwrap(),
        Observation::new(date(2024, 1, 3), 30, 300.0).unwrap(),
    ];
    let summary = store.append("SKU-1", second).unwrap();
    assert_eq!(summary.records_total, 3);
    assert_eq!(summary.date_range, Some((date(2024, 1, 1), date(2024, 1, 3))));

    let history = store.get_history("SKU-1").unwrap();
    assert_eq!(history.quantities(), vec![10.0, 99.0, 30.0]);
}

#[test]
fn test_unknown_entity_fails() {
    let store = InMemoryTimeSeriesStore::new();
    assert!(matches!(
        store.get_history("SKU-404"),
        Err(ForecastError::Validation(_))
    ));
}

#[test]
fn test_csv_loading() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "date,quantity,revenue").unwrap();
    writeln!(file, "2024-01-01,10,100.0").unwrap();
    writeln!(file, "2024-01-02,20,200.5").unwrap();
    file.flush().unwrap();

    let observations = DataLoader::from_csv(file.path()).unwrap();
    assert_eq!(observations.len(), 2);
    assert_eq!(observations[0].quantity, 10);
    assert_eq!(observations[1].revenue, 200.5);
}

#[test]
fn test_synthetic_history_is_reproducible() {
    let start = date(2024, 1, 1);
    let a = synthetic_history("SKU-1", start, 100, 7).unwrap();
    let b = synthetic_history("SKU-1", start, 100, 7).unwrap();
    assert_eq!(a.quantities(), b.quantities());
    assert_eq!(a.len(), 100);
    assert_eq!(a.last_date(), Some(start + chrono::Duration::days(99)));
}
