use assert_approx_eq::assert_approx_eq;
use forecast_engine::error::ForecastError;
use forecast_engine::preprocess::{MinMaxScaler, SequenceWindower};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn matrix() -> Vec<Vec<f64>> {
    vec![
        vec![10.0, 1.0],
        vec![20.0, 2.0],
        vec![30.0, 3.0],
        vec![40.0, 4.0],
    ]
}

#[test]
fn test_scaler_maps_fitted_range_to_unit_interval() {
    let scaler = MinMaxScaler::fit(&matrix()).unwrap();
    let scaled = scaler.transform(&matrix()).unwrap();

    assert_approx_eq!(scaled[0][0], 0.0);
    assert_approx_eq!(scaled[3][0], 1.0);
    assert_approx_eq!(scaled[1][1], 1.0 / 3.0);
}

#[rstest]
#[case(vec![15.0, 2.5])]
#[case(vec![0.0, 0.0])]
#[case(vec![55.0, 9.0])]
fn test_scaler_round_trip(#[case] row: Vec<f64>) {
    let scaler = MinMaxScaler::fit(&matrix()).unwrap();
    let restored = scaler
        .inverse_transform(&scaler.transform(&[row.clone()]).unwrap())
        .unwrap();
    for (original, recovered) in row.iter().zip(restored[0].iter()) {
        assert_approx_eq!(original, recovered, 1e-9);
    }
}

#[test]
fn test_constant_column_scales_to_zero() {
    let flat = vec![vec![5.0, 1.0], vec![5.0, 2.0]];
    let scaler = MinMaxScaler::fit(&flat).unwrap();

    assert_approx_eq!(scaler.transform_value(0, 5.0), 0.0);
    assert_approx_eq!(scaler.inverse_value(0, 0.0), 5.0);
}

#[test]
fn test_constant_column_round_trips_off_constant_values() {
    // Column 1 is constant in the fitted data; values away from the
    // constant must still survive a round trip
    let flat = vec![vec![10.0, 5.0], vec![20.0, 5.0], vec![30.0, 5.0]];
    let scaler = MinMaxScaler::fit(&flat).unwrap();

    let row = vec![15.0, 8.0];
    let restored = scaler
        .inverse_transform(&scaler.transform(&[row.clone()]).unwrap())
        .unwrap();
    assert_approx_eq!(restored[0][0], 15.0, 1e-9);
    assert_approx_eq!(restored[0][1], 8.0, 1e-9);
}

#[test]
fn test_scaler_rejects_width_mismatch() {
    let scaler = MinMaxScaler::fit(&matrix()).unwrap();
    assert!(matches!(
        scaler.transform(&[vec![1.0, 2.0, 3.0]]),
        Err(ForecastError::Validation(_))
    ));
}

#[rstest]
#[case(10, 3, 7)]
#[case(10, 9, 1)]
#[case(100, 14, 86)]
fn test_windower_produces_n_minus_l_pairs(
    #[case] rows: usize,
    #[case] window_len: usize,
    #[case] expected: usize,
) {
    let matrix: Vec<Vec<f64>> = (0..rows).map(|i| vec![i as f64, 0.0]).collect();
    let windower = SequenceWindower::new(window_len).unwrap();
    let pairs = windower.windows(&matrix, 0).unwrap();

    assert_eq!(pairs.len(), expected);
    // First target sits immediately after the first window
    assert_approx_eq!(pairs[0].target, window_len as f64);
    assert_eq!(pairs[0].target_row, window_len);
    assert_eq!(pairs[0].window.len(), window_len);
}

#[test]
fn test_windower_needs_more_rows_than_window() {
    let matrix: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64]).collect();
    let windower = SequenceWindower::new(5).unwrap();
    assert!(matches!(
        windower.windows(&matrix, 0),
        Err(ForecastError::InsufficientData {
            required: 6,
            actual: 5
        })
    ));
}
