//! Shared numeric helpers for the model backends

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};

/// Index splitting a series of length `n` into a training head and a
/// validation tail. Time order is preserved; the validation slice always
/// holds at least one point and never swallows the whole series.
pub fn validation_split_index(n: usize, split: f64) -> Result<usize> {
    if !(0.0..1.0).contains(&split) || split == 0.0 {
        return Err(ForecastError::InvalidHyperparameter(format!(
            "validation_split must be in (0, 1), got {}",
            split
        )));
    }
    if n < 2 {
        return Err(ForecastError::InsufficientData {
            required: 2,
            actual: n,
        });
    }

    let n_val = ((n as f64 * split).round() as usize).clamp(1, n - 1);
    Ok(n - n_val)
}

/// Consecutive daily dates following `last`
pub fn future_dates(last: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    (1..=horizon as i64)
        .map(|offset| last + Duration::days(offset))
        .collect()
}

/// Arithmetic mean
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Solve the linear system `a * x = b` by Gaussian elimination with
/// partial pivoting. Fails on a singular (or numerically singular) matrix.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = a.len();
    if n == 0 || b.len() != n {
        return Err(ForecastError::Training(
            "Empty or inconsistent linear system".to_string(),
        ));
    }

    for col in 0..n {
        // Pick the largest remaining pivot for stability
        let mut pivot = col;
        for row in col + 1..n {
            if a[row][col].abs() > a[pivot][col].abs() {
                pivot = row;
            }
        }
        if a[pivot][col].abs() < 1e-12 {
            return Err(ForecastError::Training(
                "Singular normal equations; features are collinear".to_string(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    // Back substitution
    let mut x = vec![0.0; n];
    for col in (0..n).rev() {
        let mut sum = b[col];
        for k in col + 1..n {
            sum -= a[col][k] * x[k];
        }
        x[col] = sum / a[col][col];
    }

    Ok(x)
}

/// Fit `y ≈ X w` in the least-squares sense via the normal equations,
/// optionally with a ridge penalty `lambda` on every coefficient except
/// the one at `penalty_free` (conventionally the intercept column).
pub fn solve_least_squares(
    design: &[Vec<f64>],
    targets: &[f64],
    lambda: f64,
    penalty_free: Option<usize>,
) -> Result<Vec<f64>> {
    if design.is_empty() || design.len() != targets.len() {
        return Err(ForecastError::Training(
            "Design matrix and targets must have the same non-zero length".to_string(),
        ));
    }
    let k = design[0].len();
    if k == 0 || design.iter().any(|row| row.len() != k) {
        return Err(ForecastError::Training(
            "Design matrix rows must have a consistent non-zero width".to_string(),
        ));
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &y) in design.iter().zip(targets.iter()) {
        for i in 0..k {
            xty[i] += row[i] * y;
            for j in i..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    // Mirror the upper triangle
    for i in 0..k {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }

    if lambda > 0.0 {
        for (i, row) in xtx.iter_mut().enumerate() {
            if penalty_free != Some(i) {
                row[i] += lambda;
            }
        }
    }

    solve_linear_system(xtx, xty)
}

/// Dot product of two equally sized slices
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
