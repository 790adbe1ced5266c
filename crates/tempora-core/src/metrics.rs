//! Accuracy metrics for evaluating forecasts against held-out observations.
//!
//! | Metric | Use When |
//! |--------|----------|
//! | MAE | Need interpretable error in original units |
//! | RMSE | Want to penalize large errors more heavily |
//! | Bias | Checking for systematic over- or under-prediction |
//! | R² | Need explained variance proportion |
//! | Coverage | Checking that forecast bounds hold their nominal level |

use crate::error::{Result, TemporaError};
use crate::forecast::ForecastResult;

/// Mean Absolute Error.
///
/// # Formula
/// MAE = (1/n) * Σ|actual_i - forecast_i|
///
/// # Example
/// ```
/// use tempora_core::metrics::mae;
/// let actual = vec![1.0, 2.0, 3.0];
/// let forecast = vec![1.1, 2.2, 2.8];
/// let error = mae(&actual, &forecast).unwrap();
/// assert!((error - 0.166).abs() < 0.01);
/// ```
pub fn mae(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;
    let sum: f64 = actual
        .iter()
        .zip(forecast.iter())
        .map(|(a, f)| (a - f).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Mean Squared Error.
///
/// # Formula
/// MSE = (1/n) * Σ(actual_i - forecast_i)²
pub fn mse(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;
    let sum: f64 = actual
        .iter()
        .zip(forecast.iter())
        .map(|(a, f)| (a - f).powi(2))
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Root Mean Squared Error, in the units of the series.
pub fn rmse(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    mse(actual, forecast).map(f64::sqrt)
}

/// Coefficient of determination.
///
/// A constant `actual` has no variance to explain: a perfect fit scores 1,
/// anything else 0.
pub fn r_squared(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;

    let mean: f64 = actual.iter().sum::<f64>() / actual.len() as f64;

    let ss_res: f64 = actual
        .iter()
        .zip(forecast.iter())
        .map(|(a, f)| (a - f).powi(2))
        .sum();

    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot.abs() < f64::EPSILON {
        return Ok(if ss_res.abs() < f64::EPSILON { 1.0 } else { 0.0 });
    }

    Ok(1.0 - ss_res / ss_tot)
}

/// Forecast bias (mean error). Positive means forecasts run high.
///
/// # Formula
/// Bias = (1/n) * Σ(forecast_i - actual_i)
pub fn bias(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;
    let sum: f64 = actual.iter().zip(forecast.iter()).map(|(a, f)| f - a).sum();
    Ok(sum / actual.len() as f64)
}

/// Fraction of `actual` values that fall inside `[lower, upper]`.
pub fn coverage(actual: &[f64], lower: &[f64], upper: &[f64]) -> Result<f64> {
    if actual.len() != lower.len() || actual.len() != upper.len() {
        return Err(TemporaError::InvalidInput(
            "All arrays must have the same length".to_string(),
        ));
    }
    if actual.is_empty() {
        return Err(TemporaError::InsufficientData { needed: 1, got: 0 });
    }

    let covered = actual
        .iter()
        .zip(lower.iter())
        .zip(upper.iter())
        .filter(|((a, l), u)| *a >= *l && *a <= *u)
        .count();

    Ok(covered as f64 / actual.len() as f64)
}

/// Coverage of forecast bounds against the values later observed for them.
pub fn forecast_coverage(results: &[ForecastResult], actual: &[f64]) -> Result<f64> {
    let lower: Vec<f64> = results.iter().map(|r| r.lower_bound).collect();
    let upper: Vec<f64> = results.iter().map(|r| r.upper_bound).collect();
    coverage(actual, &lower, &upper)
}

fn validate_inputs(actual: &[f64], forecast: &[f64]) -> Result<()> {
    if actual.len() != forecast.len() {
        return Err(TemporaError::InvalidInput(format!(
            "Actual and forecast arrays must have the same length: {} vs {}",
            actual.len(),
            forecast.len()
        )));
    }
    if actual.is_empty() {
        return Err(TemporaError::InsufficientData { needed: 1, got: 0 });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mae() {
        let actual = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let forecast = vec![1.1, 2.2, 2.9, 4.1, 4.8];
        let result = mae(&actual, &forecast).unwrap();
        assert_relative_eq!(result, 0.14, epsilon = 0.01);
    }

    #[test]
    fn test_mse_and_rmse() {
        let actual = vec![1.0, 2.0, 3.0];
        let forecast = vec![1.0, 2.0, 4.0];
        assert_relative_eq!(mse(&actual, &forecast).unwrap(), 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(
            rmse(&actual, &forecast).unwrap(),
            (1.0f64 / 3.0).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_r_squared() {
        let actual = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(r_squared(&actual, &actual).unwrap(), 1.0);
        let mean = vec![3.0; 5];
        assert_relative_eq!(r_squared(&actual, &mean).unwrap(), 0.0);
        assert_relative_eq!(r_squared(&[2.0, 2.0], &[2.0, 2.0]).unwrap(), 1.0);
        assert_relative_eq!(r_squared(&[2.0, 2.0], &[1.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_bias_sign() {
        let actual = vec![1.0, 2.0, 3.0];
        assert_relative_eq!(bias(&actual, &[2.0, 3.0, 4.0]).unwrap(), 1.0);
        assert_relative_eq!(bias(&actual, &[0.0, 1.0, 2.0]).unwrap(), -1.0);
    }

    #[test]
    fn test_coverage() {
        let actual = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let lower = vec![0.5, 1.5, 2.5, 3.5, 5.5];
        let upper = vec![1.5, 2.5, 3.5, 4.5, 6.5];
        assert_relative_eq!(coverage(&actual, &lower, &upper).unwrap(), 0.8);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            mae(&[1.0, 2.0], &[1.0]),
            Err(TemporaError::InvalidInput(_))
        ));
        assert_eq!(
            mse(&[], &[]).unwrap_err(),
            TemporaError::InsufficientData { needed: 1, got: 0 }
        );
    }
}
