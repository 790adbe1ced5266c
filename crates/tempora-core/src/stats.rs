//! Whole-series descriptive statistics.

use crate::error::{Result, TemporaError};
use crate::order_stats::OrderStatistics;
use crate::series::Series;
use serde::{Deserialize, Serialize};

/// Summary of one series. Value aggregates cover present observations
/// (observed and imputed); they are `None` when too few exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    /// Total number of observations, missing slots included
    pub length: usize,
    /// Observations carrying a value
    pub count: usize,
    pub missing: usize,
    pub imputed: usize,
    pub mean: Option<f64>,
    /// Sample variance (n - 1); needs two values
    pub variance: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// First quartile (25th percentile)
    pub q1: Option<f64>,
    pub median: Option<f64>,
    /// Third quartile (75th percentile)
    pub q3: Option<f64>,
    /// Interquartile range (q3 - q1)
    pub iqr: Option<f64>,
    /// Lag-1 autocorrelation of the present values
    pub autocorr_lag1: Option<f64>,
}

/// Compute descriptive statistics for `series`.
pub fn describe(series: &Series) -> Result<SeriesSummary> {
    if series.is_empty() {
        return Err(TemporaError::InsufficientData { needed: 1, got: 0 });
    }

    let values: Vec<f64> = series.iter().filter_map(|o| o.value).collect();
    let imputed = series.iter().filter(|o| o.is_imputed()).count();
    let mut summary = SeriesSummary {
        length: series.len(),
        count: values.len(),
        missing: series.len() - values.len(),
        imputed,
        ..Default::default()
    };
    if values.is_empty() {
        return Ok(summary);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    summary.mean = Some(mean);
    if values.len() >= 2 {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        summary.variance = Some(variance);
        summary.std_dev = Some(variance.sqrt());
    }

    let mut order = OrderStatistics::with_capacity(values.len());
    for &v in &values {
        order.insert(v);
    }
    summary.min = order.min();
    summary.max = order.max();
    summary.q1 = order.quantile(0.25);
    summary.median = order.quantile(0.5);
    summary.q3 = order.quantile(0.75);
    summary.iqr = summary.q3.zip(summary.q1).map(|(q3, q1)| q3 - q1);
    summary.autocorr_lag1 = autocorrelation(&values, mean, 1);

    Ok(summary)
}

fn autocorrelation(values: &[f64], mean: f64, lag: usize) -> Option<f64> {
    if values.len() <= lag {
        return None;
    }
    let denom: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    if denom < f64::EPSILON {
        return None;
    }
    let num: f64 = values
        .windows(lag + 1)
        .map(|w| (w[0] - mean) * (w[lag] - mean))
        .sum();
    Some(num / denom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Observation;
    use approx::assert_relative_eq;

    #[test]
    fn test_describe_basic() {
        let series =
            Series::from_pairs((0..5).map(|i| (i as i64, [2.0, 4.0, 4.0, 5.0, 10.0][i]))).unwrap();
        let s = describe(&series).unwrap();
        assert_eq!(s.length, 5);
        assert_eq!(s.count, 5);
        assert_eq!(s.missing, 0);
        assert_relative_eq!(s.mean.unwrap(), 5.0);
        assert_relative_eq!(s.variance.unwrap(), 9.0);
        assert_relative_eq!(s.std_dev.unwrap(), 3.0);
        assert_eq!(s.min, Some(2.0));
        assert_eq!(s.max, Some(10.0));
        assert_relative_eq!(s.median.unwrap(), 4.0);
        assert_relative_eq!(s.q1.unwrap(), 4.0);
        assert_relative_eq!(s.q3.unwrap(), 5.0);
        assert_relative_eq!(s.iqr.unwrap(), 1.0);
    }

    #[test]
    fn test_describe_with_gaps() {
        let series = Series::from_observations(vec![
            Observation::observed(0, 1.0),
            Observation::missing(1),
            Observation::imputed(2, 3.0),
        ])
        .unwrap();
        let s = describe(&series).unwrap();
        assert_eq!(s.length, 3);
        assert_eq!(s.count, 2);
        assert_eq!(s.missing, 1);
        assert_eq!(s.imputed, 1);
        assert_relative_eq!(s.mean.unwrap(), 2.0);
    }

    #[test]
    fn test_describe_single_and_empty() {
        let single = Series::from_pairs([(0, 7.0)]).unwrap();
        let s = describe(&single).unwrap();
        assert_eq!(s.mean, Some(7.0));
        assert_eq!(s.variance, None);
        assert_eq!(s.autocorr_lag1, None);

        let all_missing = Series::from_observations(vec![Observation::missing(0)]).unwrap();
        let s = describe(&all_missing).unwrap();
        assert_eq!(s.count, 0);
        assert_eq!(s.mean, None);

        assert!(describe(&Series::new()).is_err());
    }

    #[test]
    fn test_autocorrelation_alternating() {
        let series =
            Series::from_pairs((0..10).map(|i| (i as i64, if i % 2 == 0 { 1.0 } else { -1.0 })))
                .unwrap();
        let s = describe(&series).unwrap();
        assert_relative_eq!(s.autocorr_lag1.unwrap(), -0.9, epsilon = 1e-12);
    }
}
