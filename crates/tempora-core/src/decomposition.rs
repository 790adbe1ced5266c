//! Additive decomposition into trend, seasonal and residual parts.
//!
//! Wraps fdars-core's LOESS trend extraction and Fourier seasonal fit.

use crate::error::{Result, TemporaError};
use fdars_core::detrend::{
    decompose_additive as fdars_decompose_additive, detrend_loess as fdars_detrend_loess,
};

/// LOESS bandwidth used for trend extraction.
pub const TREND_BANDWIDTH: f64 = 0.3;

/// Fourier harmonics fitted to the seasonal component.
pub const SEASONAL_HARMONICS: usize = 3;

/// Shortest series a trend-only decomposition accepts.
pub const MIN_TREND_POINTS: usize = 4;

/// Result of an additive decomposition; all components have the input length.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
    /// Seasonal period used, `None` for a trend-only decomposition.
    pub period: Option<usize>,
}

/// Create argvals (time points) for a series of given length.
fn make_argvals(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64).collect()
}

/// Decompose `values` as `trend + seasonal + residual`.
///
/// With a period of at least 2 the trend is a LOESS fit and the seasonal
/// part a Fourier fit at that period. Without one, only the LOESS trend is
/// removed and the seasonal component is zero.
pub fn decompose_additive(values: &[f64], period: Option<usize>) -> Result<Decomposition> {
    let period = period.filter(|&p| p >= 2);
    let n = values.len();
    let argvals = make_argvals(n);

    match period {
        Some(p) => {
            if n < 2 * p {
                return Err(TemporaError::InsufficientData {
                    needed: 2 * p,
                    got: n,
                });
            }
            // Harmonics above p/2 alias onto lower ones
            let harmonics = SEASONAL_HARMONICS.min(p / 2).max(1);
            let result = fdars_decompose_additive(
                values,
                n,
                1,
                &argvals,
                p as f64,
                "loess",
                TREND_BANDWIDTH,
                harmonics,
            );
            Ok(Decomposition {
                trend: result.trend,
                seasonal: result.seasonal,
                residual: result.remainder,
                period: Some(p),
            })
        }
        None => {
            if n < MIN_TREND_POINTS {
                return Err(TemporaError::InsufficientData {
                    needed: MIN_TREND_POINTS,
                    got: n,
                });
            }
            let result = fdars_detrend_loess(values, n, 1, &argvals, TREND_BANDWIDTH, 1);
            Ok(Decomposition {
                trend: result.trend,
                seasonal: vec![0.0; n],
                residual: result.detrended,
                period: None,
            })
        }
    }
}

/// Median absolute deviation scaled to match the standard deviation of a
/// normal distribution.
pub fn robust_scale(values: &[f64]) -> Option<f64> {
    let center = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations).map(|mad| 1.4826 * mad)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}
