//! End-to-end analysis of one series: ingest, clean, summarize, detect and
//! forecast in a single call.

use crate::anomaly::{detect_anomalies, AnomalyReport};
use crate::calendar::Interval;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::forecast::{ForecastResult, Forecaster};
use crate::resample::{detect_interval, resample_with};
use crate::rolling::{rolling_stats, StatSnapshot};
use crate::series::{Series, Timestamp};
use crate::stats::{describe, SeriesSummary};
use crate::store::SeriesStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Everything produced by [`analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Grid spacing the series was resampled onto.
    pub interval: Interval,
    pub cleaned: Series,
    pub summary: SeriesSummary,
    pub statistics: Vec<StatSnapshot>,
    pub anomalies: Vec<AnomalyReport>,
    /// Empty when the cleaned series is too short to forecast.
    pub forecasts: Vec<ForecastResult>,
    /// Method that produced `forecasts`; differs from the configured one
    /// after a fallback.
    pub forecast_method: Option<String>,
}

impl AnalysisReport {
    /// Reports flagged as anomalous.
    pub fn flagged(&self) -> impl Iterator<Item = &AnomalyReport> {
        self.anomalies.iter().filter(|r| r.is_anomaly)
    }
}

/// Run the full analysis over raw `(timestamp, value)` pairs.
///
/// Insufficient history for forecasting is not an error here: the report
/// simply carries no forecasts. Every other failure is returned.
pub fn analyze<I>(pairs: I, config: &AnalysisConfig) -> Result<AnalysisReport>
where
    I: IntoIterator<Item = (Timestamp, f64)>,
{
    config.validate()?;

    let raw = SeriesStore::from_pairs(config.store, pairs)?.into_series();
    let interval = match config.interval {
        Some(interval) => interval,
        None => detect_interval(&raw)?,
    };
    let cleaned = resample_with(&raw, &config.resample_options(interval))?;
    debug!(
        raw = raw.len(),
        cleaned = cleaned.len(),
        ?interval,
        "series cleaned"
    );

    let summary = describe(&cleaned)?;
    let statistics = rolling_stats(&cleaned, &config.rolling_config())?;
    let anomalies = detect_anomalies(&cleaned, &config.detector_config())?;

    let mut forecast_config = config.forecast_config();
    forecast_config.interval = Some(interval);
    let mut forecaster = Forecaster::new(forecast_config)?;
    let (forecasts, forecast_method) = match forecaster.fit_with_fallback(&cleaned) {
        Ok(()) => (
            forecaster.forecast()?,
            Some(forecaster.method_name().to_string()),
        ),
        Err(e) if e.is_insufficiency() => {
            debug!(error = %e, "skipping forecast");
            (Vec::new(), None)
        }
        Err(e) => return Err(e),
    };

    info!(
        observations = cleaned.len(),
        anomalies = anomalies.iter().filter(|r| r.is_anomaly).count(),
        forecasts = forecasts.len(),
        "analysis complete"
    );

    Ok(AnalysisReport {
        interval,
        cleaned,
        summary,
        statistics,
        anomalies,
        forecasts,
        forecast_method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemporaError;
    use crate::resample::FillPolicy;
    use crate::series::Provenance;

    #[test]
    fn test_analyze_spike_without_forecast() {
        let config = AnalysisConfig {
            window_size: 3,
            ..Default::default()
        };
        let pairs = [(0, 10.0), (1, 12.0), (2, 11.0), (3, 50.0), (4, 13.0)];
        let report = analyze(pairs, &config).unwrap();

        assert_eq!(report.interval, Interval::Fixed(1));
        assert_eq!(report.cleaned.len(), 5);
        let flagged: Vec<_> = report.flagged().map(|r| r.timestamp).collect();
        assert_eq!(flagged, vec![3]);
        // Five points is below the default forecasting history
        assert!(report.forecasts.is_empty());
        assert_eq!(report.forecast_method, None);
    }

    #[test]
    fn test_analyze_fills_and_forecasts() {
        let config = AnalysisConfig {
            window_size: 4,
            fill_policy: FillPolicy::LinearInterpolate,
            horizon: 3,
            ..Default::default()
        };
        let pairs: Vec<(i64, f64)> = (0..20)
            .filter(|t| *t != 7)
            .map(|t| (t * 100, 2.0 * t as f64))
            .collect();
        let report = analyze(pairs, &config).unwrap();

        assert_eq!(report.cleaned.len(), 20);
        let filled = report.cleaned.at(700).unwrap();
        assert_eq!(filled.provenance, Provenance::Imputed);
        assert_eq!(filled.value, Some(14.0));
        assert_eq!(report.summary.imputed, 1);

        assert_eq!(report.forecasts.len(), 3);
        assert_eq!(report.forecasts[0].horizon_timestamp, 2000);
        assert_eq!(report.forecast_method.as_deref(), Some("Holt"));
    }

    #[test]
    fn test_analyze_rejects_bad_input() {
        let config = AnalysisConfig::default();
        assert!(matches!(
            analyze([(5, 1.0), (3, 2.0)], &config),
            Err(TemporaError::OutOfOrder { .. })
        ));
        assert!(matches!(
            analyze([(0, 1.0)], &config),
            Err(TemporaError::InsufficientData { .. })
        ));
    }
}
