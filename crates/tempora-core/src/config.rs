//! Flat analysis configuration, as supplied by an external loader.
//!
//! Every field has a default, so a JSON document only needs the keys it
//! wants to change:
//!
//! ```
//! use tempora_core::config::AnalysisConfig;
//! let config = AnalysisConfig::from_json_str(r#"{"window_size": 5, "anomaly_k": 2.5}"#).unwrap();
//! assert_eq!(config.window_size, 5);
//! ```

use crate::anomaly::{AnomalyRuleKind, DetectorConfig, ZeroVariancePolicy};
use crate::calendar::Interval;
use crate::error::{Result, TemporaError};
use crate::forecast::{FallbackMethod, ForecastConfig, ForecastMethod};
use crate::optimize::SearchOptions;
use crate::resample::{FillPolicy, ResampleOptions};
use crate::rolling::{RollingConfig, StatsMode, Window};
use crate::store::{DuplicatePolicy, StoreConfig};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Anomaly rule selected by name; its parameters live in [`AnalysisConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyRuleName {
    #[default]
    ZScore,
    Residual,
}

impl FromStr for AnomalyRuleName {
    type Err = TemporaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match AnomalyRuleKind::from_str(s)? {
            AnomalyRuleKind::ZScore { .. } => Ok(Self::ZScore),
            AnomalyRuleKind::Residual { .. } => Ok(Self::Residual),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Rolling and reference window length in slots.
    pub window_size: usize,
    /// Time-based window in microseconds; overrides `window_size` when set.
    pub window_duration: Option<i64>,
    pub quantiles: Vec<f64>,
    pub stats_mode: StatsMode,

    pub store: StoreConfig,
    /// Grid spacing; detected from the data when unset.
    pub interval: Option<Interval>,
    pub fill_policy: FillPolicy,
    pub aggregation: DuplicatePolicy,

    pub anomaly_rule: AnomalyRuleName,
    /// Z-score multiplier, or residual threshold for the residual rule.
    pub anomaly_k: f64,
    /// Seasonal period for the residual rule.
    pub seasonal_period: Option<usize>,
    /// Detector warm-up length; defaults to the window size.
    pub warmup: Option<usize>,
    pub imputed_confidence: f64,
    pub zero_variance: ZeroVariancePolicy,
    pub zero_variance_tolerance: f64,

    pub forecast_method: ForecastMethod,
    pub horizon: usize,
    pub confidence_level: f64,
    /// Forecaster history requirement; defaults per method.
    pub min_history: Option<usize>,
    pub fallback: FallbackMethod,
    pub search: SearchOptions,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            window_duration: None,
            quantiles: vec![0.25, 0.5, 0.75],
            stats_mode: StatsMode::Raw,
            store: StoreConfig::default(),
            interval: None,
            fill_policy: FillPolicy::None,
            aggregation: DuplicatePolicy::Average,
            anomaly_rule: AnomalyRuleName::ZScore,
            anomaly_k: 3.0,
            seasonal_period: None,
            warmup: None,
            imputed_confidence: 0.5,
            zero_variance: ZeroVariancePolicy::FlagAnyDeviation,
            zero_variance_tolerance: 0.0,
            forecast_method: ForecastMethod::Holt,
            horizon: 12,
            confidence_level: 0.95,
            min_history: None,
            fallback: FallbackMethod::Naive,
            search: SearchOptions::default(),
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TemporaError::InvalidInput(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TemporaError::InvalidInput(format!("cannot serialize configuration: {}", e)))
    }

    /// Check every section; the first violation is returned.
    pub fn validate(&self) -> Result<()> {
        if let Some(interval) = self.interval {
            interval.validate()?;
        }
        self.rolling_config().validate()?;
        self.detector_config().validate()?;
        self.forecast_config().validate()
    }

    pub fn window(&self) -> Window {
        match self.window_duration {
            Some(d) => Window::Duration(d),
            None => Window::Count(self.window_size),
        }
    }

    pub fn rolling_config(&self) -> RollingConfig {
        RollingConfig {
            window: self.window(),
            quantiles: self.quantiles.clone(),
            mode: self.stats_mode,
        }
    }

    pub fn resample_options(&self, interval: Interval) -> ResampleOptions {
        ResampleOptions {
            interval,
            fill_policy: self.fill_policy,
            aggregation: self.aggregation,
        }
    }

    pub fn anomaly_rule_kind(&self) -> AnomalyRuleKind {
        match self.anomaly_rule {
            AnomalyRuleName::ZScore => AnomalyRuleKind::ZScore { k: self.anomaly_k },
            AnomalyRuleName::Residual => AnomalyRuleKind::Residual {
                period: self.seasonal_period,
                threshold: self.anomaly_k,
            },
        }
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            window: self.window(),
            rule: self.anomaly_rule_kind(),
            min_history: self.warmup,
            imputed_confidence: self.imputed_confidence,
            zero_variance: self.zero_variance,
            zero_variance_tolerance: self.zero_variance_tolerance,
            stats_mode: self.stats_mode,
        }
    }

    pub fn forecast_config(&self) -> ForecastConfig {
        ForecastConfig {
            method: self.forecast_method,
            horizon: self.horizon,
            confidence_level: self.confidence_level,
            min_history: self.min_history,
            interval: self.interval,
            search: self.search,
            fallback: self.fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        config.validate().unwrap();
        assert_eq!(config.window(), Window::Count(10));
        assert_eq!(
            config.anomaly_rule_kind(),
            AnomalyRuleKind::ZScore { k: 3.0 }
        );
        assert_eq!(config.forecast_config().effective_min_history(), 10);
    }

    #[test]
    fn test_from_json_partial() {
        let config = AnalysisConfig::from_json_str(
            r#"{
                "window_size": 3,
                "fill_policy": "forward_fill",
                "anomaly_rule": "residual",
                "anomaly_k": 4.0,
                "seasonal_period": 7,
                "forecast_method": {"method": "holt_winters", "period": 7},
                "confidence_level": 0.9,
                "interval": {"fixed": 60000000}
            }"#,
        )
        .unwrap();
        assert_eq!(config.window_size, 3);
        assert_eq!(config.fill_policy, FillPolicy::ForwardFill);
        assert_eq!(
            config.anomaly_rule_kind(),
            AnomalyRuleKind::Residual {
                period: Some(7),
                threshold: 4.0
            }
        );
        assert_eq!(
            config.forecast_method,
            ForecastMethod::HoltWinters { period: 7 }
        );
        assert_eq!(config.interval, Some(Interval::seconds(60)));
        assert_eq!(config.forecast_config().effective_min_history(), 14);
        // Untouched keys keep their defaults
        assert_eq!(config.horizon, 12);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AnalysisConfig::from_json_str(r#"{"confidence_level": 1.5}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = AnalysisConfig::from_json_str(r#"{"window_size": 0}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = AnalysisConfig::from_json_str(r#"{"anomaly_k": -1}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        assert!(AnalysisConfig::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AnalysisConfig {
            window_duration: Some(3_600_000_000),
            ..Default::default()
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(AnalysisConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_rule_name_from_str() {
        assert_eq!(
            "Z_SCORE".parse::<AnomalyRuleName>().unwrap(),
            AnomalyRuleName::ZScore
        );
        assert!("iforest".parse::<AnomalyRuleName>().is_err());
    }
}
