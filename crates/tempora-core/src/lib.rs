//! Temporal data analysis core.
//!
//! This crate ingests timestamped observations, regularizes them onto a
//! grid, and derives rolling statistics, anomaly reports and short-horizon
//! forecasts with uncertainty bounds.

pub mod anomaly;
pub mod calendar;
pub mod config;
pub mod decomposition;
pub mod error;
pub mod forecast;
pub mod metrics;
pub mod optimize;
pub mod order_stats;
pub mod pipeline;
pub mod resample;
pub mod rolling;
pub mod series;
pub mod stats;
pub mod store;

// Re-exports for convenience
pub use anomaly::{
    detect_anomalies, AnomalyDetector, AnomalyReport, AnomalyRule, AnomalyRuleKind,
    DetectionState, DetectorConfig, ZeroVariancePolicy,
};
pub use calendar::Interval;
pub use config::{AnalysisConfig, AnomalyRuleName};
pub use decomposition::{decompose_additive, Decomposition};
pub use error::{ErrorKind, Result, TemporaError};
pub use forecast::{
    linear_regression, z_score, FallbackMethod, ForecastConfig, ForecastMethod, ForecastModel,
    ForecastResult, Forecaster, LinearRegression, ModelState,
};
pub use metrics::{bias, coverage, forecast_coverage, mae, mse, r_squared, rmse};
pub use optimize::{minimize_bounded, SearchOptions, SearchResult};
pub use order_stats::OrderStatistics;
pub use pipeline::{analyze, AnalysisReport};
pub use resample::{
    detect_interval, interpolate_gaps, resample, resample_with, FillPolicy, ResampleOptions,
};
pub use rolling::{
    rolling_stats, QuantileValue, RollingConfig, RollingStats, StatSnapshot, StatsMode, Window,
};
pub use series::{Observation, Provenance, Series, Timestamp};
pub use stats::{describe, SeriesSummary};
pub use store::{DuplicatePolicy, SeriesStore, SharedStore, StoreConfig, StoreRange};
