//! Short-horizon forecasting with uncertainty bounds.
//!
//! A [`Forecaster`] owns one fitted [`ForecastModel`] and the series
//! bookkeeping around it (last timestamp, grid interval, state version).
//! Models keep their smoothing state between calls, so feeding a new
//! observation through [`Forecaster::update`] is O(1) and never refits.

use crate::calendar::Interval;
use crate::error::{Result, TemporaError};
use crate::optimize::{minimize_bounded, SearchOptions};
use crate::resample::{detect_interval, interpolate_gaps};
use crate::series::{Series, Timestamp};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt::Debug;
use std::str::FromStr;
use tracing::{debug, warn};

/// History required by non-seasonal methods when none is configured.
pub const DEFAULT_MIN_HISTORY: usize = 10;

/// Forecasting method selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ForecastMethod {
    /// Double exponential smoothing (level + trend).
    #[default]
    Holt,
    /// Additive Holt-Winters with the given seasonal period.
    HoltWinters { period: usize },
    /// Ordinary least squares trend line over the observation index.
    LinearTrend,
    /// Repeat the last value.
    Naive,
    /// Repeat the historical mean.
    Mean,
}

impl FromStr for ForecastMethod {
    type Err = TemporaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "holt" | "double_exponential" | "des" => Ok(Self::Holt),
            "linear" | "linear_trend" | "ols" => Ok(Self::LinearTrend),
            "naive" | "last" | "last_value" => Ok(Self::Naive),
            "mean" | "average" => Ok(Self::Mean),
            other => {
                // holt_winters:<period>
                if let Some(period) = other
                    .strip_prefix("holt_winters:")
                    .or_else(|| other.strip_prefix("hw:"))
                {
                    let period = period.parse().map_err(|_| {
                        TemporaError::invalid_parameter("period", period, "expected an integer")
                    })?;
                    return Ok(Self::HoltWinters { period });
                }
                Err(TemporaError::invalid_parameter(
                    "forecast_method",
                    s,
                    "expected holt, holt_winters:<period>, linear_trend, naive or mean",
                ))
            }
        }
    }
}

impl ForecastMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ForecastMethod::Holt => "Holt",
            ForecastMethod::HoltWinters { .. } => "HoltWinters",
            ForecastMethod::LinearTrend => "LinearTrend",
            ForecastMethod::Naive => "Naive",
            ForecastMethod::Mean => "Mean",
        }
    }

    pub fn seasonal_period(&self) -> Option<usize> {
        match self {
            ForecastMethod::HoltWinters { period } => Some(*period),
            _ => None,
        }
    }

    /// Default history requirement: twice the seasonal period, or
    /// [`DEFAULT_MIN_HISTORY`] for non-seasonal methods.
    pub fn default_min_history(&self) -> usize {
        self.seasonal_period()
            .map_or(DEFAULT_MIN_HISTORY, |p| 2 * p)
    }

    pub fn build(&self) -> Box<dyn ForecastModel> {
        match *self {
            ForecastMethod::Holt => Box::new(HoltModel::default()),
            ForecastMethod::HoltWinters { period } => Box::new(HoltWintersModel::new(period)),
            ForecastMethod::LinearTrend => Box::new(LinearTrendModel::default()),
            ForecastMethod::Naive => Box::new(NaiveModel::default()),
            ForecastMethod::Mean => Box::new(MeanModel::default()),
        }
    }
}

/// Methods substituted when a fitted method fails to converge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMethod {
    #[default]
    Naive,
    Mean,
}

impl From<FallbackMethod> for ForecastMethod {
    fn from(f: FallbackMethod) -> Self {
        match f {
            FallbackMethod::Naive => ForecastMethod::Naive,
            FallbackMethod::Mean => ForecastMethod::Mean,
        }
    }
}

/// Forecaster configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub method: ForecastMethod,
    pub horizon: usize,
    /// Two-sided coverage of the bounds, in `(0, 1)`.
    pub confidence_level: f64,
    /// Overrides the method's default history requirement.
    pub min_history: Option<usize>,
    /// Grid spacing for horizon timestamps; detected from the series if unset.
    pub interval: Option<Interval>,
    pub search: SearchOptions,
    pub fallback: FallbackMethod,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            method: ForecastMethod::Holt,
            horizon: 12,
            confidence_level: 0.95,
            min_history: None,
            interval: None,
            search: SearchOptions::default(),
            fallback: FallbackMethod::Naive,
        }
    }
}

impl ForecastConfig {
    pub fn effective_min_history(&self) -> usize {
        self.min_history
            .unwrap_or_else(|| self.method.default_min_history())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(TemporaError::invalid_parameter(
                "confidence_level",
                self.confidence_level,
                "must be between 0 and 1 (exclusive)",
            ));
        }
        if self.horizon == 0 {
            return Err(TemporaError::invalid_parameter(
                "horizon",
                0,
                "must be positive",
            ));
        }
        if let Some(period) = self.method.seasonal_period() {
            if period < 2 {
                return Err(TemporaError::invalid_parameter(
                    "period",
                    period,
                    "seasonal period must be at least 2",
                ));
            }
        }
        if let Some(interval) = self.interval {
            interval.validate()?;
        }
        Ok(())
    }
}

/// Snapshot of a model's internal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub level: f64,
    pub trend: f64,
    /// Smoothing parameters in fit order (e.g. alpha, beta, gamma).
    pub fitted_params: Vec<f64>,
    pub residual_variance: f64,
}

/// A forecasting strategy with incrementally updatable state.
pub trait ForecastModel: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Smallest history the model can be fitted on at all.
    fn min_required(&self) -> usize;

    /// Fit from scratch on `values`.
    fn fit(&mut self, values: &[f64], search: &SearchOptions) -> Result<()>;

    /// Absorb one new value with the fitted parameters.
    fn update(&mut self, value: f64);

    /// Point forecasts for steps `1..=horizon`.
    fn predict(&self, horizon: usize) -> Vec<f64>;

    fn state(&self) -> ModelState;

    /// Mean squared one-step-ahead error seen so far.
    fn residual_variance(&self) -> f64 {
        self.state().residual_variance
    }
}

/// Running one-step-ahead squared error.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ErrorAccumulator {
    sse: f64,
    count: usize,
}

impl ErrorAccumulator {
    fn push(&mut self, error: f64) {
        self.sse += error * error;
        self.count += 1;
    }

    fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sse / self.count as f64
        }
    }
}

// Holt (double exponential smoothing)

#[derive(Debug, Clone, Default)]
struct HoltModel {
    alpha: f64,
    beta: f64,
    level: f64,
    trend: f64,
    errors: ErrorAccumulator,
}

impl HoltModel {
    fn run(values: &[f64], alpha: f64, beta: f64) -> (f64, f64, ErrorAccumulator) {
        let mut level = values[0];
        let mut trend = values[1] - values[0];
        let mut errors = ErrorAccumulator::default();

        for &y in &values[1..] {
            errors.push(y - (level + trend));
            let prev_level = level;
            level = alpha * y + (1.0 - alpha) * (level + trend);
            trend = beta * (level - prev_level) + (1.0 - beta) * trend;
        }

        (level, trend, errors)
    }
}

impl ForecastModel for HoltModel {
    fn name(&self) -> &'static str {
        "Holt"
    }

    fn min_required(&self) -> usize {
        3
    }

    fn fit(&mut self, values: &[f64], search: &SearchOptions) -> Result<()> {
        let objective = |p: &[f64]| Self::run(values, p[0], p[1]).2.sse;
        let best = minimize_bounded(objective, &[0.5, 0.1], search)?;
        let (alpha, beta) = (best.params[0], best.params[1]);
        let (level, trend, errors) = Self::run(values, alpha, beta);
        debug!(alpha, beta, iterations = best.iterations, sse = errors.sse, "fitted Holt");
        *self = Self {
            alpha,
            beta,
            level,
            trend,
            errors,
        };
        Ok(())
    }

    fn update(&mut self, y: f64) {
        self.errors.push(y - (self.level + self.trend));
        let prev_level = self.level;
        self.level = self.alpha * y + (1.0 - self.alpha) * (self.level + self.trend);
        self.trend = self.beta * (self.level - prev_level) + (1.0 - self.beta) * self.trend;
    }

    fn predict(&self, horizon: usize) -> Vec<f64> {
        (1..=horizon)
            .map(|h| self.level + self.trend * h as f64)
            .collect()
    }

    fn state(&self) -> ModelState {
        ModelState {
            level: self.level,
            trend: self.trend,
            fitted_params: vec![self.alpha, self.beta],
            residual_variance: self.errors.variance(),
        }
    }
}

// Additive Holt-Winters

#[derive(Debug, Clone)]
struct HoltWintersModel {
    period: usize,
    params: [f64; 3],
    level: f64,
    trend: f64,
    seasonal: Vec<f64>,
    /// Index of the next value to be absorbed.
    position: usize,
    errors: ErrorAccumulator,
}

impl HoltWintersModel {
    fn new(period: usize) -> Self {
        Self {
            period,
            params: [0.0; 3],
            level: 0.0,
            trend: 0.0,
            seasonal: vec![0.0; period],
            position: 0,
            errors: ErrorAccumulator::default(),
        }
    }

    fn initialize(&mut self, values: &[f64]) {
        let m = self.period;
        let first = values[..m].iter().sum::<f64>() / m as f64;
        let second = values[m..2 * m].iter().sum::<f64>() / m as f64;
        let trend = (second - first) / m as f64;
        let center = (m as f64 - 1.0) / 2.0;
        // Level sits at the last point of the first season
        self.level = first + trend * center;
        self.trend = trend;
        self.seasonal = values[..m]
            .iter()
            .enumerate()
            .map(|(i, v)| v - (first + trend * (i as f64 - center)))
            .collect();
        self.position = m;
        self.errors = ErrorAccumulator::default();
    }

    fn step(&mut self, y: f64) {
        let [alpha, beta, gamma] = self.params;
        let idx = self.position % self.period;
        let season = self.seasonal[idx];
        self.errors.push(y - (self.level + self.trend + season));
        let prev_level = self.level;
        self.level = alpha * (y - season) + (1.0 - alpha) * (self.level + self.trend);
        self.trend = beta * (self.level - prev_level) + (1.0 - beta) * self.trend;
        self.seasonal[idx] = gamma * (y - self.level) + (1.0 - gamma) * season;
        self.position += 1;
    }

    fn run(&self, values: &[f64], params: [f64; 3]) -> Self {
        let mut model = self.clone();
        model.params = params;
        model.initialize(values);
        for &y in &values[self.period..] {
            model.step(y);
        }
        model
    }
}

impl ForecastModel for HoltWintersModel {
    fn name(&self) -> &'static str {
        "HoltWinters"
    }

    fn min_required(&self) -> usize {
        2 * self.period
    }

    fn fit(&mut self, values: &[f64], search: &SearchOptions) -> Result<()> {
        let objective = |p: &[f64]| self.run(values, [p[0], p[1], p[2]]).errors.sse;
        let best = minimize_bounded(objective, &[0.3, 0.1, 0.1], search)?;
        let params = [best.params[0], best.params[1], best.params[2]];
        *self = self.run(values, params);
        debug!(
            period = self.period,
            ?params,
            iterations = best.iterations,
            "fitted HoltWinters"
        );
        Ok(())
    }

    fn update(&mut self, value: f64) {
        self.step(value);
    }

    fn predict(&self, horizon: usize) -> Vec<f64> {
        (1..=horizon)
            .map(|h| {
                let season = self.seasonal[(self.position + h - 1) % self.period];
                self.level + self.trend * h as f64 + season
            })
            .collect()
    }

    fn state(&self) -> ModelState {
        ModelState {
            level: self.level,
            trend: self.trend,
            fitted_params: self.params.to_vec(),
            residual_variance: self.errors.variance(),
        }
    }
}

// Linear trend

/// Ordinary least squares fit of values against their index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub mse: f64,
    /// In-sample fitted values.
    pub fitted: Vec<f64>,
}

impl LinearRegression {
    /// Extrapolate `periods` steps past the fitted data.
    pub fn predict_future(&self, periods: usize) -> Vec<f64> {
        let n = self.fitted.len();
        (0..periods)
            .map(|i| self.intercept + self.slope * (n + i) as f64)
            .collect()
    }
}

/// Fit `values[i] = intercept + slope * i` by least squares.
pub fn linear_regression(values: &[f64]) -> Result<LinearRegression> {
    if values.len() < 2 {
        return Err(TemporaError::InsufficientData {
            needed: 2,
            got: values.len(),
        });
    }

    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let fitted: Vec<f64> = (0..values.len())
        .map(|i| intercept + slope * i as f64)
        .collect();

    let mse = crate::metrics::mse(values, &fitted)?;
    let r_squared = crate::metrics::r_squared(values, &fitted)?;

    Ok(LinearRegression {
        slope,
        intercept,
        r_squared,
        mse,
        fitted,
    })
}

#[derive(Debug, Clone, Default)]
struct LinearTrendModel {
    n: f64,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_xy: f64,
    sum_yy: f64,
}

impl LinearTrendModel {
    fn coefficients(&self) -> (f64, f64) {
        let sxx = self.sum_xx - self.sum_x * self.sum_x / self.n;
        let sxy = self.sum_xy - self.sum_x * self.sum_y / self.n;
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let intercept = (self.sum_y - slope * self.sum_x) / self.n;
        (slope, intercept)
    }

    /// Unbiased residual variance of the OLS fit.
    fn error_variance(&self) -> f64 {
        if self.n < 3.0 {
            return 0.0;
        }
        let sxx = self.sum_xx - self.sum_x * self.sum_x / self.n;
        let sxy = self.sum_xy - self.sum_x * self.sum_y / self.n;
        let syy = self.sum_yy - self.sum_y * self.sum_y / self.n;
        let sse = if sxx > 0.0 { syy - sxy * sxy / sxx } else { syy };
        (sse / (self.n - 2.0)).max(0.0)
    }
}

impl ForecastModel for LinearTrendModel {
    fn name(&self) -> &'static str {
        "LinearTrend"
    }

    fn min_required(&self) -> usize {
        2
    }

    fn fit(&mut self, values: &[f64], _search: &SearchOptions) -> Result<()> {
        *self = Self::default();
        for &y in values {
            self.update(y);
        }
        Ok(())
    }

    fn update(&mut self, y: f64) {
        let x = self.n;
        self.n += 1.0;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_xy += x * y;
        self.sum_yy += y * y;
    }

    fn predict(&self, horizon: usize) -> Vec<f64> {
        let (slope, intercept) = self.coefficients();
        (1..=horizon)
            .map(|h| intercept + slope * (self.n - 1.0 + h as f64))
            .collect()
    }

    fn state(&self) -> ModelState {
        let (slope, intercept) = self.coefficients();
        ModelState {
            level: intercept + slope * (self.n - 1.0),
            trend: slope,
            fitted_params: vec![intercept, slope],
            residual_variance: self.error_variance(),
        }
    }
}

// Naive and mean

#[derive(Debug, Clone, Default)]
struct NaiveModel {
    last: f64,
    errors: ErrorAccumulator,
}

impl ForecastModel for NaiveModel {
    fn name(&self) -> &'static str {
        "Naive"
    }

    fn min_required(&self) -> usize {
        1
    }

    fn fit(&mut self, values: &[f64], _search: &SearchOptions) -> Result<()> {
        *self = Self {
            last: values[0],
            errors: ErrorAccumulator::default(),
        };
        for &y in &values[1..] {
            self.update(y);
        }
        Ok(())
    }

    fn update(&mut self, y: f64) {
        self.errors.push(y - self.last);
        self.last = y;
    }

    fn predict(&self, horizon: usize) -> Vec<f64> {
        vec![self.last; horizon]
    }

    fn state(&self) -> ModelState {
        ModelState {
            level: self.last,
            trend: 0.0,
            fitted_params: Vec::new(),
            residual_variance: self.errors.variance(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MeanModel {
    n: usize,
    mean: f64,
    m2: f64,
}

impl ForecastModel for MeanModel {
    fn name(&self) -> &'static str {
        "Mean"
    }

    fn min_required(&self) -> usize {
        1
    }

    fn fit(&mut self, values: &[f64], _search: &SearchOptions) -> Result<()> {
        *self = Self::default();
        for &y in values {
            self.update(y);
        }
        Ok(())
    }

    fn update(&mut self, y: f64) {
        self.n += 1;
        let delta = y - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (y - self.mean);
    }

    fn predict(&self, horizon: usize) -> Vec<f64> {
        vec![self.mean; horizon]
    }

    fn state(&self) -> ModelState {
        let variance = if self.n > 1 {
            self.m2 / (self.n - 1) as f64
        } else {
            0.0
        };
        ModelState {
            level: self.mean,
            trend: 0.0,
            fitted_params: Vec::new(),
            residual_variance: variance,
        }
    }
}

/// One forecast point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub horizon_timestamp: Timestamp,
    /// Steps past the last known timestamp, starting at 1.
    pub horizon_step: usize,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub model_state_version: u64,
    pub method: String,
}

/// Two-sided standard normal critical value for `confidence`.
pub fn z_score(confidence: f64) -> Result<f64> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(TemporaError::invalid_parameter(
            "confidence_level",
            confidence,
            "must be between 0 and 1 (exclusive)",
        ));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| TemporaError::InvalidInput(format!("standard normal: {:?}", e)))?;
    Ok(normal.inverse_cdf((1.0 + confidence) / 2.0))
}

/// Per-series forecasting state.
#[derive(Debug)]
pub struct Forecaster {
    config: ForecastConfig,
    model: Box<dyn ForecastModel>,
    history: Vec<f64>,
    interval: Option<Interval>,
    last_timestamp: Option<Timestamp>,
    version: u64,
}

impl Forecaster {
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        let model = config.method.build();
        Ok(Self {
            config,
            model,
            history: Vec::new(),
            interval: None,
            last_timestamp: None,
            version: 0,
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Name of the model currently in use (may be the fallback).
    pub fn method_name(&self) -> &'static str {
        self.model.name()
    }

    pub fn is_fitted(&self) -> bool {
        self.last_timestamp.is_some()
    }

    /// Incremented by every fit and update.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn state(&self) -> ModelState {
        self.model.state()
    }

    /// Fit the configured method on a cleaned series.
    ///
    /// Missing slots are linearly interpolated before fitting; only present
    /// observations count toward the history requirement.
    pub fn fit(&mut self, series: &Series) -> Result<()> {
        let present = series.present_count();
        let needed = self
            .config
            .effective_min_history()
            .max(self.config.method.build().min_required());
        if present < needed {
            return Err(TemporaError::InsufficientHistory {
                needed,
                got: present,
            });
        }

        let interval = match self.config.interval {
            Some(interval) => interval,
            None => detect_interval(series)?,
        };
        let values = interpolate_gaps(&series.values());

        let mut model = self.config.method.build();
        model.fit(&values, &self.config.search)?;
        self.install(model, values, interval, series);
        Ok(())
    }

    /// Fit, substituting the configured fallback method when the parameter
    /// search does not converge. Any other error is returned unchanged.
    pub fn fit_with_fallback(&mut self, series: &Series) -> Result<()> {
        match self.fit(series) {
            Err(TemporaError::NonConvergence { iterations }) => {
                let fallback = ForecastMethod::from(self.config.fallback);
                warn!(
                    method = self.config.method.name(),
                    fallback = fallback.name(),
                    iterations,
                    "parameter search did not converge, using fallback"
                );
                let interval = match self.config.interval {
                    Some(interval) => interval,
                    None => detect_interval(series)?,
                };
                let values = interpolate_gaps(&series.values());
                let mut model = fallback.build();
                model.fit(&values, &self.config.search)?;
                self.install(model, values, interval, series);
                Ok(())
            }
            other => other,
        }
    }

    fn install(
        &mut self,
        model: Box<dyn ForecastModel>,
        values: Vec<f64>,
        interval: Interval,
        series: &Series,
    ) {
        self.model = model;
        self.history = values;
        self.interval = Some(interval);
        self.last_timestamp = series.last().map(|o| o.timestamp);
        self.version += 1;
        debug!(
            method = self.model.name(),
            version = self.version,
            history = self.history.len(),
            "forecaster fitted"
        );
    }

    /// Absorb one new observation in O(1) without refitting.
    pub fn update(&mut self, timestamp: Timestamp, value: f64) -> Result<()> {
        let last = self.last_timestamp.ok_or_else(|| {
            TemporaError::InvalidInput("forecaster must be fitted before update".to_string())
        })?;
        if timestamp <= last {
            return Err(TemporaError::OutOfOrder { timestamp, last });
        }
        if !value.is_finite() {
            return Err(TemporaError::InvalidInput(format!(
                "non-finite value {} at timestamp {}",
                value, timestamp
            )));
        }
        self.model.update(value);
        self.history.push(value);
        self.last_timestamp = Some(timestamp);
        self.version += 1;
        Ok(())
    }

    /// Refit the current method's parameters on all history seen so far.
    pub fn refit(&mut self) -> Result<()> {
        if !self.is_fitted() {
            return Err(TemporaError::InvalidInput(
                "forecaster must be fitted before refit".to_string(),
            ));
        }
        let mut model = self.config.method.build();
        model.fit(&self.history, &self.config.search)?;
        self.model = model;
        self.version += 1;
        Ok(())
    }

    /// Forecast the configured horizon.
    pub fn forecast(&self) -> Result<Vec<ForecastResult>> {
        self.forecast_horizon(self.config.horizon)
    }

    /// Forecast `horizon` steps past the last known timestamp.
    pub fn forecast_horizon(&self, horizon: usize) -> Result<Vec<ForecastResult>> {
        let (Some(last), Some(interval)) = (self.last_timestamp, self.interval) else {
            return Err(TemporaError::InvalidInput(
                "forecaster must be fitted before forecasting".to_string(),
            ));
        };

        let z = z_score(self.config.confidence_level)?;
        let variance = self.model.residual_variance().max(0.0);
        let method = self.model.name().to_string();

        self.model
            .predict(horizon)
            .into_iter()
            .enumerate()
            .map(|(i, point)| {
                let step = i + 1;
                let half_width = z * (variance * step as f64).sqrt();
                Ok(ForecastResult {
                    horizon_timestamp: interval.advance(last, step as i64)?,
                    horizon_step: step,
                    point_estimate: point,
                    lower_bound: point - half_width,
                    upper_bound: point + half_width,
                    model_state_version: self.version,
                    method: method.clone(),
                })
            })
            .collect()
    }
}
