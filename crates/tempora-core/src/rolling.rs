//! Incremental sliding-window statistics.
//!
//! Each slide admits one slot and evicts the expired ones. Mean and variance
//! use Welford's add/remove updates; min, max and quantiles come from an
//! [`OrderStatistics`] tree, so no slide rescans the whole window.

use crate::error::{Result, TemporaError};
use crate::order_stats::OrderStatistics;
use crate::series::{Observation, Series, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;

/// Evictions between exact re-computations of the running moments.
const RESYNC_INTERVAL: usize = 4096;

/// Extent of a rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    /// Fixed number of slots, missing ones included.
    Count(usize),
    /// Fixed span in microseconds covering `(t_end - span, t_end]`.
    Duration(i64),
}

/// Which slots contribute values to the aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsMode {
    /// Observed values only; imputed values are ignored.
    #[default]
    Raw,
    /// Observed and imputed values; imputed ones are counted separately.
    ProvenanceAware,
}

impl FromStr for StatsMode {
    type Err = TemporaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" | "observed" => Ok(Self::Raw),
            "provenance_aware" | "provenance" | "all" => Ok(Self::ProvenanceAware),
            _ => Err(TemporaError::invalid_parameter(
                "stats_mode",
                s,
                "expected raw or provenance_aware",
            )),
        }
    }
}

/// Rolling engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingConfig {
    pub window: Window,
    /// Probabilities in `[0, 1]` reported with every snapshot.
    pub quantiles: Vec<f64>,
    pub mode: StatsMode,
}

impl RollingConfig {
    pub fn count(window: usize) -> Self {
        Self {
            window: Window::Count(window),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.window {
            Window::Count(0) => {
                return Err(TemporaError::invalid_parameter(
                    "window_size",
                    0,
                    "must be positive",
                ))
            }
            Window::Duration(d) if d <= 0 => {
                return Err(TemporaError::invalid_parameter(
                    "window_duration",
                    d,
                    "must be positive",
                ))
            }
            _ => {}
        }
        if let Some(p) = self.quantiles.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(TemporaError::invalid_parameter(
                "quantiles",
                p,
                "must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self {
            window: Window::Count(10),
            quantiles: vec![0.25, 0.5, 0.75],
            mode: StatsMode::Raw,
        }
    }
}

/// One requested quantile and its value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileValue {
    pub p: f64,
    pub value: f64,
}

/// Aggregates for the window ending at `timestamp`.
///
/// Undefined aggregates are `None`; a window without any contributing value
/// sets `insufficient_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSnapshot {
    pub timestamp: Timestamp,
    /// Contributing values in the window.
    pub count: usize,
    /// How many of `count` are imputed.
    pub imputed_count: usize,
    /// Slots spanned by the window, missing ones included.
    pub slots: usize,
    pub mean: Option<f64>,
    /// Sample variance; needs at least two values.
    pub variance: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub quantiles: Vec<QuantileValue>,
    pub insufficient_data: bool,
}

impl StatSnapshot {
    pub fn quantile(&self, p: f64) -> Option<f64> {
        self.quantiles.iter().find(|q| q.p == p).map(|q| q.value)
    }
}

/// Running first and second moments.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    n: usize,
    mean: f64,
    m2: f64,
}

impl Moments {
    fn add(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn remove(&mut self, x: f64) {
        if self.n <= 1 {
            *self = Self::default();
            return;
        }
        self.n -= 1;
        let delta = x - self.mean;
        self.mean -= delta / self.n as f64;
        self.m2 -= delta * (x - self.mean);
        if self.m2 < 0.0 {
            self.m2 = 0.0;
        }
    }

    fn variance(&self) -> Option<f64> {
        (self.n >= 2).then(|| self.m2 / (self.n - 1) as f64)
    }
}

/// Push-based rolling statistics engine for one series.
#[derive(Debug, Clone)]
pub struct RollingStats {
    config: RollingConfig,
    slots: VecDeque<Observation>,
    moments: Moments,
    order: OrderStatistics,
    imputed: usize,
    evictions: usize,
}

impl RollingStats {
    pub fn new(config: RollingConfig) -> Result<Self> {
        config.validate()?;
        let capacity = match config.window {
            Window::Count(w) => w + 1,
            Window::Duration(_) => 16,
        };
        Ok(Self {
            config,
            slots: VecDeque::with_capacity(capacity),
            moments: Moments::default(),
            order: OrderStatistics::with_capacity(capacity),
            imputed: 0,
            evictions: 0,
        })
    }

    pub fn config(&self) -> &RollingConfig {
        &self.config
    }

    /// Admit the next slot and evict what falls out of the window.
    ///
    /// Returns the snapshot for the window ending at `obs` once the window is
    /// complete: count windows after `w` slots, duration windows always.
    pub fn push(&mut self, obs: &Observation) -> Option<StatSnapshot> {
        if let Some(v) = self.contribution(obs) {
            self.moments.add(v);
            self.order.insert(v);
            if obs.is_imputed() {
                self.imputed += 1;
            }
        }
        self.slots.push_back(*obs);

        match self.config.window {
            Window::Count(w) => {
                while self.slots.len() > w {
                    self.evict_front();
                }
            }
            Window::Duration(span) => {
                let cutoff = obs.timestamp.saturating_sub(span);
                while self.slots.front().is_some_and(|o| o.timestamp <= cutoff) {
                    self.evict_front();
                }
            }
        }

        self.current()
    }

    /// Snapshot of the window as it stands, if it is complete.
    pub fn current(&self) -> Option<StatSnapshot> {
        let last = self.slots.back()?;
        if let Window::Count(w) = self.config.window {
            if self.slots.len() < w {
                return None;
            }
        }
        Some(self.snapshot_at(last.timestamp))
    }

    pub fn reset(&mut self) {
        self.slots.clear();
        self.moments = Moments::default();
        self.order.clear();
        self.imputed = 0;
        self.evictions = 0;
    }

    fn contribution(&self, obs: &Observation) -> Option<f64> {
        match self.config.mode {
            StatsMode::Raw if obs.is_imputed() => None,
            _ => obs.value,
        }
    }

    fn evict_front(&mut self) {
        let Some(old) = self.slots.pop_front() else {
            return;
        };
        if let Some(v) = self.contribution(&old) {
            self.moments.remove(v);
            self.order.remove(v);
            if old.is_imputed() {
                self.imputed -= 1;
            }
        }
        self.evictions += 1;
        if self.evictions % RESYNC_INTERVAL == 0 {
            self.resync();
        }
    }

    /// Recompute the moments exactly from the window contents.
    fn resync(&mut self) {
        let mut moments = Moments::default();
        for obs in &self.slots {
            if let Some(v) = self.contribution(obs) {
                moments.add(v);
            }
        }
        self.moments = moments;
    }

    fn snapshot_at(&self, timestamp: Timestamp) -> StatSnapshot {
        let count = self.moments.n;
        if count == 0 {
            return StatSnapshot {
                timestamp,
                count: 0,
                imputed_count: 0,
                slots: self.slots.len(),
                mean: None,
                variance: None,
                std_dev: None,
                min: None,
                max: None,
                quantiles: Vec::new(),
                insufficient_data: true,
            };
        }

        // Identical values: exact mean, zero spread, whatever drift the moments carry
        let (mean, variance) = match (self.order.min(), self.order.max()) {
            (Some(lo), Some(hi)) if lo == hi => (lo, self.moments.variance().map(|_| 0.0)),
            _ => (self.moments.mean, self.moments.variance()),
        };
        let quantiles = self
            .config
            .quantiles
            .iter()
            .filter_map(|&p| self.order.quantile(p).map(|value| QuantileValue { p, value }))
            .collect();

        StatSnapshot {
            timestamp,
            count,
            imputed_count: self.imputed,
            slots: self.slots.len(),
            mean: Some(mean),
            variance,
            std_dev: variance.map(f64::sqrt),
            min: self.order.min(),
            max: self.order.max(),
            quantiles,
            insufficient_data: false,
        }
    }
}

/// Snapshots for every complete window of `series`.
pub fn rolling_stats(series: &Series, config: &RollingConfig) -> Result<Vec<StatSnapshot>> {
    let mut engine = RollingStats::new(config.clone())?;
    Ok(series.iter().filter_map(|o| engine.push(o)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series_of(values: &[f64]) -> Series {
        Series::from_pairs(values.iter().enumerate().map(|(i, &v)| (i as i64, v))).unwrap()
    }

    #[test]
    fn test_count_window_emits_from_first_full_window() {
        let s = series_of(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let snaps = rolling_stats(&s, &RollingConfig::count(3)).unwrap();
        assert_eq!(snaps.len(), 3);
        assert_eq!(snaps[0].timestamp, 2);
        assert_relative_eq!(snaps[0].mean.unwrap(), 2.0);
        assert_relative_eq!(snaps[2].mean.unwrap(), 4.0);
        assert_relative_eq!(snaps[2].variance.unwrap(), 1.0);
        assert_eq!(snaps[2].min, Some(3.0));
        assert_eq!(snaps[2].max, Some(5.0));
        assert_eq!(snaps[2].quantile(0.5), Some(4.0));
    }

    #[test]
    fn test_identical_values_have_exact_mean() {
        let v = 0.1;
        let s = series_of(&vec![v; 1000]);
        let snaps = rolling_stats(&s, &RollingConfig::count(50)).unwrap();
        for snap in &snaps {
            assert_eq!(snap.mean, Some(v));
            assert_eq!(snap.variance, Some(0.0));
            assert_eq!(snap.std_dev, Some(0.0));
        }
    }

    #[test]
    fn test_constant_window_after_distinct_values_is_exact() {
        let s = series_of(&[0.1, 0.7, 1234.567, 3.3, 3.3, 3.3]);
        let snaps = rolling_stats(&s, &RollingConfig::count(3)).unwrap();
        let last = snaps.last().unwrap();
        assert_eq!(last.mean, Some(3.3));
        assert_eq!(last.variance, Some(0.0));

        for x in [1.0, 42.0, 1e6] {
            let s = series_of(&[x * 1.1, x * 0.3, x * 7.9, 0.1, 0.1, 0.1]);
            let snaps = rolling_stats(&s, &RollingConfig::count(3)).unwrap();
            let last = snaps.last().unwrap();
            assert_eq!(last.mean, Some(0.1));
            assert_eq!(last.std_dev, Some(0.0));
        }
    }

    #[test]
    fn test_matches_naive_recomputation() {
        let values: Vec<f64> = (0..300)
            .map(|i| 1e6 + ((i * 17) % 23) as f64 * 0.01)
            .collect();
        let s = series_of(&values);
        let w = 20;
        let snaps = rolling_stats(&s, &RollingConfig::count(w)).unwrap();
        for (k, snap) in snaps.iter().enumerate() {
            let window = &values[k..k + w];
            let mean = window.iter().sum::<f64>() / w as f64;
            let var = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (w - 1) as f64;
            assert_relative_eq!(snap.mean.unwrap(), mean, epsilon = 1e-6);
            assert_relative_eq!(snap.variance.unwrap(), var, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_missing_slots_reduce_count() {
        let s = Series::from_observations(vec![
            Observation::observed(0, 1.0),
            Observation::missing(1),
            Observation::observed(2, 3.0),
        ])
        .unwrap();
        let snaps = rolling_stats(&s, &RollingConfig::count(3)).unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].count, 2);
        assert_eq!(snaps[0].slots, 3);
        assert_relative_eq!(snaps[0].mean.unwrap(), 2.0);
    }

    #[test]
    fn test_all_missing_window_is_insufficient() {
        let s = Series::from_observations(vec![
            Observation::observed(0, 1.0),
            Observation::missing(1),
            Observation::missing(2),
        ])
        .unwrap();
        let snaps = rolling_stats(&s, &RollingConfig::count(2)).unwrap();
        let last = snaps.last().unwrap();
        assert!(last.insufficient_data);
        assert_eq!(last.count, 0);
        assert_eq!(last.mean, None);
        assert_eq!(last.min, None);
        assert!(last.quantiles.is_empty());
    }

    #[test]
    fn test_single_value_has_no_variance() {
        let s = series_of(&[4.0]);
        let snaps = rolling_stats(&s, &RollingConfig::count(1)).unwrap();
        assert_eq!(snaps[0].mean, Some(4.0));
        assert_eq!(snaps[0].variance, None);
        assert!(!snaps[0].insufficient_data);
    }

    #[test]
    fn test_raw_mode_excludes_imputed() {
        let s = Series::from_observations(vec![
            Observation::observed(0, 1.0),
            Observation::imputed(1, 1.0),
            Observation::observed(2, 4.0),
        ])
        .unwrap();
        let raw = rolling_stats(&s, &RollingConfig::count(3)).unwrap();
        assert_eq!(raw[0].count, 2);
        assert_eq!(raw[0].imputed_count, 0);
        assert_relative_eq!(raw[0].mean.unwrap(), 2.5);

        let config = RollingConfig {
            mode: StatsMode::ProvenanceAware,
            ..RollingConfig::count(3)
        };
        let aware = rolling_stats(&s, &config).unwrap();
        assert_eq!(aware[0].count, 3);
        assert_eq!(aware[0].imputed_count, 1);
        assert_relative_eq!(aware[0].mean.unwrap(), 2.0);
    }

    #[test]
    fn test_duration_window() {
        let s = Series::from_pairs(vec![(0, 1.0), (5, 2.0), (10, 3.0), (30, 10.0)]).unwrap();
        let config = RollingConfig {
            window: Window::Duration(10),
            ..Default::default()
        };
        let snaps = rolling_stats(&s, &config).unwrap();
        assert_eq!(snaps.len(), 4);
        // (0, 10] holds 5 and 10
        assert_eq!(snaps[2].count, 2);
        assert_relative_eq!(snaps[2].mean.unwrap(), 2.5);
        // (20, 30] holds only 30
        assert_eq!(snaps[3].count, 1);
    }

    #[test]
    fn test_invalid_config() {
        assert!(RollingStats::new(RollingConfig::count(0)).is_err());
        let config = RollingConfig {
            quantiles: vec![1.5],
            ..Default::default()
        };
        assert!(RollingStats::new(config).is_err());
    }
}
