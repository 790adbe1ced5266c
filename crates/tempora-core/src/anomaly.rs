//! Anomaly detection over a cleaned series.
//!
//! The [`AnomalyDetector`] owns the control flow (warm-up, provenance
//! handling, reference windows) and delegates scoring to an
//! [`AnomalyRule`]. Rules are built from [`AnomalyRuleKind`], so swapping the
//! rule never touches the detector.
//!
//! # Zero-variance windows
//!
//! When the reference scale is exactly zero, a value within
//! `zero_variance_tolerance` of the reference center scores `0.0` and is
//! never flagged. Any other value scores `f64::INFINITY` and is flagged under
//! [`ZeroVariancePolicy::FlagAnyDeviation`] (the default) or left unflagged
//! under [`ZeroVariancePolicy::NeverFlag`].

use crate::decomposition::{decompose_additive, robust_scale};
use crate::error::{Result, TemporaError};
use crate::resample::interpolate_gaps;
use crate::rolling::{RollingConfig, RollingStats, StatSnapshot, StatsMode, Window};
use crate::series::{Observation, Series, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::str::FromStr;
use tracing::debug;

/// Behaviour when the reference window has zero spread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    #[default]
    FlagAnyDeviation,
    NeverFlag,
}

/// Rule selection, as found in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AnomalyRuleKind {
    /// `|value - mean| > k * std_dev` against the preceding window.
    ZScore { k: f64 },
    /// Robust z-score of the decomposition residual.
    Residual {
        period: Option<usize>,
        threshold: f64,
    },
}

impl Default for AnomalyRuleKind {
    fn default() -> Self {
        AnomalyRuleKind::ZScore { k: 3.0 }
    }
}

impl FromStr for AnomalyRuleKind {
    type Err = TemporaError;

    /// Parses a rule name with default parameters.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zscore" | "z_score" | "sigma" => Ok(AnomalyRuleKind::ZScore { k: 3.0 }),
            "residual" | "decomposition" => Ok(AnomalyRuleKind::Residual {
                period: None,
                threshold: 3.0,
            }),
            _ => Err(TemporaError::invalid_parameter(
                "anomaly_rule",
                s,
                "expected zscore or residual",
            )),
        }
    }
}

impl AnomalyRuleKind {
    pub fn validate(&self) -> Result<()> {
        match *self {
            AnomalyRuleKind::ZScore { k } if !(k > 0.0 && k.is_finite()) => Err(
                TemporaError::invalid_parameter("anomaly_k", k, "must be positive and finite"),
            ),
            AnomalyRuleKind::Residual { threshold, .. }
                if !(threshold > 0.0 && threshold.is_finite()) =>
            {
                Err(TemporaError::invalid_parameter(
                    "threshold",
                    threshold,
                    "must be positive and finite",
                ))
            }
            _ => Ok(()),
        }
    }

    /// Instantiate the scoring strategy.
    pub fn build(&self, zero_variance: ZeroVariancePolicy, tolerance: f64) -> Box<dyn AnomalyRule> {
        let zero = ZeroSpread {
            policy: zero_variance,
            tolerance,
        };
        match *self {
            AnomalyRuleKind::ZScore { k } => Box::new(ZScoreRule { k, zero }),
            AnomalyRuleKind::Residual { period, threshold } => Box::new(ResidualRule {
                period,
                threshold,
                zero,
                residuals: Vec::new(),
                scale: None,
            }),
        }
    }
}

/// Everything a rule may look at when scoring one observation.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    /// Position of the observation in the prepared series.
    pub index: usize,
    pub observation: &'a Observation,
    pub value: f64,
    /// Window ending immediately before the observation.
    pub reference: Option<&'a StatSnapshot>,
}

/// Output of a rule for one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleScore {
    pub score: f64,
    pub is_anomaly: bool,
}

/// Scoring capability shared by every anomaly rule.
pub trait AnomalyRule: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Called once with the full series before any scoring.
    fn prepare(&mut self, _series: &Series) -> Result<()> {
        Ok(())
    }

    /// Score one observation; `None` when the rule has no defined reference.
    fn score(&self, ctx: &ScoreContext<'_>) -> Option<RuleScore>;

    /// Whether imputed points get a down-weighted score instead of a flag.
    fn supports_confidence_weighting(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct ZeroSpread {
    policy: ZeroVariancePolicy,
    tolerance: f64,
}

impl ZeroSpread {
    fn score(&self, deviation: f64) -> RuleScore {
        if deviation <= self.tolerance {
            return RuleScore {
                score: 0.0,
                is_anomaly: false,
            };
        }
        RuleScore {
            score: f64::INFINITY,
            is_anomaly: self.policy == ZeroVariancePolicy::FlagAnyDeviation,
        }
    }
}

#[derive(Debug, Clone)]
struct ZScoreRule {
    k: f64,
    zero: ZeroSpread,
}

impl AnomalyRule for ZScoreRule {
    fn name(&self) -> &'static str {
        "zscore"
    }

    fn score(&self, ctx: &ScoreContext<'_>) -> Option<RuleScore> {
        let reference = ctx.reference?;
        let mean = reference.mean?;
        let std_dev = reference.std_dev?;
        let deviation = (ctx.value - mean).abs();
        if std_dev == 0.0 {
            return Some(self.zero.score(deviation));
        }
        Some(RuleScore {
            score: deviation / std_dev,
            is_anomaly: deviation > self.k * std_dev,
        })
    }
}

#[derive(Debug, Clone)]
struct ResidualRule {
    period: Option<usize>,
    threshold: f64,
    zero: ZeroSpread,
    residuals: Vec<f64>,
    scale: Option<f64>,
}

impl AnomalyRule for ResidualRule {
    fn name(&self) -> &'static str {
        "residual"
    }

    fn prepare(&mut self, series: &Series) -> Result<()> {
        let values = interpolate_gaps(&series.values());
        let decomposition = decompose_additive(&values, self.period)?;
        self.scale = robust_scale(&decomposition.residual);
        self.residuals = decomposition.residual;
        debug!(
            period = ?self.period,
            scale = ?self.scale,
            "prepared residual rule"
        );
        Ok(())
    }

    fn score(&self, ctx: &ScoreContext<'_>) -> Option<RuleScore> {
        let residual = *self.residuals.get(ctx.index)?;
        let scale = self.scale?;
        let magnitude = residual.abs();
        if scale == 0.0 {
            return Some(self.zero.score(magnitude));
        }
        let score = magnitude / scale;
        Some(RuleScore {
            score,
            is_anomaly: score > self.threshold,
        })
    }
}

/// One scored observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub timestamp: Timestamp,
    pub value: f64,
    pub score: f64,
    pub is_anomaly: bool,
    pub rule_applied: String,
    /// 1.0 for observed values, the imputed weight for filled ones.
    pub confidence: f64,
}

/// Detector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub window: Window,
    pub rule: AnomalyRuleKind,
    /// Participating observations required before scoring starts.
    /// Defaults to the window size.
    pub min_history: Option<usize>,
    /// Score multiplier for imputed observations.
    pub imputed_confidence: f64,
    pub zero_variance: ZeroVariancePolicy,
    pub zero_variance_tolerance: f64,
    pub stats_mode: StatsMode,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window: Window::Count(10),
            rule: AnomalyRuleKind::default(),
            min_history: None,
            imputed_confidence: 0.5,
            zero_variance: ZeroVariancePolicy::default(),
            zero_variance_tolerance: 0.0,
            stats_mode: StatsMode::Raw,
        }
    }
}

impl DetectorConfig {
    pub fn effective_min_history(&self) -> usize {
        self.min_history.unwrap_or(match self.window {
            Window::Count(w) => w,
            Window::Duration(_) => 2,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.rule.validate()?;
        if !(0.0..=1.0).contains(&self.imputed_confidence) {
            return Err(TemporaError::invalid_parameter(
                "imputed_confidence",
                self.imputed_confidence,
                "must be between 0 and 1",
            ));
        }
        if !(self.zero_variance_tolerance >= 0.0) {
            return Err(TemporaError::invalid_parameter(
                "zero_variance_tolerance",
                self.zero_variance_tolerance,
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Detection lifecycle for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionState {
    WarmingUp { seen: usize },
    /// Terminal for the rest of the run.
    Active,
}

/// Per-series anomaly detector.
#[derive(Debug)]
pub struct AnomalyDetector {
    config: DetectorConfig,
    rule: Box<dyn AnomalyRule>,
    rolling: RollingStats,
    state: DetectionState,
    min_history: usize,
    index: usize,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let rolling = RollingStats::new(RollingConfig {
            window: config.window,
            quantiles: Vec::new(),
            mode: config.stats_mode,
        })?;
        let rule = config
            .rule
            .build(config.zero_variance, config.zero_variance_tolerance);
        let min_history = config.effective_min_history();
        Ok(Self {
            config,
            rule,
            rolling,
            state: if min_history == 0 {
                DetectionState::Active
            } else {
                DetectionState::WarmingUp { seen: 0 }
            },
            min_history,
            index: 0,
        })
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Give the rule a look at the whole series. Must be called with the same
    /// series that is later fed to [`observe`](Self::observe).
    pub fn prepare(&mut self, series: &Series) -> Result<()> {
        self.rule.prepare(series)
    }

    /// Feed the next observation; returns a report once the detector is active.
    pub fn observe(&mut self, obs: &Observation) -> Option<AnomalyReport> {
        let reference = self.rolling.current();
        let report = obs.value.and_then(|value| {
            if let DetectionState::WarmingUp { seen } = self.state {
                let seen = seen + 1;
                self.state = if seen >= self.min_history {
                    debug!(
                        timestamp = obs.timestamp,
                        seen, "anomaly detection active"
                    );
                    DetectionState::Active
                } else {
                    DetectionState::WarmingUp { seen }
                };
                return None;
            }
            self.report(obs, value, reference.as_ref())
        });

        self.rolling.push(obs);
        self.index += 1;
        report
    }

    fn report(
        &self,
        obs: &Observation,
        value: f64,
        reference: Option<&StatSnapshot>,
    ) -> Option<AnomalyReport> {
        let ctx = ScoreContext {
            index: self.index,
            observation: obs,
            value,
            reference,
        };
        let Some(scored) = self.rule.score(&ctx) else {
            debug!(
                timestamp = obs.timestamp,
                rule = self.rule.name(),
                "no defined reference, observation not scored"
            );
            return None;
        };

        let (score, is_anomaly, confidence) =
            if obs.is_imputed() && self.rule.supports_confidence_weighting() {
                let weight = self.config.imputed_confidence;
                (scored.score * weight, false, weight)
            } else {
                (scored.score, scored.is_anomaly, 1.0)
            };

        Some(AnomalyReport {
            timestamp: obs.timestamp,
            value,
            score,
            is_anomaly,
            rule_applied: self.rule.name().to_string(),
            confidence,
        })
    }

    /// Prepare on `series`, then score each of its observations in order.
    pub fn run(&mut self, series: &Series) -> Result<Vec<AnomalyReport>> {
        self.prepare(series)?;
        Ok(series.iter().filter_map(|o| self.observe(o)).collect())
    }
}

/// Detect anomalies in `series` with a fresh detector.
pub fn detect_anomalies(series: &Series, config: &DetectorConfig) -> Result<Vec<AnomalyReport>> {
    AnomalyDetector::new(config.clone())?.run(series)
}
