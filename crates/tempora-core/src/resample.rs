//! Conversion of irregular or gapped series onto a regular grid.

use crate::calendar::Interval;
use crate::error::{Result, TemporaError};
use crate::series::{Observation, Provenance, Series, Timestamp};
use crate::store::DuplicatePolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

/// Upper bound on grid points produced by one resample call.
pub const MAX_GRID_POINTS: i64 = 50_000_000;

/// How grid slots without an observation are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Leave gaps as missing slots.
    #[default]
    None,
    ForwardFill,
    LinearInterpolate,
    ZeroFill,
}

impl FromStr for FillPolicy {
    type Err = TemporaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "forward_fill" | "forwardfill" | "ffill" | "locf" => Ok(Self::ForwardFill),
            "linear_interpolate" | "linear" | "interpolate" => Ok(Self::LinearInterpolate),
            "zero_fill" | "zero" | "zerofill" => Ok(Self::ZeroFill),
            _ => Err(TemporaError::invalid_parameter(
                "fill_policy",
                s,
                "expected none, forward_fill, linear_interpolate or zero_fill",
            )),
        }
    }
}

/// Full set of resampling knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResampleOptions {
    pub interval: Interval,
    pub fill_policy: FillPolicy,
    /// Merge rule for several observations falling into one bucket.
    pub aggregation: DuplicatePolicy,
}

impl ResampleOptions {
    pub fn new(interval: Interval, fill_policy: FillPolicy) -> Self {
        Self {
            interval,
            fill_policy,
            aggregation: DuplicatePolicy::Average,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    value: f64,
    count: usize,
    observed: bool,
}

/// Resample `series` onto a regular grid, averaging values that share a bucket.
pub fn resample(series: &Series, interval: Interval, fill_policy: FillPolicy) -> Result<Series> {
    resample_with(series, &ResampleOptions::new(interval, fill_policy))
}

/// Resample with explicit options.
///
/// The grid runs from the bucket of the first present observation to the
/// bucket of the last one; nothing is extrapolated beyond them. Filled slots
/// are marked [`Provenance::Imputed`], and existing provenance is kept.
pub fn resample_with(series: &Series, options: &ResampleOptions) -> Result<Series> {
    options.interval.validate()?;

    let present: Vec<&Observation> = series.iter().filter(|o| o.is_present()).collect();
    if present.len() < 2 {
        return Err(TemporaError::InsufficientData {
            needed: 2,
            got: present.len(),
        });
    }

    let interval = options.interval;
    let anchor = interval.bucket_start(present[0].timestamp);
    let last_step = interval.steps_between(anchor, present[present.len() - 1].timestamp)?;
    if last_step >= MAX_GRID_POINTS {
        return Err(TemporaError::invalid_parameter(
            "interval",
            format!("{:?}", interval),
            format!("grid of {} points exceeds limit {}", last_step + 1, MAX_GRID_POINTS),
        ));
    }

    let mut buckets: BTreeMap<i64, Bucket> = BTreeMap::new();
    for obs in &present {
        let step = interval.steps_between(anchor, obs.timestamp)?;
        let value = obs.value.unwrap_or_default();
        let observed = obs.provenance == Provenance::Observed;
        buckets
            .entry(step)
            .and_modify(|b| merge_bucket(b, value, observed, options.aggregation))
            .or_insert(Bucket {
                value,
                count: 1,
                observed,
            });
    }

    let n_slots = (last_step + 1) as usize;
    let mut slots: Vec<(Timestamp, Option<Bucket>)> = Vec::with_capacity(n_slots);
    for step in 0..=last_step {
        slots.push((interval.advance(anchor, step)?, buckets.get(&step).copied()));
    }

    let gaps = slots.iter().filter(|(_, b)| b.is_none()).count();
    debug!(
        input = series.len(),
        slots = n_slots,
        gaps,
        fill = ?options.fill_policy,
        "resampled series"
    );

    let observations = fill_slots(&slots, options.fill_policy);
    Ok(Series::from_validated(observations))
}

fn merge_bucket(bucket: &mut Bucket, value: f64, observed: bool, policy: DuplicatePolicy) {
    bucket.count += 1;
    match policy {
        DuplicatePolicy::KeepFirst => {}
        DuplicatePolicy::KeepLast => bucket.value = value,
        DuplicatePolicy::Average => {
            bucket.value += (value - bucket.value) / bucket.count as f64;
        }
    }
    bucket.observed |= observed;
}

fn to_observation(timestamp: Timestamp, bucket: &Bucket) -> Observation {
    if bucket.observed {
        Observation::observed(timestamp, bucket.value)
    } else {
        Observation::imputed(timestamp, bucket.value)
    }
}

fn fill_slots(slots: &[(Timestamp, Option<Bucket>)], policy: FillPolicy) -> Vec<Observation> {
    match policy {
        FillPolicy::None => slots
            .iter()
            .map(|(t, b)| match b {
                Some(b) => to_observation(*t, b),
                None => Observation::missing(*t),
            })
            .collect(),
        FillPolicy::ZeroFill => slots
            .iter()
            .map(|(t, b)| match b {
                Some(b) => to_observation(*t, b),
                None => Observation::imputed(*t, 0.0),
            })
            .collect(),
        FillPolicy::ForwardFill => {
            let mut result = Vec::with_capacity(slots.len());
            let mut last_value = 0.0;
            for (t, b) in slots {
                match b {
                    Some(b) => {
                        last_value = b.value;
                        result.push(to_observation(*t, b));
                    }
                    None => result.push(Observation::imputed(*t, last_value)),
                }
            }
            result
        }
        FillPolicy::LinearInterpolate => {
            let mut result = Vec::with_capacity(slots.len());
            // First and last slots are always occupied, so every gap is bounded.
            let mut prev_idx = 0;
            for (i, (t, b)) in slots.iter().enumerate() {
                let Some(b) = b else { continue };
                if i > prev_idx + 1 {
                    let start = slots[prev_idx].1.map(|p| p.value).unwrap_or(b.value);
                    let slope = (b.value - start) / (i - prev_idx) as f64;
                    for (j, (gap_t, _)) in slots.iter().enumerate().take(i).skip(prev_idx + 1) {
                        let v = start + slope * (j - prev_idx) as f64;
                        result.push(Observation::imputed(*gap_t, v));
                    }
                }
                result.push(to_observation(*t, b));
                prev_idx = i;
            }
            result
        }
    }
}

/// Detect the dominant spacing of a series as a fixed interval.
///
/// Returns the most common positive difference between consecutive
/// timestamps; ties resolve to the smallest difference.
pub fn detect_interval(series: &Series) -> Result<Interval> {
    if series.len() < 2 {
        return Err(TemporaError::InsufficientData {
            needed: 2,
            got: series.len(),
        });
    }

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for w in series.observations().windows(2) {
        let diff = w[1].timestamp.checked_sub(w[0].timestamp).ok_or_else(|| {
            TemporaError::InvalidInput(format!(
                "spacing between {} and {} overflows",
                w[0].timestamp, w[1].timestamp
            ))
        })?;
        *counts.entry(diff).or_insert(0) += 1;
    }

    let mut best: Option<(i64, usize)> = None;
    for (diff, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((diff, count));
        }
    }

    best.map(|(diff, _)| Interval::Fixed(diff))
        .ok_or_else(|| TemporaError::InvalidInput("Could not detect interval".to_string()))
}

/// Replace missing values by linear interpolation between their neighbours.
///
/// Leading and trailing gaps take the nearest present value. An input with
/// no present value at all yields an empty vector.
pub fn interpolate_gaps(values: &[Option<f64>]) -> Vec<f64> {
    let (Some(first), Some(last)) = (
        values.iter().position(|v| v.is_some()),
        values.iter().rposition(|v| v.is_some()),
    ) else {
        return Vec::new();
    };

    let mut result = vec![0.0; values.len()];
    let mut prev_idx = first;
    let mut prev_val = values[first].unwrap_or_default();

    for item in result.iter_mut().take(first + 1) {
        *item = prev_val;
    }

    for i in (first + 1)..=last {
        if let Some(v) = values[i] {
            let gap = i - prev_idx;
            if gap > 1 {
                let slope = (v - prev_val) / gap as f64;
                for j in 1..gap {
                    result[prev_idx + j] = prev_val + slope * j as f64;
                }
            }
            result[i] = v;
            prev_idx = i;
            prev_val = v;
        }
    }

    for item in result.iter_mut().skip(last + 1) {
        *item = prev_val;
    }

    result
}
