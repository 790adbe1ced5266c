//! Observations and the validated, time-ordered series that holds them.

use crate::error::{Result, TemporaError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Instant expressed as microseconds since the Unix epoch.
pub type Timestamp = i64;

/// Convert microseconds since epoch to NaiveDateTime.
pub fn micros_to_datetime(micros: Timestamp) -> NaiveDateTime {
    chrono::DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default()
}

/// Convert NaiveDateTime to microseconds since epoch.
pub fn datetime_to_micros(dt: NaiveDateTime) -> Timestamp {
    dt.and_utc().timestamp_micros()
}

/// Where an observation's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Value was measured.
    Observed,
    /// Value was filled in by the resampler.
    Imputed,
    /// Slot exists on the grid but carries no value.
    Missing,
}

/// A single slot of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: Timestamp,
    /// `None` exactly when the slot is missing.
    pub value: Option<f64>,
    pub provenance: Provenance,
}

impl Observation {
    pub fn observed(timestamp: Timestamp, value: f64) -> Self {
        Self {
            timestamp,
            value: Some(value),
            provenance: Provenance::Observed,
        }
    }

    pub fn imputed(timestamp: Timestamp, value: f64) -> Self {
        Self {
            timestamp,
            value: Some(value),
            provenance: Provenance::Imputed,
        }
    }

    pub fn missing(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            value: None,
            provenance: Provenance::Missing,
        }
    }

    /// Whether the slot carries a value (observed or imputed).
    pub fn is_present(&self) -> bool {
        self.provenance != Provenance::Missing
    }

    pub fn is_imputed(&self) -> bool {
        self.provenance == Provenance::Imputed
    }
}

/// Ordered sequence of observations with strictly increasing timestamps.
///
/// Every constructor validates ordering, uniqueness and finiteness, so a
/// `Series` in hand always satisfies those invariants.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    observations: Vec<Observation>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from `(timestamp, value)` pairs that must already be
    /// strictly increasing.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Timestamp, f64)>,
    {
        let observations = pairs
            .into_iter()
            .map(|(t, v)| Observation::observed(t, v))
            .collect();
        Self::from_observations(observations)
    }

    /// Build a series from observations, validating every invariant.
    pub fn from_observations(observations: Vec<Observation>) -> Result<Self> {
        for obs in &observations {
            validate_observation(obs)?;
        }
        for w in observations.windows(2) {
            let (prev, curr) = (w[0].timestamp, w[1].timestamp);
            if curr == prev {
                return Err(TemporaError::DuplicateTimestamp(curr));
            }
            if curr < prev {
                return Err(TemporaError::OutOfOrder {
                    timestamp: curr,
                    last: prev,
                });
            }
        }
        Ok(Self { observations })
    }

    /// Wrap observations that the caller has already ordered and validated.
    pub(crate) fn from_validated(observations: Vec<Observation>) -> Self {
        debug_assert!(observations
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
        Self { observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    pub fn first(&self) -> Option<&Observation> {
        self.observations.first()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.observations.last()
    }

    /// Number of slots that carry a value.
    pub fn present_count(&self) -> usize {
        self.observations.iter().filter(|o| o.is_present()).count()
    }

    /// Values of every slot, `None` for missing ones.
    pub fn values(&self) -> Vec<Option<f64>> {
        self.observations.iter().map(|o| o.value).collect()
    }

    pub fn timestamps(&self) -> Vec<Timestamp> {
        self.observations.iter().map(|o| o.timestamp).collect()
    }

    /// Position of `timestamp`, or the insertion point if absent.
    pub(crate) fn search(&self, timestamp: Timestamp) -> std::result::Result<usize, usize> {
        self.observations
            .binary_search_by_key(&timestamp, |o| o.timestamp)
    }

    /// Observation at exactly `timestamp`.
    pub fn at(&self, timestamp: Timestamp) -> Result<&Observation> {
        self.search(timestamp)
            .map(|i| &self.observations[i])
            .map_err(|_| TemporaError::NotFound(timestamp))
    }

    /// Observations with `start <= timestamp < end`.
    ///
    /// An empty or inverted range yields an empty iterator.
    pub fn range(&self, start: Timestamp, end: Timestamp) -> Range<'_> {
        if end <= start {
            return Range {
                inner: [].iter(),
            };
        }
        let lo = self.observations.partition_point(|o| o.timestamp < start);
        let hi = self.observations.partition_point(|o| o.timestamp < end);
        Range {
            inner: self.observations[lo..hi].iter(),
        }
    }

    /// Insert `obs` at its ordered position, replacing any observation with
    /// the same timestamp. Appends past the last timestamp are O(1) amortized.
    pub(crate) fn upsert(&mut self, obs: Observation) {
        if self.last().map_or(true, |last| last.timestamp < obs.timestamp) {
            self.observations.push(obs);
            return;
        }
        match self.search(obs.timestamp) {
            Ok(idx) => self.observations[idx] = obs,
            Err(pos) => self.observations.insert(pos, obs),
        }
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}

impl<'de> Deserialize<'de> for Series {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            observations: Vec<Observation>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Series::from_observations(raw.observations).map_err(serde::de::Error::custom)
    }
}

/// Lazy, restartable view over a time range of a series.
#[derive(Debug, Clone)]
pub struct Range<'a> {
    inner: std::slice::Iter<'a, Observation>,
}

impl<'a> Iterator for Range<'a> {
    type Item = &'a Observation;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for Range<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl ExactSizeIterator for Range<'_> {}

pub(crate) fn validate_observation(obs: &Observation) -> Result<()> {
    match (obs.value, obs.provenance) {
        (None, Provenance::Missing) => Ok(()),
        (Some(v), Provenance::Observed | Provenance::Imputed) if v.is_finite() => Ok(()),
        (Some(v), Provenance::Observed | Provenance::Imputed) => Err(TemporaError::InvalidInput(
            format!("non-finite value {} at timestamp {}", v, obs.timestamp),
        )),
        (Some(_), Provenance::Missing) => Err(TemporaError::InvalidInput(format!(
            "missing slot at timestamp {} carries a value",
            obs.timestamp
        ))),
        (None, _) => Err(TemporaError::InvalidInput(format!(
            "present slot at timestamp {} has no value",
            obs.timestamp
        ))),
    }
}
