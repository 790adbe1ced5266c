//! Mutable, time-indexed store that builds a validated [`Series`].
//!
//! Observations live in a `BTreeMap` keyed by timestamp, so inserts in any
//! order and lookups are O(log n). Out-of-order and duplicate timestamps are
//! rejected unless the store is configured to resolve them.

use crate::error::{Result, TemporaError};
use crate::series::{validate_observation, Observation, Series, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{btree_map, BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// How to resolve two values reported for the same timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    KeepFirst,
    KeepLast,
    /// Running mean of every value seen at the timestamp.
    Average,
}

impl FromStr for DuplicatePolicy {
    type Err = TemporaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep_first" | "keepfirst" | "first" => Ok(Self::KeepFirst),
            "keep_last" | "keeplast" | "last" => Ok(Self::KeepLast),
            "average" | "avg" | "mean" => Ok(Self::Average),
            _ => Err(TemporaError::invalid_parameter(
                "duplicate_policy",
                s,
                "expected keep_first, keep_last or average",
            )),
        }
    }
}

/// Store behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Accept timestamps older than the last inserted one.
    pub allow_out_of_order: bool,
    /// Resolution for exact duplicates; `None` rejects them.
    pub duplicate_policy: Option<DuplicatePolicy>,
}

/// Single-owner store of observations for one series.
#[derive(Debug, Clone, Default)]
pub struct SeriesStore {
    points: BTreeMap<Timestamp, Observation>,
    config: StoreConfig,
    /// Number of values merged so far, only for averaged timestamps.
    merged: HashMap<Timestamp, usize>,
}

impl SeriesStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            points: BTreeMap::new(),
            config,
            merged: HashMap::new(),
        }
    }

    /// Build a store from pairs, inserting each in turn.
    pub fn from_pairs<I>(config: StoreConfig, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Timestamp, f64)>,
    {
        let mut store = Self::new(config);
        store.extend(pairs)?;
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Insert one observed value.
    pub fn insert(&mut self, timestamp: Timestamp, value: f64) -> Result<()> {
        self.insert_resolved(timestamp, value).map(|_| ())
    }

    /// Insert and return the observation now stored at `timestamp`.
    fn insert_resolved(&mut self, timestamp: Timestamp, value: f64) -> Result<Observation> {
        let obs = Observation::observed(timestamp, value);
        validate_observation(&obs)?;

        let last = self.points.keys().next_back().copied();
        if let Some(last) = last.filter(|&last| timestamp < last) {
            if !self.points.contains_key(&timestamp) && !self.config.allow_out_of_order {
                return Err(TemporaError::OutOfOrder { timestamp, last });
            }
        }

        match self.points.entry(timestamp) {
            btree_map::Entry::Vacant(slot) => {
                if last.is_some_and(|last| timestamp < last) {
                    debug!(timestamp, "out-of-order insert");
                }
                Ok(*slot.insert(obs))
            }
            btree_map::Entry::Occupied(slot) => {
                let existing = slot.into_mut();
                match self.config.duplicate_policy {
                    None => return Err(TemporaError::DuplicateTimestamp(timestamp)),
                    Some(DuplicatePolicy::KeepFirst) => {}
                    Some(DuplicatePolicy::KeepLast) => existing.value = Some(value),
                    Some(DuplicatePolicy::Average) => {
                        let count = self.merged.entry(timestamp).or_insert(1);
                        let old = existing.value.unwrap_or(value);
                        *count += 1;
                        existing.value = Some(old + (value - old) / *count as f64);
                        debug!(timestamp, merged = *count, "averaged duplicate");
                    }
                }
                Ok(*existing)
            }
        }
    }

    /// Insert every pair, stopping at the first error.
    pub fn extend<I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (Timestamp, f64)>,
    {
        for (t, v) in pairs {
            self.insert(t, v)?;
        }
        Ok(())
    }

    pub fn at(&self, timestamp: Timestamp) -> Result<&Observation> {
        self.points
            .get(&timestamp)
            .ok_or(TemporaError::NotFound(timestamp))
    }

    /// Observations with `start <= timestamp < end`, in timestamp order.
    ///
    /// An empty or inverted range yields an empty iterator.
    pub fn range(&self, start: Timestamp, end: Timestamp) -> StoreRange<'_> {
        StoreRange {
            inner: self.points.range(start..end.max(start)),
        }
    }

    pub fn first(&self) -> Option<&Observation> {
        self.points.values().next()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.points.values().next_back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Ordered copy of the stored observations as a [`Series`].
    pub fn to_series(&self) -> Series {
        Series::from_validated(self.points.values().copied().collect())
    }

    pub fn into_series(self) -> Series {
        Series::from_validated(self.points.into_values().collect())
    }
}

/// Lazy, restartable view over a time range of a [`SeriesStore`].
#[derive(Debug, Clone)]
pub struct StoreRange<'a> {
    inner: btree_map::Range<'a, Timestamp, Observation>,
}

impl<'a> Iterator for StoreRange<'a> {
    type Item = &'a Observation;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, obs)| obs)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for StoreRange<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, obs)| obs)
    }
}

#[derive(Debug, Default)]
struct Shared {
    store: SeriesStore,
    /// Published view handed out by `snapshot`; copied on write only while
    /// a snapshot still holds it.
    published: Arc<Series>,
}

/// Store shared between threads with single-writer discipline.
///
/// Writers are serialized by the lock; readers take point-in-time snapshots
/// that later inserts never alter. Taking a snapshot is O(1).
#[derive(Debug, Default)]
pub struct SharedStore {
    inner: RwLock<Shared>,
}

impl SharedStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: RwLock::new(Shared {
                store: SeriesStore::new(config),
                published: Arc::new(Series::new()),
            }),
        }
    }

    pub fn insert(&self, timestamp: Timestamp, value: f64) -> Result<()> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let shared = &mut *guard;
        let stored = shared.store.insert_resolved(timestamp, value)?;
        Arc::make_mut(&mut shared.published).upsert(stored);
        Ok(())
    }

    /// Consistent view of the series as of this call.
    pub fn snapshot(&self) -> Arc<Series> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard.published)
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .store
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_append_in_order() {
        let store = SeriesStore::from_pairs(StoreConfig::default(), vec![(1, 1.0), (2, 2.0)])
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.at(2).unwrap().value, Some(2.0));
    }

    #[test]
    fn test_out_of_order_rejected() {
        let mut store = SeriesStore::new(StoreConfig::default());
        store.insert(10, 1.0).unwrap();
        let err = store.insert(5, 2.0).unwrap_err();
        assert_eq!(
            err,
            TemporaError::OutOfOrder {
                timestamp: 5,
                last: 10
            }
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_out_of_order_allowed() {
        let mut store = SeriesStore::new(StoreConfig {
            allow_out_of_order: true,
            duplicate_policy: None,
        });
        for t in [30, 10, 20] {
            store.insert(t, t as f64).unwrap();
        }
        let ts: Vec<_> = store.range(0, 100).map(|o| o.timestamp).collect();
        assert_eq!(ts, vec![10, 20, 30]);
    }

    #[test]
    fn test_duplicate_rejected_without_policy() {
        let mut store = SeriesStore::new(StoreConfig::default());
        store.insert(10, 1.0).unwrap();
        assert_eq!(
            store.insert(10, 2.0).unwrap_err(),
            TemporaError::DuplicateTimestamp(10)
        );
    }

    #[test]
    fn test_duplicate_policies() {
        let cases = [
            (DuplicatePolicy::KeepFirst, 1.0),
            (DuplicatePolicy::KeepLast, 5.0),
            (DuplicatePolicy::Average, 3.0),
        ];
        for (policy, expected) in cases {
            let mut store = SeriesStore::new(StoreConfig {
                allow_out_of_order: false,
                duplicate_policy: Some(policy),
            });
            store.insert(0, 0.0).unwrap();
            store.insert(10, 1.0).unwrap();
            store.insert(10, 3.0).unwrap();
            store.insert(10, 5.0).unwrap();
            assert_eq!(store.at(10).unwrap().value, Some(expected), "{:?}", policy);
        }
    }

    #[test]
    fn test_insert_rejects_non_finite() {
        let mut store = SeriesStore::new(StoreConfig::default());
        assert!(matches!(
            store.insert(1, f64::INFINITY),
            Err(TemporaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_duplicate_policy_from_str() {
        assert_eq!(
            "Keep_Last".parse::<DuplicatePolicy>().unwrap(),
            DuplicatePolicy::KeepLast
        );
        assert!("median".parse::<DuplicatePolicy>().is_err());
    }

    #[test]
    fn test_shared_store_snapshot_is_point_in_time() {
        let store = Arc::new(SharedStore::new(StoreConfig::default()));
        store.insert(1, 1.0).unwrap();
        let snap = store.snapshot();

        let writer = Arc::clone(&store);
        std::thread::spawn(move || {
            for t in 2..100 {
                writer.insert(t, t as f64).unwrap();
            }
        })
        .join()
        .unwrap();

        assert_eq!(snap.len(), 1);
        assert_eq!(store.len(), 99);
    }

    #[test]
    fn test_shared_snapshot_unaffected_by_later_inserts() {
        let store = SharedStore::new(StoreConfig {
            allow_out_of_order: true,
            duplicate_policy: Some(DuplicatePolicy::KeepLast),
        });
        for t in [10, 30] {
            store.insert(t, t as f64).unwrap();
        }
        let before = store.snapshot();
        assert!(Arc::ptr_eq(&before, &store.snapshot()));

        store.insert(20, 20.0).unwrap();
        store.insert(10, -1.0).unwrap();
        let after = store.snapshot();

        assert_eq!(before.timestamps(), vec![10, 30]);
        assert_eq!(before.at(10).unwrap().value, Some(10.0));
        assert_eq!(after.timestamps(), vec![10, 20, 30]);
        assert_eq!(after.at(10).unwrap().value, Some(-1.0));
        assert!(store.insert(40, f64::NAN).is_err());
        assert_eq!(store.snapshot().len(), 3);
    }

    #[test]
    fn test_store_lookups() {
        let mut store = SeriesStore::new(StoreConfig {
            allow_out_of_order: true,
            duplicate_policy: None,
        });
        for t in [50, 10, 40, 20, 30] {
            store.insert(t, t as f64).unwrap();
        }
        assert_eq!(store.first().unwrap().timestamp, 10);
        assert_eq!(store.last().unwrap().timestamp, 50);
        assert_eq!(store.at(7).unwrap_err(), TemporaError::NotFound(7));
        assert_eq!(store.range(40, 20).count(), 0);

        let range = store.range(20, 50);
        let forward: Vec<_> = range.clone().map(|o| o.timestamp).collect();
        let backward: Vec<_> = range.rev().map(|o| o.timestamp).collect();
        assert_eq!(forward, vec![20, 30, 40]);
        assert_eq!(backward, vec![40, 30, 20]);
        assert_eq!(store.to_series().timestamps(), vec![10, 20, 30, 40, 50]);
    }

    proptest! {
        #[test]
        fn prop_range_strictly_increasing(
            entries in proptest::collection::vec((-1000i64..1000, -1e6f64..1e6), 0..200)
        ) {
            let mut store = SeriesStore::new(StoreConfig {
                allow_out_of_order: true,
                duplicate_policy: Some(DuplicatePolicy::KeepLast),
            });
            for (t, v) in entries {
                store.insert(t, v).unwrap();
            }
            let ts: Vec<Timestamp> = store.range(i64::MIN, i64::MAX).map(|o| o.timestamp).collect();
            prop_assert!(ts.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(store.into_series().timestamps(), ts);
        }
    }
}
