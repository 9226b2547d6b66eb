//! Determinism utilities: stable ordering and first-seen tallies.
//!
//! This module is **I/O-free**. It provides:
//! - A tally that remembers first-insertion order of its keys
//! - A stable descending ranking over that tally (ties keep first-seen order)
//! - Canonical sort helpers for unit collections

use core::cmp::Ordering;
use std::collections::BTreeMap;

use crate::entities::AtomicUnit;
use crate::ids::UnitId;

/* -------------------------------------------------------------------------- */
/*                               First-seen tally                             */
/* -------------------------------------------------------------------------- */

/// Accumulates `u64` totals per key while remembering the order in which
/// keys were first encountered.
#[derive(Clone, Debug)]
pub struct FirstSeenTally<K: Ord + Clone> {
    order: Vec<(K, u64)>,
    index: BTreeMap<K, usize>,
}

impl<K: Ord + Clone> Default for FirstSeenTally<K> {
    fn default() -> Self {
        Self { order: Vec::new(), index: BTreeMap::new() }
    }
}

impl<K: Ord + Clone> FirstSeenTally<K> {
    pub fn new() -> Self { Self::default() }

    /// Add `v` to `key`, registering the key on first sight. Saturates.
    pub fn add(&mut self, key: &K, v: u64) {
        match self.index.get(key) {
            Some(&i) => self.order[i].1 = self.order[i].1.saturating_add(v),
            None => {
                self.index.insert(key.clone(), self.order.len());
                self.order.push((key.clone(), v));
            }
        }
    }

    pub fn len(&self) -> usize { self.order.len() }
    pub fn is_empty(&self) -> bool { self.order.is_empty() }

    pub fn get(&self, key: &K) -> Option<u64> {
        self.index.get(key).map(|&i| self.order[i].1)
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &(K, u64)> {
        self.order.iter()
    }

    /// Entries sorted by total descending. Equal totals keep first-seen order.
    pub fn into_ranked(self) -> Vec<(K, u64)> {
        let mut v = self.order;
        v.sort_by(|a, b| b.1.cmp(&a.1));
        v
    }
}

/* -------------------------------------------------------------------------- */
/*                            Canonical sort helpers                          */
/* -------------------------------------------------------------------------- */

#[inline]
pub fn cmp_units_by_id(a: &AtomicUnit, b: &AtomicUnit) -> Ordering {
    a.id.cmp(&b.id)
}

/// Sort unit references in place by ascending `UnitId`.
pub fn sort_units_by_id(xs: &mut [&AtomicUnit]) {
    xs.sort_by(|a, b| cmp_units_by_id(a, b));
}

/// Sorted, de-duplicated copy of a unit id list.
pub fn canonical_unit_ids<I: IntoIterator<Item = UnitId>>(ids: I) -> Vec<UnitId> {
    let mut v: Vec<UnitId> = ids.into_iter().collect();
    v.sort_unstable();
    v.dedup();
    v
}
