// crates/rd_algo/src/adjacency.rs
//
// Adjacency index: pluggable neighbor sources plus a call-time compatibility rule.
// Neighbor status is always evaluated against the partition passed in, never a
// snapshot, because membership changes as swaps commit. The stored table is
// taken as directed; symmetry is neither assumed nor enforced.

use std::collections::{BTreeMap, BTreeSet};

use rd_core::entities::{AtomicUnit, UnitRegistry};
use rd_core::ids::{DistrictId, UnitId};
use rd_core::partition::Partition;
use rd_core::variables::{Compatibility, NeighborSourceKind};

// --------- Neighbor sources -------------------------------------------------------------------

/// Raw candidate neighbors for a unit, before district and compatibility filtering.
pub trait NeighborSource {
    fn raw_neighbors(&self, unit: UnitId, partition: &Partition) -> Vec<UnitId>;
    fn label(&self) -> &'static str;
}

/// Unit -> neighbor ids, as supplied by the input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdjacencyTable {
    edges: BTreeMap<UnitId, BTreeSet<UnitId>>,
}

impl AdjacencyTable {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, unit: UnitId, neighbor: UnitId) {
        self.edges.entry(unit).or_default().insert(neighbor);
    }

    /// Register a unit with an (initially) empty neighbor list.
    pub fn ensure_entry(&mut self, unit: UnitId) {
        self.edges.entry(unit).or_default();
    }

    pub fn has_entry(&self, unit: UnitId) -> bool { self.edges.contains_key(&unit) }
    pub fn len(&self) -> usize { self.edges.len() }
    pub fn is_empty(&self) -> bool { self.edges.is_empty() }

    pub fn neighbors_of(&self, unit: UnitId) -> impl Iterator<Item = UnitId> + '_ {
        self.edges.get(&unit).into_iter().flatten().copied()
    }

    /// Ids from `units` that have no entry at all.
    pub fn missing_entries<I: IntoIterator<Item = UnitId>>(&self, units: I) -> Vec<UnitId> {
        units.into_iter().filter(|u| !self.edges.contains_key(u)).collect()
    }

    /// Directed pairs `(a, b)` whose reverse `(b, a)` is absent.
    pub fn asymmetric_pairs(&self) -> Vec<(UnitId, UnitId)> {
        let mut out = Vec::new();
        for (a, ns) in &self.edges {
            for b in ns {
                let back = self.edges.get(b).map(|s| s.contains(a)).unwrap_or(false);
                if !back {
                    out.push((*a, *b));
                }
            }
        }
        out
    }
}

impl FromIterator<(UnitId, Vec<UnitId>)> for AdjacencyTable {
    fn from_iter<T: IntoIterator<Item = (UnitId, Vec<UnitId>)>>(iter: T) -> Self {
        let mut t = AdjacencyTable::new();
        for (u, ns) in iter {
            t.ensure_entry(u);
            for n in ns {
                t.insert(u, n);
            }
        }
        t
    }
}

impl NeighborSource for AdjacencyTable {
    fn raw_neighbors(&self, unit: UnitId, _partition: &Partition) -> Vec<UnitId> {
        self.neighbors_of(unit).collect()
    }
    fn label(&self) -> &'static str { "adjacency" }
}

/// Every assigned unit is a candidate neighbor.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllUnits;

impl NeighborSource for AllUnits {
    fn raw_neighbors(&self, unit: UnitId, partition: &Partition) -> Vec<UnitId> {
        partition.unit_ids().filter(|u| *u != unit).collect()
    }
    fn label(&self) -> &'static str { "all_units" }
}

/// Synthetic heuristic: ids within `span` of the unit's id.
#[derive(Clone, Copy, Debug)]
pub struct ConsecutiveIds {
    pub span: u32,
}

impl NeighborSource for ConsecutiveIds {
    fn raw_neighbors(&self, unit: UnitId, partition: &Partition) -> Vec<UnitId> {
        let id = unit.get();
        let lo = id.saturating_sub(self.span);
        let hi = id.saturating_add(self.span);
        (lo..=hi)
            .filter(|i| *i != id)
            .map(UnitId::new)
            .filter(|u| partition.district_of(*u).is_some())
            .collect()
    }
    fn label(&self) -> &'static str { "consecutive_ids" }
}

// --------- Compatibility ----------------------------------------------------------------------

/// Predicate deciding whether two units may be exchanged.
pub trait CompatibilityRule {
    fn compatible(&self, a: &AtomicUnit, b: &AtomicUnit) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AnyUnit;

impl CompatibilityRule for AnyUnit {
    #[inline]
    fn compatible(&self, _a: &AtomicUnit, _b: &AtomicUnit) -> bool { true }
}

/// Both units carry the same reservation category.
#[derive(Clone, Copy, Debug, Default)]
pub struct SameReservation;

impl CompatibilityRule for SameReservation {
    #[inline]
    fn compatible(&self, a: &AtomicUnit, b: &AtomicUnit) -> bool {
        a.reservation == b.reservation
    }
}

// --------- Index ------------------------------------------------------------------------------

pub struct AdjacencyIndex {
    source: Box<dyn NeighborSource>,
    compat: Box<dyn CompatibilityRule>,
}

impl std::fmt::Debug for AdjacencyIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdjacencyIndex").field("source", &self.source.label()).finish()
    }
}

impl AdjacencyIndex {
    pub fn new(source: Box<dyn NeighborSource>, compat: Box<dyn CompatibilityRule>) -> Self {
        Self { source, compat }
    }

    /// Build from parameter domains. `table` is used only for `NeighborSourceKind::Adjacency`.
    pub fn from_kinds(kind: NeighborSourceKind, compat: Compatibility, table: AdjacencyTable) -> Self {
        let source: Box<dyn NeighborSource> = match kind {
            NeighborSourceKind::Adjacency => Box::new(table),
            NeighborSourceKind::AllUnits => Box::new(AllUnits),
            NeighborSourceKind::ConsecutiveIds { span } => Box::new(ConsecutiveIds { span }),
        };
        let compat: Box<dyn CompatibilityRule> = match compat {
            Compatibility::Any => Box::new(AnyUnit),
            Compatibility::ReservationMatch => Box::new(SameReservation),
        };
        Self { source, compat }
    }

    pub fn source_label(&self) -> &'static str { self.source.label() }

    /// Swap candidates for `unit`: outside its current district, assigned, known to the
    /// registry and compatible. Ascending by id.
    pub fn neighbors(&self, unit: UnitId, partition: &Partition, registry: &UnitRegistry) -> BTreeSet<UnitId> {
        let (Some(home), Some(me)) = (partition.district_of(unit), registry.get(unit)) else {
            return BTreeSet::new();
        };
        self.source
            .raw_neighbors(unit, partition)
            .into_iter()
            .filter(|n| *n != unit)
            .filter(|n| matches!(partition.district_of(*n), Some(d) if d != home))
            .filter(|n| registry.get(*n).map(|other| self.compat.compatible(me, other)).unwrap_or(false))
            .collect()
    }

    /// Unfiltered neighbor ids (source order, deduplicated, ascending).
    pub fn raw_neighbors(&self, unit: UnitId, partition: &Partition) -> BTreeSet<UnitId> {
        self.source.raw_neighbors(unit, partition).into_iter().filter(|n| *n != unit).collect()
    }

    /// Units adjacent to any member of `district` but outside it (no compatibility filter).
    pub fn district_frontier(&self, district: DistrictId, partition: &Partition) -> BTreeSet<UnitId> {
        let Some(members) = partition.members(district) else {
            return BTreeSet::new();
        };
        let mut out = BTreeSet::new();
        for u in members {
            for n in self.source.raw_neighbors(*u, partition) {
                if !members.contains(&n) {
                    out.insert(n);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rd_core::ids::ReservationCategory;

    fn u(i: u32) -> UnitId { UnitId::new(i) }
    fn d(i: u32) -> DistrictId { DistrictId::new(i) }

    fn setup() -> (Partition, UnitRegistry) {
        let mut p = Partition::new();
        let mut r = UnitRegistry::new();
        for (i, dist, cat) in [(1, 1, "GEN"), (2, 1, "SC"), (3, 2, "GEN"), (4, 2, "SC"), (5, 3, "GEN")] {
            p.insert(d(dist), u(i)).unwrap();
            r.insert(AtomicUnit::new(u(i), 100, 200, cat.parse::<ReservationCategory>().unwrap()));
        }
        (p, r)
    }

    fn table() -> AdjacencyTable {
        [(u(1), vec![u(2), u(3), u(4)]), (u(2), vec![u(4)]), (u(3), vec![u(1), u(5)])]
            .into_iter()
            .collect()
    }

    #[test]
    fn neighbors_exclude_same_district_and_incompatible() {
        let (p, r) = setup();
        let idx = AdjacencyIndex::from_kinds(NeighborSourceKind::Adjacency, Compatibility::ReservationMatch, table());
        assert_eq!(idx.neighbors(u(1), &p, &r), [u(3)].into_iter().collect());
        let any = AdjacencyIndex::from_kinds(NeighborSourceKind::Adjacency, Compatibility::Any, table());
        assert_eq!(any.neighbors(u(1), &p, &r), [u(3), u(4)].into_iter().collect());
    }

    #[test]
    fn neighbors_follow_current_partition() {
        let (mut p, r) = setup();
        let idx = AdjacencyIndex::from_kinds(NeighborSourceKind::Adjacency, Compatibility::Any, table());
        p.swap(u(2), u(3)).unwrap();
        // 3 now shares district 1 with unit 1
        assert_eq!(idx.neighbors(u(1), &p, &r), [u(2), u(4)].into_iter().collect());
    }

    #[test]
    fn table_is_not_assumed_symmetric() {
        let t = table();
        assert!(t.asymmetric_pairs().contains(&(u(1), u(4))));
        assert_eq!(t.missing_entries([u(1), u(4), u(5)]), vec![u(4), u(5)]);
    }

    #[test]
    fn consecutive_and_all_units_sources() {
        let (p, r) = setup();
        let cons = AdjacencyIndex::from_kinds(NeighborSourceKind::ConsecutiveIds { span: 2 }, Compatibility::Any, AdjacencyTable::new());
        assert_eq!(cons.neighbors(u(1), &p, &r), [u(3)].into_iter().collect());
        let all = AdjacencyIndex::from_kinds(NeighborSourceKind::AllUnits, Compatibility::Any, AdjacencyTable::new());
        assert_eq!(all.neighbors(u(5), &p, &r).len(), 4);
    }

    #[test]
    fn frontier_is_outside_members() {
        let (p, _) = setup();
        let idx = AdjacencyIndex::from_kinds(NeighborSourceKind::Adjacency, Compatibility::Any, table());
        assert_eq!(idx.district_frontier(d(1), &p), [u(3), u(4)].into_iter().collect());
        assert_eq!(idx.district_frontier(d(2), &p), [u(1), u(5)].into_iter().collect());
        assert!(idx.district_frontier(d(9), &p).is_empty());
    }
}
