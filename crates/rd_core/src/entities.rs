//! crates/rd_core/src/entities.rs
//! Domain entities: raw candidate records, normalized candidates, atomic units
//! and the unit registry. Ordering is canonical by `UnitId`.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ids::{PartyId, ReservationCategory, UnitId};
use crate::numeric::{Pct2, RawNumeric};

/// One candidate row exactly as read from the input, before coercion.
///
/// Every numeric field is kept raw so the aggregator can count what was
/// missing or malformed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CandidateRecord {
    pub unit: RawNumeric,
    pub party: Option<String>,
    pub votes: RawNumeric,
    pub valid_votes: RawNumeric,
    pub vote_share: RawNumeric,
    pub electors: RawNumeric,
    pub category: Option<String>,
    pub margin: RawNumeric,
    pub margin_pct: RawNumeric,
    pub position: RawNumeric,
}

/// A candidate inside one atomic unit, after normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Candidate {
    pub party: PartyId,
    pub votes: u64,
    pub vote_share: Pct2,
    pub margin: u64,
    pub margin_pct: Pct2,
    /// Position within the unit as declared by the record (1 = winner). 0 when unknown.
    pub rank: u32,
}

/// Winner fields taken from the rank-1 record of a unit.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeclaredWinner {
    pub party: PartyId,
    pub margin: u64,
    pub margin_pct: Pct2,
}

/// Smallest indivisible voting unit.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AtomicUnit {
    pub id: UnitId,
    pub valid_votes: u64,
    pub electors: u64,
    pub reservation: ReservationCategory,
    /// Candidates in input order.
    pub candidates: Vec<Candidate>,
    pub declared_winner: Option<DeclaredWinner>,
}

impl AtomicUnit {
    pub fn new(id: UnitId, valid_votes: u64, electors: u64, reservation: ReservationCategory) -> Self {
        Self { id, valid_votes, electors, reservation, candidates: Vec::new(), declared_winner: None }
    }

    /// Append a candidate. The first rank-1 candidate becomes the declared winner.
    pub fn push_candidate(&mut self, c: Candidate) {
        if c.rank == 1 && self.declared_winner.is_none() {
            self.declared_winner = Some(DeclaredWinner {
                party: c.party.clone(),
                margin: c.margin,
                margin_pct: c.margin_pct,
            });
        }
        self.candidates.push(c);
    }

    pub fn rank_one_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.rank == 1).count()
    }

    pub fn total_candidate_votes(&self) -> u64 {
        self.candidates.iter().fold(0u64, |acc, c| acc.saturating_add(c.votes))
    }
}

/// Units keyed by id; iteration is ascending by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitRegistry {
    units: BTreeMap<UnitId, AtomicUnit>,
}

impl UnitRegistry {
    pub fn new() -> Self { Self::default() }

    /// Insert or replace; returns the previous unit with the same id.
    pub fn insert(&mut self, unit: AtomicUnit) -> Option<AtomicUnit> {
        self.units.insert(unit.id, unit)
    }

    pub fn get(&self, id: UnitId) -> Option<&AtomicUnit> { self.units.get(&id) }
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut AtomicUnit> { self.units.get_mut(&id) }
    pub fn contains(&self, id: UnitId) -> bool { self.units.contains_key(&id) }
    pub fn remove(&mut self, id: UnitId) -> Option<AtomicUnit> { self.units.remove(&id) }
    pub fn len(&self) -> usize { self.units.len() }
    pub fn is_empty(&self) -> bool { self.units.is_empty() }

    pub fn ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.units.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AtomicUnit> {
        self.units.values()
    }

    /// Resolve ids to units, skipping unknown ids.
    pub fn resolve<'a, I>(&'a self, ids: I) -> Vec<&'a AtomicUnit>
    where
        I: IntoIterator<Item = &'a UnitId>,
    {
        ids.into_iter().filter_map(|id| self.units.get(id)).collect()
    }
}

impl FromIterator<AtomicUnit> for UnitRegistry {
    fn from_iter<T: IntoIterator<Item = AtomicUnit>>(iter: T) -> Self {
        let mut r = UnitRegistry::new();
        for u in iter {
            r.insert(u);
        }
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(party: &str, votes: u64, rank: u32) -> Candidate {
        Candidate {
            party: party.parse().unwrap(),
            votes,
            vote_share: Pct2::ZERO,
            margin: 10,
            margin_pct: Pct2::from_hundredths(100),
            rank,
        }
    }

    #[test]
    fn first_rank_one_is_declared_winner() {
        let mut u = AtomicUnit::new(UnitId::new(1), 100, 150, ReservationCategory::default());
        u.push_candidate(cand("B", 40, 2));
        u.push_candidate(cand("A", 60, 1));
        u.push_candidate(cand("C", 60, 1));
        assert_eq!(u.declared_winner.as_ref().map(|w| w.party.as_str()), Some("A"));
        assert_eq!(u.rank_one_count(), 2);
        assert_eq!(u.total_candidate_votes(), 160);
    }

    #[test]
    fn registry_iterates_by_id() {
        let r: UnitRegistry = [5u32, 1, 3]
            .into_iter()
            .map(|i| AtomicUnit::new(UnitId::new(i), 0, 0, ReservationCategory::default()))
            .collect();
        assert_eq!(r.ids().map(UnitId::get).collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(r.resolve(&[UnitId::new(3), UnitId::new(9)]).len(), 1);
    }
}
