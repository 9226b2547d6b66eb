//! crates/rd_core/src/partition.rs
//! District -> unit membership with an owner index kept in lockstep.
//!
//! Invariant: every unit appears in exactly one district's member set and
//! `owner[u] == d` iff `u ∈ members[d]`. All mutation goes through methods
//! that validate first and mutate second, so a failed call leaves the
//! partition untouched.

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::CoreError;
use crate::ids::{DistrictId, UnitId};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Partition {
    members: BTreeMap<DistrictId, BTreeSet<UnitId>>,
    owner: BTreeMap<UnitId, DistrictId>,
}

/// Member sets of the two districts touched by a hypothetical swap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulatedSwap {
    pub district_a: DistrictId,
    pub members_a: BTreeSet<UnitId>,
    pub district_b: DistrictId,
    pub members_b: BTreeSet<UnitId>,
}

impl Partition {
    pub fn new() -> Self { Self::default() }

    /// Register a district even if it has no members yet.
    pub fn ensure_district(&mut self, d: DistrictId) {
        self.members.entry(d).or_default();
    }

    /// Assign `unit` to `district`. Rejects a unit that already has a district.
    pub fn insert(&mut self, district: DistrictId, unit: UnitId) -> Result<(), CoreError> {
        if let Some(&existing) = self.owner.get(&unit) {
            return Err(CoreError::DuplicateMember { unit, existing });
        }
        self.owner.insert(unit, district);
        self.members.entry(district).or_default().insert(unit);
        Ok(())
    }

    /// Drop a unit from whatever district holds it.
    pub fn remove_unit(&mut self, unit: UnitId) -> Option<DistrictId> {
        let d = self.owner.remove(&unit)?;
        if let Some(set) = self.members.get_mut(&d) {
            set.remove(&unit);
        }
        Some(d)
    }

    #[inline]
    pub fn district_of(&self, unit: UnitId) -> Option<DistrictId> {
        self.owner.get(&unit).copied()
    }

    #[inline]
    pub fn members(&self, d: DistrictId) -> Option<&BTreeSet<UnitId>> {
        self.members.get(&d)
    }

    pub fn district_ids(&self) -> impl Iterator<Item = DistrictId> + '_ {
        self.members.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DistrictId, &BTreeSet<UnitId>)> {
        self.members.iter().map(|(d, s)| (*d, s))
    }

    pub fn unit_ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.owner.keys().copied()
    }

    pub fn district_count(&self) -> usize { self.members.len() }
    pub fn unit_count(&self) -> usize { self.owner.len() }

    fn check_swap(&self, a: UnitId, b: UnitId) -> Result<(DistrictId, DistrictId), CoreError> {
        if a == b {
            return Err(CoreError::SelfSwap(a));
        }
        let da = self.district_of(a).ok_or(CoreError::UnitNotAssigned(a))?;
        let db = self.district_of(b).ok_or(CoreError::UnitNotAssigned(b))?;
        if da == db {
            return Err(CoreError::SameDistrict { a, b, district: da });
        }
        Ok((da, db))
    }

    /// Member sets after exchanging `a` and `b`, without touching `self`.
    pub fn simulate_swap(&self, a: UnitId, b: UnitId) -> Result<SimulatedSwap, CoreError> {
        let (da, db) = self.check_swap(a, b)?;
        let mut members_a = self.members.get(&da).cloned().unwrap_or_default();
        let mut members_b = self.members.get(&db).cloned().unwrap_or_default();
        members_a.remove(&a);
        members_a.insert(b);
        members_b.remove(&b);
        members_b.insert(a);
        Ok(SimulatedSwap { district_a: da, members_a, district_b: db, members_b })
    }

    /// Exchange the districts of `a` and `b`. Returns `(old district of a, old district of b)`.
    pub fn swap(&mut self, a: UnitId, b: UnitId) -> Result<(DistrictId, DistrictId), CoreError> {
        let (da, db) = self.check_swap(a, b)?;
        if let Some(set) = self.members.get_mut(&da) {
            set.remove(&a);
            set.insert(b);
        }
        if let Some(set) = self.members.get_mut(&db) {
            set.remove(&b);
            set.insert(a);
        }
        self.owner.insert(a, db);
        self.owner.insert(b, da);
        Ok((da, db))
    }

    /// Verify the owner index against the member sets.
    pub fn check_invariant(&self) -> Result<(), CoreError> {
        let mut seen = 0usize;
        for (d, set) in &self.members {
            for u in set {
                seen += 1;
                if self.owner.get(u) != Some(d) {
                    return Err(CoreError::InvariantBroken("member without matching owner entry"));
                }
            }
        }
        if seen != self.owner.len() {
            return Err(CoreError::InvariantBroken("owner index size differs from member count"));
        }
        Ok(())
    }

    /// Every unit of `universe` is assigned, and nothing else is.
    pub fn covers<I: IntoIterator<Item = UnitId>>(&self, universe: I) -> bool {
        let want: BTreeSet<UnitId> = universe.into_iter().collect();
        want.len() == self.owner.len() && want.iter().all(|u| self.owner.contains_key(u))
    }

    /// District -> ascending unit list.
    pub fn to_mapping(&self) -> BTreeMap<DistrictId, Vec<UnitId>> {
        self.members
            .iter()
            .map(|(d, s)| (*d, s.iter().copied().collect()))
            .collect()
    }
}
