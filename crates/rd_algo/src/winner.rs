// crates/rd_algo/src/winner.rs
//
// Winner calculation over an arbitrary set of atomic units.
//
// - Party totals accumulate across units (u64, saturating).
// - Ranking is by total descending; ties keep first-encountered order, where
//   encounter order is units by ascending id, then candidates in input order.
//   The caller's unit order therefore never changes the result.
// - Margin = top − runner-up, with a missing runner-up counting as 0.
// - margin_pct is integer hundredths over summed valid votes, guarded at 0.
// - No RNG, no I/O, no caching: callers re-invoke after every membership change.

use std::collections::BTreeMap;

use rd_core::determinism::{sort_units_by_id, FirstSeenTally};
use rd_core::entities::{AtomicUnit, UnitRegistry};
use rd_core::ids::{DistrictId, PartyId};
use rd_core::numeric::{margin_pct, Pct2};
use rd_core::partition::Partition;

/// Aggregate result for a set of units.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Outcome {
    /// `None` when no candidate is present at all.
    pub winner: Option<PartyId>,
    pub margin: u64,
    pub margin_pct: Pct2,
    pub total_valid_votes: u64,
    pub total_electors: u64,
    /// Ranked party totals (descending, stable).
    pub votes_by_party: Vec<(PartyId, u64)>,
}

impl Outcome {
    #[inline]
    pub fn is_won_by(&self, party: &PartyId) -> bool {
        self.winner.as_ref() == Some(party)
    }

    /// Sum of every party's tallied votes.
    pub fn total_party_votes(&self) -> u64 {
        self.votes_by_party.iter().fold(0u64, |acc, (_, v)| acc.saturating_add(*v))
    }

    pub fn winning_votes(&self) -> u64 {
        self.votes_by_party.first().map(|(_, v)| *v).unwrap_or(0)
    }
}

/// Compute the leading party, margin and margin percentage for `units`.
pub fn winner<'a, I>(units: I) -> Outcome
where
    I: IntoIterator<Item = &'a AtomicUnit>,
{
    let mut ordered: Vec<&AtomicUnit> = units.into_iter().collect();
    sort_units_by_id(&mut ordered);

    let mut tally: FirstSeenTally<PartyId> = FirstSeenTally::new();
    let mut total_valid_votes = 0u64;
    let mut total_electors = 0u64;
    for u in &ordered {
        total_valid_votes = total_valid_votes.saturating_add(u.valid_votes);
        total_electors = total_electors.saturating_add(u.electors);
        for c in &u.candidates {
            tally.add(&c.party, c.votes);
        }
    }

    let ranked = tally.into_ranked();
    let (winner, margin) = match ranked.as_slice() {
        [] => (None, 0),
        [(p, top)] => (Some(p.clone()), *top),
        [(p, top), (_, second), ..] => (Some(p.clone()), top - second),
    };

    Outcome {
        winner,
        margin,
        margin_pct: margin_pct(margin, total_valid_votes),
        total_valid_votes,
        total_electors,
        votes_by_party: ranked,
    }
}

/// Outcome of district `d` under `partition`. Unknown districts yield the empty outcome.
pub fn winner_of_district(registry: &UnitRegistry, partition: &Partition, d: DistrictId) -> Outcome {
    match partition.members(d) {
        Some(members) => winner(registry.resolve(members)),
        None => Outcome::default(),
    }
}

/// Outcomes of every district, ascending by district id.
pub fn outcomes_by_district(registry: &UnitRegistry, partition: &Partition) -> BTreeMap<DistrictId, Outcome> {
    partition
        .iter()
        .map(|(d, members)| (d, winner(registry.resolve(members))))
        .collect()
}

/// Number of districts currently won by `party`.
pub fn count_wins(registry: &UnitRegistry, partition: &Partition, party: &PartyId) -> u32 {
    partition
        .iter()
        .filter(|(_, members)| winner(registry.resolve(*members)).is_won_by(party))
        .count() as u32
}
