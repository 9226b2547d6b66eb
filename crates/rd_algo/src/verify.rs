// crates/rd_algo/src/verify.rs
//
// Replay verification: apply committed swaps in order to a copy of the base
// partition, recompute every district, and compare against the winners the
// search recorded. Discrepancies are reported, never raised.

use std::collections::BTreeMap;

use rd_core::entities::UnitRegistry;
use rd_core::ids::{DistrictId, PartyId, UnitId};
use rd_core::partition::Partition;

use crate::swap_search::CommittedSwap;
use crate::winner::outcomes_by_district;

/// Recorded post-swap winner disagrees with the recomputed one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistrictMismatch {
    pub district: DistrictId,
    pub expected: Option<PartyId>,
    pub actual: Option<PartyId>,
}

/// A swap that could not be replayed because its units had moved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayError {
    pub index: usize,
    pub unit_a: UnitId,
    pub unit_b: UnitId,
    pub reason: String,
}

/// District whose winner differs between base and replayed partitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlippedDistrict {
    pub district: DistrictId,
    pub before: Option<PartyId>,
    pub after: Option<PartyId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub districts_verified: u32,
    /// All party votes tallied across the replayed partition.
    pub total_votes_verified: u64,
    /// Votes of each district's winner, summed.
    pub winning_votes_verified: u64,
    pub discrepancy_count: u32,
    pub mismatches: Vec<DistrictMismatch>,
    pub replay_errors: Vec<ReplayError>,
    pub flipped: Vec<FlippedDistrict>,
    pub target_wins_before: u32,
    pub target_wins_after: u32,
    /// District -> winner on the replayed partition.
    pub winners: BTreeMap<DistrictId, Option<PartyId>>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancy_count == 0 && self.replay_errors.is_empty()
    }
}

pub struct ConsistencyVerifier<'a> {
    registry: &'a UnitRegistry,
}

impl<'a> ConsistencyVerifier<'a> {
    pub fn new(registry: &'a UnitRegistry) -> Self { Self { registry } }

    /// Replay `committed` over `base`, returning the report and the replayed partition.
    pub fn verify(
        &self,
        base: &Partition,
        committed: &[CommittedSwap],
        target: &PartyId,
    ) -> (VerificationReport, Partition) {
        let mut replay = base.clone();
        let mut report = VerificationReport::default();
        let mut expected: BTreeMap<DistrictId, Option<PartyId>> = BTreeMap::new();

        for (index, swap) in committed.iter().enumerate() {
            let p = swap.proposal;
            let at_a = replay.district_of(p.unit_a);
            let at_b = replay.district_of(p.unit_b);
            if at_a != Some(p.district_a) || at_b != Some(p.district_b) {
                let reason = format!(
                    "recorded {}@{} <-> {}@{}, found {:?} / {:?}",
                    p.unit_a, p.district_a, p.unit_b, p.district_b,
                    at_a.map(|d| d.get()), at_b.map(|d| d.get())
                );
                tracing::warn!(index, %reason, "swap could not be replayed");
                report.replay_errors.push(ReplayError { index, unit_a: p.unit_a, unit_b: p.unit_b, reason });
                continue;
            }
            if let Err(e) = replay.swap(p.unit_a, p.unit_b) {
                report.replay_errors.push(ReplayError {
                    index,
                    unit_a: p.unit_a,
                    unit_b: p.unit_b,
                    reason: e.to_string(),
                });
                continue;
            }
            expected.insert(p.district_a, swap.now_winner_a.clone());
            expected.insert(p.district_b, swap.now_winner_b.clone());
        }

        let base_outcomes = outcomes_by_district(self.registry, base);
        let final_outcomes = outcomes_by_district(self.registry, &replay);

        for (d, o) in &final_outcomes {
            report.districts_verified += 1;
            report.total_votes_verified = report.total_votes_verified.saturating_add(o.total_party_votes());
            report.winning_votes_verified = report.winning_votes_verified.saturating_add(o.winning_votes());
            if o.is_won_by(target) {
                report.target_wins_after += 1;
            }
            if let Some(exp) = expected.get(d) {
                if *exp != o.winner {
                    report.mismatches.push(DistrictMismatch {
                        district: *d,
                        expected: exp.clone(),
                        actual: o.winner.clone(),
                    });
                }
            }
            let before = base_outcomes.get(d).and_then(|b| b.winner.clone());
            if before != o.winner {
                report.flipped.push(FlippedDistrict { district: *d, before, after: o.winner.clone() });
            }
            report.winners.insert(*d, o.winner.clone());
        }
        report.target_wins_before = base_outcomes.values().filter(|o| o.is_won_by(target)).count() as u32;
        report.discrepancy_count = report.mismatches.len() as u32;

        for m in &report.mismatches {
            tracing::warn!(district = %m.district, expected = ?m.expected, actual = ?m.actual, "winner discrepancy after replay");
        }
        tracing::info!(
            districts = report.districts_verified,
            total_votes = report.total_votes_verified,
            discrepancies = report.discrepancy_count,
            replay_errors = report.replay_errors.len(),
            "verification finished"
        );
        (report, replay)
    }
}
