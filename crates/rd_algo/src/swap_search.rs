// crates/rd_algo/src/swap_search.rs
//
// Greedy, non-backtracking swap search.
//
// Districts are visited once, ascending by id. A district already won by the
// target, or settled by an earlier commit, is skipped. Otherwise its members
// (ascending, not consumed) are paired with each admissible neighbor, the pair
// is simulated without touching the live partition, and the first proposal
// with a positive score is committed. Committing consumes both units and
// settles the partner district; the searched district settles once it is won
// or reaches its per-district cap, or when a full scan finds nothing.
//
// Known limitation: a settled district is never revisited, even if a later
// commit elsewhere would have opened an opportunity.

use std::collections::{BTreeMap, BTreeSet};

use rd_core::entities::UnitRegistry;
use rd_core::errors::CoreError;
use rd_core::ids::{DistrictId, PartyId, UnitId};
use rd_core::partition::Partition;
use rd_core::variables::{Objective, SearchParams};

use crate::adjacency::AdjacencyIndex;
use crate::winner::{count_wins, winner, winner_of_district};

// --------- Proposal / evaluation --------------------------------------------------------------

/// A candidate exchange of one unit each between two districts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapProposal {
    pub unit_a: UnitId,
    pub district_a: DistrictId,
    pub unit_b: UnitId,
    pub district_b: DistrictId,
}

/// Winners of both districts before and after a simulated swap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapEvaluation {
    pub before_a: Option<PartyId>,
    pub before_b: Option<PartyId>,
    pub after_a: Option<PartyId>,
    pub after_b: Option<PartyId>,
}

impl SwapEvaluation {
    fn held(w: &Option<PartyId>, target: &PartyId) -> bool {
        w.as_ref() == Some(target)
    }

    /// Districts that become target-won.
    pub fn gains(&self, target: &PartyId) -> u32 {
        let a = !Self::held(&self.before_a, target) && Self::held(&self.after_a, target);
        let b = !Self::held(&self.before_b, target) && Self::held(&self.after_b, target);
        u32::from(a) + u32::from(b)
    }

    /// Districts that stop being target-won.
    pub fn losses(&self, target: &PartyId) -> u32 {
        let a = Self::held(&self.before_a, target) && !Self::held(&self.after_a, target);
        let b = Self::held(&self.before_b, target) && !Self::held(&self.after_b, target);
        u32::from(a) + u32::from(b)
    }
}

/// An accepted proposal, with both districts' winners before and after.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedSwap {
    pub proposal: SwapProposal,
    pub earlier_winner_a: Option<PartyId>,
    pub earlier_winner_b: Option<PartyId>,
    pub now_winner_a: Option<PartyId>,
    pub now_winner_b: Option<PartyId>,
    pub score: i64,
}

// --------- Strategies -------------------------------------------------------------------------

/// Raw score of an evaluated proposal.
pub trait ObjectiveRule {
    fn score(&self, ev: &SwapEvaluation, target: &PartyId) -> i64;
}

/// Gains minus losses among the two districts.
#[derive(Clone, Copy, Debug, Default)]
pub struct NetFlips;

impl ObjectiveRule for NetFlips {
    fn score(&self, ev: &SwapEvaluation, target: &PartyId) -> i64 {
        i64::from(ev.gains(target)) - i64::from(ev.losses(target))
    }
}

/// Positive only when both districts end up target-won.
#[derive(Clone, Copy, Debug, Default)]
pub struct BothFlip;

impl ObjectiveRule for BothFlip {
    fn score(&self, ev: &SwapEvaluation, target: &PartyId) -> i64 {
        let both = ev.after_a.as_ref() == Some(target) && ev.after_b.as_ref() == Some(target);
        if both { i64::from(ev.gains(target)) } else { 0 }
    }
}

/// Final say on a scored proposal; returns the score to compare against 0.
pub trait AcceptanceRule {
    fn adjust(&self, ev: &SwapEvaluation, target: &PartyId, score: i64) -> i64;
}

/// Any lost district zeroes the score.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLoss;

impl AcceptanceRule for NoLoss {
    fn adjust(&self, ev: &SwapEvaluation, target: &PartyId, score: i64) -> i64 {
        if ev.losses(target) > 0 { 0 } else { score }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AllowLoss;

impl AcceptanceRule for AllowLoss {
    fn adjust(&self, _ev: &SwapEvaluation, _target: &PartyId, score: i64) -> i64 { score }
}

// --------- Limits / outcome -------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_swaps_per_district: u32,
    pub swap_budget: Option<u32>,
    pub max_districts_examined: Option<u32>,
    pub max_evaluations: Option<u64>,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self { max_swaps_per_district: 1, swap_budget: None, max_districts_examined: None, max_evaluations: None }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Every district was visited.
    Exhausted,
    SwapBudget,
    DistrictLimit,
    EvaluationLimit,
}

impl StopReason {
    pub const fn as_token(self) -> &'static str {
        match self {
            StopReason::Exhausted => "exhausted",
            StopReason::SwapBudget => "swap_budget",
            StopReason::DistrictLimit => "district_limit",
            StopReason::EvaluationLimit => "evaluation_limit",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub partition: Partition,
    pub committed: Vec<CommittedSwap>,
    pub target_wins_before: u32,
    pub target_wins_after: u32,
    pub districts_examined: u32,
    pub evaluations: u64,
    pub stop_reason: StopReason,
    pub settled: BTreeSet<DistrictId>,
    pub consumed: BTreeSet<UnitId>,
}

// --------- Engine -----------------------------------------------------------------------------

enum Scan {
    Found(SwapProposal, SwapEvaluation, i64),
    Nothing,
    OutOfEvaluations,
}

/// Mutable per-run state. The live partition is only touched by `commit`.
struct RunState {
    partition: Partition,
    settled: BTreeSet<DistrictId>,
    consumed: BTreeSet<UnitId>,
    committed: Vec<CommittedSwap>,
}

pub struct SwapSearchEngine<'a> {
    registry: &'a UnitRegistry,
    index: &'a AdjacencyIndex,
    target: PartyId,
    objective: Box<dyn ObjectiveRule>,
    acceptance: Box<dyn AcceptanceRule>,
    limits: SearchLimits,
    /// Districts treated as settled from the start: never searched, never a partner.
    excluded: BTreeSet<DistrictId>,
}

impl<'a> SwapSearchEngine<'a> {
    pub fn new(
        registry: &'a UnitRegistry,
        index: &'a AdjacencyIndex,
        target: PartyId,
        objective: Box<dyn ObjectiveRule>,
        acceptance: Box<dyn AcceptanceRule>,
        limits: SearchLimits,
    ) -> Self {
        Self { registry, index, target, objective, acceptance, limits, excluded: BTreeSet::new() }
    }

    /// Engine configured from validated `SearchParams`.
    pub fn from_params(registry: &'a UnitRegistry, index: &'a AdjacencyIndex, params: &SearchParams) -> Self {
        let objective: Box<dyn ObjectiveRule> = match params.objective {
            Objective::NetFlips => Box::new(NetFlips),
            Objective::BothFlip => Box::new(BothFlip),
        };
        let acceptance: Box<dyn AcceptanceRule> =
            if params.no_loss { Box::new(NoLoss) } else { Box::new(AllowLoss) };
        let limits = SearchLimits {
            max_swaps_per_district: params.max_swaps_per_district.max(1),
            swap_budget: params.swap_budget,
            max_districts_examined: params.max_districts_examined,
            max_evaluations: params.max_evaluations,
        };
        Self::new(registry, index, params.target_party.clone(), objective, acceptance, limits)
    }

    pub fn with_excluded(mut self, excluded: BTreeSet<DistrictId>) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn target(&self) -> &PartyId { &self.target }

    /// Run the search over a copy of `base`. `base` itself is never mutated.
    pub fn run(&self, base: &Partition) -> Result<SearchOutcome, CoreError> {
        let target_wins_before = count_wins(self.registry, base, &self.target);
        let mut st = RunState {
            partition: base.clone(),
            settled: self.excluded.clone(),
            consumed: BTreeSet::new(),
            committed: Vec::new(),
        };
        let mut evaluations = 0u64;
        let mut examined = 0u32;
        let mut stop_reason = StopReason::Exhausted;

        let order: Vec<DistrictId> = base.district_ids().collect();
        'districts: for d in order {
            if self.budget_spent(&st) {
                stop_reason = StopReason::SwapBudget;
                break;
            }
            if st.settled.contains(&d) {
                continue;
            }
            if winner_of_district(self.registry, &st.partition, d).is_won_by(&self.target) {
                continue;
            }
            if let Some(cap) = self.limits.max_districts_examined {
                if examined >= cap {
                    stop_reason = StopReason::DistrictLimit;
                    break;
                }
            }
            examined += 1;

            let mut swaps_here = 0u32;
            loop {
                match self.scan_district(d, &st, &mut evaluations)? {
                    Scan::Found(proposal, ev, score) => {
                        let a_won = ev.after_a.as_ref() == Some(&self.target);
                        self.commit(&mut st, proposal, ev, score)?;
                        swaps_here += 1;
                        if a_won || swaps_here >= self.limits.max_swaps_per_district {
                            st.settled.insert(d);
                            break;
                        }
                        if self.budget_spent(&st) {
                            st.settled.insert(d);
                            stop_reason = StopReason::SwapBudget;
                            break 'districts;
                        }
                    }
                    Scan::Nothing => {
                        st.settled.insert(d);
                        break;
                    }
                    Scan::OutOfEvaluations => {
                        stop_reason = StopReason::EvaluationLimit;
                        break 'districts;
                    }
                }
            }
        }

        debug_assert!(st.partition.check_invariant().is_ok());
        let target_wins_after = count_wins(self.registry, &st.partition, &self.target);
        tracing::info!(
            target = %self.target,
            before = target_wins_before,
            after = target_wins_after,
            committed = st.committed.len(),
            examined,
            evaluations,
            stop = stop_reason.as_token(),
            "swap search finished"
        );

        Ok(SearchOutcome {
            partition: st.partition,
            committed: st.committed,
            target_wins_before,
            target_wins_after,
            districts_examined: examined,
            evaluations,
            stop_reason,
            settled: st.settled,
            consumed: st.consumed,
        })
    }

    fn budget_spent(&self, st: &RunState) -> bool {
        matches!(self.limits.swap_budget, Some(b) if st.committed.len() as u64 >= u64::from(b))
    }

    /// One pass over the district's current members. Read-only on the partition.
    fn scan_district(&self, d: DistrictId, st: &RunState, evaluations: &mut u64) -> Result<Scan, CoreError> {
        let Some(members) = st.partition.members(d) else {
            return Ok(Scan::Nothing);
        };
        let before_a = winner(self.registry.resolve(members)).winner;
        let mut before_b_cache: BTreeMap<DistrictId, Option<PartyId>> = BTreeMap::new();

        for &unit_a in members {
            if st.consumed.contains(&unit_a) {
                continue;
            }
            for unit_b in self.index.neighbors(unit_a, &st.partition, self.registry) {
                if st.consumed.contains(&unit_b) {
                    continue;
                }
                let Some(db) = st.partition.district_of(unit_b) else { continue };
                if st.settled.contains(&db) {
                    continue;
                }
                if matches!(self.limits.max_evaluations, Some(cap) if *evaluations >= cap) {
                    return Ok(Scan::OutOfEvaluations);
                }

                let before_b = before_b_cache
                    .entry(db)
                    .or_insert_with(|| winner_of_district(self.registry, &st.partition, db).winner)
                    .clone();
                let sim = st.partition.simulate_swap(unit_a, unit_b)?;
                let ev = SwapEvaluation {
                    before_a: before_a.clone(),
                    before_b,
                    after_a: winner(self.registry.resolve(&sim.members_a)).winner,
                    after_b: winner(self.registry.resolve(&sim.members_b)).winner,
                };
                let raw = self.objective.score(&ev, &self.target);
                let score = self.acceptance.adjust(&ev, &self.target, raw);
                *evaluations += 1;
                tracing::trace!(%unit_a, %unit_b, district_a = %d, district_b = %db, score, "proposal evaluated");

                if score > 0 {
                    let proposal = SwapProposal { unit_a, district_a: d, unit_b, district_b: db };
                    return Ok(Scan::Found(proposal, ev, score));
                }
            }
        }
        Ok(Scan::Nothing)
    }

    fn commit(&self, st: &mut RunState, p: SwapProposal, ev: SwapEvaluation, score: i64) -> Result<(), CoreError> {
        st.partition.swap(p.unit_a, p.unit_b)?;
        st.consumed.insert(p.unit_a);
        st.consumed.insert(p.unit_b);
        st.settled.insert(p.district_b);
        tracing::debug!(
            from_district = %p.district_a,
            from_unit = %p.unit_a,
            to_district = %p.district_b,
            to_unit = %p.unit_b,
            score,
            "swap committed"
        );
        st.committed.push(CommittedSwap {
            proposal: p,
            earlier_winner_a: ev.before_a,
            earlier_winner_b: ev.before_b,
            now_winner_a: ev.after_a,
            now_winner_b: ev.after_b,
            score,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Option<PartyId> { Some(s.parse().unwrap()) }

    fn ev(ba: &str, bb: &str, aa: &str, ab: &str) -> SwapEvaluation {
        SwapEvaluation { before_a: p(ba), before_b: p(bb), after_a: p(aa), after_b: p(ab) }
    }

    #[test]
    fn net_flips_counts_gains_minus_losses() {
        let t: PartyId = "T".parse().unwrap();
        assert_eq!(NetFlips.score(&ev("X", "X", "T", "X"), &t), 1);
        assert_eq!(NetFlips.score(&ev("X", "X", "T", "T"), &t), 2);
        assert_eq!(NetFlips.score(&ev("X", "T", "T", "X"), &t), 0);
    }

    #[test]
    fn both_flip_requires_both_districts() {
        let t: PartyId = "T".parse().unwrap();
        assert_eq!(BothFlip.score(&ev("X", "X", "T", "X"), &t), 0);
        assert_eq!(BothFlip.score(&ev("X", "T", "T", "T"), &t), 1);
        assert_eq!(BothFlip.score(&ev("X", "X", "T", "T"), &t), 2);
    }

    #[test]
    fn no_loss_zeroes_any_lost_district() {
        let t: PartyId = "T".parse().unwrap();
        let e = ev("X", "T", "T", "Y");
        assert_eq!(NoLoss.adjust(&e, &t, 5), 0);
        assert_eq!(AllowLoss.adjust(&e, &t, 5), 5);
    }

    #[test]
    fn no_winner_counts_as_not_held() {
        let t: PartyId = "T".parse().unwrap();
        let e = SwapEvaluation { before_a: None, before_b: None, after_a: p("T"), after_b: None };
        assert_eq!(e.gains(&t), 1);
        assert_eq!(e.losses(&t), 0);
    }
}
