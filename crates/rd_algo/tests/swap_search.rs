// crates/rd_algo/tests/swap_search.rs
//
// Scenario tests for the swap search engine and its replay verifier.

use std::collections::BTreeMap;

use rd_algo::{
    AdjacencyIndex, AdjacencyTable, ConsistencyVerifier, StopReason, SwapSearchEngine,
};
use rd_core::entities::{AtomicUnit, Candidate, UnitRegistry};
use rd_core::ids::{DistrictId, PartyId, ReservationCategory, UnitId};
use rd_core::numeric::Pct2;
use rd_core::partition::Partition;
use rd_core::variables::{Compatibility, NeighborSourceKind, Objective, SearchParams};

fn unit(id: u32, cat: &str, votes: &[(&str, u64)]) -> AtomicUnit {
    let valid: u64 = votes.iter().map(|(_, v)| *v).sum();
    let mut u = AtomicUnit::new(UnitId::new(id), valid, valid + valid / 2, cat.parse::<ReservationCategory>().unwrap());
    for (i, (p, v)) in votes.iter().enumerate() {
        u.push_candidate(Candidate {
            party: p.parse().unwrap(),
            votes: *v,
            vote_share: Pct2::from_ratio(*v, valid),
            margin: 0,
            margin_pct: Pct2::ZERO,
            rank: i as u32 + 1,
        });
    }
    u
}

fn partition(assign: &[(u32, u32)]) -> Partition {
    let mut p = Partition::new();
    for (d, u) in assign {
        p.insert(DistrictId::new(*d), UnitId::new(*u)).unwrap();
    }
    p
}

fn table(edges: &[(u32, &[u32])]) -> AdjacencyTable {
    edges
        .iter()
        .map(|(u, ns)| (UnitId::new(*u), ns.iter().copied().map(UnitId::new).collect()))
        .collect()
}

fn params(target: &str) -> SearchParams {
    SearchParams::new(target.parse().unwrap())
}

/// Independent tally used to check engine arithmetic.
fn hand_winner(reg: &UnitRegistry, ids: &[u32]) -> Option<String> {
    let mut totals: BTreeMap<String, u64> = BTreeMap::new();
    for id in ids {
        for c in &reg.get(UnitId::new(*id)).unwrap().candidates {
            *totals.entry(c.party.to_string()).or_default() += c.votes;
        }
    }
    totals.into_iter().max_by_key(|(_, v)| *v).map(|(p, _)| p)
}

// District 1 = {1: BJP 500 / INC 300, 2: BJP 200 / INC 600} -> INC
// District 2 = {3: INC 100 / BJP 50, 4: BJP 1000 / INC 100} -> BJP
fn two_district_fixture() -> (UnitRegistry, Partition, AdjacencyTable) {
    let reg: UnitRegistry = [
        unit(1, "GEN", &[("BJP", 500), ("INC", 300)]),
        unit(2, "GEN", &[("BJP", 200), ("INC", 600)]),
        unit(3, "GEN", &[("INC", 100), ("BJP", 50)]),
        unit(4, "GEN", &[("BJP", 1000), ("INC", 100)]),
    ]
    .into_iter()
    .collect();
    let part = partition(&[(1, 1), (1, 2), (2, 3), (2, 4)]);
    let adj = table(&[(1, &[3]), (2, &[3]), (3, &[1, 2])]);
    (reg, part, adj)
}

#[test]
fn flips_district_and_matches_independent_tally() {
    let (reg, base, adj) = two_district_fixture();
    let idx = AdjacencyIndex::from_kinds(NeighborSourceKind::Adjacency, Compatibility::ReservationMatch, adj);
    let p = params("BJP");
    let out = SwapSearchEngine::from_params(&reg, &idx, &p).run(&base).unwrap();

    assert_eq!(out.committed.len(), 1);
    let s = &out.committed[0];
    assert_eq!((s.proposal.unit_a.get(), s.proposal.district_a.get()), (2, 1));
    assert_eq!((s.proposal.unit_b.get(), s.proposal.district_b.get()), (3, 2));

    let d1: Vec<u32> = out.partition.members(DistrictId::new(1)).unwrap().iter().map(|u| u.get()).collect();
    let d2: Vec<u32> = out.partition.members(DistrictId::new(2)).unwrap().iter().map(|u| u.get()).collect();
    assert_eq!(d1, vec![1, 3]);
    assert_eq!(d2, vec![2, 4]);
    assert_eq!(s.now_winner_a.as_ref().map(PartyId::to_string), hand_winner(&reg, &d1));
    assert_eq!(s.now_winner_b.as_ref().map(PartyId::to_string), hand_winner(&reg, &d2));
    assert_eq!(s.earlier_winner_a.as_ref().map(PartyId::as_str), Some("INC"));

    assert_eq!(out.target_wins_before, 1);
    assert_eq!(out.target_wins_after, 2);
    assert_eq!(out.stop_reason, StopReason::Exhausted);
    assert!(out.partition.check_invariant().is_ok());
    // base is untouched
    assert_eq!(base.district_of(UnitId::new(2)), Some(DistrictId::new(1)));

    let (rep, replayed) = ConsistencyVerifier::new(&reg).verify(&base, &out.committed, &p.target_party);
    assert!(rep.is_clean());
    assert_eq!(replayed, out.partition);
    assert_eq!(rep.flipped.len(), 1);
}

#[test]
fn reservation_mismatch_blocks_the_swap() {
    let (mut reg, base, adj) = two_district_fixture();
    reg.insert(unit(3, "SC", &[("INC", 100), ("BJP", 50)]));
    let strict = AdjacencyIndex::from_kinds(NeighborSourceKind::Adjacency, Compatibility::ReservationMatch, adj.clone());
    let out = SwapSearchEngine::from_params(&reg, &strict, &params("BJP")).run(&base).unwrap();
    assert!(out.committed.is_empty());
    assert_eq!(out.target_wins_after, out.target_wins_before);

    let loose = AdjacencyIndex::from_kinds(NeighborSourceKind::Adjacency, Compatibility::Any, adj);
    let out = SwapSearchEngine::from_params(&reg, &loose, &params("BJP")).run(&base).unwrap();
    assert_eq!(out.committed.len(), 1);
}

#[test]
fn never_trades_away_an_existing_win() {
    // Moving unit 2 into district 1 flips it, but district 2 (held) would fall.
    let reg: UnitRegistry = [
        unit(1, "GEN", &[("T", 40), ("X", 100)]),
        unit(2, "GEN", &[("T", 300), ("X", 10)]),
        unit(3, "GEN", &[("T", 100), ("X", 90)]),
    ]
    .into_iter()
    .collect();
    let base = partition(&[(1, 1), (2, 2), (2, 3)]);
    let idx = AdjacencyIndex::from_kinds(NeighborSourceKind::AllUnits, Compatibility::Any, AdjacencyTable::new());
    let out = SwapSearchEngine::from_params(&reg, &idx, &params("T")).run(&base).unwrap();
    // 1<->2: d1 = T 300 (gain), d2 = {1,3}: T 140 vs X 190 (loss) -> rejected
    // 1<->3: d1 = T 100 vs X 90 (gain), d2 = {1,2}: T 340 vs X 110 (kept) -> accepted
    assert_eq!(out.committed.len(), 1);
    assert_eq!(out.committed[0].proposal.unit_b, UnitId::new(3));
    assert_eq!(out.target_wins_after, 2);
}

#[test]
fn both_flip_is_stricter_than_net_flips() {
    let reg: UnitRegistry = [
        unit(1, "GEN", &[("X", 100), ("T", 90)]),
        unit(2, "GEN", &[("X", 100)]),
        unit(3, "GEN", &[("T", 200)]),
        unit(4, "GEN", &[("X", 300)]),
    ]
    .into_iter()
    .collect();
    let base = partition(&[(1, 1), (1, 2), (2, 3), (2, 4)]);
    let adj = table(&[(2, &[3])]);

    let mut p = params("T");
    let idx = AdjacencyIndex::from_kinds(NeighborSourceKind::Adjacency, Compatibility::Any, adj.clone());
    let net = SwapSearchEngine::from_params(&reg, &idx, &p).run(&base).unwrap();
    assert_eq!(net.committed.len(), 1);

    p.objective = Objective::BothFlip;
    let strict = SwapSearchEngine::from_params(&reg, &idx, &p).run(&base).unwrap();
    assert!(strict.committed.is_empty());
}

#[test]
fn budget_and_evaluation_caps_stop_the_run() {
    let (reg, base, adj) = two_district_fixture();
    let idx = AdjacencyIndex::from_kinds(NeighborSourceKind::Adjacency, Compatibility::Any, adj);

    let mut p = params("BJP");
    p.swap_budget = Some(0);
    let out = SwapSearchEngine::from_params(&reg, &idx, &p).run(&base).unwrap();
    assert!(out.committed.is_empty());
    assert_eq!(out.stop_reason, StopReason::SwapBudget);

    let mut p = params("BJP");
    p.max_evaluations = Some(1);
    let out = SwapSearchEngine::from_params(&reg, &idx, &p).run(&base).unwrap();
    assert!(out.committed.is_empty());
    assert_eq!(out.evaluations, 1);
    assert_eq!(out.stop_reason, StopReason::EvaluationLimit);

    let mut p = params("BJP");
    p.max_districts_examined = Some(0);
    let out = SwapSearchEngine::from_params(&reg, &idx, &p).run(&base).unwrap();
    assert_eq!(out.districts_examined, 0);
    assert_eq!(out.stop_reason, StopReason::DistrictLimit);
}

#[test]
fn consumed_units_and_settled_districts_are_not_reused() {
    // Three districts, all X-won; unit 3 is the only T stronghold and could help both 1 and 2.
    let reg: UnitRegistry = [
        unit(1, "GEN", &[("X", 60), ("T", 50)]),
        unit(2, "GEN", &[("X", 60), ("T", 50)]),
        unit(3, "GEN", &[("T", 500)]),
        unit(4, "GEN", &[("X", 900)]),
    ]
    .into_iter()
    .collect();
    let base = partition(&[(1, 1), (2, 2), (3, 3), (3, 4)]);
    let adj = table(&[(1, &[3]), (2, &[3])]);
    let idx = AdjacencyIndex::from_kinds(NeighborSourceKind::Adjacency, Compatibility::Any, adj);
    let out = SwapSearchEngine::from_params(&reg, &idx, &params("T")).run(&base).unwrap();
    assert_eq!(out.committed.len(), 1);
    assert_eq!(out.committed[0].proposal.district_a, DistrictId::new(1));
    assert!(out.consumed.contains(&UnitId::new(3)));
    assert!(out.settled.contains(&DistrictId::new(3)));
    assert!(out.settled.contains(&DistrictId::new(2)));
}

#[test]
fn excluded_districts_are_neither_searched_nor_partners() {
    let reg: UnitRegistry = [
        unit(1, "GEN", &[("X", 60), ("T", 50)]),
        unit(2, "GEN", &[("X", 60), ("T", 50)]),
        unit(3, "GEN", &[("T", 500)]),
        unit(4, "GEN", &[("X", 900)]),
    ]
    .into_iter()
    .collect();
    let base = partition(&[(1, 1), (2, 2), (3, 3), (3, 4)]);
    let adj = table(&[(1, &[3]), (2, &[3]), (3, &[1, 2])]);
    let idx = AdjacencyIndex::from_kinds(NeighborSourceKind::Adjacency, Compatibility::Any, adj);
    let out = SwapSearchEngine::from_params(&reg, &idx, &params("T"))
        .with_excluded([DistrictId::new(3)].into_iter().collect())
        .run(&base)
        .unwrap();
    assert!(out.committed.is_empty());
    assert_eq!(out.partition, base);
    assert!(out.settled.contains(&DistrictId::new(3)));
}

#[test]
fn multiple_swaps_per_district_keep_searching_until_won() {
    // First commit flips district 2 but leaves district 1 with X; a second one flips district 1.
    let reg: UnitRegistry = [
        unit(1, "GEN", &[("T", 100)]),
        unit(2, "GEN", &[("X", 300)]),
        unit(3, "GEN", &[("X", 60)]),
        unit(4, "GEN", &[("T", 50)]),
        unit(5, "GEN", &[("T", 400)]),
        unit(6, "GEN", &[("X", 500)]),
    ]
    .into_iter()
    .collect();
    let base = partition(&[(1, 1), (1, 2), (2, 3), (2, 4), (3, 5), (3, 6)]);
    let idx = AdjacencyIndex::from_kinds(NeighborSourceKind::AllUnits, Compatibility::Any, AdjacencyTable::new());

    let single = SwapSearchEngine::from_params(&reg, &idx, &params("T")).run(&base).unwrap();
    assert_eq!(single.committed.len(), 1);
    assert_eq!(single.target_wins_after, 1);

    let mut p = params("T");
    p.max_swaps_per_district = 2;
    let double = SwapSearchEngine::from_params(&reg, &idx, &p).run(&base).unwrap();
    assert_eq!(double.committed.len(), 2);
    assert!(double.committed.iter().all(|c| c.proposal.district_a == DistrictId::new(1)));
    assert_eq!(double.committed[1].proposal.unit_b, UnitId::new(5));
    assert_eq!(double.target_wins_before, 0);
    assert_eq!(double.target_wins_after, 2);

    let (rep, _) = ConsistencyVerifier::new(&reg).verify(&base, &double.committed, &p.target_party);
    assert!(rep.is_clean());
}
