// crates/rd_algo/tests/properties.rs
//
// Property tests: partition invariant across a run, winner order-independence,
// margin bounds, no-loss guarantee, and replay verification.

use proptest::prelude::*;
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};

use rd_algo::{
    outcomes_by_district, winner, AdjacencyIndex, AdjacencyTable, ConsistencyVerifier, SwapSearchEngine,
};
use rd_core::entities::{AtomicUnit, Candidate, UnitRegistry};
use rd_core::ids::{DistrictId, PartyId, ReservationCategory, UnitId};
use rd_core::numeric::Pct2;
use rd_core::partition::Partition;
use rd_core::variables::{Compatibility, NeighborSourceKind, SearchParams};

const PARTIES: [&str; 3] = ["A", "B", "C"];

#[derive(Clone, Debug)]
struct World {
    registry: UnitRegistry,
    partition: Partition,
    table: AdjacencyTable,
}

fn unit_strategy() -> impl Strategy<Value = (Vec<(usize, u64)>, u64, bool)> {
    (
        prop::collection::vec((0usize..PARTIES.len(), 0u64..500), 0..4),
        0u64..50,
        any::<bool>(),
    )
}

fn world_strategy() -> impl Strategy<Value = World> {
    (2usize..5, 1usize..4).prop_flat_map(|(districts, per)| {
        let n = districts * per;
        (
            prop::collection::vec(unit_strategy(), n),
            prop::collection::vec((0..n, 0..n), 0..(n * 3)),
            Just((districts, per)),
        )
            .prop_map(|(units, edges, (_districts, per))| {
                let mut registry = UnitRegistry::new();
                let mut partition = Partition::new();
                for (i, (cands, extra_valid, sc)) in units.into_iter().enumerate() {
                    let id = UnitId::new(i as u32 + 1);
                    let votes: u64 = cands.iter().map(|(_, v)| *v).sum();
                    let cat = if sc { "SC" } else { "GEN" };
                    let mut u = AtomicUnit::new(id, votes + extra_valid, votes * 2, cat.parse::<ReservationCategory>().unwrap());
                    for (rank, (p, v)) in cands.into_iter().enumerate() {
                        u.push_candidate(Candidate {
                            party: PARTIES[p].parse().unwrap(),
                            votes: v,
                            vote_share: Pct2::ZERO,
                            margin: 0,
                            margin_pct: Pct2::ZERO,
                            rank: rank as u32 + 1,
                        });
                    }
                    registry.insert(u);
                    partition.insert(DistrictId::new((i / per) as u32 + 1), id).unwrap();
                }
                let mut table = AdjacencyTable::new();
                for (a, b) in edges {
                    table.insert(UnitId::new(a as u32 + 1), UnitId::new(b as u32 + 1));
                }
                World { registry, partition, table }
            })
    })
}

fn shuffled<'a>(units: &[&'a AtomicUnit], seed: u64) -> Vec<&'a AtomicUnit> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut v = units.to_vec();
    for i in (1..v.len()).rev() {
        let j = (rng.next_u64() % (i as u64 + 1)) as usize;
        v.swap(i, j);
    }
    v
}

proptest! {
    #[test]
    fn winner_is_order_independent(w in world_strategy(), seed in any::<u64>()) {
        let units: Vec<&AtomicUnit> = w.registry.iter().collect();
        let a = winner(units.iter().copied());
        let b = winner(shuffled(&units, seed));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn margins_stay_in_bounds(w in world_strategy()) {
        for (_, o) in outcomes_by_district(&w.registry, &w.partition) {
            prop_assert!(o.margin <= o.winning_votes());
            prop_assert!(o.margin_pct <= Pct2::HUNDRED);
            if o.winner.is_none() {
                prop_assert_eq!(o.margin, 0);
            }
        }
    }

    #[test]
    fn run_keeps_partition_and_held_districts(
        w in world_strategy(),
        target in 0usize..PARTIES.len(),
        any_cat in any::<bool>(),
        all_units in any::<bool>(),
    ) {
        let target: PartyId = PARTIES[target].parse().unwrap();
        let compat = if any_cat { Compatibility::Any } else { Compatibility::ReservationMatch };
        let kind = if all_units { NeighborSourceKind::AllUnits } else { NeighborSourceKind::Adjacency };
        let idx = AdjacencyIndex::from_kinds(kind, compat, w.table.clone());
        let params = SearchParams::new(target.clone());
        let out = SwapSearchEngine::from_params(&w.registry, &idx, &params).run(&w.partition).unwrap();

        prop_assert!(out.partition.check_invariant().is_ok());
        prop_assert!(out.partition.covers(w.registry.ids()));
        prop_assert!(out.target_wins_after >= out.target_wins_before);

        let before = outcomes_by_district(&w.registry, &w.partition);
        let after = outcomes_by_district(&w.registry, &out.partition);
        for (d, o) in &before {
            if o.is_won_by(&target) {
                prop_assert!(after[d].is_won_by(&target), "district {} lost", d);
            }
        }

        // each unit moves at most once
        prop_assert_eq!(out.consumed.len(), out.committed.len() * 2);

        let (rep, replayed) = ConsistencyVerifier::new(&w.registry).verify(&w.partition, &out.committed, &target);
        prop_assert!(rep.is_clean());
        prop_assert_eq!(replayed, out.partition);
    }

    #[test]
    fn replaying_nothing_reproduces_base(w in world_strategy()) {
        let target: PartyId = "A".parse().unwrap();
        let (rep, replayed) = ConsistencyVerifier::new(&w.registry).verify(&w.partition, &[], &target);
        prop_assert_eq!(&replayed, &w.partition);
        prop_assert!(rep.is_clean());
        prop_assert!(rep.flipped.is_empty());
        let base = outcomes_by_district(&w.registry, &w.partition);
        for (d, o) in base {
            prop_assert_eq!(rep.winners.get(&d).cloned().flatten(), o.winner);
        }
    }
}
