// crates/rd_algo/src/screen.rs
//
// Vulnerability screen over declared (rank-1) unit results.
// A unit is flagged when its declared margin is at or below the threshold and
// some adjacent unit was won by a different party. Flagged units become
// candidates when at least one such neighbor also has a wider margin and sits
// in a different district.

use rd_core::entities::UnitRegistry;
use rd_core::ids::{DistrictId, PartyId, UnitId};
use rd_core::numeric::Pct2;
use rd_core::partition::Partition;

use crate::adjacency::AdjacencyIndex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScreenNeighbor {
    pub unit: UnitId,
    pub district: Option<DistrictId>,
    pub winner: PartyId,
    pub margin: u64,
    pub margin_pct: Pct2,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VulnerableUnit {
    pub unit: UnitId,
    pub district: Option<DistrictId>,
    pub winner: PartyId,
    pub margin: u64,
    pub margin_pct: Pct2,
    pub neighbors: Vec<ScreenNeighbor>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScreenReport {
    pub threshold: Pct2,
    /// Units passing the first filter (narrow margin, differently-won neighbor).
    pub flagged: Vec<UnitId>,
    pub candidates: Vec<VulnerableUnit>,
}

pub fn vulnerability_screen(
    registry: &UnitRegistry,
    partition: &Partition,
    index: &AdjacencyIndex,
    threshold: Pct2,
) -> ScreenReport {
    let mut flagged = Vec::new();
    let mut candidates = Vec::new();

    for unit in registry.iter() {
        let Some(w) = unit.declared_winner.as_ref() else { continue };
        if w.margin_pct > threshold {
            continue;
        }
        let rivals: Vec<ScreenNeighbor> = index
            .raw_neighbors(unit.id, partition)
            .into_iter()
            .filter_map(|n| {
                let nw = registry.get(n)?.declared_winner.as_ref()?;
                (nw.party != w.party).then(|| ScreenNeighbor {
                    unit: n,
                    district: partition.district_of(n),
                    winner: nw.party.clone(),
                    margin: nw.margin,
                    margin_pct: nw.margin_pct,
                })
            })
            .collect();
        if rivals.is_empty() {
            continue;
        }
        flagged.push(unit.id);

        let home = partition.district_of(unit.id);
        let neighbors: Vec<ScreenNeighbor> = rivals
            .into_iter()
            .filter(|n| n.margin_pct > w.margin_pct && n.district != home)
            .collect();
        if !neighbors.is_empty() {
            candidates.push(VulnerableUnit {
                unit: unit.id,
                district: home,
                winner: w.party.clone(),
                margin: w.margin,
                margin_pct: w.margin_pct,
                neighbors,
            });
        }
    }

    tracing::info!(threshold = %threshold, flagged = flagged.len(), candidates = candidates.len(), "vulnerability screen finished");
    ScreenReport { threshold, flagged, candidates }
}
