// crates/rd_pipeline/src/build_result.rs
//
// Output documents. Field names follow the external data shapes (PC/Assembly
// naming); counts inside district objects are emitted as strings and
// percentages as 2-decimal strings. All collections are in ascending id order.

use std::collections::BTreeMap;

use serde::Serialize;

use rd_algo::{
    outcomes_by_district, AdjacencyIndex, CommittedSwap, ScreenNeighbor, ScreenReport, VerificationReport,
};
use rd_core::entities::{AtomicUnit, UnitRegistry};
use rd_core::ids::{DistrictId, PartyId, UnitId};
use rd_core::numeric::Pct2;
use rd_core::partition::Partition;

// ---------------------------------- District objects ----------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateDoc {
    #[serde(rename = "Party")]
    pub party: PartyId,
    #[serde(rename = "Votes")]
    pub votes: u64,
    #[serde(rename = "Vote_Share_Percentage")]
    pub vote_share: Pct2,
    #[serde(rename = "Margin")]
    pub margin: u64,
    #[serde(rename = "Margin_Percentage")]
    pub margin_pct: Pct2,
    #[serde(rename = "Candidate_Position")]
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyDoc {
    #[serde(rename = "Assembly_No")]
    pub assembly_no: UnitId,
    #[serde(rename = "Valid_Votes")]
    pub valid_votes: u64,
    #[serde(rename = "Electors")]
    pub electors: u64,
    #[serde(rename = "Constituency_Type")]
    pub constituency_type: String,
    #[serde(rename = "Winning_Party")]
    pub winning_party: Option<PartyId>,
    #[serde(rename = "Winning_Margin")]
    pub winning_margin: Option<u64>,
    #[serde(rename = "Winning_Margin_Percentage")]
    pub winning_margin_pct: Option<Pct2>,
    #[serde(rename = "Candidates")]
    pub candidates: Vec<CandidateDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistrictDoc {
    #[serde(rename = "PC_Number")]
    pub pc_number: DistrictId,
    #[serde(rename = "Valid_Votes")]
    pub valid_votes: String,
    #[serde(rename = "Electors")]
    pub electors: String,
    #[serde(rename = "Winning_Party")]
    pub winning_party: Option<PartyId>,
    #[serde(rename = "Winning_Margin")]
    pub winning_margin: String,
    #[serde(rename = "Winning_Margin_Percentage")]
    pub winning_margin_pct: String,
    pub swappable_neighbors: Vec<String>,
    #[serde(rename = "Assemblies")]
    pub assemblies: Vec<AssemblyDoc>,
}

fn assembly_doc(u: &AtomicUnit) -> AssemblyDoc {
    AssemblyDoc {
        assembly_no: u.id,
        valid_votes: u.valid_votes,
        electors: u.electors,
        constituency_type: u.reservation.as_str().to_string(),
        winning_party: u.declared_winner.as_ref().map(|w| w.party.clone()),
        winning_margin: u.declared_winner.as_ref().map(|w| w.margin),
        winning_margin_pct: u.declared_winner.as_ref().map(|w| w.margin_pct),
        candidates: u
            .candidates
            .iter()
            .map(|c| CandidateDoc {
                party: c.party.clone(),
                votes: c.votes,
                vote_share: c.vote_share,
                margin: c.margin,
                margin_pct: c.margin_pct,
                position: c.rank,
            })
            .collect(),
    }
}

/// One district object per district of `partition`, aggregates recomputed from members.
/// `frontier` supplies `swappable_neighbors` against the same partition.
pub fn build_district_docs(registry: &UnitRegistry, partition: &Partition, frontier: &AdjacencyIndex) -> Vec<DistrictDoc> {
    let outcomes = outcomes_by_district(registry, partition);
    partition
        .iter()
        .map(|(d, members)| {
            let o = outcomes.get(&d);
            DistrictDoc {
                pc_number: d,
                valid_votes: o.map(|o| o.total_valid_votes).unwrap_or(0).to_string(),
                electors: o.map(|o| o.total_electors).unwrap_or(0).to_string(),
                winning_party: o.and_then(|o| o.winner.clone()),
                winning_margin: o.map(|o| o.margin).unwrap_or(0).to_string(),
                winning_margin_pct: o.map(|o| o.margin_pct).unwrap_or(Pct2::ZERO).to_string(),
                swappable_neighbors: frontier
                    .district_frontier(d, partition)
                    .into_iter()
                    .map(|u| u.to_string())
                    .collect(),
                assemblies: registry.resolve(members).into_iter().map(assembly_doc).collect(),
            }
        })
        .collect()
}

// ---------------------------------- Swap records ----------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRecordDoc {
    #[serde(rename = "fromPC")]
    pub from_pc: DistrictId,
    pub from_assembly: UnitId,
    #[serde(rename = "toPC")]
    pub to_pc: DistrictId,
    pub to_assembly: UnitId,
    pub earlier_won_by_a: Option<PartyId>,
    pub earlier_won_by_b: Option<PartyId>,
    pub now_won_by_a: Option<PartyId>,
    pub now_won_by_b: Option<PartyId>,
    pub score: i64,
}

pub fn build_swap_records(committed: &[CommittedSwap]) -> Vec<SwapRecordDoc> {
    committed
        .iter()
        .map(|s| SwapRecordDoc {
            from_pc: s.proposal.district_a,
            from_assembly: s.proposal.unit_a,
            to_pc: s.proposal.district_b,
            to_assembly: s.proposal.unit_b,
            earlier_won_by_a: s.earlier_winner_a.clone(),
            earlier_won_by_b: s.earlier_winner_b.clone(),
            now_won_by_a: s.now_winner_a.clone(),
            now_won_by_b: s.now_winner_b.clone(),
            score: s.score,
        })
        .collect()
}

// ---------------------------------- Verification ----------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MismatchDoc {
    pub district: DistrictId,
    pub expected: Option<PartyId>,
    pub actual: Option<PartyId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayErrorDoc {
    pub index: usize,
    pub unit_a: UnitId,
    pub unit_b: UnitId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlippedDoc {
    pub district: DistrictId,
    pub before: Option<PartyId>,
    pub after: Option<PartyId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDoc {
    pub total_votes_verified: u64,
    pub total_discrepancies: u32,
    pub winning_votes_verified: u64,
    pub districts_verified: u32,
    pub target_party: PartyId,
    pub target_wins_before: u32,
    pub target_wins_after: u32,
    pub mismatches: Vec<MismatchDoc>,
    pub replay_errors: Vec<ReplayErrorDoc>,
    pub flipped: Vec<FlippedDoc>,
}

pub fn build_verification_doc(report: &VerificationReport, target: &PartyId) -> VerificationDoc {
    VerificationDoc {
        total_votes_verified: report.total_votes_verified,
        total_discrepancies: report.discrepancy_count,
        winning_votes_verified: report.winning_votes_verified,
        districts_verified: report.districts_verified,
        target_party: target.clone(),
        target_wins_before: report.target_wins_before,
        target_wins_after: report.target_wins_after,
        mismatches: report
            .mismatches
            .iter()
            .map(|m| MismatchDoc { district: m.district, expected: m.expected.clone(), actual: m.actual.clone() })
            .collect(),
        replay_errors: report
            .replay_errors
            .iter()
            .map(|e| ReplayErrorDoc { index: e.index, unit_a: e.unit_a, unit_b: e.unit_b, reason: e.reason.clone() })
            .collect(),
        flipped: report
            .flipped
            .iter()
            .map(|f| FlippedDoc { district: f.district, before: f.before.clone(), after: f.after.clone() })
            .collect(),
    }
}

// ---------------------------------- Vulnerability screen ----------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenNeighborDoc {
    #[serde(rename = "Assembly_No")]
    pub assembly_no: UnitId,
    #[serde(rename = "PC_Number")]
    pub pc_number: Option<DistrictId>,
    #[serde(rename = "Winning_Party")]
    pub winning_party: PartyId,
    #[serde(rename = "Win_Margin")]
    pub win_margin: u64,
    #[serde(rename = "Win_Margin_Percentage")]
    pub win_margin_pct: Pct2,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenCandidateDoc {
    #[serde(rename = "Assembly_No")]
    pub assembly_no: UnitId,
    #[serde(rename = "PC_Number")]
    pub pc_number: Option<DistrictId>,
    #[serde(rename = "Winning_Party")]
    pub winning_party: PartyId,
    #[serde(rename = "Win_Margin")]
    pub win_margin: u64,
    #[serde(rename = "Win_Margin_Percentage")]
    pub win_margin_pct: Pct2,
    pub neighbors: Vec<ScreenNeighborDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenDoc {
    pub threshold: Pct2,
    pub flagged: Vec<UnitId>,
    pub candidates: Vec<ScreenCandidateDoc>,
}

fn neighbor_doc(n: &ScreenNeighbor) -> ScreenNeighborDoc {
    ScreenNeighborDoc {
        assembly_no: n.unit,
        pc_number: n.district,
        winning_party: n.winner.clone(),
        win_margin: n.margin,
        win_margin_pct: n.margin_pct,
    }
}

pub fn build_screen_doc(report: &ScreenReport) -> ScreenDoc {
    ScreenDoc {
        threshold: report.threshold,
        flagged: report.flagged.clone(),
        candidates: report
            .candidates
            .iter()
            .map(|c| ScreenCandidateDoc {
                assembly_no: c.unit,
                pc_number: c.district,
                winning_party: c.winner.clone(),
                win_margin: c.margin,
                win_margin_pct: c.margin_pct,
                neighbors: c.neighbors.iter().map(neighbor_doc).collect(),
            })
            .collect(),
    }
}

// ---------------------------------- Maps ----------------------------------

/// Updated unit→district mapping, members ascending.
pub fn build_mapping(partition: &Partition) -> BTreeMap<DistrictId, Vec<UnitId>> {
    partition.to_mapping()
}

/// District → winning party (or null) for `partition`.
pub fn build_winners(registry: &UnitRegistry, partition: &Partition) -> BTreeMap<DistrictId, Option<PartyId>> {
    outcomes_by_district(registry, partition).into_iter().map(|(d, o)| (d, o.winner)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rd_algo::AdjacencyTable;
    use rd_core::entities::Candidate;
    use rd_core::ids::ReservationCategory;
    use rd_core::variables::{Compatibility, NeighborSourceKind};
    use serde_json::json;

    fn unit(id: u32, valid: u64, cands: &[(&str, u64)]) -> AtomicUnit {
        let mut u = AtomicUnit::new(UnitId::new(id), valid, valid * 2, "GEN".parse::<ReservationCategory>().unwrap());
        for (i, (p, v)) in cands.iter().enumerate() {
            u.push_candidate(Candidate {
                party: p.parse().unwrap(),
                votes: *v,
                vote_share: Pct2::ZERO,
                margin: 0,
                margin_pct: Pct2::ZERO,
                rank: i as u32 + 1,
            });
        }
        u
    }

    #[test]
    fn district_doc_shape_matches_scenario() {
        let r: UnitRegistry = [unit(1, 800, &[("BJP", 500), ("INC", 300)]), unit(2, 700, &[("INC", 600), ("BJP", 200)]), unit(3, 150, &[("INC", 100)])]
            .into_iter()
            .collect();
        let mut p = Partition::new();
        p.insert(DistrictId::new(1), UnitId::new(1)).unwrap();
        p.insert(DistrictId::new(1), UnitId::new(2)).unwrap();
        p.insert(DistrictId::new(2), UnitId::new(3)).unwrap();
        let table: AdjacencyTable = [(UnitId::new(2), vec![UnitId::new(1), UnitId::new(3)])].into_iter().collect();
        let idx = AdjacencyIndex::from_kinds(NeighborSourceKind::Adjacency, Compatibility::Any, table);

        let docs = build_district_docs(&r, &p, &idx);
        let v = serde_json::to_value(&docs[0]).unwrap();
        assert_eq!(v["PC_Number"], json!(1));
        assert_eq!(v["Valid_Votes"], json!("1500"));
        assert_eq!(v["Electors"], json!("3000"));
        assert_eq!(v["Winning_Party"], json!("INC"));
        assert_eq!(v["Winning_Margin"], json!("200"));
        assert_eq!(v["Winning_Margin_Percentage"], json!("13.33"));
        assert_eq!(v["swappable_neighbors"], json!(["3"]));
        assert_eq!(v["Assemblies"][0]["Candidates"][0]["Party"], json!("BJP"));
        assert_eq!(v["Assemblies"][0]["Winning_Party"], json!("BJP"));

        let w = build_winners(&r, &p);
        assert_eq!(serde_json::to_value(&w).unwrap(), json!({"1": "INC", "2": "INC"}));
        assert_eq!(serde_json::to_value(build_mapping(&p)).unwrap(), json!({"1": [1, 2], "2": [3]}));
    }
}
