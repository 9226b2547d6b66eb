//! crates/rd_pipeline/src/validate.rs
//! Structural & semantic validation between aggregation and search.
//! Deterministic outputs; integer reasoning only.
//!
//! Record-level problems are warnings (the run continues); only conditions that
//! make a search meaningless are errors.

use std::collections::BTreeSet;

use serde::Serialize;

use rd_algo::{winner, AdjacencyTable};
use rd_core::entities::UnitRegistry;
use rd_core::ids::{DistrictId, UnitId};
use rd_core::partition::Partition;
use rd_core::variables::{NeighborSourceKind, SearchParams};

pub struct ValidateCtx<'a> {
    pub registry: &'a UnitRegistry,
    pub partition: &'a Partition,
    pub table: &'a AdjacencyTable,
    pub params: &'a SearchParams,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Where the issue occurred.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Root,
    Unit(UnitId),
    District(DistrictId),
    Param(&'static str),
    Adjacency(UnitId, UnitId),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    #[serde(rename = "where")]
    pub where_: EntityRef,
}

/// pass = no Error; issues in stable order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub pass: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn count(&self, sev: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == sev).count()
    }
}

pub fn validate(ctx: &ValidateCtx) -> ValidationReport {
    let mut issues = Vec::new();

    issues.extend(check_partition(ctx.registry, ctx.partition));
    issues.extend(check_declared_winners(ctx.registry));
    if ctx.params.neighbor_source == NeighborSourceKind::Adjacency {
        issues.extend(check_adjacency(ctx.registry, ctx.partition, ctx.table));
    }
    issues.extend(check_target_present(ctx.registry, ctx.params));

    sort_issues_stably(&mut issues);
    let report = ValidationReport { pass: !issues.iter().any(|i| i.severity == Severity::Error), issues };
    tracing::info!(
        pass = report.pass,
        errors = report.count(Severity::Error),
        warnings = report.count(Severity::Warning),
        "validation finished"
    );
    report
}

// ------------------------------------------------------------------------------------------------
// Checks
// ------------------------------------------------------------------------------------------------

fn check_partition(registry: &UnitRegistry, partition: &Partition) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if partition.district_count() == 0 {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            code: "Partition.Empty",
            message: "no district has any unit with records".into(),
            where_: EntityRef::Root,
        });
    }
    if let Err(e) = partition.check_invariant() {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            code: "Partition.Invariant",
            message: e.to_string(),
            where_: EntityRef::Root,
        });
    }
    if !partition.covers(registry.ids()) {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            code: "Partition.Cover",
            message: "partition does not cover every unit".into(),
            where_: EntityRef::Root,
        });
    }
    issues
}

/// Rank-1 count must be exactly one, and the declared winner must match the recount.
fn check_declared_winners(registry: &UnitRegistry) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for u in registry.iter() {
        let n = u.rank_one_count();
        if n != 1 {
            issues.push(ValidationIssue {
                severity: Severity::Warning,
                code: "Unit.RankOneCount",
                message: format!("{n} candidates at position 1"),
                where_: EntityRef::Unit(u.id),
            });
        }
        let recount = winner([u]).winner;
        let declared = u.declared_winner.as_ref().map(|w| w.party.clone());
        if declared.is_some() && recount != declared {
            issues.push(ValidationIssue {
                severity: Severity::Warning,
                code: "Unit.DeclaredWinnerMismatch",
                message: format!(
                    "declared {} but votes give {}",
                    declared.as_ref().map(|p| p.as_str()).unwrap_or("-"),
                    recount.as_ref().map(|p| p.as_str()).unwrap_or("-")
                ),
                where_: EntityRef::Unit(u.id),
            });
        }
    }
    issues
}

/// Districts none of whose members appear in the adjacency table.
pub fn districts_without_adjacency(partition: &Partition, table: &AdjacencyTable) -> BTreeSet<DistrictId> {
    partition
        .iter()
        .filter(|(_, members)| members.iter().all(|u| !table.has_entry(*u)))
        .map(|(d, _)| d)
        .collect()
}

fn check_adjacency(registry: &UnitRegistry, partition: &Partition, table: &AdjacencyTable) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for d in districts_without_adjacency(partition, table) {
        tracing::warn!(district = %d, "district has no adjacency entry; excluded from search");
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            code: "District.NoAdjacency",
            message: "no member unit has an adjacency entry".into(),
            where_: EntityRef::District(d),
        });
    }

    for u in table.missing_entries(registry.ids()) {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            code: "Unit.NoAdjacency",
            message: "unit has no adjacency entry".into(),
            where_: EntityRef::Unit(u),
        });
    }

    let asym = table.asymmetric_pairs();
    if let Some((a, b)) = asym.first() {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            code: "Adjacency.Asymmetric",
            message: format!("{} directed pairs have no reverse entry", asym.len()),
            where_: EntityRef::Adjacency(*a, *b),
        });
    }
    issues
}

fn check_target_present(registry: &UnitRegistry, params: &SearchParams) -> Vec<ValidationIssue> {
    let present = registry
        .iter()
        .any(|u| u.candidates.iter().any(|c| c.party == params.target_party));
    if present {
        return Vec::new();
    }
    vec![ValidationIssue {
        severity: Severity::Warning,
        code: "Params.TargetAbsent",
        message: format!("target party {} has no votes in any unit", params.target_party),
        where_: EntityRef::Param("target_party"),
    }]
}

fn sort_issues_stably(issues: &mut [ValidationIssue]) {
    issues.sort_by(|a, b| {
        (a.severity, a.code, &a.where_, &a.message).cmp(&(b.severity, b.code, &b.where_, &b.message))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rd_core::entities::{AtomicUnit, Candidate};
    use rd_core::ids::ReservationCategory;
    use rd_core::numeric::Pct2;

    fn unit(id: u32, cands: &[(&str, u64, u32)]) -> AtomicUnit {
        let mut u = AtomicUnit::new(UnitId::new(id), 100, 100, ReservationCategory::default());
        for (p, v, r) in cands {
            u.push_candidate(Candidate {
                party: p.parse().unwrap(),
                votes: *v,
                vote_share: Pct2::ZERO,
                margin: 0,
                margin_pct: Pct2::ZERO,
                rank: *r,
            });
        }
        u
    }

    #[test]
    fn warnings_do_not_fail_and_are_sorted() {
        let r: UnitRegistry = [unit(1, &[("A", 10, 1), ("B", 20, 2)]), unit(2, &[("B", 5, 2)])].into_iter().collect();
        let mut p = Partition::new();
        p.insert(DistrictId::new(1), UnitId::new(1)).unwrap();
        p.insert(DistrictId::new(2), UnitId::new(2)).unwrap();
        let table: AdjacencyTable = [(UnitId::new(1), vec![UnitId::new(2)])].into_iter().collect();
        let params = SearchParams::new("C".parse().unwrap());

        let rep = validate(&ValidateCtx { registry: &r, partition: &p, table: &table, params: &params });
        assert!(rep.pass);
        let codes: Vec<&str> = rep.issues.iter().map(|i| i.code).collect();
        assert_eq!(
            codes,
            vec![
                "Adjacency.Asymmetric",
                "District.NoAdjacency",
                "Params.TargetAbsent",
                "Unit.DeclaredWinnerMismatch",
                "Unit.NoAdjacency",
                "Unit.RankOneCount",
            ]
        );
    }

    #[test]
    fn empty_partition_is_an_error() {
        let r = UnitRegistry::new();
        let p = Partition::new();
        let table = AdjacencyTable::new();
        let params = SearchParams::new("A".parse().unwrap());
        let rep = validate(&ValidateCtx { registry: &r, partition: &p, table: &table, params: &params });
        assert!(!rep.pass);
        assert_eq!(rep.issues[0].code, "Partition.Empty");
    }
}
