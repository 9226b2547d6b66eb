//! AGGREGATE stage: fold candidate records into atomic units, then place units
//! into districts using the supplied unit→district mapping.
//!
//! Tolerant by policy: a malformed numeric becomes 0 and is counted; a record
//! without a usable unit id or party is dropped; a unit without a district is
//! dropped. Every such event is logged at `warn` and counted in `IngestDiagnostics`.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use rd_core::entities::{AtomicUnit, Candidate, CandidateRecord, UnitRegistry};
use rd_core::ids::{DistrictId, PartyId, ReservationCategory, UnitId};
use rd_core::numeric::{coerce_count, coerce_pct, Coerced, Pct2, RawNumeric};
use rd_core::partition::Partition;
use rd_io::loader::DistrictMap;

/// A unit listed under two districts; the first (lowest district id) wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DuplicateAssignment {
    pub unit: UnitId,
    pub kept: DistrictId,
    pub ignored: DistrictId,
}

/// Everything the aggregator tolerated instead of failing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestDiagnostics {
    pub records_read: usize,
    /// Numeric fields coerced to 0 (missing or malformed).
    pub malformed_numeric: usize,
    pub records_without_unit: usize,
    pub records_without_party: usize,
    pub units_without_district: Vec<UnitId>,
    pub mapped_units_without_records: Vec<UnitId>,
    pub districts_without_records: Vec<DistrictId>,
    /// Left empty because its units with records were already kept by an earlier district.
    pub districts_emptied_by_duplicates: Vec<DistrictId>,
    pub duplicate_assignments: Vec<DuplicateAssignment>,
}

impl IngestDiagnostics {
    pub fn missing_references(&self) -> usize {
        self.units_without_district.len()
            + self.mapped_units_without_records.len()
            + self.districts_without_records.len()
            + self.districts_emptied_by_duplicates.len()
            + self.duplicate_assignments.len()
    }
}

#[derive(Clone, Debug)]
pub struct Aggregated {
    pub registry: UnitRegistry,
    pub partition: Partition,
    pub diagnostics: IngestDiagnostics,
}

// Per-unit fields that come from the first record carrying a valid value.
#[derive(Default)]
struct UnitAcc {
    valid_votes: Option<u64>,
    electors: Option<u64>,
    reservation: Option<ReservationCategory>,
    candidates: Vec<Candidate>,
}

struct Coercer<'d> {
    diag: &'d mut IngestDiagnostics,
}

impl Coercer<'_> {
    /// Required fields: absent counts as malformed.
    fn count(&mut self, field: &'static str, unit: UnitId, raw: &RawNumeric) -> Coerced<u64> {
        let c = coerce_count(raw);
        if c.was_invalid {
            self.report(field, unit, raw);
        }
        c
    }

    /// Optional fields: only a present-but-unusable value is malformed.
    fn pct(&mut self, field: &'static str, unit: UnitId, raw: &RawNumeric) -> Pct2 {
        let c = coerce_pct(raw);
        if c.was_invalid && *raw != RawNumeric::Absent {
            self.report(field, unit, raw);
        }
        c.value
    }

    fn optional_count(&mut self, field: &'static str, unit: UnitId, raw: &RawNumeric) -> u64 {
        let c = coerce_count(raw);
        if c.was_invalid && *raw != RawNumeric::Absent {
            self.report(field, unit, raw);
        }
        c.value
    }

    fn report(&mut self, field: &'static str, unit: UnitId, raw: &RawNumeric) {
        self.diag.malformed_numeric += 1;
        tracing::warn!(field, unit = %unit, raw = ?raw, "malformed numeric coerced to 0");
    }
}

fn unit_id_of(raw: &RawNumeric) -> Option<UnitId> {
    let c = coerce_count(raw);
    if c.was_invalid {
        return None;
    }
    u32::try_from(c.value).ok().map(UnitId::new)
}

/// Group records by unit (first-seen fields, candidates in input order), then
/// assign units to districts in ascending district order.
pub fn aggregate(records: &[CandidateRecord], districts: &DistrictMap) -> Aggregated {
    let mut diag = IngestDiagnostics { records_read: records.len(), ..Default::default() };
    let mut units: BTreeMap<UnitId, UnitAcc> = BTreeMap::new();

    for (index, rec) in records.iter().enumerate() {
        let Some(unit) = unit_id_of(&rec.unit) else {
            tracing::warn!(index, raw = ?rec.unit, "record without a usable Assembly_No; dropped");
            diag.records_without_unit += 1;
            continue;
        };
        let party = rec.party.as_deref().and_then(|p| p.parse::<PartyId>().ok());
        let Some(party) = party else {
            tracing::warn!(index, unit = %unit, "record without a usable Party; dropped");
            diag.records_without_party += 1;
            continue;
        };

        let mut co = Coercer { diag: &mut diag };
        let votes = co.count("Votes", unit, &rec.votes).value;
        let valid = co.count("Valid_Votes", unit, &rec.valid_votes);
        let electors = co.count("Electors", unit, &rec.electors);
        let rank = co.count("Candidate_Position", unit, &rec.position).value;
        let vote_share = co.pct("Vote_Share_Percentage", unit, &rec.vote_share);
        let margin = co.optional_count("Margin", unit, &rec.margin);
        let margin_pct = co.pct("Margin_Percentage", unit, &rec.margin_pct);

        let acc = units.entry(unit).or_default();
        if acc.valid_votes.is_none() && !valid.was_invalid {
            acc.valid_votes = Some(valid.value);
        }
        if acc.electors.is_none() && !electors.was_invalid {
            acc.electors = Some(electors.value);
        }
        if acc.reservation.is_none() {
            if let Some(cat) = rec.category.as_deref().and_then(|c| c.parse::<ReservationCategory>().ok()) {
                if !cat.is_unspecified() {
                    acc.reservation = Some(cat);
                }
            }
        }
        acc.candidates.push(Candidate {
            party,
            votes,
            vote_share,
            margin,
            margin_pct,
            rank: u32::try_from(rank).unwrap_or(0),
        });
    }

    let mut registry = UnitRegistry::new();
    for (id, acc) in units {
        let mut u = AtomicUnit::new(
            id,
            acc.valid_votes.unwrap_or(0),
            acc.electors.unwrap_or(0),
            acc.reservation.unwrap_or_default(),
        );
        for c in acc.candidates {
            u.push_candidate(c);
        }
        registry.insert(u);
    }

    let partition = assign_districts(&mut registry, districts, &mut diag);

    tracing::info!(
        units = registry.len(),
        districts = partition.district_count(),
        malformed_numeric = diag.malformed_numeric,
        missing_references = diag.missing_references(),
        "records aggregated"
    );
    Aggregated { registry, partition, diagnostics: diag }
}

fn assign_districts(registry: &mut UnitRegistry, districts: &DistrictMap, diag: &mut IngestDiagnostics) -> Partition {
    let mut partition = Partition::new();
    let mut seen_missing: BTreeSet<UnitId> = BTreeSet::new();

    for (d, members) in districts {
        let mut placed = 0usize;
        let mut taken = 0usize;
        for u in members {
            if !registry.contains(*u) {
                if seen_missing.insert(*u) {
                    tracing::warn!(unit = %u, district = %d, "mapped unit has no records; skipped");
                    diag.mapped_units_without_records.push(*u);
                }
                continue;
            }
            if let Some(kept) = partition.district_of(*u) {
                if kept != *d {
                    tracing::warn!(unit = %u, kept = %kept, ignored = %d, "unit assigned to two districts; first kept");
                    diag.duplicate_assignments.push(DuplicateAssignment { unit: *u, kept, ignored: *d });
                    taken += 1;
                }
                continue;
            }
            if partition.insert(*d, *u).is_ok() {
                placed += 1;
            }
        }
        if placed > 0 {
            continue;
        }
        if taken > 0 {
            tracing::warn!(district = %d, taken, "every unit already kept by an earlier district; excluded");
            diag.districts_emptied_by_duplicates.push(*d);
        } else {
            tracing::warn!(district = %d, "district has no units with records; excluded");
            diag.districts_without_records.push(*d);
        }
    }

    let orphans: Vec<UnitId> = registry.ids().filter(|u| partition.district_of(*u).is_none()).collect();
    for u in orphans {
        tracing::warn!(unit = %u, "unit has no district; dropped");
        registry.remove(u);
        diag.units_without_district.push(u);
    }
    partition
}
