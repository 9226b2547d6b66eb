// crates/rd_pipeline/src/build_run_record.rs
//
// Run record: engine identity, input digests, effective parameters, search
// statistics and output digests. The id is `RUN:` + SHA-256 of the canonical
// bytes of the record body (everything except `id`), so identical inputs and
// parameters give identical ids.

use serde::Serialize;

use rd_algo::SearchOutcome;
use rd_core::variables::SearchParams;
use rd_io::hasher;
use rd_io::loader::{InputDigests, LoadSkips};

use crate::aggregate::IngestDiagnostics;
use crate::validate::{Severity, ValidationReport};
use crate::{EngineMeta, PipelineError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub neighbor_source: &'static str,
    pub districts_examined: u32,
    pub evaluations: u64,
    pub stop_reason: &'static str,
    pub committed_swaps: usize,
    pub target_wins_before: u32,
    pub target_wins_after: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticCounts {
    pub records_read: usize,
    pub loader_skipped: usize,
    pub malformed_numeric: usize,
    pub records_without_unit: usize,
    pub records_without_party: usize,
    pub units_without_district: usize,
    pub mapped_units_without_records: usize,
    pub districts_without_records: usize,
    pub districts_emptied_by_duplicates: usize,
    pub duplicate_assignments: usize,
    pub validation_warnings: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputDigests {
    pub districts_sha256: String,
    pub districts_after_sha256: String,
    pub swaps_sha256: String,
    pub mapping_sha256: String,
    pub winners_sha256: String,
    pub verification_sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationSummary {
    pub total_discrepancies: u32,
    pub replay_errors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecordDoc {
    pub id: String,
    #[serde(flatten)]
    pub body: RunRecordBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecordBody {
    pub engine: EngineMeta,
    pub inputs: InputDigests,
    pub params: SearchParams,
    pub search: SearchStats,
    pub verification: VerificationSummary,
    pub diagnostics: DiagnosticCounts,
    pub outputs: OutputDigests,
}

pub struct RunRecordParts<'a> {
    pub engine: &'a EngineMeta,
    pub inputs: &'a InputDigests,
    pub params: &'a SearchParams,
    pub neighbor_source: &'static str,
    pub outcome: &'a SearchOutcome,
    pub discrepancies: u32,
    pub replay_errors: usize,
    pub skips: &'a LoadSkips,
    pub diagnostics: &'a IngestDiagnostics,
    pub validation: &'a ValidationReport,
    pub outputs: OutputDigests,
}

pub fn build_run_record(parts: RunRecordParts<'_>) -> Result<RunRecordDoc, PipelineError> {
    let d = parts.diagnostics;
    let body = RunRecordBody {
        engine: parts.engine.clone(),
        inputs: parts.inputs.clone(),
        params: parts.params.clone(),
        search: SearchStats {
            neighbor_source: parts.neighbor_source,
            districts_examined: parts.outcome.districts_examined,
            evaluations: parts.outcome.evaluations,
            stop_reason: parts.outcome.stop_reason.as_token(),
            committed_swaps: parts.outcome.committed.len(),
            target_wins_before: parts.outcome.target_wins_before,
            target_wins_after: parts.outcome.target_wins_after,
        },
        verification: VerificationSummary {
            total_discrepancies: parts.discrepancies,
            replay_errors: parts.replay_errors,
        },
        diagnostics: DiagnosticCounts {
            records_read: d.records_read,
            loader_skipped: parts.skips.total(),
            malformed_numeric: d.malformed_numeric,
            records_without_unit: d.records_without_unit,
            records_without_party: d.records_without_party,
            units_without_district: d.units_without_district.len(),
            mapped_units_without_records: d.mapped_units_without_records.len(),
            districts_without_records: d.districts_without_records.len(),
            districts_emptied_by_duplicates: d.districts_emptied_by_duplicates.len(),
            duplicate_assignments: d.duplicate_assignments.len(),
            validation_warnings: parts.validation.count(Severity::Warning),
        },
        outputs: parts.outputs,
    };
    let id = hasher::run_id_from_canonical(&body)?;
    Ok(RunRecordDoc { id, body })
}
