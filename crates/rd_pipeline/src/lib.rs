//! rd_pipeline: deterministic pipeline surface
//! (load → aggregate → validate → search → verify → screen → build).
//! This crate does no direct file I/O: loading goes through `rd_io`, the
//! algorithms live in `rd_algo`, and writing artifacts is the caller's job.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rd_algo::{vulnerability_screen, AdjacencyIndex, AdjacencyTable, ConsistencyVerifier, SwapSearchEngine};
use rd_core::errors::CoreError;
use rd_core::ids::{DistrictId, PartyId, UnitId};
use rd_core::variables::{Compatibility, NeighborSourceKind, Objective, SearchParams};
use rd_io::hasher;
use rd_io::loader::{self, LoadedInputs};
use rd_io::IoError;

pub mod aggregate;
pub mod build_result;
pub mod build_run_record;
pub mod validate;

pub use aggregate::{aggregate, Aggregated, IngestDiagnostics};
pub use build_result::{DistrictDoc, ScreenDoc, SwapRecordDoc, VerificationDoc};
pub use build_run_record::RunRecordDoc;
pub use validate::{Severity, ValidationIssue, ValidationReport};

/// Engine identifiers recorded in the run record and checked against manifest expectations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMeta {
    pub vendor: String,
    pub name: String,
    pub version: String,
    pub build: String,
}

pub fn engine_identifiers() -> EngineMeta {
    EngineMeta {
        vendor: "rd".to_string(),
        name: "rd_engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: "dev".to_string(),
    }
}

/// Single error surface for the pipeline orchestration.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("core: {0}")]
    Core(#[from] CoreError),
    #[error("params: {0}")]
    Params(String),
    #[error("validation failed: {0}")]
    Validate(String),
    #[error("search: {0}")]
    Search(String),
    #[error("build: {0}")]
    Build(String),
}

/// Command-line style overrides applied on top of the parameter file.
#[derive(Debug, Clone, Default)]
pub struct ParamOverrides {
    pub target_party: Option<PartyId>,
    pub objective: Option<Objective>,
    pub no_loss: Option<bool>,
    pub compatibility: Option<Compatibility>,
    pub neighbor_source: Option<NeighborSourceKind>,
    pub max_swaps_per_district: Option<u32>,
    pub swap_budget: Option<u32>,
}

impl ParamOverrides {
    /// Merge over `base`. A target party must come from one side or the other.
    pub fn apply(&self, base: Option<SearchParams>) -> Result<SearchParams, PipelineError> {
        let mut p = match (base, &self.target_party) {
            (Some(mut p), Some(t)) => {
                p.target_party = t.clone();
                p
            }
            (Some(p), None) => p,
            (None, Some(t)) => SearchParams::new(t.clone()),
            (None, None) => return Err(PipelineError::Params("no target party: give a params file or --target-party".into())),
        };
        if let Some(v) = self.objective {
            p.objective = v;
        }
        if let Some(v) = self.no_loss {
            p.no_loss = v;
        }
        if let Some(v) = self.compatibility {
            p.compatibility = v;
        }
        if let Some(v) = self.neighbor_source {
            p.neighbor_source = v;
        }
        if let Some(v) = self.max_swaps_per_district {
            p.max_swaps_per_district = v;
        }
        if let Some(v) = self.swap_budget {
            p.swap_budget = Some(v);
        }
        p.validate()?;
        Ok(p)
    }
}

/// Pipeline context: inputs already loaded by rd_io, parameters already merged.
#[derive(Debug)]
pub struct PipelineCtx {
    pub loaded: LoadedInputs,
    pub params: SearchParams,
    pub engine_meta: EngineMeta,
}

#[derive(Debug)]
pub struct PipelineOutputs {
    /// District objects for the base partition.
    pub districts: Vec<DistrictDoc>,
    /// District objects after committed swaps.
    pub districts_after: Vec<DistrictDoc>,
    pub swaps: Vec<SwapRecordDoc>,
    pub mapping: BTreeMap<DistrictId, Vec<UnitId>>,
    pub winners: BTreeMap<DistrictId, Option<PartyId>>,
    pub verification: VerificationDoc,
    pub screen: Option<ScreenDoc>,
    pub validation: ValidationReport,
    pub diagnostics: IngestDiagnostics,
    pub run_record: RunRecordDoc,
}

impl PipelineOutputs {
    /// Winner mismatches or swaps that could not be replayed.
    pub fn has_discrepancies(&self) -> bool {
        self.verification.total_discrepancies > 0 || !self.verification.replay_errors.is_empty()
    }
}

/// Orchestrate the pipeline with a preloaded context.
pub fn run_with_ctx(ctx: PipelineCtx) -> Result<PipelineOutputs, PipelineError> {
    let PipelineCtx { loaded, params, engine_meta } = ctx;

    // --- AGGREGATE ---
    let Aggregated { registry, partition, diagnostics } = aggregate(&loaded.records, &loaded.districts);
    let table: AdjacencyTable = loaded.adjacency.clone().into_iter().collect();

    // --- VALIDATE ---
    let validation = validate::validate(&validate::ValidateCtx {
        registry: &registry,
        partition: &partition,
        table: &table,
        params: &params,
    });
    if !validation.pass {
        let codes: Vec<&str> = validation
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .map(|i| i.code)
            .collect();
        return Err(PipelineError::Validate(codes.join(", ")));
    }

    // --- SEARCH ---
    let index = AdjacencyIndex::from_kinds(params.neighbor_source, params.compatibility, table.clone());
    let excluded = match params.neighbor_source {
        NeighborSourceKind::Adjacency => validate::districts_without_adjacency(&partition, &table),
        _ => BTreeSet::new(),
    };
    let engine = SwapSearchEngine::from_params(&registry, &index, &params).with_excluded(excluded);
    let outcome = engine.run(&partition).map_err(|e| PipelineError::Search(e.to_string()))?;

    // --- VERIFY ---
    let (report, replayed) = ConsistencyVerifier::new(&registry).verify(&partition, &outcome.committed, &params.target_party);
    if replayed != outcome.partition {
        tracing::warn!("replayed partition differs from the search result");
    }

    // --- SCREEN (optional) ---
    // Frontier and screen always read the supplied table, whatever the search source.
    let geo = AdjacencyIndex::from_kinds(NeighborSourceKind::Adjacency, Compatibility::Any, table);
    let screen = params
        .screen_margin_pct
        .map(|t| build_result::build_screen_doc(&vulnerability_screen(&registry, &partition, &geo, t)));

    // --- BUILD ---
    let districts = build_result::build_district_docs(&registry, &partition, &geo);
    let districts_after = build_result::build_district_docs(&registry, &outcome.partition, &geo);
    let swaps = build_result::build_swap_records(&outcome.committed);
    let mapping = build_result::build_mapping(&outcome.partition);
    let winners = build_result::build_winners(&registry, &outcome.partition);
    let verification = build_result::build_verification_doc(&report, &params.target_party);

    let outputs = build_run_record::OutputDigests {
        districts_sha256: hasher::sha256_canonical(&districts)?,
        districts_after_sha256: hasher::sha256_canonical(&districts_after)?,
        swaps_sha256: hasher::sha256_canonical(&swaps)?,
        mapping_sha256: hasher::sha256_canonical(&mapping)?,
        winners_sha256: hasher::sha256_canonical(&winners)?,
        verification_sha256: hasher::sha256_canonical(&verification)?,
        screen_sha256: screen.as_ref().map(hasher::sha256_canonical).transpose()?,
    };

    let run_record = build_run_record::build_run_record(build_run_record::RunRecordParts {
        engine: &engine_meta,
        inputs: &loaded.digests,
        params: &params,
        neighbor_source: index.source_label(),
        outcome: &outcome,
        discrepancies: report.discrepancy_count,
        replay_errors: report.replay_errors.len(),
        skips: &loaded.skips,
        diagnostics: &diagnostics,
        validation: &validation,
        outputs,
    })?;

    tracing::info!(
        run_id = %run_record.id,
        swaps = swaps.len(),
        before = outcome.target_wins_before,
        after = outcome.target_wins_after,
        discrepancies = report.discrepancy_count,
        "pipeline finished"
    );

    Ok(PipelineOutputs {
        districts,
        districts_after,
        swaps,
        mapping,
        winners,
        verification,
        screen,
        validation,
        diagnostics,
        run_record,
    })
}

/// Load a manifest via rd_io, merge parameters, then run the pipeline.
pub fn run_from_manifest_path<P: AsRef<Path>>(path: P, overrides: &ParamOverrides) -> Result<PipelineOutputs, PipelineError> {
    let engine_meta = engine_identifiers();
    let loaded = loader::load_all_from_manifest(path.as_ref(), &engine_meta.version)?;
    let params = overrides.apply(loaded.params.clone())?;
    run_with_ctx(PipelineCtx { loaded, params, engine_meta })
}

/// Load, merge parameters, aggregate and validate, stopping before the search.
pub fn check_from_manifest_path<P: AsRef<Path>>(path: P, overrides: &ParamOverrides) -> Result<ValidationReport, PipelineError> {
    let engine_meta = engine_identifiers();
    let loaded = loader::load_all_from_manifest(path.as_ref(), &engine_meta.version)?;
    let params = overrides.apply(loaded.params.clone())?;
    let Aggregated { registry, partition, .. } = aggregate(&loaded.records, &loaded.districts);
    let table: AdjacencyTable = loaded.adjacency.into_iter().collect();
    let report = validate::validate(&validate::ValidateCtx {
        registry: &registry,
        partition: &partition,
        table: &table,
        params: &params,
    });
    tracing::info!(
        pass = report.pass,
        errors = report.count(Severity::Error),
        warnings = report.count(Severity::Warning),
        "inputs checked"
    );
    Ok(report)
}
