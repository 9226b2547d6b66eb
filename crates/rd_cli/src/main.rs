// crates/rd_cli/src/main.rs
//
// `rd` binary: parse flags, install logging, run the pipeline from a manifest,
// write canonical artifacts and optional reports, map failures to exit codes.

mod args;

mod exitcodes {
    pub const OK: u8 = 0;
    pub const VALIDATION: u8 = 2;
    pub const DISCREPANCY: u8 = 3;
    pub const IO: u8 = 4;
}

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use args::{parse_and_validate, Args, LogFormat};
use rd_io::canonical_json::write_canonical_file;
use rd_io::IoError;
use rd_pipeline::{PipelineError, PipelineOutputs};
use rd_report::{build_model, render, ReportError, ReportFormat, ReportInputs};

/// Failure buckets; each maps to one exit code.
#[derive(Debug)]
enum MainError {
    /// Manifest, JSON shape, digest expectations, parameters, fatal validation.
    Validation(String),
    /// Filesystem and anything the run could not complete.
    Io(String),
    Render(String),
}

impl std::fmt::Display for MainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MainError::Validation(m) => write!(f, "validation: {m}"),
            MainError::Io(m) => write!(f, "io: {m}"),
            MainError::Render(m) => write!(f, "render: {m}"),
        }
    }
}

fn main() -> ExitCode {
    let args = match parse_and_validate() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("rd: error: {e}");
            return ExitCode::from(exitcodes::VALIDATION);
        }
    };
    init_tracing(&args);

    let result = if args.validate_only { validate_only(&args) } else { run_once(&args) };
    let rc = match result {
        Ok(rc) => rc,
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            eprintln!("rd: error: {e}");
            map_error(&e)
        }
    };
    ExitCode::from(rc)
}

fn init_tracing(args: &Args) {
    let default = if args.quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);
    match args.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).flatten_event(true).with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
    }
}

fn map_error(e: &MainError) -> u8 {
    match e {
        MainError::Validation(_) => exitcodes::VALIDATION,
        MainError::Io(_) | MainError::Render(_) => exitcodes::IO,
    }
}

fn map_io_err(e: IoError) -> MainError {
    match e {
        IoError::Path(m) => MainError::Io(m),
        other => MainError::Validation(other.to_string()),
    }
}

fn map_pipeline_err(e: PipelineError) -> MainError {
    match e {
        PipelineError::Io(inner) => map_io_err(inner),
        PipelineError::Params(m) | PipelineError::Validate(m) => MainError::Validation(m),
        PipelineError::Core(c) => MainError::Validation(c.to_string()),
        PipelineError::Search(m) | PipelineError::Build(m) => MainError::Io(m),
    }
}

fn validate_only(args: &Args) -> Result<u8, MainError> {
    let report = rd_pipeline::check_from_manifest_path(&args.manifest, &args.overrides()).map_err(map_pipeline_err)?;
    for issue in &report.issues {
        match issue.severity {
            rd_pipeline::Severity::Error => tracing::error!(code = issue.code, "{}", issue.message),
            rd_pipeline::Severity::Warning => tracing::warn!(code = issue.code, "{}", issue.message),
        }
    }
    if report.pass {
        tracing::info!("validate-only: inputs OK");
        Ok(exitcodes::OK)
    } else {
        Ok(exitcodes::VALIDATION)
    }
}

fn run_once(args: &Args) -> Result<u8, MainError> {
    let outs = rd_pipeline::run_from_manifest_path(&args.manifest, &args.overrides()).map_err(map_pipeline_err)?;

    let written = write_artifacts(&args.out, &outs)?;
    maybe_render_reports(args, &written, &args.out)?;

    tracing::info!(out = %args.out.display(), run_id = %outs.run_record.id, "artifacts written");

    if outs.has_discrepancies() {
        tracing::warn!(
            discrepancies = outs.verification.total_discrepancies,
            "verification found discrepancies"
        );
        if args.strict_verify {
            return Ok(exitcodes::DISCREPANCY);
        }
    }
    Ok(exitcodes::OK)
}

/// Artifact values kept for the report after writing.
struct Written {
    run_record: Value,
    verification: Value,
    swaps: Value,
    districts_after: Value,
    screen: Option<Value>,
}

fn write_artifacts(out_dir: &Path, outs: &PipelineOutputs) -> Result<Written, MainError> {
    fs::create_dir_all(out_dir).map_err(|e| MainError::Io(format!("mkdir {}: {e}", out_dir.display())))?;

    write_doc(out_dir, "districts.json", &outs.districts)?;
    let districts_after = write_doc(out_dir, "districts_after.json", &outs.districts_after)?;
    let swaps = write_doc(out_dir, "swaps.json", &outs.swaps)?;
    write_doc(out_dir, "new_mapping.json", &outs.mapping)?;
    write_doc(out_dir, "winners.json", &outs.winners)?;
    let verification = write_doc(out_dir, "verification.json", &outs.verification)?;
    let screen = match &outs.screen {
        Some(s) => Some(write_doc(out_dir, "screen.json", s)?),
        None => None,
    };
    write_doc(out_dir, "validation.json", &outs.validation)?;
    let run_record = write_doc(out_dir, "run_record.json", &outs.run_record)?;

    Ok(Written { run_record, verification, swaps, districts_after, screen })
}

fn write_doc<T: Serialize>(out_dir: &Path, name: &str, doc: &T) -> Result<Value, MainError> {
    let v = serde_json::to_value(doc).map_err(|e| MainError::Io(format!("{name} to JSON: {e}")))?;
    write_canonical_file(&out_dir.join(name), &v).map_err(map_io_err)?;
    tracing::debug!(file = name, "artifact written");
    Ok(v)
}

fn maybe_render_reports(args: &Args, w: &Written, out_dir: &Path) -> Result<(), MainError> {
    if args.render.is_empty() {
        return Ok(());
    }
    let model = build_model(&ReportInputs {
        run_record: &w.run_record,
        verification: &w.verification,
        swaps: &w.swaps,
        districts_after: &w.districts_after,
        screen: w.screen.as_ref(),
    })
    .map_err(map_report_err)?;

    for name in &args.render {
        let format = match name.as_str() {
            "json" => ReportFormat::Json,
            "html" => ReportFormat::Html,
            other => return Err(MainError::Render(format!("unknown renderer: {other}"))),
        };
        let text = render(&model, format).map_err(map_report_err)?;
        let path = out_dir.join(format.file_name());
        fs::write(&path, text).map_err(|e| MainError::Io(format!("write {}: {e}", path.display())))?;
    }
    Ok(())
}

fn map_report_err(e: ReportError) -> MainError {
    MainError::Render(e.to_string())
}
