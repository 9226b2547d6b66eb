// crates/rd_cli/src/args.rs
//
// Argument surface for the `rd` binary: one manifest, an output directory,
// parameter overrides and logging switches. Paths must be local (no scheme).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

use rd_core::ids::PartyId;
use rd_core::variables::{Compatibility, Objective};
use rd_io::looks_like_url_strict;
use rd_pipeline::ParamOverrides;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ObjectiveArg {
    NetFlips,
    BothFlip,
}

impl From<ObjectiveArg> for Objective {
    fn from(o: ObjectiveArg) -> Self {
        match o {
            ObjectiveArg::NetFlips => Objective::NetFlips,
            ObjectiveArg::BothFlip => Objective::BothFlip,
        }
    }
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "rd",
    version,
    disable_help_subcommand = true,
    about = "Offline, deterministic redistricting what-if engine"
)]
pub struct Args {
    /// Run manifest JSON (records, districts, adjacency, optional params).
    #[arg(long)]
    pub manifest: PathBuf,

    /// Output directory for artifacts (created if missing).
    #[arg(long, default_value = ".")]
    pub out: PathBuf,

    /// Report renderer(s) to emit. Omit to skip the report.
    #[arg(long, value_parser = ["json", "html"], num_args = 0..=2)]
    pub render: Vec<String>,

    /// Load and validate inputs only; write nothing.
    #[arg(long)]
    pub validate_only: bool,

    /// Exit with status 3 when verification finds discrepancies.
    #[arg(long)]
    pub strict_verify: bool,

    // --- parameter overrides ---
    /// Party whose district wins are maximized.
    #[arg(long, value_parser = parse_party)]
    pub target_party: Option<PartyId>,

    #[arg(long, value_enum)]
    pub objective: Option<ObjectiveArg>,

    /// Reject any swap that costs the target a district (default of the params file).
    #[arg(long, conflicts_with = "allow_loss")]
    pub no_loss: bool,

    /// Score swaps by net flips, accepting losses.
    #[arg(long)]
    pub allow_loss: bool,

    /// Ignore reservation categories when pairing units.
    #[arg(long)]
    pub any_category: bool,

    #[arg(long)]
    pub max_swaps_per_district: Option<u32>,

    /// Global cap on committed swaps.
    #[arg(long)]
    pub swap_budget: Option<u32>,

    // --- logging ---
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Only warnings and errors (RUST_LOG still wins).
    #[arg(long)]
    pub quiet: bool,
}

impl Args {
    pub fn overrides(&self) -> ParamOverrides {
        ParamOverrides {
            target_party: self.target_party.clone(),
            objective: self.objective.map(Objective::from),
            no_loss: match (self.no_loss, self.allow_loss) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            compatibility: self.any_category.then_some(Compatibility::Any),
            neighbor_source: None,
            max_swaps_per_district: self.max_swaps_per_district,
            swap_budget: self.swap_budget,
        }
    }
}

/// Errors surfaced by argument checks. Messages stay short and stable.
#[derive(Debug)]
pub enum CliError {
    NonLocalPath(String),
    NotFound(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::NonLocalPath(p) => write!(f, "path must be local file (no scheme): {p}"),
            CliError::NotFound(p) => write!(f, "file not found: {p}"),
        }
    }
}

impl std::error::Error for CliError {}

fn parse_party(s: &str) -> Result<PartyId, String> {
    s.parse::<PartyId>().map_err(|e| e.to_string())
}

/// Entry point used by main.rs
pub fn parse_and_validate() -> Result<Args, CliError> {
    check(Args::parse())
}

fn check(mut args: Args) -> Result<Args, CliError> {
    for p in [args.manifest.as_path(), args.out.as_path()] {
        ensure_local_path(p)?;
    }
    ensure_local_exists(&args.manifest, "--manifest")?;
    args.manifest = normalize_path(&args.manifest);
    args.out = normalize_path(&args.out);
    Ok(args)
}

fn ensure_local_path(p: &Path) -> Result<(), CliError> {
    match p.to_str() {
        Some(s) if looks_like_url_strict(s) => Err(CliError::NonLocalPath(s.to_string())),
        _ => Ok(()),
    }
}

fn ensure_local_exists(p: &Path, label: &'static str) -> Result<(), CliError> {
    let meta = fs::metadata(p).map_err(|_| CliError::NotFound(format!("{label} {}", p.display())))?;
    if !meta.is_file() {
        return Err(CliError::NotFound(format!("{label} {}", p.display())));
    }
    Ok(())
}

/// Absolute path; falls back to CWD-relative when the path does not exist yet.
fn normalize_path(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(p)
        }
    })
}
