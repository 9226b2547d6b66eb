// crates/rd_io/src/manifest.rs
//
// Run manifest: names the input files of one run.
// - Required inputs: records, districts (unit→district map), adjacency table.
// - Optional: params file, sha256 expectations, expected engine version.
// - Offline-only: any path with a scheme ("://", "http:", "https:") is rejected.
// - Relative paths resolve against the manifest's directory.
// - Digests (if provided) are 64-lower-hex over canonical JSON bytes.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canonical_json::to_canonical_json_bytes;
use crate::hasher::{is_lower_hex_64, sha256_hex};

/// External manifest accepted by the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Optional user-provided identifier (not used in any artifact digest).
    #[serde(default)]
    pub id: Option<String>,

    pub records_path: String,
    pub districts_path: String,
    pub adjacency_path: String,

    #[serde(default)]
    pub params_path: Option<String>,

    #[serde(default)]
    pub inputs_sha256: Option<InputDigests>,

    #[serde(default)]
    pub expect: Option<Expectations>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputDigests {
    #[serde(default)]
    pub records_path: Option<String>,
    #[serde(default)]
    pub districts_path: Option<String>,
    #[serde(default)]
    pub adjacency_path: Option<String>,
    #[serde(default)]
    pub params_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expectations {
    /// Exact engine version string.
    #[serde(default)]
    pub engine_version: Option<String>,
}

/// Paths resolved against a base directory (usually the manifest's dir).
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    pub records_path: PathBuf,
    pub districts_path: PathBuf,
    pub adjacency_path: PathBuf,
    pub params_path: Option<PathBuf>,
    pub digests: Option<InputDigests>,
    pub expect: Option<Expectations>,
}

#[derive(Debug)]
pub enum ManifestError {
    Empty(&'static str),
    UrlPath(&'static str, String),
    Io(&'static str, String),
    NotAFile(&'static str, String),
    /// Bad hex format (not a mismatch).
    DigestShape(&'static str, String),
    DigestMismatch(&'static str, String),
    DigestForMissing(&'static str),
    ExpectationMismatch(&'static str, String),
}

impl std::fmt::Display for ManifestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ManifestError::*;
        match self {
            Empty(k) => write!(f, "field must not be empty: {}", k),
            UrlPath(k, v) => write!(f, "path must be offline (no scheme) for {}: {}", k, v),
            Io(k, v) => write!(f, "cannot access {}: {}", k, v),
            NotAFile(k, v) => write!(f, "path is not a file for {}: {}", k, v),
            DigestShape(k, v) => write!(f, "invalid sha256 format for {}: {}", k, v),
            DigestMismatch(k, v) => write!(f, "sha256 mismatch for {}: {}", k, v),
            DigestForMissing(k) => write!(f, "digest supplied for missing input: {}", k),
            ExpectationMismatch(k, v) => write!(f, "expectation mismatch for {}: {}", k, v),
        }
    }
}
impl std::error::Error for ManifestError {}

// ---------- helpers (pure) ----------

#[inline]
fn join_under(base: &Path, rel: &str) -> PathBuf {
    let p = Path::new(rel);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn required(label: &'static str, s: &str) -> Result<(), ManifestError> {
    if s.trim().is_empty() {
        return Err(ManifestError::Empty(label));
    }
    offline_check(label, s)
}

fn offline_check(label: &'static str, path: &str) -> Result<(), ManifestError> {
    if crate::looks_like_url_strict(path) {
        return Err(ManifestError::UrlPath(label, path.to_string()));
    }
    Ok(())
}

fn digest_shape(label: &'static str, h: &Option<String>) -> Result<(), ManifestError> {
    match h {
        Some(h) if !is_lower_hex_64(h) => Err(ManifestError::DigestShape(label, h.clone())),
        _ => Ok(()),
    }
}

// ---------- validation ----------

/// Validate manifest shape and offline path policy. Does not perform I/O.
pub fn validate_manifest(man: &Manifest) -> Result<(), ManifestError> {
    required("records_path", &man.records_path)?;
    required("districts_path", &man.districts_path)?;
    required("adjacency_path", &man.adjacency_path)?;
    if let Some(s) = &man.params_path {
        required("params_path", s)?;
    }

    if let Some(d) = &man.inputs_sha256 {
        digest_shape("records_path", &d.records_path)?;
        digest_shape("districts_path", &d.districts_path)?;
        digest_shape("adjacency_path", &d.adjacency_path)?;
        if d.params_path.is_some() && man.params_path.is_none() {
            return Err(ManifestError::DigestForMissing("params_path"));
        }
        digest_shape("params_path", &d.params_path)?;
    }
    Ok(())
}

// ---------- resolution ----------

/// Resolve paths under `base_dir` and check that every input exists and is a file.
pub fn resolve_paths(base_dir: &Path, man: &Manifest) -> Result<ResolvedManifest, ManifestError> {
    let records = join_under(base_dir, &man.records_path);
    let districts = join_under(base_dir, &man.districts_path);
    let adjacency = join_under(base_dir, &man.adjacency_path);
    let params = man.params_path.as_ref().map(|s| join_under(base_dir, s));

    must_exist_file("records_path", &records)?;
    must_exist_file("districts_path", &districts)?;
    must_exist_file("adjacency_path", &adjacency)?;
    if let Some(p) = &params {
        must_exist_file("params_path", p)?;
    }

    Ok(ResolvedManifest {
        records_path: records,
        districts_path: districts,
        adjacency_path: adjacency,
        params_path: params,
        digests: man.inputs_sha256.clone(),
        expect: man.expect.clone(),
    })
}

fn must_exist_file(label: &'static str, p: &Path) -> Result<(), ManifestError> {
    let md = fs::metadata(p).map_err(|e| ManifestError::Io(label, format!("{} ({e})", p.display())))?;
    if !md.is_file() {
        return Err(ManifestError::NotAFile(label, p.display().to_string()));
    }
    Ok(())
}

// ---------- digests & expectations ----------

fn canonical_digest_of_file(label: &'static str, p: &Path) -> Result<String, ManifestError> {
    let buf = fs::read(p).map_err(|e| ManifestError::Io(label, format!("{} ({e})", p.display())))?;
    let v: serde_json::Value =
        serde_json::from_slice(&buf).map_err(|e| ManifestError::Io(label, format!("{} ({e})", p.display())))?;
    let canon = to_canonical_json_bytes(&v).map_err(|e| ManifestError::Io(label, e.to_string()))?;
    Ok(sha256_hex(&canon))
}

/// Verify provided digests over canonical JSON bytes. `Ok(())` when none were given.
pub fn verify_digests(resolved: &ResolvedManifest) -> Result<(), ManifestError> {
    let Some(d) = &resolved.digests else { return Ok(()) };

    let check = |label: &'static str, path: &Path, want: &str| -> Result<(), ManifestError> {
        let got = canonical_digest_of_file(label, path)?;
        if got != want {
            return Err(ManifestError::DigestMismatch(label, format!("expected={want} got={got}")));
        }
        Ok(())
    };

    if let Some(h) = &d.records_path {
        check("records_path", &resolved.records_path, h)?;
    }
    if let Some(h) = &d.districts_path {
        check("districts_path", &resolved.districts_path, h)?;
    }
    if let Some(h) = &d.adjacency_path {
        check("adjacency_path", &resolved.adjacency_path, h)?;
    }
    match (&resolved.params_path, &d.params_path) {
        (Some(p), Some(h)) => check("params_path", p, h)?,
        (None, Some(_)) => return Err(ManifestError::DigestForMissing("params_path")),
        _ => {}
    }
    Ok(())
}

pub fn enforce_expectations(resolved: &ResolvedManifest, actual_engine_version: &str) -> Result<(), ManifestError> {
    let Some(exp) = &resolved.expect else { return Ok(()) };
    if let Some(want) = &exp.engine_version {
        if want != actual_engine_version {
            return Err(ManifestError::ExpectationMismatch(
                "engine_version",
                format!("expected={want} got={actual_engine_version}"),
            ));
        }
    }
    Ok(())
}

// ---------- top-level ----------

const MAX_MANIFEST_BYTES: u64 = 4 * 1024 * 1024;

/// Load, validate and resolve a manifest. Does not verify digests.
pub fn load_and_resolve_manifest(manifest_path: &Path) -> Result<ResolvedManifest, ManifestError> {
    let f = fs::File::open(manifest_path)
        .map_err(|e| ManifestError::Io("manifest", format!("{} ({e})", manifest_path.display())))?;
    let mut buf = Vec::new();
    f.take(MAX_MANIFEST_BYTES)
        .read_to_end(&mut buf)
        .map_err(|e| ManifestError::Io("manifest", format!("{} ({e})", manifest_path.display())))?;

    let man: Manifest = serde_json::from_slice(&buf)
        .map_err(|e| ManifestError::Io("manifest", format!("{} ({e})", manifest_path.display())))?;
    validate_manifest(&man)?;

    let base = manifest_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    resolve_paths(&base, &man)
}

/// Full pipeline: load, resolve, verify digests, enforce expectations.
pub fn load_verify_manifest(manifest_path: &Path, actual_engine_version: &str) -> Result<ResolvedManifest, ManifestError> {
    let resolved = load_and_resolve_manifest(manifest_path)?;
    verify_digests(&resolved)?;
    enforce_expectations(&resolved, actual_engine_version)?;
    Ok(resolved)
}
