//! crates/rd_io/src/lib.rs
//! Single I/O crate for the engine.
//!
//! - Shared error type (`IoError`) with `From` conversions used across modules.
//! - Tolerant loaders for candidate records, district map, adjacency and params.
//! - Canonical JSON, SHA-256 digests, run manifest.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Unified error for rd_io (loader/manifest/canonical_json/hasher).
#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors (open, create_dir_all, rename, fsync, ...)
    #[error("io/path error: {0}")]
    Path(String),

    /// JSON parse or shape errors with a JSON Pointer hint.
    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    /// Manifest shape, offline policy or digest expectations.
    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("hash error: {0}")]
    Hash(String),

    /// Generic validation / invariants.
    #[error("invalid: {0}")]
    Invalid(String),
}

pub type IoResult<T> = Result<T, IoError>;

/* ---------------- From conversions (used by file modules) ---------------- */

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        // serde_json keeps line/column but not a pointer; default to root.
        IoError::Json { pointer: "/".to_string(), msg: e.to_string() }
    }
}

impl From<manifest::ManifestError> for IoError {
    fn from(e: manifest::ManifestError) -> Self {
        IoError::Manifest(e.to_string())
    }
}

pub mod canonical_json;
pub mod hasher;
pub mod manifest;
pub mod loader;

/// Returns true if `s` looks like a URL (any `<scheme>://`, including `file://`).
#[inline]
pub fn looks_like_url_strict(s: &str) -> bool {
    let t = s.trim();
    t.contains("://") || t.starts_with("http:") || t.starts_with("https:")
}

pub mod prelude {
    pub use crate::{looks_like_url_strict, IoError, IoResult};
    pub use crate::canonical_json::{to_canonical_json_bytes, write_canonical_file};
    pub use crate::hasher::{sha256_canonical, sha256_hex, run_id_from_canonical};
    pub use crate::loader::{load_all_from_manifest, load_inputs, InputPaths, LoadedInputs};
}
