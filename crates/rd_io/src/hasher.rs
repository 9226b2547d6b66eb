//! crates/rd_io/src/hasher.rs
//!
//! Deterministic hashing and ID builders for canonical artifacts.
//!
//! - Use `sha256_canonical(..)` for JSON **values/structs** (goes through canonical_json).
//! - Use `sha256_hex(..)` or `sha256_file(..)` for **raw bytes/files**.
//! - Hex digests are lowercase.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical_json::{canonical_bytes_of, to_canonical_json_bytes};
use crate::IoError;

/* ---------------------------- Canonical hashing ---------------------------- */

/// SHA-256 over canonical JSON bytes of any serializable value.
pub fn sha256_canonical<T: Serialize>(value: &T) -> Result<String, IoError> {
    let bytes = canonical_bytes_of(value)?;
    Ok(sha256_hex(&bytes))
}

/// SHA-256 over an already parsed JSON value.
pub fn sha256_canonical_value(v: &Value) -> Result<String, IoError> {
    let bytes = to_canonical_json_bytes(v)?;
    Ok(sha256_hex(&bytes))
}

/* ------------------------------- Raw hashing ------------------------------- */

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 over a file's raw bytes (not canonicalized).
pub fn sha256_file(path: &Path) -> Result<String, IoError> {
    let f = File::open(path).map_err(|e| IoError::Hash(format!("{}: {e}", path.display())))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = r.read(&mut buf).map_err(|e| IoError::Hash(e.to_string()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/* ---------------------------- Artifact ID builders ---------------------------- */

/// `RUN:<hex>` derived from the canonical bytes of the run record body.
pub fn run_id_from_canonical<T: Serialize>(value: &T) -> Result<String, IoError> {
    let hex = sha256_canonical(value)?;
    Ok(format!("RUN:{hex}"))
}

/// First `n` chars of a lowercase 64-hex digest.
pub fn short_hex(hex64: &str, n: usize) -> Result<String, IoError> {
    if !is_lower_hex_64(hex64) {
        return Err(IoError::Hash(format!("expected lowercase 64-hex, got {hex64:?}")));
    }
    Ok(hex64[..n.min(64)].to_string())
}

#[inline]
pub fn is_lower_hex_64(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
