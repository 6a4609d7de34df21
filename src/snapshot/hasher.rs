//! Canonical serialization and SHA-256 digests.
//!
//! A document's checksum is the digest of exactly the bytes written for it in
//! the data file, so serialization and hashing live together here.

use crate::error::{DumpError, Result, ResultExt as _};
use sha2::{Digest as _, Sha256};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read as _};
use std::path::Path;

/// Buffer size for streaming file reads (8 KB).
const BUFFER_SIZE: usize = 8192;

/// Hash algorithm identifier recorded in manifests.
pub const HASH_ALGORITHM: &str = "SHA-256";

/// Render a document in its canonical form: compact JSON, key order as stored.
///
/// # Errors
///
/// Returns [`DumpError::Serialization`] if the value cannot be rendered.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| DumpError::Serialization(e.to_string()))
}

/// SHA-256 of `bytes` as a lowercase hexadecimal string (64 characters).
pub fn digest_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Digest of the canonical form of `value`.
///
/// # Errors
///
/// Returns [`DumpError::Serialization`] if the value cannot be rendered.
pub fn document_digest(value: &Value) -> Result<String> {
    Ok(digest_hex(&canonical_bytes(value)?))
}

/// Compute SHA-256 hash of a file using streaming I/O.
///
/// Memory use is a fixed 8 KB buffer regardless of file size.
///
/// # Errors
///
/// Returns error if the file can't be opened or read.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;

    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
