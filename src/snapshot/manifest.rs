//! Snapshot manifest: what one export run produced.
//!
//! Written as `_manifest.json` at the end of an export. It is informational;
//! the differ and the duplicate scanner work without it.
//!
//! ```json
//! {
//!   "manifest_version": 1,
//!   "created_utc": "2026-01-24T12:34:56.789Z",
//!   "producer": { "app_name": "esdump", "app_version": "0.1.0", "platform": "linux" },
//!   "hash_algorithm": "SHA-256",
//!   "collections": [
//!     {
//!       "name": "orders",
//!       "kind": "index",
//!       "documents": 1200,
//!       "complete": true,
//!       "data_file": { "filename": "orders.json", "size_bytes": 88211, "hash": "a3b2..." },
//!       "checksum_file": { "filename": "orders-checksum.json", "size_bytes": 90011, "hash": "77c1..." }
//!     }
//!   ]
//! }
//! ```

use super::hasher::{HASH_ALGORITHM, compute_file_hash};
use super::layout::manifest_path;
use crate::error::{DumpError, Result, ResultExt as _};
use crate::search::CollectionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Increment on breaking changes to the manifest format.
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub manifest_version: u32,
    pub created_utc: DateTime<Utc>,
    pub producer: ProducerInfo,
    pub hash_algorithm: String,
    pub collections: Vec<CollectionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerInfo {
    pub app_name: String,
    pub app_version: String,
    pub platform: String,
}

impl ProducerInfo {
    pub fn current() -> Self {
        Self {
            app_name: env!("CARGO_PKG_NAME").to_owned(),
            app_version: env!("CARGO_PKG_VERSION").to_owned(),
            platform: std::env::consts::OS.to_owned(),
        }
    }
}

/// One exported collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub name: String,
    pub kind: CollectionKind,
    pub documents: u64,
    /// False when pagination stopped on an error before the end.
    pub complete: bool,
    pub data_file: FileRecord,
    pub checksum_file: Option<FileRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    pub size_bytes: u64,
    pub hash: String,
}

impl FileRecord {
    /// Size and whole-file hash of `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the file can't be read.
    pub fn describe(path: &Path) -> Result<Self> {
        let hash = compute_file_hash(path)?;
        let size_bytes = fs::metadata(path)
            .with_context(|| format!("Failed to read file metadata: {}", path.display()))?
            .len();
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| DumpError::InvalidPath(path.display().to_string()))?
            .to_owned();

        Ok(Self {
            filename,
            size_bytes,
            hash,
        })
    }
}

impl SnapshotManifest {
    pub fn new(collections: Vec<CollectionRecord>) -> Self {
        Self {
            manifest_version: MANIFEST_VERSION,
            created_utc: Utc::now(),
            producer: ProducerInfo::current(),
            hash_algorithm: HASH_ALGORITHM.to_owned(),
            collections,
        }
    }

    /// Write `_manifest.json` into `dir`.
    ///
    /// # Errors
    ///
    /// Returns error if the file can't be written.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = manifest_path(dir);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize manifest")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write manifest to {}", path.display()))?;
        Ok(path)
    }

    /// Read `_manifest.json` from `dir`, if there is one.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but can't be read or parsed.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = manifest_path(dir);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let manifest = serde_json::from_str(&json)
            .map_err(|e| DumpError::Snapshot(format!("{}: {e}", path.display())))?;
        Ok(Some(manifest))
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionRecord> {
        self.collections.iter().find(|c| c.name == name)
    }
}
