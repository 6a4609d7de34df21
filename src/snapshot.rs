//! On-disk snapshots.
//!
//! A snapshot is a directory holding, per collection, a data file mapping
//! document id to document and optionally a checksum file mapping the same ids,
//! in the same order, to the SHA-256 of each document's canonical bytes.
//!
//! - [`layout`]: file naming
//! - [`hasher`]: canonical serialization and digests
//! - [`writer`]: streaming writer for data/checksum pairs
//! - [`reader`]: lazy entry reader and checksum map loader
//! - [`manifest`]: per-run `_manifest.json`

pub mod hasher;
pub mod layout;
pub mod manifest;
pub mod reader;
pub mod writer;

pub use hasher::{HASH_ALGORITHM, canonical_bytes, compute_file_hash, digest_hex, document_digest};
pub use layout::{SnapshotFile, checksum_path, data_path};
pub use manifest::{CollectionRecord, FileRecord, SnapshotManifest};
pub use reader::{ChecksumMap, EntryReader, RawEntry};
pub use writer::{SnapshotWriter, write_snapshot};
