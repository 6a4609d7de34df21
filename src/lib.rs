//! # esdump - Elasticsearch Snapshot Toolkit
//!
//! esdump exports the documents of Elasticsearch indices and data streams to
//! plain JSON files on disk, reloads newline-delimited JSON through the bulk
//! API, and works offline on the exported snapshots: comparing two of them,
//! verifying one against its checksums, and scanning one for near-duplicate
//! documents.
//!
//! ## Quick Start
//!
//! ```no_run
//! use esdump::config::{ConnectionConfig, ExportOptions};
//! use esdump::export::export_collections;
//! use esdump::report::NullReporter;
//! use esdump::search::{CollectionKind, ElasticClient};
//! use std::path::Path;
//!
//! # fn example() -> esdump::error::Result<()> {
//! let client = ElasticClient::connect(&ConnectionConfig::default())?;
//! let summary = export_collections(
//!     &client,
//!     CollectionKind::Index,
//!     &["orders".to_owned()],
//!     Path::new("snapshots/today"),
//!     &ExportOptions::default(),
//!     &mut NullReporter,
//! )?;
//! println!("exported {} documents", summary.documents());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`fetcher`]: lazy, page-at-a-time reads of a remote collection
//! - [`snapshot`]: on-disk format, streaming writer and reader, manifest
//! - [`export`]: collection -> snapshot files
//! - [`load`]: NDJSON files -> bulk ingest
//! - [`diff`]: snapshot vs snapshot, by checksum
//! - [`verify`]: data file vs its own checksum file
//! - [`duplicates`]: near-duplicate scan with field exclusion
//! - [`search`]: the [`search::SearchBackend`] seam, HTTP client and in-memory backend
//! - [`report`]: findings and the [`report::Reporter`] seam
//! - [`error`]: error types and handling utilities
//!
//! ## Snapshot Layout
//!
//! A snapshot is a directory holding, per collection, `<name>.json` (an
//! object mapping document id to source) and optionally
//! `<name>-checksum.json` (id -> SHA-256 hex of the stored source). Both files
//! list ids in the same order. `_manifest.json` describes the export run.

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod diff;
pub mod document;
pub mod duplicates;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod load;
pub mod logging;
pub mod report;
pub mod search;
pub mod snapshot;
pub mod verify;
