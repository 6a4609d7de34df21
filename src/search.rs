//! The remote search engine, seen through the few calls esdump needs.
//!
//! [`SearchBackend`] is the seam: [`client::ElasticClient`] talks to a real
//! cluster over HTTP, [`memory::MemoryBackend`] serves documents from memory.

pub mod client;
pub mod memory;

use crate::document::Document;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub use client::ElasticClient;
pub use memory::MemoryBackend;

/// Which listing a collection comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Index,
    DataStream,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => f.write_str("index"),
            Self::DataStream => f.write_str("data stream"),
        }
    }
}

/// One page of a paginated search.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub documents: Vec<Document>,
    /// Token for the next page. `None` when the server returned none.
    pub cursor: Option<String>,
    /// Total hits, when the server reports it (first page only).
    pub total: Option<u64>,
}

/// A document to ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    pub target: String,
    pub pipeline: Option<String>,
    pub document: Value,
}

/// Per-item result of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    pub success: bool,
    /// The new document id on success, the server's reason on failure.
    pub detail: String,
}

impl BulkOutcome {
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: id.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: reason.into(),
        }
    }
}

/// Calls made against the search engine.
///
/// Failures are reported as [`crate::error::DumpError::RemoteFetch`]; there is
/// no retry at this level.
pub trait SearchBackend {
    /// First page of `collection`, opening a server-side cursor.
    fn search(&self, collection: &str, page_size: usize) -> Result<Page>;

    /// Next page for a cursor returned by [`Self::search`] or a previous call.
    fn advance(&self, cursor: &str) -> Result<Page>;

    /// Release a cursor early. Best effort; the server expires it anyway.
    fn clear_cursor(&self, _cursor: &str) -> Result<()> {
        Ok(())
    }

    /// Ingest a batch, returning one outcome per item in order.
    fn bulk_ingest(&self, items: &[BulkItem]) -> Result<Vec<BulkOutcome>>;

    /// Names of all collections of `kind`, sorted.
    fn list_collections(&self, kind: CollectionKind) -> Result<Vec<String>>;
}

impl<B: SearchBackend + ?Sized> SearchBackend for &B {
    fn search(&self, collection: &str, page_size: usize) -> Result<Page> {
        (**self).search(collection, page_size)
    }

    fn advance(&self, cursor: &str) -> Result<Page> {
        (**self).advance(cursor)
    }

    fn clear_cursor(&self, cursor: &str) -> Result<()> {
        (**self).clear_cursor(cursor)
    }

    fn bulk_ingest(&self, items: &[BulkItem]) -> Result<Vec<BulkOutcome>> {
        (**self).bulk_ingest(items)
    }

    fn list_collections(&self, kind: CollectionKind) -> Result<Vec<String>> {
        (**self).list_collections(kind)
    }
}
