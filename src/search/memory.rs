//! In-process backend serving documents from memory.
//!
//! Used by the test suites and handy for dry runs. Cursors encode the page
//! position, so the backend needs no cursor bookkeeping; ingested items are
//! kept behind a `RefCell` because [`SearchBackend`] takes `&self`.

use super::{BulkItem, BulkOutcome, CollectionKind, Page, SearchBackend};
use crate::document::Document;
use crate::error::{DumpError, Result};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

type RejectFn = Box<dyn Fn(&Value) -> Option<String>>;

#[derive(Default)]
pub struct MemoryBackend {
    collections: BTreeMap<String, (CollectionKind, Vec<Document>)>,
    /// Collection name and page index at which `advance` starts failing.
    fail_at: Option<(String, usize)>,
    reject: Option<RejectFn>,
    ingested: RefCell<Vec<BulkItem>>,
    bulk_calls: Cell<usize>,
    cleared: RefCell<Vec<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(
        mut self,
        name: impl Into<String>,
        kind: CollectionKind,
        documents: Vec<Document>,
    ) -> Self {
        self.collections.insert(name.into(), (kind, documents));
        self
    }

    /// Make the request for page `page` (0-based) of `collection` fail.
    pub fn failing_at_page(mut self, collection: impl Into<String>, page: usize) -> Self {
        self.fail_at = Some((collection.into(), page));
        self
    }

    /// Reject ingested documents for which `reject` returns a reason.
    pub fn rejecting<F>(mut self, reject: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + 'static,
    {
        self.reject = Some(Box::new(reject));
        self
    }

    /// Everything accepted by `bulk_ingest` so far.
    pub fn ingested(&self) -> Vec<BulkItem> {
        self.ingested.borrow().clone()
    }

    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.get()
    }

    /// Cursors released through `clear_cursor`.
    pub fn cleared_cursors(&self) -> Vec<String> {
        self.cleared.borrow().clone()
    }

    fn page(&self, collection: &str, page_size: usize, page: usize) -> Result<Page> {
        if let Some((failing, at)) = &self.fail_at
            && failing == collection
            && *at == page
        {
            return Err(DumpError::RemoteFetch(format!(
                "page {page} of {collection} unavailable"
            )));
        }

        let (_, documents) = self.collections.get(collection).ok_or_else(|| {
            DumpError::RemoteFetch(format!("no such index [{collection}]"))
        })?;

        let page_size = page_size.max(1);
        let documents: Vec<Document> = documents
            .iter()
            .skip(page * page_size)
            .take(page_size)
            .cloned()
            .collect();

        Ok(Page {
            documents,
            cursor: Some(format!("{}:{page_size}:{collection}", page + 1)),
            total: None,
        })
    }
}

impl SearchBackend for MemoryBackend {
    fn search(&self, collection: &str, page_size: usize) -> Result<Page> {
        let mut page = self.page(collection, page_size, 0)?;
        page.total = self
            .collections
            .get(collection)
            .map(|(_, docs)| docs.len() as u64);
        Ok(page)
    }

    fn advance(&self, cursor: &str) -> Result<Page> {
        let mut parts = cursor.splitn(3, ':');
        let (Some(page), Some(page_size), Some(collection)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(DumpError::RemoteFetch(format!("malformed cursor {cursor}")));
        };
        let page = page
            .parse()
            .map_err(|_| DumpError::RemoteFetch(format!("malformed cursor {cursor}")))?;
        let page_size = page_size
            .parse()
            .map_err(|_| DumpError::RemoteFetch(format!("malformed cursor {cursor}")))?;
        self.page(collection, page_size, page)
    }

    fn clear_cursor(&self, cursor: &str) -> Result<()> {
        self.cleared.borrow_mut().push(cursor.to_owned());
        Ok(())
    }

    fn bulk_ingest(&self, items: &[BulkItem]) -> Result<Vec<BulkOutcome>> {
        self.bulk_calls.set(self.bulk_calls.get() + 1);
        let mut ingested = self.ingested.borrow_mut();

        Ok(items
            .iter()
            .map(|item| {
                match self.reject.as_ref().and_then(|reject| reject(&item.document)) {
                    Some(reason) => BulkOutcome::failed(reason),
                    None => {
                        ingested.push(item.clone());
                        BulkOutcome::ok(format!("mem-{}", ingested.len()))
                    }
                }
            })
            .collect())
    }

    fn list_collections(&self, kind: CollectionKind) -> Result<Vec<String>> {
        Ok(self
            .collections
            .iter()
            .filter(|(_, (k, _))| *k == kind)
            .map(|(name, _)| name.clone())
            .collect())
    }
}
