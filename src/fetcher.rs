//! Lazy pagination over a remote collection.
//!
//! [`fetch`] sends the initial search and returns a [`DocumentStream`]; each
//! further page is requested only once the previous one has been consumed, so
//! at most one page is held in memory whatever the collection size.
//!
//! A failed page request ends the stream early. Documents already yielded
//! stay valid; the error is logged and kept on the stream for the caller to
//! report ([`DocumentStream::fault`]).

use crate::document::Document;
use crate::error::{DumpError, Result};
use crate::search::{Page, SearchBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Paging,
    Exhausted,
    Failed,
}

/// Documents of one collection, in server order.
pub struct DocumentStream<'a, B: SearchBackend + ?Sized> {
    backend: &'a B,
    collection: String,
    page: std::vec::IntoIter<Document>,
    cursor: Option<String>,
    total: Option<u64>,
    yielded: u64,
    pages: u64,
    state: State,
    fault: Option<DumpError>,
}

/// Open a paginated read of `collection`.
///
/// Only the first page is requested here. Later pages are requested as the
/// returned stream is consumed, and the server-side cursor is released once
/// an empty page comes back.
///
/// # Arguments
///
/// * `backend` - Where the collection lives
/// * `collection` - Index or data stream name
/// * `page_size` - Documents requested per page
///
/// # Returns
///
/// A [`DocumentStream`] yielding every document in server order. If a later
/// page fails the stream ends early and [`DocumentStream::fault`] holds the
/// error.
///
/// # Errors
///
/// Returns the error of the initial search; the collection should then be
/// skipped.
///
/// # Example
///
/// ```
/// use esdump::document::Document;
/// use esdump::fetcher::fetch;
/// use esdump::search::{CollectionKind, MemoryBackend};
/// use serde_json::json;
///
/// # fn example() -> esdump::error::Result<()> {
/// let backend = MemoryBackend::new().with_collection(
///     "orders",
///     CollectionKind::Index,
///     vec![Document::new("a", json!({"n": 1}))],
/// );
/// let ids: Vec<String> = fetch(&backend, "orders", 100)?.map(|d| d.id).collect();
/// assert_eq!(ids, ["a"]);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub fn fetch<'a, B>(backend: &'a B, collection: &str, page_size: usize) -> Result<DocumentStream<'a, B>>
where
    B: SearchBackend + ?Sized,
{
    let first = backend.search(collection, page_size)?;
    log::debug!(
        "{collection}: first page has {} documents, total {:?}",
        first.documents.len(),
        first.total
    );

    let mut stream = DocumentStream {
        backend,
        collection: collection.to_owned(),
        page: Vec::new().into_iter(),
        cursor: None,
        total: first.total,
        yielded: 0,
        pages: 0,
        state: State::Paging,
        fault: None,
    };
    stream.accept(first);
    Ok(stream)
}

impl<B: SearchBackend + ?Sized> DocumentStream<'_, B> {
    /// Total hits reported by the first page, if any.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// The page error that ended the stream early, if any.
    pub fn fault(&self) -> Option<&DumpError> {
        self.fault.as_ref()
    }

    pub fn take_fault(&mut self) -> Option<DumpError> {
        self.fault.take()
    }

    /// True once the collection has been read to the end without error.
    pub fn is_complete(&self) -> bool {
        self.state == State::Exhausted
    }

    fn accept(&mut self, page: Page) {
        self.pages += 1;
        if let Some(cursor) = page.cursor {
            self.cursor = Some(cursor);
        }

        if page.documents.is_empty() {
            self.state = State::Exhausted;
            self.release_cursor();
        } else {
            self.page = page.documents.into_iter();
        }
    }

    fn next_page(&mut self) {
        let Some(cursor) = self.cursor.clone() else {
            // Non-empty page without a cursor: nothing more can be requested.
            self.state = State::Exhausted;
            return;
        };

        match self.backend.advance(&cursor) {
            Ok(page) => self.accept(page),
            Err(e) => {
                log::error!(
                    "{}: page {} failed after {} documents: {e}",
                    self.collection,
                    self.pages + 1,
                    self.yielded
                );
                self.state = State::Failed;
                self.fault = Some(e);
            }
        }
    }

    fn release_cursor(&mut self) {
        if let Some(cursor) = self.cursor.take()
            && let Err(e) = self.backend.clear_cursor(&cursor)
        {
            log::debug!("{}: failed to clear cursor: {e}", self.collection);
        }
    }
}

impl<B: SearchBackend + ?Sized> Iterator for DocumentStream<'_, B> {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        loop {
            if let Some(document) = self.page.next() {
                self.yielded += 1;
                return Some(document);
            }
            if self.state != State::Paging {
                return None;
            }
            self.next_page();
        }
    }
}
