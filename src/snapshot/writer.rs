//! Incremental writer for data and checksum files.
//!
//! Both files are JSON objects written one entry per line:
//!
//! ```text
//! {
//! "id-1": {"field":"value"},
//! "id-2": {"field":"other"}
//! }
//! ```
//!
//! Nothing but the current document is held in memory. The checksum file gets
//! the same ids in the same order, each mapped to the SHA-256 of the exact bytes
//! written to the data file. Without a checksum file the entries go to
//! [`io::Sink`] through the same code path.
//!
//! A failed write leaves a truncated, invalid file behind; callers treat such a
//! snapshot as corrupt.

use super::hasher::{canonical_bytes, digest_hex};
use crate::document::Document;
use crate::error::{DumpError, Result};
use std::io::{self, Write};

const OPEN: &[u8] = b"{\n";
const SEPARATOR: &[u8] = b",\n";
const CLOSE: &[u8] = b"\n}\n";

/// Streams documents into a data file and a paired checksum file.
pub struct SnapshotWriter<D: Write, C: Write = io::Sink> {
    data: D,
    checksum: C,
    entries: u64,
}

impl<D: Write> SnapshotWriter<D> {
    /// Writer without a checksum file.
    ///
    /// # Errors
    ///
    /// Returns error if the opening brace can't be written.
    pub fn start(data: D) -> Result<Self> {
        Self::start_with_checksum(data, io::sink())
    }
}

impl<D: Write, C: Write> SnapshotWriter<D, C> {
    /// Writer emitting a checksum entry for every data entry.
    ///
    /// # Errors
    ///
    /// Returns error if the opening brace can't be written.
    pub fn start_with_checksum(mut data: D, mut checksum: C) -> Result<Self> {
        data.write_all(OPEN)?;
        checksum.write_all(OPEN)?;
        Ok(Self {
            data,
            checksum,
            entries: 0,
        })
    }

    /// Append one document to both files.
    ///
    /// # Errors
    ///
    /// Returns [`DumpError::Serialization`] when the document can't be rendered
    /// and [`DumpError::Io`] when a write fails. Either way the files are left
    /// unterminated.
    pub fn write_document(&mut self, document: &Document) -> Result<()> {
        let key = serde_json::to_vec(&document.id)
            .map_err(|e| DumpError::Serialization(format!("id {}: {e}", document.id)))?;
        let body = canonical_bytes(&document.source)
            .map_err(|e| DumpError::Serialization(format!("document {}: {e}", document.id)))?;
        let digest = digest_hex(&body);

        if self.entries > 0 {
            self.data.write_all(SEPARATOR)?;
            self.checksum.write_all(SEPARATOR)?;
        }

        self.data.write_all(&key)?;
        self.data.write_all(b": ")?;
        self.data.write_all(&body)?;

        self.checksum.write_all(&key)?;
        write!(self.checksum, ": \"{digest}\"")?;

        self.entries += 1;
        Ok(())
    }

    /// Close both objects and flush. Returns the number of entries written.
    ///
    /// # Errors
    ///
    /// Returns error if the closing brace can't be written or flushing fails.
    pub fn finish(mut self) -> Result<u64> {
        self.data.write_all(CLOSE)?;
        self.checksum.write_all(CLOSE)?;
        self.data.flush()?;
        self.checksum.flush()?;
        Ok(self.entries)
    }
}

/// Drain `documents` into `data` (and `checksum`, when given).
///
/// # Arguments
///
/// * `documents` - Documents in the order they should appear in the file
/// * `data` - Receives the `id -> source` object
/// * `checksum` - Receives the `id -> sha256 hex` object, or `None` to skip it
///
/// # Returns
///
/// The number of documents written. An empty input still produces a valid
/// empty object (`{\n\n}\n`) on both sides.
///
/// # Errors
///
/// See [`SnapshotWriter::write_document`].
///
/// # Example
///
/// ```
/// use esdump::document::Document;
/// use esdump::snapshot::write_snapshot;
/// use serde_json::json;
///
/// # fn example() -> esdump::error::Result<()> {
/// let mut data = Vec::new();
/// let docs = vec![Document::new("a", json!({"n": 1}))];
/// let written = write_snapshot(docs, &mut data, None::<std::io::Sink>)?;
/// assert_eq!(written, 1);
/// assert_eq!(String::from_utf8_lossy(&data), "{\n\"a\": {\"n\":1}\n}\n");
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub fn write_snapshot<I, D, C>(documents: I, data: D, checksum: Option<C>) -> Result<u64>
where
    I: IntoIterator<Item = Document>,
    D: Write,
    C: Write,
{
    match checksum {
        Some(checksum) => drain(documents, SnapshotWriter::start_with_checksum(data, checksum)?),
        None => drain(documents, SnapshotWriter::start(data)?),
    }
}

fn drain<I, D, C>(documents: I, mut writer: SnapshotWriter<D, C>) -> Result<u64>
where
    I: IntoIterator<Item = Document>,
    D: Write,
    C: Write,
{
    for document in documents {
        writer.write_document(&document)?;
    }
    writer.finish()
}
