//! Findings and the reporting seam between the core and the terminal.
//!
//! Core operations never print. They push progress and [`Finding`]s through a
//! [`Reporter`]; the binary renders them, tests collect them.

use std::fmt;

/// An outcome reported by the differ, the duplicate scanner or the verifier.
///
/// Findings are not errors: a mismatch is a successful comparison that found
/// a difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// Every left-side document exists on the right with the same digest.
    CollectionIdentical { collection: String },

    /// The right snapshot has no checksum file for this collection.
    MissingCollection { collection: String },

    /// The document exists only on the left.
    MissingDocument { collection: String, id: String },

    /// The document exists on both sides with different digests.
    DocumentMismatch { collection: String, id: String },

    /// Same content (after field exclusion) as a document seen earlier.
    Duplicate {
        id: String,
        collection: String,
        first_id: String,
        first_collection: String,
    },

    /// Data file and checksum file agree entry for entry.
    CollectionVerified { collection: String, documents: u64 },

    /// A data file has no checksum file next to it.
    ChecksumFileMissing { collection: String },

    /// The recorded digest does not match the bytes in the data file.
    ChecksumMismatch { collection: String, id: String },

    /// The two files list different ids at the same position.
    OrderMismatch {
        collection: String,
        position: u64,
        data_id: String,
        checksum_id: String,
    },

    /// One of the two files has entries past the end of the other.
    EntryCountMismatch {
        collection: String,
        data_entries: u64,
        checksum_entries: u64,
    },
}

impl Finding {
    /// Whether the finding points at a problem (as opposed to a clean result).
    pub fn is_problem(&self) -> bool {
        !matches!(
            self,
            Self::CollectionIdentical { .. } | Self::CollectionVerified { .. }
        )
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CollectionIdentical { collection } => {
                write!(f, "All documents from {collection} are identical")
            }
            Self::MissingCollection { collection } => {
                write!(f, "Collection {collection} is missing")
            }
            Self::MissingDocument { collection, id } => {
                write!(f, "Document {id} from {collection} is missing")
            }
            Self::DocumentMismatch { collection, id } => {
                write!(f, "Document {id} from {collection} is different")
            }
            Self::Duplicate {
                id,
                collection,
                first_id,
                first_collection,
            } => write!(
                f,
                "Duplicate found: {id} in {collection} and {first_id} in {first_collection}"
            ),
            Self::CollectionVerified {
                collection,
                documents,
            } => write!(f, "{collection}: {documents} documents match their checksums"),
            Self::ChecksumFileMissing { collection } => {
                write!(f, "{collection}: no checksum file")
            }
            Self::ChecksumMismatch { collection, id } => {
                write!(f, "{collection}: checksum of {id} does not match its data")
            }
            Self::OrderMismatch {
                collection,
                position,
                data_id,
                checksum_id,
            } => write!(
                f,
                "{collection}: entry {position} is {data_id} in the data file but {checksum_id} in the checksum file"
            ),
            Self::EntryCountMismatch {
                collection,
                data_entries,
                checksum_entries,
            } => write!(
                f,
                "{collection}: {data_entries} data entries but {checksum_entries} checksum entries"
            ),
        }
    }
}

/// Sink for progress and findings.
///
/// Progress methods default to no-ops so a reporter only interested in
/// findings implements a single method.
pub trait Reporter {
    /// A finding was produced.
    fn finding(&mut self, finding: Finding);

    /// A free-form status line (collection started, file opened, ...).
    fn status(&mut self, _message: &str) {}

    /// A recoverable error that skipped part of the work.
    fn error(&mut self, _message: &str) {}

    /// A unit of work with an optional known size is starting.
    fn begin(&mut self, _label: &str, _total: Option<u64>) {}

    /// `n` more items of the current unit are done.
    fn advance(&mut self, _n: u64) {}

    /// The current unit of work is over.
    fn finish(&mut self) {}
}

/// Collects findings, ignores progress.
impl Reporter for Vec<Finding> {
    fn finding(&mut self, finding: Finding) {
        self.push(finding);
    }
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn finding(&mut self, _finding: Finding) {}
}
