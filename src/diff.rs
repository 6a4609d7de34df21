//! Compare two snapshots by document checksum.
//!
//! The comparison is left-relative: every collection with a checksum file on
//! the left is looked up on the right, and every left id is checked there.
//! Collections or ids that exist only on the right are never reported.
//!
//! Only one collection's pair of checksum maps is in memory at a time.

use crate::error::{DumpError, Result};
use crate::report::{Finding, Reporter};
use crate::snapshot::layout::{checksum_collections, checksum_path};
use crate::snapshot::ChecksumMap;
use std::io::ErrorKind;
use std::path::Path;

/// Counts over a whole diff run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub collections: u64,
    pub identical: u64,
    pub missing_collections: u64,
    pub missing_documents: u64,
    pub mismatched_documents: u64,
}

impl DiffSummary {
    pub fn is_clean(&self) -> bool {
        self.missing_collections == 0 && self.missing_documents == 0 && self.mismatched_documents == 0
    }
}

/// Diff every collection of `left` against `right`.
///
/// Collections are taken from the checksum files of `left`, in name order.
/// For each, every left id is looked up on the right: a missing id gives a
/// [`Finding::MissingDocument`], a different digest a
/// [`Finding::DocumentMismatch`], and a collection with neither gives
/// [`Finding::CollectionIdentical`].
///
/// # Arguments
///
/// * `left` - Reference snapshot directory
/// * `right` - Snapshot directory compared against it
/// * `reporter` - Receives findings and progress
///
/// # Returns
///
/// Counts over the whole run; [`DiffSummary::is_clean`] tells whether any
/// difference was found.
///
/// # Errors
///
/// Returns error if `left` can't be listed or a checksum file exists but can't
/// be read or parsed. A checksum file missing on the right is a
/// [`Finding::MissingCollection`], not an error.
pub fn diff_snapshots(left: &Path, right: &Path, reporter: &mut dyn Reporter) -> Result<DiffSummary> {
    let mut summary = DiffSummary::default();

    for collection in checksum_collections(left)? {
        reporter.status(&format!("Processing {collection}..."));
        summary.collections += 1;
        diff_collection(left, right, &collection, reporter, &mut summary)?;
    }

    Ok(summary)
}

/// Diff a single collection present on the left.
///
/// # Errors
///
/// See [`diff_snapshots`].
pub fn diff_collection(
    left: &Path,
    right: &Path,
    collection: &str,
    reporter: &mut dyn Reporter,
    summary: &mut DiffSummary,
) -> Result<()> {
    let left_map = ChecksumMap::load(&checksum_path(left, collection))?;

    let right_map = match ChecksumMap::load(&checksum_path(right, collection)) {
        Ok(map) => map,
        Err(DumpError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            summary.missing_collections += 1;
            reporter.finding(Finding::MissingCollection {
                collection: collection.to_owned(),
            });
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    reporter.begin(collection, Some(left_map.len() as u64));
    let mut clean = true;
    for (id, digest) in left_map.iter() {
        match right_map.get(id) {
            None => {
                clean = false;
                summary.missing_documents += 1;
                reporter.finding(Finding::MissingDocument {
                    collection: collection.to_owned(),
                    id: id.to_owned(),
                });
            }
            Some(other) if other != digest => {
                clean = false;
                summary.mismatched_documents += 1;
                reporter.finding(Finding::DocumentMismatch {
                    collection: collection.to_owned(),
                    id: id.to_owned(),
                });
            }
            Some(_) => {}
        }
        reporter.advance(1);
    }
    reporter.finish();

    if clean {
        summary.identical += 1;
        reporter.finding(Finding::CollectionIdentical {
            collection: collection.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_checksums(dir: &Path, collection: &str, entries: &[(&str, &str)]) {
        let body = entries
            .iter()
            .map(|(id, digest)| format!("\"{id}\": \"{digest}\""))
            .collect::<Vec<_>>()
            .join(",\n");
        fs::write(checksum_path(dir, collection), format!("{{\n{body}\n}}\n")).unwrap();
    }

    #[test]
    fn test_mismatch_only_for_changed_document() {
        let left = TempDir::new().unwrap();
        let right = TempDir::new().unwrap();
        write_checksums(left.path(), "c", &[("a", "h1"), ("b", "h2")]);
        write_checksums(right.path(), "c", &[("a", "h1"), ("b", "h3")]);

        let mut findings: Vec<Finding> = Vec::new();
        let summary = diff_snapshots(left.path(), right.path(), &mut findings).unwrap();

        assert_eq!(
            findings,
            [Finding::DocumentMismatch {
                collection: "c".to_owned(),
                id: "b".to_owned()
            }]
        );
        assert_eq!(summary.mismatched_documents, 1);
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_missing_collection_reported_once() {
        let left = TempDir::new().unwrap();
        let right = TempDir::new().unwrap();
        write_checksums(left.path(), "orders", &[("a", "h1"), ("b", "h2")]);

        let mut findings: Vec<Finding> = Vec::new();
        diff_snapshots(left.path(), right.path(), &mut findings).unwrap();

        assert_eq!(
            findings,
            [Finding::MissingCollection {
                collection: "orders".to_owned()
            }]
        );
    }

    #[test]
    fn test_missing_documents_follow_left_order() {
        let left = TempDir::new().unwrap();
        let right = TempDir::new().unwrap();
        write_checksums(left.path(), "c", &[("z", "1"), ("a", "2"), ("m", "3")]);
        write_checksums(right.path(), "c", &[("a", "2"), ("extra", "9")]);

        let mut findings: Vec<Finding> = Vec::new();
        diff_snapshots(left.path(), right.path(), &mut findings).unwrap();

        let missing: Vec<&str> = findings
            .iter()
            .filter_map(|f| match f {
                Finding::MissingDocument { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(missing, ["z", "m"]);
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn test_right_only_collection_ignored() {
        let left = TempDir::new().unwrap();
        let right = TempDir::new().unwrap();
        write_checksums(left.path(), "a", &[("1", "x")]);
        write_checksums(right.path(), "a", &[("1", "x")]);
        write_checksums(right.path(), "b", &[("1", "x")]);

        let mut findings: Vec<Finding> = Vec::new();
        let summary = diff_snapshots(left.path(), right.path(), &mut findings).unwrap();

        assert_eq!(summary.collections, 1);
        assert!(summary.is_clean());
        assert_eq!(
            findings,
            [Finding::CollectionIdentical {
                collection: "a".to_owned()
            }]
        );
    }

    #[test]
    fn test_corrupt_right_file_is_an_error() {
        let left = TempDir::new().unwrap();
        let right = TempDir::new().unwrap();
        write_checksums(left.path(), "c", &[("1", "x")]);
        fs::write(checksum_path(right.path(), "c"), "{\n\"1\": \"x\",\n").unwrap();

        let result = diff_snapshots(left.path(), right.path(), &mut Vec::<Finding>::new());
        assert!(matches!(result, Err(DumpError::Snapshot(_))));
    }
}
