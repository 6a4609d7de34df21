//! Check a snapshot against itself.
//!
//! Each data file is walked in lockstep with its checksum file: both must list
//! the same ids in the same order, and each recorded digest must match the
//! bytes stored in the data file. Both files are streamed, so memory stays
//! bounded by one entry of each.

use crate::error::Result;
use crate::report::{Finding, Reporter};
use crate::snapshot::layout::{checksum_path, data_collections, data_path};
use crate::snapshot::{EntryReader, RawEntry, digest_hex};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifySummary {
    pub collections: u64,
    pub verified: u64,
    pub without_checksum: u64,
    pub failed: u64,
}

impl VerifySummary {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Verify every collection of the snapshot in `dir`.
///
/// # Arguments
///
/// * `dir` - Snapshot directory
/// * `reporter` - Receives one or more findings per collection
///
/// # Returns
///
/// Per-collection counts. Collections without a checksum file are reported
/// and counted in `without_checksum` but do not fail the run.
///
/// # Errors
///
/// Returns error if the directory can't be listed or a file can't be read or
/// is malformed.
pub fn verify_snapshot(dir: &Path, reporter: &mut dyn Reporter) -> Result<VerifySummary> {
    let mut summary = VerifySummary::default();

    for collection in data_collections(dir)? {
        summary.collections += 1;
        reporter.status(&format!("Verifying {collection}..."));

        let checksums = checksum_path(dir, &collection);
        if !checksums.exists() {
            summary.without_checksum += 1;
            reporter.finding(Finding::ChecksumFileMissing { collection });
            continue;
        }

        let data = EntryReader::open(&data_path(dir, &collection))?;
        let recorded = EntryReader::open(&checksums)?;
        reporter.begin(&collection, None);
        let clean = verify_collection(&collection, data, recorded, reporter);
        reporter.finish();
        let clean = clean?;

        if clean {
            summary.verified += 1;
        } else {
            summary.failed += 1;
        }
    }

    Ok(summary)
}

/// Walk one data/checksum pair. Returns whether the pair is consistent.
///
/// The walk stops at the first ordering problem; digests past that point
/// can't be paired up reliably.
///
/// # Errors
///
/// Returns error if either file can't be read or a checksum entry is not a
/// string.
pub fn verify_collection<D, C>(collection: &str, data: D, checksums: C, reporter: &mut dyn Reporter) -> Result<bool>
where
    D: IntoIterator<Item = Result<RawEntry>>,
    C: IntoIterator<Item = Result<RawEntry>>,
{
    let mut data = data.into_iter();
    let mut checksums = checksums.into_iter();
    let mut position: u64 = 0;
    let mut clean = true;

    loop {
        match (data.next(), checksums.next()) {
            (Some(entry), Some(recorded)) => {
                let (entry, recorded) = (entry?, recorded?);
                if entry.id != recorded.id {
                    reporter.finding(Finding::OrderMismatch {
                        collection: collection.to_owned(),
                        position,
                        data_id: entry.id,
                        checksum_id: recorded.id,
                    });
                    return Ok(false);
                }
                if digest_hex(entry.raw.as_bytes()) != recorded.string_value()? {
                    clean = false;
                    reporter.finding(Finding::ChecksumMismatch {
                        collection: collection.to_owned(),
                        id: entry.id,
                    });
                }
                position += 1;
                reporter.advance(1);
            }
            (None, None) => break,
            (Some(first), None) => {
                first?;
                let extra = 1 + count_remaining(&mut data)?;
                reporter.finding(Finding::EntryCountMismatch {
                    collection: collection.to_owned(),
                    data_entries: position + extra,
                    checksum_entries: position,
                });
                return Ok(false);
            }
            (None, Some(first)) => {
                first?;
                let extra = 1 + count_remaining(&mut checksums)?;
                reporter.finding(Finding::EntryCountMismatch {
                    collection: collection.to_owned(),
                    data_entries: position,
                    checksum_entries: position + extra,
                });
                return Ok(false);
            }
        }
    }

    if clean {
        reporter.finding(Finding::CollectionVerified {
            collection: collection.to_owned(),
            documents: position,
        });
    }
    Ok(clean)
}

fn count_remaining<I, T>(entries: &mut I) -> Result<u64>
where
    I: Iterator<Item = Result<T>>,
{
    let mut count = 0;
    for entry in entries {
        entry?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::snapshot::write_snapshot;
    use serde_json::json;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn export(dir: &Path, collection: &str, docs: Vec<Document>) {
        write_snapshot(
            docs,
            File::create(data_path(dir, collection)).unwrap(),
            Some(File::create(checksum_path(dir, collection)).unwrap()),
        )
        .unwrap();
    }

    fn docs() -> Vec<Document> {
        vec![
            Document::new("a", json!({"n": 1})),
            Document::new("b", json!({"n": 2})),
        ]
    }

    #[test]
    fn test_fresh_export_verifies() {
        let dir = TempDir::new().unwrap();
        export(dir.path(), "c", docs());

        let mut findings: Vec<Finding> = Vec::new();
        let summary = verify_snapshot(dir.path(), &mut findings).unwrap();

        assert!(summary.is_clean());
        assert_eq!(
            findings,
            [Finding::CollectionVerified {
                collection: "c".to_owned(),
                documents: 2
            }]
        );
    }

    #[test]
    fn test_tampered_document_detected() {
        let dir = TempDir::new().unwrap();
        export(dir.path(), "c", docs());
        let path = data_path(dir.path(), "c");
        let tampered = fs::read_to_string(&path).unwrap().replace("\"n\":2", "\"n\":3");
        fs::write(&path, tampered).unwrap();

        let mut findings: Vec<Finding> = Vec::new();
        let summary = verify_snapshot(dir.path(), &mut findings).unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(
            findings,
            [Finding::ChecksumMismatch {
                collection: "c".to_owned(),
                id: "b".to_owned()
            }]
        );
    }

    #[test]
    fn test_reordered_checksums_detected() {
        let dir = TempDir::new().unwrap();
        export(dir.path(), "c", docs());
        let path = checksum_path(dir.path(), "c");
        let lines: Vec<String> = fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| l.trim_end_matches(',').to_owned())
            .collect();
        fs::write(
            &path,
            format!("{{\n{},\n{}\n}}\n", lines[2], lines[1]),
        )
        .unwrap();

        let mut findings: Vec<Finding> = Vec::new();
        verify_snapshot(dir.path(), &mut findings).unwrap();

        assert!(matches!(
            &findings[..],
            [Finding::OrderMismatch { position: 0, data_id, checksum_id, .. }]
                if data_id == "a" && checksum_id == "b"
        ));
    }

    #[test]
    fn test_missing_checksum_entries_detected() {
        let dir = TempDir::new().unwrap();
        export(dir.path(), "c", docs());
        export(dir.path(), "short", vec![Document::new("a", json!({"n": 1}))]);
        fs::copy(
            checksum_path(dir.path(), "short"),
            checksum_path(dir.path(), "c"),
        )
        .unwrap();

        let mut findings: Vec<Finding> = Vec::new();
        verify_snapshot(dir.path(), &mut findings).unwrap();

        assert!(findings.contains(&Finding::EntryCountMismatch {
            collection: "c".to_owned(),
            data_entries: 2,
            checksum_entries: 1,
        }));
    }

    #[derive(Default)]
    struct Progress {
        begun: u32,
        finished: u32,
    }

    impl Reporter for Progress {
        fn finding(&mut self, _finding: Finding) {}

        fn begin(&mut self, _label: &str, _total: Option<u64>) {
            self.begun += 1;
        }

        fn finish(&mut self) {
            self.finished += 1;
        }
    }

    #[test]
    fn test_progress_closed_on_malformed_checksum() {
        let dir = TempDir::new().unwrap();
        export(dir.path(), "c", docs());
        fs::write(checksum_path(dir.path(), "c"), "{\n\"a\": 5\n}\n").unwrap();

        let mut progress = Progress::default();
        let result = verify_snapshot(dir.path(), &mut progress);

        assert!(result.is_err());
        assert_eq!(progress.begun, 1);
        assert_eq!(progress.finished, 1);
    }

    #[test]
    fn test_data_without_checksum_file() {
        let dir = TempDir::new().unwrap();
        write_snapshot(
            docs(),
            File::create(data_path(dir.path(), "c")).unwrap(),
            None::<File>,
        )
        .unwrap();

        let mut findings: Vec<Finding> = Vec::new();
        let summary = verify_snapshot(dir.path(), &mut findings).unwrap();

        assert_eq!(summary.without_checksum, 1);
        assert!(summary.is_clean());
        assert_eq!(
            findings,
            [Finding::ChecksumFileMissing {
                collection: "c".to_owned()
            }]
        );
    }
}
