//! Near-duplicate detection over one snapshot.
//!
//! Two documents are duplicates when their canonical forms hash the same after
//! removing a set of excluded fields (timestamps, event ids and the like). The
//! scanner walks every data file of the snapshot with [`EntryReader`], so only
//! the current document and the hash -> first occurrence map are in memory.
//!
//! The scan is advisory: nothing is rewritten.

use crate::error::{DumpError, Result};
use crate::report::{Finding, Reporter};
use crate::snapshot::layout::{data_collections, data_path};
use crate::snapshot::{EntryReader, RawEntry, document_digest};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Fields ignored unless the caller opts out of the defaults.
pub const DEFAULT_EXCLUSIONS: [&str; 3] = ["event.id", "event.created_at", "event.updated_at"];

/// A dotted path to a field, e.g. `event.created_at`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExclusionRule {
    segments: Vec<String>,
}

impl ExclusionRule {
    /// # Errors
    ///
    /// Returns [`DumpError::Config`] for an empty path or an empty segment
    /// (`a..b`, `.a`).
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<String> = path.trim().split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return Err(DumpError::Config(format!("invalid field path {path:?}")));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl FromStr for ExclusionRule {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Remove the field at `rule` from `document`.
///
/// Descends through nested objects; if any segment is missing or the value on
/// the way is not an object, the document comes back unchanged.
///
/// # Example
///
/// ```
/// use esdump::duplicates::{ExclusionRule, remove_path};
/// use serde_json::json;
///
/// let rule = ExclusionRule::parse("event.id").unwrap();
/// let doc = remove_path(json!({"event": {"id": 1, "kind": "x"}}), &rule);
/// assert_eq!(doc, json!({"event": {"kind": "x"}}));
/// ```
pub fn remove_path(mut document: Value, rule: &ExclusionRule) -> Value {
    remove_segments(&mut document, &rule.segments);
    document
}

fn remove_segments(value: &mut Value, segments: &[String]) {
    let Value::Object(map) = value else {
        return;
    };
    match segments {
        [] => {}
        [last] => {
            map.shift_remove(last);
        }
        [head, rest @ ..] => {
            if let Some(child) = map.get_mut(head) {
                remove_segments(child, rest);
            }
        }
    }
}

/// The effective set of excluded fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
    rules: BTreeSet<ExclusionRule>,
}

impl Exclusions {
    /// No exclusions: documents are compared as stored.
    pub fn none() -> Self {
        Self::default()
    }

    /// [`DEFAULT_EXCLUSIONS`].
    pub fn defaults() -> Self {
        let rules = DEFAULT_EXCLUSIONS
            .iter()
            .map(|path| ExclusionRule {
                segments: path.split('.').map(str::to_owned).collect(),
            })
            .collect();
        Self { rules }
    }

    #[must_use]
    pub fn with(mut self, extra: impl IntoIterator<Item = ExclusionRule>) -> Self {
        self.rules.extend(extra);
        self
    }

    pub fn rules(&self) -> impl Iterator<Item = &ExclusionRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Strip every excluded field from an owned copy of the document.
    pub fn apply(&self, document: Value) -> Value {
        self.rules
            .iter()
            .fold(document, |doc, rule| remove_path(doc, rule))
    }
}

/// Counts over a whole scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub collections: u64,
    pub documents: u64,
    pub duplicates: u64,
    pub unreadable: u64,
}

/// Running hash -> first occurrence map shared by every collection of a scan.
#[derive(Debug, Default)]
pub struct DuplicateScanner {
    exclusions: Exclusions,
    seen: HashMap<String, (String, String)>,
    summary: ScanSummary,
}

impl DuplicateScanner {
    pub fn new(exclusions: Exclusions) -> Self {
        Self {
            exclusions,
            seen: HashMap::new(),
            summary: ScanSummary::default(),
        }
    }

    /// Check one document against everything seen so far.
    ///
    /// Returns the finding when the document duplicates an earlier one;
    /// otherwise it becomes the first occurrence of its content.
    ///
    /// # Errors
    ///
    /// Returns [`DumpError::Serialization`] if the stripped document can't be
    /// rendered.
    pub fn observe(&mut self, collection: &str, id: &str, document: Value) -> Result<Option<Finding>> {
        let stripped = self.exclusions.apply(document);
        let digest = document_digest(&stripped)?;
        self.summary.documents += 1;

        if let Some((first_collection, first_id)) = self.seen.get(&digest) {
            self.summary.duplicates += 1;
            return Ok(Some(Finding::Duplicate {
                id: id.to_owned(),
                collection: collection.to_owned(),
                first_id: first_id.clone(),
                first_collection: first_collection.clone(),
            }));
        }

        self.seen
            .insert(digest, (collection.to_owned(), id.to_owned()));
        Ok(None)
    }

    /// Feed every entry of one collection's data file.
    ///
    /// Entries that fail to parse are reported through `reporter.error` and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns error if the file can't be opened or read.
    pub fn scan_collection<I>(&mut self, collection: &str, entries: I, reporter: &mut dyn Reporter) -> Result<()>
    where
        I: IntoIterator<Item = Result<RawEntry>>,
    {
        self.summary.collections += 1;
        for entry in entries {
            let entry = entry?;
            let document = match entry.value() {
                Ok(document) => document,
                Err(e) => {
                    self.summary.unreadable += 1;
                    reporter.error(&format!("{collection}: skipping {}: {e}", entry.id));
                    continue;
                }
            };
            if let Some(finding) = self.observe(collection, &entry.id, document)? {
                reporter.finding(finding);
            }
            reporter.advance(1);
        }
        Ok(())
    }

    pub fn summary(&self) -> ScanSummary {
        self.summary
    }
}

/// Scan every data file in `dir` for duplicates, in file name order.
///
/// The first document with a given content is remembered; every later one
/// with the same content (after `exclusions` are stripped) is reported as a
/// [`Finding::Duplicate`] naming both. Entries that are not valid JSON are
/// reported through [`Reporter::error`] and skipped.
///
/// # Arguments
///
/// * `dir` - Snapshot directory
/// * `exclusions` - Fields ignored when comparing content
/// * `reporter` - Receives findings, errors and progress
///
/// # Returns
///
/// Document, duplicate and unreadable-entry counts.
///
/// # Errors
///
/// Returns error if the directory can't be listed or a data file can't be read.
///
/// # Example
///
/// ```no_run
/// use esdump::duplicates::{Exclusions, scan_duplicates};
/// use esdump::report::Finding;
/// use std::path::Path;
///
/// # fn example() -> esdump::error::Result<()> {
/// let mut findings: Vec<Finding> = Vec::new();
/// let summary = scan_duplicates(Path::new("snapshots/today"), Exclusions::defaults(), &mut findings)?;
/// println!("{} duplicates", summary.duplicates);
/// # Ok(())
/// # }
/// ```
pub fn scan_duplicates(dir: &Path, exclusions: Exclusions, reporter: &mut dyn Reporter) -> Result<ScanSummary> {
    log::debug!(
        "excluded fields: {}",
        exclusions
            .rules()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut scanner = DuplicateScanner::new(exclusions);
    for collection in data_collections(dir)? {
        reporter.status(&format!("Processing {collection}..."));
        let entries = EntryReader::open(&data_path(dir, &collection))?;
        reporter.begin(&collection, None);
        let scanned = scanner.scan_collection(&collection, entries, reporter);
        reporter.finish();
        scanned?;
    }
    Ok(scanner.summary())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(path: &str) -> ExclusionRule {
        ExclusionRule::parse(path).unwrap()
    }

    #[test]
    fn test_remove_nested_path() {
        let doc = json!({"event": {"id": 1, "kind": "x"}, "id": 7});
        assert_eq!(
            remove_path(doc, &rule("event.id")),
            json!({"event": {"kind": "x"}, "id": 7})
        );
    }

    #[test]
    fn test_remove_missing_path_is_noop() {
        let doc = json!({"event": "flat", "a": {"b": 1}});
        let same = doc.clone();
        let doc = remove_path(doc, &rule("event.id"));
        let doc = remove_path(doc, &rule("a.c.d"));
        let doc = remove_path(doc, &rule("zzz"));
        assert_eq!(doc, same);
    }

    #[test]
    fn test_remove_keeps_remaining_key_order() {
        let doc: Value = serde_json::from_str(r#"{"z":1,"drop":2,"a":3}"#).unwrap();
        let doc = remove_path(doc, &rule("drop"));
        assert_eq!(serde_json::to_string(&doc).unwrap(), r#"{"z":1,"a":3}"#);
    }

    #[test]
    fn test_rule_parsing() {
        assert_eq!(rule("a.b.c").segments(), ["a", "b", "c"]);
        assert_eq!(rule("a.b").to_string(), "a.b");
        assert!(ExclusionRule::parse("").is_err());
        assert!(ExclusionRule::parse("a..b").is_err());
    }

    #[test]
    fn test_defaults_plus_extra() {
        let exclusions = Exclusions::defaults().with([rule("host.name"), rule("event.id")]);
        assert_eq!(exclusions.len(), 4);
    }

    #[test]
    fn test_observe_flags_second_occurrence() {
        let mut scanner = DuplicateScanner::new(Exclusions::defaults());
        let first = scanner
            .observe("a", "1", json!({"msg": "hi", "event": {"id": "x"}}))
            .unwrap();
        let second = scanner
            .observe("b", "2", json!({"msg": "hi", "event": {"id": "y"}}))
            .unwrap();

        assert!(first.is_none());
        assert_eq!(
            second,
            Some(Finding::Duplicate {
                id: "2".to_owned(),
                collection: "b".to_owned(),
                first_id: "1".to_owned(),
                first_collection: "a".to_owned(),
            })
        );
        assert_eq!(scanner.summary().duplicates, 1);
    }

    #[test]
    fn test_observe_without_exclusions() {
        let mut scanner = DuplicateScanner::new(Exclusions::none());
        scanner
            .observe("a", "1", json!({"msg": "hi", "event": {"id": "x"}}))
            .unwrap();
        let second = scanner
            .observe("a", "2", json!({"msg": "hi", "event": {"id": "y"}}))
            .unwrap();
        assert!(second.is_none());
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
    fn test_progress_closed_on_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bytes = b"{\n\"a\": {\"n\":1},\n\"b\": \"".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b"\"\n}\n");
        std::fs::write(data_path(dir.path(), "c"), bytes).unwrap();

        let mut progress = Progress::default();
        let result = scan_duplicates(dir.path(), Exclusions::none(), &mut progress);

        assert!(result.is_err());
        assert_eq!(progress.begun, 1);
        assert_eq!(progress.finished, 1);
    }

    #[test]
    fn test_unreadable_entry_is_skipped() {
        let entries = vec![
            Ok(RawEntry {
                id: "bad".to_owned(),
                raw: "{not json".to_owned(),
            }),
            Ok(RawEntry {
                id: "good".to_owned(),
                raw: "{}".to_owned(),
            }),
        ];
        let mut scanner = DuplicateScanner::new(Exclusions::none());
        let mut findings: Vec<Finding> = Vec::new();
        scanner.scan_collection("c", entries, &mut findings).unwrap();

        let summary = scanner.summary();
        assert_eq!(summary.unreadable, 1);
        assert_eq!(summary.documents, 1);
        assert!(findings.is_empty());
    }
}
