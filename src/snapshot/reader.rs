//! Reading snapshot files back.
//!
//! [`EntryReader`] walks a file produced by the snapshot writer one line at a
//! time, so memory stays bounded by the largest single document. It is the one
//! place that knows the line layout; the duplicate scanner and the verifier
//! both consume it.
//!
//! [`ChecksumMap`] loads a whole checksum file for random access, which the
//! differ needs on the right-hand side. It parses the file as regular JSON and
//! does not depend on the line layout.

use crate::error::{DumpError, Result, ResultExt as _};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One `"id": value` line, with the value kept as the exact text written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub id: String,
    pub raw: String,
}

impl RawEntry {
    /// Parse the value text.
    ///
    /// # Errors
    ///
    /// Returns [`DumpError::Snapshot`] if the text is not valid JSON.
    pub fn value(&self) -> Result<Value> {
        serde_json::from_str(&self.raw)
            .map_err(|e| DumpError::Snapshot(format!("entry {}: {e}", self.id)))
    }

    /// The value as a string, for checksum files.
    ///
    /// # Errors
    ///
    /// Returns [`DumpError::Snapshot`] if the value is not a JSON string.
    pub fn string_value(&self) -> Result<String> {
        match self.value()? {
            Value::String(s) => Ok(s),
            other => Err(DumpError::Snapshot(format!(
                "entry {}: expected a string, found {other}",
                self.id
            ))),
        }
    }
}

/// Lazy iterator over the entries of a snapshot file.
///
/// The first line (the opening brace) is skipped. Iteration stops at the first
/// line that does not start with a JSON string followed by `:` (the closing
/// brace, or the blank line of an empty object) or at end of file.
pub struct EntryReader<R> {
    lines: std::io::Lines<R>,
    line_no: u64,
    done: bool,
}

impl EntryReader<BufReader<File>> {
    /// # Errors
    ///
    /// Returns error if the file can't be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open snapshot file {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> EntryReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            done: false,
        }
    }

    fn next_line(&mut self) -> Option<std::io::Result<String>> {
        self.line_no += 1;
        self.lines.next()
    }
}

impl<R: BufRead> Iterator for EntryReader<R> {
    type Item = Result<RawEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.line_no == 0 {
            match self.next_line() {
                Some(Ok(header)) => {
                    if header.trim() != "{" {
                        log::debug!("unexpected snapshot header line: {header:?}");
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }

        let line = match self.next_line() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                self.done = true;
                return Some(Err(e.into()));
            }
            None => {
                self.done = true;
                return None;
            }
        };

        match split_entry(&line) {
            Some((id, raw)) => Some(Ok(RawEntry {
                id,
                raw: raw.to_owned(),
            })),
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// Split `"id": value,` into the decoded id and the value text.
fn split_entry(line: &str) -> Option<(String, &str)> {
    let line = line.trim();
    let line = line.strip_suffix(',').unwrap_or(line);
    if !line.starts_with('"') {
        return None;
    }

    let mut keys = serde_json::Deserializer::from_str(line).into_iter::<String>();
    let id = keys.next()?.ok()?;
    let rest = line.get(keys.byte_offset()..)?.trim_start();
    let raw = rest.strip_prefix(':')?.trim();
    (!raw.is_empty()).then_some((id, raw))
}

/// A whole checksum file, id -> digest, in file order.
#[derive(Debug, Clone, Default)]
pub struct ChecksumMap {
    entries: Map<String, Value>,
}

impl ChecksumMap {
    /// Load and validate a checksum file.
    ///
    /// # Errors
    ///
    /// Returns [`DumpError::Io`] if the file can't be read (including when it
    /// does not exist) and [`DumpError::Snapshot`] if it is not a JSON object of
    /// strings.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let value: Value = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| DumpError::Snapshot(format!("{}: {e}", path.display())))?;

        let Value::Object(entries) = value else {
            return Err(DumpError::Snapshot(format!(
                "{}: expected a JSON object",
                path.display()
            )));
        };

        if let Some((id, _)) = entries.iter().find(|(_, digest)| !digest.is_string()) {
            return Err(DumpError::Snapshot(format!(
                "{}: digest of {id} is not a string",
                path.display()
            )));
        }

        Ok(Self { entries })
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).and_then(Value::as_str)
    }

    /// Entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries
            .iter()
            .filter_map(|(id, digest)| digest.as_str().map(|d| (id.as_str(), d)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
