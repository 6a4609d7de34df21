//! File naming inside a snapshot directory.
//!
//! ```text
//! <dir>/
//!   orders.json            id -> document
//!   orders-checksum.json   id -> sha256 hex
//!   _manifest.json         run metadata
//! ```

use crate::error::{Result, ResultExt as _};
use std::path::{Path, PathBuf};

pub const DATA_SUFFIX: &str = ".json";
pub const CHECKSUM_SUFFIX: &str = "-checksum.json";
/// Index and data stream names can't start with `_`, so no collection's data
/// file lands here.
pub const MANIFEST_FILE: &str = "_manifest.json";

/// What a file in a snapshot directory holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotFile {
    Data(String),
    Checksum(String),
    Manifest,
}

impl SnapshotFile {
    /// Classify a file name; `None` for anything that is not part of a snapshot.
    pub fn classify(file_name: &str) -> Option<Self> {
        if file_name == MANIFEST_FILE {
            return Some(Self::Manifest);
        }
        if let Some(name) = file_name.strip_suffix(CHECKSUM_SUFFIX) {
            return (!name.is_empty()).then(|| Self::Checksum(name.to_owned()));
        }
        file_name
            .strip_suffix(DATA_SUFFIX)
            .filter(|name| !name.is_empty())
            .map(|name| Self::Data(name.to_owned()))
    }
}

pub fn data_path(dir: &Path, collection: &str) -> PathBuf {
    dir.join(format!("{collection}{DATA_SUFFIX}"))
}

pub fn checksum_path(dir: &Path, collection: &str) -> PathBuf {
    dir.join(format!("{collection}{CHECKSUM_SUFFIX}"))
}

pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

/// Collections with a data file in `dir`, sorted by name.
///
/// # Errors
///
/// Returns error if the directory can't be listed.
pub fn data_collections(dir: &Path) -> Result<Vec<String>> {
    collections(dir, |file| match file {
        SnapshotFile::Data(name) => Some(name),
        _ => None,
    })
}

/// Collections with a checksum file in `dir`, sorted by name.
///
/// # Errors
///
/// Returns error if the directory can't be listed.
pub fn checksum_collections(dir: &Path) -> Result<Vec<String>> {
    collections(dir, |file| match file {
        SnapshotFile::Checksum(name) => Some(name),
        _ => None,
    })
}

fn collections<F>(dir: &Path, pick: F) -> Result<Vec<String>>
where
    F: Fn(SnapshotFile) -> Option<String>,
{
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list snapshot directory {}", dir.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry
            .file_name()
            .to_str()
            .and_then(SnapshotFile::classify)
            .and_then(&pick)
        {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_classify() {
        assert_eq!(
            SnapshotFile::classify("orders.json"),
            Some(SnapshotFile::Data("orders".to_owned()))
        );
        assert_eq!(
            SnapshotFile::classify("orders-checksum.json"),
            Some(SnapshotFile::Checksum("orders".to_owned()))
        );
        assert_eq!(
            SnapshotFile::classify("_manifest.json"),
            Some(SnapshotFile::Manifest)
        );
        assert_eq!(
            SnapshotFile::classify("manifest.json"),
            Some(SnapshotFile::Data("manifest".to_owned()))
        );
        assert_eq!(SnapshotFile::classify("notes.txt"), None);
        assert_eq!(SnapshotFile::classify(".json"), None);
    }

    #[test]
    fn test_listing_is_sorted_and_split_by_kind() {
        let dir = TempDir::new().unwrap();
        for name in [
            "b.json",
            "a.json",
            "a-checksum.json",
            "_manifest.json",
            "readme.md",
        ] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        assert_eq!(data_collections(dir.path()).unwrap(), ["a", "b"]);
        assert_eq!(checksum_collections(dir.path()).unwrap(), ["a"]);
    }

    #[test]
    fn test_paths() {
        let dir = Path::new("/snap");
        assert_eq!(data_path(dir, "x"), Path::new("/snap/x.json"));
        assert_eq!(checksum_path(dir, "x"), Path::new("/snap/x-checksum.json"));
    }
}
