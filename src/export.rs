//! Export collections from the cluster into a snapshot directory.
//!
//! One collection at a time: open a paginated read, stream it through the
//! snapshot writer, record the result in the manifest. A collection whose
//! first page can't be fetched is skipped; one whose pagination breaks later
//! keeps what was written and is marked incomplete. Sibling collections are
//! unaffected either way.

use crate::config::ExportOptions;
use crate::error::{DumpError, Result, ResultExt as _};
use crate::fetcher::fetch;
use crate::report::Reporter;
use crate::search::{CollectionKind, SearchBackend};
use crate::snapshot::layout::{checksum_path, data_path};
use crate::snapshot::{CollectionRecord, FileRecord, SnapshotManifest, write_snapshot};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

/// What an export run did.
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub records: Vec<CollectionRecord>,
    /// Collections that produced no file, with the reason.
    pub skipped: Vec<(String, String)>,
}

impl ExportSummary {
    pub fn documents(&self) -> u64 {
        self.records.iter().map(|r| r.documents).sum()
    }

    pub fn incomplete(&self) -> impl Iterator<Item = &CollectionRecord> {
        self.records.iter().filter(|r| !r.complete)
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.incomplete().next().is_none()
    }
}

/// The collections to export: `requested` if any, otherwise everything of
/// `kind` the cluster lists.
///
/// # Errors
///
/// Returns error if the listing request fails.
pub fn resolve_collections<B>(backend: &B, kind: CollectionKind, requested: Vec<String>) -> Result<Vec<String>>
where
    B: SearchBackend + ?Sized,
{
    if !requested.is_empty() {
        return Ok(requested);
    }
    let names = backend
        .list_collections(kind)
        .with_context(|| format!("Failed to list every {kind}"))?;
    log::info!("found {} collections of kind {kind}", names.len());
    Ok(names)
}

/// Export `collections` into `target`.
///
/// Each collection is read page by page and written as `<name>.json` (plus
/// `<name>-checksum.json` unless disabled). Once every collection is done,
/// `_manifest.json` records what was written.
///
/// # Arguments
///
/// * `backend` - Cluster to read from
/// * `kind` - Recorded in the manifest for every collection
/// * `collections` - Names to export, in order
/// * `target` - Snapshot directory, created if missing
/// * `options` - Page size and which side files to write
/// * `reporter` - Receives status lines, errors and progress
///
/// # Returns
///
/// One record per written collection and the list of skipped ones;
/// [`ExportSummary::is_clean`] is false if anything was skipped or cut short.
///
/// # Errors
///
/// Returns error if the target directory or a file can't be created or
/// written. Fetch failures and unserializable documents only skip the
/// collection concerned.
pub fn export_collections<B>(
    backend: &B,
    kind: CollectionKind,
    collections: &[String],
    target: &Path,
    options: &ExportOptions,
    reporter: &mut dyn Reporter,
) -> Result<ExportSummary>
where
    B: SearchBackend + ?Sized,
{
    reporter.status(&format!("Creating target folder: {}", target.display()));
    fs::create_dir_all(target)
        .with_context(|| format!("Failed to create {}", target.display()))?;

    let mut summary = ExportSummary::default();
    for collection in collections {
        reporter.status(&format!("Processing: {collection}..."));
        match export_collection(backend, kind, collection, target, options, reporter) {
            Ok(record) => summary.records.push(record),
            Err(e) if e.is_recoverable() || matches!(e, DumpError::Serialization(_)) => {
                reporter.error(&format!("Error: {e}"));
                summary.skipped.push((collection.clone(), e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    if options.manifest {
        let path = SnapshotManifest::new(summary.records.clone()).save(target)?;
        log::info!("manifest written to {}", path.display());
    }

    Ok(summary)
}

/// Export one collection.
///
/// # Errors
///
/// [`DumpError::RemoteFetch`] when the first page can't be fetched (no file is
/// created), [`DumpError::Serialization`] when a document can't be rendered
/// (the data file is left truncated), I/O errors otherwise.
pub fn export_collection<B>(
    backend: &B,
    kind: CollectionKind,
    collection: &str,
    target: &Path,
    options: &ExportOptions,
    reporter: &mut dyn Reporter,
) -> Result<CollectionRecord>
where
    B: SearchBackend + ?Sized,
{
    let mut stream = fetch(backend, collection, options.page_size)?;

    let data_file = data_path(target, collection);
    let checksum_file = options.checksum.then(|| checksum_path(target, collection));

    let data = BufWriter::new(
        File::create(&data_file)
            .with_context(|| format!("Failed to create {}", data_file.display()))?,
    );
    let checksum = match &checksum_file {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => None,
    };

    reporter.begin(collection, stream.total());
    let written = write_snapshot(
        stream.by_ref().inspect(|_| reporter.advance(1)),
        data,
        checksum,
    );
    reporter.finish();
    let documents = written?;

    let complete = match stream.take_fault() {
        Some(fault) => {
            reporter.error(&format!(
                "Error: {collection} stopped after {documents} documents: {fault}"
            ));
            false
        }
        None => true,
    };
    log::info!("{collection}: wrote {documents} documents (complete: {complete})");

    Ok(CollectionRecord {
        name: collection.to_owned(),
        kind,
        documents,
        complete,
        data_file: FileRecord::describe(&data_file)?,
        checksum_file: checksum_file
            .as_deref()
            .map(FileRecord::describe)
            .transpose()?,
    })
}
