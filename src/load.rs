//! Bulk-load newline-delimited JSON files into a collection.
//!
//! Each file is read line by line and sent in chunks, so memory stays bounded
//! by one chunk. A line that is not JSON is reported and skipped; a document
//! the server rejects is reported and the load carries on.

use crate::config::LoadOptions;
use crate::error::{Result, ResultExt as _};
use crate::report::Reporter;
use crate::search::{BulkItem, SearchBackend};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub files: u64,
    pub ingested: u64,
    pub rejected: u64,
    pub unreadable: u64,
}

impl LoadSummary {
    pub fn is_clean(&self) -> bool {
        self.rejected == 0 && self.unreadable == 0
    }
}

/// Load every file in `files` into `target`, in order.
///
/// # Arguments
///
/// * `backend` - Cluster receiving the documents
/// * `target` - Index or data stream name
/// * `files` - NDJSON files, one document per line
/// * `options` - Chunk size and optional ingest pipeline
/// * `reporter` - Receives rejected items and unreadable lines as errors
///
/// # Returns
///
/// Ingested, rejected and unreadable counts across all files.
///
/// # Errors
///
/// Returns error if a file can't be read or a bulk request fails as a whole.
///
/// # Example
///
/// ```no_run
/// use esdump::config::{ConnectionConfig, LoadOptions};
/// use esdump::load::load_files;
/// use esdump::report::NullReporter;
/// use esdump::search::ElasticClient;
///
/// # fn example() -> esdump::error::Result<()> {
/// let client = ElasticClient::connect(&ConnectionConfig::default())?;
/// let summary = load_files(&client, "orders", &["orders.ndjson"], &LoadOptions::default(), &mut NullReporter)?;
/// println!("{} documents loaded", summary.ingested);
/// # Ok(())
/// # }
/// ```
pub fn load_files<B, P>(
    backend: &B,
    target: &str,
    files: &[P],
    options: &LoadOptions,
    reporter: &mut dyn Reporter,
) -> Result<LoadSummary>
where
    B: SearchBackend + ?Sized,
    P: AsRef<Path>,
{
    let mut summary = LoadSummary::default();
    for file in files {
        let file = file.as_ref();
        reporter.status(&format!("Loading {} into {target}...", file.display()));
        let lines = count_lines(file)?;
        let reader = BufReader::new(
            File::open(file).with_context(|| format!("Failed to open {}", file.display()))?,
        );
        reporter.begin(&file.display().to_string(), Some(lines));
        let loaded = load_reader(backend, target, reader, options, reporter, &mut summary);
        reporter.finish();
        loaded.with_context(|| format!("Failed to load {}", file.display()))?;
        summary.files += 1;
    }
    log::info!(
        "loaded {} documents into {target} ({} rejected, {} unreadable)",
        summary.ingested,
        summary.rejected,
        summary.unreadable
    );
    Ok(summary)
}

/// Load one NDJSON stream into `target`, adding to `summary`.
///
/// # Errors
///
/// Returns error if the stream can't be read or a bulk request fails as a
/// whole.
pub fn load_reader<B, R>(
    backend: &B,
    target: &str,
    reader: R,
    options: &LoadOptions,
    reporter: &mut dyn Reporter,
    summary: &mut LoadSummary,
) -> Result<()>
where
    B: SearchBackend + ?Sized,
    R: BufRead,
{
    let chunk_size = options.chunk_size.max(1);
    let mut batch: Vec<BulkItem> = Vec::with_capacity(chunk_size);

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            reporter.advance(1);
            continue;
        }
        match serde_json::from_str::<Value>(&line) {
            Ok(document) => batch.push(BulkItem {
                target: target.to_owned(),
                pipeline: options.pipeline.clone(),
                document,
            }),
            Err(e) => {
                summary.unreadable += 1;
                reporter.error(&format!("Error: line {}: {e}", number + 1));
                reporter.advance(1);
            }
        }
        if batch.len() >= chunk_size {
            send(backend, &mut batch, reporter, summary)?;
        }
    }
    if !batch.is_empty() {
        send(backend, &mut batch, reporter, summary)?;
    }
    Ok(())
}

fn send<B>(backend: &B, batch: &mut Vec<BulkItem>, reporter: &mut dyn Reporter, summary: &mut LoadSummary) -> Result<()>
where
    B: SearchBackend + ?Sized,
{
    log::debug!("sending bulk request of {} documents", batch.len());
    let outcomes = backend.bulk_ingest(batch)?;
    for outcome in &outcomes {
        if outcome.success {
            summary.ingested += 1;
        } else {
            summary.rejected += 1;
            reporter.error(&format!("Error: {}", outcome.detail));
        }
    }
    reporter.advance(batch.len() as u64);
    batch.clear();
    Ok(())
}

fn count_lines(path: &Path) -> Result<u64> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
    );
    let mut count = 0;
    for line in reader.lines() {
        line?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DumpError;
    use crate::report::Finding;
    use crate::search::{BulkOutcome, CollectionKind, MemoryBackend, Page};
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Errors(Vec<String>);

    impl Reporter for Errors {
        fn finding(&mut self, _finding: Finding) {}

        fn error(&mut self, message: &str) {
            self.0.push(message.to_owned());
        }
    }

    #[test]
    fn test_chunks_and_pipeline() {
        let backend = MemoryBackend::new();
        let options = LoadOptions {
            chunk_size: 2,
            pipeline: Some("enrich".to_owned()),
        };
        let input = "{\"a\":1}\n{\"a\":2}\n\n{\"a\":3}\n";
        let mut summary = LoadSummary::default();

        load_reader(&backend, "target", input.as_bytes(), &options, &mut Errors::default(), &mut summary).unwrap();

        assert_eq!(summary.ingested, 3);
        assert_eq!(backend.bulk_calls(), 2);
        let ingested = backend.ingested();
        assert_eq!(ingested.len(), 3);
        assert!(ingested.iter().all(|item| item.target == "target"));
        assert_eq!(ingested[0].pipeline.as_deref(), Some("enrich"));
        assert_eq!(ingested[2].document["a"], 3);
    }

    #[test]
    fn test_bad_line_is_skipped() {
        let backend = MemoryBackend::new();
        let mut errors = Errors::default();
        let mut summary = LoadSummary::default();

        load_reader(
            &backend,
            "t",
            "{\"ok\":true}\nnot json\n".as_bytes(),
            &LoadOptions::default(),
            &mut errors,
            &mut summary,
        )
        .unwrap();

        assert_eq!(summary.ingested, 1);
        assert_eq!(summary.unreadable, 1);
        assert_eq!(errors.0.len(), 1);
        assert!(errors.0[0].contains("line 2"));
    }

    #[test]
    fn test_rejected_documents_reported() {
        let backend = MemoryBackend::new().rejecting(|doc| {
            doc.get("bad").map(|_| "mapper_parsing_exception".to_owned())
        });
        let mut errors = Errors::default();
        let mut summary = LoadSummary::default();

        load_reader(
            &backend,
            "t",
            "{\"bad\":1}\n{\"good\":1}\n".as_bytes(),
            &LoadOptions::default(),
            &mut errors,
            &mut summary,
        )
        .unwrap();

        assert_eq!(summary.ingested, 1);
        assert_eq!(summary.rejected, 1);
        assert!(!summary.is_clean());
        assert_eq!(errors.0, ["Error: mapper_parsing_exception"]);
    }

    #[test]
    fn test_load_files_in_order() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("one.ndjson");
        let second = dir.path().join("two.ndjson");
        fs::write(&first, "{\"n\":1}\n").unwrap();
        fs::write(&second, "{\"n\":2}\n{\"n\":3}\n").unwrap();
        let backend = MemoryBackend::new();

        let summary = load_files(
            &backend,
            "t",
            &[first, second],
            &LoadOptions::default(),
            &mut Vec::<Finding>::new(),
        )
        .unwrap();

        assert_eq!(summary.files, 2);
        let order: Vec<_> = backend.ingested().iter().map(|i| i.document["n"].clone()).collect();
        assert_eq!(order, [1, 2, 3]);
    }

    struct RefusingBackend;

    impl SearchBackend for RefusingBackend {
        fn search(&self, collection: &str, _page_size: usize) -> Result<Page> {
            Err(DumpError::RemoteFetch(format!("no such index [{collection}]")))
        }

        fn advance(&self, _cursor: &str) -> Result<Page> {
            Err(DumpError::RemoteFetch("no cursor".to_owned()))
        }

        fn bulk_ingest(&self, _items: &[BulkItem]) -> Result<Vec<BulkOutcome>> {
            Err(DumpError::RemoteFetch("cluster unavailable".to_owned()))
        }

        fn list_collections(&self, _kind: CollectionKind) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
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
    fn test_failed_bulk_request_closes_progress() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("docs.ndjson");
        fs::write(&file, "{\"n\":1}\n").unwrap();
        let mut progress = Progress::default();

        let result = load_files(&RefusingBackend, "t", &[file], &LoadOptions::default(), &mut progress);

        assert!(matches!(result, Err(DumpError::RemoteFetch(_))));
        assert_eq!(progress.begun, 1);
        assert_eq!(progress.finished, 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = load_files(
            &MemoryBackend::new(),
            "t",
            &[dir.path().join("absent.ndjson")],
            &LoadOptions::default(),
            &mut Vec::<Finding>::new(),
        );
        assert!(result.is_err());
    }
}
