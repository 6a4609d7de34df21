use crate::terminal::TerminalReporter;
use anyhow::{Context as _, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use esdump::config::{
    ConnectionConfig, DEFAULT_CHUNK_SIZE, DEFAULT_HOST, DEFAULT_PAGE_SIZE, DEFAULT_USERNAME, ENV_API_KEY, ENV_HOST,
    ENV_PASSWORD, ENV_USERNAME, ExportOptions, LoadOptions,
};
use esdump::diff::diff_snapshots;
use esdump::duplicates::{ExclusionRule, Exclusions, scan_duplicates};
use esdump::export::{export_collections, resolve_collections};
use esdump::load::load_files;
use esdump::report::Reporter as _;
use esdump::search::{CollectionKind, ElasticClient};
use esdump::verify::verify_snapshot;
use secrecy::SecretString;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "esdump",
    version,
    about = "Export, reload, compare and de-duplicate Elasticsearch snapshots"
)]
pub struct Cli {
    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct ConnectionArgs {
    /// Cluster address; `http://` is assumed for localhost, `https://` otherwise
    #[arg(long, env = ENV_HOST, default_value = DEFAULT_HOST, global = true)]
    pub host: String,

    #[arg(long, env = ENV_USERNAME, default_value = DEFAULT_USERNAME, global = true)]
    pub username: String,

    #[arg(long, env = ENV_PASSWORD, hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Used when no password is given
    #[arg(long, env = ENV_API_KEY, hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Check the server certificate
    #[arg(long, global = true)]
    pub verify_certs: bool,
}

impl ConnectionArgs {
    pub fn into_config(self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host,
            username: Some(self.username),
            password: self.password.map(SecretString::from),
            api_key: self.api_key.map(SecretString::from),
            verify_certs: self.verify_certs,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export collections to a snapshot directory
    Dump {
        #[command(subcommand)]
        what: DumpCommand,
    },
    /// Bulk-load newline-delimited JSON files into a collection
    Load {
        /// Index or data stream receiving the documents
        #[arg(long)]
        target: String,

        /// Ingest pipeline applied to every document
        #[arg(long)]
        pipeline: Option<String>,

        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        #[arg(required = true)]
        data_files: Vec<PathBuf>,
    },
    /// Compare two snapshots by document checksum
    Compare {
        /// Reference snapshot; collections and ids only on the right are ignored
        left: PathBuf,
        right: PathBuf,
    },
    /// Offline analyses of a snapshot
    Analyze {
        #[command(subcommand)]
        what: AnalyzeCommand,
    },
    /// Check every data file of a snapshot against its checksum file
    Verify { dir: PathBuf },
}

#[derive(Subcommand)]
pub enum DumpCommand {
    /// Export indices (all of them unless --index is given)
    Index {
        #[arg(long = "index")]
        indices: Vec<String>,

        #[command(flatten)]
        output: DumpArgs,
    },
    /// Export data streams (all of them unless --data-stream is given)
    Datastream {
        #[arg(long = "data-stream")]
        data_streams: Vec<String>,

        #[command(flatten)]
        output: DumpArgs,
    },
}

#[derive(Args)]
pub struct DumpArgs {
    /// Documents per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub chunk_size: usize,

    /// Skip the `<name>-checksum.json` files
    #[arg(long)]
    pub no_checksum: bool,

    /// Skip `_manifest.json`
    #[arg(long)]
    pub no_manifest: bool,

    pub target_folder: PathBuf,
}

impl DumpArgs {
    fn options(&self) -> ExportOptions {
        ExportOptions {
            page_size: self.chunk_size,
            checksum: !self.no_checksum,
            manifest: !self.no_manifest,
        }
    }
}

#[derive(Subcommand)]
pub enum AnalyzeCommand {
    /// Report documents whose content repeats an earlier one
    Duplicate {
        /// Extra dotted field path to ignore (repeatable)
        #[arg(long = "exclude")]
        excludes: Vec<ExclusionRule>,

        /// Do not ignore event.id, event.created_at and event.updated_at
        #[arg(long)]
        no_default_excludes: bool,

        target_folder: PathBuf,
    },
}

/// Run `command`. Problems found by `compare` and `verify` give a failing
/// exit code without being errors.
pub fn run_command(command: Commands, connection: ConnectionArgs) -> Result<ExitCode> {
    match command {
        Commands::Dump { what } => match what {
            DumpCommand::Index { indices, output } => {
                handle_dump(connection, CollectionKind::Index, indices, &output)
            }
            DumpCommand::Datastream {
                data_streams,
                output,
            } => handle_dump(connection, CollectionKind::DataStream, data_streams, &output),
        },
        Commands::Load {
            target,
            pipeline,
            chunk_size,
            data_files,
        } => handle_load(
            connection,
            &target,
            LoadOptions {
                chunk_size,
                pipeline,
            },
            &data_files,
        ),
        Commands::Compare { left, right } => handle_compare(left, right),
        Commands::Analyze {
            what:
                AnalyzeCommand::Duplicate {
                    excludes,
                    no_default_excludes,
                    target_folder,
                },
        } => handle_duplicates(target_folder, excludes, no_default_excludes),
        Commands::Verify { dir } => handle_verify(dir),
    }
}

fn handle_dump(
    connection: ConnectionArgs,
    kind: CollectionKind,
    requested: Vec<String>,
    output: &DumpArgs,
) -> Result<ExitCode> {
    let client = ElasticClient::connect(&connection.into_config())?;
    let collections = resolve_collections(&client, kind, requested)?;
    if collections.is_empty() {
        log::warn!("no {kind} to export");
    }

    let mut reporter = TerminalReporter::new();
    let summary = export_collections(
        &client,
        kind,
        &collections,
        &output.target_folder,
        &output.options(),
        &mut reporter,
    )
    .with_context(|| format!("Export to {} failed", output.target_folder.display()))?;

    reporter.status(&format!(
        "Exported {} documents from {} collections",
        summary.documents(),
        summary.records.len()
    ));
    Ok(exit_code(summary.is_clean()))
}

fn handle_load(connection: ConnectionArgs, target: &str, options: LoadOptions, files: &[PathBuf]) -> Result<ExitCode> {
    let client = ElasticClient::connect(&connection.into_config())?;
    let mut reporter = TerminalReporter::new();
    let summary = load_files(&client, target, files, &options, &mut reporter)?;

    reporter.status(&format!(
        "Loaded {} documents into {target} ({} rejected, {} unreadable lines)",
        summary.ingested, summary.rejected, summary.unreadable
    ));
    Ok(exit_code(summary.is_clean()))
}

fn handle_compare(left: PathBuf, right: PathBuf) -> Result<ExitCode> {
    let mut reporter = TerminalReporter::new();
    let summary = diff_snapshots(&left, &right, &mut reporter).with_context(|| {
        format!("Failed to compare {} with {}", left.display(), right.display())
    })?;
    log::info!("{summary:?}");
    Ok(exit_code(reporter.problems() == 0))
}

fn handle_duplicates(dir: PathBuf, excludes: Vec<ExclusionRule>, no_defaults: bool) -> Result<ExitCode> {
    let base = if no_defaults {
        Exclusions::none()
    } else {
        Exclusions::defaults()
    };
    let mut reporter = TerminalReporter::new();
    let summary = scan_duplicates(&dir, base.with(excludes), &mut reporter)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    reporter.status(&format!(
        "Scanned {} documents in {} collections: {} duplicates",
        summary.documents, summary.collections, summary.duplicates
    ));
    Ok(ExitCode::SUCCESS)
}

fn handle_verify(dir: PathBuf) -> Result<ExitCode> {
    let mut reporter = TerminalReporter::new();
    let summary = verify_snapshot(&dir, &mut reporter)
        .with_context(|| format!("Failed to verify {}", dir.display()))?;
    log::info!("{summary:?}");
    Ok(exit_code(summary.is_clean()))
}

fn exit_code(clean: bool) -> ExitCode {
    if clean { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
