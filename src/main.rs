//! # esdump command line
//!
//! ```text
//! esdump dump index [--index NAME]... [--chunk-size N] [--no-checksum] DIR
//! esdump dump datastream [--data-stream NAME]... DIR
//! esdump load --target NAME [--pipeline P] [--chunk-size N] FILE...
//! esdump compare LEFT RIGHT
//! esdump analyze duplicate [--exclude FIELD]... [--no-default-excludes] DIR
//! esdump verify DIR
//! ```
//!
//! Connection settings come from `--host`, `--username`, `--password`,
//! `--api-key` or the matching `ELASTICSEARCH_*` variables.
//!
//! Exit status is non-zero on error, and also when `compare`, `verify`,
//! `dump` or `load` finished but found problems.

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout, clippy::print_stderr)] // the binary talks to the terminal

mod cli;
mod terminal;

use clap::Parser as _;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    esdump::logging::init(cli.verbose);

    match cli::run_command(cli.command, cli.connection) {
        Ok(code) => code,
        Err(e) => {
            log::debug!("{e:?}");
            eprintln!("{} {e:#}", console::style("Error:").red().bold());
            ExitCode::FAILURE
        }
    }
}
