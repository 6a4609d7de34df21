//! Terminal rendering of progress and findings.

use console::style;
use esdump::report::{Finding, Reporter};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str = "{msg:20} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} ({per_sec})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg:20} [{elapsed_precise}] {pos} entries ({per_sec})";

/// Prints findings to stdout, errors to stderr, and keeps one progress bar
/// for the unit of work in flight.
#[derive(Default)]
pub struct TerminalReporter {
    bar: Option<ProgressBar>,
    problems: u64,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Findings that pointed at a problem.
    pub fn problems(&self) -> u64 {
        self.problems
    }

    fn print(&self, line: &str) {
        match &self.bar {
            Some(bar) => bar.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }
    }
}

impl Reporter for TerminalReporter {
    fn finding(&mut self, finding: Finding) {
        let line = if finding.is_problem() {
            self.problems += 1;
            style(finding.to_string()).red().to_string()
        } else {
            style(finding.to_string()).green().to_string()
        };
        self.print(&line);
    }

    fn status(&mut self, message: &str) {
        log::info!("{message}");
        self.print(message);
    }

    fn error(&mut self, message: &str) {
        let line = style(message).red().bold().to_string();
        match &self.bar {
            Some(bar) => bar.suspend(|| eprintln!("{line}")),
            None => eprintln!("{line}"),
        }
    }

    fn begin(&mut self, label: &str, total: Option<u64>) {
        self.finish();
        let bar = match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                if let Ok(s) = ProgressStyle::with_template(BAR_TEMPLATE) {
                    bar.set_style(s.progress_chars("=> "));
                }
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                if let Ok(s) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
                    bar.set_style(s);
                }
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
        };
        bar.set_message(label.to_owned());
        self.bar = Some(bar);
    }

    fn advance(&mut self, n: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(n);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
