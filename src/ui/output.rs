//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Query results are the program's data and always go to stdout. Everything
//! else here is status output: it respects the quiet flag, and diagnostics
//! go to stderr so they never mix with query results.

use std::fmt::Display;

use crate::engine::{ApplyReport, BranchOutcome};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags. `quiet` wins over `debug`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print a debug message (only in debug mode).
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// One line describing a branch outcome.
pub fn format_outcome(outcome: &BranchOutcome) -> String {
    match outcome {
        BranchOutcome::Skipped { branch } => format!("skipped {branch}"),
        BranchOutcome::Committed {
            reference, commit, ..
        } => format!("committed {commit} to {reference}"),
    }
}

/// Lines describing an apply report, in branch order.
pub fn format_report(report: &ApplyReport) -> String {
    format_list(
        &report
            .outcomes
            .iter()
            .map(format_outcome)
            .collect::<Vec<_>>(),
        "",
    )
}

/// Render an error and its causes on one line.
///
/// Causes whose text already appears in the message so far are skipped, so
/// errors that embed their source are not repeated.
pub fn format_error(err: &anyhow::Error) -> String {
    let mut message = String::new();
    for cause in err.chain() {
        let text = cause.to_string();
        if message.contains(&text) {
            continue;
        }
        if !message.is_empty() {
            message.push_str(": ");
        }
        message.push_str(&text);
    }
    message
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}
