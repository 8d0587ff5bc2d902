//! cli
//!
//! Command-line interface layer for qyt.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the tracing subscriber
//! - Resolve options against configuration and delegate to handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, opens the
//! repository, and calls [`crate::engine`] with the repository as the
//! object store and [`crate::query::Yq`] as the evaluator.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::ui::output::Verbosity;

/// Execution context derived from global flags.
#[derive(Debug, Clone)]
pub struct Context {
    /// Repository path, if given. Defaults to the current directory.
    pub repo: Option<PathBuf>,
    pub debug: bool,
    pub quiet: bool,
}

impl Context {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }

    /// Directory to discover the repository from.
    pub fn repo_path(&self) -> PathBuf {
        self.repo.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Install the stderr tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `debug` with `--debug`, else `warn`.
fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug { "debug" } else { "warn" })
    });

    // Ignore a second installation (tests driving `run` in-process).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let ctx = Context {
        repo: cli.repo.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };

    commands::dispatch(cli.command, &ctx)
}
