//! query command - Print query results for every matching file

use std::io;

use anyhow::Result;

use super::{open_repo, resolve_selection};
use crate::cli::args::Selection;
use crate::cli::Context;
use crate::core::config::Config;
use crate::engine::{self, CancelToken, QueryOptions};
use crate::query::{OutputFormat, Yq};
use crate::ui::output;

/// Run a query across branches and stream the results to stdout.
pub fn query(
    ctx: &Context,
    query: &str,
    file_pattern: Option<&str>,
    selection: &Selection,
    format: Option<OutputFormat>,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let (git, config) = open_repo(ctx)?;
    let options = query_options(&config, query, file_pattern, selection, format, json, verbose);

    let stdout = io::stdout();
    let mut sink = stdout.lock();
    let summary = engine::query(&git, &Yq::new(), &options, &CancelToken::new(), &mut sink)?;

    output::debug(
        format!(
            "queried {} file(s) on {} branch(es)",
            summary.files, summary.branches
        ),
        ctx.verbosity(),
    );
    Ok(())
}

fn query_options(
    config: &Config,
    query: &str,
    file_pattern: Option<&str>,
    selection: &Selection,
    format: Option<OutputFormat>,
    json: bool,
    verbose: bool,
) -> QueryOptions {
    let selection = resolve_selection(config, selection, file_pattern);
    let format = if json {
        OutputFormat::Json
    } else {
        format.unwrap_or_else(|| config.output())
    };

    QueryOptions {
        branch_filter: selection.branch_filter,
        file_filter: selection.file_filter,
        file_filter_syntax: selection.file_filter_syntax,
        query: query.to_string(),
        format,
        verbose,
    }
}
