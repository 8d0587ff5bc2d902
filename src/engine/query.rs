//! engine::query
//!
//! The read-only query operation.
//!
//! Every matching file on every matching branch is evaluated and its output
//! streamed to a sink, branches in resolution order and files depth-first.
//! Nothing is written to the store.
//!
//! With `verbose`, progress is interleaved into the sink as YAML comments so
//! the stream stays parseable:
//!
//! ```text
//! # 2 branches match regular expression ".*"
//! # 	querying files on "main"
//! # 		matched "a.yaml"
//! name: x
//! ```

use std::io::Write;

use tracing::debug;

use super::cancel::CancelToken;
use super::matcher::for_each_matching_file;
use super::resolve::resolve_branches;
use super::EngineError;
use crate::core::config::{DEFAULT_BRANCH_FILTER, DEFAULT_FILE_FILTER};
use crate::core::pattern::{BranchFilter, FilterSyntax, PathFilter};
use crate::query::{Evaluator, OutputFormat, Scope};
use crate::store::ObjectStore;

/// Parameters of a query run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub branch_filter: String,
    pub file_filter: String,
    pub file_filter_syntax: FilterSyntax,
    pub query: String,
    pub format: OutputFormat,
    /// Interleave progress comments into the output.
    pub verbose: bool,
}

impl QueryOptions {
    /// Options with the built-in defaults.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            branch_filter: DEFAULT_BRANCH_FILTER.to_string(),
            file_filter: DEFAULT_FILE_FILTER.to_string(),
            file_filter_syntax: FilterSyntax::default(),
            query: query.into(),
            format: OutputFormat::Yaml,
            verbose: false,
        }
    }
}

/// Counts from a query run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuerySummary {
    pub branches: usize,
    pub files: usize,
}

/// Evaluate the query on every matching file and write the results to `sink`.
pub fn query<S, E, W>(
    store: &S,
    evaluator: &E,
    options: &QueryOptions,
    cancel: &CancelToken,
    sink: &mut W,
) -> Result<QuerySummary, EngineError>
where
    S: ObjectStore + ?Sized,
    E: Evaluator,
    W: Write + ?Sized,
{
    let branches =
        BranchFilter::new(&options.branch_filter).map_err(EngineError::InvalidBranchFilter)?;
    let files = PathFilter::new(&options.file_filter, options.file_filter_syntax)
        .map_err(EngineError::InvalidFileFilter)?;
    let expression = evaluator
        .parse(&options.query)
        .map_err(EngineError::InvalidQuery)?;

    let resolved = resolve_branches(store, &branches)?;
    if options.verbose {
        if resolved.len() == 1 {
            writeln!(
                sink,
                "# 1 branch matches regular expression {:?}",
                branches.as_str()
            )?;
        } else {
            writeln!(
                sink,
                "# {} branches match regular expression {:?}",
                resolved.len(),
                branches.as_str()
            )?;
        }
    }

    let mut summary = QuerySummary {
        branches: resolved.len(),
        files: 0,
    };

    for branch in &resolved {
        cancel.check()?;
        debug!(branch = %branch.name, tip = %branch.tip, "querying files");
        if options.verbose {
            writeln!(sink, "# \tquerying files on {:?}", branch.name.as_str())?;
        }

        for_each_matching_file(store, &branch.tip, &files, |file| {
            cancel.check()?;
            if options.verbose {
                writeln!(sink, "# \t\tmatched {:?}", file.path())?;
            }

            let input = file.read().map_err(|source| EngineError::Read {
                branch: branch.name.clone(),
                path: file.path().to_string(),
                source,
            })?;
            let scope = Scope::new(branch.name.as_str(), file.path(), branch.tip.as_str());
            let output = evaluator
                .evaluate(&expression, &input, &scope, options.format)
                .map_err(|source| EngineError::Evaluation {
                    branch: branch.name.clone(),
                    path: file.path().to_string(),
                    source,
                })?;

            sink.write_all(&output)?;
            summary.files += 1;
            Ok(())
        })?;
    }

    sink.flush()?;
    Ok(summary)
}
