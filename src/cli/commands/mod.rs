//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens the repository and loads its configuration
//! 2. Resolves flags over configuration into engine options
//! 3. Calls the engine and displays the result
//!
//! Handlers do NOT write objects or references directly.

mod apply;
mod branches;
mod completion;
mod query;

pub use apply::apply;
pub use branches::branches;
pub use completion::completion;
pub use query::query;

use anyhow::{Context as _, Result};
use tracing::debug;

use crate::cli::args::{Command, Selection};
use crate::cli::Context;
use crate::core::config::Config;
use crate::core::pattern::FilterSyntax;
use crate::git::Git;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Query {
            query,
            file_pattern,
            selection,
            output,
            json,
            verbose,
        } => query::query(
            ctx,
            &query,
            file_pattern.as_deref(),
            &selection,
            output.map(Into::into),
            json,
            verbose,
        ),
        Command::Apply {
            query,
            file_pattern,
            selection,
            prefix,
            message,
            allow_override,
        } => apply::apply(
            ctx,
            &query,
            file_pattern.as_deref(),
            &selection,
            prefix.as_deref(),
            message.as_deref(),
            allow_override,
        ),
        Command::Branches { pattern } => branches::branches(ctx, pattern.as_deref()),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Open the repository named by the context and load its configuration.
fn open_repo(ctx: &Context) -> Result<(Git, Config)> {
    let path = ctx.repo_path();
    let git = Git::open(&path)
        .with_context(|| format!("failed to open git repository at {}", path.display()))?;
    let config = Config::load(Some(git.git_dir())).context("failed to load configuration")?;

    if let Some(path) = config.repo_config_loaded_from() {
        debug!(path = %path.display(), "loaded repository config");
    }
    if let Some(path) = config.global_config_loaded_from() {
        debug!(path = %path.display(), "loaded global config");
    }

    Ok((git, config))
}

/// Branch filter, file filter and syntax after flags and configuration.
///
/// The positional file pattern wins over `--files`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedSelection {
    branch_filter: String,
    file_filter: String,
    file_filter_syntax: FilterSyntax,
}

fn resolve_selection(
    config: &Config,
    selection: &Selection,
    file_pattern: Option<&str>,
) -> ResolvedSelection {
    ResolvedSelection {
        branch_filter: selection
            .branch_filter
            .clone()
            .unwrap_or_else(|| config.branch_filter().to_string()),
        file_filter: file_pattern
            .map(str::to_string)
            .or_else(|| selection.file_filter.clone())
            .unwrap_or_else(|| config.file_filter().to_string()),
        file_filter_syntax: selection
            .file_filter_syntax
            .map(Into::into)
            .unwrap_or_else(|| config.file_filter_syntax()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::SyntaxArg;
    use crate::core::config::{DEFAULT_BRANCH_FILTER, DEFAULT_FILE_FILTER};

    #[test]
    fn defaults_without_flags_or_config() {
        let resolved = resolve_selection(&Config::default(), &Selection::default(), None);
        assert_eq!(resolved.branch_filter, DEFAULT_BRANCH_FILTER);
        assert_eq!(resolved.file_filter, DEFAULT_FILE_FILTER);
        assert_eq!(resolved.file_filter_syntax, FilterSyntax::Regex);
    }

    #[test]
    fn config_fills_missing_flags() {
        let mut config = Config::default();
        config.global.branch_filter = Some("^rel/".to_string());
        config.global.file_filter = Some("deploy/**".to_string());
        config.global.file_filter_syntax = Some(FilterSyntax::Glob);

        let resolved = resolve_selection(&config, &Selection::default(), None);
        assert_eq!(resolved.branch_filter, "^rel/");
        assert_eq!(resolved.file_filter, "deploy/**");
        assert_eq!(resolved.file_filter_syntax, FilterSyntax::Glob);
    }

    #[test]
    fn flags_win_over_config() {
        let mut config = Config::default();
        config.global.branch_filter = Some("^rel/".to_string());
        config.global.file_filter_syntax = Some(FilterSyntax::Glob);
        let selection = Selection {
            branch_filter: Some("main".to_string()),
            file_filter: Some("a".to_string()),
            file_filter_syntax: Some(SyntaxArg::Regex),
        };

        let resolved = resolve_selection(&config, &selection, None);
        assert_eq!(resolved.branch_filter, "main");
        assert_eq!(resolved.file_filter, "a");
        assert_eq!(resolved.file_filter_syntax, FilterSyntax::Regex);
    }

    #[test]
    fn positional_pattern_wins_over_files_flag() {
        let selection = Selection {
            file_filter: Some("a".to_string()),
            ..Selection::default()
        };
        let resolved = resolve_selection(&Config::default(), &selection, Some("b"));
        assert_eq!(resolved.file_filter, "b");
    }
}
