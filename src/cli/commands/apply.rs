//! apply command - Commit query results to new branches

use anyhow::{anyhow, Context as _, Result};
use chrono::{DateTime, FixedOffset, Local};

use super::{open_repo, resolve_selection};
use crate::cli::args::Selection;
use crate::cli::Context;
use crate::core::config::Config;
use crate::core::object::Signature;
use crate::engine::{self, ApplyOptions, CancelToken};
use crate::git::Identity;
use crate::query::Yq;
use crate::ui::output;

/// Evaluate the query on every matching branch and register the commits.
pub fn apply(
    ctx: &Context,
    query: &str,
    file_pattern: Option<&str>,
    selection: &Selection,
    prefix: Option<&str>,
    message: Option<&str>,
    allow_override: bool,
) -> Result<()> {
    let (git, config) = open_repo(ctx)?;
    let identity = git.identity().context("failed to read git identity")?;
    let author = signature(&config, &identity, Local::now().into())?;

    let selection = resolve_selection(&config, selection, file_pattern);
    let options = ApplyOptions {
        branch_filter: selection.branch_filter,
        file_filter: selection.file_filter,
        file_filter_syntax: selection.file_filter_syntax,
        query: query.to_string(),
        commit_template: message
            .map(str::to_string)
            .unwrap_or_else(|| config.commit_template().to_string()),
        new_branch_prefix: prefix
            .map(str::to_string)
            .unwrap_or_else(|| config.new_branch_prefix().to_string()),
        author,
        allow_override,
    };

    let report = engine::apply(&git, &Yq::new(), &options, &CancelToken::new())?;

    let verbosity = ctx.verbosity();
    if report.is_noop() {
        output::warn("no file changed; nothing was committed", verbosity);
    }
    if !report.outcomes.is_empty() {
        output::print(output::format_report(&report), verbosity);
    }
    output::debug(
        format!("{} object(s) written", report.objects_written),
        verbosity,
    );
    Ok(())
}

/// Author and committer of new commits.
///
/// Configured values win over `user.name` and `user.email` from git config.
fn signature(
    config: &Config,
    identity: &Identity,
    when: DateTime<FixedOffset>,
) -> Result<Signature> {
    let name = config
        .author_name()
        .or(identity.name.as_deref())
        .ok_or_else(|| {
            anyhow!("no author name configured; set user.name in git config or author.name in qyt config")
        })?;
    let email = config
        .author_email()
        .or(identity.email.as_deref())
        .ok_or_else(|| {
            anyhow!("no author email configured; set user.email in git config or author.email in qyt config")
        })?;

    Ok(Signature::new(name, email, when))
}
