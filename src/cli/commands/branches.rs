//! branches command - List branches matching a pattern

use anyhow::Result;

use super::open_repo;
use crate::cli::Context;
use crate::engine;
use crate::ui::output;

/// Print the short name of every branch matching `pattern`, sorted.
///
/// Without a pattern the configured branch filter is used.
pub fn branches(ctx: &Context, pattern: Option<&str>) -> Result<()> {
    let (git, config) = open_repo(ctx)?;
    let pattern = pattern.unwrap_or_else(|| config.branch_filter());

    for branch in engine::list_branches(&git, pattern)? {
        println!("{branch}");
    }
    output::debug(format!("branch filter {pattern:?}"), ctx.verbosity());
    Ok(())
}
