//! engine::resolve
//!
//! Branch selection.

use tracing::debug;

use super::EngineError;
use crate::core::pattern::BranchFilter;
use crate::core::types::{BranchName, Oid, RefName};
use crate::store::ObjectStore;

/// A branch selected for evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBranch {
    /// Short name, as matched and as seen by `$branch`.
    pub name: BranchName,
    /// Full ref name.
    pub refname: RefName,
    /// Direct target of the ref.
    pub tip: Oid,
}

/// Select the branches whose short name matches `filter`.
///
/// Branches keep the store's enumeration order. Refs under `refs/heads/`
/// whose short name is not a valid branch name are skipped.
pub fn resolve_branches<S>(
    store: &S,
    filter: &BranchFilter,
) -> Result<Vec<ResolvedBranch>, EngineError>
where
    S: ObjectStore + ?Sized,
{
    let mut resolved = Vec::new();
    for entry in store.branches()? {
        let Some(name) = entry.name.branch_name() else {
            debug!(refname = %entry.name, "skipping ref with unusable branch name");
            continue;
        };
        if filter.is_match(name.as_str()) {
            resolved.push(ResolvedBranch {
                name,
                refname: entry.name,
                tip: entry.oid,
            });
        }
    }

    debug!(pattern = filter.as_str(), count = resolved.len(), "resolved branches");
    Ok(resolved)
}

/// Short names of the branches matching `pattern`.
///
/// # Errors
///
/// [`EngineError::InvalidBranchFilter`] if the pattern does not compile.
pub fn list_branches<S>(store: &S, pattern: &str) -> Result<Vec<BranchName>, EngineError>
where
    S: ObjectStore + ?Sized,
{
    let filter = BranchFilter::new(pattern).map_err(EngineError::InvalidBranchFilter)?;
    Ok(resolve_branches(store, &filter)?
        .into_iter()
        .map(|branch| branch.name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{branch, commit_branch, File};
    use crate::store::MemoryStore;

    fn store_with(branches: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for name in branches {
            commit_branch(&store, name, vec![File("a.yaml", "name: x\n")]);
        }
        store
    }

    #[test]
    fn matches_short_names() {
        let store = store_with(&["main", "rel/1.0", "rel/2.0", "feature"]);
        let names = list_branches(&store, "^rel/").unwrap();
        assert_eq!(names, [branch("rel/1.0"), branch("rel/2.0")]);
    }

    #[test]
    fn unanchored_by_default() {
        let store = store_with(&["main", "maintenance", "dev"]);
        let names = list_branches(&store, "main").unwrap();
        assert_eq!(names, [branch("main"), branch("maintenance")]);
    }

    #[test]
    fn keeps_store_order_and_tips() {
        let store = store_with(&["b", "a"]);
        let filter = BranchFilter::new(".*").unwrap();
        let resolved = resolve_branches(&store, &filter).unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].name, branch("a"));
        assert_eq!(resolved[0].refname.as_str(), "refs/heads/a");
        assert_eq!(
            Some(&resolved[0].tip),
            store.refs().get(&resolved[0].refname)
        );
    }

    #[test]
    fn ignores_refs_outside_branches() {
        let store = store_with(&["main"]);
        let tip = store.refs().values().next().cloned().unwrap();
        store.force_ref(RefName::new("refs/tags/v1").unwrap(), tip);

        assert_eq!(list_branches(&store, ".*").unwrap(), [branch("main")]);
    }

    #[test]
    fn no_match_is_empty() {
        let store = store_with(&["main"]);
        assert!(list_branches(&store, "^nope$").unwrap().is_empty());
    }

    #[test]
    fn invalid_pattern() {
        let store = store_with(&["main"]);
        assert!(matches!(
            list_branches(&store, "(unclosed"),
            Err(EngineError::InvalidBranchFilter(_))
        ));
    }
}
