//! engine::apply
//!
//! Persist a query's results as new commits on new branches.
//!
//! # Phases
//!
//! 1. **Validate**: compile the filters, parse the query and the commit
//!    message template. Nothing has been read yet.
//! 2. **Resolve**: select branches and check every destination. Without
//!    override, an existing destination fails the whole run here, before
//!    any branch is evaluated.
//! 3. **Stage**: evaluate each branch in resolution order. New objects go
//!    into one shared arena, so content produced on several branches is
//!    staged once.
//! 4. **Write**: persist the arena, blobs then trees then commits.
//! 5. **Register**: point each destination at its commit, in resolution
//!    order, with a compare-and-swap against the value observed in phase 2.
//!
//! A failure in phases 1 to 3 leaves the store untouched. Cancellation is
//! honoured up to the start of phase 4. A failure during phase 4 or 5 can
//! leave unreferenced objects behind, and refs registered before the
//! failing one stay registered.

use tracing::{debug, info, warn};

use super::branch::{check_destination, commit_branch, BranchContext, Destination};
use super::cancel::CancelToken;
use super::resolve::resolve_branches;
use super::writer::PendingObjects;
use super::EngineError;
use crate::core::config::{
    DEFAULT_BRANCH_FILTER, DEFAULT_COMMIT_TEMPLATE, DEFAULT_FILE_FILTER, DEFAULT_NEW_BRANCH_PREFIX,
};
use crate::core::message::MessageTemplate;
use crate::core::object::Signature;
use crate::core::pattern::{BranchFilter, FilterSyntax, PathFilter};
use crate::core::types::{BranchName, Oid, RefName};
use crate::query::Evaluator;
use crate::store::ObjectStore;

/// Parameters of an apply run.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub branch_filter: String,
    pub file_filter: String,
    pub file_filter_syntax: FilterSyntax,
    /// Query expression text.
    pub query: String,
    pub commit_template: String,
    /// Prepended to the source branch name to form the destination.
    pub new_branch_prefix: String,
    /// Author and committer of every new commit.
    pub author: Signature,
    /// Allow destinations that already exist to be moved.
    pub allow_override: bool,
}

impl ApplyOptions {
    /// Options with the built-in defaults.
    pub fn new(query: impl Into<String>, author: Signature) -> Self {
        Self {
            branch_filter: DEFAULT_BRANCH_FILTER.to_string(),
            file_filter: DEFAULT_FILE_FILTER.to_string(),
            file_filter_syntax: FilterSyntax::default(),
            query: query.into(),
            commit_template: DEFAULT_COMMIT_TEMPLATE.to_string(),
            new_branch_prefix: DEFAULT_NEW_BRANCH_PREFIX.to_string(),
            author,
            allow_override: false,
        }
    }
}

/// What happened to one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    /// No matching file changed.
    Skipped { branch: BranchName },
    /// A commit was registered.
    Committed {
        branch: BranchName,
        reference: RefName,
        commit: Oid,
    },
}

impl BranchOutcome {
    /// The source branch.
    pub fn branch(&self) -> &BranchName {
        match self {
            BranchOutcome::Skipped { branch } | BranchOutcome::Committed { branch, .. } => branch,
        }
    }
}

/// Result of an apply run, one outcome per resolved branch in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub outcomes: Vec<BranchOutcome>,
    /// Objects newly written to the store.
    pub objects_written: usize,
}

impl ApplyReport {
    /// Outcomes that registered a commit.
    pub fn committed(&self) -> impl Iterator<Item = &BranchOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, BranchOutcome::Committed { .. }))
    }

    /// Whether nothing was committed.
    pub fn is_noop(&self) -> bool {
        self.committed().next().is_none()
    }
}

/// Run the query on every matching branch and commit the results.
///
/// # Errors
///
/// Input errors (filters, query, template, prefix), conflicts, resolution
/// and evaluation errors are all reported before anything is written.
/// Store errors during the write and register phases are returned as is.
pub fn apply<S, E>(
    store: &S,
    evaluator: &E,
    options: &ApplyOptions,
    cancel: &CancelToken,
) -> Result<ApplyReport, EngineError>
where
    S: ObjectStore + ?Sized,
    E: Evaluator,
{
    let branches =
        BranchFilter::new(&options.branch_filter).map_err(EngineError::InvalidBranchFilter)?;
    let files = PathFilter::new(&options.file_filter, options.file_filter_syntax)
        .map_err(EngineError::InvalidFileFilter)?;
    let expression = evaluator
        .parse(&options.query)
        .map_err(EngineError::InvalidQuery)?;
    let template =
        MessageTemplate::parse(&options.commit_template).map_err(EngineError::InvalidTemplate)?;

    let resolved = resolve_branches(store, &branches)?;
    info!(
        pattern = branches.as_str(),
        count = resolved.len(),
        "applying query"
    );

    let mut destinations = Vec::with_capacity(resolved.len());
    for branch in &resolved {
        cancel.check()?;
        destinations.push(check_destination(
            store,
            &branch.name,
            &options.new_branch_prefix,
            options.allow_override,
        )?);
    }

    let ctx = BranchContext {
        evaluator,
        expression: &expression,
        query: &options.query,
        files: &files,
        template: &template,
        author: &options.author,
        cancel,
    };

    let mut pending = PendingObjects::new();
    let mut staged: Vec<Option<(Oid, &Destination)>> = Vec::with_capacity(resolved.len());
    for (branch, destination) in resolved.iter().zip(&destinations) {
        match commit_branch(store, &ctx, branch)? {
            Some(built) => {
                pending.extend(built.objects);
                staged.push(Some((built.commit, destination)));
            }
            None => staged.push(None),
        }
    }

    cancel.check()?;
    let stats = pending.write(store)?;

    let mut outcomes = Vec::with_capacity(resolved.len());
    for (branch, staged) in resolved.iter().zip(staged) {
        let Some((commit, destination)) = staged else {
            outcomes.push(BranchOutcome::Skipped {
                branch: branch.name.clone(),
            });
            continue;
        };

        let reflog = format!("qyt: apply on {}", branch.name);
        if let Err(err) = store.set_ref(
            &destination.refname,
            &commit,
            destination.observed.as_ref(),
            &reflog,
        ) {
            warn!(refname = %destination.refname, error = %err, "failed to register branch");
            return Err(err.into());
        }
        debug!(refname = %destination.refname, %commit, "registered branch");

        outcomes.push(BranchOutcome::Committed {
            branch: branch.name.clone(),
            reference: destination.refname.clone(),
            commit,
        });
    }

    Ok(ApplyReport {
        outcomes,
        objects_written: stats.written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::object::{Commit, EntryMode, ObjectKind, RawObject, Tree, TreeEntry};
    use crate::engine::testing::{author, branch, branch_ref, commit_branch as seed, Dir, File, Replace};
    use crate::store::{FailOn, MemoryStore, StoreError};

    const X_TO_Z: Replace = Replace { from: "x", to: "z" };

    fn options() -> ApplyOptions {
        ApplyOptions::new("x -> z", author())
    }

    fn two_branches() -> MemoryStore {
        let store = MemoryStore::new();
        seed(
            &store,
            "main",
            vec![File("a.yaml", "name: x\n"), Dir("b", vec![File("b.yaml", "name: y\n")])],
        );
        seed(
            &store,
            "rel",
            vec![File("a.yaml", "name: x\n"), File("c.yaml", "name: c\n")],
        );
        store
    }

    mod staging {
        use super::*;

        #[test]
        fn commits_every_changed_branch_in_order() {
            let store = two_branches();
            let report = apply(&store, &X_TO_Z, &options(), &CancelToken::new()).unwrap();

            let refs: Vec<_> = report
                .committed()
                .map(|outcome| match outcome {
                    BranchOutcome::Committed { reference, .. } => reference.as_str().to_string(),
                    BranchOutcome::Skipped { .. } => unreachable!(),
                })
                .collect();
            assert_eq!(refs, ["refs/heads/qyt/main", "refs/heads/qyt/rel"]);

            let updates: Vec<_> = store.ref_updates().into_iter().map(|(name, _)| name).collect();
            assert_eq!(updates, [branch_ref("qyt/main"), branch_ref("qyt/rel")]);
        }

        #[test]
        fn identical_blobs_are_written_once() {
            let store = two_branches();
            let before = store.object_count();
            let report = apply(&store, &X_TO_Z, &options(), &CancelToken::new()).unwrap();

            // one shared blob, two root trees, two commits
            assert_eq!(report.objects_written, 5);
            assert_eq!(store.object_count(), before + 5);
        }

        #[test]
        fn writes_blobs_then_trees_then_commits() {
            let store = two_branches();
            apply(&store, &X_TO_Z, &options(), &CancelToken::new()).unwrap();

            let kinds: Vec<_> = store
                .writes()
                .iter()
                .map(|oid| store.read_object(oid).unwrap().kind())
                .collect();
            assert_eq!(
                kinds,
                [
                    ObjectKind::Blob,
                    ObjectKind::Tree,
                    ObjectKind::Tree,
                    ObjectKind::Commit,
                    ObjectKind::Commit,
                ]
            );
        }

        #[test]
        fn registered_commit_has_source_as_parent() {
            let store = two_branches();
            let main = store.refs()[&branch_ref("main")].clone();
            apply(&store, &X_TO_Z, &options(), &CancelToken::new()).unwrap();

            let new = store.refs()[&branch_ref("qyt/main")].clone();
            let commit = store.read_commit(&new).unwrap();
            assert_eq!(commit.parents, [main]);
            assert_eq!(commit.message, r#"run yq "x -> z" on main"#);
        }

        #[test]
        fn unchanged_branch_is_skipped() {
            let store = two_branches();
            seed(&store, "docs", vec![File("a.yaml", "name: y\n")]);

            let report = apply(&store, &X_TO_Z, &options(), &CancelToken::new()).unwrap();
            assert_eq!(
                report.outcomes[0],
                BranchOutcome::Skipped {
                    branch: branch("docs")
                }
            );
            assert_eq!(report.outcomes[0].branch(), &branch("docs"));
            assert!(!store.refs().contains_key(&branch_ref("qyt/docs")));
        }

        #[test]
        fn no_change_anywhere_writes_nothing() {
            let store = two_branches();
            let refs = store.refs();
            let identity = Replace { from: "nothing", to: "else" };

            let report = apply(&store, &identity, &options(), &CancelToken::new()).unwrap();
            assert!(report.is_noop());
            assert_eq!(report.objects_written, 0);
            assert!(store.writes().is_empty());
            assert_eq!(store.refs(), refs);
        }

        #[test]
        fn non_utf8_sibling_is_carried_over() {
            let store = MemoryStore::new();
            let raw = store.insert(RawObject::blob(&b"\x89PNG"[..]));
            let assets = store.insert(
                Tree::from_entries(vec![TreeEntry::new(b"\xff.txt".to_vec(), EntryMode::Blob, raw)])
                    .to_object(),
            );
            let a = store.insert(RawObject::blob(&b"name: x\n"[..]));
            let root = store.insert(
                Tree::from_entries(vec![
                    TreeEntry::new("a.yaml", EntryMode::Blob, a),
                    TreeEntry::new("assets", EntryMode::Tree, assets.clone()),
                ])
                .to_object(),
            );
            let commit = store.insert(
                Commit {
                    tree: root,
                    parents: vec![],
                    author: author(),
                    committer: author(),
                    message: "initial\n".to_string(),
                }
                .to_object(),
            );
            store.force_ref(branch_ref("main"), commit);

            let report = apply(&store, &X_TO_Z, &options(), &CancelToken::new()).unwrap();
            assert_eq!(report.committed().count(), 1);

            let new = store.refs()[&branch_ref("qyt/main")].clone();
            let tree = store.read_tree(&store.read_commit(&new).unwrap().tree).unwrap();
            assert_eq!(tree.entry("assets").unwrap().oid, assets);
        }

        #[test]
        fn branch_filter_limits_scope() {
            let store = two_branches();
            let mut options = options();
            options.branch_filter = "^rel$".to_string();

            let report = apply(&store, &X_TO_Z, &options, &CancelToken::new()).unwrap();
            assert_eq!(report.outcomes.len(), 1);
            assert_eq!(report.outcomes[0].branch(), &branch("rel"));
        }
    }

    mod conflicts {
        use super::*;

        #[test]
        fn existing_destination_fails_before_writing() {
            let store = two_branches();
            seed(&store, "qyt/rel", vec![File("a.yaml", "old\n")]);
            let refs = store.refs();
            let mut options = options();
            options.branch_filter = "^(main|rel)$".to_string();

            let err = apply(&store, &X_TO_Z, &options, &CancelToken::new()).unwrap_err();
            assert!(matches!(err, EngineError::BranchExists { .. }));
            assert!(store.writes().is_empty());
            assert_eq!(store.refs(), refs);
        }

        #[test]
        fn override_moves_existing_destination() {
            let store = two_branches();
            let old = seed(&store, "qyt/main", vec![File("a.yaml", "old\n")]);
            let mut options = options();
            options.branch_filter = "^main$".to_string();
            options.allow_override = true;

            let report = apply(&store, &X_TO_Z, &options, &CancelToken::new()).unwrap();
            let BranchOutcome::Committed { commit, .. } = &report.outcomes[0] else {
                panic!("expected a commit");
            };
            assert_ne!(commit, &old);
            assert_eq!(store.refs()[&branch_ref("qyt/main")], *commit);
        }

        #[test]
        fn evaluation_failure_writes_nothing() {
            let store = two_branches();
            seed(&store, "zzz", vec![File("a.yaml", "fail\n")]);

            let err = apply(&store, &X_TO_Z, &options(), &CancelToken::new()).unwrap_err();
            assert!(matches!(err, EngineError::Evaluation { .. }));
            assert!(store.writes().is_empty());
            assert!(store.ref_updates().is_empty());
        }

        #[test]
        fn ref_failure_keeps_earlier_registrations() {
            let store = two_branches();
            store.fail_on(FailOn::SetRef(branch_ref("qyt/rel")));

            let err = apply(&store, &X_TO_Z, &options(), &CancelToken::new()).unwrap_err();
            assert!(matches!(err, EngineError::Store(StoreError::Backend(_))));
            assert_eq!(store.ref_updates().len(), 1);
        }
    }

    mod inputs {
        use super::*;

        #[test]
        fn invalid_branch_filter() {
            let mut options = options();
            options.branch_filter = "[".to_string();
            assert!(matches!(
                apply(&MemoryStore::new(), &X_TO_Z, &options, &CancelToken::new()),
                Err(EngineError::InvalidBranchFilter(_))
            ));
        }

        #[test]
        fn invalid_file_filter() {
            let mut options = options();
            options.file_filter = "(".to_string();
            assert!(matches!(
                apply(&MemoryStore::new(), &X_TO_Z, &options, &CancelToken::new()),
                Err(EngineError::InvalidFileFilter(_))
            ));
        }

        #[test]
        fn invalid_query() {
            let mut options = options();
            options.query = String::new();
            assert!(matches!(
                apply(&MemoryStore::new(), &X_TO_Z, &options, &CancelToken::new()),
                Err(EngineError::InvalidQuery(_))
            ));
        }

        #[test]
        fn invalid_template() {
            let mut options = options();
            options.commit_template = "{{.Nope}}".to_string();
            assert!(matches!(
                apply(&MemoryStore::new(), &X_TO_Z, &options, &CancelToken::new()),
                Err(EngineError::InvalidTemplate(_))
            ));
        }

        #[test]
        fn invalid_prefix() {
            let store = two_branches();
            let mut options = options();
            options.new_branch_prefix = "a..b/".to_string();
            assert!(matches!(
                apply(&store, &X_TO_Z, &options, &CancelToken::new()),
                Err(EngineError::InvalidDestination { .. })
            ));
        }
    }

    mod cancellation {
        use super::*;

        #[test]
        fn cancelled_run_registers_nothing() {
            let store = two_branches();
            let cancel = CancelToken::new();
            cancel.cancel();

            assert!(matches!(
                apply(&store, &X_TO_Z, &options(), &cancel),
                Err(EngineError::Cancelled)
            ));
            assert!(store.writes().is_empty());
            assert!(store.ref_updates().is_empty());
        }

        #[test]
        fn cancel_during_evaluation() {
            struct CancelOnRel<'a>(&'a CancelToken);

            impl Evaluator for CancelOnRel<'_> {
                type Expression = ();

                fn parse(&self, _: &str) -> Result<(), crate::query::QueryError> {
                    Ok(())
                }

                fn evaluate(
                    &self,
                    _: &(),
                    document: &[u8],
                    scope: &crate::query::Scope,
                    _: crate::query::OutputFormat,
                ) -> Result<Vec<u8>, crate::query::QueryError> {
                    if scope.branch == "rel" {
                        self.0.cancel();
                    }
                    Ok([document, b"# touched\n"].concat())
                }
            }

            let store = two_branches();
            let cancel = CancelToken::new();
            let err = apply(&store, &CancelOnRel(&cancel), &options(), &cancel).unwrap_err();
            assert!(matches!(err, EngineError::Cancelled));
            assert!(store.writes().is_empty());
            assert!(store.ref_updates().is_empty());
        }
    }

    #[test]
    fn source_branches_are_untouched() {
        let store = two_branches();
        let main = store.refs()[&branch_ref("main")].clone();
        let tree = store.read_commit(&main).unwrap().tree;

        apply(&store, &X_TO_Z, &options(), &CancelToken::new()).unwrap();

        assert_eq!(store.refs()[&branch_ref("main")], main);
        let commit: Commit = store.read_commit(&main).unwrap();
        assert_eq!(commit.tree, tree);
    }
}
