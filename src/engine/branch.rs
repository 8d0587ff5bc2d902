//! engine::branch
//!
//! Evaluating a query on one branch and building the resulting commit.
//!
//! # States
//!
//! ```text
//! Start -> Scanning -> Decision -> Building -> Committed
//!                          \-> Skipped
//! ```
//!
//! - **Start**: the branch tip is peeled to a commit. Anything else is
//!   [`EngineError::NotACommit`].
//! - **Scanning**: each matching file is evaluated and rendered as YAML,
//!   whatever output format queries use. Output that is
//!   byte-identical to the input is dropped, as is empty output for a file
//!   holding only blank lines and comments. Anything else becomes a staged
//!   blob and a [`ModifiedFile`].
//! - **Decision**: no modified files means the branch is skipped.
//! - **Building**: the parent tree is rebuilt with the modified files and a
//!   commit with a single parent (the tip) is encoded.
//!
//! Nothing is written here. The caller receives the staged objects and
//! decides when to persist them.
//!
//! The destination check ([`check_destination`]) is separate so apply can
//! validate every destination before evaluating any branch.

use tracing::{debug, info};

use super::cancel::CancelToken;
use super::matcher::for_each_matching_file;
use super::resolve::ResolvedBranch;
use super::writer::PendingObjects;
use super::EngineError;
use crate::core::message::{MessageTemplate, MessageVars};
use crate::core::object::{Commit, Object, RawObject, Signature};
use crate::core::pattern::PathFilter;
use crate::core::tree::{build_tree, ModifiedFile};
use crate::core::types::{BranchName, Oid, RefName};
use crate::query::{is_blank, Evaluator, OutputFormat, Scope};
use crate::store::ObjectStore;

/// Inputs shared by every branch of one run.
pub struct BranchContext<'a, E: Evaluator> {
    pub evaluator: &'a E,
    pub expression: &'a E::Expression,
    /// Expression text, for the commit message.
    pub query: &'a str,
    pub files: &'a PathFilter,
    pub template: &'a MessageTemplate,
    pub author: &'a Signature,
    pub cancel: &'a CancelToken,
}

/// Where a branch's commit will be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub branch: BranchName,
    pub refname: RefName,
    /// Value of the ref when it was checked. Registration requires it to be
    /// unchanged.
    pub observed: Option<Oid>,
}

/// A commit built for one branch, with every new object it needs.
#[derive(Debug, Clone)]
pub struct BranchCommit {
    pub commit: Oid,
    pub modified: Vec<ModifiedFile>,
    pub objects: PendingObjects,
}

/// Compute the destination of `branch` and check it is free.
///
/// # Errors
///
/// - [`EngineError::InvalidDestination`] if `prefix + branch` is not a
///   valid branch name
/// - [`EngineError::BranchExists`] if the destination exists and
///   `allow_override` is false
pub fn check_destination<S>(
    store: &S,
    branch: &BranchName,
    prefix: &str,
    allow_override: bool,
) -> Result<Destination, EngineError>
where
    S: ObjectStore + ?Sized,
{
    let destination = branch
        .with_prefix(prefix)
        .map_err(|source| EngineError::InvalidDestination {
            branch: branch.clone(),
            source,
        })?;
    let refname = RefName::for_branch(&destination);
    let observed = store.lookup_ref(&refname)?;

    if observed.is_some() && !allow_override {
        return Err(EngineError::BranchExists {
            branch: destination,
            refname,
        });
    }

    Ok(Destination {
        branch: destination,
        refname,
        observed,
    })
}

/// Peel `oid` through annotated tags to a commit.
fn peel_to_commit<S>(
    store: &S,
    branch: &BranchName,
    oid: &Oid,
) -> Result<(Oid, Commit), EngineError>
where
    S: ObjectStore + ?Sized,
{
    let mut oid = oid.clone();
    loop {
        let object = store.read_object(&oid)?;
        match object.decode()? {
            Object::Commit(commit) => return Ok((oid, commit)),
            Object::Tag(tag) => oid = tag.target,
            Object::Tree(_) | Object::Blob(_) => {
                return Err(EngineError::NotACommit {
                    branch: branch.clone(),
                    oid,
                    kind: object.kind(),
                })
            }
        }
    }
}

/// Evaluate the query on `branch` and build its commit.
///
/// Returns `Ok(None)` when no matching file changed.
pub fn commit_branch<S, E>(
    store: &S,
    ctx: &BranchContext<'_, E>,
    branch: &ResolvedBranch,
) -> Result<Option<BranchCommit>, EngineError>
where
    S: ObjectStore + ?Sized,
    E: Evaluator,
{
    ctx.cancel.check()?;
    let (parent, parent_commit) = peel_to_commit(store, &branch.name, &branch.tip)?;
    debug!(branch = %branch.name, commit = %parent, "querying files");

    let mut objects = PendingObjects::new();
    let mut modified = Vec::new();

    for_each_matching_file(store, &parent_commit.tree, ctx.files, |file| {
        ctx.cancel.check()?;

        let input = file.read().map_err(|source| EngineError::Read {
            branch: branch.name.clone(),
            path: file.path().to_string(),
            source,
        })?;
        let scope = Scope::new(branch.name.as_str(), file.path(), branch.tip.as_str());
        let output = ctx
            .evaluator
            .evaluate(ctx.expression, &input, &scope, OutputFormat::Yaml)
            .map_err(|source| EngineError::Evaluation {
                branch: branch.name.clone(),
                path: file.path().to_string(),
                source,
            })?;

        if output == input || (output.is_empty() && is_blank(&input)) {
            debug!(branch = %branch.name, path = file.path(), "no change");
            return Ok(());
        }

        let blob = objects.stage(RawObject::blob(output));
        debug!(branch = %branch.name, path = file.path(), %blob, "modified");
        modified.push(ModifiedFile::new(file.path(), file.mode(), blob));
        Ok(())
    })?;

    if modified.is_empty() {
        info!(branch = %branch.name, "no files changed, skipping");
        return Ok(None);
    }

    let parent_tree = store.read_tree(&parent_commit.tree)?;
    let mut load = |oid: &Oid| store.read_tree(oid).map_err(EngineError::from);
    let Some(update) = build_tree(&mut load, Some(&parent_tree), &modified)? else {
        return Ok(None);
    };
    if update.root_object.oid() == &parent_commit.tree {
        info!(branch = %branch.name, "tree unchanged, skipping");
        return Ok(None);
    }

    for subtree in update.subtrees {
        objects.stage(subtree);
    }
    let tree = objects.stage(update.root_object);

    let message = ctx.template.render(&MessageVars {
        branch: branch.name.as_str(),
        query: ctx.query,
    });
    let commit = Commit {
        tree,
        parents: vec![parent],
        author: ctx.author.clone(),
        committer: ctx.author.clone(),
        message,
    };
    let commit = objects.stage(commit.to_object());

    info!(
        branch = %branch.name,
        %commit,
        files = modified.len(),
        objects = objects.len(),
        "built commit"
    );
    Ok(Some(BranchCommit {
        commit,
        modified,
        objects,
    }))
}
