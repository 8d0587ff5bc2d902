//! engine
//!
//! Runs queries across branches and persists their results as new commits.
//!
//! # Architecture
//!
//! The engine works against two collaborators it does not own: an
//! [`ObjectStore`](crate::store::ObjectStore) holding objects and refs, and
//! an [`Evaluator`](crate::query::Evaluator) for query expressions. Both are
//! passed in explicitly.
//!
//! ```text
//! resolve branches -> per branch: match files -> evaluate -> build tree -> commit
//!                  -> write objects (blobs, trees, commits) -> register refs
//! ```
//!
//! # Modules
//!
//! - [`resolve`] - Branch selection by regular expression
//! - [`matcher`] - Depth-first traversal of matching files
//! - [`writer`] - Staged object arena and deduplicating writer
//! - [`branch`] - Per-branch evaluation and commit construction
//! - [`apply`] - The staged apply operation
//! - [`query`] - The read-only query operation
//! - [`cancel`] - Cooperative cancellation
//!
//! # Invariants
//!
//! - Query never writes objects or refs
//! - Apply writes nothing until every branch has been evaluated and every
//!   destination checked
//! - Objects are written blobs first, then trees, then commits
//! - References are registered in branch resolution order, each with a
//!   compare-and-swap against the value observed when it was checked

pub mod apply;
pub mod branch;
pub mod cancel;
pub mod matcher;
pub mod query;
pub mod resolve;
pub mod writer;

pub use apply::{apply, ApplyOptions, ApplyReport, BranchOutcome};
pub use cancel::CancelToken;
pub use query::{query, QueryOptions, QuerySummary};
pub use resolve::{list_branches, resolve_branches, ResolvedBranch};

use thiserror::Error;

use crate::core::message::TemplateError;
use crate::core::object::{ObjectError, ObjectKind};
use crate::core::pattern::PatternError;
use crate::core::tree::TreeError;
use crate::core::types::{BranchName, Oid, RefName, TypeError};
use crate::query::QueryError;
use crate::store::StoreError;

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    // Input errors: reported before anything is read or written.
    #[error("invalid branch filter: {0}")]
    InvalidBranchFilter(#[source] PatternError),

    #[error("invalid file filter: {0}")]
    InvalidFileFilter(#[source] PatternError),

    #[error("failed to parse query: {0}")]
    InvalidQuery(#[source] QueryError),

    #[error("invalid commit message template: {0}")]
    InvalidTemplate(#[source] TemplateError),

    /// Prefix plus source branch does not form a valid branch name.
    #[error("cannot derive a destination branch from \"{branch}\": {source}")]
    InvalidDestination {
        branch: BranchName,
        #[source]
        source: TypeError,
    },

    // Resolution errors.
    #[error("{branch} does not point to a commit object: got a {kind} ({oid})")]
    NotACommit {
        branch: BranchName,
        oid: Oid,
        kind: ObjectKind,
    },

    /// Traversal started at an object that has no paths.
    #[error("unsupported object {oid}: cannot list files of a {kind}")]
    UnsupportedObject { oid: Oid, kind: ObjectKind },

    #[error("could not read {path:?} on {branch}: {source}")]
    Read {
        branch: BranchName,
        path: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Tree(#[from] TreeError),

    // Evaluation errors.
    #[error("could not apply query to file {path:?} on {branch}: {source}")]
    Evaluation {
        branch: BranchName,
        path: String,
        #[source]
        source: QueryError,
    },

    // Conflict errors.
    #[error("a branch named \"{branch}\" already exists ({refname})")]
    BranchExists { branch: BranchName, refname: RefName },

    // Encoding and storage errors.
    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("operation cancelled")]
    Cancelled,
}
