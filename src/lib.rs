//! qyt - Query and transform YAML files across git branches
//!
//! qyt runs yq-style expressions on the YAML files of many branches at once,
//! reading straight from the git object database. `query` prints the results;
//! `apply` writes the changed files back as one new commit per branch and
//! registers it under a prefixed branch name. Nothing is ever checked out.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Query and apply orchestration over an object store
//! - [`query`] - The expression language and its evaluator
//! - [`core`] - Domain types, object encoding, trees, filters, config
//! - [`store`] - Object store abstraction and an in-memory store
//! - [`git`] - The git repository as an object store
//! - [`ui`] - Output formatting
//!
//! # Correctness Invariants
//!
//! qyt maintains the following invariants:
//!
//! 1. Source branches are never moved and their objects never rewritten
//! 2. Every input is validated and every branch evaluated before any write
//! 3. Objects are written before the references that point at them
//! 4. A destination branch is only moved when it still points where it was observed

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod query;
pub mod store;
pub mod ui;
