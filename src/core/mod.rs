//! core
//!
//! Core domain types, encodings and pure algorithms for qyt.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RefName
//! - [`object`] - Git object model, encoding and content hashing
//! - [`tree`] - Tree rebuilding with structural sharing
//! - [`pattern`] - Branch and file filters
//! - [`message`] - Commit message templates
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Nothing in `core` touches a repository; objects are built and hashed
//!   in memory and handed to a store by the engine
//! - Encodings are byte-compatible with git, so hashes match what git computes
//! - Strong typing prevents invalid names from reaching a ref write

pub mod config;
pub mod message;
pub mod object;
pub mod pattern;
pub mod tree;
pub mod types;
