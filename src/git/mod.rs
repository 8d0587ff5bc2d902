//! git
//!
//! Single interface for all repository access.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. All repository reads and writes
//! flow through this interface. No other module imports `git2`.
//!
//! # Responsibilities
//!
//! - Repository discovery and opening (bare repositories included)
//! - Object database reads and writes of pre-encoded objects
//! - Ref enumeration and CAS updates
//! - Commit identity from git configuration
//!
//! # Invariants
//!
//! - All ref updates use CAS (compare-and-swap) semantics
//! - Written objects must hash to the value computed in memory
//! - All operations return strong types (Oid, RefName)

mod interface;

pub use interface::{Git, GitError, Identity};
