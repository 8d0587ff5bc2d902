//! store
//!
//! The object store boundary.
//!
//! # Overview
//!
//! The engine never talks to a repository directly. It reads and appends
//! objects, enumerates branches and sets references through the
//! [`ObjectStore`] trait:
//!
//! - [`crate::git::Git`] implements it against a real repository
//! - [`MemoryStore`] implements it in memory for deterministic tests
//!
//! # Contract
//!
//! - Objects are immutable and addressed by content hash. Writing an object
//!   that already exists is a no-op, not an error.
//! - `write_object` must store exactly the bytes given and return the same
//!   hash the object was computed with. A store that disagrees is corrupt.
//! - `set_ref` is compare-and-swap: the update succeeds only if the current
//!   value equals `expected_old` (`None` meaning "must not exist").
//! - `branches` returns entries in a stable enumeration order.

pub mod memory;

pub use memory::{FailOn, MemoryStore};

use thiserror::Error;

use crate::core::object::{Commit, ObjectError, ObjectKind, RawObject, Tree};
use crate::core::types::{Oid, RefName};

/// Errors from object store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Requested object does not exist.
    #[error("object not found: {oid}")]
    ObjectNotFound { oid: Oid },

    /// Object exists but has a different kind than required.
    #[error("object {oid} is a {actual}, expected a {expected}")]
    WrongKind {
        oid: Oid,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    /// Object payload could not be decoded.
    #[error("object {oid} is malformed: {source}")]
    Corrupt {
        oid: Oid,
        #[source]
        source: ObjectError,
    },

    /// The store hashed written bytes differently.
    #[error("hash mismatch writing {kind}: computed {expected}, store returned {actual}")]
    HashMismatch {
        kind: ObjectKind,
        expected: Oid,
        actual: Oid,
    },

    /// Compare-and-swap precondition failed.
    #[error("ref update rejected for {refname}: expected {expected}, found {actual}")]
    CasFailed {
        refname: RefName,
        expected: String,
        actual: String,
    },

    /// Failure inside the backing repository.
    #[error("{0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A ref with its name and direct target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    /// The full ref name
    pub name: RefName,
    /// The object the ref points to, not peeled
    pub oid: Oid,
}

/// A content-addressed object store with named references.
pub trait ObjectStore {
    /// Read an object with its kind.
    fn read_object(&self, oid: &Oid) -> Result<RawObject, StoreError>;

    /// Whether an object with this hash and kind is present.
    fn contains(&self, oid: &Oid, kind: ObjectKind) -> Result<bool, StoreError>;

    /// Persist an object. Returns the hash the store recorded it under.
    fn write_object(&self, object: &RawObject) -> Result<Oid, StoreError>;

    /// All branch refs (`refs/heads/*`) in enumeration order.
    fn branches(&self) -> Result<Vec<RefEntry>, StoreError>;

    /// Current target of a ref, if it exists.
    fn lookup_ref(&self, name: &RefName) -> Result<Option<Oid>, StoreError>;

    /// Point `name` at `target` if its current value equals `expected_old`.
    fn set_ref(
        &self,
        name: &RefName,
        target: &Oid,
        expected_old: Option<&Oid>,
        message: &str,
    ) -> Result<(), StoreError>;

    /// Read an object and require a kind.
    fn read_kind(&self, oid: &Oid, kind: ObjectKind) -> Result<RawObject, StoreError> {
        let object = self.read_object(oid)?;
        if object.kind() != kind {
            return Err(StoreError::WrongKind {
                oid: oid.clone(),
                expected: kind,
                actual: object.kind(),
            });
        }
        Ok(object)
    }

    /// Read and decode a tree.
    fn read_tree(&self, oid: &Oid) -> Result<Tree, StoreError> {
        let object = self.read_kind(oid, ObjectKind::Tree)?;
        Tree::decode(object.data()).map_err(|source| StoreError::Corrupt {
            oid: oid.clone(),
            source,
        })
    }

    /// Read and decode a commit.
    fn read_commit(&self, oid: &Oid) -> Result<Commit, StoreError> {
        let object = self.read_kind(oid, ObjectKind::Commit)?;
        Commit::decode(object.data()).map_err(|source| StoreError::Corrupt {
            oid: oid.clone(),
            source,
        })
    }

    /// Read the bytes of a blob.
    fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>, StoreError> {
        Ok(self.read_kind(oid, ObjectKind::Blob)?.data().to_vec())
    }
}
