//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to repository access in qyt.
//! Object encoding and hashing happen in [`crate::core::object`]; this
//! module only moves already encoded bytes in and out of the object
//! database and updates refs.
//!
//! # Architecture
//!
//! The `Git` struct is the only way to interact with a Git repository.
//! No other module imports `git2`. This ensures:
//!
//! - Consistent error handling across all Git operations
//! - Strong type guarantees at the boundary
//! - CAS (compare-and-swap) semantics for all ref mutations
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::ObjectNotFound`]: Requested object does not exist
//! - [`GitError::CasFailed`]: Compare-and-swap precondition failed
//!
//! # Example
//!
//! ```ignore
//! use qyt::git::Git;
//! use qyt::store::ObjectStore;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! for entry in git.branches()? {
//!     println!("{} -> {}", entry.name.short(), entry.oid.short(7));
//! }
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::object::{ObjectKind, RawObject};
use crate::core::types::{Oid, RefName, TypeError, BRANCH_NAMESPACE};
use crate::store::{ObjectStore, RefEntry, StoreError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Compare-and-swap precondition failed.
    ///
    /// The ref changed between the moment qyt checked it and the moment it
    /// tried to update it.
    #[error("CAS failed for {refname}: expected {expected}, found {actual}")]
    CasFailed {
        /// The ref being updated
        refname: String,
        /// The expected old value
        expected: String,
        /// The actual current value
        actual: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Object kind the object model does not represent.
    #[error("unsupported object type {kind} for {oid}")]
    UnsupportedObjectType {
        /// The OID of the object
        oid: String,
        /// The kind reported by the repository
        kind: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context.contains("ref") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg) => GitError::InvalidRefName { message: msg },
            TypeError::InvalidBranchName(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

impl From<GitError> for StoreError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::ObjectNotFound { oid } => match Oid::new(oid.as_str()) {
                Ok(parsed) => StoreError::ObjectNotFound { oid: parsed },
                Err(_) => StoreError::Backend(Box::new(GitError::ObjectNotFound { oid })),
            },
            other => StoreError::Backend(Box::new(other)),
        }
    }
}

/// A commit identity from git configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// `user.name`
    pub name: Option<String>,
    /// `user.email`
    pub email: Option<String>,
}

/// The Git interface.
///
/// Wraps a git2 repository. Bare repositories are supported: qyt reads and
/// writes objects and refs without touching a working directory.
///
/// # Example
///
/// ```ignore
/// use qyt::git::Git;
/// use qyt::store::ObjectStore;
///
/// let git = Git::open(Path::new("."))?;
/// let tip = git.lookup_ref(&RefName::new("refs/heads/main")?)?;
/// ```
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover` to find the repository root,
    /// so `path` can be any directory within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        Ok(Self { repo })
    }

    /// Get direct access to the .git directory path.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Read `user.name` and `user.email` from git configuration.
    pub fn identity(&self) -> Result<Identity, GitError> {
        let config = self
            .repo
            .config()
            .map_err(|e| GitError::from_git2(e, "config"))?;

        Ok(Identity {
            name: config.get_string("user.name").ok(),
            email: config.get_string("user.email").ok(),
        })
    }

    // =========================================================================
    // Ref Operations
    // =========================================================================

    /// List all refs matching a prefix, with their direct targets.
    ///
    /// Entries are sorted by ref name.
    pub fn list_refs_by_prefix(&self, prefix: &str) -> Result<Vec<RefEntry>, GitError> {
        let pattern = format!("{}*", prefix);
        let refs = self
            .repo
            .references_glob(&pattern)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        let mut entries = Vec::new();
        for reference in refs {
            let reference = reference.map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

            // Skip refs with non-UTF8 names
            let Some(name) = reference.name() else {
                continue;
            };

            // Skip invalid ref names
            let Ok(ref_name) = RefName::new(name) else {
                continue;
            };

            // Symbolic refs are resolved to their final target
            let resolved = reference.resolve().unwrap_or(reference);
            let Some(target) = resolved.target() else {
                continue;
            };

            entries.push(RefEntry {
                name: ref_name,
                oid: Oid::new(target.to_string())?,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Resolve a ref to its direct target, returning None if it doesn't exist.
    pub fn try_resolve_ref_to_object(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.repo.find_reference(refname) {
            Ok(reference) => {
                // Resolve symbolic refs to final target
                let resolved = reference.resolve().unwrap_or(reference);
                let oid = resolved.target().ok_or_else(|| GitError::Internal {
                    message: format!("ref {} has no target", refname),
                })?;
                Ok(Some(Oid::new(oid.to_string())?))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, refname)),
        }
    }

    /// Update a ref with compare-and-swap semantics.
    ///
    /// The update only succeeds if the ref's current value matches `expected_old`.
    /// If `expected_old` is `None`, the ref must not exist (create case).
    ///
    /// # Errors
    ///
    /// - [`GitError::CasFailed`] if the current value doesn't match expected
    pub fn update_ref_cas(
        &self,
        refname: &str,
        new_oid: &Oid,
        expected_old: Option<&Oid>,
        message: &str,
    ) -> Result<(), GitError> {
        let current = self.try_resolve_ref_to_object(refname)?;

        if current.as_ref() != expected_old {
            return Err(GitError::CasFailed {
                refname: refname.to_string(),
                expected: expected_old.map_or_else(|| "<none>".to_string(), Oid::to_string),
                actual: current.map_or_else(|| "<none>".to_string(), |oid| oid.to_string()),
            });
        }

        let oid = to_git2(new_oid)?;
        let result = match expected_old {
            // Let git2 re-check the old value under the ref lock
            Some(old) => self
                .repo
                .reference_matching(refname, oid, true, to_git2(old)?, message),
            None => self.repo.reference(refname, oid, false, message),
        };
        result.map_err(|e| GitError::from_git2(e, refname))?;

        Ok(())
    }

    // =========================================================================
    // Object Database
    // =========================================================================

    /// Read an object's kind and bytes.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the object doesn't exist
    pub fn read_raw(&self, oid: &Oid) -> Result<RawObject, GitError> {
        let odb = self.odb()?;
        let object = odb
            .read(to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        let kind = from_git2_kind(object.kind(), oid)?;

        Ok(RawObject::with_oid(kind, object.data(), oid.clone()))
    }

    /// Kind of an object, or None if it doesn't exist.
    pub fn object_kind(&self, oid: &Oid) -> Result<Option<ObjectKind>, GitError> {
        let odb = self.odb()?;
        match odb.read_header(to_git2(oid)?) {
            Ok((_, kind)) => Ok(Some(from_git2_kind(kind, oid)?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, oid.as_str())),
        }
    }

    /// Write an already encoded object and return the hash git computed.
    pub fn write_raw(&self, object: &RawObject) -> Result<Oid, GitError> {
        let odb = self.odb()?;
        let oid = odb
            .write(to_git2_kind(object.kind()), object.data())
            .map_err(|e| GitError::Internal {
                message: format!("writing {}: {}", object.kind(), e.message()),
            })?;

        Ok(Oid::new(oid.to_string())?)
    }

    fn odb(&self) -> Result<git2::Odb<'_>, GitError> {
        self.repo.odb().map_err(|e| GitError::from_git2(e, "odb"))
    }
}

impl ObjectStore for Git {
    fn read_object(&self, oid: &Oid) -> Result<RawObject, StoreError> {
        Ok(self.read_raw(oid)?)
    }

    fn contains(&self, oid: &Oid, kind: ObjectKind) -> Result<bool, StoreError> {
        Ok(self.object_kind(oid)? == Some(kind))
    }

    fn write_object(&self, object: &RawObject) -> Result<Oid, StoreError> {
        let written = self.write_raw(object)?;
        if &written != object.oid() {
            return Err(StoreError::HashMismatch {
                kind: object.kind(),
                expected: object.oid().clone(),
                actual: written,
            });
        }
        Ok(written)
    }

    fn branches(&self) -> Result<Vec<RefEntry>, StoreError> {
        Ok(self.list_refs_by_prefix(BRANCH_NAMESPACE)?)
    }

    fn lookup_ref(&self, name: &RefName) -> Result<Option<Oid>, StoreError> {
        Ok(self.try_resolve_ref_to_object(name.as_str())?)
    }

    fn set_ref(
        &self,
        name: &RefName,
        target: &Oid,
        expected_old: Option<&Oid>,
        message: &str,
    ) -> Result<(), StoreError> {
        self.update_ref_cas(name.as_str(), target, expected_old, message)
            .map_err(|err| match err {
                GitError::CasFailed {
                    expected, actual, ..
                } => StoreError::CasFailed {
                    refname: name.clone(),
                    expected,
                    actual,
                },
                other => other.into(),
            })
    }
}

fn to_git2(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
}

fn to_git2_kind(kind: ObjectKind) -> git2::ObjectType {
    match kind {
        ObjectKind::Blob => git2::ObjectType::Blob,
        ObjectKind::Tree => git2::ObjectType::Tree,
        ObjectKind::Commit => git2::ObjectType::Commit,
        ObjectKind::Tag => git2::ObjectType::Tag,
    }
}

fn from_git2_kind(kind: git2::ObjectType, oid: &Oid) -> Result<ObjectKind, GitError> {
    match kind {
        git2::ObjectType::Blob => Ok(ObjectKind::Blob),
        git2::ObjectType::Tree => Ok(ObjectKind::Tree),
        git2::ObjectType::Commit => Ok(ObjectKind::Commit),
        git2::ObjectType::Tag => Ok(ObjectKind::Tag),
        other => Err(GitError::UnsupportedObjectType {
            oid: oid.to_string(),
            kind: format!("{other:?}"),
        }),
    }
}
