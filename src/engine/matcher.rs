//! engine::matcher
//!
//! Depth-first traversal of the files reachable from an object.
//!
//! # Dispatch
//!
//! The starting object is decoded into the closed [`Object`] enumeration and
//! dispatched by kind:
//!
//! - a commit continues at its tree
//! - an annotated tag continues at its target
//! - a tree lists its files recursively, paths relative to the tree
//! - a blob has no path and fails with [`EngineError::UnsupportedObject`]
//!
//! Entries are visited in tree order, and a directory is fully traversed
//! before its next sibling, so `a.yaml`, `b/b.yaml`, `c.yaml` are visited in
//! that order. Submodule entries are skipped.

use tracing::{debug, trace};

use super::EngineError;
use crate::core::object::{EntryMode, Object};
use crate::core::pattern::PathFilter;
use crate::core::types::Oid;
use crate::store::{ObjectStore, StoreError};

/// A file whose path matched the filter.
///
/// Content is read on demand through [`MatchedFile::read`].
#[derive(Debug)]
pub struct MatchedFile<'s, S: ?Sized> {
    path: String,
    mode: EntryMode,
    oid: Oid,
    store: &'s S,
}

impl<'s, S: ObjectStore + ?Sized> MatchedFile<'s, S> {
    /// Slash separated path from the traversal root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    /// Hash of the file's blob.
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// Read the file's bytes.
    pub fn read(&self) -> Result<Vec<u8>, StoreError> {
        self.store.read_blob(&self.oid)
    }
}

/// Call `visit` for every file under `root` whose path matches `filter`.
///
/// Stops at the first error, from the traversal or from `visit`.
pub fn for_each_matching_file<S, F>(
    store: &S,
    root: &Oid,
    filter: &PathFilter,
    mut visit: F,
) -> Result<(), EngineError>
where
    S: ObjectStore + ?Sized,
    F: FnMut(MatchedFile<'_, S>) -> Result<(), EngineError>,
{
    let mut oid = root.clone();
    loop {
        let object = store.read_object(&oid)?;
        match object.decode()? {
            Object::Commit(commit) => oid = commit.tree,
            Object::Tag(tag) => oid = tag.target,
            Object::Tree(_) => return walk(store, &oid, "", filter, &mut visit),
            Object::Blob(_) => {
                return Err(EngineError::UnsupportedObject {
                    oid,
                    kind: object.kind(),
                })
            }
        }
    }
}

fn walk<S, F>(
    store: &S,
    tree: &Oid,
    base: &str,
    filter: &PathFilter,
    visit: &mut F,
) -> Result<(), EngineError>
where
    S: ObjectStore + ?Sized,
    F: FnMut(MatchedFile<'_, S>) -> Result<(), EngineError>,
{
    for entry in store.read_tree(tree)?.entries {
        let Some(name) = entry.name_str() else {
            debug!(tree = %tree, name = %entry.name.escape_ascii(), "skipping non UTF-8 entry");
            continue;
        };
        let path = if base.is_empty() {
            name.to_string()
        } else {
            format!("{base}/{name}")
        };

        if entry.mode.is_tree() {
            walk(store, &entry.oid, &path, filter, visit)?;
        } else if entry.mode.is_file() && filter.is_match(&path) {
            trace!(%path, oid = %entry.oid, "matched file");
            visit(MatchedFile {
                path,
                mode: entry.mode,
                oid: entry.oid,
                store,
            })?;
        }
    }
    Ok(())
}
