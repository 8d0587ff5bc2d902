//! core::tree
//!
//! Rebuild a tree graph with a set of modified files, sharing every subtree
//! the modifications do not touch.
//!
//! # Algorithm
//!
//! Starting from the parent tree, each level:
//!
//! 1. copies the parent's entries (hashes of untouched entries are kept as is)
//! 2. replaces the hash of every file entry whose name equals a modified path
//! 3. for each directory entry, selects the modified paths below it
//!    (`dir/` boundary, never a raw string prefix), strips the prefix and
//!    recurses into the subtree
//! 4. replaces the directory's hash with the rebuilt subtree's hash and
//!    collects the rebuilt subtree as a new object
//!
//! Directories without modified paths are never loaded, re-encoded or
//! re-hashed. The cost is proportional to the number of modified files times
//! the tree depth, not to the size of the tree.

use thiserror::Error;

use super::object::{EntryMode, RawObject, Tree};
use super::types::Oid;

/// Errors raised while rebuilding a tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// A modified path names no file in the parent tree.
    #[error("path not found in tree: {path}")]
    PathNotFound { path: String },
}

/// A file whose content changed, addressed from the tree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedFile {
    /// Slash separated path relative to the tree it is applied to.
    pub path: String,
    /// Mode to record for the entry.
    pub mode: EntryMode,
    /// Hash of the new blob.
    pub blob: Oid,
}

impl ModifiedFile {
    pub fn new(path: impl Into<String>, mode: EntryMode, blob: Oid) -> Self {
        Self {
            path: path.into(),
            mode,
            blob,
        }
    }
}

/// Result of rebuilding a tree.
#[derive(Debug, Clone)]
pub struct TreeUpdate {
    /// The new root tree.
    pub root: Tree,
    /// The encoded root tree.
    pub root_object: RawObject,
    /// Rebuilt subtrees, children before their parents. Excludes the root.
    pub subtrees: Vec<RawObject>,
}

/// Rebuild `parent` with `files` applied.
///
/// `load` resolves a subtree hash to its tree; it is only called for
/// directories that contain at least one modified path. Returns `Ok(None)`
/// when there is no parent tree.
///
/// # Errors
///
/// Returns [`TreeError::PathNotFound`] (converted into `E`) when a modified
/// path does not exist in the parent, and any error `load` returns.
///
/// # Example
///
/// ```
/// use qyt::core::object::{EntryMode, RawObject, Tree, TreeEntry};
/// use qyt::core::tree::{build_tree, ModifiedFile, TreeError};
///
/// let old = RawObject::blob(&b"name: x\n"[..]);
/// let new = RawObject::blob(&b"name: z\n"[..]);
/// let parent = Tree::from_entries(vec![
///     TreeEntry::new("a.yaml", EntryMode::Blob, old.oid().clone()),
/// ]);
///
/// let files = [ModifiedFile::new("a.yaml", EntryMode::Blob, new.oid().clone())];
/// let mut no_subtrees = |_: &_| -> Result<Tree, TreeError> { unreachable!() };
/// let update = build_tree(&mut no_subtrees, Some(&parent), &files)
///     .unwrap()
///     .unwrap();
///
/// assert_eq!(&update.root.entries[0].oid, new.oid());
/// assert!(update.subtrees.is_empty());
/// ```
pub fn build_tree<E, F>(
    load: &mut F,
    parent: Option<&Tree>,
    files: &[ModifiedFile],
) -> Result<Option<TreeUpdate>, E>
where
    F: FnMut(&Oid) -> Result<Tree, E>,
    E: From<TreeError>,
{
    let Some(parent) = parent else {
        return Ok(None);
    };

    let mut subtrees = Vec::new();
    let root = rebuild(load, parent, files, "", &mut subtrees)?;
    let root_object = root.to_object();

    Ok(Some(TreeUpdate {
        root,
        root_object,
        subtrees,
    }))
}

fn rebuild<E, F>(
    load: &mut F,
    parent: &Tree,
    files: &[ModifiedFile],
    base: &str,
    subtrees: &mut Vec<RawObject>,
) -> Result<Tree, E>
where
    F: FnMut(&Oid) -> Result<Tree, E>,
    E: From<TreeError>,
{
    let mut tree = parent.clone();
    let mut applied = vec![false; files.len()];

    for entry in tree.entries.iter_mut() {
        // Modified paths are UTF-8, so they never address other names.
        let Some(name) = entry.name_str() else {
            continue;
        };

        if entry.mode.is_file() {
            if let Some(i) = files.iter().position(|f| f.path == name) {
                entry.set_file(files[i].mode, files[i].blob.clone());
                applied[i] = true;
            }
            continue;
        }
        if !entry.mode.is_tree() {
            continue;
        }

        let (indices, nested) = files_under(name, files);
        if nested.is_empty() {
            continue;
        }

        let subtree = load(&entry.oid)?;
        let path = join(base, name);
        let rebuilt = rebuild(load, &subtree, &nested, &path, subtrees)?;
        for i in indices {
            applied[i] = true;
        }
        if rebuilt == subtree {
            continue;
        }

        let object = rebuilt.to_object();
        entry.oid = object.oid().clone();
        subtrees.push(object);
    }

    if let Some(missing) = files.iter().zip(&applied).find(|(_, done)| !**done) {
        return Err(TreeError::PathNotFound {
            path: join(base, &missing.0.path),
        }
        .into());
    }

    Ok(tree)
}

/// Select the modified files inside directory `dir`, with paths made
/// relative to it.
///
/// Matching uses a full separator boundary: `dir` selects `dir/file.txt`
/// but never `dir_skip/file.txt`. Returns the indices of the selected
/// files alongside the rewritten copies.
///
/// # Example
///
/// ```
/// use qyt::core::object::EntryMode;
/// use qyt::core::tree::{files_under, ModifiedFile};
/// use qyt::core::types::Oid;
///
/// let oid = Oid::from_raw([1; 20]);
/// let files = [
///     ModifiedFile::new("dir_skip/file.txt", EntryMode::Blob, oid.clone()),
///     ModifiedFile::new("dir/file.txt", EntryMode::Blob, oid.clone()),
/// ];
/// let (indices, nested) = files_under("dir", &files);
/// assert_eq!(indices, [1]);
/// assert_eq!(nested[0].path, "file.txt");
/// ```
pub fn files_under(dir: &str, files: &[ModifiedFile]) -> (Vec<usize>, Vec<ModifiedFile>) {
    let prefix = format!("{dir}/");
    files
        .iter()
        .enumerate()
        .filter_map(|(i, file)| {
            let rest = file.path.strip_prefix(&prefix)?;
            Some((
                i,
                ModifiedFile {
                    path: rest.to_string(),
                    mode: file.mode,
                    blob: file.blob.clone(),
                },
            ))
        })
        .unzip()
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}
