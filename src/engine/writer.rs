//! engine::writer
//!
//! Staging and persisting new objects.
//!
//! # Staging
//!
//! [`PendingObjects`] is an arena of encoded objects keyed by content hash.
//! Staging an object whose hash is already staged is a no-op, so identical
//! blobs produced on different branches collapse into one entry. Objects
//! are grouped by kind and keep their staging order within a group.
//!
//! # Writing
//!
//! [`ObjectWriter`] persists objects one at a time, skipping any the store
//! already holds. [`PendingObjects::write`] drives it in referential order:
//! every blob, then every tree (subtrees are staged before their parents),
//! then every commit.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::EngineError;
use crate::core::object::{ObjectKind, RawObject};
use crate::core::types::Oid;
use crate::store::{ObjectStore, StoreError};

/// Objects built in memory and not yet written.
#[derive(Debug, Clone, Default)]
pub struct PendingObjects {
    blobs: Vec<RawObject>,
    trees: Vec<RawObject>,
    commits: Vec<RawObject>,
    seen: HashSet<Oid>,
}

impl PendingObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an object. Returns its hash.
    pub fn stage(&mut self, object: RawObject) -> Oid {
        let oid = object.oid().clone();
        if !self.seen.insert(oid.clone()) {
            return oid;
        }
        match object.kind() {
            ObjectKind::Blob => self.blobs.push(object),
            ObjectKind::Tree => self.trees.push(object),
            ObjectKind::Commit | ObjectKind::Tag => self.commits.push(object),
        }
        oid
    }

    /// Stage every object of `other`, keeping its order.
    pub fn extend(&mut self, other: PendingObjects) {
        for object in other.blobs.into_iter().chain(other.trees).chain(other.commits) {
            self.stage(object);
        }
    }

    pub fn contains(&self, oid: &Oid) -> bool {
        self.seen.contains(oid)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn blobs(&self) -> &[RawObject] {
        &self.blobs
    }

    pub fn trees(&self) -> &[RawObject] {
        &self.trees
    }

    pub fn commits(&self) -> &[RawObject] {
        &self.commits
    }

    /// All staged objects in write order.
    pub fn iter(&self) -> impl Iterator<Item = &RawObject> {
        self.blobs.iter().chain(&self.trees).chain(&self.commits)
    }

    /// Write every staged object: blobs, then trees, then commits.
    pub fn write<S>(&self, store: &S) -> Result<WriteStats, EngineError>
    where
        S: ObjectStore + ?Sized,
    {
        let mut writer = ObjectWriter::new(store);
        for object in self.iter() {
            writer.write(object)?;
        }
        let stats = writer.stats();
        debug!(
            written = stats.written,
            existing = stats.existing,
            "wrote staged objects"
        );
        Ok(stats)
    }
}

/// Counts from a write phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Objects the store did not have.
    pub written: usize,
    /// Objects skipped because the store already had them.
    pub existing: usize,
}

/// Deduplicating object writer.
#[derive(Debug)]
pub struct ObjectWriter<'s, S: ?Sized> {
    store: &'s S,
    stats: WriteStats,
}

impl<'s, S: ObjectStore + ?Sized> ObjectWriter<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            stats: WriteStats::default(),
        }
    }

    /// Persist `object` unless the store already holds it.
    ///
    /// Safe to call any number of times with the same object.
    ///
    /// # Errors
    ///
    /// Store failures, and [`StoreError::HashMismatch`] if the store records
    /// the bytes under a different hash than the one computed in memory.
    pub fn write(&mut self, object: &RawObject) -> Result<Oid, EngineError> {
        let oid = object.oid();
        if self.store.contains(oid, object.kind())? {
            trace!(%oid, kind = %object.kind(), "object already present");
            self.stats.existing += 1;
            return Ok(oid.clone());
        }

        let stored = self.store.write_object(object)?;
        if &stored != oid {
            return Err(StoreError::HashMismatch {
                kind: object.kind(),
                expected: oid.clone(),
                actual: stored,
            }
            .into());
        }
        trace!(%oid, kind = %object.kind(), size = object.size(), "wrote object");
        self.stats.written += 1;
        Ok(stored)
    }

    pub fn stats(&self) -> WriteStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::object::{EntryMode, Tree, TreeEntry};
    use crate::store::{FailOn, MemoryStore};

    fn blob(content: &str) -> RawObject {
        RawObject::blob(content.as_bytes().to_vec())
    }

    fn tree_of(blob: &RawObject) -> RawObject {
        Tree::from_entries(vec![TreeEntry::new(
            "a.yaml",
            EntryMode::Blob,
            blob.oid().clone(),
        )])
        .to_object()
    }

    mod pending {
        use super::*;

        #[test]
        fn dedupes_by_hash() {
            let mut pending = PendingObjects::new();
            let first = pending.stage(blob("name: z\n"));
            let second = pending.stage(blob("name: z\n"));

            assert_eq!(first, second);
            assert_eq!(pending.len(), 1);
            assert_eq!(pending.blobs().len(), 1);
        }

        #[test]
        fn groups_by_kind() {
            let mut pending = PendingObjects::new();
            let b = blob("x");
            pending.stage(tree_of(&b));
            pending.stage(b.clone());

            let kinds: Vec<_> = pending.iter().map(RawObject::kind).collect();
            assert_eq!(kinds, [ObjectKind::Blob, ObjectKind::Tree]);
            assert!(pending.contains(b.oid()));
        }

        #[test]
        fn extend_merges_duplicates() {
            let mut left = PendingObjects::new();
            left.stage(blob("shared"));
            left.stage(blob("left"));

            let mut right = PendingObjects::new();
            right.stage(blob("shared"));
            right.stage(blob("right"));

            left.extend(right);
            assert_eq!(left.len(), 3);
            assert_eq!(left.blobs()[2].data(), b"right");
        }

        #[test]
        fn empty() {
            assert!(PendingObjects::new().is_empty());
        }
    }

    mod writing {
        use super::*;

        #[test]
        fn blobs_before_trees_before_commits() {
            let store = MemoryStore::new();
            let b = blob("name: z\n");
            let t = tree_of(&b);

            let mut pending = PendingObjects::new();
            pending.stage(t.clone());
            pending.stage(b.clone());
            pending.write(&store).unwrap();

            assert_eq!(store.writes(), [b.oid().clone(), t.oid().clone()]);
        }

        #[test]
        fn skips_objects_already_stored() {
            let store = MemoryStore::new();
            let b = blob("name: x\n");
            store.insert(b.clone());

            let mut writer = ObjectWriter::new(&store);
            writer.write(&b).unwrap();
            writer.write(&blob("name: y\n")).unwrap();
            writer.write(&blob("name: y\n")).unwrap();

            assert_eq!(
                writer.stats(),
                WriteStats {
                    written: 1,
                    existing: 2
                }
            );
            assert_eq!(store.writes().len(), 1);
        }

        #[test]
        fn store_failure_propagates() {
            let store = MemoryStore::new();
            store.fail_on(FailOn::Write(ObjectKind::Tree));
            let b = blob("x");

            let mut pending = PendingObjects::new();
            pending.stage(b.clone());
            pending.stage(tree_of(&b));

            assert!(matches!(
                pending.write(&store),
                Err(EngineError::Store(StoreError::Backend(_)))
            ));
            assert_eq!(store.writes(), [b.oid().clone()]);
        }
    }
}
