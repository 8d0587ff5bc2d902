//! store::memory
//!
//! In-memory object store for deterministic testing.
//!
//! # Design
//!
//! `MemoryStore` keeps objects in a map keyed by hash and refs in a sorted
//! map, so branch enumeration is ordered by name. It counts writes so tests
//! can verify deduplication, and can be configured to fail a specific
//! operation to exercise error paths.
//!
//! # Example
//!
//! ```
//! use qyt::core::object::RawObject;
//! use qyt::store::{MemoryStore, ObjectStore};
//!
//! let store = MemoryStore::new();
//! let blob = RawObject::blob(&b"name: x\n"[..]);
//!
//! store.write_object(&blob).unwrap();
//! store.write_object(&blob).unwrap();
//!
//! assert_eq!(store.object_count(), 1);
//! assert_eq!(store.read_blob(blob.oid()).unwrap(), b"name: x\n");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ObjectStore, RefEntry, StoreError};
use crate::core::object::{ObjectKind, RawObject};
use crate::core::types::{Oid, RefName};

/// In-memory object store.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    objects: HashMap<Oid, RawObject>,
    refs: BTreeMap<RefName, Oid>,
    /// Objects actually stored through `write_object`.
    writes: Vec<Oid>,
    /// Successful ref updates, in order.
    ref_updates: Vec<(RefName, Oid)>,
    fail_on: Option<FailOn>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOn {
    /// Fail writing any object of this kind.
    Write(ObjectKind),
    /// Fail updating this ref.
    SetRef(RefName),
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an object without counting it as a write.
    pub fn insert(&self, object: RawObject) -> Oid {
        let oid = object.oid().clone();
        self.lock().objects.insert(oid.clone(), object);
        oid
    }

    /// Point a ref at a target without any precondition.
    pub fn force_ref(&self, name: RefName, target: Oid) {
        self.lock().refs.insert(name, target);
    }

    /// Make the given operation fail.
    pub fn fail_on(&self, fail: FailOn) {
        self.lock().fail_on = Some(fail);
    }

    /// Number of distinct objects held.
    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    /// Hashes stored through `write_object`, in write order.
    pub fn writes(&self) -> Vec<Oid> {
        self.lock().writes.clone()
    }

    /// Successful `set_ref` calls, in order.
    pub fn ref_updates(&self) -> Vec<(RefName, Oid)> {
        self.lock().ref_updates.clone()
    }

    /// Snapshot of all refs.
    pub fn refs(&self) -> BTreeMap<RefName, Oid> {
        self.lock().refs.clone()
    }
}

impl ObjectStore for MemoryStore {
    fn read_object(&self, oid: &Oid) -> Result<RawObject, StoreError> {
        self.lock()
            .objects
            .get(oid)
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound { oid: oid.clone() })
    }

    fn contains(&self, oid: &Oid, kind: ObjectKind) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .objects
            .get(oid)
            .is_some_and(|object| object.kind() == kind))
    }

    fn write_object(&self, object: &RawObject) -> Result<Oid, StoreError> {
        let mut inner = self.lock();
        if inner.fail_on == Some(FailOn::Write(object.kind())) {
            return Err(StoreError::Backend(
                format!("injected failure writing {}", object.kind()).into(),
            ));
        }

        let oid = object.oid().clone();
        if !inner.objects.contains_key(&oid) {
            inner.objects.insert(oid.clone(), object.clone());
            inner.writes.push(oid.clone());
        }
        Ok(oid)
    }

    fn branches(&self) -> Result<Vec<RefEntry>, StoreError> {
        Ok(self
            .lock()
            .refs
            .iter()
            .filter(|(name, _)| name.is_branch_ref())
            .map(|(name, oid)| RefEntry {
                name: name.clone(),
                oid: oid.clone(),
            })
            .collect())
    }

    fn lookup_ref(&self, name: &RefName) -> Result<Option<Oid>, StoreError> {
        Ok(self.lock().refs.get(name).cloned())
    }

    fn set_ref(
        &self,
        name: &RefName,
        target: &Oid,
        expected_old: Option<&Oid>,
        _message: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.fail_on.as_ref() == Some(&FailOn::SetRef(name.clone())) {
            return Err(StoreError::Backend(
                format!("injected failure updating {name}").into(),
            ));
        }

        let current = inner.refs.get(name);
        if current != expected_old {
            return Err(StoreError::CasFailed {
                refname: name.clone(),
                expected: describe(expected_old),
                actual: describe(current),
            });
        }

        inner.refs.insert(name.clone(), target.clone());
        inner.ref_updates.push((name.clone(), target.clone()));
        Ok(())
    }
}

fn describe(oid: Option<&Oid>) -> String {
    oid.map_or_else(|| "<none>".to_string(), Oid::to_string)
}
