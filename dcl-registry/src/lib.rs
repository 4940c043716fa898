//! C9: the per-process table binding a host-issued `ObjectId` to whatever
//! local handle that object resolves to. Used on both sides of a
//! connection, with different handle flavors (spec.md §3 "Object
//! registry", `original_source/dclasio`'s `CLObjectRegistry`):
//!
//! - the host side binds ids to its own front-end handles and owns them
//!   outright;
//! - the daemon side binds ids to driver-owned, refcounted resources and
//!   should not keep them alive past their last reference — callers use
//!   `Registry<Weak<T>>` there so a dropped resource prunes itself out of
//!   the table on next lookup instead of leaking forever.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, Weak};

use dcl_core::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Context,
    CommandQueue,
    Buffer,
    SubBuffer,
    Program,
    Kernel,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// `bind` was called with an id already bound for that kind.
    AlreadyBound(ObjectKind, ObjectId),
    /// `lookup`/`unbind` named an id with no entry (or whose `Weak` handle
    /// has since expired).
    NotBound(ObjectKind, ObjectId),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::AlreadyBound(kind, id) => {
                write!(f, "{:?} {} is already bound", kind, id)
            }
            RegistryError::NotBound(kind, id) => write!(f, "{:?} {} is not bound", kind, id),
        }
    }
}

impl std::error::Error for RegistryError {}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Per-kind `object_id -> handle` map. Generic over the handle type so the
/// host side can store `Arc<T>` (owned) and the daemon side `Weak<T>`
/// (refcounted, pruned on expiry).
pub struct Registry<T> {
    kinds: Mutex<HashMap<ObjectKind, HashMap<ObjectId, T>>>,
}

impl<T: Clone> Registry<T> {
    pub fn new() -> Self {
        Registry { kinds: Mutex::new(HashMap::new()) }
    }

    pub fn bind(&self, kind: ObjectKind, id: ObjectId, handle: T) -> RegistryResult<()> {
        let mut kinds = self.kinds.lock().unwrap();
        let table = kinds.entry(kind).or_default();
        if table.contains_key(&id) {
            return Err(RegistryError::AlreadyBound(kind, id));
        }
        table.insert(id, handle);
        Ok(())
    }

    pub fn unbind(&self, kind: ObjectKind, id: ObjectId) -> RegistryResult<T> {
        let mut kinds = self.kinds.lock().unwrap();
        kinds
            .get_mut(&kind)
            .and_then(|table| table.remove(&id))
            .ok_or(RegistryError::NotBound(kind, id))
    }

    pub fn lookup(&self, kind: ObjectKind, id: ObjectId) -> RegistryResult<T> {
        let kinds = self.kinds.lock().unwrap();
        kinds
            .get(&kind)
            .and_then(|table| table.get(&id))
            .cloned()
            .ok_or(RegistryError::NotBound(kind, id))
    }

    pub fn ids_of_kind(&self, kind: ObjectKind) -> Vec<ObjectId> {
        let kinds = self.kinds.lock().unwrap();
        kinds.get(&kind).map(|table| table.keys().copied().collect()).unwrap_or_default()
    }

    /// Bulk lookup used for wait-lists and multi-device `BuildProgram`
    /// requests: either every id resolves, or the first missing one is
    /// reported (spec.md's "unknown ids" edge case).
    pub fn lookup_many(&self, kind: ObjectKind, ids: &[ObjectId]) -> RegistryResult<Vec<T>> {
        ids.iter().map(|id| self.lookup(kind, *id)).collect()
    }
}

impl<T: Clone> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<Weak<T>> {
    /// Looks up a refcounted daemon-side handle, upgrading the `Weak` and
    /// pruning the entry if the underlying resource has already been
    /// dropped elsewhere.
    pub fn lookup_live(&self, kind: ObjectKind, id: ObjectId) -> RegistryResult<std::sync::Arc<T>> {
        let weak = self.lookup(kind, id)?;
        match weak.upgrade() {
            Some(strong) => Ok(strong),
            None => {
                let _ = self.unbind(kind, id);
                Err(RegistryError::NotBound(kind, id))
            }
        }
    }

    /// `original_source/dclasio`'s registry distinguishes a plain buffer
    /// from a sub-buffer view onto one; this mirrors that by trying
    /// `Buffer` first, then `SubBuffer`, so callers that only care "is
    /// this id some kind of memory object" don't need to know which.
    pub fn lookup_memory(&self, id: ObjectId) -> RegistryResult<std::sync::Arc<T>> {
        self.lookup_live(ObjectKind::Buffer, id)
            .or_else(|_| self.lookup_live(ObjectKind::SubBuffer, id))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn bind_then_lookup_round_trips() {
        let registry: Registry<Arc<u32>> = Registry::new();
        registry.bind(ObjectKind::Context, ObjectId(1), Arc::new(42)).unwrap();
        assert_eq!(*registry.lookup(ObjectKind::Context, ObjectId(1)).unwrap(), 42);
    }

    #[test]
    fn binding_the_same_id_twice_is_rejected() {
        let registry: Registry<Arc<u32>> = Registry::new();
        registry.bind(ObjectKind::Context, ObjectId(1), Arc::new(1)).unwrap();
        let err = registry.bind(ObjectKind::Context, ObjectId(1), Arc::new(2)).unwrap_err();
        assert_eq!(err, RegistryError::AlreadyBound(ObjectKind::Context, ObjectId(1)));
    }

    #[test]
    fn unbind_removes_the_entry() {
        let registry: Registry<Arc<u32>> = Registry::new();
        registry.bind(ObjectKind::Event, ObjectId(5), Arc::new(9)).unwrap();
        registry.unbind(ObjectKind::Event, ObjectId(5)).unwrap();
        assert!(registry.lookup(ObjectKind::Event, ObjectId(5)).is_err());
    }

    #[test]
    fn ids_of_kind_only_returns_that_kind() {
        let registry: Registry<Arc<u32>> = Registry::new();
        registry.bind(ObjectKind::Buffer, ObjectId(1), Arc::new(1)).unwrap();
        registry.bind(ObjectKind::Buffer, ObjectId(2), Arc::new(2)).unwrap();
        registry.bind(ObjectKind::Context, ObjectId(3), Arc::new(3)).unwrap();

        let mut ids = registry.ids_of_kind(ObjectKind::Buffer);
        ids.sort_by_key(|id| id.0);
        assert_eq!(ids, vec![ObjectId(1), ObjectId(2)]);
    }

    #[test]
    fn lookup_many_stops_at_the_first_missing_id() {
        let registry: Registry<Arc<u32>> = Registry::new();
        registry.bind(ObjectKind::Kernel, ObjectId(1), Arc::new(1)).unwrap();
        let err = registry
            .lookup_many(ObjectKind::Kernel, &[ObjectId(1), ObjectId(2)])
            .unwrap_err();
        assert_eq!(err, RegistryError::NotBound(ObjectKind::Kernel, ObjectId(2)));
    }

    #[test]
    fn weak_registry_prunes_expired_handles_on_lookup() {
        let registry: Registry<Weak<u32>> = Registry::new();
        let strong = Arc::new(7u32);
        registry.bind(ObjectKind::Buffer, ObjectId(1), Arc::downgrade(&strong)).unwrap();

        assert_eq!(*registry.lookup_live(ObjectKind::Buffer, ObjectId(1)).unwrap(), 7);

        drop(strong);
        assert!(registry.lookup_live(ObjectKind::Buffer, ObjectId(1)).is_err());
        // the expired entry was pruned, not merely reported as missing
        assert!(registry.lookup(ObjectKind::Buffer, ObjectId(1)).is_err());
    }

    #[test]
    fn lookup_memory_finds_sub_buffers_too() {
        let registry: Registry<Weak<u32>> = Registry::new();
        let strong = Arc::new(3u32);
        registry.bind(ObjectKind::SubBuffer, ObjectId(9), Arc::downgrade(&strong)).unwrap();
        assert_eq!(*registry.lookup_memory(ObjectId(9)).unwrap(), 3);
    }
}
