//! Delete-blocking storage decorator.

use std::collections::HashMap;

use crate::routing::endpoint::{Endpoint, RoutingKey};
use crate::storage::{Storage, StorageError};

/// Wraps a storage so that `delete` does nothing.
///
/// Loads, stores and snapshots pass straight through to the inner storage.
#[derive(Debug)]
pub struct ReadOnlyStore<S> {
    inner: S,
}

impl<S: Storage> ReadOnlyStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Storage> Storage for ReadOnlyStore<S> {
    fn load(&self, key: &RoutingKey) -> Option<Endpoint> {
        self.inner.load(key)
    }

    fn store(&self, key: RoutingKey, endpoint: Endpoint) -> Result<(), StorageError> {
        self.inner.store(key, endpoint)
    }

    fn delete(&self, key: &RoutingKey) -> Result<(), StorageError> {
        tracing::debug!(key = %key, "Delete suppressed by read-only store");
        Ok(())
    }

    fn values(&self) -> HashMap<RoutingKey, Endpoint> {
        self.inner.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, SharedStorage};
    use std::sync::Arc;

    #[test]
    fn test_delete_never_changes_load() {
        let inner: SharedStorage = Arc::new(MemoryStore::new());
        let store = ReadOnlyStore::new(Arc::clone(&inner));
        let e = Endpoint::parse("http://a.internal").unwrap();

        store.store("a".into(), e.clone()).unwrap();
        store.delete(&"a".into()).unwrap();
        assert_eq!(store.load(&"a".into()), Some(e.clone()));
        assert_eq!(inner.load(&"a".into()), Some(e));

        // Absent keys stay absent
        store.delete(&"missing".into()).unwrap();
        assert_eq!(store.load(&"missing".into()), None);
    }

    #[test]
    fn test_passes_through_values() {
        let store = ReadOnlyStore::new(MemoryStore::new());
        store
            .store("a".into(), Endpoint::parse("http://a.internal").unwrap())
            .unwrap();
        store
            .store("b".into(), Endpoint::parse("http://b.internal").unwrap())
            .unwrap();
        assert_eq!(store.values().len(), 2);
        assert_eq!(store.into_inner().len(), 2);
    }
}
