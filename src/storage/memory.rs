//! Volatile in-process route store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::routing::endpoint::{Endpoint, RoutingKey};
use crate::storage::{Storage, StorageError};

/// Routes held in a reader/writer-locked map for the process lifetime.
///
/// Reads proceed concurrently; a write excludes readers and other writers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    routes: RwLock<HashMap<RoutingKey, Endpoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.routes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStore {
    fn load(&self, key: &RoutingKey) -> Option<Endpoint> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn store(&self, key: RoutingKey, endpoint: Endpoint) -> Result<(), StorageError> {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, endpoint);
        Ok(())
    }

    fn delete(&self, key: &RoutingKey) -> Result<(), StorageError> {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn values(&self) -> HashMap<RoutingKey, Endpoint> {
        // Copy under the read lock; it is released when the guard drops.
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
