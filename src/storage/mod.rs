//! Route storage subsystem.
//!
//! # Data Flow
//! ```text
//! Proxy request                      Management API
//!     → RequestDirector                  → GET / PUT / DELETE
//!     → Storage::load(key)               → Storage::{load, values, store, delete}
//!          ↘                            ↙
//!            SharedStorage (Arc<dyn Storage>)
//!                 ├─ memory.rs     (RwLock<HashMap>, process lifetime)
//!                 ├─ sqlite.rs     (single table, durable)
//!                 └─ read_only.rs  (decorator: delete is a no-op)
//! ```
//!
//! # Design Decisions
//! - One trait, injected through constructors; no process-wide state
//! - Lookups never fail: absence and unreadable rows are both a miss
//! - Writes report backend failures; deleting an absent key is still Ok
//! - Storage calls are synchronous and run on the blocking pool from async code

pub mod memory;
pub mod read_only;
pub mod sqlite;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};
use crate::routing::endpoint::{Endpoint, EndpointError, RoutingKey};

pub use memory::MemoryStore;
pub use read_only::ReadOnlyStore;
pub use sqlite::SqliteStore;

/// Errors surfaced by storage writes.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The relational engine rejected the statement.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The blocking task running the operation did not complete.
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A configured seed route is not a valid endpoint.
    #[error("invalid seed route {key}: {source}")]
    Seed {
        key: String,
        #[source]
        source: EndpointError,
    },
}

/// A mutable mapping from routing key to endpoint.
///
/// Each operation is atomic on its own. `values` returns a copy that
/// concurrent writes never touch.
pub trait Storage: Send + Sync {
    /// Look up `key`. `None` means absent or unreadable.
    fn load(&self, key: &RoutingKey) -> Option<Endpoint>;

    /// Insert or overwrite `key`.
    fn store(&self, key: RoutingKey, endpoint: Endpoint) -> Result<(), StorageError>;

    /// Remove `key`; absent keys are not an error.
    fn delete(&self, key: &RoutingKey) -> Result<(), StorageError>;

    /// Point-in-time snapshot of every route.
    fn values(&self) -> HashMap<RoutingKey, Endpoint>;
}

/// Storage handle shared between the proxy and the management API.
pub type SharedStorage = Arc<dyn Storage>;

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn load(&self, key: &RoutingKey) -> Option<Endpoint> {
        (**self).load(key)
    }

    fn store(&self, key: RoutingKey, endpoint: Endpoint) -> Result<(), StorageError> {
        (**self).store(key, endpoint)
    }

    fn delete(&self, key: &RoutingKey) -> Result<(), StorageError> {
        (**self).delete(key)
    }

    fn values(&self) -> HashMap<RoutingKey, Endpoint> {
        (**self).values()
    }
}

/// Run a storage operation on the blocking thread pool.
///
/// The durable store may block on disk I/O, so async callers never invoke
/// storage methods directly on a runtime worker.
pub async fn run_blocking<T, F>(storage: &SharedStorage, op: F) -> Result<T, StorageError>
where
    F: FnOnce(&dyn Storage) -> T + Send + 'static,
    T: Send + 'static,
{
    let storage = Arc::clone(storage);
    let result = tokio::task::spawn_blocking(move || op(&*storage)).await?;
    Ok(result)
}

/// Open the backend selected in configuration.
pub fn open_storage(config: &StorageConfig) -> Result<SharedStorage, StorageError> {
    let storage: SharedStorage = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(&config.path)?),
    };
    tracing::info!(backend = ?config.backend, "Route storage ready");
    Ok(storage)
}

/// Store the configured seed routes, overwriting existing entries.
pub fn seed_routes(
    storage: &dyn Storage,
    routes: &BTreeMap<String, String>,
) -> Result<usize, StorageError> {
    for (key, value) in routes {
        let endpoint = Endpoint::parse(value).map_err(|source| StorageError::Seed {
            key: key.clone(),
            source,
        })?;
        tracing::debug!(key = %key, endpoint = %endpoint, "Seeding route");
        storage.store(RoutingKey::new(key.as_str()), endpoint)?;
    }
    Ok(routes.len())
}
