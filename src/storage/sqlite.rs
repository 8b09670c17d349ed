//! Durable route store backed by SQLite.
//!
//! # Schema
//! ```text
//! routes(key TEXT PRIMARY KEY, endpoint TEXT NOT NULL)
//! ```
//!
//! # Design Decisions
//! - Endpoints are stored as their URL text and re-validated on read
//! - A row that no longer parses is a miss on `load` and skipped by `values`
//! - Every operation opens its own connection; concurrency control is left
//!   to SQLite (WAL for files, so lookups proceed while a write is open)
//! - The in-memory variant is a named shared-cache database kept alive by
//!   one idle anchor connection

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use uuid::Uuid;

use crate::routing::endpoint::{Endpoint, RoutingKey};
use crate::storage::{Storage, StorageError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS routes (
        key TEXT PRIMARY KEY,
        endpoint TEXT NOT NULL
    );
";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Routes persisted in a single SQLite table.
pub struct SqliteStore {
    location: PathBuf,
    /// Keeps a shared in-memory database alive between operations. Never locked.
    anchor: Option<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path` and ensure the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let store = Self {
            location: path.as_ref().to_path_buf(),
            anchor: None,
        };

        let conn = store.connect()?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!(
            path = %path.as_ref().display(),
            journal_mode = %mode,
            "Opened route database"
        );
        Ok(store)
    }

    /// Private in-memory database, mostly useful in tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let location = PathBuf::from(format!(
            "file:dynamic-proxy-{}?mode=memory&cache=shared",
            Uuid::new_v4()
        ));
        let anchor = Connection::open_with_flags(&location, open_flags())?;
        anchor.execute_batch(SCHEMA)?;

        Ok(Self {
            location,
            anchor: Some(Mutex::new(anchor)),
        })
    }

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open_with_flags(&self.location, open_flags())?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        if self.anchor.is_some() {
            // Shared-cache readers otherwise take table locks that writers wait on.
            conn.pragma_update(None, "read_uncommitted", true)?;
        }
        Ok(conn)
    }
}

fn open_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
}

impl Storage for SqliteStore {
    fn load(&self, key: &RoutingKey) -> Option<Endpoint> {
        let row = self.connect().and_then(|conn| {
            conn.query_row(
                "SELECT endpoint FROM routes WHERE key = ?1",
                params![key.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()
        });

        let raw = match row {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Route lookup failed");
                return None;
            }
        };

        match Endpoint::parse(&raw) {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                tracing::warn!(key = %key, value = %raw, error = %e, "Stored endpoint is unreadable");
                None
            }
        }
    }

    fn store(&self, key: RoutingKey, endpoint: Endpoint) -> Result<(), StorageError> {
        self.connect()?.execute(
            "INSERT OR REPLACE INTO routes (key, endpoint) VALUES (?1, ?2)",
            params![key.as_str(), endpoint.to_string()],
        )?;
        Ok(())
    }

    fn delete(&self, key: &RoutingKey) -> Result<(), StorageError> {
        self.connect()?
            .execute("DELETE FROM routes WHERE key = ?1", params![key.as_str()])?;
        Ok(())
    }

    fn values(&self) -> HashMap<RoutingKey, Endpoint> {
        let mut values = HashMap::new();
        let conn = match self.connect() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Route scan failed");
                return values;
            }
        };

        let mut stmt = match conn.prepare("SELECT key, endpoint FROM routes") {
            Ok(stmt) => stmt,
            Err(e) => {
                tracing::warn!(error = %e, "Route scan failed");
                return values;
            }
        };

        let rows = match stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        }) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Route scan failed");
                return values;
            }
        };

        for row in rows {
            let (key, raw) = match row {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable route row");
                    continue;
                }
            };
            match Endpoint::parse(&raw) {
                Ok(endpoint) => {
                    values.insert(RoutingKey::new(key), endpoint);
                }
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Skipping unparsable endpoint");
                }
            }
        }

        values
    }
}
