//! Management API over the route storage.
//!
//! # Data Flow
//! ```text
//! management request
//!     → auth.rs (Basic credentials, when configured)
//!     → handlers.rs (GET / PUT / DELETE dispatch)
//!     → Storage mutation, visible to the next proxied request
//! ```

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use crate::config::AdminConfig;
use crate::storage::{ReadOnlyStore, SharedStorage};

use self::auth::{admin_auth_middleware, Credentials};
use self::handlers::handle_routes;

/// State shared by the management handlers.
#[derive(Clone)]
pub struct AdminState {
    pub storage: SharedStorage,
    pub credentials: Option<Credentials>,
}

impl AdminState {
    pub fn new(storage: SharedStorage, credentials: Option<Credentials>) -> Self {
        Self {
            storage,
            credentials,
        }
    }

    /// Build from configuration, wrapping the storage read-only when deletes
    /// are disallowed.
    pub fn from_config(storage: SharedStorage, config: &AdminConfig) -> Self {
        let storage: SharedStorage = if config.allow_delete {
            storage
        } else {
            Arc::new(ReadOnlyStore::new(storage))
        };
        Self::new(
            storage,
            Credentials::new(config.username.clone(), config.password.clone()),
        )
    }
}

/// Router answering every path; the mount point is up to the caller.
pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .fallback(handle_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
