//! Dynamic reverse-proxy router library.
//!
//! Each inbound request is buffered, a routing key is extracted from it,
//! and the key is resolved through a shared [`storage::Storage`] to the
//! upstream the request is rewritten onto. Requests without a route are
//! dropped without a response. The management API mutates the same storage,
//! so route changes apply to the next request.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod storage;

pub use admin::{setup_admin_router, AdminState};
pub use config::ProxyConfig;
pub use http::{HttpForwarder, ProxyServer};
pub use lifecycle::Shutdown;
pub use routing::{Directive, Endpoint, RequestDirector, RoutingKey};
pub use storage::{SharedStorage, Storage};
