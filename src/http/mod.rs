//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1, one task per connection)
//!     → request.rs (request ID)
//!     → routing::RequestDirector (buffer, extract, load, rewrite)
//!     → forwarder.rs (upstream exchange, response relay)
//!     → Send to client, or close the connection on abort
//! ```

pub mod forwarder;
pub mod request;
pub mod server;

pub use forwarder::{ForwardError, Forwarder, HttpForwarder};
pub use request::{ensure_request_id, RequestId, X_REQUEST_ID};
pub use server::{ProxyServer, ProxyService, ServeError};
