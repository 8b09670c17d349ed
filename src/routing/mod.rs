//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request
//!     → extractor.rs (buffer body, derive RoutingKey)
//!     → director.rs  (Storage::load(key))
//!     → rewrite.rs   (scheme/host from endpoint, path prefix, query merge)
//!     → Return: Directive::Forward(request) | Abort | Error
//! ```
//!
//! # Design Decisions
//! - No static route table: every decision goes through the storage, so
//!   routes changed by the management API apply to the next request
//! - No caching layer between director and storage
//! - Extraction is pluggable; routing logic as a whole is pluggable too

pub mod director;
pub mod endpoint;
pub mod extractor;
pub mod rewrite;

pub use director::{Director, Directive, RequestDirector, StorageDirector};
pub use endpoint::{Endpoint, EndpointError, RoutingKey};
pub use extractor::{build_extractor, BufferedRequest, Extractor};
