//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → consumed once at startup by the binary
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; routes are the runtime-mutable part
//!   and live in storage, not here
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, ExtractorConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    StorageBackend, StorageConfig,
};
