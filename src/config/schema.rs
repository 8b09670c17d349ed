//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the dynamic proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy listener configuration.
    pub listener: ListenerConfig,

    /// Management API settings.
    pub admin: AdminConfig,

    /// Route storage backend.
    pub storage: StorageConfig,

    /// How routing keys are derived from requests.
    pub extractor: ExtractorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Management API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the management API.
    pub enabled: bool,

    /// Management API bind address.
    pub bind_address: String,

    /// Basic auth username. Auth is only enforced when both this and
    /// `password` are non-empty.
    pub username: String,

    /// Basic auth password.
    pub password: String,

    /// When false, DELETE requests succeed without removing anything.
    pub allow_delete: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
            username: String::new(),
            password: String::new(),
            allow_delete: true,
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Volatile, lost on restart.
    #[default]
    Memory,
    /// Durable SQLite database at `path`.
    Sqlite,
}

/// Route storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend kind.
    pub backend: StorageBackend,

    /// Database file (sqlite backend only).
    pub path: String,

    /// Routes stored at startup, key -> endpoint URL.
    pub seed: BTreeMap<String, String>,
}

/// Routing key extractor selection.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorConfig {
    /// Value of a request header.
    Header { name: String },

    /// Host header, lowercased.
    Host {
        #[serde(default)]
        strip_port: bool,
    },

    /// N-th non-empty path segment (zero-based).
    PathSegment {
        #[serde(default)]
        index: usize,
    },

    /// First value of a query parameter.
    Query { name: String },

    /// String or number at a JSON pointer in the request body.
    JsonPointer { pointer: String },
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self::Header {
            name: "x-route-key".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
