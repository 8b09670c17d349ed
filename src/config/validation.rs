//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, limits and extractor parameters
//! - Check seed routes are valid endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use tracing::level_filters::LevelFilter;

use crate::config::schema::{ExtractorConfig, ProxyConfig, StorageBackend};
use crate::routing::endpoint::Endpoint;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than zero",
        ));
    }

    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.bind_address == config.listener.bind_address {
            errors.push(ValidationError::new(
                "admin.bind_address",
                "must differ from listener.bind_address",
            ));
        }
    }

    if config.storage.backend == StorageBackend::Sqlite && config.storage.path.trim().is_empty() {
        errors.push(ValidationError::new(
            "storage.path",
            "required for the sqlite backend",
        ));
    }
    for (key, raw) in &config.storage.seed {
        if let Err(e) = Endpoint::parse(raw) {
            errors.push(ValidationError::new(format!("storage.seed.{}", key), e.to_string()));
        }
    }

    match &config.extractor {
        ExtractorConfig::Header { name } | ExtractorConfig::Query { name } => {
            if name.trim().is_empty() {
                errors.push(ValidationError::new("extractor.name", "must not be empty"));
            }
        }
        ExtractorConfig::JsonPointer { pointer } => {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                errors.push(ValidationError::new(
                    "extractor.pointer",
                    "must be empty or start with '/'",
                ));
            }
        }
        ExtractorConfig::Host { .. } | ExtractorConfig::PathSegment { .. } => {}
    }

    if config.observability.log_level.parse::<LevelFilter>().is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            field,
            format!("'{}' is not a socket address", value),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_sqlite_requires_path() {
        let mut config = ProxyConfig::default();
        config.storage.backend = StorageBackend::Sqlite;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::new("storage.path", "required for the sqlite backend")]);
    }

    #[test]
    fn test_bad_seed_routes_are_named() {
        let mut config = ProxyConfig::default();
        config.storage.seed.insert("ok".into(), "http://ok.internal".into());
        config.storage.seed.insert("legacy".into(), "ftp://files.internal".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "storage.seed.legacy");
    }

    #[test]
    fn test_extractor_parameters() {
        let mut config = ProxyConfig::default();
        config.extractor = ExtractorConfig::Header { name: " ".into() };
        assert!(validate_config(&config).is_err());

        config.extractor = ExtractorConfig::JsonPointer {
            pointer: "tenant".into(),
        };
        assert!(validate_config(&config).is_err());

        config.extractor = ExtractorConfig::JsonPointer {
            pointer: "/tenant".into(),
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_admin_address_conflict() {
        let mut config = ProxyConfig::default();
        config.admin.bind_address = config.listener.bind_address.clone();
        assert!(validate_config(&config).is_err());

        config.admin.enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
