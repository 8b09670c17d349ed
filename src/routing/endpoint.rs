//! Routing value objects.
//!
//! # Responsibilities
//! - `RoutingKey`: opaque string joining a request to a stored route
//! - `Endpoint`: absolute http/https backend URL, optionally carrying a
//!   base path and query that act as a rewrite prefix
//!
//! # Design Decisions
//! - Endpoints are validated once at construction and immutable afterwards
//! - The textual form is kept verbatim (trimmed), so stored and listed values
//!   match what was put: `http://a.internal` gains no trailing slash and
//!   `http://a.internal:80/x` keeps its port
//! - Rewriting uses the parsed URL, whose path has dot segments resolved:
//!   `http://a.internal/svc/../x` prefixes requests with `/x`

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Opaque key identifying a route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutingKey(String);

impl RoutingKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoutingKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for RoutingKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl AsRef<str> for RoutingKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reasons a string cannot become an [`Endpoint`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// No scheme could be identified (e.g. `/api/v1`).
    #[error("missing scheme")]
    MissingScheme,

    /// Scheme present but not http or https.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// The URL has no host component.
    #[error("missing host")]
    MissingHost,

    /// Any other URL syntax error.
    #[error("invalid url: {0}")]
    Invalid(url::ParseError),
}

/// Absolute URL of a backend target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    url: Url,
    /// Trimmed input, used for display and persistence.
    raw: String,
    /// True when the input carried no path, e.g. `http://host` or `http://host?x=1`.
    bare: bool,
}

impl Endpoint {
    /// Parse and validate an endpoint URL.
    pub fn parse(input: &str) -> Result<Self, EndpointError> {
        let input = input.trim();
        let url = Url::parse(input).map_err(|e| match e {
            url::ParseError::RelativeUrlWithoutBase => EndpointError::MissingScheme,
            url::ParseError::EmptyHost => EndpointError::MissingHost,
            other => EndpointError::Invalid(other),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(EndpointError::MissingHost);
        }

        let bare = url.path() == "/" && !has_explicit_path(input);

        Ok(Self {
            url,
            raw: input.to_string(),
            bare,
        })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Host with optional port, as used in a request authority.
    pub fn authority(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Percent-escaped base path; empty when the endpoint was given without one.
    pub fn path(&self) -> &str {
        if self.bare {
            ""
        } else {
            self.url.path()
        }
    }

    /// Raw query string, empty when absent.
    pub fn query(&self) -> &str {
        self.url.query().unwrap_or("")
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn has_explicit_path(input: &str) -> bool {
    let after_scheme = match input.find("://") {
        Some(idx) => &input[idx + 3..],
        None => return true,
    };
    let end = after_scheme
        .find(|c| c == '?' || c == '#')
        .unwrap_or(after_scheme.len());
    after_scheme[..end].contains('/')
}
