//! Request identification.
//!
//! # Responsibilities
//! - Reuse an inbound `x-request-id` or generate a UUID v4
//! - Stamp the id onto the request so it travels upstream
//!
//! # Design Decisions
//! - Request ID added before directing, so abort logs carry it too

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id of one proxied request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.0).ok()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Return the request's id, inserting a fresh one when absent or unusable.
pub fn ensure_request_id(headers: &mut HeaderMap) -> RequestId {
    let existing = headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| RequestId(v.to_string()));

    if let Some(id) = existing {
        return id;
    }

    let id = RequestId::generate();
    if let Some(value) = id.header_value() {
        headers.insert(X_REQUEST_ID, value);
    }
    id
}
