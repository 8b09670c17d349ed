//! Routing key extraction.
//!
//! # Responsibilities
//! - Hold the request together with its fully buffered body
//! - Derive a `RoutingKey` from request metadata and/or body
//! - Let an extractor substitute the body that gets forwarded
//!
//! # Design Decisions
//! - The body is buffered exactly once; extraction and forwarding both read it
//! - A replacement body set by an extractor always wins over the buffered one
//! - Plain closures are extractors, so embedders can route on anything

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, HeaderMap, Method, Request, Uri};
use url::form_urlencoded;

use crate::config::ExtractorConfig;
use crate::routing::endpoint::RoutingKey;

/// A request whose body has been read fully into memory.
#[derive(Debug)]
pub struct BufferedRequest {
    parts: Parts,
    body: Bytes,
    replacement: Option<Bytes>,
}

impl BufferedRequest {
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self {
            parts,
            body,
            replacement: None,
        }
    }

    /// Read the whole body of `request`. Fails if the client stream errors.
    pub async fn buffer(request: Request<Body>) -> Result<Self, axum::Error> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await?;
        Ok(Self::new(parts, body))
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut Parts {
        &mut self.parts
    }

    /// The body as received from the client.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Forward `body` instead of the buffered one.
    pub fn replace_body(&mut self, body: impl Into<Bytes>) {
        self.replacement = Some(body.into());
    }

    pub fn body_replaced(&self) -> bool {
        self.replacement.is_some()
    }

    /// Reassemble the outgoing request.
    pub fn into_request(self) -> Request<Body> {
        let body = self.replacement.unwrap_or(self.body);
        Request::from_parts(self.parts, Body::from(body))
    }
}

/// Derives a routing key from a buffered request.
///
/// Returning `None` aborts the request. Implementations may call
/// [`BufferedRequest::replace_body`] to change what gets forwarded.
pub trait Extractor: Send + Sync {
    fn extract(&self, request: &mut BufferedRequest) -> Option<RoutingKey>;
}

impl<F> Extractor for F
where
    F: Fn(&mut BufferedRequest) -> Option<RoutingKey> + Send + Sync,
{
    fn extract(&self, request: &mut BufferedRequest) -> Option<RoutingKey> {
        self(request)
    }
}

/// Build the extractor selected in configuration.
pub fn build_extractor(config: &ExtractorConfig) -> Arc<dyn Extractor> {
    match config {
        ExtractorConfig::Header { name } => Arc::new(HeaderExtractor::new(name.clone())),
        ExtractorConfig::Host { strip_port } => Arc::new(HostExtractor::new(*strip_port)),
        ExtractorConfig::PathSegment { index } => Arc::new(PathSegmentExtractor::new(*index)),
        ExtractorConfig::Query { name } => Arc::new(QueryExtractor::new(name.clone())),
        ExtractorConfig::JsonPointer { pointer } => {
            Arc::new(JsonPointerExtractor::new(pointer.clone()))
        }
    }
}

/// Uses the value of a request header.
#[derive(Debug, Clone)]
pub struct HeaderExtractor {
    name: String,
}

impl HeaderExtractor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Extractor for HeaderExtractor {
    fn extract(&self, request: &mut BufferedRequest) -> Option<RoutingKey> {
        request
            .headers()
            .get(self.name.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(RoutingKey::from)
    }
}

/// Uses the Host header, lowercased.
#[derive(Debug, Clone)]
pub struct HostExtractor {
    strip_port: bool,
}

impl HostExtractor {
    pub fn new(strip_port: bool) -> Self {
        Self { strip_port }
    }
}

impl Extractor for HostExtractor {
    fn extract(&self, request: &mut BufferedRequest) -> Option<RoutingKey> {
        let request: &BufferedRequest = request;
        let host = request
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| request.uri().authority().map(|a| a.as_str()))?
            .to_lowercase();

        let host = if self.strip_port {
            strip_port(&host).to_string()
        } else {
            host
        };

        if host.is_empty() {
            None
        } else {
            Some(RoutingKey::new(host))
        }
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal: keep the brackets, drop what follows them.
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rfind(':') {
        Some(idx) => &host[..idx],
        None => host,
    }
}

/// Uses the n-th non-empty path segment (zero-based).
#[derive(Debug, Clone)]
pub struct PathSegmentExtractor {
    index: usize,
}

impl PathSegmentExtractor {
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

impl Extractor for PathSegmentExtractor {
    fn extract(&self, request: &mut BufferedRequest) -> Option<RoutingKey> {
        request
            .uri()
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .nth(self.index)
            .map(RoutingKey::from)
    }
}

/// Uses the first value of a query parameter.
#[derive(Debug, Clone)]
pub struct QueryExtractor {
    name: String,
}

impl QueryExtractor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Extractor for QueryExtractor {
    fn extract(&self, request: &mut BufferedRequest) -> Option<RoutingKey> {
        let query = request.uri().query()?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == self.name.as_str())
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
            .map(RoutingKey::new)
    }
}

/// Uses a string or number found at a JSON pointer in the request body.
#[derive(Debug, Clone)]
pub struct JsonPointerExtractor {
    pointer: String,
}

impl JsonPointerExtractor {
    pub fn new(pointer: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
        }
    }
}

impl Extractor for JsonPointerExtractor {
    fn extract(&self, request: &mut BufferedRequest) -> Option<RoutingKey> {
        let document: serde_json::Value = serde_json::from_slice(request.body()).ok()?;
        match document.pointer(&self.pointer)? {
            serde_json::Value::String(s) if !s.is_empty() => Some(RoutingKey::new(s.clone())),
            serde_json::Value::Number(n) => Some(RoutingKey::new(n.to_string())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffered(builder: axum::http::request::Builder, body: &'static str) -> BufferedRequest {
        let (parts, _) = builder.body(()).unwrap().into_parts();
        BufferedRequest::new(parts, Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn test_header_extractor() {
        let extractor = HeaderExtractor::new("x-route-key");
        let mut req = buffered(Request::builder().header("X-Route-Key", " tenant-a "), "");
        assert_eq!(extractor.extract(&mut req), Some(RoutingKey::from("tenant-a")));

        let mut req = buffered(Request::builder().header("x-route-key", ""), "");
        assert_eq!(extractor.extract(&mut req), None);

        let mut req = buffered(Request::builder(), "");
        assert_eq!(extractor.extract(&mut req), None);
    }

    #[test]
    fn test_host_extractor() {
        let mut req = buffered(Request::builder().header("Host", "API.Example.com:8080"), "");
        assert_eq!(
            HostExtractor::new(true).extract(&mut req),
            Some(RoutingKey::from("api.example.com"))
        );
        assert_eq!(
            HostExtractor::new(false).extract(&mut req),
            Some(RoutingKey::from("api.example.com:8080"))
        );

        let mut req = buffered(Request::builder().header("Host", "[::1]:8080"), "");
        assert_eq!(
            HostExtractor::new(true).extract(&mut req),
            Some(RoutingKey::from("[::1]"))
        );
    }

    #[test]
    fn test_path_segment_extractor() {
        let mut req = buffered(Request::builder().uri("/tenants//acme/orders"), "");
        assert_eq!(
            PathSegmentExtractor::new(1).extract(&mut req),
            Some(RoutingKey::from("acme"))
        );
        assert_eq!(PathSegmentExtractor::new(5).extract(&mut req), None);
    }

    #[test]
    fn test_query_extractor() {
        let mut req = buffered(Request::builder().uri("/x?a=1&route=blue%20team&route=red"), "");
        assert_eq!(
            QueryExtractor::new("route").extract(&mut req),
            Some(RoutingKey::from("blue team"))
        );
        assert_eq!(QueryExtractor::new("missing").extract(&mut req), None);
    }

    #[test]
    fn test_json_pointer_extractor() {
        let extractor = JsonPointerExtractor::new("/meta/tenant");
        let mut req = buffered(Request::builder(), r#"{"meta":{"tenant":"acme"}}"#);
        assert_eq!(extractor.extract(&mut req), Some(RoutingKey::from("acme")));

        let mut req = buffered(Request::builder(), r#"{"meta":{"tenant":42}}"#);
        assert_eq!(extractor.extract(&mut req), Some(RoutingKey::from("42")));

        let mut req = buffered(Request::builder(), "not json");
        assert_eq!(extractor.extract(&mut req), None);
    }

    #[test]
    fn test_closure_extractor_can_replace_body() {
        let extractor = |req: &mut BufferedRequest| {
            let upper = req.body().to_ascii_uppercase();
            req.replace_body(upper);
            Some(RoutingKey::from("k"))
        };
        let mut req = buffered(Request::builder(), "hello");
        assert!(extractor.extract(&mut req).is_some());
        assert!(req.body_replaced());
        assert_eq!(req.body(), &Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_into_request_prefers_replacement() {
        let mut req = buffered(Request::builder(), "original");
        req.replace_body("replaced");
        let body = axum::body::to_bytes(req.into_request().into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, Bytes::from_static(b"replaced"));
    }
}
