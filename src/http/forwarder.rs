//! Upstream forwarding.
//!
//! # Responsibilities
//! - Send a directed request to its upstream
//! - Relay status, headers and body back unchanged
//!
//! # Design Decisions
//! - Redirects are returned to the client, never followed
//! - Hop-by-hop headers are stripped in both directions
//! - The inbound Host header is kept; only the URL moves
//! - A failed upstream exchange is a 502, not an abort

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::observability::metrics;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("no upstream target for {0}")]
    NoTarget(Uri),

    #[error("invalid upstream url: {0}")]
    Url(#[from] url::ParseError),

    #[error("reading request body failed: {0}")]
    Body(#[from] axum::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

/// Sends a directed request upstream and produces the client response.
pub trait Forwarder: Send + Sync {
    fn forward(&self, request: Request<Body>, client_addr: SocketAddr) -> BoxFuture<'_, Response>;
}

/// Forwarder backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new() -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Use a preconfigured client. It should not follow redirects.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn try_forward(
        &self,
        request: Request<Body>,
        client_addr: SocketAddr,
    ) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();
        let url = upstream_url(&parts.uri, &parts.headers)?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        // Recomputed from the body actually sent, which an extractor may have replaced.
        headers.remove(header::CONTENT_LENGTH);
        append_forwarded_for(&mut headers, client_addr.ip());

        let body = axum::body::to_bytes(body, usize::MAX).await?;

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        Ok(relay_response(upstream))
    }
}

impl Forwarder for HttpForwarder {
    fn forward(&self, request: Request<Body>, client_addr: SocketAddr) -> BoxFuture<'_, Response> {
        Box::pin(async move {
            match self.try_forward(request, client_addr).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, "Upstream exchange failed");
                    metrics::record_upstream_failure();
                    (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
                }
            }
        })
    }
}

/// Absolute URL for the request, falling back to its Host header when the
/// URI was not rewritten.
fn upstream_url(uri: &Uri, headers: &HeaderMap) -> Result<url::Url, ForwardError> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Ok(url::Url::parse(&uri.to_string())?);
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .ok_or_else(|| ForwardError::NoTarget(uri.clone()))?;
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    Ok(url::Url::parse(&format!("http://{}{}", host, path_and_query))?)
}

fn relay_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Remove hop-by-hop headers, including any the Connection header names.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Append the client address to `X-Forwarded-For`.
pub fn append_forwarded_for(headers: &mut HeaderMap, client_ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        client_ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), client_ip)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
