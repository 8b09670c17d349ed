//! Per-request routing decision.
//!
//! # Responsibilities
//! - Buffer the request body once
//! - Ask a `Director` where the request goes
//! - Rewrite the request URI onto the chosen endpoint
//! - Normalize the outgoing User-Agent and restore the body
//!
//! # Design Decisions
//! - The outcome is an explicit `Directive`; the serving loop decides how an
//!   abort reaches the wire, nothing here unwinds or panics
//! - Misses and malformed keys abort silently rather than answering 404,
//!   so probing clients cannot tell a wrong key from a network failure

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use futures_util::future::BoxFuture;

use crate::routing::endpoint::Endpoint;
use crate::routing::extractor::{BufferedRequest, Extractor};
use crate::routing::rewrite::rewrite_uri;
use crate::storage::{run_blocking, SharedStorage};

/// Outcome of directing a request.
#[derive(Debug)]
pub enum Directive<T = Option<Endpoint>> {
    /// Send the request on. For a routing decision, `None` means "forward
    /// without rewriting the URI".
    Forward(T),
    /// Close the client connection without a response.
    Abort,
    /// Something failed before a decision was reached; also closes silently.
    Error(String),
}

impl<T> Directive<T> {
    pub fn is_abort(&self) -> bool {
        matches!(self, Directive::Abort)
    }

    /// Label used for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Directive::Forward(_) => "forwarded",
            Directive::Abort => "aborted",
            Directive::Error(_) => "error",
        }
    }
}

/// Routing logic deciding the destination of a buffered request.
pub trait Director: Send + Sync {
    fn direct<'a>(&'a self, request: &'a mut BufferedRequest) -> BoxFuture<'a, Directive>;
}

/// Resolves the extracted key through a storage.
pub struct StorageDirector {
    storage: SharedStorage,
    extractor: Arc<dyn Extractor>,
}

impl StorageDirector {
    pub fn new(storage: SharedStorage, extractor: Arc<dyn Extractor>) -> Self {
        Self { storage, extractor }
    }
}

impl Director for StorageDirector {
    fn direct<'a>(&'a self, request: &'a mut BufferedRequest) -> BoxFuture<'a, Directive> {
        Box::pin(async move {
            let key = match self.extractor.extract(request) {
                Some(key) => key,
                None => {
                    tracing::debug!(path = %request.uri().path(), "No routing key extracted");
                    return Directive::Abort;
                }
            };

            let lookup = key.clone();
            match run_blocking(&self.storage, move |s| s.load(&lookup)).await {
                Ok(Some(endpoint)) => {
                    tracing::debug!(key = %key, endpoint = %endpoint, "Route resolved");
                    Directive::Forward(Some(endpoint))
                }
                Ok(None) => {
                    tracing::debug!(key = %key, "No route stored for key");
                    Directive::Abort
                }
                Err(e) => Directive::Error(format!("route lookup for {} failed: {}", key, e)),
            }
        })
    }
}

/// Turns an inbound request into a forwardable one, or an abort.
#[derive(Clone)]
pub struct RequestDirector {
    director: Arc<dyn Director>,
}

impl RequestDirector {
    /// Direct with custom routing logic.
    pub fn new(director: Arc<dyn Director>) -> Self {
        Self { director }
    }

    /// Direct by extracting a key and looking it up in `storage`.
    pub fn with_storage(storage: SharedStorage, extractor: Arc<dyn Extractor>) -> Self {
        Self::new(Arc::new(StorageDirector::new(storage, extractor)))
    }

    pub async fn direct(&self, request: Request<Body>) -> Directive<Request<Body>> {
        let mut buffered = match BufferedRequest::buffer(request).await {
            Ok(buffered) => buffered,
            Err(e) => return Directive::Error(format!("reading request body failed: {}", e)),
        };

        let target = match self.director.direct(&mut buffered).await {
            Directive::Forward(target) => target,
            Directive::Abort => return Directive::Abort,
            Directive::Error(detail) => return Directive::Error(detail),
        };

        if let Some(endpoint) = target {
            match rewrite_uri(buffered.uri(), &endpoint) {
                Ok(uri) => buffered.parts_mut().uri = uri,
                Err(e) => {
                    return Directive::Error(format!("rewriting onto {} failed: {}", endpoint, e))
                }
            }
        }

        // An absent User-Agent would let the client library fill in its own.
        let headers = &mut buffered.parts_mut().headers;
        if !headers.contains_key(header::USER_AGENT) {
            headers.insert(header::USER_AGENT, HeaderValue::from_static(""));
        }

        Directive::Forward(buffered.into_request())
    }
}
