//! Proxy serving loop.
//!
//! # Responsibilities
//! - Accept connections on the bounded listener
//! - Serve HTTP/1.1 on each connection with hyper
//! - Direct every request, then forward it or drop the connection
//! - Drain in-flight connections on shutdown
//!
//! # Design Decisions
//! - Abort and director errors surface as a service error, so hyper closes
//!   the connection without writing a response
//! - Upstream failures are the forwarder's concern and still answer the client

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, response::Response};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::http::forwarder::Forwarder;
use crate::http::request::ensure_request_id;
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::routing::{Directive, RequestDirector};

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Reasons a request ends without a response.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("request aborted by director")]
    Aborted,

    #[error("directing request failed: {0}")]
    Failed(String),
}

/// Per-request pipeline shared by every connection.
#[derive(Clone)]
pub struct ProxyService {
    director: RequestDirector,
    forwarder: Arc<dyn Forwarder>,
}

impl ProxyService {
    pub fn new(director: RequestDirector, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            director,
            forwarder,
        }
    }

    /// Direct one request and forward it, or fail with the reason it was dropped.
    pub async fn handle(
        &self,
        mut request: Request<Body>,
        client_addr: SocketAddr,
    ) -> Result<Response, ServeError> {
        let request_id = ensure_request_id(request.headers_mut());
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let directive = self.director.direct(request).await;
        metrics::record_request(directive.outcome());

        match directive {
            Directive::Forward(request) => {
                tracing::debug!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    upstream = %request.uri(),
                    "Forwarding request"
                );
                Ok(self.forwarder.forward(request, client_addr).await)
            }
            Directive::Abort => {
                tracing::debug!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    "No route, closing connection"
                );
                Err(ServeError::Aborted)
            }
            Directive::Error(detail) => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    error = %detail,
                    "Directing failed, closing connection"
                );
                Err(ServeError::Failed(detail))
            }
        }
    }
}

/// The reverse proxy's front end.
pub struct ProxyServer {
    listener: Listener,
    service: ProxyService,
    tracker: ConnectionTracker,
    drain_timeout: Duration,
}

impl ProxyServer {
    pub fn new(listener: Listener, director: RequestDirector, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            listener,
            service: ProxyService::new(director, forwarder),
            tracker: ConnectionTracker::new(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// How long shutdown waits for open connections.
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` fires, then drain.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), ListenerError> {
        let mut shutdown_rx = shutdown.subscribe();
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(address = %addr, "Proxy server starting");
        }

        loop {
            if shutdown.is_triggered() {
                break;
            }
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_connection(stream, peer, permit, &shutdown),
                    Err(ListenerError::Accept(e)) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                    Err(e) => return Err(e),
                },
                _ = shutdown_rx.recv() => break,
            }
        }

        drop(self.listener);
        tracing::info!(
            active_connections = self.tracker.active_count(),
            "Proxy stopped accepting, draining connections"
        );
        if !self.tracker.wait_idle(self.drain_timeout).await {
            tracing::warn!(
                active_connections = self.tracker.active_count(),
                "Drain timeout elapsed with connections still open"
            );
        }

        tracing::info!("Proxy server stopped");
        Ok(())
    }

    fn spawn_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        permit: ConnectionPermit,
        shutdown: &Shutdown,
    ) {
        let service = self.service.clone();
        let guard = self.tracker.track();
        let mut shutdown_rx = shutdown.subscribe();

        tokio::spawn(async move {
            let _permit = permit;
            let connection_id = guard.id();

            let hyper_service = service_fn(move |request: Request<Incoming>| {
                let service = service.clone();
                async move { service.handle(request.map(Body::new), peer).await }
            });

            let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), hyper_service);
            tokio::pin!(conn);

            let result = tokio::select! {
                res = conn.as_mut() => res,
                _ = shutdown_rx.recv() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };

            if let Err(e) = result {
                tracing::debug!(
                    connection_id = %connection_id,
                    peer_addr = %peer,
                    error = %e,
                    "Connection closed with error"
                );
            }
            drop(guard);
        });
    }
}
