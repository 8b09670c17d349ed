//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Bytes, http::Request, Json, Router};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use dynamic_proxy::http::{HttpForwarder, ProxyServer};
use dynamic_proxy::lifecycle::Shutdown;
use dynamic_proxy::net::Listener;
use dynamic_proxy::routing::{Extractor, RequestDirector};
use dynamic_proxy::storage::SharedStorage;

/// Start a backend that echoes what it received as JSON.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().fallback(echo);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(request: Request<axum::body::Body>) -> Json<Value> {
    let (parts, body) = request.into_parts();
    let body: Bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    Json(json!({
        "method": parts.method.as_str(),
        "uri": parts.uri.to_string(),
        "host": header("host"),
        "user_agent": header("user-agent"),
        "x_forwarded_for": header("x-forwarded-for"),
        "x_request_id": header("x-request-id"),
        "body": String::from_utf8_lossy(&body),
    }))
}

/// A running proxy bound to an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_proxy(storage: SharedStorage, extractor: Arc<dyn Extractor>) -> TestProxy {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, 64);

    let director = RequestDirector::with_storage(storage, extractor);
    let forwarder = Arc::new(HttpForwarder::new().unwrap());
    let shutdown = Shutdown::new();

    let server = ProxyServer::new(listener, director, forwarder)
        .with_drain_timeout(Duration::from_secs(1));
    tokio::spawn(server.run(shutdown.clone()));

    TestProxy { addr, shutdown }
}

/// Send a raw HTTP/1.1 request and return every byte the server wrote
/// before closing the connection.
pub async fn raw_exchange(addr: SocketAddr, request: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut received = Vec::new();
    // A reset after close still means nothing was written, so the io result is ignored.
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
        .await
        .expect("server kept the connection open");
    received
}
