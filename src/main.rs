//! Dynamic reverse proxy.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net::listener ──▶ http::server ──▶ routing::RequestDirector
//!                                                            │ extract key
//!                                                            ▼
//!                                                        storage (load)
//!                                                            │ rewrite / abort
//!                                                            ▼
//!     Client Response ◀──────────────────────────────── http::forwarder ◀──── Backend
//!
//!     Operator ──▶ admin (Basic auth) ──▶ storage (store / delete)
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use dynamic_proxy::admin::{setup_admin_router, AdminState};
use dynamic_proxy::config::{load_config, ProxyConfig};
use dynamic_proxy::http::{HttpForwarder, ProxyServer};
use dynamic_proxy::lifecycle::{shutdown_on_signal, Shutdown};
use dynamic_proxy::net::Listener;
use dynamic_proxy::observability::{logging, metrics};
use dynamic_proxy::routing::{build_extractor, RequestDirector};
use dynamic_proxy::storage::{open_storage, seed_routes};

#[derive(Parser, Debug)]
#[command(name = "dynamic-proxy", version, about = "Reverse proxy with runtime-managed routes")]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dynamic-proxy starting");

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let storage = open_storage(&config.storage)?;
    let seeded = seed_routes(&*storage, &config.storage.seed)?;
    tracing::info!(
        backend = ?config.storage.backend,
        seeded,
        routes = storage.values().len(),
        "Routes loaded"
    );

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let admin_task = if config.admin.enabled {
        let state = AdminState::from_config(storage.clone(), &config.admin);
        let auth = state.credentials.is_some();
        if !auth && (!config.admin.username.is_empty() || !config.admin.password.is_empty()) {
            tracing::warn!("Only one of admin username/password is set; management auth is disabled");
        }

        let router = setup_admin_router(state);
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(
            address = %admin_listener.local_addr()?,
            auth,
            allow_delete = config.admin.allow_delete,
            "Management API listening"
        );

        let admin_shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            axum::serve(admin_listener, router)
                .with_graceful_shutdown(async move { admin_shutdown.wait().await })
                .await
        }))
    } else {
        None
    };

    let director = RequestDirector::with_storage(storage, build_extractor(&config.extractor));
    let forwarder = Arc::new(HttpForwarder::new()?);
    let listener = Listener::bind(&config.listener).await?;

    let served = ProxyServer::new(listener, director, forwarder)
        .run(shutdown.clone())
        .await;

    // A fatal listener error also stops the management API.
    shutdown.trigger();
    if let Some(task) = admin_task {
        task.await??;
    }
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}
