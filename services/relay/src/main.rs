//! Wallify relay
//!
//! Single-binary backend for the Wallify browser client:
//! 1. Runs the Spotify OAuth flow (`/login`, `/callback`) and keeps the
//!    token pair server-side, handing the browser an opaque handle
//! 2. Relays resource requests (`/top-artists`, `/top-tracks`, `/profile`)
//!    with transparent access-token refresh on 401
//! 3. Sweeps stale credential records on a background timer

mod config;
mod error;
mod metrics;
mod routes;
mod users;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use spotify_auth::Authenticator;
use spotify_client::ApiClient;
use token_store::{FileStore, MemoryStore, TokenStore, spawn_sweep_task};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, StoreBackend};
use crate::routes::{AppState, build_router};
use crate::users::UserRegistry;

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting wallify-relay");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        frontend_url = %config.server.frontend_url,
        client_id = %config.spotify.client_id,
        backend = ?config.store.backend,
        "configuration loaded"
    );

    let store: Arc<dyn TokenStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => {
            // Validated during Config::load
            let path = config
                .store
                .path
                .clone()
                .context("store.path is required for the file backend")?;
            let store = FileStore::load(path.clone())
                .await
                .with_context(|| format!("failed to open token store at {}", path.display()))?;
            info!(path = %path.display(), records = store.len().await, "token store loaded");
            Arc::new(store)
        }
    };

    let sweep_handle = if config.store.sweep_interval_secs > 0 {
        let handle = spawn_sweep_task(
            store.clone(),
            Duration::from_secs(config.store.sweep_interval_secs),
            Duration::from_secs(config.store.max_age_secs),
        );
        info!(
            interval_secs = config.store.sweep_interval_secs,
            max_age_secs = config.store.max_age_secs,
            "credential sweep scheduled"
        );
        Some(handle)
    } else {
        info!("credential sweep disabled");
        None
    };

    let registry = match config.registry.take() {
        Some(cfg) => {
            let registry = UserRegistry::load(cfg.path.clone())
                .await
                .with_context(|| format!("failed to open user registry at {}", cfg.path.display()))?;
            info!(path = %cfg.path.display(), users = registry.len().await, "user registry loaded");
            Some(Arc::new(registry))
        }
        None => None,
    };

    let client_secret = config
        .spotify
        .client_secret
        .take()
        .context("client secret missing after config load")?;
    debug!(secret = %client_secret.preview(), "client credentials resolved");
    let auth = Authenticator::new(
        config.spotify.client_id.clone(),
        client_secret,
        config.spotify.redirect_uri.clone(),
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.server.request_timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let app_state = AppState {
        client: Arc::new(ApiClient::new(http, auth)),
        store,
        registry,
        frontend_url: config.server.frontend_url.clone(),
        prometheus,
        started_at: Instant::now(),
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // Graceful shutdown with drain timeout enforcement:
    // 1. shutdown_signal() fires on SIGTERM/SIGINT
    // 2. axum stops accepting new connections and drains in-flight requests
    // 3. DRAIN_TIMEOUT caps the drain so a slow client cannot block exit
    //
    // The drain timer starts when the signal fires, not when the server
    // starts, hence the notify-then-race structure.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;

    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    if let Some(handle) = sweep_handle {
        handle.abort();
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
