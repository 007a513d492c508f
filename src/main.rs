//! Knowledge Cache - administration server for the in-process response cache
//!
//! Exposes the cache over HTTP for inspection, warming and invalidation.

use std::net::SocketAddr;

use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use knowledge_cache::api::create_router;
use knowledge_cache::{spawn_sweep_task, AppState, Config};

/// Main entry point for the knowledge cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache with configured parameters
/// 4. Start the background expiry sweep, unless disabled
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "knowledge_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Knowledge Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_cache_size={}, default_expiry={}h, compression={} (>{}B), hit_tracking={}, port={}, sweep_interval={}s",
        config.cache.max_cache_size,
        config.cache.default_expiry_hours,
        config.cache.enable_compression,
        config.cache.compression_threshold,
        config.cache.enable_hit_tracking,
        config.server_port,
        config.sweep_interval
    );

    let state = AppState::from_config(&config);
    info!("Cache initialized");

    // Expired entries are still dropped lazily on read when the sweep is off.
    let sweep_handle = if config.sweep_interval > 0 {
        info!("Background expiry sweep started");
        Some(spawn_sweep_task(state.cache.clone(), config.sweep_interval))
    } else {
        info!("Background expiry sweep disabled");
        None
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweep_handle))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the sweep task and allows graceful shutdown.
async fn shutdown_signal(sweep_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = sweep_handle {
        handle.abort();
        warn!("Expiry sweep aborted");
    }
}
