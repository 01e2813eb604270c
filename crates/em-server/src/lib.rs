//! em-server: job scheduler, database-backed pipeline wiring, and HTTP API.
//!
//! This crate ties the other em-* crates into a running service:
//!
//! - [`scheduler::JobScheduler`] recovers interrupted videos, polls for
//!   `unencoded` ones, and runs each through its encoder's chain
//! - [`recorder::DbVideoRecorder`] and [`notifications::CompletionHooks`]
//!   persist run state and announce completions
//! - an Axum API for inspecting and managing videos, plus an SSE event feed
//! - graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod notifications;
pub mod recorder;
pub mod router;
pub mod routes;
pub mod scheduler;

use std::net::SocketAddr;
use std::sync::Arc;

use em_core::config::Config;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Open (or create) the database named in `config`.
pub fn open_database(config: &Config) -> em_core::Result<em_db::pool::DbPool> {
    let db_path = &config.server.db_path;
    let existed = db_path.exists();
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created database directory {}", parent.display());
        }
    }

    let db_str = db_path.to_string_lossy();
    let db = em_db::pool::init_pool(db_path)?;
    if existed {
        tracing::info!("Database opened (existing) at {db_str}");
    } else {
        tracing::info!("Database created (new) at {db_str}");
    }
    Ok(db)
}

/// Start the enigmamachine service.
///
/// Opens the database, discovers ffmpeg, starts the job scheduler, and
/// serves the HTTP API until a shutdown signal arrives. Live runs are
/// cancelled on shutdown; their videos are reset by the next start's
/// recovery sweep.
pub async fn start(config: Config) -> em_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let db = open_database(&config)?;

    let tools = Arc::new(em_av::ToolRegistry::discover(&config.tools));
    for info in tools.check_all().await {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}; encoding steps will fail", info.name);
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| em_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(db, config, tools);

    let cancel = CancellationToken::new();
    let scheduler_handle = Arc::clone(&ctx.scheduler).spawn(cancel.clone());

    let app = router::build_router(ctx);

    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| em_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;

    cancel.cancel();
    let _ = scheduler_handle.await;

    serve_result.map_err(|e| em_core::Error::Internal(format!("Server error: {e}")))?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, SIGTERM, or cancellation of `cancel`.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
