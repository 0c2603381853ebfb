//! dr-server: HTTP API server and transcode orchestration.
//!
//! This crate ties the other dr-* crates into a running server. It provides:
//!
//! - Axum-based HTTP API for browsing the library, range streaming raw
//!   sources and preparing adaptive renditions
//! - The [`transcode::TranscodeOrchestrator`], which runs at most one encode
//!   per output directory and shares its outcome with every waiter
//! - Static serving of manifests and segments under `/dash`
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod transcode;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use dr_av::{DashEncoder, FfmpegDashEncoder, ToolRegistry};
use dr_core::config::Config;

use crate::context::AppContext;

/// Start the dashreel server.
///
/// Discovers tools, builds the [`AppContext`] and serves HTTP until a
/// shutdown signal is received.
pub async fn start(config: Config, config_path: Option<PathBuf>) -> dr_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }

    let encoder: Arc<dyn DashEncoder> = match FfmpegDashEncoder::from_registry(&tools) {
        Ok(encoder) => Arc::new(encoder),
        Err(e) => {
            // Direct playback still works; adaptive requests fail per call.
            tracing::warn!("Adaptive playback unavailable until ffmpeg is installed: {e}");
            Arc::new(FfmpegDashEncoder::new(PathBuf::from("ffmpeg")))
        }
    };

    std::fs::create_dir_all(&config.transcode.output_dir)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| dr_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(config, config_path, tools, encoder);
    let app = router::build_router(ctx);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| dr_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
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
    }

    tracing::info!("Shutdown signal received");
}
