//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Ctrl+C and the internal broadcast both end the server
//! - SIGTERM is forwarded into the broadcast (Unix only)

use tokio::sync::broadcast;

use crate::lifecycle::Shutdown;

/// Trigger `shutdown` when the process receives SIGTERM.
#[cfg(unix)]
pub fn forward_terminate(shutdown: Shutdown) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                if term.recv().await.is_some() {
                    tracing::info!("SIGTERM received");
                    shutdown.trigger();
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    });
}

#[cfg(not(unix))]
pub fn forward_terminate(_shutdown: Shutdown) {}

/// Resolve on Ctrl+C or when the shutdown broadcast fires.
pub async fn wait_for_shutdown(mut shutdown: broadcast::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Shutdown signal received"),
        _ = shutdown.recv() => tracing::info!("Shutdown requested"),
    }
}
