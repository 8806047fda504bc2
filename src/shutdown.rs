use std::sync::Arc;

use tokio::signal;

use crate::server::AppState;

/// Wait for a shutdown signal (SIGINT or SIGTERM).
///
/// A signal handler that cannot be installed is logged and never fires.
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

/// Drop queued syncs and close the database pool.
///
/// Queued work is not persisted; the next startup sync covers it.
pub async fn graceful_shutdown(state: &Arc<AppState>) {
    tracing::info!("Starting graceful shutdown...");

    let dropped = {
        let mut queue = state.task_queue.write().await;
        let mut dropped = 0;
        while queue.take_next().is_some() {
            dropped += 1;
        }
        dropped
    };

    if dropped > 0 {
        tracing::warn!(count = dropped, "Dropping queued sync tasks");
    }

    state.store.close().await;

    tracing::info!("Graceful shutdown complete");
}
