use std::sync::Arc;

use crate::queue::task::{SyncTrigger, Task};
use crate::server::AppState;

/// Enqueue a full crawl of every target repository on startup.
///
/// Targets come from `sync.repos` when set, otherwise from the app's installations.
pub async fn enqueue_startup_sync(state: &Arc<AppState>) {
    if !state.config.sync.sync_on_startup {
        tracing::info!("Startup sync disabled");
        return;
    }

    tracing::info!("Resolving repositories for startup sync...");

    let repos = state
        .bulk_sync
        .resolve_targets(state.config.repo_allow_list())
        .await;

    if repos.is_empty() {
        tracing::warn!("No repositories to sync on startup");
        return;
    }

    tracing::info!(count = repos.len(), "Scheduling startup sync");

    let mut queue = state.task_queue.write().await;
    queue.enqueue(Task::SyncRepositories {
        repos,
        trigger: SyncTrigger::Startup,
    });
}
