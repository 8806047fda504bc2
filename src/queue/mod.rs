pub mod startup;
pub mod task;

use std::collections::VecDeque;
use std::sync::Arc;

use crate::server::AppState;

use task::Task;

/// FIFO of pending bulk syncs. One task runs at a time so crawls never overlap.
#[derive(Default)]
pub struct TaskQueue {
    pending: VecDeque<Task>,
    /// Notification channel for the processor.
    notify: Option<tokio::sync::mpsc::UnboundedSender<()>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_notifier(&mut self, tx: tokio::sync::mpsc::UnboundedSender<()>) {
        self.notify = Some(tx);
        // Wake the processor for anything enqueued before it started.
        if !self.pending.is_empty() {
            self.wake();
        }
    }

    pub fn enqueue(&mut self, task: Task) {
        tracing::info!(task = %task.description(), "Enqueuing task");
        self.pending.push_back(task);
        self.wake();
    }

    pub fn take_next(&mut self) -> Option<Task> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn wake(&self) {
        if let Some(ref tx) = self.notify {
            let _ = tx.send(());
        }
    }
}

/// Run the background queue processor.
pub async fn run_queue_processor(state: Arc<AppState>) {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();

    {
        let mut queue = state.task_queue.write().await;
        queue.set_notifier(tx);
    }

    tracing::info!("Queue processor started");

    while rx.recv().await.is_some() {
        // Process all available tasks
        loop {
            let task = {
                let mut queue = state.task_queue.write().await;
                queue.take_next()
            };

            let Some(task) = task else {
                break;
            };

            tracing::info!(task = %task.description(), "Processing task");

            match &task {
                Task::SyncRepositories { repos, .. } => {
                    let report = state.bulk_sync.sync_repositories(repos).await;
                    if report.failed_repos > 0 {
                        tracing::warn!(
                            task = %task.description(),
                            failed = report.failed_repos,
                            "Task completed with failures"
                        );
                    } else {
                        tracing::info!(
                            task = %task.description(),
                            report = ?report,
                            "Task completed"
                        );
                    }
                }
            }
        }
    }
}
