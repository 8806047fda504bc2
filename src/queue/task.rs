use std::fmt;

use crate::model::RepoKey;

/// What caused a bulk sync to be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Process start with `sync.sync_on_startup` enabled.
    Startup,
    /// The app was installed, or repositories were added to an installation.
    Installation,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTrigger::Startup => f.write_str("startup"),
            SyncTrigger::Installation => f.write_str("installation"),
        }
    }
}

/// Tasks that can be enqueued for processing.
#[derive(Debug, Clone)]
pub enum Task {
    SyncRepositories {
        repos: Vec<RepoKey>,
        trigger: SyncTrigger,
    },
}

impl Task {
    pub fn description(&self) -> String {
        match self {
            Task::SyncRepositories { repos, trigger } => match repos.as_slice() {
                [repo] => format!("Sync {repo} ({trigger})"),
                repos => format!("Sync {} repositories ({trigger})", repos.len()),
            },
        }
    }
}
