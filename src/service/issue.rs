use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::{Issue, IssueKey, IssueStatus, Relation, RepoKey};
use crate::platform::types::IssueData;
use crate::store::IssueStore;
use crate::util::labels::encode_labels;
use crate::util::time::time;

use super::SyncOutcome;

pub struct IssueService {
    issues: Arc<dyn IssueStore>,
}

impl IssueService {
    pub fn new(issues: Arc<dyn IssueStore>) -> Self {
        Self { issues }
    }

    /// Last-write-wins sync of a full issue snapshot. Pull requests listed as
    /// issues are skipped; they are stored as pulls.
    pub async fn sync_issue(&self, repo: &RepoKey, received: &IssueData) -> SyncOutcome {
        let key = repo.issue(received.number);

        if received.is_pull_request() {
            tracing::debug!(issue = %key, "Skipping pull request listed as issue");
            return SyncOutcome::Skipped;
        }

        let stored = match self.issues.find_issue(&key).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(issue = %key, error = %e, "Failed to look up issue");
                return SyncOutcome::Failed;
            }
        };

        let Some(issue) = merge_issue(&key, stored, received) else {
            tracing::info!(issue = %key, "Issue not updated, skipping");
            return SyncOutcome::Stale;
        };

        match self.issues.upsert_issue(&issue).await {
            Ok(Some(saved)) => {
                tracing::info!(issue = %key, id = ?saved.id, labels = ?saved.labels(), "Synced issue");
                SyncOutcome::Saved
            }
            Ok(None) => {
                tracing::info!(issue = %key, "Newer issue stored concurrently, skipping");
                SyncOutcome::Stale
            }
            Err(e) => {
                tracing::error!(issue = %key, error = %e, "Failed to save issue");
                SyncOutcome::Failed
            }
        }
    }

    pub async fn sync_update_time(
        &self,
        key: &IssueKey,
        updated_at: Option<DateTime<Utc>>,
    ) -> SyncOutcome {
        let stored = match self.issues.find_issue(key).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                tracing::debug!(issue = %key, "Issue not stored yet, update time ignored");
                return SyncOutcome::Skipped;
            }
            Err(e) => {
                tracing::error!(issue = %key, error = %e, "Failed to look up issue");
                return SyncOutcome::Failed;
            }
        };

        if !time(updated_at).later_than(&time(stored.updated_at)) {
            tracing::info!(issue = %key, "Issue update time not newer, skipping");
            return SyncOutcome::Stale;
        }

        match self.issues.upsert_issue(&Issue { updated_at, ..stored }).await {
            Ok(Some(_)) => SyncOutcome::Saved,
            Ok(None) => {
                tracing::info!(issue = %key, "Newer issue stored concurrently, skipping");
                SyncOutcome::Stale
            }
            Err(e) => {
                tracing::error!(issue = %key, error = %e, "Failed to save issue update time");
                SyncOutcome::Failed
            }
        }
    }
}

fn merge_issue(key: &IssueKey, stored: Option<Issue>, received: &IssueData) -> Option<Issue> {
    let base = match stored {
        Some(stored) if !time(received.updated_at).later_than(&time(stored.updated_at)) => {
            return None
        }
        Some(stored) => stored,
        None => Issue::empty(key, received.created_at),
    };

    Some(Issue {
        id: base.id,
        owner: key.owner.clone(),
        repo: key.repo.clone(),
        issue_number: key.issue_number,
        title: received.title.clone(),
        body: received.body.clone().unwrap_or_default(),
        user: received.author().unwrap_or_default().to_string(),
        label: encode_labels(&received.labels),
        status: IssueStatus::from(received.state.as_str()),
        association: received.author_association.clone(),
        relation: Relation::from_association(&received.author_association),
        created_at: base.created_at.or(received.created_at),
        updated_at: received.updated_at,
        closed_at: received.closed_at,
    })
}
