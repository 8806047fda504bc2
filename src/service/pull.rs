use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::{OpenPrStatus, Pull, PullKey, PullStatus, Relation, RepoKey};
use crate::platform::types::{
    login_of, CommitData, IssueCommentData, PullRequestData, ReviewCommentData, ReviewData,
};
use crate::store::{OpenPrStatusStore, PullStore};
use crate::util::labels::encode_labels;
use crate::util::time::{latest, time};

use super::SyncOutcome;

/// Everything fetched for one pull request during a full recompute.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullActivity<'a> {
    pub reviews: &'a [ReviewData],
    pub review_comments: &'a [ReviewCommentData],
    pub comments: &'a [IssueCommentData],
    pub commits: &'a [CommitData],
}

/// Fields to write on the open-status aggregate. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
struct StatusPatch {
    last_comment_at: Option<DateTime<Utc>>,
    last_review_at: Option<DateTime<Utc>>,
    last_update_code_at: Option<DateTime<Utc>>,
}

pub struct PullService {
    pulls: Arc<dyn PullStore>,
    statuses: Arc<dyn OpenPrStatusStore>,
}

impl PullService {
    pub fn new(pulls: Arc<dyn PullStore>, statuses: Arc<dyn OpenPrStatusStore>) -> Self {
        Self { pulls, statuses }
    }

    /// Last-write-wins sync of a full pull request snapshot.
    pub async fn sync_pull_request(
        &self,
        repo: &RepoKey,
        received: &PullRequestData,
    ) -> SyncOutcome {
        let key = repo.pull(received.number);

        let stored = match self.pulls.find_pull(&key).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(pull = %key, error = %e, "Failed to look up pull request");
                return SyncOutcome::Failed;
            }
        };

        let Some(pull) = merge_pull(&key, stored, received) else {
            tracing::info!(pull = %key, "Pull request not updated, skipping");
            return SyncOutcome::Stale;
        };

        match self.pulls.upsert_pull(&pull).await {
            Ok(Some(saved)) => {
                tracing::info!(
                    pull = %key,
                    id = ?saved.id,
                    status = %saved.status,
                    labels = ?saved.labels(),
                    "Synced pull request"
                );
                SyncOutcome::Saved
            }
            Ok(None) => {
                tracing::info!(pull = %key, "Newer pull request stored concurrently, skipping");
                SyncOutcome::Stale
            }
            Err(e) => {
                tracing::error!(pull = %key, error = %e, "Failed to save pull request");
                SyncOutcome::Failed
            }
        }
    }

    /// Bump only `updated_at`, for events that change nothing else we store.
    pub async fn sync_update_time(
        &self,
        key: &PullKey,
        updated_at: Option<DateTime<Utc>>,
    ) -> SyncOutcome {
        let stored = match self.pulls.find_pull(key).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                tracing::debug!(pull = %key, "Pull request not stored yet, update time ignored");
                return SyncOutcome::Skipped;
            }
            Err(e) => {
                tracing::error!(pull = %key, error = %e, "Failed to look up pull request");
                return SyncOutcome::Failed;
            }
        };

        if !time(updated_at).later_than(&time(stored.updated_at)) {
            tracing::info!(pull = %key, "Pull request update time not newer, skipping");
            return SyncOutcome::Stale;
        }

        let pull = Pull {
            updated_at,
            ..stored
        };

        match self.pulls.upsert_pull(&pull).await {
            Ok(Some(_)) => SyncOutcome::Saved,
            Ok(None) => {
                tracing::info!(pull = %key, "Newer pull request stored concurrently, skipping");
                SyncOutcome::Stale
            }
            Err(e) => {
                tracing::error!(pull = %key, error = %e, "Failed to save pull request update time");
                SyncOutcome::Failed
            }
        }
    }

    /// Every stored pull request authored by `login`. Lookup failures yield an empty list.
    pub async fn contributor_pull_requests(&self, login: &str) -> Vec<Pull> {
        match self.pulls.list_pulls_by_author(login).await {
            Ok(pulls) => pulls,
            Err(e) => {
                tracing::error!(login = login, error = %e, "Failed to list contributor pull requests");
                Vec::new()
            }
        }
    }

    /// Recompute all three activity timestamps from a fresh fetch.
    ///
    /// Comments by the pull request's own author never count as activity.
    pub async fn sync_open_pull_request_status(
        &self,
        key: &PullKey,
        pull_author: Option<&str>,
        activity: PullActivity<'_>,
    ) -> SyncOutcome {
        let patch = recompute_status(pull_author, activity);
        self.update_status(key, patch).await
    }

    /// Incremental comment bump. Dropped without a write when the commenter wrote the pull request.
    pub async fn sync_open_pr_last_comment_time(
        &self,
        key: &PullKey,
        pull_author: Option<&str>,
        comment_author: Option<&str>,
        last_comment_at: Option<DateTime<Utc>>,
    ) -> SyncOutcome {
        if is_self_authored(pull_author, comment_author) {
            tracing::debug!(pull = %key, "Ignoring comment by pull request author");
            return SyncOutcome::Skipped;
        }

        self.update_status(
            key,
            StatusPatch {
                last_comment_at,
                ..StatusPatch::default()
            },
        )
        .await
    }

    pub async fn sync_open_pr_last_review_time(
        &self,
        key: &PullKey,
        last_review_at: Option<DateTime<Utc>>,
    ) -> SyncOutcome {
        self.update_status(
            key,
            StatusPatch {
                last_review_at,
                ..StatusPatch::default()
            },
        )
        .await
    }

    pub async fn sync_open_pr_last_commit_time(
        &self,
        key: &PullKey,
        last_commit_at: Option<DateTime<Utc>>,
    ) -> SyncOutcome {
        self.update_status(
            key,
            StatusPatch {
                last_update_code_at: last_commit_at,
                ..StatusPatch::default()
            },
        )
        .await
    }

    // No freshness gate: each field given is written as is.
    async fn update_status(&self, key: &PullKey, patch: StatusPatch) -> SyncOutcome {
        let stored = match self.statuses.find_open_pr_status(key).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(pull = %key, error = %e, "Failed to look up open pull request status");
                return SyncOutcome::Failed;
            }
        };

        let status = apply_patch(stored.unwrap_or_else(|| OpenPrStatus::empty(key)), patch);

        match self.statuses.upsert_open_pr_status(&status).await {
            Ok(_) => {
                tracing::debug!(pull = %key, "Synced open pull request status");
                SyncOutcome::Saved
            }
            Err(e) => {
                tracing::error!(pull = %key, error = %e, "Failed to save open pull request status");
                SyncOutcome::Failed
            }
        }
    }
}

/// Build the record to store, or `None` when `received` is not newer than `stored`.
///
/// A pull request that was never stored is always accepted.
fn merge_pull(key: &PullKey, stored: Option<Pull>, received: &PullRequestData) -> Option<Pull> {
    let base = match stored {
        Some(stored) => {
            if !time(received.updated_at).later_than(&time(stored.updated_at)) {
                return None;
            }
            stored
        }
        None => Pull::empty(key, received.created_at),
    };

    Some(Pull {
        id: base.id,
        owner: key.owner.clone(),
        repo: key.repo.clone(),
        pull_number: key.pull_number,
        title: received.title.clone(),
        body: received.body.clone().unwrap_or_default(),
        user: received.author().unwrap_or_default().to_string(),
        label: encode_labels(&received.labels),
        status: PullStatus::derive(&received.state, received.merged_at),
        association: received.author_association.clone(),
        relation: Relation::from_association(&received.author_association),
        created_at: base.created_at.or(received.created_at),
        updated_at: received.updated_at,
        closed_at: received.closed_at,
        merged_at: received.merged_at,
    })
}

fn is_self_authored(pull_author: Option<&str>, author: Option<&str>) -> bool {
    matches!((pull_author, author), (Some(a), Some(b)) if a == b)
}

fn recompute_status(pull_author: Option<&str>, activity: PullActivity<'_>) -> StatusPatch {
    let last_review_at = activity
        .reviews
        .iter()
        .fold(None, |acc, review| latest(acc, review.submitted_at));

    let review_comment_times = activity
        .review_comments
        .iter()
        .filter(|c| !is_self_authored(pull_author, login_of(&c.user)))
        .map(|c| c.updated_at);
    let issue_comment_times = activity
        .comments
        .iter()
        .filter(|c| !is_self_authored(pull_author, login_of(&c.user)))
        .map(|c| c.updated_at);
    let last_comment_at = review_comment_times
        .chain(issue_comment_times)
        .fold(None, latest);

    let last_update_code_at = activity
        .commits
        .iter()
        .fold(None, |acc, commit| latest(acc, commit.committed_at()));

    StatusPatch {
        last_comment_at,
        last_review_at,
        last_update_code_at,
    }
}

fn apply_patch(stored: OpenPrStatus, patch: StatusPatch) -> OpenPrStatus {
    OpenPrStatus {
        last_comment_at: patch.last_comment_at.or(stored.last_comment_at),
        last_review_at: patch.last_review_at.or(stored.last_review_at),
        last_update_code_at: patch.last_update_code_at.or(stored.last_update_code_at),
        ..stored
    }
}
