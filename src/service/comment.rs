use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::model::{Comment, CommentType, Relation, RepoKey};
use crate::platform::types::{login_of, IssueCommentData, ReviewCommentData, ReviewData};
use crate::store::CommentStore;
use crate::util::time::time;

use super::SyncOutcome;

/// The three GitHub shapes that are stored as comments.
#[derive(Debug, Clone, Copy)]
pub enum CommentPayload<'a> {
    Review(&'a ReviewData),
    ReviewComment(&'a ReviewCommentData),
    CommonComment(&'a IssueCommentData),
}

/// A comment normalized from any [`CommentPayload`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedComment {
    pub owner: String,
    pub repo: String,
    /// Pull request number, or issue number for comments on plain issues.
    pub pull_number: i64,
    pub comment_id: i64,
    pub comment_type: CommentType,
    pub body: String,
    pub user: Option<String>,
    pub url: String,
    pub association: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReceivedComment {
    pub fn new(repo: &RepoKey, number: i64, payload: CommentPayload<'_>) -> Self {
        let base = |comment_id: i64, comment_type, body: &Option<String>, user, url: &str, association: &str| {
            ReceivedComment {
                owner: repo.owner.clone(),
                repo: repo.repo.clone(),
                pull_number: number,
                comment_id,
                comment_type,
                body: body.clone().unwrap_or_default(),
                user,
                url: url.to_string(),
                association: association.to_string(),
                created_at: None,
                updated_at: None,
            }
        };

        match payload {
            // Reviews have no update time; submission stands in for both.
            CommentPayload::Review(r) => ReceivedComment {
                created_at: r.submitted_at,
                updated_at: r.submitted_at,
                ..base(
                    r.id,
                    CommentType::Review,
                    &r.body,
                    login_of(&r.user).map(str::to_string),
                    &r.html_url,
                    &r.author_association,
                )
            },
            CommentPayload::ReviewComment(c) => ReceivedComment {
                created_at: c.created_at,
                updated_at: c.updated_at,
                ..base(
                    c.id,
                    CommentType::ReviewComment,
                    &c.body,
                    login_of(&c.user).map(str::to_string),
                    &c.html_url,
                    &c.author_association,
                )
            },
            CommentPayload::CommonComment(c) => ReceivedComment {
                created_at: c.created_at,
                updated_at: c.updated_at,
                ..base(
                    c.id,
                    CommentType::CommonComment,
                    &c.body,
                    login_of(&c.user).map(str::to_string),
                    &c.html_url,
                    &c.author_association,
                )
            },
        }
    }
}

pub struct CommentService {
    comments: Arc<dyn CommentStore>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentStore>) -> Self {
        Self { comments }
    }

    pub async fn sync_review(&self, repo: &RepoKey, pull_number: i64, review: &ReviewData) -> SyncOutcome {
        self.sync_payload(repo, pull_number, CommentPayload::Review(review))
            .await
    }

    pub async fn sync_review_comment(
        &self,
        repo: &RepoKey,
        pull_number: i64,
        comment: &ReviewCommentData,
    ) -> SyncOutcome {
        self.sync_payload(repo, pull_number, CommentPayload::ReviewComment(comment))
            .await
    }

    /// Conversation comment on a pull request or a plain issue.
    pub async fn sync_common_comment(
        &self,
        repo: &RepoKey,
        number: i64,
        comment: &IssueCommentData,
    ) -> SyncOutcome {
        self.sync_payload(repo, number, CommentPayload::CommonComment(comment))
            .await
    }

    pub async fn sync_reviews(
        &self,
        repo: &RepoKey,
        pull_number: i64,
        reviews: &[ReviewData],
    ) -> Vec<SyncOutcome> {
        self.sync_all(repo, pull_number, reviews.iter().map(CommentPayload::Review))
            .await
    }

    pub async fn sync_review_comments(
        &self,
        repo: &RepoKey,
        pull_number: i64,
        comments: &[ReviewCommentData],
    ) -> Vec<SyncOutcome> {
        self.sync_all(repo, pull_number, comments.iter().map(CommentPayload::ReviewComment))
            .await
    }

    pub async fn sync_common_comments(
        &self,
        repo: &RepoKey,
        number: i64,
        comments: &[IssueCommentData],
    ) -> Vec<SyncOutcome> {
        self.sync_all(repo, number, comments.iter().map(CommentPayload::CommonComment))
            .await
    }

    /// Each comment is adjudicated on its own; siblings run concurrently with no ordering.
    async fn sync_all<'a>(
        &self,
        repo: &RepoKey,
        number: i64,
        payloads: impl Iterator<Item = CommentPayload<'a>>,
    ) -> Vec<SyncOutcome> {
        join_all(payloads.map(|payload| self.sync_payload(repo, number, payload))).await
    }

    async fn sync_payload(
        &self,
        repo: &RepoKey,
        number: i64,
        payload: CommentPayload<'_>,
    ) -> SyncOutcome {
        self.sync_comment(&ReceivedComment::new(repo, number, payload))
            .await
    }

    /// Last-write-wins sync keyed on the global comment id.
    pub async fn sync_comment(&self, received: &ReceivedComment) -> SyncOutcome {
        let comment_id = received.comment_id;
        let kind = received.comment_type;

        let stored = match self.comments.find_comment(comment_id).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(
                    owner = %received.owner,
                    repo = %received.repo,
                    comment_id = comment_id,
                    error = %e,
                    "Failed to look up comment"
                );
                return SyncOutcome::Failed;
            }
        };

        let Some(comment) = merge_comment(stored, received) else {
            tracing::info!(
                owner = %received.owner,
                repo = %received.repo,
                comment_id = comment_id,
                kind = %kind,
                "Comment not updated, skipping"
            );
            return SyncOutcome::Stale;
        };

        match self.comments.upsert_comment(&comment).await {
            Ok(None) => {
                tracing::info!(
                    owner = %received.owner,
                    repo = %received.repo,
                    comment_id = comment_id,
                    kind = %kind,
                    "Newer comment stored concurrently, skipping"
                );
                SyncOutcome::Stale
            }
            Ok(Some(_)) => {
                tracing::info!(
                    owner = %received.owner,
                    repo = %received.repo,
                    number = received.pull_number,
                    comment_id = comment_id,
                    kind = %kind,
                    "Synced comment"
                );
                SyncOutcome::Saved
            }
            Err(e) => {
                tracing::error!(
                    owner = %received.owner,
                    repo = %received.repo,
                    number = received.pull_number,
                    comment_id = comment_id,
                    kind = %kind,
                    error = %e,
                    "Failed to save comment"
                );
                SyncOutcome::Failed
            }
        }
    }
}

/// Identity fields (thread number, id, kind, creation time, author) come from
/// the first write and are never touched again.
fn merge_comment(stored: Option<Comment>, received: &ReceivedComment) -> Option<Comment> {
    let base = match stored {
        Some(stored) => {
            if !time(received.updated_at).later_than(&time(stored.updated_at)) {
                return None;
            }
            stored
        }
        None => Comment {
            id: None,
            owner: received.owner.clone(),
            repo: received.repo.clone(),
            pull_number: Some(received.pull_number),
            comment_id: received.comment_id,
            comment_type: received.comment_type,
            body: String::new(),
            user: received.user.clone(),
            url: String::new(),
            association: String::new(),
            relation: Relation::NotMember,
            created_at: received.created_at,
            updated_at: None,
        },
    };

    Some(Comment {
        owner: received.owner.clone(),
        repo: received.repo.clone(),
        body: received.body.clone(),
        updated_at: received.updated_at,
        association: received.association.clone(),
        relation: Relation::from_association(&received.association),
        url: received.url.clone(),
        ..base
    })
}
