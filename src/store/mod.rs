//! Keyed record stores behind the reconciliation services.
//!
//! Each entity gets its own trait so services depend only on the tables they
//! touch. Upserts are independent of each other; nothing here is transactional
//! across entities.

pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Comment, ContributorInfo, Issue, IssueKey, OpenPrStatus, Pull, PullKey};

pub use sqlite::SqliteStore;

#[async_trait]
pub trait PullStore: Send + Sync {
    async fn find_pull(&self, key: &PullKey) -> Result<Option<Pull>>;

    /// Insert or update by `(owner, repo, pull_number)`; returns the row with its id.
    ///
    /// An existing row is only replaced when `pull.updated_at` is strictly later
    /// than the stored one, checked in the same statement as the write. `None`
    /// means the stored row was kept.
    async fn upsert_pull(&self, pull: &Pull) -> Result<Option<Pull>>;

    async fn list_pulls_by_author(&self, login: &str) -> Result<Vec<Pull>>;
}

#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn find_issue(&self, key: &IssueKey) -> Result<Option<Issue>>;

    /// Same freshness rule as [`PullStore::upsert_pull`].
    async fn upsert_issue(&self, issue: &Issue) -> Result<Option<Issue>>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Comment ids are globally unique on GitHub, so the id alone is the key.
    async fn find_comment(&self, comment_id: i64) -> Result<Option<Comment>>;

    /// Same freshness rule as [`PullStore::upsert_pull`].
    async fn upsert_comment(&self, comment: &Comment) -> Result<Option<Comment>>;
}

#[async_trait]
pub trait ContributorStore: Send + Sync {
    async fn upsert_contributor(&self, info: &ContributorInfo) -> Result<ContributorInfo>;

    /// Authors of merged pull requests with no known email.
    async fn list_logins_missing_email(&self) -> Result<Vec<String>>;
}

#[async_trait]
pub trait OpenPrStatusStore: Send + Sync {
    async fn find_open_pr_status(&self, key: &PullKey) -> Result<Option<OpenPrStatus>>;

    async fn upsert_open_pr_status(&self, status: &OpenPrStatus) -> Result<OpenPrStatus>;
}
