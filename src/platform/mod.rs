pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{IssueKey, PullKey, RepoKey};
use types::*;

/// Items per page for every paginated listing.
pub const PAGE_SIZE: u32 = 100;

#[async_trait]
pub trait Platform: Send + Sync {
    /// List all installations of this GitHub App.
    async fn list_installations(&self) -> Result<Vec<Installation>>;

    /// List all repositories accessible to an installation.
    async fn list_installation_repos(&self, installation_id: u64) -> Result<Vec<InstallationRepo>>;

    /// Installation id that covers a repository.
    async fn get_repo_installation(&self, repo: &RepoKey) -> Result<u64>;

    /// One page (1-based) of pull requests, `state=all`, oldest first.
    async fn list_pulls_page(
        &self,
        installation_id: u64,
        repo: &RepoKey,
        page: u32,
    ) -> Result<Vec<PullRequestData>>;

    /// One page (1-based) of issues, `state=all`, oldest first. Includes pull requests.
    async fn list_issues_page(
        &self,
        installation_id: u64,
        repo: &RepoKey,
        page: u32,
    ) -> Result<Vec<IssueData>>;

    async fn list_reviews(&self, installation_id: u64, pull: &PullKey) -> Result<Vec<ReviewData>>;

    async fn list_review_comments(
        &self,
        installation_id: u64,
        pull: &PullKey,
    ) -> Result<Vec<ReviewCommentData>>;

    async fn list_commits(&self, installation_id: u64, pull: &PullKey) -> Result<Vec<CommitData>>;

    async fn list_issue_comments(
        &self,
        installation_id: u64,
        issue: &IssueKey,
    ) -> Result<Vec<IssueCommentData>>;

    /// The pull request rendered as a `git format-patch` mailbox.
    async fn get_pull_patch(&self, installation_id: u64, pull: &PullKey) -> Result<String>;
}
