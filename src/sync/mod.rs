//! Full-repository backfill.
//!
//! Each repository is crawled page by page. A page is fully processed before
//! the next one is requested, and the pull and issue walks of one repository
//! run side by side. Failures are logged where they happen; nothing escapes
//! the repository loop.

mod backfill;

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::model::RepoKey;
use crate::platform::types::{IssueData, PullRequestData};
use crate::platform::{Platform, PAGE_SIZE};
use crate::service::{PullActivity, Services};

/// Counts from one [`BulkSync::sync_repositories`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub repos: usize,
    pub failed_repos: usize,
    pub pulls: usize,
    pub issues: usize,
    pub emails: usize,
}

pub struct BulkSync {
    services: Services,
    platform: Arc<dyn Platform>,
    page_pause: Duration,
}

impl BulkSync {
    pub fn new(services: Services, platform: Arc<dyn Platform>, page_pause: Duration) -> Self {
        Self {
            services,
            platform,
            page_pause,
        }
    }

    /// The allow-list when configured, otherwise every public, live repository
    /// of every installation.
    pub async fn resolve_targets(&self, allow_list: Option<Vec<RepoKey>>) -> Vec<RepoKey> {
        if let Some(repos) = allow_list {
            tracing::info!(count = repos.len(), "Using configured repository list");
            return repos;
        }

        let installations = match self.platform.list_installations().await {
            Ok(installations) => installations,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list installations");
                return Vec::new();
            }
        };

        tracing::info!(count = installations.len(), "Found installations");

        let mut targets = Vec::new();
        for installation in installations {
            match self.platform.list_installation_repos(installation.id).await {
                Ok(repos) => targets.extend(
                    repos
                        .into_iter()
                        .filter(|r| r.is_syncable())
                        .map(|r| RepoKey::new(r.owner.login, r.name)),
                ),
                Err(e) => {
                    tracing::warn!(
                        installation_id = installation.id,
                        error = %e,
                        "Failed to list repos for installation"
                    );
                }
            }
        }

        targets
    }

    /// Crawl every repository in turn, then backfill contributor emails.
    pub async fn sync_repositories(&self, repos: &[RepoKey]) -> SyncReport {
        let mut report = SyncReport::default();

        for repo in repos {
            report.repos += 1;
            match self.sync_repository(repo).await {
                Ok((pulls, issues)) => {
                    report.pulls += pulls;
                    report.issues += issues;
                }
                Err(e) => {
                    report.failed_repos += 1;
                    tracing::error!(repo = %repo, error = %e, "Failed to sync repository");
                }
            }
        }

        // Needs every merged pull request stored first.
        report.emails = self.backfill_contributor_emails().await;

        tracing::info!(?report, "Bulk sync finished");
        report
    }

    /// Returns how many pull requests and issues were walked.
    pub async fn sync_repository(&self, repo: &RepoKey) -> Result<(usize, usize)> {
        let installation_id = self.platform.get_repo_installation(repo).await?;
        tracing::info!(repo = %repo, installation_id = installation_id, "Syncing repository");

        let (pulls, issues) = tokio::join!(
            self.sync_pulls(installation_id, repo),
            self.sync_issues(installation_id, repo),
        );

        let pulls = pulls.unwrap_or_else(|e| {
            tracing::error!(repo = %repo, error = %e, "Failed to sync pull requests");
            0
        });
        let issues = issues.unwrap_or_else(|e| {
            tracing::error!(repo = %repo, error = %e, "Failed to sync issues");
            0
        });

        tracing::info!(repo = %repo, pulls = pulls, issues = issues, "Finished syncing repository");
        Ok((pulls, issues))
    }

    async fn sync_pulls(&self, installation_id: u64, repo: &RepoKey) -> Result<usize> {
        let mut page = 1;
        let mut total = 0;

        loop {
            let pulls = self
                .platform
                .list_pulls_page(installation_id, repo, page)
                .await?;
            let count = pulls.len();

            for pull in &pulls {
                self.sync_pull(installation_id, repo, pull).await;
            }
            total += count;

            if count < PAGE_SIZE as usize {
                return Ok(total);
            }
            tracing::debug!(repo = %repo, page = page, total = total, "Pull request page done");
            tokio::time::sleep(self.page_pause).await;
            page += 1;
        }
    }

    async fn sync_pull(&self, installation_id: u64, repo: &RepoKey, pull: &PullRequestData) {
        let key = repo.pull(pull.number);
        self.services.pulls.sync_pull_request(repo, pull).await;

        let issue_key = key.to_issue_key();
        let platform = &self.platform;
        let fetched = tokio::try_join!(
            platform.list_reviews(installation_id, &key),
            platform.list_review_comments(installation_id, &key),
            platform.list_issue_comments(installation_id, &issue_key),
            platform.list_commits(installation_id, &key),
        );
        let (reviews, review_comments, comments, commits) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(pull = %key, error = %e, "Failed to fetch pull request activity");
                return;
            }
        };

        let comment_service = &self.services.comments;
        comment_service.sync_reviews(repo, pull.number, &reviews).await;
        comment_service
            .sync_review_comments(repo, pull.number, &review_comments)
            .await;
        comment_service
            .sync_common_comments(repo, pull.number, &comments)
            .await;

        if pull.is_open() {
            self.services
                .pulls
                .sync_open_pull_request_status(
                    &key,
                    pull.author(),
                    PullActivity {
                        reviews: &reviews,
                        review_comments: &review_comments,
                        comments: &comments,
                        commits: &commits,
                    },
                )
                .await;
        }
    }

    async fn sync_issues(&self, installation_id: u64, repo: &RepoKey) -> Result<usize> {
        let mut page = 1;
        let mut total = 0;

        loop {
            let issues = self
                .platform
                .list_issues_page(installation_id, repo, page)
                .await?;
            let count = issues.len();

            for issue in issues.iter().filter(|i| !i.is_pull_request()) {
                self.sync_issue(installation_id, repo, issue).await;
                total += 1;
            }

            if count < PAGE_SIZE as usize {
                return Ok(total);
            }
            tracing::debug!(repo = %repo, page = page, total = total, "Issue page done");
            tokio::time::sleep(self.page_pause).await;
            page += 1;
        }
    }

    async fn sync_issue(&self, installation_id: u64, repo: &RepoKey, issue: &IssueData) {
        self.services.issues.sync_issue(repo, issue).await;

        let key = repo.issue(issue.number);
        match self.platform.list_issue_comments(installation_id, &key).await {
            Ok(comments) => {
                self.services
                    .comments
                    .sync_common_comments(repo, issue.number, &comments)
                    .await;
            }
            Err(e) => {
                tracing::warn!(issue = %key, error = %e, "Failed to fetch issue comments");
            }
        }
    }
}
