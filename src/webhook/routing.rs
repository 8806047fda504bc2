//! Maps webhook actions onto reconciliation calls.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::model::{PullKey, RepoKey};
use crate::platform::types::{login_of, PullRequestData};
use crate::platform::Platform;
use crate::service::Services;

use super::events::{
    installed_repo_keys, InstallationEvent, InstallationRef, InstallationRepositoriesEvent,
    IssueCommentEvent, IssuesEvent, PullRequestEvent, PullRequestReviewCommentEvent,
    PullRequestReviewEvent, WebhookEvent,
};

/// `lgtm` or `/lgtm` as a whole word, any case.
static LGTM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/?\blgtm\b").expect("lgtm pattern is valid"));

const PULL_SYNC_ACTIONS: &[&str] = &["opened", "edited", "reopened", "closed", "labeled", "unlabeled"];
const PULL_COMMIT_ACTIONS: &[&str] = &["opened", "synchronize"];
const REVIEW_ACTIONS: &[&str] = &["submitted", "edited", "dismissed"];
const COMMENT_ACTIONS: &[&str] = &["created", "edited", "deleted"];
const ISSUE_SYNC_ACTIONS: &[&str] = &[
    "opened", "edited", "deleted", "closed", "reopened", "labeled", "unlabeled",
];

/// What the webhook handler should do after routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Reconciliation ran inline.
    Synced,
    /// Nothing to do for this event or action.
    Ignored,
    /// A bulk sync of these repositories should be queued.
    SyncRepositories(Vec<RepoKey>),
}

pub fn is_lgtm(body: &str) -> bool {
    LGTM.is_match(body)
}

pub struct EventRouter {
    services: Services,
    platform: Arc<dyn Platform>,
}

impl EventRouter {
    pub fn new(services: Services, platform: Arc<dyn Platform>) -> Self {
        Self { services, platform }
    }

    pub async fn route(&self, event: WebhookEvent) -> Routed {
        match event {
            WebhookEvent::PullRequest(e) => self.on_pull_request(e).await,
            WebhookEvent::PullRequestReview(e) => self.on_pull_request_review(e).await,
            WebhookEvent::PullRequestReviewComment(e) => {
                self.on_pull_request_review_comment(e).await
            }
            WebhookEvent::Issues(e) => self.on_issues(e).await,
            WebhookEvent::IssueComment(e) => self.on_issue_comment(e).await,
            WebhookEvent::Installation(e) => on_installation(e),
            WebhookEvent::InstallationRepositories(e) => on_installation_repositories(e),
            WebhookEvent::Ping => {
                tracing::info!("Received ping event");
                Routed::Ignored
            }
            WebhookEvent::Unsupported(event_type) => {
                tracing::debug!(event_type = %event_type, "Ignoring unsupported event");
                Routed::Ignored
            }
        }
    }

    async fn on_pull_request(&self, event: PullRequestEvent) -> Routed {
        let repo = event.repository.key();
        let pull = &event.pull_request;
        let key = repo.pull(pull.number);
        let action = event.action.as_str();
        let pulls = &self.services.pulls;

        if PULL_SYNC_ACTIONS.contains(&action) {
            pulls.sync_pull_request(&repo, pull).await;
        } else {
            pulls.sync_update_time(&key, pull.updated_at).await;
        }

        if PULL_COMMIT_ACTIONS.contains(&action) && pull.is_open() {
            pulls
                .sync_open_pr_last_commit_time(&key, pull.updated_at)
                .await;
        }

        if action == "closed" && pull.is_merged() {
            self.sync_author_email(&key, pull, event.installation.as_ref())
                .await;
        }

        Routed::Synced
    }

    async fn on_pull_request_review(&self, event: PullRequestReviewEvent) -> Routed {
        if !REVIEW_ACTIONS.contains(&event.action.as_str()) {
            return Routed::Ignored;
        }

        let repo = event.repository.key();
        let pull = &event.pull_request;
        let key = repo.pull(pull.number);

        self.services
            .comments
            .sync_review(&repo, pull.number, &event.review)
            .await;
        if pull.is_open() {
            self.services
                .pulls
                .sync_open_pr_last_review_time(&key, event.review.submitted_at)
                .await;
        }
        self.services
            .pulls
            .sync_update_time(&key, pull.updated_at)
            .await;

        Routed::Synced
    }

    async fn on_pull_request_review_comment(&self, event: PullRequestReviewCommentEvent) -> Routed {
        if !COMMENT_ACTIONS.contains(&event.action.as_str()) {
            return Routed::Ignored;
        }

        let repo = event.repository.key();
        let pull = &event.pull_request;
        let key = repo.pull(pull.number);
        let comment = &event.comment;

        self.services
            .comments
            .sync_review_comment(&repo, pull.number, comment)
            .await;
        if pull.is_open() {
            self.services
                .pulls
                .sync_open_pr_last_comment_time(
                    &key,
                    pull.author(),
                    login_of(&comment.user),
                    comment.updated_at,
                )
                .await;
        }
        self.services
            .pulls
            .sync_update_time(&key, pull.updated_at)
            .await;

        Routed::Synced
    }

    async fn on_issues(&self, event: IssuesEvent) -> Routed {
        let repo = event.repository.key();
        let issue = &event.issue;

        if issue.is_pull_request() {
            return Routed::Ignored;
        }

        if ISSUE_SYNC_ACTIONS.contains(&event.action.as_str()) {
            self.services.issues.sync_issue(&repo, issue).await;
        } else {
            self.services
                .issues
                .sync_update_time(&repo.issue(issue.number), issue.updated_at)
                .await;
        }

        Routed::Synced
    }

    async fn on_issue_comment(&self, event: IssueCommentEvent) -> Routed {
        if !COMMENT_ACTIONS.contains(&event.action.as_str()) {
            return Routed::Ignored;
        }

        let repo = event.repository.key();
        let issue = &event.issue;
        let comment = &event.comment;

        self.services
            .comments
            .sync_common_comment(&repo, issue.number, comment)
            .await;

        if !issue.is_pull_request() {
            self.services
                .issues
                .sync_update_time(&repo.issue(issue.number), issue.updated_at)
                .await;
            return Routed::Synced;
        }

        // On a pull request the issue side carries the pull's author, state and update time.
        let key = repo.pull(issue.number);
        let pulls = &self.services.pulls;
        if issue.is_open() {
            pulls
                .sync_open_pr_last_comment_time(
                    &key,
                    issue.author(),
                    login_of(&comment.user),
                    comment.updated_at,
                )
                .await;

            if comment.body.as_deref().is_some_and(is_lgtm) {
                pulls
                    .sync_open_pr_last_review_time(&key, comment.updated_at)
                    .await;
            }
        }
        pulls.sync_update_time(&key, issue.updated_at).await;

        Routed::Synced
    }

    async fn sync_author_email(
        &self,
        key: &PullKey,
        pull: &PullRequestData,
        installation: Option<&InstallationRef>,
    ) {
        let Some(login) = pull.author() else {
            return;
        };

        let installation_id = match installation {
            Some(installation) => installation.id,
            None => match self.platform.get_repo_installation(&key.repo_key()).await {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(pull = %key, error = %e, "Failed to resolve installation for patch");
                    return;
                }
            },
        };

        match self.platform.get_pull_patch(installation_id, key).await {
            Ok(patch) => {
                self.services
                    .contributors
                    .sync_contributor_email_from_pr(login, &patch)
                    .await;
            }
            Err(e) => {
                tracing::warn!(pull = %key, error = %e, "Failed to fetch pull request patch");
            }
        }
    }
}

fn on_installation(event: InstallationEvent) -> Routed {
    if event.action != "created" {
        tracing::info!(
            installation_id = event.installation.id,
            action = %event.action,
            "Ignoring installation action"
        );
        return Routed::Ignored;
    }

    let repos = installed_repo_keys(event.installation.account.as_ref(), &event.repositories);
    tracing::info!(
        installation_id = event.installation.id,
        count = repos.len(),
        "App installed"
    );
    Routed::SyncRepositories(repos)
}

fn on_installation_repositories(event: InstallationRepositoriesEvent) -> Routed {
    if event.action != "added" {
        return Routed::Ignored;
    }

    let repos = installed_repo_keys(
        event.installation.account.as_ref(),
        &event.repositories_added,
    );
    tracing::info!(
        installation_id = event.installation.id,
        count = repos.len(),
        "Repositories added to installation"
    );
    Routed::SyncRepositories(repos)
}
