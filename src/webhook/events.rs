use serde::Deserialize;

use crate::model::RepoKey;
use crate::platform::types::{
    IssueCommentData, IssueData, PullRequestData, ReviewCommentData, ReviewData, UserRef,
};

/// Top-level webhook event parsed from the payload based on X-GitHub-Event header.
#[derive(Debug)]
pub enum WebhookEvent {
    PullRequest(PullRequestEvent),
    PullRequestReview(PullRequestReviewEvent),
    PullRequestReviewComment(PullRequestReviewCommentEvent),
    Issues(IssuesEvent),
    IssueComment(IssueCommentEvent),
    Installation(InstallationEvent),
    InstallationRepositories(InstallationRepositoriesEvent),
    Ping,
    Unsupported(String),
}

#[derive(Debug, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: PullRequestData,
    pub repository: RepositoryPayload,
    pub installation: Option<InstallationRef>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestReviewEvent {
    pub action: String,
    pub review: ReviewData,
    pub pull_request: PullRequestData,
    pub repository: RepositoryPayload,
    pub installation: Option<InstallationRef>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestReviewCommentEvent {
    pub action: String,
    pub comment: ReviewCommentData,
    pub pull_request: PullRequestData,
    pub repository: RepositoryPayload,
    pub installation: Option<InstallationRef>,
}

#[derive(Debug, Deserialize)]
pub struct IssuesEvent {
    pub action: String,
    pub issue: IssueData,
    pub repository: RepositoryPayload,
    pub installation: Option<InstallationRef>,
}

/// Fires for conversation comments on both issues and pull requests.
#[derive(Debug, Deserialize)]
pub struct IssueCommentEvent {
    pub action: String,
    pub issue: IssueData,
    pub comment: IssueCommentData,
    pub repository: RepositoryPayload,
    pub installation: Option<InstallationRef>,
}

#[derive(Debug, Deserialize)]
pub struct InstallationEvent {
    pub action: String,
    pub installation: InstallationDetail,
    #[serde(default)]
    pub repositories: Vec<InstalledRepo>,
}

#[derive(Debug, Deserialize)]
pub struct InstallationRepositoriesEvent {
    pub action: String,
    pub installation: InstallationDetail,
    #[serde(default)]
    pub repositories_added: Vec<InstalledRepo>,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryPayload {
    pub name: String,
    pub owner: UserRef,
}

impl RepositoryPayload {
    pub fn key(&self) -> RepoKey {
        RepoKey::new(&self.owner.login, &self.name)
    }
}

#[derive(Debug, Deserialize)]
pub struct InstallationRef {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct InstallationDetail {
    pub id: u64,
    pub account: Option<UserRef>,
}

/// Repository entry in installation payloads; these carry no owner object.
#[derive(Debug, Deserialize)]
pub struct InstalledRepo {
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub private: bool,
}

impl InstalledRepo {
    /// Owner comes from `full_name` when present, else from the installation account.
    pub fn key(&self, account_login: Option<&str>) -> Option<RepoKey> {
        let owner = self
            .full_name
            .as_deref()
            .and_then(|full| full.split_once('/'))
            .map(|(owner, _)| owner)
            .or(account_login)?;
        Some(RepoKey::new(owner, &self.name))
    }
}

/// Public repositories from an installation payload.
pub fn installed_repo_keys(account: Option<&UserRef>, repos: &[InstalledRepo]) -> Vec<RepoKey> {
    let login = account.map(|a| a.login.as_str());
    repos
        .iter()
        .filter(|r| !r.private)
        .filter_map(|r| r.key(login))
        .collect()
}

impl WebhookEvent {
    pub fn parse(event_type: &str, payload: &[u8]) -> Result<Self, serde_json::Error> {
        match event_type {
            "pull_request" => Ok(WebhookEvent::PullRequest(serde_json::from_slice(payload)?)),
            "pull_request_review" => Ok(WebhookEvent::PullRequestReview(serde_json::from_slice(
                payload,
            )?)),
            "pull_request_review_comment" => Ok(WebhookEvent::PullRequestReviewComment(
                serde_json::from_slice(payload)?,
            )),
            "issues" => Ok(WebhookEvent::Issues(serde_json::from_slice(payload)?)),
            "issue_comment" => Ok(WebhookEvent::IssueComment(serde_json::from_slice(payload)?)),
            "installation" => Ok(WebhookEvent::Installation(serde_json::from_slice(payload)?)),
            "installation_repositories" => Ok(WebhookEvent::InstallationRepositories(
                serde_json::from_slice(payload)?,
            )),
            "ping" => Ok(WebhookEvent::Ping),
            other => Ok(WebhookEvent::Unsupported(other.to_string())),
        }
    }

    pub fn action(&self) -> Option<&str> {
        match self {
            WebhookEvent::PullRequest(e) => Some(&e.action),
            WebhookEvent::PullRequestReview(e) => Some(&e.action),
            WebhookEvent::PullRequestReviewComment(e) => Some(&e.action),
            WebhookEvent::Issues(e) => Some(&e.action),
            WebhookEvent::IssueComment(e) => Some(&e.action),
            WebhookEvent::Installation(e) => Some(&e.action),
            WebhookEvent::InstallationRepositories(e) => Some(&e.action),
            WebhookEvent::Ping | WebhookEvent::Unsupported(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pull_request_json() -> serde_json::Value {
        json!({
            "number": 2,
            "state": "closed",
            "title": "Fix typo",
            "body": null,
            "user": { "login": "octocat", "id": 1 },
            "labels": [{ "id": 1, "name": "type/bug" }],
            "author_association": "CONTRIBUTOR",
            "created_at": "2015-09-01T00:00:00Z",
            "updated_at": "2015-09-07T12:14:59Z",
            "closed_at": "2015-09-07T12:14:59Z",
            "merged_at": "2015-09-07T12:14:59Z",
            "head": { "ref": "fix", "sha": "abc" }
        })
    }

    fn repository_json() -> serde_json::Value {
        json!({ "id": 7, "name": "tidb", "full_name": "pingcap/tidb", "owner": { "login": "pingcap" } })
    }

    #[test]
    fn test_parse_pull_request_event() {
        let payload = json!({
            "action": "closed",
            "number": 2,
            "pull_request": pull_request_json(),
            "repository": repository_json(),
            "installation": { "id": 99 }
        });

        let event = WebhookEvent::parse("pull_request", payload.to_string().as_bytes()).unwrap();
        let WebhookEvent::PullRequest(event) = event else {
            panic!("expected pull_request event");
        };
        assert_eq!(event.action, "closed");
        assert!(event.pull_request.is_merged());
        assert_eq!(event.repository.key(), RepoKey::new("pingcap", "tidb"));
        assert_eq!(event.installation.map(|i| i.id), Some(99));
    }

    #[test]
    fn test_parse_issue_comment_on_pull_request() {
        let payload = json!({
            "action": "created",
            "issue": {
                "number": 5,
                "state": "open",
                "title": "Add feature",
                "user": { "login": "author" },
                "labels": [],
                "author_association": "MEMBER",
                "created_at": "2021-01-01T00:00:00Z",
                "updated_at": "2021-01-02T00:00:00Z",
                "closed_at": null,
                "pull_request": { "url": "https://api.github.com/repos/pingcap/tidb/pulls/5" }
            },
            "comment": {
                "id": 123,
                "user": { "login": "reviewer" },
                "body": "/lgtm",
                "html_url": "https://github.com/pingcap/tidb/pull/5#issuecomment-123",
                "author_association": "MEMBER",
                "created_at": "2021-01-02T00:00:00Z",
                "updated_at": "2021-01-02T00:00:00Z"
            },
            "repository": repository_json()
        });

        let event = WebhookEvent::parse("issue_comment", payload.to_string().as_bytes()).unwrap();
        let WebhookEvent::IssueComment(event) = event else {
            panic!("expected issue_comment event");
        };
        assert!(event.issue.is_pull_request());
        assert_eq!(event.comment.id, 123);
        assert!(event.installation.is_none());
    }

    #[test]
    fn test_parse_installation_repositories() {
        let payload = json!({
            "action": "added",
            "installation": { "id": 3, "account": { "login": "pingcap" } },
            "repositories_added": [
                { "id": 1, "name": "tidb", "full_name": "pingcap/tidb", "private": false },
                { "id": 2, "name": "secret", "full_name": "pingcap/secret", "private": true },
                { "id": 3, "name": "docs", "private": false }
            ]
        });

        let event =
            WebhookEvent::parse("installation_repositories", payload.to_string().as_bytes()).unwrap();
        let WebhookEvent::InstallationRepositories(event) = event else {
            panic!("expected installation_repositories event");
        };
        assert_eq!(
            installed_repo_keys(event.installation.account.as_ref(), &event.repositories_added),
            vec![RepoKey::new("pingcap", "tidb"), RepoKey::new("pingcap", "docs")]
        );
    }

    #[test]
    fn test_unknown_and_malformed_events() {
        assert!(matches!(
            WebhookEvent::parse("star", b"{}").unwrap(),
            WebhookEvent::Unsupported(name) if name == "star"
        ));
        assert!(matches!(WebhookEvent::parse("ping", b"{}").unwrap(), WebhookEvent::Ping));
        assert!(WebhookEvent::parse("issues", b"{}").is_err());
    }
}
