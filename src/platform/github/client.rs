use async_trait::async_trait;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::model::{IssueKey, PullKey, RepoKey};
use crate::platform::types::*;
use crate::platform::{Platform, PAGE_SIZE};

use super::auth::generate_app_jwt;

const PATCH_MEDIA_TYPE: &str = "application/vnd.github.v3.patch";
const USER_AGENT: &str = concat!("syncbot/", env!("CARGO_PKG_VERSION"));

/// Query string for every listing call.
#[derive(Debug, Serialize)]
struct ListQuery {
    per_page: u32,
    page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    direction: Option<&'static str>,
}

impl ListQuery {
    fn page(page: u32) -> Self {
        Self {
            per_page: PAGE_SIZE,
            page,
            state: None,
            sort: None,
            direction: None,
        }
    }

    /// All states, oldest first.
    fn history(page: u32) -> Self {
        Self {
            state: Some("all"),
            sort: Some("created"),
            direction: Some("asc"),
            ..Self::page(page)
        }
    }
}

#[derive(Debug, Deserialize)]
struct InstallationResponse {
    id: u64,
    account: Option<UserRef>,
}

#[derive(Debug, Deserialize)]
struct InstallationReposResponse {
    repositories: Vec<InstallationRepo>,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: Option<String>,
}

pub struct GitHubPlatform {
    config: GitHubConfig,
    http: reqwest::Client,
    /// Cache of installation tokens: installation_id -> (token, expiry)
    token_cache: Arc<RwLock<HashMap<u64, (String, chrono::DateTime<chrono::Utc>)>>>,
}

impl GitHubPlatform {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        if !config.private_key_path.exists() {
            return Err(AppError::Config(format!(
                "GitHub App private key not found at: {}",
                config.private_key_path.display()
            )));
        }

        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            config: config.clone(),
            http,
            token_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn client_with_token(&self, token: String) -> Result<Octocrab> {
        Octocrab::builder()
            .base_uri(self.config.api_base_url.as_str())
            .map_err(|e| AppError::Config(format!("Invalid GitHub API base URL: {e}")))?
            .personal_token(token)
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))
    }

    /// Client authenticated as the app itself.
    fn app_client(&self) -> Result<Octocrab> {
        let jwt = generate_app_jwt(self.config.app_id, &self.config.private_key_path)?;
        self.client_with_token(jwt)
    }

    /// Client authenticated as an installation.
    async fn installation_client(&self, installation_id: u64) -> Result<Octocrab> {
        let token = self.access_token(installation_id).await?;
        self.client_with_token(token)
    }

    async fn access_token(&self, installation_id: u64) -> Result<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some((token, expiry)) = cache.get(&installation_id) {
                if *expiry > chrono::Utc::now() + chrono::Duration::minutes(5) {
                    return Ok(token.clone());
                }
            }
        }

        let url = format!("/app/installations/{installation_id}/access_tokens");
        let response: AccessTokenResponse = self
            .app_client()?
            .post(&url, None::<&()>)
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to create installation token: {e}")))?;

        let expires_at = response
            .expires_at
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|| chrono::Utc::now() + chrono::Duration::hours(1));

        let mut cache = self.token_cache.write().await;
        cache.insert(installation_id, (response.token.clone(), expires_at));

        Ok(response.token)
    }

    /// Follow `page` until a short page comes back.
    async fn get_all<T: DeserializeOwned>(&self, client: &Octocrab, route: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let batch: Vec<T> = client.get(route, Some(&ListQuery::page(page))).await?;
            let done = batch.len() < PAGE_SIZE as usize;
            items.extend(batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl Platform for GitHubPlatform {
    async fn list_installations(&self) -> Result<Vec<Installation>> {
        let client = self.app_client()?;
        let installations: Vec<InstallationResponse> =
            self.get_all(&client, "/app/installations").await?;

        Ok(installations
            .into_iter()
            .map(|i| Installation {
                id: i.id,
                account_login: i.account.map(|a| a.login),
            })
            .collect())
    }

    async fn list_installation_repos(&self, installation_id: u64) -> Result<Vec<InstallationRepo>> {
        let client = self.installation_client(installation_id).await?;
        let mut repos = Vec::new();
        let mut page = 1;

        loop {
            let response: InstallationReposResponse = client
                .get("/installation/repositories", Some(&ListQuery::page(page)))
                .await?;
            let done = response.repositories.len() < PAGE_SIZE as usize;
            repos.extend(response.repositories);
            if done {
                return Ok(repos);
            }
            page += 1;
        }
    }

    async fn get_repo_installation(&self, repo: &RepoKey) -> Result<u64> {
        let route = format!("/repos/{}/{}/installation", repo.owner, repo.repo);
        let installation: InstallationResponse = self.app_client()?.get(&route, None::<&()>).await?;
        Ok(installation.id)
    }

    async fn list_pulls_page(
        &self,
        installation_id: u64,
        repo: &RepoKey,
        page: u32,
    ) -> Result<Vec<PullRequestData>> {
        let client = self.installation_client(installation_id).await?;
        let route = format!("/repos/{}/{}/pulls", repo.owner, repo.repo);
        Ok(client.get(&route, Some(&ListQuery::history(page))).await?)
    }

    async fn list_issues_page(
        &self,
        installation_id: u64,
        repo: &RepoKey,
        page: u32,
    ) -> Result<Vec<IssueData>> {
        let client = self.installation_client(installation_id).await?;
        let route = format!("/repos/{}/{}/issues", repo.owner, repo.repo);
        Ok(client.get(&route, Some(&ListQuery::history(page))).await?)
    }

    async fn list_reviews(&self, installation_id: u64, pull: &PullKey) -> Result<Vec<ReviewData>> {
        let client = self.installation_client(installation_id).await?;
        let route = format!(
            "/repos/{}/{}/pulls/{}/reviews",
            pull.owner, pull.repo, pull.pull_number
        );
        self.get_all(&client, &route).await
    }

    async fn list_review_comments(
        &self,
        installation_id: u64,
        pull: &PullKey,
    ) -> Result<Vec<ReviewCommentData>> {
        let client = self.installation_client(installation_id).await?;
        let route = format!(
            "/repos/{}/{}/pulls/{}/comments",
            pull.owner, pull.repo, pull.pull_number
        );
        self.get_all(&client, &route).await
    }

    async fn list_commits(&self, installation_id: u64, pull: &PullKey) -> Result<Vec<CommitData>> {
        let client = self.installation_client(installation_id).await?;
        let route = format!(
            "/repos/{}/{}/pulls/{}/commits",
            pull.owner, pull.repo, pull.pull_number
        );
        self.get_all(&client, &route).await
    }

    async fn list_issue_comments(
        &self,
        installation_id: u64,
        issue: &IssueKey,
    ) -> Result<Vec<IssueCommentData>> {
        let client = self.installation_client(installation_id).await?;
        let route = format!(
            "/repos/{}/{}/issues/{}/comments",
            issue.owner, issue.repo, issue.issue_number
        );
        self.get_all(&client, &route).await
    }

    async fn get_pull_patch(&self, installation_id: u64, pull: &PullKey) -> Result<String> {
        // octocrab always negotiates JSON, so the patch media type goes through reqwest.
        let token = self.access_token(installation_id).await?;
        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.config.api_base_url.trim_end_matches('/'),
            pull.owner,
            pull.repo,
            pull.pull_number
        );

        let patch = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, PATCH_MEDIA_TYPE)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_query_lists_all_states_oldest_first() {
        let query = serde_json::to_value(ListQuery::history(3)).unwrap();
        assert_eq!(
            query,
            serde_json::json!({
                "per_page": 100,
                "page": 3,
                "state": "all",
                "sort": "created",
                "direction": "asc",
            })
        );
    }

    #[test]
    fn test_plain_page_query_omits_filters() {
        let query = serde_json::to_value(ListQuery::page(1)).unwrap();
        assert_eq!(query, serde_json::json!({ "per_page": 100, "page": 1 }));
    }

    #[test]
    fn test_new_requires_private_key() {
        let config = GitHubConfig {
            app_id: 1,
            private_key_path: "/nonexistent/syncbot.pem".into(),
            api_base_url: "https://api.github.com".to_string(),
        };
        assert!(matches!(GitHubPlatform::new(&config), Err(AppError::Config(_))));
    }
}
