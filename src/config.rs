use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::model::RepoKey;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub github: GitHubConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct GitHubConfig {
    pub app_id: u64,
    pub private_key_path: PathBuf,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

// The key file itself is never read here; only its location is printed.
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("app_id", &self.app_id)
            .field("private_key_path", &self.private_key_path)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Comma separated `owner/repo` allow-list. Unset means every repository
    /// the app is installed on.
    #[serde(default)]
    pub repos: Option<String>,
    #[serde(default = "default_page_pause_ms")]
    pub page_pause_ms: u64,
    #[serde(default = "default_sync_on_startup")]
    pub sync_on_startup: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            repos: None,
            page_pause_ms: default_page_pause_ms(),
            sync_on_startup: default_sync_on_startup(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_database_url() -> String {
    "sqlite://syncbot.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_page_pause_ms() -> u64 {
    1000
}

fn default_sync_on_startup() -> bool {
    true
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("syncbot").required(false));
        }

        // SYNCBOT_SYNC__REPOS, SYNCBOT_GITHUB__APP_ID, ...
        builder = builder.add_source(
            config::Environment::with_prefix("SYNCBOT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }

    /// `None` selects installation discovery instead of a fixed list.
    pub fn repo_allow_list(&self) -> Option<Vec<RepoKey>> {
        self.sync.repos.as_deref().map(parse_repo_list)
    }
}

/// Parse `"owner/repo, owner/repo"`. Malformed entries are skipped.
pub fn parse_repo_list(value: &str) -> Vec<RepoKey> {
    let value = value.trim();
    if value.is_empty() {
        return Vec::new();
    }

    value
        .split(',')
        .filter_map(|item| {
            let parts: Vec<&str> = item.split('/').map(str::trim).collect();
            match parts.as_slice() {
                [owner, repo] if !owner.is_empty() && !repo.is_empty() => {
                    Some(RepoKey::new(*owner, *repo))
                }
                _ => {
                    tracing::warn!(entry = %item.trim(), "Ignoring malformed repository entry");
                    None
                }
            }
        })
        .collect()
}
