//! GitHub REST shapes shared by paginated listings and webhook payloads.
//!
//! Only the fields the sync core reads are modelled; serde ignores the rest.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::util::time::lenient;

/// An installation of the GitHub App.
#[derive(Debug, Clone)]
pub struct Installation {
    pub id: u64,
    pub account_login: Option<String>,
}

/// A repository accessible via an installation.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallationRepo {
    pub name: String,
    pub owner: UserRef,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub disabled: bool,
}

impl InstallationRepo {
    /// Only public, live repositories are mirrored.
    pub fn is_syncable(&self) -> bool {
        !self.private && !self.archived && !self.disabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRef {
    pub login: String,
}

/// GitHub sends labels as objects, but some payloads (and older fixtures) carry bare names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
    },
}

impl Label {
    pub fn name(&self) -> Option<&str> {
        match self {
            Label::Name(name) => Some(name),
            Label::Object { name } => name.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestData {
    pub number: i64,
    pub state: String,
    #[serde(default)]
    pub title: String,
    pub body: Option<String>,
    pub user: Option<UserRef>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub author_association: String,
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequestData {
    pub fn author(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.login.as_str())
    }

    pub fn is_open(&self) -> bool {
        self.state == "open"
    }

    pub fn is_merged(&self) -> bool {
        self.state == "closed" && self.merged_at.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueData {
    pub number: i64,
    pub state: String,
    #[serde(default)]
    pub title: String,
    pub body: Option<String>,
    pub user: Option<UserRef>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub author_association: String,
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Present if the issue is actually a pull request.
    pub pull_request: Option<serde_json::Value>,
}

impl IssueData {
    pub fn author(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.login.as_str())
    }

    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.state == "open"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewData {
    pub id: i64,
    pub user: Option<UserRef>,
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub author_association: String,
    /// Reviews carry no separate update time; this is their only timestamp.
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewCommentData {
    pub id: i64,
    pub user: Option<UserRef>,
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub author_association: String,
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentData {
    pub id: i64,
    pub user: Option<UserRef>,
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub author_association: String,
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitData {
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    pub committer: Option<GitActor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitActor {
    #[serde(default, deserialize_with = "lenient::deserialize")]
    pub date: Option<DateTime<Utc>>,
}

impl CommitData {
    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.commit.committer.as_ref().and_then(|c| c.date)
    }
}

/// Login of a possibly-null GitHub user.
pub fn login_of(user: &Option<UserRef>) -> Option<&str> {
    user.as_ref().map(|u| u.login.as_str())
}
