//! Persisted entities.
//!
//! Records are plain values: reconciliation builds a new record from
//! `(stored, received)` and hands it to the store, never mutating a shared one.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::error::AppError;
use crate::util::labels::decode_labels;

use super::keys::{IssueKey, PullKey};

/// Merge status of a pull request, derived from `state` and `merged_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PullStatus {
    Open,
    Closed,
    Merged,
}

impl PullStatus {
    pub fn derive(state: &str, merged_at: Option<DateTime<Utc>>) -> Self {
        match state {
            "closed" if merged_at.is_some() => PullStatus::Merged,
            "closed" => PullStatus::Closed,
            _ => PullStatus::Open,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PullStatus::Open => "open",
            PullStatus::Closed => "closed",
            PullStatus::Merged => "merged",
        }
    }
}

/// Issue state as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Open,
    Closed,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::Closed => "closed",
        }
    }
}

impl From<&str> for IssueStatus {
    fn from(state: &str) -> Self {
        match state {
            "closed" => IssueStatus::Closed,
            _ => IssueStatus::Open,
        }
    }
}

/// Whether the author belongs to the organization that owns the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relation {
    #[serde(rename = "member")]
    Member,
    #[serde(rename = "not member")]
    NotMember,
}

impl Relation {
    pub fn from_association(author_association: &str) -> Self {
        if author_association == "MEMBER" {
            Relation::Member
        } else {
            Relation::NotMember
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Member => "member",
            Relation::NotMember => "not member",
        }
    }
}

/// The three GitHub objects that are all stored as comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommentType {
    #[serde(rename = "common comment")]
    CommonComment,
    #[serde(rename = "review comment")]
    ReviewComment,
    #[serde(rename = "review")]
    Review,
}

impl CommentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentType::CommonComment => "common comment",
            CommentType::ReviewComment => "review comment",
            CommentType::Review => "review",
        }
    }
}

macro_rules! text_column {
    ($ty:ty, $($text:literal => $variant:expr),+ $(,)?) => {
        impl TryFrom<String> for $ty {
            type Error = AppError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                match value.as_str() {
                    $($text => Ok($variant),)+
                    other => Err(AppError::Internal(format!(
                        "unexpected {} value: {other}",
                        stringify!($ty)
                    ))),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_column!(PullStatus, "open" => PullStatus::Open, "closed" => PullStatus::Closed, "merged" => PullStatus::Merged);
text_column!(IssueStatus, "open" => IssueStatus::Open, "closed" => IssueStatus::Closed);
text_column!(Relation, "member" => Relation::Member, "not member" => Relation::NotMember);
text_column!(
    CommentType,
    "common comment" => CommentType::CommonComment,
    "review comment" => CommentType::ReviewComment,
    "review" => CommentType::Review,
);

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Pull {
    /// Surrogate row id, assigned by the store on first insert.
    pub id: Option<i64>,
    pub owner: String,
    pub repo: String,
    pub pull_number: i64,
    pub title: String,
    pub body: String,
    pub user: String,
    pub label: String,
    #[sqlx(try_from = "String")]
    pub status: PullStatus,
    pub association: String,
    #[sqlx(try_from = "String")]
    pub relation: Relation,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl Pull {
    /// A record that has never been stored: only identity and creation time are known.
    pub fn empty(key: &PullKey, created_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: None,
            owner: key.owner.clone(),
            repo: key.repo.clone(),
            pull_number: key.pull_number,
            title: String::new(),
            body: String::new(),
            user: String::new(),
            label: String::new(),
            status: PullStatus::Open,
            association: String::new(),
            relation: Relation::NotMember,
            created_at,
            updated_at: None,
            closed_at: None,
            merged_at: None,
        }
    }

    pub fn key(&self) -> PullKey {
        PullKey {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            pull_number: self.pull_number,
        }
    }

    pub fn labels(&self) -> Vec<String> {
        decode_labels(&self.label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Issue {
    pub id: Option<i64>,
    pub owner: String,
    pub repo: String,
    pub issue_number: i64,
    pub title: String,
    pub body: String,
    pub user: String,
    pub label: String,
    #[sqlx(try_from = "String")]
    pub status: IssueStatus,
    pub association: String,
    #[sqlx(try_from = "String")]
    pub relation: Relation,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Issue {
    pub fn empty(key: &IssueKey, created_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: None,
            owner: key.owner.clone(),
            repo: key.repo.clone(),
            issue_number: key.issue_number,
            title: String::new(),
            body: String::new(),
            user: String::new(),
            label: String::new(),
            status: IssueStatus::Open,
            association: String::new(),
            relation: Relation::NotMember,
            created_at,
            updated_at: None,
            closed_at: None,
        }
    }

    pub fn key(&self) -> IssueKey {
        IssueKey {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            issue_number: self.issue_number,
        }
    }

    pub fn labels(&self) -> Vec<String> {
        decode_labels(&self.label)
    }
}

/// One row per GitHub comment, review comment or review.
///
/// `pull_number` holds the pull request number for PR threads and the issue
/// number for plain issue comments; `comment_type` tells the kinds apart.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Comment {
    pub id: Option<i64>,
    pub owner: String,
    pub repo: String,
    pub pull_number: Option<i64>,
    pub comment_id: i64,
    #[sqlx(try_from = "String")]
    pub comment_type: CommentType,
    pub body: String,
    pub user: Option<String>,
    pub url: String,
    pub association: String,
    #[sqlx(try_from = "String")]
    pub relation: Relation,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ContributorInfo {
    pub login: String,
    pub email: Option<String>,
}

/// Last-activity aggregate for an open pull request.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct OpenPrStatus {
    pub owner: String,
    pub repo: String,
    pub pull_number: i64,
    pub last_comment_at: Option<DateTime<Utc>>,
    pub last_review_at: Option<DateTime<Utc>>,
    pub last_update_code_at: Option<DateTime<Utc>>,
}

impl OpenPrStatus {
    pub fn empty(key: &PullKey) -> Self {
        Self {
            owner: key.owner.clone(),
            repo: key.repo.clone(),
            pull_number: key.pull_number,
            last_comment_at: None,
            last_review_at: None,
            last_update_code_at: None,
        }
    }
}
