//! SQLite-backed implementation of every entity store.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::model::{Comment, ContributorInfo, Issue, IssueKey, OpenPrStatus, Pull, PullKey};

use super::{CommentStore, ContributorStore, IssueStore, OpenPrStatusStore, PullStore};

pub type DbPool = Pool<Sqlite>;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS pulls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        repo TEXT NOT NULL,
        pull_number INTEGER NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        body TEXT NOT NULL DEFAULT '',
        user TEXT NOT NULL DEFAULT '',
        label TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL,
        association TEXT NOT NULL DEFAULT '',
        relation TEXT NOT NULL,
        created_at TEXT,
        updated_at TEXT,
        closed_at TEXT,
        merged_at TEXT,
        UNIQUE (owner, repo, pull_number)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_pulls_user ON pulls (user)",
    r#"
    CREATE TABLE IF NOT EXISTS issues (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        repo TEXT NOT NULL,
        issue_number INTEGER NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        body TEXT NOT NULL DEFAULT '',
        user TEXT NOT NULL DEFAULT '',
        label TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL,
        association TEXT NOT NULL DEFAULT '',
        relation TEXT NOT NULL,
        created_at TEXT,
        updated_at TEXT,
        closed_at TEXT,
        UNIQUE (owner, repo, issue_number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        repo TEXT NOT NULL,
        pull_number INTEGER,
        comment_id INTEGER NOT NULL UNIQUE,
        comment_type TEXT NOT NULL,
        body TEXT NOT NULL DEFAULT '',
        user TEXT,
        url TEXT NOT NULL DEFAULT '',
        association TEXT NOT NULL DEFAULT '',
        relation TEXT NOT NULL,
        created_at TEXT,
        updated_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_comments_pull_number ON comments (pull_number)",
    r#"
    CREATE TABLE IF NOT EXISTS contributor_info (
        login TEXT PRIMARY KEY,
        email TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS open_pr_status (
        owner TEXT NOT NULL,
        repo TEXT NOT NULL,
        pull_number INTEGER NOT NULL,
        last_comment_at TEXT,
        last_review_at TEXT,
        last_update_code_at TEXT,
        PRIMARY KEY (owner, repo, pull_number)
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_open_pr_status_key ON open_pr_status (owner, repo, pull_number)",
];

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Open the pool and make sure every table exists.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl PullStore for SqliteStore {
    async fn find_pull(&self, key: &PullKey) -> Result<Option<Pull>> {
        let pull = sqlx::query_as::<_, Pull>(
            "SELECT * FROM pulls WHERE owner = ? AND repo = ? AND pull_number = ?",
        )
        .bind(&key.owner)
        .bind(&key.repo)
        .bind(key.pull_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pull)
    }

    async fn upsert_pull(&self, pull: &Pull) -> Result<Option<Pull>> {
        let saved = sqlx::query_as::<_, Pull>(
            r#"
            INSERT INTO pulls (
                owner, repo, pull_number, title, body, user, label, status,
                association, relation, created_at, updated_at, closed_at, merged_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (owner, repo, pull_number) DO UPDATE SET
                title = excluded.title,
                body = excluded.body,
                user = excluded.user,
                label = excluded.label,
                status = excluded.status,
                association = excluded.association,
                relation = excluded.relation,
                updated_at = excluded.updated_at,
                closed_at = excluded.closed_at,
                merged_at = excluded.merged_at
            WHERE pulls.updated_at IS NULL
                OR julianday(excluded.updated_at) > julianday(pulls.updated_at)
            RETURNING *
            "#,
        )
        .bind(&pull.owner)
        .bind(&pull.repo)
        .bind(pull.pull_number)
        .bind(&pull.title)
        .bind(&pull.body)
        .bind(&pull.user)
        .bind(&pull.label)
        .bind(pull.status.as_str())
        .bind(&pull.association)
        .bind(pull.relation.as_str())
        .bind(pull.created_at)
        .bind(pull.updated_at)
        .bind(pull.closed_at)
        .bind(pull.merged_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(saved)
    }

    async fn list_pulls_by_author(&self, login: &str) -> Result<Vec<Pull>> {
        let pulls = sqlx::query_as::<_, Pull>(
            "SELECT * FROM pulls WHERE user = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(login)
        .fetch_all(&self.pool)
        .await?;

        Ok(pulls)
    }
}

#[async_trait]
impl IssueStore for SqliteStore {
    async fn find_issue(&self, key: &IssueKey) -> Result<Option<Issue>> {
        let issue = sqlx::query_as::<_, Issue>(
            "SELECT * FROM issues WHERE owner = ? AND repo = ? AND issue_number = ?",
        )
        .bind(&key.owner)
        .bind(&key.repo)
        .bind(key.issue_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(issue)
    }

    async fn upsert_issue(&self, issue: &Issue) -> Result<Option<Issue>> {
        let saved = sqlx::query_as::<_, Issue>(
            r#"
            INSERT INTO issues (
                owner, repo, issue_number, title, body, user, label, status,
                association, relation, created_at, updated_at, closed_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (owner, repo, issue_number) DO UPDATE SET
                title = excluded.title,
                body = excluded.body,
                user = excluded.user,
                label = excluded.label,
                status = excluded.status,
                association = excluded.association,
                relation = excluded.relation,
                updated_at = excluded.updated_at,
                closed_at = excluded.closed_at
            WHERE issues.updated_at IS NULL
                OR julianday(excluded.updated_at) > julianday(issues.updated_at)
            RETURNING *
            "#,
        )
        .bind(&issue.owner)
        .bind(&issue.repo)
        .bind(issue.issue_number)
        .bind(&issue.title)
        .bind(&issue.body)
        .bind(&issue.user)
        .bind(&issue.label)
        .bind(issue.status.as_str())
        .bind(&issue.association)
        .bind(issue.relation.as_str())
        .bind(issue.created_at)
        .bind(issue.updated_at)
        .bind(issue.closed_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(saved)
    }
}

#[async_trait]
impl CommentStore for SqliteStore {
    async fn find_comment(&self, comment_id: i64) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE comment_id = ?")
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(comment)
    }

    async fn upsert_comment(&self, comment: &Comment) -> Result<Option<Comment>> {
        let saved = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (
                owner, repo, pull_number, comment_id, comment_type, body, user,
                url, association, relation, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (comment_id) DO UPDATE SET
                owner = excluded.owner,
                repo = excluded.repo,
                body = excluded.body,
                url = excluded.url,
                association = excluded.association,
                relation = excluded.relation,
                updated_at = excluded.updated_at
            WHERE comments.updated_at IS NULL
                OR julianday(excluded.updated_at) > julianday(comments.updated_at)
            RETURNING *
            "#,
        )
        .bind(&comment.owner)
        .bind(&comment.repo)
        .bind(comment.pull_number)
        .bind(comment.comment_id)
        .bind(comment.comment_type.as_str())
        .bind(&comment.body)
        .bind(&comment.user)
        .bind(&comment.url)
        .bind(&comment.association)
        .bind(comment.relation.as_str())
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(saved)
    }
}

#[async_trait]
impl ContributorStore for SqliteStore {
    async fn upsert_contributor(&self, info: &ContributorInfo) -> Result<ContributorInfo> {
        let saved = sqlx::query_as::<_, ContributorInfo>(
            r#"
            INSERT INTO contributor_info (login, email) VALUES (?, ?)
            ON CONFLICT (login) DO UPDATE SET email = excluded.email
            RETURNING login, email
            "#,
        )
        .bind(&info.login)
        .bind(&info.email)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    async fn list_logins_missing_email(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT p.user
            FROM pulls p
            LEFT JOIN contributor_info c ON c.login = p.user
            WHERE p.status = 'merged' AND p.user <> '' AND c.email IS NULL
            ORDER BY p.user
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(login,)| login).collect())
    }
}

#[async_trait]
impl OpenPrStatusStore for SqliteStore {
    async fn find_open_pr_status(&self, key: &PullKey) -> Result<Option<OpenPrStatus>> {
        let status = sqlx::query_as::<_, OpenPrStatus>(
            r#"
            SELECT owner, repo, pull_number, last_comment_at, last_review_at, last_update_code_at
            FROM open_pr_status
            WHERE owner = ? AND repo = ? AND pull_number = ?
            "#,
        )
        .bind(&key.owner)
        .bind(&key.repo)
        .bind(key.pull_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(status)
    }

    async fn upsert_open_pr_status(&self, status: &OpenPrStatus) -> Result<OpenPrStatus> {
        let saved = sqlx::query_as::<_, OpenPrStatus>(
            r#"
            INSERT INTO open_pr_status (
                owner, repo, pull_number, last_comment_at, last_review_at, last_update_code_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (owner, repo, pull_number) DO UPDATE SET
                last_comment_at = excluded.last_comment_at,
                last_review_at = excluded.last_review_at,
                last_update_code_at = excluded.last_update_code_at
            RETURNING owner, repo, pull_number, last_comment_at, last_review_at, last_update_code_at
            "#,
        )
        .bind(&status.owner)
        .bind(&status.repo)
        .bind(status.pull_number)
        .bind(status.last_comment_at)
        .bind(status.last_review_at)
        .bind(status.last_update_code_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }
}
