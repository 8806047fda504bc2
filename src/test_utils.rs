//! Shared test doubles and payload fixtures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::model::{Comment, ContributorInfo, Issue, IssueKey, OpenPrStatus, Pull, PullKey, PullStatus, RepoKey};
use crate::platform::types::*;
use crate::platform::{Platform, PAGE_SIZE};
use crate::store::{CommentStore, ContributorStore, IssueStore, OpenPrStatusStore, PullStore};
use crate::util::time::{parse_timestamp, time};

pub fn ts(value: &str) -> Option<DateTime<Utc>> {
    parse_timestamp(value)
}

fn user(login: &str) -> Option<UserRef> {
    Some(UserRef {
        login: login.to_string(),
    })
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    pulls: Mutex<HashMap<PullKey, Pull>>,
    issues: Mutex<HashMap<IssueKey, Issue>>,
    comments: Mutex<HashMap<i64, Comment>>,
    contributors: Mutex<HashMap<String, ContributorInfo>>,
    statuses: Mutex<HashMap<PullKey, OpenPrStatus>>,
    next_id: AtomicI64,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upsert fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful upserts across all tables.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn pull(&self, key: &PullKey) -> Option<Pull> {
        self.pulls.lock().unwrap().get(key).cloned()
    }

    pub fn issue(&self, key: &IssueKey) -> Option<Issue> {
        self.issues.lock().unwrap().get(key).cloned()
    }

    pub fn comment(&self, comment_id: i64) -> Option<Comment> {
        self.comments.lock().unwrap().get(&comment_id).cloned()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.lock().unwrap().len()
    }

    pub fn contributor(&self, login: &str) -> Option<ContributorInfo> {
        self.contributors.lock().unwrap().get(login).cloned()
    }

    pub fn open_status(&self, key: &PullKey) -> Option<OpenPrStatus> {
        self.statuses.lock().unwrap().get(key).cloned()
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected write failure".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Mirrors the SQL upsert guard: an existing row is replaced only by a strictly newer one.
    fn replaces(incoming: Option<DateTime<Utc>>, stored: Option<DateTime<Utc>>) -> bool {
        stored.is_none() || time(incoming).later_than(&time(stored))
    }

    fn assign_id(&self, id: Option<i64>) -> Option<i64> {
        id.or_else(|| Some(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

#[async_trait]
impl PullStore for MemoryStore {
    async fn find_pull(&self, key: &PullKey) -> Result<Option<Pull>> {
        Ok(self.pull(key))
    }

    async fn upsert_pull(&self, pull: &Pull) -> Result<Option<Pull>> {
        let mut pulls = self.pulls.lock().unwrap();
        let key = pull.key();
        let existing = pulls.get(&key);
        if existing.is_some_and(|p| !Self::replaces(pull.updated_at, p.updated_at)) {
            return Ok(None);
        }
        self.check_write()?;
        let saved = Pull {
            id: self.assign_id(existing.and_then(|p| p.id)),
            created_at: existing.map_or(pull.created_at, |p| p.created_at),
            ..pull.clone()
        };
        pulls.insert(key, saved.clone());
        Ok(Some(saved))
    }

    async fn list_pulls_by_author(&self, login: &str) -> Result<Vec<Pull>> {
        Ok(self
            .pulls
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.user == login)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl IssueStore for MemoryStore {
    async fn find_issue(&self, key: &IssueKey) -> Result<Option<Issue>> {
        Ok(self.issue(key))
    }

    async fn upsert_issue(&self, issue: &Issue) -> Result<Option<Issue>> {
        let mut issues = self.issues.lock().unwrap();
        let key = issue.key();
        let existing = issues.get(&key);
        if existing.is_some_and(|i| !Self::replaces(issue.updated_at, i.updated_at)) {
            return Ok(None);
        }
        self.check_write()?;
        let saved = Issue {
            id: self.assign_id(existing.and_then(|i| i.id)),
            created_at: existing.map_or(issue.created_at, |i| i.created_at),
            ..issue.clone()
        };
        issues.insert(key, saved.clone());
        Ok(Some(saved))
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn find_comment(&self, comment_id: i64) -> Result<Option<Comment>> {
        Ok(self.comment(comment_id))
    }

    async fn upsert_comment(&self, comment: &Comment) -> Result<Option<Comment>> {
        let mut comments = self.comments.lock().unwrap();
        let saved = match comments.get(&comment.comment_id) {
            Some(existing) if !Self::replaces(comment.updated_at, existing.updated_at) => {
                return Ok(None);
            }
            Some(existing) => Comment {
                id: existing.id,
                pull_number: existing.pull_number,
                comment_type: existing.comment_type,
                user: existing.user.clone(),
                created_at: existing.created_at,
                ..comment.clone()
            },
            None => Comment {
                id: self.assign_id(None),
                ..comment.clone()
            },
        };
        self.check_write()?;
        comments.insert(comment.comment_id, saved.clone());
        Ok(Some(saved))
    }
}

#[async_trait]
impl ContributorStore for MemoryStore {
    async fn upsert_contributor(&self, info: &ContributorInfo) -> Result<ContributorInfo> {
        self.check_write()?;
        self.contributors
            .lock()
            .unwrap()
            .insert(info.login.clone(), info.clone());
        Ok(info.clone())
    }

    async fn list_logins_missing_email(&self) -> Result<Vec<String>> {
        let contributors = self.contributors.lock().unwrap();
        let mut logins: Vec<String> = self
            .pulls
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.status == PullStatus::Merged && !p.user.is_empty())
            .filter(|p| {
                contributors
                    .get(&p.user)
                    .map_or(true, |c| c.email.is_none())
            })
            .map(|p| p.user.clone())
            .collect();
        logins.sort();
        logins.dedup();
        Ok(logins)
    }
}

#[async_trait]
impl OpenPrStatusStore for MemoryStore {
    async fn find_open_pr_status(&self, key: &PullKey) -> Result<Option<OpenPrStatus>> {
        Ok(self.open_status(key))
    }

    async fn upsert_open_pr_status(&self, status: &OpenPrStatus) -> Result<OpenPrStatus> {
        self.check_write()?;
        let key = RepoKey::new(&status.owner, &status.repo).pull(status.pull_number);
        self.statuses.lock().unwrap().insert(key, status.clone());
        Ok(status.clone())
    }
}

// ---------------------------------------------------------------------------
// Scripted platform
// ---------------------------------------------------------------------------

/// A `Platform` serving canned data. Every call is recorded in `calls`.
pub struct FakePlatform {
    pub installations: Vec<Installation>,
    pub installation_repos: HashMap<u64, Vec<InstallationRepo>>,
    pub repo_installations: HashMap<RepoKey, u64>,
    pub pulls: HashMap<RepoKey, Vec<PullRequestData>>,
    pub issues: HashMap<RepoKey, Vec<IssueData>>,
    pub reviews: HashMap<PullKey, Vec<ReviewData>>,
    pub review_comments: HashMap<PullKey, Vec<ReviewCommentData>>,
    pub commits: HashMap<PullKey, Vec<CommitData>>,
    pub issue_comments: HashMap<IssueKey, Vec<IssueCommentData>>,
    pub patches: HashMap<PullKey, String>,
    pub calls: Mutex<Vec<String>>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            installations: Vec::new(),
            installation_repos: HashMap::new(),
            repo_installations: HashMap::new(),
            pulls: HashMap::new(),
            issues: HashMap::new(),
            reviews: HashMap::new(),
            review_comments: HashMap::new(),
            commits: HashMap::new(),
            issue_comments: HashMap::new(),
            patches: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakePlatform {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn page<T: Clone>(&self, items: Option<&Vec<T>>, page: u32) -> Vec<T> {
        let size = PAGE_SIZE as usize;
        let start = (page.saturating_sub(1) as usize) * size;
        items
            .map(|items| items.iter().skip(start).take(size).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn list_installations(&self) -> Result<Vec<Installation>> {
        self.record("list_installations".to_string());
        Ok(self.installations.clone())
    }

    async fn list_installation_repos(&self, installation_id: u64) -> Result<Vec<InstallationRepo>> {
        self.record(format!("list_installation_repos {installation_id}"));
        Ok(self
            .installation_repos
            .get(&installation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_repo_installation(&self, repo: &RepoKey) -> Result<u64> {
        self.record(format!("get_repo_installation {repo}"));
        self.repo_installations
            .get(repo)
            .copied()
            .ok_or_else(|| AppError::GitHubApi(format!("no installation for {repo}")))
    }

    async fn list_pulls_page(
        &self,
        _installation_id: u64,
        repo: &RepoKey,
        page: u32,
    ) -> Result<Vec<PullRequestData>> {
        self.record(format!("list_pulls_page {repo} {page}"));
        Ok(self.page(self.pulls.get(repo), page))
    }

    async fn list_issues_page(
        &self,
        _installation_id: u64,
        repo: &RepoKey,
        page: u32,
    ) -> Result<Vec<IssueData>> {
        self.record(format!("list_issues_page {repo} {page}"));
        Ok(self.page(self.issues.get(repo), page))
    }

    async fn list_reviews(&self, _installation_id: u64, pull: &PullKey) -> Result<Vec<ReviewData>> {
        self.record(format!("list_reviews {pull}"));
        Ok(self.reviews.get(pull).cloned().unwrap_or_default())
    }

    async fn list_review_comments(
        &self,
        _installation_id: u64,
        pull: &PullKey,
    ) -> Result<Vec<ReviewCommentData>> {
        self.record(format!("list_review_comments {pull}"));
        Ok(self.review_comments.get(pull).cloned().unwrap_or_default())
    }

    async fn list_commits(&self, _installation_id: u64, pull: &PullKey) -> Result<Vec<CommitData>> {
        self.record(format!("list_commits {pull}"));
        Ok(self.commits.get(pull).cloned().unwrap_or_default())
    }

    async fn list_issue_comments(
        &self,
        _installation_id: u64,
        issue: &IssueKey,
    ) -> Result<Vec<IssueCommentData>> {
        self.record(format!("list_issue_comments {issue}"));
        Ok(self.issue_comments.get(issue).cloned().unwrap_or_default())
    }

    async fn get_pull_patch(&self, installation_id: u64, pull: &PullKey) -> Result<String> {
        self.record(format!("get_pull_patch {installation_id} {pull}"));
        self.patches
            .get(pull)
            .cloned()
            .ok_or_else(|| AppError::GitHubApi(format!("no patch for {pull}")))
    }
}

// ---------------------------------------------------------------------------
// Payload fixtures
// ---------------------------------------------------------------------------

pub struct PullRequestBuilder {
    data: PullRequestData,
}

/// An open-or-closed pull request by `author` with the given update time.
pub fn pull_request(number: i64, state: &str, updated_at: &str) -> PullRequestBuilder {
    PullRequestBuilder {
        data: PullRequestData {
            number,
            state: state.to_string(),
            title: format!("pull request {number}"),
            body: Some(String::new()),
            user: user("author"),
            labels: Vec::new(),
            author_association: "CONTRIBUTOR".to_string(),
            created_at: ts("2015-01-01T00:00:00Z"),
            updated_at: ts(updated_at),
            closed_at: None,
            merged_at: None,
        },
    }
}

impl PullRequestBuilder {
    pub fn title(mut self, title: &str) -> Self {
        self.data.title = title.to_string();
        self
    }

    pub fn user(mut self, login: &str) -> Self {
        self.data.user = user(login);
        self
    }

    pub fn label(mut self, name: &str) -> Self {
        self.data.labels.push(Label::Object {
            name: Some(name.to_string()),
        });
        self
    }

    pub fn association(mut self, association: &str) -> Self {
        self.data.author_association = association.to_string();
        self
    }

    pub fn created_at(mut self, value: &str) -> Self {
        self.data.created_at = ts(value);
        self
    }

    pub fn merged_at(mut self, value: &str) -> Self {
        self.data.merged_at = ts(value);
        self.data.closed_at = ts(value);
        self
    }

    pub fn build(self) -> PullRequestData {
        self.data
    }
}

pub struct IssueBuilder {
    data: IssueData,
}

pub fn issue(number: i64, state: &str, updated_at: &str) -> IssueBuilder {
    IssueBuilder {
        data: IssueData {
            number,
            state: state.to_string(),
            title: format!("issue {number}"),
            body: None,
            user: user("reporter"),
            labels: Vec::new(),
            author_association: "NONE".to_string(),
            created_at: ts("2015-01-01T00:00:00Z"),
            updated_at: ts(updated_at),
            closed_at: None,
            pull_request: None,
        },
    }
}

impl IssueBuilder {
    pub fn title(mut self, title: &str) -> Self {
        self.data.title = title.to_string();
        self
    }

    pub fn label(mut self, name: &str) -> Self {
        self.data.labels.push(Label::Name(name.to_string()));
        self
    }

    pub fn association(mut self, association: &str) -> Self {
        self.data.author_association = association.to_string();
        self
    }

    pub fn closed_at(mut self, value: &str) -> Self {
        self.data.closed_at = ts(value);
        self
    }

    /// Mark this issue as the issue side of a pull request.
    pub fn pull_request(mut self) -> Self {
        self.data.pull_request = Some(serde_json::json!({ "url": "https://api.github.com/pulls/1" }));
        self
    }

    pub fn build(self) -> IssueData {
        self.data
    }
}

pub fn review(id: i64, login: &str, submitted_at: Option<&str>) -> ReviewData {
    ReviewData {
        id,
        user: user(login),
        body: Some("looks fine".to_string()),
        html_url: format!("https://github.com/owner/repo/pull/1#pullrequestreview-{id}"),
        author_association: "MEMBER".to_string(),
        submitted_at: submitted_at.and_then(ts),
    }
}

pub fn review_comment(id: i64, login: &str, updated_at: &str) -> ReviewCommentData {
    ReviewCommentData {
        id,
        user: user(login),
        body: Some(format!("review comment {id}")),
        html_url: format!("https://github.com/owner/repo/pull/1#discussion_r{id}"),
        author_association: "CONTRIBUTOR".to_string(),
        created_at: ts(updated_at),
        updated_at: ts(updated_at),
    }
}

pub fn issue_comment(id: i64, login: &str, updated_at: &str) -> IssueCommentData {
    IssueCommentData {
        id,
        user: user(login),
        body: Some(format!("comment {id}")),
        html_url: format!("https://github.com/owner/repo/issues/1#issuecomment-{id}"),
        author_association: "NONE".to_string(),
        created_at: ts(updated_at),
        updated_at: ts(updated_at),
    }
}

pub fn commit(date: Option<&str>) -> CommitData {
    CommitData {
        commit: CommitDetail {
            committer: Some(GitActor {
                date: date.and_then(ts),
            }),
        },
    }
}

pub fn installation_repo(owner: &str, name: &str) -> InstallationRepo {
    InstallationRepo {
        name: name.to_string(),
        owner: UserRef {
            login: owner.to_string(),
        },
        private: false,
        archived: false,
        disabled: false,
    }
}

pub const PATCH_WITH_SIGNOFF: &str = "\
From 1a2b3c4d Mon Sep 17 00:00:00 2001
From: Jane Doe <jane.author@example.com>
Date: Mon, 7 Sep 2015 12:14:59 +0800
Subject: [PATCH] planner: fix join reorder

Signed-off-by: Jane Doe <jane.signoff@example.org>
---
 planner/core/rule_join_reorder.go | 2 +-
";
