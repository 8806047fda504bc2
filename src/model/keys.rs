use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoKey {
    pub owner: String,
    pub repo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullKey {
    pub owner: String,
    pub repo: String,
    pub pull_number: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueKey {
    pub owner: String,
    pub repo: String,
    pub issue_number: i64,
}

impl RepoKey {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn pull(&self, pull_number: i64) -> PullKey {
        PullKey {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            pull_number,
        }
    }

    pub fn issue(&self, issue_number: i64) -> IssueKey {
        IssueKey {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            issue_number,
        }
    }
}

impl PullKey {
    pub fn repo_key(&self) -> RepoKey {
        RepoKey::new(&self.owner, &self.repo)
    }

    /// GitHub numbers pull requests and issues from the same sequence, so every
    /// pull request is also addressable as an issue.
    pub fn to_issue_key(&self) -> IssueKey {
        IssueKey {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            issue_number: self.pull_number,
        }
    }
}

impl IssueKey {
    pub fn to_pull_key(&self) -> PullKey {
        PullKey {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            pull_number: self.issue_number,
        }
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for PullKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.pull_number)
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.issue_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_and_issue_keys_convert() {
        let pull = RepoKey::new("pingcap", "tidb").pull(42);
        let issue = pull.to_issue_key();
        assert_eq!(issue, RepoKey::new("pingcap", "tidb").issue(42));
        assert_eq!(issue.to_pull_key(), pull);
        assert_eq!(pull.to_string(), "pingcap/tidb#42");
    }
}
