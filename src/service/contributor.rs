use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::model::ContributorInfo;
use crate::store::ContributorStore;

static EMAIL_IN_ANGLES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"<([A-Za-z0-9_]+(?:[-+.][A-Za-z0-9_]+)*@[A-Za-z0-9_]+(?:[-.][A-Za-z0-9_]+)*\.[A-Za-z0-9_]+(?:[-.][A-Za-z0-9_]+)*)>",
    )
    .expect("email pattern is valid")
});

pub struct ContributorService {
    contributors: Arc<dyn ContributorStore>,
}

impl ContributorService {
    pub fn new(contributors: Arc<dyn ContributorStore>) -> Self {
        Self { contributors }
    }

    /// Authors of merged pull requests for whom no email is known yet.
    pub async fn list_contributors_missing_email(&self) -> Vec<String> {
        match self.contributors.list_logins_missing_email().await {
            Ok(logins) => logins,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list contributors missing email");
                Vec::new()
            }
        }
    }

    /// Store the email found in `patch` for `login`. Returns whether one was stored.
    pub async fn sync_contributor_email_from_pr(&self, login: &str, patch: &str) -> bool {
        let Some(email) = extract_email_from_patch(patch) else {
            tracing::debug!(login = login, "No email found in patch");
            return false;
        };

        let info = ContributorInfo {
            login: login.to_string(),
            email: Some(email),
        };

        match self.contributors.upsert_contributor(&info).await {
            Ok(saved) => {
                tracing::info!(login = login, email = ?saved.email, "Synced contributor email");
                true
            }
            Err(e) => {
                tracing::error!(login = login, error = %e, "Failed to save contributor email");
                false
            }
        }
    }
}

/// Pick the contributor email out of a `git format-patch` mailbox.
///
/// `Signed-off-by:` trailers win over the `From:` header.
pub fn extract_email_from_patch(patch: &str) -> Option<String> {
    email_on_lines(patch, "Signed-off-by:").or_else(|| email_on_lines(patch, "From:"))
}

fn email_on_lines(patch: &str, marker: &str) -> Option<String> {
    patch
        .lines()
        .filter_map(|line| line.find(marker).map(|at| &line[at + marker.len()..]))
        .find_map(|rest| EMAIL_IN_ANGLES.captures(rest))
        .map(|caps| caps[1].to_string())
}
