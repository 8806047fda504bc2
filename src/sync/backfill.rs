use std::collections::HashMap;

use super::BulkSync;

impl BulkSync {
    /// Fill in missing contributor emails from the patches of their stored
    /// pull requests. Stops at the first patch that yields an email.
    ///
    /// Returns how many contributors got an email.
    pub async fn backfill_contributor_emails(&self) -> usize {
        tracing::info!("Syncing contributor emails");

        let logins = self
            .services
            .contributors
            .list_contributors_missing_email()
            .await;
        if logins.is_empty() {
            return 0;
        }

        let installations: HashMap<String, u64> = match self.platform.list_installations().await {
            Ok(installations) => installations
                .into_iter()
                .filter_map(|i| i.account_login.map(|login| (login, i.id)))
                .collect(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to list installations for email backfill");
                return 0;
            }
        };

        let mut found = 0;
        for login in &logins {
            if self.backfill_one(login, &installations).await {
                found += 1;
            }
        }

        tracing::info!(
            missing = logins.len(),
            found = found,
            "Finished syncing contributor emails"
        );
        found
    }

    async fn backfill_one(&self, login: &str, installations: &HashMap<String, u64>) -> bool {
        let pulls = self.services.pulls.contributor_pull_requests(login).await;

        for pull in pulls {
            let key = pull.key();
            let Some(&installation_id) = installations.get(&key.owner) else {
                tracing::debug!(pull = %key, "No installation for owner, skipping patch");
                continue;
            };

            let patch = match self.platform.get_pull_patch(installation_id, &key).await {
                Ok(patch) => patch,
                Err(e) => {
                    tracing::warn!(pull = %key, error = %e, "Failed to fetch pull request patch");
                    continue;
                }
            };

            if self
                .services
                .contributors
                .sync_contributor_email_from_pr(login, &patch)
                .await
            {
                return true;
            }
        }

        false
    }
}
