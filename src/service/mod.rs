//! Reconciliation services.
//!
//! Every `sync_*` call adjudicates one record on its own: it logs whatever
//! happened and reports a [`SyncOutcome`] instead of an error, so one bad
//! record never aborts the page or repository loop around it.

pub mod comment;
pub mod contributor;
pub mod issue;
pub mod pull;

use std::sync::Arc;

use crate::store::{CommentStore, ContributorStore, IssueStore, OpenPrStatusStore, PullStore};

pub use comment::{CommentPayload, CommentService, ReceivedComment};
pub use contributor::{extract_email_from_patch, ContributorService};
pub use issue::IssueService;
pub use pull::{PullActivity, PullService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The record was written.
    Saved,
    /// The stored record is as new or newer; nothing was written.
    Stale,
    /// Lookup or write failed; the error has been logged.
    Failed,
    /// Nothing to do, e.g. an update-time bump for a record that was never stored.
    Skipped,
}

/// Everything the event router and bulk sync need, wired once at start-up.
#[derive(Clone)]
pub struct Services {
    pub pulls: Arc<PullService>,
    pub issues: Arc<IssueService>,
    pub comments: Arc<CommentService>,
    pub contributors: Arc<ContributorService>,
}

impl Services {
    /// Build every service over one backing store.
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: PullStore + IssueStore + CommentStore + ContributorStore + OpenPrStatusStore + 'static,
    {
        Self {
            pulls: Arc::new(PullService::new(store.clone(), store.clone())),
            issues: Arc::new(IssueService::new(store.clone())),
            comments: Arc::new(CommentService::new(store.clone())),
            contributors: Arc::new(ContributorService::new(store)),
        }
    }
}
