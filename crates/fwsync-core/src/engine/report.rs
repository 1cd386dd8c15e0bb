//! Run report
//!
//! Everything one reconciliation run decided and did, in a form the binary
//! can log or print as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::SessionState;
use crate::address::Address;
use crate::reconcile::ReconciliationPlan;

/// What happened to one rule scheduled for deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The router acknowledged the deletion
    Deleted,
    /// The row was already gone when we looked for it
    AlreadyGone,
    /// Dry run: the row was found and left in place
    WouldDelete,
    /// The router refused or the call broke; the run carried on
    Failed { error: String },
}

impl DeleteOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DeleteOutcome::Failed { .. })
    }
}

/// Deletion outcome for one destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDeletion {
    pub destination: String,
    #[serde(flatten)]
    pub outcome: DeleteOutcome,
}

/// What happened to the create step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreateOutcome {
    /// A matching rule already existed
    NotNeeded,
    /// The router saved the new rule
    Created,
    /// Dry run: the rule was needed but not submitted
    WouldCreate,
    /// The router refused the new rule
    Failed { error: String },
}

/// End-of-run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunSummary {
    /// A rule for the address was already present
    Matched,
    /// A rule for the address was created
    Created,
    /// A rule was needed but could not be created
    CreateFailed,
    /// Dry run with changes pending; the router was left untouched
    DryRun,
}

/// Report for one completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub address: Address,
    pub dry_run: bool,
    pub plan: ReconciliationPlan,
    pub deletions: Vec<RuleDeletion>,
    pub create: CreateOutcome,
    /// `None` when verification was disabled or could not read the table
    pub verified: Option<bool>,
    pub states: Vec<SessionState>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Number of deletions that did not succeed
    pub fn failed_deletions(&self) -> usize {
        self.deletions
            .iter()
            .filter(|d| !d.outcome.is_success())
            .count()
    }

    /// Every mutation succeeded and verification (if any) found the table
    /// converged
    ///
    /// A dry run with pending changes never converges.
    pub fn is_converged(&self) -> bool {
        self.failed_deletions() == 0
            && !matches!(self.summary, RunSummary::CreateFailed | RunSummary::DryRun)
            && self.verified != Some(false)
    }
}
