//! Rule reconciliation
//!
//! Pure diff between the desired state (one allow-rule for the current
//! address) and the observed rule table. No I/O happens here; the engine
//! executes the resulting [`ReconciliationPlan`].
//!
//! ## Policy
//!
//! - Rules whose destination equals the current address are kept, however
//!   many there are.
//! - Every other rule is deleted, whether or not a match exists. Stale rules
//!   are purged on every run.
//! - Destination cells that do not parse as IPv6 never match and are
//!   deleted. Planning never fails.
//! - A create is needed exactly when nothing matched.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::rule::FirewallRule;

/// The decision for one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    /// A rule for the current address already exists
    pub matched: bool,
    /// Rules for the current address, left untouched
    pub keep: Vec<FirewallRule>,
    /// Rules to delete, in table order
    pub to_delete: Vec<FirewallRule>,
    /// A rule for the current address must be created
    pub to_create: bool,
}

impl ReconciliationPlan {
    /// Nothing to delete and nothing to create
    pub fn is_noop(&self) -> bool {
        self.matched && self.to_delete.is_empty()
    }
}

/// Compute the plan for `current` against an inventory snapshot
pub fn plan(current: &Address, inventory: &[FirewallRule]) -> ReconciliationPlan {
    if inventory.is_empty() {
        return ReconciliationPlan {
            matched: false,
            keep: Vec::new(),
            to_delete: Vec::new(),
            to_create: true,
        };
    }

    let (keep, to_delete): (Vec<_>, Vec<_>) = inventory
        .iter()
        .cloned()
        .partition(|rule| current.matches_text(&rule.destination));

    let matched = !keep.is_empty();

    ReconciliationPlan {
        matched,
        keep,
        to_delete,
        to_create: !matched,
    }
}
