//! Firewall rule records
//!
//! [`FirewallRule`] is what a router driver scrapes from the rule table.
//! [`DesiredRuleSpec`] is the single rule the reconciler wants to exist.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::Address;

/// One row of the router's IPv6 rule table, as observed
///
/// Snapshots only. `position` is where the row sat when the table was read
/// and becomes meaningless after any deletion, so mutations address rules by
/// their `destination` text instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    /// Zero-based row index at read time
    pub position: usize,
    /// Raw destination column text
    pub destination: String,
    /// Router-side row identifier, when the table exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_ref: Option<String>,
}

impl FirewallRule {
    /// Create a rule snapshot without a row reference
    pub fn new(position: usize, destination: impl Into<String>) -> Self {
        Self {
            position,
            destination: destination.into(),
            row_ref: None,
        }
    }

    /// Attach the router-side row identifier
    pub fn with_row_ref(mut self, row_ref: impl Into<String>) -> Self {
        self.row_ref = Some(row_ref.into());
        self
    }
}

impl fmt::Display for FirewallRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} dest={}", self.position, self.destination)
    }
}

/// Traffic direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
}

/// Service selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Service {
    Any,
}

/// Rule action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirewallAction {
    /// Allow always
    Accept,
}

/// Rule schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Schedule {
    None,
}

/// Source host selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceHost {
    Any,
}

/// Destination host selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestinationHost {
    Single(Address),
}

/// The allow-rule that should exist for the current address
///
/// Every field but the destination is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRuleSpec {
    pub direction: Direction,
    pub service: Service,
    pub action: FirewallAction,
    pub schedule: Schedule,
    pub source: SourceHost,
    pub destination: DestinationHost,
}

impl DesiredRuleSpec {
    /// Inbound ANY/ACCEPT rule for a single destination address
    pub fn for_address(address: Address) -> Self {
        Self {
            direction: Direction::Inbound,
            service: Service::Any,
            action: FirewallAction::Accept,
            schedule: Schedule::None,
            source: SourceHost::Any,
            destination: DestinationHost::Single(address),
        }
    }

    /// The protected address
    pub fn address(&self) -> Address {
        match self.destination {
            DestinationHost::Single(addr) => addr,
        }
    }
}
