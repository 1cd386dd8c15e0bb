//! Error types for the fwsync system
//!
//! This module defines all error types used throughout the crate.
//!
//! The variants follow the run's failure taxonomy: address, authentication,
//! navigation and timeout errors abort a reconciliation run, while
//! `MutationFailed` and `NotFoundInTable` are recorded against a single rule.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for fwsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the fwsync system
#[derive(Error, Debug)]
pub enum Error {
    /// No usable global IPv6 address could be determined for this host
    #[error("Address unavailable: {0}")]
    AddressUnavailable(String),

    /// The router rejected the credentials or the login flow broke
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The rule table page could not be reached
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// A single delete or create was not applied by the router
    #[error("Mutation failed: {0}")]
    MutationFailed(String),

    /// The rule to delete is no longer in the table
    #[error("Rule not found in table: {0}")]
    NotFoundInTable(String),

    /// A collaborator call did not complete within its bound
    #[error("Timed out after {timeout:?} waiting for {operation}")]
    TimeoutExceeded {
        /// Name of the operation that timed out
        operation: String,
        /// The bound that was exceeded
        timeout: Duration,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport errors (router driver, echo services)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Unparseable data returned by a collaborator
    #[error("Parse error: {0}")]
    Parse(String),

    /// Local I/O errors (interface enumeration, hostname lookup)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an address-unavailable error
    pub fn address_unavailable(msg: impl Into<String>) -> Self {
        Self::AddressUnavailable(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::AuthFailed(msg.into())
    }

    /// Create a navigation error
    pub fn navigation(msg: impl Into<String>) -> Self {
        Self::NavigationFailed(msg.into())
    }

    /// Create a mutation error
    pub fn mutation(msg: impl Into<String>) -> Self {
        Self::MutationFailed(msg.into())
    }

    /// Create a "not found in table" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFoundInTable(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::TimeoutExceeded {
            operation: operation.into(),
            timeout,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
