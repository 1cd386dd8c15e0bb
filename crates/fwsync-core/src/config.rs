//! Configuration types for the fwsync system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Router management address the tool was first written against
pub const DEFAULT_ROUTER_URL: &str = "http://192.168.29.1";

/// Default administrator account name
pub const DEFAULT_USERNAME: &str = "admin";

/// Main fwsync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Where the current address comes from
    #[serde(default)]
    pub address_source: AddressSourceConfig,

    /// Router driver configuration
    #[serde(default)]
    pub router: RouterConfig,

    /// Router login
    #[serde(default)]
    pub credentials: Credentials,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.address_source.validate()?;
        self.router.validate()?;
        self.credentials.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Address source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AddressSourceConfig {
    /// Enumerate interface addresses (getifaddrs)
    Interfaces {
        /// Only consider this interface (e.g., "eth0")
        interface: Option<String>,
    },

    /// Resolve the host's own hostname
    Hostname,

    /// Ask an echo service for the address
    Http {
        /// URL returning the address as plain text
        url: String,
        /// Request timeout in seconds
        timeout_secs: u64,
    },

    /// Custom address source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl AddressSourceConfig {
    /// Validate the address source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            AddressSourceConfig::Interfaces { interface } => {
                if interface.as_deref().is_some_and(str::is_empty) {
                    return Err(crate::Error::config("Interface name cannot be empty"));
                }
                Ok(())
            }
            AddressSourceConfig::Http { url, timeout_secs } => {
                if url.is_empty() {
                    return Err(crate::Error::config("HTTP address source URL cannot be empty"));
                }
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "HTTP address source URL must use http or https: {url}"
                    )));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("HTTP address source timeout must be > 0"));
                }
                Ok(())
            }
            AddressSourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom address source factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom address source config cannot be null",
                    ));
                }
                Ok(())
            }
            AddressSourceConfig::Hostname => Ok(()),
        }
    }

    /// Get the source type name
    pub fn type_name(&self) -> &str {
        match self {
            AddressSourceConfig::Interfaces { .. } => "interfaces",
            AddressSourceConfig::Hostname => "hostname",
            AddressSourceConfig::Http { .. } => "http",
            AddressSourceConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for AddressSourceConfig {
    fn default() -> Self {
        AddressSourceConfig::Interfaces { interface: None }
    }
}

/// Router driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouterConfig {
    /// `platform.cgi` web management interface
    Web {
        /// Base URL of the management interface
        base_url: String,
        /// Read the table but never mutate it
        #[serde(default)]
        dry_run: bool,
        /// Per-request HTTP timeout in seconds
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },

    /// Custom driver
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl RouterConfig {
    /// Validate the router configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            RouterConfig::Web {
                base_url,
                request_timeout_secs,
                ..
            } => {
                if base_url.is_empty() {
                    return Err(crate::Error::config("Router base URL cannot be empty"));
                }
                if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                    return Err(crate::Error::config(format!(
                        "Router base URL must use http or https: {base_url}"
                    )));
                }
                if *request_timeout_secs == 0 {
                    return Err(crate::Error::config("Router request timeout must be > 0"));
                }
                Ok(())
            }
            RouterConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom router factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom router config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the driver type name
    pub fn type_name(&self) -> &str {
        match self {
            RouterConfig::Web { .. } => "web",
            RouterConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig::Web {
            base_url: DEFAULT_ROUTER_URL.to_string(),
            dry_run: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Router login
///
/// The password is never serialized and never shown by `Debug`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Validate the credentials
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.username.is_empty() {
            return Err(crate::Error::config("Router username cannot be empty"));
        }
        Ok(())
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_USERNAME)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for any single router call, in seconds
    ///
    /// A call that exceeds it aborts the run with `TimeoutExceeded`.
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,

    /// Pause after each acknowledged mutation (in milliseconds)
    ///
    /// Gives the router UI time to redraw the table before the next row is
    /// located. Set to 0 to disable.
    #[serde(default = "default_mutation_settle_ms")]
    pub mutation_settle_ms: u64,

    /// Issue every delete a second time for the same destination
    ///
    /// Some firmware leaves the row in place after the first confirmation.
    /// A `NotFoundInTable` answer to the second attempt counts as success.
    #[serde(default)]
    pub confirm_delete_twice: bool,

    /// Re-read the table after mutating and check it converged
    #[serde(default = "default_verify_after_apply")]
    pub verify_after_apply: bool,

    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.operation_timeout_secs == 0 {
            return Err(crate::Error::config("Operation timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Operation timeout as a `Duration`
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Settle delay as a `Duration`
    pub fn mutation_settle(&self) -> Duration {
        Duration::from_millis(self.mutation_settle_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: default_operation_timeout_secs(),
            mutation_settle_ms: default_mutation_settle_ms(),
            confirm_delete_twice: false,
            verify_after_apply: default_verify_after_apply(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_operation_timeout_secs() -> u64 {
    60
}

fn default_mutation_settle_ms() -> u64 {
    2000
}

fn default_verify_after_apply() -> bool {
    true
}

fn default_event_channel_capacity() -> usize {
    256
}
