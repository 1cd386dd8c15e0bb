// # Router Session Trait
//
// Defines the capability surface the engine needs from a router's
// management interface.
//
// ## Implementations
//
// - `platform.cgi` web UI: `fwsync-router-web` crate
//
// ## Usage
//
// ```rust,ignore
// use fwsync_core::RouterSession;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let router = /* RouterSession implementation */;
//
//     router.authenticate("admin", "secret").await?;
//     router.navigate_to_rule_table().await?;
//     for rule in router.list_rules().await? {
//         println!("{rule}");
//     }
//     router.logout().await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::rule::{DesiredRuleSpec, FirewallRule};

/// What the router said after accepting credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Session is usable
    Ready,
    /// Another administrator is logged in; the session is usable only after
    /// [`RouterSession::acknowledge_forced_session`]
    SessionAlreadyActive,
}

/// Trait for router driver implementations
///
/// One value is one management session. The engine calls these methods
/// strictly sequentially and never issues two mutations at once.
///
/// # Trust Level: Untrusted
///
/// Drivers talk to the router and nothing else:
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP calls to the router's management interface
/// - ✅ Parse the router's pages into [`FirewallRule`] snapshots
/// - ✅ Return success or failure per call
///
/// ## Forbidden Capabilities
/// - ❌ Decide which rules to keep or delete (owned by the reconciler)
/// - ❌ Retry or continue after a failed mutation (owned by `SyncEngine`)
/// - ❌ Apply timeouts to the run as a whole (owned by `SyncEngine`)
/// - ❌ Spawn tasks or threads
///
/// ## Firmware Quirks
///
/// Quirks of a particular firmware (a forced-login interstitial, context
/// menus that need a second click) stay inside the driver, surfaced only
/// through [`LoginOutcome`] and the result of each call.
#[async_trait]
pub trait RouterSession: Send + Sync {
    /// Log in to the management interface
    ///
    /// # Returns
    ///
    /// - `Ok(LoginOutcome)`: Credentials accepted
    /// - `Err(Error::AuthFailed)`: Credentials rejected or login page broken
    async fn authenticate(&self, username: &str, password: &str)
    -> Result<LoginOutcome, crate::Error>;

    /// Take over the session when another administrator is logged in
    ///
    /// Must be a no-op when no forced-login prompt is pending.
    async fn acknowledge_forced_session(&self) -> Result<(), crate::Error>;

    /// Open the IPv6 firewall rule table
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The rule table is loaded
    /// - `Err(Error::NavigationFailed)`: The page could not be reached
    async fn navigate_to_rule_table(&self) -> Result<(), crate::Error>;

    /// Read the rule table, in table order
    async fn list_rules(&self) -> Result<Vec<FirewallRule>, crate::Error>;

    /// Delete the rule whose destination column equals `destination`
    ///
    /// The row must be located again at call time; positions from an earlier
    /// [`list_rules`](Self::list_rules) are stale after any deletion. Returns
    /// only once the router has acknowledged the deletion.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Row deleted
    /// - `Err(Error::NotFoundInTable)`: No row with that destination
    /// - `Err(Error::MutationFailed)`: The router refused or the call broke
    async fn delete_rule(&self, destination: &str) -> Result<(), crate::Error>;

    /// Add a rule built from `spec`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Rule saved
    /// - `Err(Error::MutationFailed)`: The router refused the form
    async fn create_rule(&self, spec: &DesiredRuleSpec) -> Result<(), crate::Error>;

    /// End the session
    async fn logout(&self) -> Result<(), crate::Error>;

    /// Get the driver name (for logging/debugging)
    fn driver_name(&self) -> &'static str;

    /// Whether mutations are only logged, never sent
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Helper trait for constructing router drivers from configuration
pub trait RouterDriverFactory: Send + Sync {
    /// Create a RouterSession instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this driver
    ///
    /// # Returns
    ///
    /// A boxed RouterSession trait object
    fn create(
        &self,
        config: &crate::config::RouterConfig,
    ) -> Result<Box<dyn RouterSession>, crate::Error>;
}
