//! Core reconciliation engine
//!
//! The SyncEngine is responsible for:
//! - Resolving the address to protect via AddressSource
//! - Driving the router session (login, navigation, logout)
//! - Planning with the pure reconciler
//! - Executing the plan one mutation at a time
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ AddressSource │─── Address ───┐
//! └───────────────┘               │
//!                                 ▼
//!                         ┌──────────────┐        ┌──────────────┐
//!                         │  SyncEngine  │───────▶│  reconcile   │
//!                         └──────────────┘◀───────│   (plan)     │
//!                                 │               └──────────────┘
//!              ┌──────────────────┼──────────────────┐
//!              ▼                  ▼                  ▼
//!     ┌────────────────┐  ┌──────────────┐   ┌─────────────┐
//!     │ RouterSession  │  │  RunReport   │   │   Events    │
//!     │ (read/mutate)  │  │  (result)    │   │  (notify)   │
//!     └────────────────┘  └──────────────┘   └─────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. Resolve the address; abort before touching the router if none
//! 2. Log in (acknowledging a forced session if the router asks)
//! 3. Open the rule table and read the inventory
//! 4. Plan; if the plan is a no-op, skip straight to logout
//! 5. Delete stale rules in order, each acknowledged before the next
//! 6. Create the rule if nothing matched
//! 7. Optionally re-read the table and check it converged
//! 8. Log out
//!
//! Every router call is bounded by `operation_timeout`.

pub mod report;
pub mod session;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::address::Address;
use crate::config::{Credentials, SyncConfig};
use crate::error::{Error, Result};
use crate::reconcile::{self, ReconciliationPlan};
use crate::resolver::AddressResolver;
use crate::rule::DesiredRuleSpec;
use crate::traits::{AddressSource, LoginOutcome, RouterSession};

pub use report::{CreateOutcome, DeleteOutcome, RuleDeletion, RunReport, RunSummary};
pub use session::{SessionState, SessionTracker};

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Session state changed
    StateChanged {
        from: SessionState,
        to: SessionState,
    },

    /// Address to protect was resolved
    AddressResolved { address: Address },

    /// Another administrator's session was taken over
    ForcedSessionAcknowledged,

    /// Rule table was read
    InventoryRead { rules: usize },

    /// Rule for the current address left in place
    RuleKept { destination: String },

    /// Stale rule deleted
    RuleDeleted { destination: String },

    /// Stale rule was already gone
    RuleAlreadyGone { destination: String },

    /// Dry run: stale rule would have been deleted
    RuleWouldDelete { destination: String },

    /// Stale rule could not be deleted
    RuleDeleteFailed { destination: String, error: String },

    /// Rule for the current address created
    RuleCreated { address: Address },

    /// Dry run: rule for the current address would have been created
    RuleWouldCreate { address: Address },

    /// Rule for the current address could not be created
    RuleCreateFailed { address: Address, error: String },

    /// Post-apply table check finished
    Verified { converged: bool },

    /// Run finished and logged out
    Finished { summary: RunSummary },

    /// Run aborted
    Aborted { reason: String },
}

/// Core reconciliation engine
///
/// One engine performs one-shot runs against one router. Runs are strictly
/// sequential: the engine never has two router calls in flight.
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Execute with [`SyncEngine::run()`]
/// 3. Drain the event receiver for per-decision reporting
/// 4. If the run future was dropped early, call [`SyncEngine::abandon()`]
pub struct SyncEngine {
    /// Source of the address to protect
    source: Box<dyn AddressSource>,

    /// Router management session
    router: Box<dyn RouterSession>,

    /// Router login
    credentials: Credentials,

    /// Bound for each router call
    operation_timeout: Duration,

    /// Pause after each mutation
    mutation_settle: Duration,

    /// Issue each delete twice
    confirm_delete_twice: bool,

    /// Re-read the table after mutating
    verify_after_apply: bool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,

    /// Router accepted the login and no logout has completed since
    session_open: AtomicBool,
}

impl SyncEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `source`: Address source implementation
    /// - `router`: Router driver implementation
    /// - `config`: fwsync configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        source: Box<dyn AddressSource>,
        router: Box<dyn RouterSession>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            source,
            router,
            credentials: config.credentials,
            operation_timeout: config.engine.operation_timeout(),
            mutation_settle: config.engine.mutation_settle(),
            confirm_delete_twice: config.engine.confirm_delete_twice,
            verify_after_apply: config.engine.verify_after_apply,
            event_tx: tx,
            session_open: AtomicBool::new(false),
        };

        Ok((engine, rx))
    }

    /// Run one reconciliation
    ///
    /// Per-rule mutation failures are recorded in the report and do not fail
    /// the run. Fatal errors (no address, login or navigation failure, a
    /// timed-out router call) end the run in [`SessionState::Aborted`], after
    /// a logout attempt if a session was open.
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: The run reached logout
    /// - `Err(Error)`: The run was aborted
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let mut session = SessionTracker::new();

        let resolver = AddressResolver::new(self.source.as_ref());
        let address = match self.bounded("resolve_address", resolver.resolve()).await {
            Ok(address) => address,
            Err(e) => return Err(self.abort(&mut session, e)),
        };
        self.emit_event(SyncEvent::AddressResolved { address });

        self.transition(&mut session, SessionState::LoggingIn)?;
        if let Err(e) = self.login(&mut session).await {
            // A forced-session acknowledgement may have half-opened the session
            if session.current() == SessionState::ForcedSession {
                self.try_logout().await;
            }
            return Err(self.abort(&mut session, e));
        }

        let outcome = self.reconcile_in_session(&mut session, address).await;

        self.transition(&mut session, SessionState::LoggingOut)?;
        let logged_out = self.try_logout().await;

        let mut report = match outcome {
            Ok(report) => report,
            Err(e) => return Err(self.abort(&mut session, e)),
        };

        if !logged_out {
            warn!("Run finished but logout did not complete");
        }
        self.transition(&mut session, SessionState::LoggedOut)?;

        report.started_at = started_at;
        report.finished_at = Utc::now();
        report.states = session.history().to_vec();

        let deleted = report
            .deletions
            .iter()
            .filter(|d| d.outcome == DeleteOutcome::Deleted)
            .count();
        info!(
            "Run finished: {:?} for {} ({} deleted, {} failed)",
            report.summary,
            report.address,
            deleted,
            report.failed_deletions()
        );
        self.emit_event(SyncEvent::Finished {
            summary: report.summary,
        });

        Ok(report)
    }

    /// Authenticate, handling the forced-session interstitial
    async fn login(&self, session: &mut SessionTracker) -> Result<()> {
        let outcome = self
            .bounded(
                "authenticate",
                self.router
                    .authenticate(&self.credentials.username, &self.credentials.password),
            )
            .await
            .map_err(|e| match e {
                Error::AuthFailed(_) | Error::TimeoutExceeded { .. } => e,
                other => Error::auth(other.to_string()),
            })?;
        self.session_open.store(true, Ordering::SeqCst);

        if outcome == LoginOutcome::SessionAlreadyActive {
            self.transition(session, SessionState::ForcedSession)?;
            warn!("Another administrator session is active, taking it over");
            self.bounded(
                "acknowledge_forced_session",
                self.router.acknowledge_forced_session(),
            )
            .await
            .map_err(|e| match e {
                Error::AuthFailed(_) | Error::TimeoutExceeded { .. } => e,
                other => Error::auth(format!("forced session not acknowledged: {}", other)),
            })?;
            self.emit_event(SyncEvent::ForcedSessionAcknowledged);
        }

        self.transition(session, SessionState::LoggedIn)?;
        info!("Logged in to router via {}", self.router.driver_name());
        Ok(())
    }

    /// Everything between login and logout
    async fn reconcile_in_session(
        &self,
        session: &mut SessionTracker,
        address: Address,
    ) -> Result<RunReport> {
        self.transition(session, SessionState::Navigating)?;
        self.bounded("navigate_to_rule_table", self.router.navigate_to_rule_table())
            .await
            .map_err(|e| match e {
                Error::NavigationFailed(_) | Error::TimeoutExceeded { .. } => e,
                other => Error::navigation(other.to_string()),
            })?;

        self.transition(session, SessionState::Reconciling)?;
        let inventory = self.bounded("list_rules", self.router.list_rules()).await?;
        info!("Found {} firewall rule(s)", inventory.len());
        self.emit_event(SyncEvent::InventoryRead {
            rules: inventory.len(),
        });

        let plan = reconcile::plan(&address, &inventory);
        for rule in &plan.keep {
            info!("Keeping rule {}", rule);
            self.emit_event(SyncEvent::RuleKept {
                destination: rule.destination.clone(),
            });
        }

        let mut report = RunReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            address,
            dry_run: self.router.is_dry_run(),
            plan: plan.clone(),
            deletions: Vec::new(),
            create: CreateOutcome::NotNeeded,
            verified: None,
            states: Vec::new(),
            summary: RunSummary::Matched,
        };

        if plan.is_noop() {
            info!("Rule for {} already present, nothing to change", address);
            return Ok(report);
        }

        self.apply(&plan, address, &mut report).await?;

        if self.verify_after_apply && !report.dry_run {
            report.verified = self.verify(address).await?;
        }

        Ok(report)
    }

    /// Execute a plan: deletions in order, then the create
    async fn apply(
        &self,
        plan: &ReconciliationPlan,
        address: Address,
        report: &mut RunReport,
    ) -> Result<()> {
        if !plan.to_delete.is_empty() {
            info!("Deleting {} stale rule(s)", plan.to_delete.len());
        }

        for rule in &plan.to_delete {
            let destination = rule.destination.clone();
            let outcome = self.delete_one(&destination, report.dry_run).await?;

            match &outcome {
                DeleteOutcome::Deleted => {
                    info!("Deleted rule {}", rule);
                    self.emit_event(SyncEvent::RuleDeleted {
                        destination: destination.clone(),
                    });
                }
                DeleteOutcome::AlreadyGone => {
                    info!("Rule {} already gone", rule);
                    self.emit_event(SyncEvent::RuleAlreadyGone {
                        destination: destination.clone(),
                    });
                }
                DeleteOutcome::WouldDelete => {
                    info!("[DRY-RUN] Would delete rule {}", rule);
                    self.emit_event(SyncEvent::RuleWouldDelete {
                        destination: destination.clone(),
                    });
                }
                DeleteOutcome::Failed { error } => {
                    warn!("Failed to delete rule {}: {}", rule, error);
                    self.emit_event(SyncEvent::RuleDeleteFailed {
                        destination: destination.clone(),
                        error: error.clone(),
                    });
                }
            }

            if !matches!(outcome, DeleteOutcome::AlreadyGone | DeleteOutcome::WouldDelete) {
                self.settle().await;
            }
            report.deletions.push(RuleDeletion {
                destination,
                outcome,
            });
        }

        if !plan.to_create {
            report.summary = if report.dry_run {
                RunSummary::DryRun
            } else {
                RunSummary::Matched
            };
            return Ok(());
        }

        let spec = DesiredRuleSpec::for_address(address);
        match self.bounded("create_rule", self.router.create_rule(&spec)).await {
            Ok(()) if report.dry_run => {
                info!("[DRY-RUN] Would create inbound allow rule for {}", address);
                self.emit_event(SyncEvent::RuleWouldCreate { address });
                report.create = CreateOutcome::WouldCreate;
                report.summary = RunSummary::DryRun;
            }
            Ok(()) => {
                info!("Created inbound allow rule for {}", address);
                self.emit_event(SyncEvent::RuleCreated { address });
                report.create = CreateOutcome::Created;
                report.summary = RunSummary::Created;
                self.settle().await;
            }
            Err(e @ Error::TimeoutExceeded { .. }) => return Err(e),
            Err(e) => {
                warn!("Failed to create rule for {}: {}", address, e);
                self.emit_event(SyncEvent::RuleCreateFailed {
                    address,
                    error: e.to_string(),
                });
                report.create = CreateOutcome::Failed {
                    error: e.to_string(),
                };
                report.summary = RunSummary::CreateFailed;
            }
        }

        Ok(())
    }

    /// Delete one destination, returning `Err` only when the run must stop
    ///
    /// A dry-run driver still locates the row, so `AlreadyGone` stays exact.
    async fn delete_one(&self, destination: &str, dry_run: bool) -> Result<DeleteOutcome> {
        debug!("Deleting rule with destination {}", destination);
        match self
            .bounded("delete_rule", self.router.delete_rule(destination))
            .await
        {
            Ok(()) => {}
            Err(Error::NotFoundInTable(_)) => return Ok(DeleteOutcome::AlreadyGone),
            Err(e @ Error::TimeoutExceeded { .. }) => return Err(e),
            Err(e) => {
                return Ok(DeleteOutcome::Failed {
                    error: e.to_string(),
                });
            }
        }

        if dry_run {
            return Ok(DeleteOutcome::WouldDelete);
        }

        if self.confirm_delete_twice {
            self.settle().await;
            match self
                .bounded("delete_rule (confirm)", self.router.delete_rule(destination))
                .await
            {
                Ok(()) | Err(Error::NotFoundInTable(_)) => {}
                Err(e @ Error::TimeoutExceeded { .. }) => return Err(e),
                Err(e) => debug!("Confirming delete of {} failed: {}", destination, e),
            }
        }

        Ok(DeleteOutcome::Deleted)
    }

    /// Re-read the table and check the plan for it is a no-op
    async fn verify(&self, address: Address) -> Result<Option<bool>> {
        let inventory = match self.bounded("list_rules", self.router.list_rules()).await {
            Ok(inventory) => inventory,
            Err(e @ Error::TimeoutExceeded { .. }) => return Err(e),
            Err(e) => {
                warn!("Could not re-read rule table for verification: {}", e);
                return Ok(None);
            }
        };

        let replan = reconcile::plan(&address, &inventory);
        let converged = replan.is_noop();
        if converged {
            if replan.keep.len() > 1 {
                warn!(
                    "{} duplicate rules for {} remain in the table",
                    replan.keep.len(),
                    address
                );
            }
            info!("Verified rule table holds the rule for {}", address);
        } else {
            warn!(
                "Rule table did not converge: matched={}, {} stale rule(s) left",
                replan.matched,
                replan.to_delete.len()
            );
        }
        self.emit_event(SyncEvent::Verified { converged });
        Ok(Some(converged))
    }

    /// Log out of a session left open by an interrupted [`run`](Self::run)
    ///
    /// Call after dropping the run future (on a shutdown signal, say). Makes
    /// one bounded logout attempt if the router had accepted the login and no
    /// logout has been attempted since; otherwise does nothing.
    ///
    /// # Returns
    ///
    /// Whether a logout was attempted
    pub async fn abandon(&self) -> bool {
        if !self.session_open.load(Ordering::SeqCst) {
            return false;
        }
        warn!("Run interrupted with a router session open, logging out");
        self.try_logout().await;
        true
    }

    /// Best-effort logout; returns whether it succeeded
    async fn try_logout(&self) -> bool {
        let result = self.bounded("logout", self.router.logout()).await;
        self.session_open.store(false, Ordering::SeqCst);
        match result {
            Ok(()) => {
                info!("Logged out");
                true
            }
            Err(e) => {
                warn!("Logout failed: {}", e);
                false
            }
        }
    }

    /// Wait between mutations so the router can redraw its table
    async fn settle(&self) {
        if !self.mutation_settle.is_zero() {
            tokio::time::sleep(self.mutation_settle).await;
        }
    }

    /// Bound a router call by the operation timeout
    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(operation, self.operation_timeout)),
        }
    }

    /// Move the session to `next` and emit the change
    fn transition(&self, session: &mut SessionTracker, next: SessionState) -> Result<()> {
        let from = session.advance(next)?;
        debug!("Session {:?} -> {:?}", from, next);
        self.emit_event(SyncEvent::StateChanged { from, to: next });
        Ok(())
    }

    /// Record a fatal error and move to `Aborted`
    fn abort(&self, session: &mut SessionTracker, err: Error) -> Error {
        error!("Run aborted in state {:?}: {}", session.current(), err);
        if let Err(e) = self.transition(session, SessionState::Aborted) {
            debug!("{}", e);
        }
        self.emit_event(SyncEvent::Aborted {
            reason: err.to_string(),
        });
        err
    }

    /// Emit an engine event
    ///
    /// # Parameters
    ///
    /// - `event`: The event to emit
    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            // Nobody is keeping up; drop rather than block the run
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Receiver dropped; events are optional
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
