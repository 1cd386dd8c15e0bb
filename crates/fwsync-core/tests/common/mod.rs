//! Test doubles and common utilities for contract tests
//!
//! `ScriptedRouter` keeps an in-memory rule table and a call log, and can be
//! told to misbehave in the ways real router firmware does.

#![allow(dead_code)]

use fwsync_core::config::{EngineConfig, SyncConfig};
use fwsync_core::error::{Error, Result};
use fwsync_core::traits::{AddressSource, LoginOutcome, RouterSession};
use fwsync_core::{DesiredRuleSpec, FirewallRule, SyncEvent};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// An address source returning a fixed candidate list
pub struct StaticSource {
    candidates: Option<Vec<IpAddr>>,
}

impl StaticSource {
    pub fn new(candidates: &[&str]) -> Self {
        Self {
            candidates: Some(candidates.iter().map(|s| s.parse().unwrap()).collect()),
        }
    }

    /// A source whose enumeration fails
    pub fn failing() -> Self {
        Self { candidates: None }
    }
}

#[async_trait::async_trait]
impl AddressSource for StaticSource {
    async fn candidates(&self) -> Result<Vec<IpAddr>> {
        self.candidates
            .clone()
            .ok_or_else(|| Error::Other("getaddrinfo failed".to_string()))
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

#[derive(Default)]
struct RouterState {
    table: Vec<String>,
    calls: Vec<String>,
    forced_session: bool,
    reject_login: bool,
    fail_acknowledge: bool,
    dry_run: bool,
    fail_navigation: bool,
    fail_create: bool,
    failing_deletes: HashSet<String>,
    hanging_deletes: HashSet<String>,
    sticky_deletes: HashSet<String>,
}

/// An in-memory router that records every call
///
/// Clones share state, so a test can keep one clone and hand another to
/// the engine.
#[derive(Clone, Default)]
pub struct ScriptedRouter {
    state: Arc<Mutex<RouterState>>,
}

impl ScriptedRouter {
    pub fn new(table: &[&str]) -> Self {
        let router = Self::default();
        router.state.lock().unwrap().table = table.iter().map(|s| s.to_string()).collect();
        router
    }

    /// Report another administrator's session at login
    pub fn with_forced_session(self) -> Self {
        self.state.lock().unwrap().forced_session = true;
        self
    }

    pub fn rejecting_login(self) -> Self {
        self.state.lock().unwrap().reject_login = true;
        self
    }

    /// The forced-session takeover is refused
    pub fn failing_acknowledge(self) -> Self {
        self.state.lock().unwrap().fail_acknowledge = true;
        self
    }

    /// Deletes and creates are accepted but never change the table
    pub fn dry_run(self) -> Self {
        self.state.lock().unwrap().dry_run = true;
        self
    }

    pub fn failing_navigation(self) -> Self {
        self.state.lock().unwrap().fail_navigation = true;
        self
    }

    pub fn failing_create(self) -> Self {
        self.state.lock().unwrap().fail_create = true;
        self
    }

    /// Deleting this destination always fails
    pub fn failing_delete(self, destination: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert(destination.to_string());
        self
    }

    /// Deleting this destination never returns
    pub fn hanging_delete(self, destination: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .hanging_deletes
            .insert(destination.to_string());
        self
    }

    /// The first delete of this destination reports success but leaves the row
    pub fn sticky_delete(self, destination: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .sticky_deletes
            .insert(destination.to_string());
        self
    }

    pub fn table(&self) -> Vec<String> {
        self.state.lock().unwrap().table.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that changed (or tried to change) the table
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("delete:") || c.starts_with("create:"))
            .collect()
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().unwrap().calls.push(call.into());
    }
}

#[async_trait::async_trait]
impl RouterSession for ScriptedRouter {
    async fn authenticate(&self, username: &str, _password: &str) -> Result<LoginOutcome> {
        self.record(format!("authenticate:{username}"));
        let state = self.state.lock().unwrap();
        if state.reject_login {
            return Err(Error::auth("invalid username or password"));
        }
        if state.forced_session {
            Ok(LoginOutcome::SessionAlreadyActive)
        } else {
            Ok(LoginOutcome::Ready)
        }
    }

    async fn acknowledge_forced_session(&self) -> Result<()> {
        self.record("acknowledge_forced_session");
        let mut state = self.state.lock().unwrap();
        if state.fail_acknowledge {
            return Err(Error::auth("router did not hand over the session"));
        }
        state.forced_session = false;
        Ok(())
    }

    async fn navigate_to_rule_table(&self) -> Result<()> {
        self.record("navigate");
        if self.state.lock().unwrap().fail_navigation {
            return Err(Error::http("502 Bad Gateway"));
        }
        Ok(())
    }

    async fn list_rules(&self) -> Result<Vec<FirewallRule>> {
        self.record("list");
        Ok(self
            .table()
            .into_iter()
            .enumerate()
            .map(|(i, dest)| FirewallRule::new(i, dest).with_row_ref(format!("row-{i}")))
            .collect())
    }

    async fn delete_rule(&self, destination: &str) -> Result<()> {
        self.record(format!("delete:{destination}"));

        let hangs = self
            .state
            .lock()
            .unwrap()
            .hanging_deletes
            .contains(destination);
        if hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.failing_deletes.contains(destination) {
            return Err(Error::mutation(format!("confirmation dialog for {destination} never closed")));
        }
        let Some(index) = state.table.iter().position(|d| d == destination) else {
            return Err(Error::not_found(destination.to_string()));
        };
        if state.dry_run || state.sticky_deletes.remove(destination) {
            return Ok(());
        }
        state.table.remove(index);
        Ok(())
    }

    async fn create_rule(&self, spec: &DesiredRuleSpec) -> Result<()> {
        let address = spec.address().to_string();
        self.record(format!("create:{address}"));
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(Error::mutation("add rule form rejected"));
        }
        if !state.dry_run {
            state.table.push(address);
        }
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.record("logout");
        Ok(())
    }

    fn driver_name(&self) -> &'static str {
        "scripted"
    }

    fn is_dry_run(&self) -> bool {
        self.state.lock().unwrap().dry_run
    }
}

/// Configuration with no settle delay and a short operation timeout
pub fn test_config() -> SyncConfig {
    SyncConfig {
        engine: EngineConfig {
            operation_timeout_secs: 1,
            mutation_settle_ms: 0,
            confirm_delete_twice: false,
            verify_after_apply: true,
            event_channel_capacity: 256,
        },
        ..SyncConfig::default()
    }
}

/// Collect every event emitted so far
pub fn drain(rx: &mut mpsc::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
