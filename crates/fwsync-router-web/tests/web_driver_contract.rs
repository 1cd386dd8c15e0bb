//! Contract Test: platform.cgi Web Driver
//!
//! Drives `WebRouter` against an in-process fake of the management UI.
//!
//! Constraints verified:
//! - A forced-login prompt is surfaced at login and taken over only on
//!   acknowledgement
//! - Deletes locate the row again before posting its row id
//! - A destination missing from the table is `NotFoundInTable`, with no post
//! - The add-rule form carries the fixed inbound ANY/ACCEPT constants
//! - Dry-run mode reads the table but never posts a mutation

mod common;

use common::*;
use fwsync_core::config::{Credentials, EngineConfig, SyncConfig};
use fwsync_core::engine::{CreateOutcome, DeleteOutcome};
use fwsync_core::{
    Address, AddressSource, DesiredRuleSpec, Error, LoginOutcome, Result, RouterSession,
    RunSummary, SyncEngine,
};
use fwsync_router_web::WebRouter;
use std::net::IpAddr;
use std::time::Duration;

fn driver(ui: &FakeRouterUi, dry_run: bool) -> WebRouter {
    WebRouter::new(ui.base_url(), Duration::from_secs(5), dry_run).expect("client builds")
}

async fn logged_in(ui: &FakeRouterUi, dry_run: bool) -> WebRouter {
    let router = driver(ui, dry_run);
    let outcome = router
        .authenticate(USERNAME, PASSWORD)
        .await
        .expect("login succeeds");
    assert_eq!(outcome, LoginOutcome::Ready);
    router
        .navigate_to_rule_table()
        .await
        .expect("rule table opens");
    router
}

fn address(text: &str) -> Address {
    text.parse().unwrap()
}

struct FixedSource(IpAddr);

#[async_trait::async_trait]
impl AddressSource for FixedSource {
    async fn candidates(&self) -> Result<Vec<IpAddr>> {
        Ok(vec![self.0])
    }

    fn source_name(&self) -> &'static str {
        "fixed"
    }
}

fn engine_config() -> SyncConfig {
    SyncConfig {
        credentials: Credentials::new(USERNAME, PASSWORD),
        engine: EngineConfig {
            operation_timeout_secs: 5,
            mutation_settle_ms: 0,
            confirm_delete_twice: false,
            verify_after_apply: true,
            event_channel_capacity: 256,
        },
        ..SyncConfig::default()
    }
}

#[tokio::test]
async fn login_then_read_table() {
    let ui = FakeRouterUi::start(&["2001:db8::1", "not-an-ip"]).await;
    let router = logged_in(&ui, false).await;

    let rules = router.list_rules().await.expect("table reads");

    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].destination, "2001:db8::1");
    assert_eq!(rules[0].row_ref.as_deref(), Some("1"));
    assert_eq!(rules[1].destination, "not-an-ip");
    assert_eq!(rules[1].position, 1);
    assert_eq!(
        ui.requests().await,
        ["GET login", "POST login", "GET rules", "GET rules"]
    );
}

#[tokio::test]
async fn wrong_password_is_auth_failure() {
    let ui = FakeRouterUi::start(&[]).await;
    let router = driver(&ui, false);

    let err = router
        .authenticate(USERNAME, "hunter2")
        .await
        .expect_err("login rejected");

    assert!(matches!(err, Error::AuthFailed(_)), "{err}");
    assert!(!err.to_string().contains("hunter2"));
}

#[tokio::test]
async fn forced_login_is_taken_over_on_acknowledgement() {
    let ui = FakeRouterUi::start(&["2001:db8::1"])
        .await
        .with_other_admin()
        .await;
    let router = driver(&ui, false);

    let outcome = router.authenticate(USERNAME, PASSWORD).await.unwrap();
    assert_eq!(outcome, LoginOutcome::SessionAlreadyActive);
    assert!(!ui.requests().await.contains(&"GET continue".to_string()));

    router.acknowledge_forced_session().await.expect("takeover accepted");
    assert_eq!(ui.requests().await.last().map(String::as_str), Some("GET continue"));

    // The prompt is consumed; a second acknowledgement sends nothing
    router.acknowledge_forced_session().await.unwrap();
    assert_eq!(
        ui.requests().await,
        ["GET login", "POST login", "GET continue"]
    );

    router.navigate_to_rule_table().await.expect("rule table opens");
    assert_eq!(router.list_rules().await.unwrap().len(), 1);
}

#[tokio::test]
async fn refused_takeover_is_auth_failure() {
    let ui = FakeRouterUi::start(&[])
        .await
        .with_other_admin()
        .await
        .refusing_takeover()
        .await;
    let router = driver(&ui, false);

    assert_eq!(
        router.authenticate(USERNAME, PASSWORD).await.unwrap(),
        LoginOutcome::SessionAlreadyActive
    );
    let err = router.acknowledge_forced_session().await.unwrap_err();

    assert!(matches!(err, Error::AuthFailed(_)), "{err}");
}

#[tokio::test]
async fn delete_relocates_row_before_posting() {
    let ui = FakeRouterUi::start(&["2001:db8::1", "2001:db8::2", "2001:db8::3"]).await;
    let router = logged_in(&ui, false).await;
    router.list_rules().await.unwrap();

    // The table shifts between listing and deleting
    ui.remove_row("2001:db8::1").await;
    ui.clear_requests().await;

    router.delete_rule("2001:db8::3").await.expect("delete succeeds");

    assert_eq!(ui.requests().await, ["GET rules", "POST delete 3"]);
    assert_eq!(ui.destinations().await, ["2001:db8::2"]);
}

#[tokio::test]
async fn delete_of_missing_row_is_not_found() {
    let ui = FakeRouterUi::start(&["2001:db8::1"]).await;
    let router = logged_in(&ui, false).await;

    let err = router.delete_rule("2001:db8::9").await.unwrap_err();

    assert!(matches!(err, Error::NotFoundInTable(ref d) if d == "2001:db8::9"), "{err}");
    assert!(ui.mutating_posts().await.is_empty());
    assert_eq!(ui.destinations().await, ["2001:db8::1"]);
}

#[tokio::test]
async fn row_without_id_cannot_be_deleted() {
    let ui = FakeRouterUi::start_with_rows(vec![(None, "2001:db8::1".to_string())]).await;
    let router = logged_in(&ui, false).await;

    let err = router.delete_rule("2001:db8::1").await.unwrap_err();

    assert!(matches!(err, Error::MutationFailed(_)), "{err}");
    assert!(ui.mutating_posts().await.is_empty());
}

#[tokio::test]
async fn create_posts_add_rule_form() {
    let ui = FakeRouterUi::start(&[]).await;
    let router = logged_in(&ui, false).await;

    router
        .create_rule(&DesiredRuleSpec::for_address(address("2001:db8::5")))
        .await
        .expect("create succeeds");

    assert_eq!(ui.mutating_posts().await, ["POST add 2001:db8::5"]);
    assert_eq!(ui.destinations().await, ["2001:db8::5"]);

    let form = ui.last_add_form().await;
    let field = |name: &str| form.get(name).map(String::as_str);
    assert_eq!(field("thispage"), Some("firewallRulesIPv6.html"));
    assert_eq!(field("firewallRulesIPv6.direction"), Some("Inbound"));
    assert_eq!(field("firewallRulesIPv6.serviceName"), Some("ANY"));
    assert_eq!(field("firewallRulesIPv6.fwAction"), Some("ACCEPT"));
    assert_eq!(field("firewallRulesIPv6.destinationHost"), Some("1"));
}

#[tokio::test]
async fn dry_run_reads_but_never_posts_mutations() {
    let ui = FakeRouterUi::start(&["2001:db8::1"]).await;
    let router = logged_in(&ui, true).await;

    router.delete_rule("2001:db8::1").await.expect("dry delete succeeds");
    router
        .create_rule(&DesiredRuleSpec::for_address(address("2001:db8::5")))
        .await
        .expect("dry create succeeds");
    let missing = router.delete_rule("2001:db8::9").await.unwrap_err();

    assert!(matches!(missing, Error::NotFoundInTable(_)), "{missing}");
    assert!(ui.mutating_posts().await.is_empty());
    assert_eq!(ui.destinations().await, ["2001:db8::1"]);
    assert!(ui.requests().await.contains(&"GET rules".to_string()));
}

#[tokio::test]
async fn expired_session_is_navigation_failure() {
    let ui = FakeRouterUi::start(&["2001:db8::1"]).await;
    let router = logged_in(&ui, false).await;
    ui.expire_session().await;

    let err = router.list_rules().await.unwrap_err();

    assert!(matches!(err, Error::NavigationFailed(_)), "{err}");
}

#[tokio::test]
async fn logout_ends_session() {
    let ui = FakeRouterUi::start(&["2001:db8::1"]).await;
    let router = logged_in(&ui, false).await;

    router.logout().await.expect("logout succeeds");

    assert_eq!(ui.requests().await.last().map(String::as_str), Some("GET logout"));
    assert!(router.list_rules().await.is_err());
}

#[tokio::test]
async fn engine_converges_table_through_web_ui() {
    let ui = FakeRouterUi::start(&["2001:db8::1", "garbage", "2001:db8::9"]).await;
    let (engine, _events) = SyncEngine::new(
        Box::new(FixedSource("2001:db8::2".parse().unwrap())),
        Box::new(driver(&ui, false)),
        engine_config(),
    )
    .expect("engine construction succeeds");

    let report = engine.run().await.expect("run succeeds");

    assert_eq!(report.summary, RunSummary::Created);
    assert_eq!(report.verified, Some(true));
    assert!(report.is_converged());
    assert_eq!(ui.destinations().await, ["2001:db8::2"]);
    assert_eq!(
        ui.mutating_posts().await,
        ["POST delete 1", "POST delete 2", "POST delete 3", "POST add 2001:db8::2"]
    );
    assert_eq!(ui.requests().await.last().map(String::as_str), Some("GET logout"));
}

#[tokio::test]
async fn engine_dry_run_leaves_web_ui_untouched() {
    let ui = FakeRouterUi::start(&["2001:db8::1"]).await;
    let (engine, _events) = SyncEngine::new(
        Box::new(FixedSource("2001:db8::2".parse().unwrap())),
        Box::new(driver(&ui, true)),
        engine_config(),
    )
    .expect("engine construction succeeds");

    let report = engine.run().await.expect("run succeeds");

    assert_eq!(report.summary, RunSummary::DryRun);
    assert_eq!(report.deletions[0].outcome, DeleteOutcome::WouldDelete);
    assert_eq!(report.create, CreateOutcome::WouldCreate);
    assert!(!report.is_converged());
    assert!(ui.mutating_posts().await.is_empty());
    assert_eq!(ui.destinations().await, ["2001:db8::1"]);
}
