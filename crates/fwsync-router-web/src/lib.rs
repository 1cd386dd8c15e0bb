// # Router Web Driver
//
// This crate drives the `platform.cgi` web management interface found on
// home gateways of the JioFiber family, over plain HTTP form posts.
//
// ## Implementation Status
//
// - ✅ Login with form credentials, session kept in a cookie store
// - ✅ Forced-login ("another administrator is logged in") takeover
// - ✅ IPv6 rule table scraping (`firewallRulesIPv6.html`, `#recordsData`)
// - ✅ Delete by destination, re-locating the row on every call
// - ✅ Add-rule form with the fixed inbound ANY/ACCEPT constants
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry logic (intentionally omitted - owned by SyncEngine)
// - ❌ NO run-level timeouts (owned by SyncEngine; only per-request here)
// - ❌ NO background tasks
//
// ## Trust Level: Untrusted (Router Driver)
//
// **Allowed Capabilities**:
// - ✅ HTTP calls to the configured management URL only
// - ✅ Parse the management pages
//
// **Forbidden Capabilities**:
// - ❌ Deciding what to keep or delete (owned by the reconciler)
// - ❌ Spawning tasks or threads
//
// ## Security Requirements
//
// - The router password NEVER appears in logs or `Debug` output
//
// ## Page Reference
//
// - Login / dashboard: `POST /platform.cgi`
// - Rule table: `GET /platform.cgi?page=firewallRulesIPv6.html`
// - Rule delete and add: `POST /platform.cgi` with `thispage=firewallRulesIPv6.html`

pub mod scrape;

use async_trait::async_trait;
use fwsync_core::config::RouterConfig;
use fwsync_core::rule::{
    DestinationHost, Direction, FirewallAction, Schedule, Service, SourceHost,
};
use fwsync_core::traits::{LoginOutcome, RouterDriverFactory, RouterSession};
use fwsync_core::{DesiredRuleSpec, DriverRegistry, Error, FirewallRule, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::sync::Mutex;

use scrape::PageScraper;

/// CGI endpoint, relative to the base URL
const CGI_PATH: &str = "platform.cgi";

/// IPv6 firewall rule page
const RULE_PAGE: &str = "firewallRulesIPv6.html";

/// Submit button of the add-rule form (`-1` means "new row")
const ADD_RULE_BUTTON: &str = "button.config.firewallRulesIPv6.firewallRulesIPv6.-1";

/// Submit button of the row delete action
const DELETE_RULE_BUTTON: &str = "button.delete.firewallRulesIPv6.firewallRulesIPv6";

/// Submit button of the logout anchor
const LOGOUT_BUTTON: &str = "button.logout.statusPage.x";

/// Default HTTP timeout for management requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// `platform.cgi` web driver
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the driver will:
/// - Log in, read the rule table and log out as usual
/// - Log the delete and add-rule forms it would submit
/// - **NOT** submit them
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the password,
/// which this type never stores anyway.
pub struct WebRouter {
    /// Management URL without trailing slash (e.g., "http://192.168.29.1")
    base_url: String,

    /// HTTP client with the session cookie store
    client: reqwest::Client,

    /// Page patterns
    scraper: PageScraper,

    /// Dry-run mode: read the table but never submit mutations
    dry_run: bool,

    /// "Continue" link seen at login, if another session was active
    pending_takeover: Mutex<Option<String>>,
}

impl std::fmt::Debug for WebRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRouter")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl WebRouter {
    /// Create a new web driver
    ///
    /// # Parameters
    ///
    /// - `base_url`: Management URL (e.g., "http://192.168.29.1")
    /// - `request_timeout`: Timeout for each HTTP request
    /// - `dry_run`: If true, read the table but skip deletes and creates
    pub fn new(base_url: impl Into<String>, request_timeout: Duration, dry_run: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            scraper: PageScraper::new()?,
            dry_run,
            pending_takeover: Mutex::new(None),
        })
    }

    /// Create a driver in live mode with the default request timeout
    pub fn new_live(base_url: impl Into<String>) -> Result<Self> {
        Self::new(base_url, DEFAULT_HTTP_TIMEOUT, false)
    }

    /// Create a driver in dry-run mode with the default request timeout
    pub fn new_dry_run(base_url: impl Into<String>) -> Result<Self> {
        Self::new(base_url, DEFAULT_HTTP_TIMEOUT, true)
    }

    fn cgi_url(&self) -> String {
        format!("{}/{}", self.base_url, CGI_PATH)
    }

    /// Resolve a link found on a page against the management URL
    fn resolve_link(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if href.is_empty() {
            self.cgi_url()
        } else {
            format!("{}/{}", self.base_url, href.trim_start_matches('/'))
        }
    }

    /// GET a page and return its body
    async fn get_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;
        read_body(response).await
    }

    /// POST a form to the CGI endpoint and return the response body
    async fn post_form(&self, form: &[(&str, &str)]) -> Result<String> {
        let response = self
            .client
            .post(self.cgi_url())
            .form(form)
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;
        read_body(response).await
    }

    /// Fetch the rule page, failing if the session has been dropped
    async fn rule_page(&self) -> Result<String> {
        let url = format!("{}?page={}", self.cgi_url(), RULE_PAGE);
        let html = self.get_page(&url).await?;
        if self.scraper.is_login_page(&html) {
            return Err(Error::navigation(
                "router returned the login page; session expired",
            ));
        }
        Ok(html)
    }

    /// Current row for `destination`, located fresh
    async fn locate(&self, destination: &str) -> Result<FirewallRule> {
        let html = self.rule_page().await?;
        self.scraper
            .rules(&html)?
            .into_iter()
            .find(|rule| rule.destination == destination)
            .ok_or_else(|| Error::not_found(destination.to_string()))
    }
}

/// Map an HTTP response to its body or a typed error
async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    if status.is_success() {
        return response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {}", e)));
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::auth(format!(
            "Router refused the session. Status: {}",
            status
        ))),
        StatusCode::NOT_FOUND => Err(Error::navigation(format!(
            "Page not found on router. Status: {}",
            status
        ))),
        s if s.is_server_error() => Err(Error::http(format!(
            "Router server error: {} - {}",
            status,
            error_text.trim()
        ))),
        _ => Err(Error::http(format!(
            "Unexpected response: {} - {}",
            status,
            error_text.trim()
        ))),
    }
}

/// Form fields of the add-rule dialog for `spec`
fn add_rule_form(spec: &DesiredRuleSpec) -> Vec<(&'static str, String)> {
    let direction = match spec.direction {
        Direction::Inbound => "Inbound",
    };
    let service = match spec.service {
        Service::Any => "ANY",
    };
    let action = match spec.action {
        FirewallAction::Accept => "ACCEPT",
    };
    let schedule = match spec.schedule {
        Schedule::None => "No Schedule",
    };
    let source = match spec.source {
        SourceHost::Any => "0",
    };
    let (destination_kind, destination) = match spec.destination {
        DestinationHost::Single(addr) => ("1", addr.to_string()),
    };

    vec![
        ("thispage", RULE_PAGE.to_string()),
        ("firewallRulesIPv6.direction", direction.to_string()),
        ("firewallRulesIPv6.serviceName", service.to_string()),
        ("firewallRulesIPv6.fwAction", action.to_string()),
        ("firewallRulesIPv6.schedule", schedule.to_string()),
        ("firewallRulesIPv6.sourceHost", source.to_string()),
        ("firewallRulesIPv6.destinationHost", destination_kind.to_string()),
        ("firewallRulesIPv6.destinationHostStart", destination),
        (ADD_RULE_BUTTON, "Save".to_string()),
    ]
}

#[async_trait]
impl RouterSession for WebRouter {
    async fn authenticate(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        tracing::info!(
            "Logging in to {} as {} [mode: {}]",
            self.base_url,
            username,
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        // Prime the cookie store with the login page's session cookie
        self.get_page(&self.cgi_url())
            .await
            .map_err(|e| Error::auth(format!("login page unreachable: {}", e)))?;

        let html = self
            .post_form(&[
                ("thispage", "index.html"),
                ("users.username", username),
                ("users.password", password),
                ("button.login.users.dashboard", "Login"),
            ])
            .await
            .map_err(|e| match e {
                Error::AuthFailed(_) => e,
                other => Error::auth(format!("login request failed: {}", other)),
            })?;

        if let Some(href) = self.scraper.continue_link(&html) {
            tracing::debug!("Forced-login prompt shown");
            *self.pending_takeover.lock().await = Some(href);
            return Ok(LoginOutcome::SessionAlreadyActive);
        }

        if self.scraper.is_login_page(&html) {
            return Err(Error::auth("credentials rejected"));
        }

        Ok(LoginOutcome::Ready)
    }

    async fn acknowledge_forced_session(&self) -> Result<()> {
        let Some(href) = self.pending_takeover.lock().await.take() else {
            return Ok(());
        };

        let html = self.get_page(&self.resolve_link(&href)).await?;
        if self.scraper.is_login_page(&html) || self.scraper.continue_link(&html).is_some() {
            return Err(Error::auth("router did not hand over the session"));
        }

        tracing::debug!("Forced-login takeover accepted");
        Ok(())
    }

    async fn navigate_to_rule_table(&self) -> Result<()> {
        let html = self.rule_page().await?;
        if !self.scraper.has_rule_table(&html) {
            return Err(Error::navigation(format!(
                "{} has no #{} table",
                RULE_PAGE,
                scrape::RULE_TABLE_ID
            )));
        }
        Ok(())
    }

    async fn list_rules(&self) -> Result<Vec<FirewallRule>> {
        let html = self.rule_page().await?;
        let rules = self.scraper.rules(&html)?;
        for rule in &rules {
            tracing::debug!("Rule {}", rule);
        }
        Ok(rules)
    }

    async fn delete_rule(&self, destination: &str) -> Result<()> {
        let rule = self.locate(destination).await?;
        let row_ref = rule
            .row_ref
            .clone()
            .ok_or_else(|| Error::mutation(format!("row {} has no identifier", rule)))?;

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would delete rule {} (row {})", rule, row_ref);
            return Ok(());
        }

        let html = self
            .post_form(&[
                ("thispage", RULE_PAGE),
                ("firewallRulesIPv6.rowId", row_ref.as_str()),
                (DELETE_RULE_BUTTON, "Delete"),
            ])
            .await
            .map_err(|e| Error::mutation(format!("delete of {} failed: {}", rule, e)))?;

        if self.scraper.is_login_page(&html) {
            return Err(Error::mutation(format!(
                "session lost while deleting {}",
                rule
            )));
        }
        Ok(())
    }

    async fn create_rule(&self, spec: &DesiredRuleSpec) -> Result<()> {
        let form = add_rule_form(spec);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would add inbound allow rule for {}",
                spec.address()
            );
            return Ok(());
        }

        let fields: Vec<(&str, &str)> = form.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let html = self
            .post_form(&fields)
            .await
            .map_err(|e| Error::mutation(format!("add rule failed: {}", e)))?;

        if self.scraper.is_login_page(&html) {
            return Err(Error::mutation("session lost while adding rule"));
        }
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        let url = format!("{}?{}=Logout", self.cgi_url(), LOGOUT_BUTTON);
        self.get_page(&url).await?;
        Ok(())
    }

    fn driver_name(&self) -> &'static str {
        "web"
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Factory for creating web drivers
pub struct WebRouterFactory;

impl RouterDriverFactory for WebRouterFactory {
    fn create(&self, config: &RouterConfig) -> Result<Box<dyn RouterSession>> {
        match config {
            RouterConfig::Web {
                base_url,
                dry_run,
                request_timeout_secs,
            } => {
                if *dry_run {
                    tracing::warn!("Router driver running in DRY-RUN mode - no changes will be made");
                }

                Ok(Box::new(WebRouter::new(
                    base_url.clone(),
                    Duration::from_secs(*request_timeout_secs),
                    *dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for web router driver")),
        }
    }
}

/// Register the web driver with a registry
///
/// # Example
///
/// ```rust
/// use fwsync_core::DriverRegistry;
///
/// let registry = DriverRegistry::new();
/// fwsync_router_web::register(&registry);
/// assert!(registry.has_router("web"));
/// ```
pub fn register(registry: &DriverRegistry) {
    registry.register_router("web", Box::new(WebRouterFactory));
}
