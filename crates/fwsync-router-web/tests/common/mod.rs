//! In-process fake of the router's `platform.cgi` management UI
//!
//! `FakeRouterUi` serves the login form, the forced-login interstitial, the
//! IPv6 rule page and the delete/add/logout actions, and records every
//! request it handled so tests can check what the driver sent and in which
//! order.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Form, Router};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";

const LOGIN_BUTTON: &str = "button.login.users.dashboard";
const DELETE_BUTTON: &str = "button.delete.firewallRulesIPv6.firewallRulesIPv6";
const ADD_BUTTON: &str = "button.config.firewallRulesIPv6.firewallRulesIPv6.-1";
const LOGOUT_BUTTON: &str = "button.logout.statusPage.x";

#[derive(Default)]
struct UiState {
    /// (row id, destination); `None` renders a row without an id
    rows: Vec<(Option<String>, String)>,
    next_id: u32,
    logged_in: bool,
    other_admin: bool,
    refuse_takeover: bool,
    requests: Vec<String>,
    last_add_form: HashMap<String, String>,
}

/// A fake management UI listening on a loopback port
#[derive(Clone)]
pub struct FakeRouterUi {
    state: Arc<Mutex<UiState>>,
    base_url: String,
}

impl FakeRouterUi {
    /// Serve a rule table whose rows get ids `1..`
    pub async fn start(destinations: &[&str]) -> Self {
        let rows = destinations
            .iter()
            .enumerate()
            .map(|(i, d)| (Some((i + 1).to_string()), d.to_string()))
            .collect();
        Self::start_with_rows(rows).await
    }

    pub async fn start_with_rows(rows: Vec<(Option<String>, String)>) -> Self {
        let state = Arc::new(Mutex::new(UiState {
            next_id: rows.len() as u32 + 1,
            rows,
            ..UiState::default()
        }));

        let app = Router::new()
            .route("/platform.cgi", get(show_page).post(submit_form))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            base_url: format!("http://{addr}"),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Another administrator is logged in
    pub async fn with_other_admin(self) -> Self {
        self.state.lock().await.other_admin = true;
        self
    }

    /// The "continue" link leads back to the interstitial
    pub async fn refusing_takeover(self) -> Self {
        self.state.lock().await.refuse_takeover = true;
        self
    }

    /// Drop the session, as the firmware does after its idle timeout
    pub async fn expire_session(&self) {
        self.state.lock().await.logged_in = false;
    }

    /// Remove a row behind the driver's back
    pub async fn remove_row(&self, destination: &str) {
        self.state.lock().await.rows.retain(|(_, d)| d != destination);
    }

    pub async fn destinations(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .rows
            .iter()
            .map(|(_, d)| d.clone())
            .collect()
    }

    pub async fn requests(&self) -> Vec<String> {
        self.state.lock().await.requests.clone()
    }

    /// Requests that would change the rule table
    pub async fn mutating_posts(&self) -> Vec<String> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.starts_with("POST delete") || r.starts_with("POST add"))
            .collect()
    }

    pub async fn clear_requests(&self) {
        self.state.lock().await.requests.clear();
    }

    pub async fn last_add_form(&self) -> HashMap<String, String> {
        self.state.lock().await.last_add_form.clone()
    }
}

async fn show_page(
    State(state): State<Arc<Mutex<UiState>>>,
    Query(query): Query<HashMap<String, String>>,
) -> Html<String> {
    let mut ui = state.lock().await;

    if query.contains_key(LOGOUT_BUTTON) {
        ui.requests.push("GET logout".to_string());
        ui.logged_in = false;
        return Html(login_page());
    }

    if query.get("force").map(String::as_str) == Some("1") {
        ui.requests.push("GET continue".to_string());
        if ui.refuse_takeover {
            return Html(interstitial_page());
        }
        ui.other_admin = false;
        ui.logged_in = true;
        return Html(dashboard_page());
    }

    match query.get("page").map(String::as_str) {
        Some("firewallRulesIPv6.html") => {
            ui.requests.push("GET rules".to_string());
            if ui.logged_in {
                Html(rule_page(&ui.rows))
            } else {
                Html(login_page())
            }
        }
        _ => {
            ui.requests.push("GET login".to_string());
            Html(login_page())
        }
    }
}

async fn submit_form(
    State(state): State<Arc<Mutex<UiState>>>,
    Form(form): Form<HashMap<String, String>>,
) -> Html<String> {
    let mut ui = state.lock().await;

    if form.contains_key(LOGIN_BUTTON) {
        ui.requests.push("POST login".to_string());
        let accepted = form.get("users.username").map(String::as_str) == Some(USERNAME)
            && form.get("users.password").map(String::as_str) == Some(PASSWORD);
        if !accepted {
            return Html(login_page());
        }
        if ui.other_admin {
            return Html(interstitial_page());
        }
        ui.logged_in = true;
        return Html(dashboard_page());
    }

    if !ui.logged_in {
        ui.requests.push("POST without session".to_string());
        return Html(login_page());
    }

    if form.contains_key(DELETE_BUTTON) {
        let row_id = form.get("firewallRulesIPv6.rowId").cloned().unwrap_or_default();
        ui.requests.push(format!("POST delete {row_id}"));
        ui.rows.retain(|(id, _)| id.as_deref() != Some(row_id.as_str()));
        return Html(rule_page(&ui.rows));
    }

    if form.contains_key(ADD_BUTTON) {
        let destination = form
            .get("firewallRulesIPv6.destinationHostStart")
            .cloned()
            .unwrap_or_default();
        ui.requests.push(format!("POST add {destination}"));
        let id = ui.next_id.to_string();
        ui.next_id += 1;
        ui.rows.push((Some(id), destination));
        ui.last_add_form = form;
        return Html(rule_page(&ui.rows));
    }

    ui.requests.push("POST unknown".to_string());
    Html(dashboard_page())
}

fn login_page() -> String {
    r#"<html><body><form method="post" action="platform.cgi">
        <input type="text" id="tf1_userName" name="users.username">
        <input type="password" id="tf1_password" name="users.password">
        </form></body></html>"#
        .to_string()
}

fn interstitial_page() -> String {
    r#"<html><body><p>Another administrator is logged in.</p>
        <a class="btn continue" href="platform.cgi?page=dashboard.html&amp;force=1">Continue</a>
        </body></html>"#
        .to_string()
}

fn dashboard_page() -> String {
    "<html><body><h1>Dashboard</h1></body></html>".to_string()
}

fn rule_page(rows: &[(Option<String>, String)]) -> String {
    let body: String = if rows.is_empty() {
        r#"<tr><td colspan="8">No rules configured</td></tr>"#.to_string()
    } else {
        rows.iter()
            .map(|(id, destination)| {
                let id_attr = id
                    .as_ref()
                    .map(|id| format!(" id=\"{id}\""))
                    .unwrap_or_default();
                format!(
                    "<tr{id_attr}><td><input type=\"checkbox\"></td><td>Enabled</td>\
                     <td>Inbound</td><td>ANY</td><td>ACCEPT</td><td>ANY</td>\
                     <td>{destination}</td><td>-</td></tr>"
                )
            })
            .collect()
    };

    format!(
        "<html><body><table id=\"recordsData\" class=\"tableStyle\">\
         <thead><tr><th>Status</th><th>Destination</th></tr></thead>\
         <tbody>{body}</tbody></table></body></html>"
    )
}
