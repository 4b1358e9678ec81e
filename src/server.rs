//!
//! matchdesk HTTP server
//! ---------------------
//! Axum application: server-rendered pages behind the edge interceptor and
//! JSON API routes behind the handler-time guard.
//!
//! Responsibilities:
//! - Build the shared `AppState` once from `AppConfig` (store, policy table,
//!   session issuer, workflow client).
//! - Mount page routes with `guards::edge_guard` and API routes whose
//!   handlers take `guards::ApiSession`.
//! - Session cookie helpers shared by login and logout.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderMap, HeaderValue};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use tracing::info;

use crate::config::AppConfig;
use crate::identity::{ensure_bootstrap_admin, RoutePolicy, SessionIssuer};
use crate::storage::SharedStore;

pub mod articles;
pub mod auth;
pub mod extract;
pub mod guards;
pub mod leagues;
pub mod matches;
pub mod pages;
pub mod users;
pub mod workflow;

use workflow::WorkflowClient;

/// Shared server state injected into all handlers. Everything except the
/// store is immutable after start-up.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub config: Arc<AppConfig>,
    pub policy: Arc<RoutePolicy>,
    pub issuer: Arc<SessionIssuer>,
    pub workflow: Arc<WorkflowClient>,
}

impl AppState {
    pub fn new(store: SharedStore, config: AppConfig) -> anyhow::Result<Self> {
        let policy = config.route_policy().context("loading route policy")?;
        Ok(Self::with_policy(store, config, policy))
    }

    pub fn with_policy(store: SharedStore, config: AppConfig, policy: RoutePolicy) -> Self {
        let issuer = config.session_issuer();
        let workflow = WorkflowClient::new(&config.workflow);
        Self {
            store,
            config: Arc::new(config),
            policy: Arc::new(policy),
            issuer: Arc::new(issuer),
            workflow: Arc::new(workflow),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let pages = Router::new()
        .route("/", get(pages::home))
        .route("/signin", get(pages::signin))
        .route("/unauthorized", get(pages::unauthorized))
        .route("/admin", get(pages::admin_dashboard))
        .route("/admin/leagues", get(pages::admin_leagues))
        .route("/admin/matches", get(pages::admin_matches))
        .route("/admin/users", get(pages::admin_users))
        .route("/ktv", get(pages::ktv_dashboard))
        .route("/ktv/matches", get(pages::ktv_matches))
        .route_layer(middleware::from_fn_with_state(state.clone(), guards::edge_guard));

    let api = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/{username}", get(users::get_one).patch(users::update))
        .route("/api/users/{username}/password", post(users::reset_password))
        .route("/api/leagues", get(leagues::list).post(leagues::create))
        .route("/api/leagues/{id}", get(leagues::get_one).put(leagues::update).delete(leagues::remove))
        .route("/api/matches", get(matches::list).post(matches::create))
        .route("/api/matches/{id}", get(matches::get_one).put(matches::update).delete(matches::remove))
        .route("/api/matches/{id}/analyze", post(matches::analyze))
        .route("/api/articles", get(articles::list))
        .route("/api/articles/{id}", get(articles::get_one))
        .route("/api/webhooks/articles", post(articles::inbound_webhook));

    Router::new()
        .merge(pages)
        .merge(api)
        .route("/health", get(|| async { Json(serde_json::json!({"status": "ok"})) }))
        .with_state(state)
}

fn log_startup(cfg: &AppConfig, policy: &RoutePolicy) {
    info!(
        target: "startup",
        "matchdesk starting: http_port={}, db_root={:?}, session_ttl_secs={}, cookie={}, secure_cookie={}, status_revocation={}, policy_file={:?}, workflow={}",
        cfg.http_port,
        cfg.db_root,
        cfg.session_ttl.num_seconds(),
        cfg.cookie_name,
        cfg.cookie_secure,
        cfg.enforce_status_revocation,
        cfg.policy_file,
        cfg.workflow.url.is_some(),
    );
    for z in policy.zones() {
        info!(target: "startup", prefix = %z.prefix, access = ?z.access, "zone");
    }
}

/// Open the store, provision the bootstrap admin if configured, and serve
/// until the listener fails.
pub async fn run_with_config(cfg: AppConfig) -> anyhow::Result<()> {
    let store = match &cfg.db_root {
        Some(root) => SharedStore::open(root).with_context(|| format!("opening store at {}", root.display()))?,
        None => SharedStore::in_memory(),
    };
    if let Some(admin) = &cfg.bootstrap_admin {
        ensure_bootstrap_admin(&store, &admin.username, &admin.password)
            .context("provisioning bootstrap admin")?;
    }
    if store.user_count() == 0 {
        tracing::warn!(target: "startup", "no user accounts exist; set MATCHDESK_ADMIN_USERNAME and MATCHDESK_ADMIN_PASSWORD to create one");
    }

    let state = AppState::new(store, cfg)?;
    log_startup(&state.config, &state.policy);
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.http_port));
    let app = build_router(state);

    info!(target: "startup", "listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie")?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let v = headers.get("authorization")?.to_str().ok()?;
    let (scheme, token) = v.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") { return None; }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token.to_string()) }
}

fn cookie_attrs(cfg: &AppConfig) -> &'static str {
    if cfg.cookie_secure { "HttpOnly; Secure; SameSite=Strict; Path=/" } else { "HttpOnly; SameSite=Strict; Path=/" }
}

// Tokens are base64url plus dots, always a valid header value.
pub(crate) fn set_session_cookie(cfg: &AppConfig, token: &str) -> Option<HeaderValue> {
    let max_age = cfg.session_ttl.num_seconds();
    HeaderValue::from_str(&format!("{}={}; Max-Age={}; {}", cfg.cookie_name, token, max_age, cookie_attrs(cfg))).ok()
}

pub(crate) fn clear_session_cookie(cfg: &AppConfig) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; {}", cfg.cookie_name, cookie_attrs(cfg))).ok()
}
