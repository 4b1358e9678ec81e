//! Shared fixtures for the HTTP integration tests: an app over a real
//! on-disk store, token minting, and request/response helpers.
#![allow(dead_code)]

use std::path::PathBuf;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use matchdesk::config::AppConfig;
use matchdesk::identity::{AccountStatus, Role};
use matchdesk::server::{build_router, AppState};
use matchdesk::storage::{SharedStore, UserRecord};

pub const SECRET: &str = "integration-secret-0123456789abcdef";
pub const WEBHOOK_KEY: &str = "hook-key-123";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub root: PathBuf,
    _tmp: TempDir,
}

pub fn config() -> AppConfig {
    let mut cfg = AppConfig::with_secret(SECRET);
    cfg.cookie_secure = false;
    cfg.workflow.inbound_secret = Some(WEBHOOK_KEY.to_string());
    cfg
}

pub fn app() -> TestApp { app_with(config()) }

/// App with an admin `boss` and a technician `tech`. Their password hashes
/// are placeholders; tests that go through the login endpoint add their own
/// users with `add_user`.
pub fn app_with(cfg: AppConfig) -> TestApp {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path().join("db");
    let store = SharedStore::open(&root).expect("open store");
    store.insert_user(UserRecord::new("boss", "x".into(), Role::Admin, None)).expect("seed admin");
    store.insert_user(UserRecord::new("tech", "x".into(), Role::Ktv, None)).expect("seed ktv");
    let state = AppState::new(store, cfg).expect("state");
    let router = build_router(state.clone());
    TestApp { state, router, root, _tmp: tmp }
}

impl TestApp {
    pub fn token(&self, username: &str) -> String {
        let rec = self.state.store.find_user(username).expect("lookup").expect("user exists");
        self.state.issuer.issue(&rec, Utc::now()).expect("issue").1
    }

    pub fn add_user(&self, username: &str, password: &str, role: Role, status: AccountStatus) {
        let hash = matchdesk::security::hash_password(password).expect("hash");
        let mut rec = UserRecord::new(username, hash, role, Some("test"));
        rec.status = status;
        self.state.store.insert_user(rec).expect("insert user");
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.expect("infallible")
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        self.send(request(Method::GET, uri, token, None)).await
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Value) -> Response<Body> {
        self.send(request(method, uri, token, Some(body))).await
    }
}

/// Sessions ride in the cookie, the way the browser sends them.
pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut b = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        b = b.header(header::COOKIE, format!("matchdesk_session={}", t));
    }
    match body {
        Some(v) => b.header(header::CONTENT_TYPE, "application/json").body(Body::from(v.to_string())).expect("request"),
        None => b.body(Body::empty()).expect("request"),
    }
}

pub async fn json(resp: Response<Body>) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub fn location(resp: &Response<Body>) -> &str {
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).unwrap_or("")
}
