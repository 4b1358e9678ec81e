//! Sign-in, sign-out and the current-session endpoint.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extract::Json;
use super::guards::ApiSession;
use super::{clear_session_cookie, set_session_cookie, AppState};
use crate::error::AppResult;
use crate::identity::{authenticate, AccountStatus, LoginRequest, Role, Session};

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub username: String,
    pub role: Role,
    pub status: AccountStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for SessionView {
    fn from(s: &Session) -> Self {
        Self { username: s.subject.clone(), role: s.role, status: s.status, issued_at: s.issued_at, expires_at: s.expires_at }
    }
}

/// `POST /api/auth/login`. Sets the session cookie and also returns the
/// token for bearer-header clients.
pub async fn login(
    State(state): State<AppState>,
    _guard: ApiSession,
    Json(payload): Json<LoginPayload>,
) -> AppResult<impl IntoResponse> {
    let req = LoginRequest { username: payload.username, password: payload.password };
    let store = state.store.clone();
    let issuer = state.issuer.clone();
    // Argon2 verification is CPU-bound.
    let resp = tokio::task::spawn_blocking(move || authenticate(&store, &issuer, &req, Utc::now()))
        .await
        .map_err(|e| anyhow::anyhow!("login task failed: {}", e))??;

    let mut headers = HeaderMap::new();
    if let Some(v) = set_session_cookie(&state.config, &resp.token) {
        headers.insert(header::SET_COOKIE, v);
    }
    let body = serde_json::json!({ "session": SessionView::from(&resp.session), "token": resp.token });
    Ok((StatusCode::OK, headers, Json(body)))
}

/// `POST /api/auth/logout`. Sessions are stateless, so this only clears the
/// cookie.
pub async fn logout(State(state): State<AppState>, _guard: ApiSession) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    if let Some(v) = clear_session_cookie(&state.config) {
        headers.insert(header::SET_COOKIE, v);
    }
    (StatusCode::OK, headers, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /api/auth/me`.
pub async fn me(session: ApiSession) -> AppResult<Json<SessionView>> {
    Ok(Json(SessionView::from(session.require()?)))
}
