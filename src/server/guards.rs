//! Route guards. Each one resolves the session, calls
//! `RoutePolicy::evaluate` once, and translates the decision into its own
//! effect: a redirect at the edge or on render, a 401/403 in API handlers.
//! No access rule lives here.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::debug;

use super::{bearer_token, parse_cookie, AppState};
use crate::error::AppError;
use crate::identity::{Decision, Session};

/// Session resolved by an earlier stage, stored in request extensions so
/// later stages skip the token check and status read.
#[derive(Debug, Clone)]
struct ResolvedSession(Option<Session>);

/// Read the session token from the cookie or a bearer header and verify it.
///
/// The cookie is tried first; a bearer token still counts when the cookie is
/// stale. Malformed, expired or forged tokens resolve to `None`. With status
/// revocation on, the account status is refreshed with one point read; a
/// store outage is the only error.
pub fn resolve_session(state: &AppState, headers: &HeaderMap) -> Result<Option<Session>, AppError> {
    let candidates = [parse_cookie(headers, &state.config.cookie_name), bearer_token(headers)];
    let session = candidates.into_iter().flatten().find_map(|token| match state.issuer.decode(&token) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!(target: "auth", "ignoring session token: {}", e);
            None
        }
    });
    let Some(session) = session else { return Ok(None) };
    if !state.config.enforce_status_revocation { return Ok(Some(session)); }
    match state.store.find_user(&session.subject)? {
        Some(rec) => Ok(Some(session.with_status(rec.status))),
        None => {
            debug!(target: "auth", subject = %session.subject, "session subject no longer exists");
            Ok(None)
        }
    }
}

fn session_for(parts: &mut Parts, state: &AppState) -> Result<Option<Session>, AppError> {
    if let Some(ResolvedSession(s)) = parts.extensions.get::<ResolvedSession>() {
        return Ok(s.clone());
    }
    let s = resolve_session(state, &parts.headers)?;
    parts.extensions.insert(ResolvedSession(s.clone()));
    Ok(s)
}

fn signin_redirect(path_and_query: &str) -> Response {
    Redirect::to(&format!("/signin?next={}", urlencoding::encode(path_and_query))).into_response()
}

fn log_denial(stage: &str, path: &str, session: Option<&Session>, decision: Decision) {
    debug!(
        target: "policy",
        stage,
        path,
        subject = session.map(|s| s.subject.as_str()).unwrap_or("-"),
        ?decision,
        "access denied"
    );
}

/// Edge interceptor for page routes: allow or send to sign-in.
pub async fn edge_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();
    let session = match session_for(&mut parts, &state) {
        Ok(s) => s,
        Err(e) => return e.into_response(),
    };
    let path = parts.uri.path().to_string();
    match state.policy.evaluate(&path, session.as_ref()) {
        Decision::Allow => next.run(Request::from_parts(parts, body)).await,
        denied => {
            log_denial("edge", &path, session.as_ref(), denied);
            let target = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or(path.as_str());
            signin_redirect(target)
        }
    }
}

/// Render-time guard. Pages take this extractor; denial redirects to sign-in
/// or to the unauthorized page.
#[derive(Debug, Clone)]
pub struct PageSession(pub Option<Session>);

impl FromRequestParts<AppState> for PageSession {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = session_for(parts, state).map_err(IntoResponse::into_response)?;
        let path = parts.uri.path();
        match state.policy.evaluate(path, session.as_ref()) {
            Decision::Allow => Ok(PageSession(session)),
            Decision::DenyUnauthenticated => {
                log_denial("render", path, None, Decision::DenyUnauthenticated);
                let target = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or(path);
                Err(signin_redirect(target))
            }
            Decision::DenyForbidden => {
                log_denial("render", path, session.as_ref(), Decision::DenyForbidden);
                Err(Redirect::to("/unauthorized").into_response())
            }
        }
    }
}

/// Handler-time guard for API routes. `None` only on public routes.
#[derive(Debug, Clone)]
pub struct ApiSession(pub Option<Session>);

impl ApiSession {
    /// The session, or 401 on a public route reached without one.
    pub fn require(&self) -> Result<&Session, AppError> {
        self.0.as_ref().ok_or_else(|| AppError::unauthenticated("unauthenticated", "authentication required"))
    }
}

impl FromRequestParts<AppState> for ApiSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = session_for(parts, state)?;
        let decision = state.policy.evaluate(parts.uri.path(), session.as_ref());
        match AppError::from_decision(decision) {
            None => Ok(ApiSession(session)),
            Some(err) => {
                log_denial("api", parts.uri.path(), session.as_ref(), decision);
                Err(err)
            }
        }
    }
}
