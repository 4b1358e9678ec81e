//! Unified application error model and mapping helpers.
//! HTTP handlers return `AppResult<T>`; every variant maps to a status code
//! and a `{"error": "<message>"}` body that carries no internal detail.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::error;

use crate::identity::{AuthError, Decision};
use crate::storage::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    Unauthenticated { code: String, message: String },
    Forbidden { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Upstream { code: String, message: String },
    Unavailable { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Unauthenticated { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Unavailable { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Unauthenticated { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::Unavailable { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn unauthenticated<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unauthenticated { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn upstream<S: Into<String>>(code: S, msg: S) -> Self { AppError::Upstream { code: code.into(), message: msg.into() } }
    pub fn unavailable<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unavailable { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Unauthenticated { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Upstream { .. } => 502,
            AppError::Unavailable { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }

    /// Translate a deny decision from the route policy. `Allow` has no error
    /// form and maps to `None`.
    pub fn from_decision(d: Decision) -> Option<Self> {
        match d {
            Decision::Allow => None,
            Decision::DenyUnauthenticated => Some(AppError::unauthenticated("unauthenticated", "authentication required")),
            Decision::DenyForbidden => Some(AppError::forbidden("forbidden", "forbidden")),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::unauthenticated("invalid_credentials", "invalid username or password"),
            AuthError::AccountInactive => AppError::forbidden("account_inactive", "account is inactive"),
            AuthError::UnknownRole => AppError::forbidden("forbidden", "forbidden"),
            AuthError::MalformedSession | AuthError::SessionExpired => AppError::unauthenticated("unauthenticated", "authentication required"),
            AuthError::StoreUnavailable(detail) => {
                error!(target: "store", "credential store unavailable: {}", detail);
                AppError::unavailable("store_unavailable", "service temporarily unavailable")
            }
            AuthError::TokenSigning(detail) => {
                error!(target: "auth", "session signing failed: {}", detail);
                AppError::internal("internal", "internal server error")
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(m) => AppError::NotFound { code: "not_found".into(), message: m },
            StoreError::Conflict(m) => AppError::Conflict { code: "conflict".into(), message: m },
            StoreError::Invalid(m) => AppError::UserInput { code: "invalid_input".into(), message: m },
            StoreError::Unavailable(detail) => {
                error!(target: "store", "store unavailable: {}", detail);
                AppError::unavailable("store_unavailable", "service temporarily unavailable")
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        error!("internal error: {:#}", err);
        AppError::internal("internal", "internal server error")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.message(), "code": self.code_str() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::unauthenticated("auth", "no").http_status(), 401);
        assert_eq!(AppError::forbidden("forbidden", "no").http_status(), 403);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::conflict("conflict", "dup").http_status(), 409);
        assert_eq!(AppError::upstream("workflow", "bad gateway").http_status(), 502);
        assert_eq!(AppError::unavailable("store", "down").http_status(), 503);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn decisions_map_to_401_and_403() {
        assert_eq!(AppError::from_decision(Decision::Allow), None);
        assert_eq!(AppError::from_decision(Decision::DenyUnauthenticated).unwrap().http_status(), 401);
        assert_eq!(AppError::from_decision(Decision::DenyForbidden).unwrap().http_status(), 403);
    }

    #[test]
    fn store_outage_hides_detail() {
        let e: AppError = StoreError::Unavailable("/var/lib/matchdesk/users.json: EIO".into()).into();
        assert_eq!(e.http_status(), 503);
        assert!(!e.message().contains("users.json"));
        let e: AppError = AuthError::StoreUnavailable("socket closed".into()).into();
        assert_eq!(e.http_status(), 503);
        assert!(!e.message().contains("socket"));
    }

    #[test]
    fn auth_errors_map_to_status() {
        assert_eq!(AppError::from(AuthError::InvalidCredentials).http_status(), 401);
        assert_eq!(AppError::from(AuthError::AccountInactive).http_status(), 403);
        assert_eq!(AppError::from(AuthError::MalformedSession).http_status(), 401);
        assert_eq!(AppError::from(AuthError::SessionExpired).http_status(), 401);
    }
}
