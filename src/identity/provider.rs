use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::role::Role;
use super::session::{Session, SessionIssuer, SessionToken};
use super::AuthError;
use crate::security;
use crate::storage::{StoreError, UserPatch, UserRecord};

/// The two user lookups the session layer needs. `update_user` applies the
/// whole patch atomically.
pub trait CredentialStore: Send + Sync {
    fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;
    fn update_user(&self, username: &str, patch: &UserPatch) -> Result<UserRecord, StoreError>;
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: Session,
    pub token: SessionToken,
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self { AuthError::StoreUnavailable(e.to_string()) }
}

/// Check a username/password pair and issue a session.
///
/// Lookup is exact and case-sensitive. Unknown users are verified against a
/// dummy hash so they cost the same as a wrong password, and the inactive
/// check only runs once the password matched.
pub fn authenticate(
    store: &dyn CredentialStore,
    issuer: &SessionIssuer,
    req: &LoginRequest,
    now: DateTime<Utc>,
) -> Result<LoginResponse, AuthError> {
    let Some(rec) = store.find_user(&req.username)? else {
        security::verify_against_dummy(&req.password);
        debug!(target: "auth", user = %req.username, "login rejected: no such user");
        return Err(AuthError::InvalidCredentials);
    };
    if !security::verify_password(&rec.password_hash, &req.password) {
        debug!(target: "auth", user = %req.username, "login rejected: bad password");
        return Err(AuthError::InvalidCredentials);
    }
    if !rec.status.is_active() {
        info!(target: "auth", user = %req.username, "login rejected: account inactive");
        return Err(AuthError::AccountInactive);
    }
    if !rec.role.is_known() {
        warn!(target: "auth", user = %req.username, "login rejected: stored role outside the role set");
        return Err(AuthError::UnknownRole);
    }
    let (session, token) = issuer.issue(&rec, now)?;
    store.update_user(&rec.username, &UserPatch { last_login_at: Some(now), ..Default::default() })?;
    info!(target: "auth", user = %session.subject, role = %session.role, "login ok");
    Ok(LoginResponse { session, token })
}

/// Provision the first admin account when the user collection is empty.
/// Returns true when an account was created.
pub fn ensure_bootstrap_admin(store: &crate::storage::SharedStore, username: &str, password: &str) -> anyhow::Result<bool> {
    if store.user_count() > 0 { return Ok(false); }
    security::validate_new_password(password)?;
    let hash = security::hash_password(password)?;
    let mut rec = UserRecord::new(username, hash, Role::Admin, Some("bootstrap"));
    rec.display_name = Some("Administrator".to_string());
    store.insert_user(rec)?;
    info!(target: "startup", user = %username, "bootstrap admin created");
    Ok(true)
}
