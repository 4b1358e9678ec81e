//! User administration. Every route here sits in an admin-only zone; the
//! handlers only add the self-protection rules.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::info;

use super::extract::Json;
use super::guards::ApiSession;
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::{AccountStatus, Role};
use crate::security;
use crate::storage::{UserPatch, UserRecord, UserView};

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub status: Option<AccountStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPassword {
    pub password: String,
}

fn valid_username(name: &str) -> bool {
    !name.is_empty() && name.len() <= 64 && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn known_role(role: Role) -> AppResult<Role> {
    if role.is_known() { Ok(role) } else { Err(AppError::user("invalid_role", "role must be admin or ktv")) }
}

fn password_hash(password: &str) -> AppResult<String> {
    security::validate_new_password(password).map_err(|e| AppError::user("weak_password".to_string(), e.to_string()))?;
    Ok(security::hash_password(password)?)
}

pub async fn list(State(state): State<AppState>, _guard: ApiSession) -> AppResult<Json<Vec<UserView>>> {
    Ok(Json(state.store.list_users().iter().map(UserRecord::view).collect()))
}

pub async fn get_one(State(state): State<AppState>, _guard: ApiSession, Path(username): Path<String>) -> AppResult<Json<UserView>> {
    let rec = state.store.find_user(&username)?
        .ok_or_else(|| AppError::not_found("not_found".to_string(), format!("user '{}' not found", username)))?;
    Ok(Json(rec.view()))
}

pub async fn create(
    State(state): State<AppState>,
    guard: ApiSession,
    Json(body): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    let actor = guard.require()?;
    let username = body.username.trim();
    if !valid_username(username) {
        return Err(AppError::user("invalid_username", "username must be 1-64 letters, digits, '.', '_' or '-'"));
    }
    let role = known_role(body.role)?;
    let mut rec = UserRecord::new(username, password_hash(&body.password)?, role, Some(&actor.subject));
    rec.display_name = body.display_name.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    let rec = state.store.insert_user(rec)?;
    info!(target: "auth", actor = %actor.subject, user = %rec.username, role = %rec.role, "user created");
    Ok((StatusCode::CREATED, Json(rec.view())))
}

pub async fn update(
    State(state): State<AppState>,
    guard: ApiSession,
    Path(username): Path<String>,
    Json(body): Json<UpdateUser>,
) -> AppResult<Json<UserView>> {
    let actor = guard.require()?;
    let role = body.role.map(known_role).transpose()?;
    if actor.subject == username {
        if matches!(body.status, Some(AccountStatus::Inactive)) {
            return Err(AppError::user("self_lockout", "you cannot deactivate your own account"));
        }
        if matches!(role, Some(r) if r != Role::Admin) {
            return Err(AppError::user("self_lockout", "you cannot remove your own admin role"));
        }
    }
    let patch = UserPatch {
        display_name: body.display_name.map(|d| d.trim().to_string()),
        role,
        status: body.status,
        ..Default::default()
    };
    let rec = state.store.update_user(&username, &patch)?;
    info!(target: "auth", actor = %actor.subject, user = %rec.username, role = %rec.role, status = ?rec.status, "user updated");
    Ok(Json(rec.view()))
}

pub async fn reset_password(
    State(state): State<AppState>,
    guard: ApiSession,
    Path(username): Path<String>,
    Json(body): Json<ResetPassword>,
) -> AppResult<StatusCode> {
    let actor = guard.require()?;
    let patch = UserPatch { password_hash: Some(password_hash(&body.password)?), ..Default::default() };
    state.store.update_user(&username, &patch)?;
    info!(target: "auth", actor = %actor.subject, user = %username, "password reset");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(valid_username("ana.k"));
        assert!(valid_username("tech_01"));
        assert!(!valid_username(""));
        assert!(!valid_username("has space"));
        assert!(!valid_username("a/b"));
    }

    #[test]
    fn unknown_role_is_input_error() {
        assert_eq!(known_role(Role::Unknown).unwrap_err().http_status(), 400);
        assert_eq!(known_role(Role::Ktv).unwrap(), Role::Ktv);
    }
}
