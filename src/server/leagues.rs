use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::extract::Json;
use super::guards::ApiSession;
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::storage::League;

#[derive(Debug, Deserialize)]
pub struct LeagueBody {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
}

impl LeagueBody {
    fn validated(self) -> AppResult<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() { return Err(AppError::user("invalid_input", "league name is required")); }
        Ok(Self { name, country: non_empty(self.country), season: non_empty(self.season) })
    }
}

pub(crate) fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub(crate) fn not_found(kind: &str, id: &str) -> AppError {
    AppError::not_found("not_found".to_string(), format!("{} '{}' not found", kind, id))
}

pub async fn list(State(state): State<AppState>, _guard: ApiSession) -> AppResult<Json<Vec<League>>> {
    Ok(Json(state.store.list_leagues()))
}

pub async fn get_one(State(state): State<AppState>, _guard: ApiSession, Path(id): Path<String>) -> AppResult<Json<League>> {
    state.store.get_league(&id).map(Json).ok_or_else(|| not_found("league", &id))
}

pub async fn create(
    State(state): State<AppState>,
    guard: ApiSession,
    Json(body): Json<LeagueBody>,
) -> AppResult<(StatusCode, Json<League>)> {
    let actor = guard.require()?;
    let body = body.validated()?;
    let now = Utc::now();
    let league = League {
        id: Uuid::new_v4().to_string(),
        name: body.name,
        country: body.country,
        season: body.season,
        created_at: now,
        updated_at: now,
    };
    let league = state.store.insert_league(league)?;
    info!(target: "store", actor = %actor.subject, league = %league.id, "league created");
    Ok((StatusCode::CREATED, Json(league)))
}

pub async fn update(
    State(state): State<AppState>,
    _guard: ApiSession,
    Path(id): Path<String>,
    Json(body): Json<LeagueBody>,
) -> AppResult<Json<League>> {
    let body = body.validated()?;
    let league = state.store.update_league(&id, |l| {
        l.name = body.name;
        l.country = body.country;
        l.season = body.season;
    })?;
    Ok(Json(league))
}

pub async fn remove(State(state): State<AppState>, guard: ApiSession, Path(id): Path<String>) -> AppResult<StatusCode> {
    let actor = guard.require()?;
    state.store.delete_league(&id)?;
    info!(target: "store", actor = %actor.subject, league = %id, "league deleted");
    Ok(StatusCode::NO_CONTENT)
}
