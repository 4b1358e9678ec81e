//! Match fixtures and the analysis trigger.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::extract::{Json, Query};
use super::guards::ApiSession;
use super::leagues::{non_empty, not_found};
use super::workflow::AnalysisRequest;
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::storage::{MatchRecord, MatchStatus};

#[derive(Debug, Deserialize)]
pub struct MatchFilter {
    pub league_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MatchBody {
    pub league_id: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub kickoff_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub status: MatchStatus,
}

impl MatchBody {
    fn validated(self) -> AppResult<Self> {
        let home_team = self.home_team.trim().to_string();
        let away_team = self.away_team.trim().to_string();
        if home_team.is_empty() || away_team.is_empty() {
            return Err(AppError::user("invalid_input", "both teams are required"));
        }
        if home_team.eq_ignore_ascii_case(&away_team) {
            return Err(AppError::user("invalid_input", "home and away team must differ"));
        }
        let league_id = self.league_id.trim().to_string();
        if league_id.is_empty() {
            return Err(AppError::user("invalid_input", "league_id is required"));
        }
        Ok(Self { league_id, home_team, away_team, venue: non_empty(self.venue), ..self })
    }
}

pub async fn list(
    State(state): State<AppState>,
    _guard: ApiSession,
    Query(filter): Query<MatchFilter>,
) -> AppResult<Json<Vec<MatchRecord>>> {
    let league = filter.league_id.as_deref().filter(|l| !l.is_empty());
    let mut out = state.store.list_matches(league);
    out.sort_by(|a, b| a.kickoff_at.cmp(&b.kickoff_at).then_with(|| a.created_at.cmp(&b.created_at)));
    Ok(Json(out))
}

pub async fn get_one(State(state): State<AppState>, _guard: ApiSession, Path(id): Path<String>) -> AppResult<Json<MatchRecord>> {
    state.store.get_match(&id).map(Json).ok_or_else(|| not_found("match", &id))
}

pub async fn create(
    State(state): State<AppState>,
    guard: ApiSession,
    Json(body): Json<MatchBody>,
) -> AppResult<(StatusCode, Json<MatchRecord>)> {
    let actor = guard.require()?;
    let body = body.validated()?;
    let now = Utc::now();
    let m = MatchRecord {
        id: Uuid::new_v4().to_string(),
        league_id: body.league_id,
        home_team: body.home_team,
        away_team: body.away_team,
        kickoff_at: body.kickoff_at,
        venue: body.venue,
        status: body.status,
        analysis_requested_at: None,
        created_at: now,
        updated_at: now,
    };
    let m = state.store.insert_match(m)?;
    info!(target: "store", actor = %actor.subject, match_id = %m.id, league = %m.league_id, "match created");
    Ok((StatusCode::CREATED, Json(m)))
}

pub async fn update(
    State(state): State<AppState>,
    _guard: ApiSession,
    Path(id): Path<String>,
    Json(body): Json<MatchBody>,
) -> AppResult<Json<MatchRecord>> {
    let body = body.validated()?;
    let m = state.store.update_match(&id, |m| {
        m.league_id = body.league_id;
        m.home_team = body.home_team;
        m.away_team = body.away_team;
        m.kickoff_at = body.kickoff_at;
        m.venue = body.venue;
        m.status = body.status;
    })?;
    Ok(Json(m))
}

pub async fn remove(State(state): State<AppState>, guard: ApiSession, Path(id): Path<String>) -> AppResult<StatusCode> {
    let actor = guard.require()?;
    state.store.delete_match(&id)?;
    info!(target: "store", actor = %actor.subject, match_id = %id, "match deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/matches/{id}/analyze`: hand the fixture to the analysis
/// workflow and stamp the request time once it accepted.
pub async fn analyze(State(state): State<AppState>, guard: ApiSession, Path(id): Path<String>) -> AppResult<(StatusCode, Json<MatchRecord>)> {
    let actor = guard.require()?;
    let m = state.store.get_match(&id).ok_or_else(|| not_found("match", &id))?;
    state.workflow.trigger_analysis(&AnalysisRequest::from(&m)).await?;
    let m = state.store.update_match(&id, |m| m.analysis_requested_at = Some(Utc::now()))?;
    info!(target: "workflow", actor = %actor.subject, match_id = %id, "analysis triggered");
    Ok((StatusCode::ACCEPTED, Json(m)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(home: &str, away: &str) -> MatchBody {
        MatchBody { league_id: "l1".into(), home_team: home.into(), away_team: away.into(), kickoff_at: None, venue: Some("  ".into()), status: MatchStatus::Scheduled }
    }

    #[test]
    fn validation_trims_and_rejects() {
        let ok = body(" Ajax ", "PSV").validated().unwrap();
        assert_eq!(ok.home_team, "Ajax");
        assert_eq!(ok.venue, None);
        assert_eq!(body("", "PSV").validated().unwrap_err().http_status(), 400);
        assert_eq!(body("PSV", "psv").validated().unwrap_err().http_status(), 400);
    }
}
