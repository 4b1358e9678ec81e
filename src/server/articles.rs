//! Analysis articles: read API for staff and the inbound callback the
//! workflow uses to deliver them.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::extract::{Json, Query};
use super::guards::ApiSession;
use super::leagues::{non_empty, not_found};
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::storage::Article;

#[derive(Debug, Deserialize)]
pub struct ArticleFilter {
    pub match_id: Option<String>,
}

/// Callback body posted by the workflow.
#[derive(Debug, Deserialize)]
pub struct InboundArticle {
    pub match_id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub source: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    _guard: ApiSession,
    Query(filter): Query<ArticleFilter>,
) -> AppResult<Json<Vec<Article>>> {
    let match_id = filter.match_id.as_deref().filter(|m| !m.is_empty());
    Ok(Json(state.store.list_articles(match_id)))
}

pub async fn get_one(State(state): State<AppState>, _guard: ApiSession, Path(id): Path<String>) -> AppResult<Json<Article>> {
    state.store.get_article(&id).map(Json).ok_or_else(|| not_found("article", &id))
}

/// `POST /api/webhooks/articles`. The route is public to the session layer;
/// the caller proves itself with the shared `x-api-key`.
pub async fn inbound_webhook(
    State(state): State<AppState>,
    _guard: ApiSession,
    headers: HeaderMap,
    Json(body): Json<InboundArticle>,
) -> AppResult<(StatusCode, Json<Article>)> {
    let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if !state.workflow.accepts_inbound_key(provided) {
        warn!(target: "workflow", "inbound callback rejected: bad or missing key");
        return Err(AppError::unauthenticated("invalid_api_key", "invalid api key"));
    }
    let title = body.title.trim().to_string();
    if title.is_empty() || body.body.trim().is_empty() {
        return Err(AppError::user("invalid_input", "title and body are required"));
    }
    let article = Article {
        id: Uuid::new_v4().to_string(),
        match_id: body.match_id.trim().to_string(),
        title,
        body: body.body,
        source: non_empty(body.source),
        created_at: Utc::now(),
    };
    let article = state.store.insert_article(article)?;
    info!(target: "workflow", match_id = %article.match_id, article = %article.id, "article received");
    Ok((StatusCode::CREATED, Json(article)))
}
