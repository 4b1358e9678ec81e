//! Analysis workflow integration: the outbound trigger and the key check for
//! inbound callbacks.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::WorkflowConfig;
use crate::error::AppError;
use crate::security;
use crate::storage::MatchRecord;

const TRIGGER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow url is not configured")]
    NotConfigured,
    #[error("workflow unreachable: {0}")]
    Unreachable(String),
    #[error("workflow answered {0}")]
    Rejected(u16),
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::NotConfigured => AppError::unavailable("workflow_unavailable", "analysis workflow is not configured"),
            WorkflowError::Unreachable(_) | WorkflowError::Rejected(_) => {
                AppError::upstream("workflow_failed", "analysis workflow request failed")
            }
        }
    }
}

/// Body posted to the workflow.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalysisRequest {
    pub match_id: String,
    pub league_id: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff_at: Option<DateTime<Utc>>,
}

impl From<&MatchRecord> for AnalysisRequest {
    fn from(m: &MatchRecord) -> Self {
        Self {
            match_id: m.id.clone(),
            league_id: m.league_id.clone(),
            home_team: m.home_team.clone(),
            away_team: m.away_team.clone(),
            kickoff_at: m.kickoff_at,
        }
    }
}

pub struct WorkflowClient {
    http: reqwest::Client,
    url: Option<String>,
    api_key: Option<String>,
    inbound_secret: Option<String>,
}

impl WorkflowClient {
    pub fn new(cfg: &WorkflowConfig) -> Self {
        let http = reqwest::Client::builder().timeout(TRIGGER_TIMEOUT).build().unwrap_or_default();
        Self { http, url: cfg.url.clone(), api_key: cfg.api_key.clone(), inbound_secret: cfg.inbound_secret.clone() }
    }

    pub async fn trigger_analysis(&self, req: &AnalysisRequest) -> Result<(), WorkflowError> {
        let url = self.url.as_deref().ok_or(WorkflowError::NotConfigured)?;
        let mut call = self.http.post(url).json(req);
        if let Some(key) = &self.api_key {
            call = call.header("x-api-key", key);
        }
        let resp = call.send().await.map_err(|e| {
            warn!(target: "workflow", match_id = %req.match_id, "trigger failed: {}", e);
            WorkflowError::Unreachable(e.to_string())
        })?;
        let status = resp.status();
        if !status.is_success() {
            warn!(target: "workflow", match_id = %req.match_id, status = status.as_u16(), "trigger rejected");
            return Err(WorkflowError::Rejected(status.as_u16()));
        }
        info!(target: "workflow", match_id = %req.match_id, "analysis requested");
        Ok(())
    }

    /// Constant-time check of an inbound callback key. With no secret
    /// configured every callback is refused.
    pub fn accepts_inbound_key(&self, provided: Option<&str>) -> bool {
        match (&self.inbound_secret, provided) {
            (Some(expected), Some(got)) => security::secrets_equal(got, expected),
            _ => false,
        }
    }
}
