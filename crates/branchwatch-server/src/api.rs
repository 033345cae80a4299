use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use branchwatch_core::{TargetSpec, validate_uri};

use crate::config::validate_job_name;
use crate::error::AppError;
use crate::jobs::{Job, JobSummary};
use crate::state::AppState;
use crate::trigger_store::{TriggerRecord, TriggerStoreStats};

/// Upper bound on `GET /api/v1/triggers?limit=`.
const MAX_TRIGGER_PAGE: usize = 200;
const DEFAULT_TRIGGER_PAGE: usize = 20;

/// Request body for creating or replacing a job.
#[derive(Debug, Deserialize)]
pub struct PutJobBody {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
}

fn default_true() -> bool {
    true
}

/// GET /api/v1/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobSummary>> {
    Json(state.jobs.summaries())
}

/// PUT /api/v1/jobs/{name}: create or replace a job and its targets.
pub async fn put_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<PutJobBody>,
) -> Result<(StatusCode, Json<JobSummary>), AppError> {
    validate_job_name(&name).map_err(AppError::BadRequest)?;

    let max_targets = state.config.limits.max_targets_per_job;
    if body.targets.len() > max_targets {
        return Err(AppError::BadRequest(format!(
            "Too many targets: {} (max {max_targets})",
            body.targets.len()
        )));
    }
    for (i, target) in body.targets.iter().enumerate() {
        validate_uri(&target.uri)
            .map_err(|e| AppError::BadRequest(format!("target {}: {e}", i + 1)))?;
    }

    let job = Job::new(
        &name,
        body.enabled,
        &body.targets,
        Arc::clone(&state.triggers),
    );
    let summary = job.summary();
    let status = match state.jobs.upsert(&state.registry, job) {
        Some(_) => StatusCode::OK,
        None => StatusCode::CREATED,
    };
    Ok((status, Json(summary)))
}

/// DELETE /api/v1/jobs/{name}
pub async fn delete_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .jobs
        .remove(&state.registry, &name)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| AppError::NotFound(format!("Job {name} not found")))
}

/// POST /api/v1/jobs/{name}/enable
pub async fn enable_job(
    state: State<AppState>,
    name: Path<String>,
) -> Result<Json<JobSummary>, AppError> {
    toggle_job(state, name, true)
}

/// POST /api/v1/jobs/{name}/disable
pub async fn disable_job(
    state: State<AppState>,
    name: Path<String>,
) -> Result<Json<JobSummary>, AppError> {
    toggle_job(state, name, false)
}

fn toggle_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
    enabled: bool,
) -> Result<Json<JobSummary>, AppError> {
    if !state.jobs.set_enabled(&state.registry, &name, enabled) {
        return Err(AppError::NotFound(format!("Job {name} not found")));
    }
    state
        .jobs
        .get(&name)
        .map(|job| Json(job.summary()))
        .ok_or_else(|| AppError::NotFound(format!("Job {name} not found")))
}

/// Query for the trigger listing.
#[derive(Debug, Default, Deserialize)]
pub struct TriggersQuery {
    pub job: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TriggersResponse {
    pub stats: TriggerStoreStats,
    pub triggers: Vec<TriggerRecord>,
}

/// GET /api/v1/triggers: recent triggers, newest first.
pub async fn list_triggers(
    State(state): State<AppState>,
    Query(query): Query<TriggersQuery>,
) -> Json<TriggersResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TRIGGER_PAGE)
        .min(MAX_TRIGGER_PAGE);
    let triggers = match query.job.as_deref() {
        Some(job) => state.triggers.recent_for_job(job, limit),
        None => state.triggers.recent(limit),
    };
    Json(TriggersResponse {
        stats: state.triggers.stats(),
        triggers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_body_defaults() {
        let body: PutJobBody = serde_json::from_str("{}").unwrap();
        assert!(body.enabled);
        assert!(body.targets.is_empty());
    }

    #[test]
    fn put_body_with_targets() {
        let body: PutJobBody = serde_json::from_str(
            r#"{"enabled":false,"targets":[{"uri":"https://example.com/repo"}]}"#,
        )
        .unwrap();
        assert!(!body.enabled);
        assert_eq!(body.targets[0].uri, "https://example.com/repo");
        assert_eq!(body.targets[0].branches, "");
    }
}
