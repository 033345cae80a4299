use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

/// Query string of a push notification, as sent by git hosting services.
#[derive(Debug, Default, Deserialize)]
pub struct NotifyQuery {
    pub url: Option<String>,
    pub branches: Option<String>,
    pub sha1: Option<String>,
    pub token: Option<String>,
}

/// The sender only learns that the notification was taken.
#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub accepted: bool,
    pub url: String,
    pub branches: Vec<String>,
}

/// GET|POST /git/notifyCommit: announce a push to a repository.
pub async fn notify_commit(
    State(state): State<AppState>,
    Query(query): Query<NotifyQuery>,
) -> Result<Json<NotifyResponse>, AppError> {
    if !state.auth.notify_allowed(query.token.as_deref()) {
        return Err(AppError::Unauthorized("Invalid notify token".to_string()));
    }

    let url = query.url.as_deref().map(str::trim).unwrap_or_default();
    if url.is_empty() {
        return Err(AppError::BadRequest("url parameter is required".to_string()));
    }
    let branches = split_branches(query.branches.as_deref().unwrap_or_default());

    if let Some(sha1) = &query.sha1 {
        tracing::debug!(url, sha1 = %sha1, "Push notification carries a commit id");
    }
    let report = state.dispatcher.on_notification(url, branches.iter().cloned());
    tracing::info!(
        url,
        branches = ?branches,
        matched = report.matched,
        scheduled = report.scheduled,
        "Push notification received"
    );

    Ok(Json(NotifyResponse {
        accepted: true,
        url: url.to_string(),
        branches,
    }))
}

/// `a, b,,c` → `["a", "b", "c"]`.
fn split_branches(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(String::from)
        .collect()
}
