use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub jobs: JobInfo,
    pub triggers: TriggerInfo,
    pub sse_subscribers: usize,
}

#[derive(Serialize)]
pub struct JobInfo {
    pub configured: usize,
    pub watching: usize,
}

#[derive(Serialize)]
pub struct TriggerInfo {
    pub stored: usize,
    pub recorded: u64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.triggers.stats();
    // Counted from the catalog; a health poll must not rebuild the snapshot.
    let watching = state.jobs.watching();

    Json(HealthResponse {
        status: if state.jobs.is_ready() {
            "healthy"
        } else {
            "starting"
        },
        version: env!("CARGO_PKG_VERSION"),
        jobs: JobInfo {
            configured: state.jobs.len(),
            watching,
        },
        triggers: TriggerInfo {
            stored: stats.total_stored,
            recorded: stats.total_recorded,
        },
        sse_subscribers: state.sse_subscriber_count.load(Ordering::Relaxed),
    })
}

#[cfg(test)]
mod tests {
    use branchwatch_core::TargetSpec;

    use super::*;
    use crate::config::{JobConfig, ServerConfig};

    #[tokio::test]
    async fn health_check_leaves_snapshot_cold() {
        let state = AppState::new(ServerConfig {
            jobs: vec![JobConfig {
                name: "build".to_string(),
                enabled: true,
                targets: vec![TargetSpec {
                    uri: "https://example.com/repo".to_string(),
                    branches: String::new(),
                }],
            }],
            ..ServerConfig::default()
        });
        assert!(!state.registry.is_cached());

        let Json(resp) = health_check(State(state.clone())).await;
        assert_eq!(resp.status, "healthy");
        assert_eq!(resp.jobs.configured, 1);
        assert_eq!(resp.jobs.watching, 1);
        assert!(!state.registry.is_cached());
    }

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            jobs: JobInfo {
                configured: 3,
                watching: 2,
            },
            triggers: TriggerInfo {
                stored: 5,
                recorded: 7,
            },
            sse_subscribers: 1,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"healthy\""));
        assert!(json.contains("\"watching\":2"));
        assert!(json.contains("\"recorded\":7"));
    }
}
