pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod jobs;
pub mod notify;
pub mod sse;
pub mod state;
pub mod trigger_store;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post, put};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let timeout = Duration::from_secs(config.limits.request_timeout_secs);
    let state = AppState::new(config);

    // Job and trigger API (behind bearer auth middleware)
    let api_routes = Router::new()
        .route("/jobs", get(api::list_jobs))
        .route("/jobs/{name}", put(api::put_job).delete(api::delete_job))
        .route("/jobs/{name}/enable", post(api::enable_job))
        .route("/jobs/{name}/disable", post(api::disable_job))
        .route("/triggers", get(api::list_triggers))
        .route("/triggers/stream", get(sse::trigger_stream))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    // Push senders authenticate with the notify token, not the bearer token.
    let app = Router::new()
        .route(
            "/git/notifyCommit",
            get(notify::notify_commit).post(notify::notify_commit),
        )
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state)
}

/// Middleware wrapper that injects AuthConfig into request extensions for the
/// bearer auth middleware.
async fn bearer_auth_layer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut request: axum::extract::Request,
    next: middleware::Next,
) -> Result<axum::response::Response, axum::http::StatusCode> {
    request.extensions_mut().insert(state.auth.clone());
    auth::bearer_auth_middleware(request.headers().clone(), request, next).await
}
