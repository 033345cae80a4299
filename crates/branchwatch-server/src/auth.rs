use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

/// Authentication configuration, from the config file or env overrides.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Bearer token for the job and trigger API. None = auth disabled.
    pub bearer_token: Option<String>,
    /// Token push senders pass as the `token` query parameter. None = any
    /// sender may notify.
    pub notify_token: Option<String>,
}

impl AuthConfig {
    /// Whether a push notification carrying `provided` may be processed.
    pub fn notify_allowed(&self, provided: Option<&str>) -> bool {
        match &self.notify_token {
            None => true,
            Some(expected) => provided.is_some_and(|t| constant_time_eq(t, expected)),
        }
    }
}

/// Axum middleware that validates Bearer token authentication.
/// If no token is configured (`AuthConfig::bearer_token` is None), all
/// requests are allowed through (auth disabled).
pub async fn bearer_auth_middleware(
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_config = request
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .unwrap_or_default();

    if let Some(ref expected) = auth_config.bearer_token {
        let provided = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match provided {
            Some(token) if constant_time_eq(token, expected) => {},
            _ => return Err(StatusCode::UNAUTHORIZED),
        }
    }

    Ok(next.run(request).await)
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
