use std::net::SocketAddr;
use std::time::Duration;

use branchwatch_core::TargetSpec;
use branchwatch_server::build_app;
use branchwatch_server::config::{AuthFileConfig, JobConfig, ServerConfig};
use branchwatch_server::state::AppState;

pub const REPO: &str = "https://example.com/org/repo";

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with no auth and no jobs.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a test server with the given jobs and no auth.
    pub async fn with_jobs(jobs: Vec<JobConfig>) -> Self {
        Self::from_config(ServerConfig {
            jobs,
            ..ServerConfig::default()
        })
        .await
    }

    /// Start a test server with a bearer token and a notify token.
    pub async fn with_auth(token: &str, notify_token: &str) -> Self {
        let config = ServerConfig {
            auth: AuthFileConfig {
                bearer_token: Some(token.to_string()),
                notify_token: Some(notify_token.to_string()),
            },
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Send a push notification with a GET request.
    pub async fn notify(&self, url: &str, branches: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("{}/git/notifyCommit", self.base_url()))
            .query(&[("url", url), ("branches", branches)])
            .send()
            .await
            .unwrap()
    }

    /// Names of the jobs triggered so far, oldest first.
    pub fn triggered_jobs(&self) -> Vec<String> {
        let mut jobs: Vec<String> = self
            .state
            .triggers
            .recent(usize::MAX)
            .into_iter()
            .map(|r| r.job)
            .collect();
        jobs.reverse();
        jobs
    }
}

pub fn target(uri: &str, branches: &str) -> TargetSpec {
    TargetSpec {
        uri: uri.to_string(),
        branches: branches.to_string(),
    }
}

pub fn job(name: &str, targets: Vec<TargetSpec>) -> JobConfig {
    JobConfig {
        name: name.to_string(),
        enabled: true,
        targets,
    }
}
