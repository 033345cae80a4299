#[allow(dead_code)]
mod common;

use std::time::Duration;

use branchwatch_server::config::{LimitsConfig, ServerConfig};
use common::{REPO, TestServer, job, target};

#[tokio::test]
async fn sse_receives_trigger() {
    let server = TestServer::with_jobs(vec![job("build", vec![target(REPO, "master")])]).await;
    let sse_url = format!("{}/api/v1/triggers/stream", server.base_url());
    let notify_url = format!("{}/git/notifyCommit", server.base_url());

    // Push after a short delay so the stream is subscribed first
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = reqwest::Client::new()
            .get(&notify_url)
            .query(&[("url", REPO), ("branches", "master")])
            .send()
            .await;
    });

    let client = reqwest::Client::new();
    let sse_resp = client.get(&sse_url).send().await.unwrap();
    assert_eq!(sse_resp.status(), 200);

    let mut collected = String::new();
    let found = tokio::time::timeout(Duration::from_secs(3), async {
        let mut resp = sse_resp;
        loop {
            match resp.chunk().await {
                Ok(Some(bytes)) => {
                    collected.push_str(&String::from_utf8_lossy(&bytes));
                    if collected.contains("event: trigger") && collected.contains("\"build\"") {
                        return true;
                    }
                },
                _ => return false,
            }
        }
    })
    .await
    .unwrap_or(false);

    assert!(
        found,
        "SSE stream should contain the triggered job, got: {collected}"
    );
}

#[tokio::test]
async fn sse_returns_503_when_at_capacity() {
    let config = ServerConfig {
        limits: LimitsConfig {
            max_sse_subscribers: 1,
            ..LimitsConfig::default()
        },
        ..ServerConfig::default()
    };
    let server = TestServer::from_config(config).await;
    let client = reqwest::Client::new();
    let sse_url = format!("{}/api/v1/triggers/stream", server.base_url());

    // First SSE connection should succeed
    let resp1 = client.get(&sse_url).send().await.unwrap();
    assert_eq!(resp1.status(), 200);

    // Give it a moment to register
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Second SSE connection should be rejected
    let resp2 = client.get(&sse_url).send().await.unwrap();
    assert_eq!(
        resp2.status(),
        503,
        "Should reject when SSE subscriber limit reached"
    );
}
