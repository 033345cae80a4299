use std::collections::HashSet;

use serde::Deserialize;

use branchwatch_core::TargetSpec;
use branchwatch_core::validate_uri;

/// Default config file, overridable with `BRANCHWATCH_CONFIG`.
pub const DEFAULT_CONFIG_PATH: &str = "branchwatch.toml";

/// Top-level server configuration, loaded from `branchwatch.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub auth: AuthFileConfig,
    pub limits: LimitsConfig,
    pub jobs: Vec<JobConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            auth: AuthFileConfig::default(),
            limits: LimitsConfig::default(),
            jobs: Vec::new(),
        }
    }
}

/// Auth section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthFileConfig {
    /// Bearer token for the job and trigger API. None = auth disabled.
    pub bearer_token: Option<String>,
    /// Shared token push senders must pass as `token=`. None = not checked.
    pub notify_token: Option<String>,
}

/// Infrastructure limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_stored_triggers: usize,
    pub broadcast_capacity: usize,
    pub max_sse_subscribers: usize,
    pub max_targets_per_job: usize,
    /// Seconds before an HTTP request is abandoned.
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_stored_triggers: 500,
            broadcast_capacity: 1024,
            max_sse_subscribers: 100,
            max_targets_per_job: 64,
            request_timeout_secs: 30,
        }
    }
}

/// A job and the repository targets that trigger it.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
}

fn default_true() -> bool {
    true
}

impl ServerConfig {
    /// Collect every configuration problem. An empty list means the config
    /// is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            problems.push(format!(
                "listen_addr '{}' is not a valid socket address",
                self.listen_addr
            ));
        }

        if self.limits.max_stored_triggers == 0 {
            problems.push("limits.max_stored_triggers must be > 0".to_string());
        }
        if self.limits.broadcast_capacity == 0 {
            problems.push("limits.broadcast_capacity must be > 0".to_string());
        }
        if self.limits.max_sse_subscribers == 0 {
            problems.push("limits.max_sse_subscribers must be > 0".to_string());
        }
        if self.limits.max_targets_per_job == 0 {
            problems.push("limits.max_targets_per_job must be > 0".to_string());
        }
        if self.limits.request_timeout_secs == 0 {
            problems.push("limits.request_timeout_secs must be > 0".to_string());
        }

        let mut names = HashSet::new();
        for job in &self.jobs {
            if let Err(e) = validate_job_name(&job.name) {
                problems.push(e);
                continue;
            }
            if !names.insert(job.name.as_str()) {
                problems.push(format!("job '{}' is defined more than once", job.name));
            }
            if job.targets.len() > self.limits.max_targets_per_job {
                problems.push(format!(
                    "job '{}' has {} targets (max {})",
                    job.name,
                    job.targets.len(),
                    self.limits.max_targets_per_job
                ));
            }
            for (i, target) in job.targets.iter().enumerate() {
                if let Err(e) = validate_uri(&target.uri) {
                    problems.push(format!("job '{}' target {}: {e}", job.name, i + 1));
                }
            }
        }

        problems
    }

    /// Log configuration hazards that do not prevent startup.
    pub fn warn_insecure(&self) {
        if self.auth.bearer_token.is_some() {
            tracing::warn!(
                "bearer_token is set in config file, use BRANCHWATCH_API_TOKEN env var in production"
            );
        } else {
            tracing::warn!("No bearer_token configured, the job API is unauthenticated");
        }
        if self.auth.notify_token.is_some() {
            tracing::warn!(
                "notify_token is set in config file, use BRANCHWATCH_NOTIFY_TOKEN env var in production"
            );
        }
    }

    /// Load config from the config file if it exists, then apply env var
    /// overrides.
    pub fn load() -> Self {
        let path = std::env::var("BRANCHWATCH_CONFIG")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(path = %path, jobs = cfg.jobs.len(), "Loaded configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(path = %path, "Failed to parse config: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!(path = %path, "No config file found, using defaults");
                ServerConfig::default()
            },
        };

        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("BRANCHWATCH_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Ok(token) = std::env::var("BRANCHWATCH_API_TOKEN")
            && !token.is_empty()
        {
            self.auth.bearer_token = Some(token);
        }
        if let Ok(token) = std::env::var("BRANCHWATCH_NOTIFY_TOKEN")
            && !token.is_empty()
        {
            self.auth.notify_token = Some(token);
        }
        if let Ok(val) = std::env::var("BRANCHWATCH_MAX_STORED_TRIGGERS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_stored_triggers = n;
        }
        if let Ok(val) = std::env::var("BRANCHWATCH_MAX_SSE_SUBSCRIBERS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_sse_subscribers = n;
        }
    }
}

/// Job names appear in URL paths, so keep them to a safe alphabet. Names are
/// used verbatim; surrounding whitespace is rejected, not trimmed.
pub fn validate_job_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("job name is required".to_string());
    }
    if name.len() > 128 {
        return Err("job name exceeds 128 chars".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(format!(
            "job name '{name}' may only contain letters, digits, '-', '_' and '.'"
        ));
    }
    Ok(())
}
