use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use branchwatch_core::{Dispatcher, OwnerSource, WatcherRegistry};

use crate::auth::AuthConfig;
use crate::config::ServerConfig;
use crate::jobs::{Job, JobCatalog};
use crate::trigger_store::TriggerStore;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<WatcherRegistry>,
    pub dispatcher: Dispatcher,
    pub jobs: Arc<JobCatalog>,
    pub triggers: Arc<TriggerStore>,
    pub auth: AuthConfig,
    pub config: Arc<ServerConfig>,
    pub sse_subscriber_count: Arc<AtomicUsize>,
}

impl AppState {
    /// Build the state and load the configured jobs. The catalog is marked
    /// ready once every job is registered, so no notification sees a
    /// partially loaded job set.
    pub fn new(config: ServerConfig) -> Self {
        let auth = AuthConfig {
            bearer_token: config.auth.bearer_token.clone(),
            notify_token: config.auth.notify_token.clone(),
        };
        let triggers = Arc::new(TriggerStore::with_capacity(
            config.limits.max_stored_triggers,
            config.limits.broadcast_capacity,
        ));
        let jobs = Arc::new(JobCatalog::new());
        let registry = Arc::new(WatcherRegistry::with_source(
            Arc::clone(&jobs) as Arc<dyn OwnerSource>
        ));

        for job in &config.jobs {
            jobs.upsert(
                &registry,
                Job::new(&job.name, job.enabled, &job.targets, Arc::clone(&triggers)),
            );
        }
        jobs.mark_ready(&registry);

        Self {
            dispatcher: Dispatcher::new(Arc::clone(&registry)),
            registry,
            jobs,
            triggers,
            auth,
            config: Arc::new(config),
            sse_subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Counts a live connection for as long as it is held.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}
