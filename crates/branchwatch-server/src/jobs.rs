use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde::Serialize;

use branchwatch_core::{
    Cause, MatchTarget, OwnerSource, ScheduleError, TargetSpec, Triggerable, Watcher, WatcherHost,
    WatcherRegistry,
};

use crate::trigger_store::{TriggerRecord, TriggerStore};

/// A triggerable job. Owns its watcher; the watcher points back weakly.
pub struct Job {
    name: String,
    enabled: AtomicBool,
    watcher: Option<Arc<Watcher>>,
    triggers: Arc<TriggerStore>,
}

impl Job {
    /// A job with no targets gets no watcher and is never notified.
    pub fn new(
        name: &str,
        enabled: bool,
        targets: &[TargetSpec],
        triggers: Arc<TriggerStore>,
    ) -> Arc<Self> {
        let targets: Vec<MatchTarget> = targets.iter().map(MatchTarget::from_spec).collect();
        Arc::new_cyclic(|me: &Weak<Job>| {
            let owner = Weak::clone(me);
            let owner: Weak<dyn Triggerable> = owner;
            let watcher = (!targets.is_empty()).then(|| Arc::new(Watcher::new(targets, owner)));
            Self {
                name: name.to_string(),
                enabled: AtomicBool::new(enabled),
                watcher,
                triggers,
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            name: self.name.clone(),
            enabled: self.is_enabled(),
            targets: self
                .watcher
                .as_ref()
                .map(|w| w.targets().iter().map(MatchTarget::to_spec).collect())
                .unwrap_or_default(),
        }
    }
}

impl Triggerable for Job {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn is_triggerable(&self) -> bool {
        self.is_enabled()
    }

    fn schedule(&self, cause: Cause) -> Result<(), ScheduleError> {
        if !self.is_enabled() {
            return Err(ScheduleError::NotTriggerable(self.name.clone()));
        }
        self.triggers.record(TriggerRecord::new(&self.name, cause));
        Ok(())
    }
}

impl WatcherHost for Job {
    fn watcher(&self) -> Option<Arc<Watcher>> {
        self.watcher.clone()
    }
}

/// Job as reported by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub name: String,
    pub enabled: bool,
    pub targets: Vec<TargetSpec>,
}

/// Every configured job, keyed by name. Enumerated by the watcher registry
/// on rescans, and the place where job start/stop is turned into watcher
/// registration.
#[derive(Default)]
pub struct JobCatalog {
    jobs: RwLock<BTreeMap<String, Arc<Job>>>,
    ready: AtomicBool,
}

impl JobCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow enumeration. Until then registry scans report the catalog as
    /// unavailable and notifications are ignored.
    pub fn mark_ready(&self, registry: &WatcherRegistry) {
        self.ready.store(true, Ordering::Release);
        registry.invalidate();
        tracing::info!(jobs = self.len(), "Job catalog ready");
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Add or replace a job. The replaced job's watcher is unregistered
    /// before the new one is registered.
    ///
    /// Registry updates happen under the catalog write lock so concurrent
    /// lifecycle changes to one name cannot leave a replaced watcher behind.
    /// Lock order is catalog, then registry active set; a scan holds the
    /// registry cache and then reads the catalog, never the reverse.
    pub fn upsert(&self, registry: &WatcherRegistry, job: Arc<Job>) -> Option<Arc<Job>> {
        let previous = {
            let mut jobs = self.write();
            let previous = jobs.insert(job.name().to_string(), Arc::clone(&job));
            if let Some(old) = &previous
                && let Some(watcher) = old.watcher()
            {
                registry.unregister(&watcher);
            }
            match job.watcher() {
                Some(watcher) => registry.register(watcher),
                None => registry.invalidate(),
            }
            previous
        };
        tracing::info!(
            job = job.name(),
            replaced = previous.is_some(),
            "Job configured"
        );
        previous
    }

    pub fn remove(&self, registry: &WatcherRegistry, name: &str) -> Option<Arc<Job>> {
        let removed = {
            let mut jobs = self.write();
            let removed = jobs.remove(name);
            if let Some(job) = &removed {
                match job.watcher() {
                    Some(watcher) => {
                        registry.unregister(&watcher);
                    },
                    None => registry.invalidate(),
                }
            }
            removed
        };
        if removed.is_some() {
            tracing::info!(job = name, "Job removed");
        }
        removed
    }

    /// Returns false if no job has this name.
    pub fn set_enabled(&self, registry: &WatcherRegistry, name: &str, enabled: bool) -> bool {
        let Some(job) = self.get(name) else {
            return false;
        };
        job.set_enabled(enabled);
        registry.invalidate();
        tracing::info!(job = name, enabled, "Job toggled");
        true
    }

    /// Number of jobs that carry a watcher. Does not touch the registry.
    pub fn watching(&self) -> usize {
        self.read()
            .values()
            .filter(|job| job.watcher.is_some())
            .count()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Job>> {
        self.read().get(name).cloned()
    }

    pub fn summaries(&self) -> Vec<JobSummary> {
        self.read().values().map(|j| j.summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<Job>>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Arc<Job>>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OwnerSource for JobCatalog {
    fn list_active_owners(&self) -> Option<Vec<Arc<dyn WatcherHost>>> {
        if !self.is_ready() {
            return None;
        }
        Some(
            self.read()
                .values()
                .map(|job| Arc::clone(job) as Arc<dyn WatcherHost>)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use branchwatch_core::Dispatcher;

    use super::*;

    const REPO: &str = "https://example.com/org/repo";

    fn spec(uri: &str, branches: &str) -> TargetSpec {
        TargetSpec {
            uri: uri.to_string(),
            branches: branches.to_string(),
        }
    }

    struct Fixture {
        catalog: Arc<JobCatalog>,
        registry: Arc<WatcherRegistry>,
        triggers: Arc<TriggerStore>,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(JobCatalog::new());
        let registry = Arc::new(WatcherRegistry::with_source(
            Arc::clone(&catalog) as Arc<dyn OwnerSource>
        ));
        catalog.mark_ready(&registry);
        Fixture {
            catalog,
            registry,
            triggers: Arc::new(TriggerStore::new()),
        }
    }

    impl Fixture {
        fn add(&self, name: &str, targets: &[TargetSpec]) -> Arc<Job> {
            let job = Job::new(name, true, targets, Arc::clone(&self.triggers));
            self.catalog.upsert(&self.registry, Arc::clone(&job));
            job
        }

        fn notify(&self, uri: &str, branches: &[&str]) {
            Dispatcher::new(Arc::clone(&self.registry))
                .on_notification(uri, branches.iter().copied());
        }
    }

    #[test]
    fn job_without_targets_has_no_watcher() {
        let job = Job::new("empty", true, &[], Arc::new(TriggerStore::new()));
        assert!(job.watcher().is_none());
        assert!(job.summary().targets.is_empty());
    }

    #[test]
    fn job_name_is_kept_verbatim() {
        let job = Job::new("build", true, &[], Arc::new(TriggerStore::new()));
        assert_eq!(job.name(), "build");
    }

    #[test]
    fn disabled_job_refuses_schedule() {
        let job = Job::new("build", false, &[spec(REPO, "")], Arc::new(TriggerStore::new()));
        let err = job.schedule(Cause::new(REPO, "")).unwrap_err();
        assert_eq!(err, ScheduleError::NotTriggerable("build".to_string()));
    }

    #[test]
    fn matching_notification_records_trigger() {
        let f = fixture();
        f.add("build", &[spec(REPO, "master,develop")]);
        f.notify(REPO, &["develop"]);

        let recent = f.triggers.recent(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].job, "build");
        assert_eq!(recent[0].cause, Cause::new(REPO, "develop"));
    }

    #[test]
    fn unready_catalog_ignores_notifications() {
        let catalog = Arc::new(JobCatalog::new());
        let registry = Arc::new(WatcherRegistry::with_source(
            Arc::clone(&catalog) as Arc<dyn OwnerSource>
        ));
        let triggers = Arc::new(TriggerStore::new());
        let job = Job::new("build", true, &[spec(REPO, "")], Arc::clone(&triggers));
        catalog.upsert(&registry, job);

        let report = Dispatcher::new(Arc::clone(&registry)).on_notification(REPO, ["master"]);
        assert!(report.unavailable);
        assert!(triggers.recent(10).is_empty());

        catalog.mark_ready(&registry);
        Dispatcher::new(registry).on_notification(REPO, ["master"]);
        assert_eq!(triggers.recent(10).len(), 1);
    }

    #[test]
    fn replacing_a_job_swaps_its_watcher() {
        let f = fixture();
        let old = f.add("build", &[spec(REPO, "master")]);
        f.notify(REPO, &["master"]);
        assert_eq!(f.registry.len(), 1);

        let previous = f.catalog.upsert(
            &f.registry,
            Job::new("build", true, &[spec(REPO, "develop")], Arc::clone(&f.triggers)),
        );
        assert!(Arc::ptr_eq(&previous.unwrap(), &old));
        assert_eq!(f.registry.len(), 1);

        f.notify(REPO, &["master"]);
        f.notify(REPO, &["develop"]);
        let branches: Vec<_> = f
            .triggers
            .recent(10)
            .into_iter()
            .map(|r| r.cause.branch)
            .collect();
        assert_eq!(branches, vec!["develop", "master"]);
    }

    #[test]
    fn removed_job_is_no_longer_triggered() {
        let f = fixture();
        f.add("build", &[spec(REPO, "")]);
        assert!(f.catalog.remove(&f.registry, "build").is_some());
        assert!(f.catalog.remove(&f.registry, "build").is_none());
        assert!(f.registry.is_empty());

        f.notify(REPO, &["master"]);
        assert!(f.triggers.recent(10).is_empty());
    }

    #[test]
    fn disabled_job_is_skipped_but_others_run() {
        let f = fixture();
        f.add("off", &[spec(REPO, "")]);
        f.add("on", &[spec(REPO, "")]);
        assert!(f.catalog.set_enabled(&f.registry, "off", false));
        assert!(!f.catalog.set_enabled(&f.registry, "missing", false));

        f.notify(REPO, &["master"]);
        let recent = f.triggers.recent(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].job, "on");
    }

    #[test]
    fn summaries_are_sorted_by_name() {
        let f = fixture();
        f.add("zeta", &[spec(REPO, "master")]);
        f.add("alpha", &[spec(REPO, " develop ")]);
        let summaries = f.catalog.summaries();
        assert_eq!(summaries[0].name, "alpha");
        assert_eq!(summaries[0].targets, vec![spec(REPO, "develop")]);
        assert_eq!(summaries[1].name, "zeta");
    }

    #[test]
    fn toggling_invalidates_the_snapshot() {
        let f = fixture();
        f.add("build", &[spec(REPO, "")]);
        assert!(f.registry.snapshot().is_available());
        assert!(f.registry.is_cached());

        f.catalog.set_enabled(&f.registry, "build", false);
        assert!(!f.registry.is_cached());
    }

    #[test]
    fn watching_counts_jobs_with_targets_without_scanning() {
        let f = fixture();
        f.add("build", &[spec(REPO, "")]);
        f.add("idle", &[]);
        assert!(!f.registry.is_cached());
        assert_eq!(f.catalog.watching(), 1);
        assert!(!f.registry.is_cached());
    }

    #[test]
    fn concurrent_replacements_leave_one_watcher() {
        let f = Arc::new(fixture());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let f = Arc::clone(&f);
                thread::spawn(move || {
                    for _ in 0..500 {
                        f.add("build", &[spec(REPO, "")]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(f.catalog.len(), 1);
        assert_eq!(f.registry.len(), 1);
        let report = Dispatcher::new(Arc::clone(&f.registry)).on_notification(REPO, ["master"]);
        assert_eq!(report.watchers, 1);
        assert_eq!(report.scheduled, 1);
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn concurrent_replace_and_remove_stay_consistent() {
        let f = Arc::new(fixture());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let f = Arc::clone(&f);
                thread::spawn(move || {
                    for _ in 0..500 {
                        if i % 2 == 0 {
                            f.add("build", &[spec(REPO, "")]);
                        } else {
                            f.catalog.remove(&f.registry, "build");
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(f.registry.len(), f.catalog.len());
        let report = Dispatcher::new(Arc::clone(&f.registry)).on_notification(REPO, ["master"]);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.scheduled, f.catalog.len());
    }
}
