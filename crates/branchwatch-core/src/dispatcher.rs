use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;

use crate::notification::Notification;
use crate::registry::{Snapshot, WatcherRegistry};
use crate::watcher::DispatchOutcome;

/// Tally of one broadcast. The transport layer does not surface it; it
/// exists for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Set when the registry could not produce a snapshot.
    pub unavailable: bool,
    pub watchers: usize,
    pub matched: usize,
    pub scheduled: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DispatchReport {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::NoMatch => {},
            DispatchOutcome::Scheduled(_) => {
                self.matched += 1;
                self.scheduled += 1;
            },
            DispatchOutcome::Skipped(_) => {
                self.matched += 1;
                self.skipped += 1;
            },
            DispatchOutcome::Failed { .. } => {
                self.matched += 1;
                self.failed += 1;
            },
        }
    }
}

/// Entry point for inbound push notifications: evaluates every watcher in
/// the registry's current snapshot and schedules the ones that match.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<WatcherRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<WatcherRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<WatcherRegistry> {
        &self.registry
    }

    pub fn on_notification<I, S>(&self, uri: &str, branches: I) -> DispatchReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.broadcast(&Notification::new(uri, branches))
    }

    /// Never fails: an unavailable registry skips the broadcast, and a
    /// watcher whose owner errors or panics does not stop the others.
    pub fn broadcast(&self, notification: &Notification) -> DispatchReport {
        let span = tracing::info_span!(
            "broadcast",
            uri = %notification.uri,
            branches = notification.branches.len()
        );
        let _enter = span.enter();

        let Snapshot::Available(watchers) = self.registry.snapshot() else {
            tracing::warn!("Ignoring push notification as the watcher source is not ready");
            return DispatchReport {
                unavailable: true,
                ..DispatchReport::default()
            };
        };

        let mut report = DispatchReport {
            watchers: watchers.len(),
            ..DispatchReport::default()
        };
        for watcher in watchers.iter() {
            match panic::catch_unwind(AssertUnwindSafe(|| watcher.dispatch(notification))) {
                Ok(outcome) => report.record(&outcome),
                Err(_) => {
                    tracing::error!(watcher = %watcher.id(), "Watcher dispatch panicked");
                    report.failed += 1;
                },
            }
        }

        tracing::debug!(
            watchers = report.watchers,
            matched = report.matched,
            scheduled = report.scheduled,
            "Push notification processed"
        );
        report
    }
}
