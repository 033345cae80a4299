use std::fmt;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cause::Cause;
use crate::error::ScheduleError;
use crate::notification::Notification;
use crate::target::MatchTarget;

static NEXT_WATCHER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a watcher, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WatcherId(u64);

impl WatcherId {
    fn next() -> Self {
        Self(NEXT_WATCHER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watcher-{}", self.0)
    }
}

/// An action that can be started because of a push notification.
pub trait Triggerable: Send + Sync {
    /// Name used in log lines.
    fn display_name(&self) -> String;

    /// Whether the action can accept a scheduled run right now.
    fn is_triggerable(&self) -> bool {
        true
    }

    fn schedule(&self, cause: Cause) -> Result<(), ScheduleError>;
}

/// What happened when a watcher saw a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    NoMatch,
    Scheduled(Cause),
    /// Matched, but the owner was gone or not triggerable.
    Skipped(Cause),
    /// Matched, but the owner's scheduler returned an error.
    Failed { cause: Cause, error: ScheduleError },
}

impl DispatchOutcome {
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            Self::NoMatch => None,
            Self::Scheduled(cause) | Self::Skipped(cause) | Self::Failed { cause, .. } => Some(cause),
        }
    }
}

/// Ordered list of match targets attached to one triggerable owner.
///
/// The owner owns the watcher; the watcher only holds a weak handle back,
/// so a dropped owner simply stops being triggerable.
pub struct Watcher {
    id: WatcherId,
    targets: Vec<MatchTarget>,
    owner: Weak<dyn Triggerable>,
}

impl Watcher {
    pub fn new(targets: Vec<MatchTarget>, owner: Weak<dyn Triggerable>) -> Self {
        Self {
            id: WatcherId::next(),
            targets,
            owner,
        }
    }

    pub fn id(&self) -> WatcherId {
        self.id
    }

    pub fn targets(&self) -> &[MatchTarget] {
        &self.targets
    }

    /// First target that matches wins; later targets are not consulted.
    pub fn evaluate(&self, notification: &Notification) -> Option<Cause> {
        self.targets.iter().find_map(|t| t.matches(notification))
    }

    /// Evaluate and, on a match, schedule the owner exactly once.
    pub fn dispatch(&self, notification: &Notification) -> DispatchOutcome {
        let Some(cause) = self.evaluate(notification) else {
            return DispatchOutcome::NoMatch;
        };

        let Some(owner) = self.owner.upgrade() else {
            tracing::warn!(
                watcher = %self.id,
                uri = %cause.uri,
                branch = cause.branch_for_display(),
                "Push notification matches a watcher whose owner no longer exists"
            );
            return DispatchOutcome::Skipped(cause);
        };

        let name = owner.display_name();
        if !owner.is_triggerable() {
            tracing::warn!(
                owner = %name,
                uri = %cause.uri,
                branch = cause.branch_for_display(),
                "Push notification matches {name}, but it is not triggerable"
            );
            return DispatchOutcome::Skipped(cause);
        }

        match owner.schedule(cause.clone()) {
            Ok(()) => {
                tracing::info!(
                    owner = %name,
                    uri = %cause.uri,
                    branch = cause.branch_for_display(),
                    "Scheduled {name}"
                );
                DispatchOutcome::Scheduled(cause)
            },
            Err(ScheduleError::NotTriggerable(_)) => {
                tracing::warn!(
                    owner = %name,
                    uri = %cause.uri,
                    branch = cause.branch_for_display(),
                    "{name} stopped being triggerable before it could be scheduled"
                );
                DispatchOutcome::Skipped(cause)
            },
            Err(error) => {
                tracing::warn!(owner = %name, %error, "Failed to schedule {name}");
                DispatchOutcome::Failed { cause, error }
            },
        }
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id)
            .field("targets", &self.targets)
            .field("owner_alive", &(self.owner.strong_count() > 0))
            .finish()
    }
}
