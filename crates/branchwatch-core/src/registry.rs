use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::watcher::{Watcher, WatcherId};

/// Anything that may carry a watcher. Replaces runtime type inspection of
/// owners: an owner either hands out its watcher or it does not.
pub trait WatcherHost: Send + Sync {
    fn watcher(&self) -> Option<Arc<Watcher>>;
}

/// Enumerates the currently active owners during a registry scan.
pub trait OwnerSource: Send + Sync {
    /// `None` when the host environment is not ready to be enumerated.
    fn list_active_owners(&self) -> Option<Vec<Arc<dyn WatcherHost>>>;
}

/// Point-in-time list of watchers used for one broadcast.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Available(Arc<[Arc<Watcher>]>),
    /// The owner source could not be enumerated. Not the same as empty.
    Unavailable,
}

impl Snapshot {
    pub fn watchers(&self) -> Option<&[Arc<Watcher>]> {
        match self {
            Self::Available(watchers) => Some(watchers),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

struct CachedScan {
    generation: u64,
    watchers: Arc<[Arc<Watcher>]>,
}

/// The set of active watchers plus a lazily rebuilt snapshot of them.
///
/// Any change to the watcher population bumps a generation counter; the
/// cached snapshot is only served while its generation is current. The
/// counter is never bumped under the cache lock, so lifecycle callbacks can
/// invalidate from inside an owner source without deadlocking a scan.
pub struct WatcherRegistry {
    source: Option<Arc<dyn OwnerSource>>,
    active: Mutex<Vec<Arc<Watcher>>>,
    generation: AtomicU64,
    cache: Mutex<Option<CachedScan>>,
}

impl Default for WatcherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WatcherRegistry {
    /// A registry whose scans only see explicitly registered watchers.
    pub fn new() -> Self {
        Self {
            source: None,
            active: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
            cache: Mutex::new(None),
        }
    }

    /// A registry whose scans also enumerate the hosts of `source`.
    pub fn with_source(source: Arc<dyn OwnerSource>) -> Self {
        Self {
            source: Some(source),
            ..Self::new()
        }
    }

    /// Add a watcher to the active set. Registering the same watcher twice
    /// keeps a single entry.
    pub fn register(&self, watcher: Arc<Watcher>) {
        {
            let mut active = self.lock_active();
            if !active.iter().any(|w| w.id() == watcher.id()) {
                tracing::debug!(watcher = %watcher.id(), "Registering watcher");
                active.push(watcher);
            }
        }
        self.invalidate();
    }

    /// Remove a watcher from the active set. Returns whether it was present;
    /// removing an absent watcher changes nothing.
    pub fn unregister(&self, watcher: &Watcher) -> bool {
        let removed = {
            let mut active = self.lock_active();
            let before = active.len();
            active.retain(|w| w.id() != watcher.id());
            active.len() != before
        };
        if removed {
            tracing::debug!(watcher = %watcher.id(), "Unregistered watcher");
            self.invalidate();
        }
        removed
    }

    /// Drop the cached snapshot; the next `snapshot()` rescans.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of explicitly registered watchers.
    pub fn len(&self) -> usize {
        self.lock_active().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a snapshot is cached for the current generation.
    pub fn is_cached(&self) -> bool {
        let current = self.generation.load(Ordering::Acquire);
        self.lock_cache()
            .as_ref()
            .is_some_and(|c| c.generation == current)
    }

    /// Current watchers, rescanning if the population changed since the
    /// last scan. Only one scan runs at a time; concurrent callers wait for
    /// it and share its result.
    pub fn snapshot(&self) -> Snapshot {
        let mut cache = self.lock_cache();
        let generation = self.generation.load(Ordering::Acquire);
        if let Some(cached) = cache.as_ref()
            && cached.generation == generation
        {
            return Snapshot::Available(Arc::clone(&cached.watchers));
        }

        let Some(scanned) = self.scan() else {
            return Snapshot::Unavailable;
        };
        let watchers: Arc<[Arc<Watcher>]> = scanned.into();
        tracing::debug!(
            watchers = watchers.len(),
            generation,
            "Rebuilt watcher snapshot"
        );
        // An invalidation racing with this scan leaves a stale generation
        // behind, so the following call rescans.
        *cache = Some(CachedScan {
            generation,
            watchers: Arc::clone(&watchers),
        });
        Snapshot::Available(watchers)
    }

    fn scan(&self) -> Option<Vec<Arc<Watcher>>> {
        let mut scanned = self.lock_active().clone();
        if let Some(source) = &self.source {
            let owners = source.list_active_owners()?;
            let mut seen: HashSet<WatcherId> = scanned.iter().map(|w| w.id()).collect();
            for host in owners {
                if let Some(watcher) = host.watcher()
                    && seen.insert(watcher.id())
                {
                    scanned.push(watcher);
                }
            }
        }
        Some(scanned)
    }

    // Both guarded values stay structurally valid if a holder panics.
    fn lock_active(&self) -> MutexGuard<'_, Vec<Arc<Watcher>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<CachedScan>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
