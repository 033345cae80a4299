use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use branchwatch_core::Cause;

/// Default maximum number of triggers kept before the oldest are evicted.
const DEFAULT_MAX_STORED_TRIGGERS: usize = 500;

/// Default broadcast channel capacity for trigger fan-out.
const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// A job run requested because a push notification matched its watcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerRecord {
    pub id: String,
    pub job: String,
    pub cause: Cause,
    pub description: String,
    pub timestamp: String,
}

impl TriggerRecord {
    pub fn new(job: &str, cause: Cause) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job: job.to_string(),
            description: cause.short_description(),
            cause,
            timestamp: timestamp_now(),
        }
    }
}

/// Aggregate statistics about the trigger store.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerStoreStats {
    pub total_stored: usize,
    pub total_recorded: u64,
}

struct Inner {
    records: VecDeque<TriggerRecord>,
    total_recorded: u64,
}

/// In-memory, bounded trigger log with broadcast fan-out. This is where the
/// server hands triggered runs to whatever executes them: executors
/// subscribe to the stream.
pub struct TriggerStore {
    inner: Mutex<Inner>,
    broadcast_tx: broadcast::Sender<TriggerRecord>,
    max_stored_triggers: usize,
}

impl Default for TriggerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_STORED_TRIGGERS, DEFAULT_BROADCAST_CAPACITY)
    }

    /// Create a TriggerStore with configurable capacity limits.
    pub fn with_capacity(max_stored_triggers: usize, broadcast_capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(broadcast_capacity);
        Self {
            inner: Mutex::new(Inner {
                records: VecDeque::new(),
                total_recorded: 0,
            }),
            broadcast_tx,
            max_stored_triggers,
        }
    }

    /// Store a record, evicting the oldest at capacity, and broadcast it.
    pub fn record(&self, record: TriggerRecord) {
        // No subscribers is fine; the record is still kept.
        let _ = self.broadcast_tx.send(record.clone());
        let mut inner = self.lock();
        inner.records.push_back(record);
        inner.total_recorded += 1;
        while inner.records.len() > self.max_stored_triggers {
            inner.records.pop_front();
        }
    }

    /// The most recent `count` records, newest first.
    pub fn recent(&self, count: usize) -> Vec<TriggerRecord> {
        self.lock()
            .records
            .iter()
            .rev()
            .take(count)
            .cloned()
            .collect()
    }

    /// Recent records for one job, newest first.
    pub fn recent_for_job(&self, job: &str, count: usize) -> Vec<TriggerRecord> {
        self.lock()
            .records
            .iter()
            .rev()
            .filter(|r| r.job == job)
            .take(count)
            .cloned()
            .collect()
    }

    /// Subscribe to the broadcast channel for new triggers.
    pub fn subscribe(&self) -> broadcast::Receiver<TriggerRecord> {
        self.broadcast_tx.subscribe()
    }

    pub fn stats(&self) -> TriggerStoreStats {
        let inner = self.lock();
        TriggerStoreStats {
            total_stored: inner.records.len(),
            total_recorded: inner.total_recorded,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Unix epoch seconds with a Z suffix.
fn timestamp_now() -> String {
    let dur = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}Z", dur.as_secs())
}
