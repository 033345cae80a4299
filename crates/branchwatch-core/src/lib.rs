pub mod cause;
pub mod dispatcher;
pub mod error;
pub mod notification;
pub mod registry;
pub mod target;
pub mod watcher;

pub use cause::Cause;
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{ScheduleError, TargetError};
pub use notification::Notification;
pub use registry::{OwnerSource, Snapshot, WatcherHost, WatcherRegistry};
pub use target::{MatchTarget, TargetSpec, branch_match, validate_uri};
pub use watcher::{DispatchOutcome, Triggerable, Watcher, WatcherId};

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, Weak};

    use crate::cause::Cause;
    use crate::error::ScheduleError;
    use crate::registry::{OwnerSource, WatcherHost};
    use crate::target::MatchTarget;
    use crate::watcher::{Triggerable, Watcher};

    /// Owner that records every cause it is scheduled with. Behaviour can be
    /// switched to untriggerable, rejecting, or panicking.
    pub struct RecordingOwner {
        name: String,
        causes: Mutex<Vec<Cause>>,
        watcher: Mutex<Option<Arc<Watcher>>>,
        triggerable: AtomicBool,
        reject: AtomicBool,
        panic: AtomicBool,
    }

    impl RecordingOwner {
        pub fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                causes: Mutex::new(Vec::new()),
                watcher: Mutex::new(None),
                triggerable: AtomicBool::new(true),
                reject: AtomicBool::new(false),
                panic: AtomicBool::new(false),
            })
        }

        /// Build a watcher owned by this owner and return it.
        pub fn attach(self: &Arc<Self>, targets: Vec<MatchTarget>) -> Arc<Watcher> {
            let weak = Arc::downgrade(self);
            let weak: Weak<dyn Triggerable> = weak;
            let watcher = Arc::new(Watcher::new(targets, weak));
            *self.watcher.lock().unwrap() = Some(Arc::clone(&watcher));
            watcher
        }

        pub fn causes(&self) -> Vec<Cause> {
            self.causes.lock().unwrap().clone()
        }

        pub fn set_triggerable(&self, value: bool) {
            self.triggerable.store(value, Ordering::SeqCst);
        }

        pub fn set_reject(&self, value: bool) {
            self.reject.store(value, Ordering::SeqCst);
        }

        pub fn set_panic(&self, value: bool) {
            self.panic.store(value, Ordering::SeqCst);
        }
    }

    impl Triggerable for RecordingOwner {
        fn display_name(&self) -> String {
            self.name.clone()
        }

        fn is_triggerable(&self) -> bool {
            self.triggerable.load(Ordering::SeqCst)
        }

        fn schedule(&self, cause: Cause) -> Result<(), ScheduleError> {
            if self.panic.load(Ordering::SeqCst) {
                panic!("{} blew up while scheduling", self.name);
            }
            if self.reject.load(Ordering::SeqCst) {
                return Err(ScheduleError::Rejected {
                    owner: self.name.clone(),
                    reason: "queue is full".to_string(),
                });
            }
            self.causes.lock().unwrap().push(cause);
            Ok(())
        }
    }

    impl WatcherHost for RecordingOwner {
        fn watcher(&self) -> Option<Arc<Watcher>> {
            self.watcher.lock().unwrap().clone()
        }
    }

    /// Owner source backed by a plain list, not ready until told so.
    #[derive(Default)]
    pub struct StaticSource {
        ready: AtomicBool,
        hosts: Mutex<Vec<Arc<dyn WatcherHost>>>,
    }

    impl StaticSource {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn set_ready(&self, ready: bool) {
            self.ready.store(ready, Ordering::SeqCst);
        }

        pub fn push(&self, host: Arc<dyn WatcherHost>) {
            self.hosts.lock().unwrap().push(host);
        }
    }

    impl OwnerSource for StaticSource {
        fn list_active_owners(&self) -> Option<Vec<Arc<dyn WatcherHost>>> {
            if !self.ready.load(Ordering::SeqCst) {
                return None;
            }
            Some(self.hosts.lock().unwrap().clone())
        }
    }

    /// A watcher with a single blank-pattern target and no owner.
    pub fn detached_watcher() -> Arc<Watcher> {
        let owner: Weak<dyn Triggerable> = Weak::<RecordingOwner>::new();
        Arc::new(Watcher::new(
            vec![MatchTarget::new("https://example.com/detached", "")],
            owner,
        ))
    }
}
