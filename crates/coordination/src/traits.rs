//! Coordination service client trait
//!
//! This module defines the Coordinator trait that the lock and the name trie
//! consume, plus the one-shot Watch primitive used for event-driven wakeup.
//! Implementations may talk to a remote ensemble or live in-process; upper
//! layers only ever see path strings.

use metaindex_core::CoordinationError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Result type alias for coordination operations
pub type CoordResult<T> = std::result::Result<T, CoordinationError>;

/// How a node is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Survives the creating session
    Persistent,
    /// Removed when the creating session closes
    Ephemeral,
    /// Persistent, with a unique monotonically increasing suffix
    PersistentSequential,
    /// Ephemeral, with a unique monotonically increasing suffix
    EphemeralSequential,
}

impl CreateMode {
    /// True if the node is bound to the creating session
    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    /// True if a sequence suffix is appended to the path
    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }
}

/// Notification delivered to a watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The watched path was created
    NodeCreated(String),
    /// The watched path was deleted
    NodeDeleted(String),
    /// The session that registered the watch closed
    SessionClosed,
}

struct WatchSlot {
    fired: Mutex<Option<WatchEvent>>,
    cond: Condvar,
}

/// Receiving half of a one-shot watch
///
/// A watch fires at most once. Waiting parks the thread; there is no polling.
pub struct Watch {
    slot: Arc<WatchSlot>,
}

/// Firing half of a one-shot watch, held by the coordinator
pub struct WatchTrigger {
    slot: Arc<WatchSlot>,
}

impl Watch {
    /// Create a connected watch/trigger pair
    pub fn pair() -> (Watch, WatchTrigger) {
        let slot = Arc::new(WatchSlot {
            fired: Mutex::new(None),
            cond: Condvar::new(),
        });
        (
            Watch {
                slot: Arc::clone(&slot),
            },
            WatchTrigger { slot },
        )
    }

    /// Block until the watch fires
    pub fn wait(&self) -> WatchEvent {
        let mut fired = self.slot.fired.lock();
        loop {
            if let Some(event) = fired.as_ref() {
                return event.clone();
            }
            self.slot.cond.wait(&mut fired);
        }
    }

    /// Block until the watch fires or `timeout` elapses
    pub fn wait_timeout(&self, timeout: Duration) -> Option<WatchEvent> {
        let mut fired = self.slot.fired.lock();
        if fired.is_none() {
            let _ = self.slot.cond.wait_for(&mut fired, timeout);
        }
        fired.clone()
    }

    /// The event, if the watch has already fired
    pub fn try_event(&self) -> Option<WatchEvent> {
        self.slot.fired.lock().clone()
    }
}

impl WatchTrigger {
    /// Deliver `event` and wake every waiter. Later fires are ignored.
    pub fn fire(&self, event: WatchEvent) {
        let mut fired = self.slot.fired.lock();
        if fired.is_none() {
            *fired = Some(event);
            self.slot.cond.notify_all();
        }
    }
}

/// Path-addressed client for a hierarchical coordination service
///
/// Semantics follow ZooKeeper:
/// - `create` requires the parent to exist and fails on an existing path
/// - sequential creates append a zero-padded, per-parent increasing suffix
/// - `delete` requires the node to have no children
/// - ephemeral nodes disappear when the creating session closes
///
/// Thread safety: all methods must be safe to call concurrently.
pub trait Coordinator: Send + Sync {
    /// Create a node and return its actual path (with suffix, if sequential)
    ///
    /// # Errors
    ///
    /// `NodeExists` if the path is taken, `NoNode` if the parent is missing.
    fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> CoordResult<String>;

    /// Check whether a node exists
    fn exists(&self, path: &str) -> CoordResult<bool>;

    /// Check whether a node exists and register a one-shot watch on it
    ///
    /// The watch fires when the node is created or deleted, or when the
    /// session closes.
    fn exists_watch(&self, path: &str) -> CoordResult<(bool, Watch)>;

    /// List child names (not full paths) of a node
    ///
    /// # Errors
    ///
    /// `NoNode` if the node does not exist.
    fn children(&self, path: &str) -> CoordResult<Vec<String>>;

    /// Delete a node
    ///
    /// # Errors
    ///
    /// `NoNode` if missing, `NotEmpty` if the node still has children.
    fn delete(&self, path: &str) -> CoordResult<()>;
}

impl<C: Coordinator + ?Sized> Coordinator for Arc<C> {
    fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> CoordResult<String> {
        (**self).create(path, data, mode)
    }

    fn exists(&self, path: &str) -> CoordResult<bool> {
        (**self).exists(path)
    }

    fn exists_watch(&self, path: &str) -> CoordResult<(bool, Watch)> {
        (**self).exists_watch(path)
    }

    fn children(&self, path: &str) -> CoordResult<Vec<String>> {
        (**self).children(path)
    }

    fn delete(&self, path: &str) -> CoordResult<()> {
        (**self).delete(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_create_mode_flags() {
        assert!(CreateMode::EphemeralSequential.is_ephemeral());
        assert!(CreateMode::EphemeralSequential.is_sequential());
        assert!(!CreateMode::Persistent.is_ephemeral());
        assert!(CreateMode::PersistentSequential.is_sequential());
        assert!(!CreateMode::Ephemeral.is_sequential());
    }

    #[test]
    fn test_watch_fires_once() {
        let (watch, trigger) = Watch::pair();
        assert!(watch.try_event().is_none());

        trigger.fire(WatchEvent::NodeDeleted("/a".into()));
        trigger.fire(WatchEvent::SessionClosed);

        assert_eq!(watch.wait(), WatchEvent::NodeDeleted("/a".into()));
    }

    #[test]
    fn test_watch_wakes_blocked_thread() {
        let (watch, trigger) = Watch::pair();
        let waiter = thread::spawn(move || watch.wait());

        thread::sleep(Duration::from_millis(20));
        trigger.fire(WatchEvent::NodeCreated("/b".into()));

        assert_eq!(waiter.join().unwrap(), WatchEvent::NodeCreated("/b".into()));
    }

    #[test]
    fn test_watch_wait_timeout_expires() {
        let (watch, _trigger) = Watch::pair();
        assert!(watch.wait_timeout(Duration::from_millis(10)).is_none());
    }
}
