//! Distributed lock on sequential ephemeral markers
//!
//! Classic coordination-service queueing lock:
//!
//! ```text
//! 1. create <root>/lock/lock-NNNNNNNNNN  (ephemeral + sequential)
//! 2. list <root>/lock
//! 3. lowest sequence is ours            -> held
//! 4. else exists-watch the next-lower marker
//! 5. marker gone                        -> goto 2
//!    marker present                     -> park until the watch fires, goto 2
//! ```
//!
//! Grants are FIFO by sequence number. A crashed client's marker is
//! ephemeral, so its queue position disappears with its session. Each waiter
//! watches only its immediate predecessor, so a release wakes one waiter.
//!
//! ## State machine
//!
//! ```text
//! Unlocked --acquire--> Pending --lowest seq--> Held --release--> Released
//!     ^                    |                                          |
//!     +------ error -------+                                          |
//!                                   acquire (reuse) <-----------------+
//! ```

use metaindex_core::path::{format_sequence, join_path, parse_sequence};
use metaindex_core::{CoordinationError, Error, Result};

use crate::traits::{Coordinator, CreateMode};
use crate::util::ensure_node;

/// Name of the reserved child holding lock markers
pub const LOCK_NODE: &str = "lock";

/// Prefix of each sequential lock marker
pub const LOCK_PREFIX: &str = "lock-";

/// Lifecycle of a DistributedLock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Never acquired
    Unlocked,
    /// Marker created, waiting for predecessors
    Pending,
    /// Marker has the lowest sequence number
    Held,
    /// Marker deleted after being held
    Released,
}

/// Mutual exclusion on one coordination path
pub struct DistributedLock<'a, C: Coordinator + ?Sized> {
    coord: &'a C,
    root: String,
    lock_dir: String,
    path: Option<String>,
    state: LockState,
}

impl<'a, C: Coordinator + ?Sized> DistributedLock<'a, C> {
    /// Create a lock rooted at `root`, ensuring `<root>/lock` exists.
    ///
    /// # Errors
    ///
    /// Returns a coordination error if `root` does not exist.
    pub fn new(coord: &'a C, root: &str) -> Result<Self> {
        let lock_dir = join_path(root, &[LOCK_NODE]);
        ensure_node(coord, &lock_dir)?;
        Ok(Self {
            coord,
            root: root.to_string(),
            lock_dir,
            path: None,
            state: LockState::Unlocked,
        })
    }

    /// The path this lock guards
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Full path of our marker while pending or held
    pub fn marker(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Current state
    pub fn state(&self) -> LockState {
        self.state
    }

    /// True while the lock is held
    pub fn is_held(&self) -> bool {
        self.state == LockState::Held
    }

    /// Acquire the lock, blocking until every earlier marker is gone.
    ///
    /// On failure after the marker was created, the marker is deleted before
    /// the error is returned, so a failed acquire never stays queued.
    ///
    /// # Errors
    ///
    /// `LockAlreadyHeld` if this instance already owns a marker; a
    /// coordination error if the service fails.
    pub fn acquire(&mut self) -> Result<()> {
        if self.path.is_some() {
            return Err(Error::LockAlreadyHeld(self.root.clone()));
        }

        let prefix = join_path(&self.lock_dir, &[LOCK_PREFIX]);
        let marker = self
            .coord
            .create(&prefix, &[], CreateMode::EphemeralSequential)?;
        self.path = Some(marker.clone());
        self.state = LockState::Pending;

        match self.wait_for_turn(&marker) {
            Ok(()) => {
                self.state = LockState::Held;
                tracing::trace!(root = %self.root, marker = %marker, "lock acquired");
                Ok(())
            }
            Err(e) => {
                self.abandon(&marker);
                Err(e)
            }
        }
    }

    fn wait_for_turn(&self, marker: &str) -> Result<()> {
        let ours = parse_sequence(marker)?;
        loop {
            let mut predecessor: Option<u64> = None;
            for child in self.coord.children(&self.lock_dir)? {
                let seq = parse_sequence(&child)?;
                if seq < ours && predecessor.map_or(true, |p| seq > p) {
                    predecessor = Some(seq);
                }
            }

            let Some(prev) = predecessor else {
                return Ok(());
            };

            let prev_name = format!("{}{}", LOCK_PREFIX, format_sequence(prev));
            let prev_path = join_path(&self.lock_dir, &[prev_name.as_str()]);
            let (exists, watch) = self.coord.exists_watch(&prev_path)?;
            if exists {
                tracing::trace!(root = %self.root, waiting_on = %prev_path, "lock queued");
                watch.wait();
            }
        }
    }

    fn abandon(&mut self, marker: &str) {
        match self.coord.delete(marker) {
            Ok(()) | Err(CoordinationError::NoNode(_)) => {}
            Err(e) => {
                tracing::warn!(marker = %marker, error = %e, "failed to remove abandoned lock marker")
            }
        }
        self.path = None;
        self.state = LockState::Unlocked;
    }

    /// Release the lock by deleting our marker.
    ///
    /// # Errors
    ///
    /// `LockNotHeld` if no marker is owned; a coordination error if the
    /// delete fails (the marker is then still considered owned).
    pub fn release(&mut self) -> Result<()> {
        let Some(marker) = self.path.as_deref() else {
            return Err(Error::LockNotHeld(self.root.clone()));
        };
        self.coord.delete(marker)?;
        tracing::trace!(root = %self.root, marker = %marker, "lock released");
        self.path = None;
        self.state = LockState::Released;
        Ok(())
    }
}

/// Scoped ownership of a held DistributedLock
///
/// Dropping a guard releases its lock, so every return path of the owning
/// frame (including `?` early returns) gives the lock back. Use
/// [`LockGuard::release`] where the release error must be surfaced.
pub struct LockGuard<'a, C: Coordinator + ?Sized> {
    lock: DistributedLock<'a, C>,
}

impl<'a, C: Coordinator + ?Sized> LockGuard<'a, C> {
    /// Create and acquire a lock on `root`
    pub fn acquire(coord: &'a C, root: &str) -> Result<Self> {
        let mut lock = DistributedLock::new(coord, root)?;
        lock.acquire()?;
        Ok(Self { lock })
    }

    /// The guarded path
    pub fn root(&self) -> &str {
        self.lock.root()
    }

    /// Release now, surfacing any error
    pub fn release(mut self) -> Result<()> {
        self.lock.release()
    }
}

impl<C: Coordinator + ?Sized> Drop for LockGuard<'_, C> {
    fn drop(&mut self) {
        if self.lock.is_held() {
            if let Err(e) = self.lock.release() {
                tracing::warn!(root = %self.lock.root(), error = %e, "lock release on drop failed");
            }
        }
    }
}
