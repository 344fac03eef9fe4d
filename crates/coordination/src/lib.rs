//! Coordination layer for metaindex
//!
//! This crate provides:
//! - Coordinator: path-addressed client seam for a hierarchical coordination
//!   service (create, exists, exists-with-watch, children, delete)
//! - MemoryEnsemble / MemorySession: in-process coordination service with
//!   ephemeral and sequential nodes and one-shot watches
//! - DistributedLock / LockGuard: FIFO queueing lock on sequential ephemeral
//!   markers, with scoped release
//!
//! Blocking is native: a waiting lock parks the calling thread on a condition
//! variable until its watch fires.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lock;
pub mod memory;
pub mod traits;
pub mod util;

pub use lock::{DistributedLock, LockGuard, LockState, LOCK_NODE, LOCK_PREFIX};
pub use memory::{MemoryEnsemble, MemorySession, SessionId};
pub use traits::{CoordResult, Coordinator, CreateMode, Watch, WatchEvent, WatchTrigger};
pub use util::{delete_recursive, ensure_node, ensure_path};
