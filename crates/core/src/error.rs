//! Error types for metaindex
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for metaindex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a coordination service client
///
/// Variants mirror the conditions a hierarchical coordination service
/// (ZooKeeper-style) reports for path-addressed operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinationError {
    /// Create was called on a path that already exists
    #[error("node already exists: {0}")]
    NodeExists(String),

    /// The path (or the parent of a path being created) does not exist
    #[error("node does not exist: {0}")]
    NoNode(String),

    /// Delete was called on a node that still has children
    #[error("node has children: {0}")]
    NotEmpty(String),

    /// The client session is closed or expired
    #[error("session closed")]
    SessionClosed,

    /// A sequential node name could not be parsed
    #[error("malformed sequence node name: {0}")]
    BadSequence(String),
}

/// Error types for metaindex
#[derive(Debug, Error)]
pub enum Error {
    /// `acquire` was called on a lock that already holds a marker
    #[error("lock already held: {0}")]
    LockAlreadyHeld(String),

    /// `release` was called on a lock that holds no marker
    #[error("lock not held: {0}")]
    LockNotHeld(String),

    /// Coordination service failure (session loss, missing node, ...)
    #[error("coordination error: {0}")]
    Coordination(#[from] CoordinationError),

    /// Key-value store put/get/delete failure
    #[error("store error: {0}")]
    Store(String),

    /// Wildcard pattern placed or formed invalidly
    #[error("malformed pattern '{pattern}': {reason}")]
    MalformedPattern {
        /// The offending pattern
        pattern: String,
        /// Why it was rejected
        reason: String,
    },

    /// Invalid tag name or ingestion input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("codec error: {0}")]
    Codec(String),

    /// Configuration could not be read or is invalid
    #[error("config error: {0}")]
    Config(String),

    /// I/O error (directory-backed store, config files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a malformed pattern error
    pub fn malformed(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// True if this error originated in the coordination service
    pub fn is_coordination(&self) -> bool {
        matches!(self, Error::Coordination(_))
    }
}
