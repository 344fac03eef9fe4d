//! Core types and errors for metaindex
//!
//! This crate defines the foundational pieces shared by every layer:
//! - Error: Error type hierarchy (lock misuse, coordination, store, patterns)
//! - IndexConfig: `metaindex.toml` configuration
//! - Path helpers for the hierarchical coordination namespace
//! - TagValuePair / NodeId: units returned by value queries

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod path;
pub mod types;

pub use config::{IndexConfig, CONFIG_FILE_NAME};
pub use error::{CoordinationError, Error, Result};
pub use types::{NodeId, Tag, TagValuePair};
