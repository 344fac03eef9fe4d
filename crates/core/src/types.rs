//! Shared value types
//!
//! - NodeId: zero-based identifier of a tagged resource
//! - Tag: a `name=value` pair attached to a resource
//! - TagValuePair: one tag value and the node ids carrying it

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a tagged resource (its zero-based input line number)
pub type NodeId = u32;

/// A `name=value` pair attached to a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Tag name, indexed in the name trie
    pub name: String,
    /// Tag value, indexed in the per-name radix tree
    pub value: String,
}

impl Tag {
    /// Create a new tag
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Query result unit: a tag value and the node ids that carry it
///
/// Always a fresh copy; mutating it never affects the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagValuePair {
    /// The complete tag value
    pub value: String,
    /// Node ids carrying this value, in insertion order
    pub node_ids: Vec<NodeId>,
}

impl TagValuePair {
    /// Create a new pair
    pub fn new(value: impl Into<String>, node_ids: Vec<NodeId>) -> Self {
        Self {
            value: value.into(),
            node_ids,
        }
    }
}
