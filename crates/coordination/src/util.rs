//! Idempotent helpers over a Coordinator

use metaindex_core::path::{join_path, parent_path, ROOT};
use metaindex_core::CoordinationError;

use crate::traits::{CoordResult, Coordinator, CreateMode};

/// Create a persistent node unless it already exists.
///
/// Checks `exists` before `create` and treats a lost creation race
/// (`NodeExists`) as success. Returns true if this call created the node.
pub fn ensure_node<C: Coordinator + ?Sized>(coord: &C, path: &str) -> CoordResult<bool> {
    if coord.exists(path)? {
        return Ok(false);
    }
    match coord.create(path, &[], CreateMode::Persistent) {
        Ok(_) => Ok(true),
        Err(CoordinationError::NodeExists(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Create `path` and every missing ancestor as persistent nodes.
pub fn ensure_path<C: Coordinator + ?Sized>(coord: &C, path: &str) -> CoordResult<()> {
    let mut missing = Vec::new();
    let mut cursor = path;
    while cursor != ROOT && !coord.exists(cursor)? {
        missing.push(cursor);
        match parent_path(cursor) {
            Some(parent) => cursor = parent,
            None => break,
        }
    }
    for node in missing.into_iter().rev() {
        ensure_node(coord, node)?;
    }
    Ok(())
}

/// Delete `path` and its whole subtree, children first.
pub fn delete_recursive<C: Coordinator + ?Sized>(coord: &C, path: &str) -> CoordResult<()> {
    for child in coord.children(path)? {
        delete_recursive(coord, &join_path(path, &[child.as_str()]))?;
    }
    match coord.delete(path) {
        // An ephemeral child may vanish between listing and deletion.
        Err(CoordinationError::NoNode(_)) => Ok(()),
        other => other,
    }
}
