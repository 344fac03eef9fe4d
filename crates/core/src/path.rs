//! Path helpers for the coordination namespace
//!
//! Node identity in the coordination service is always a path string.
//! The trie exists only as a naming convention over these paths, so every
//! layer goes through the same join/split rules defined here.

use crate::error::CoordinationError;

/// Path separator
pub const SEPARATOR: char = '/';

/// Root of the coordination namespace
pub const ROOT: &str = "/";

/// Width of the zero-padded suffix appended to sequential nodes
pub const SEQUENCE_WIDTH: usize = 10;

/// Append child segments to `parent`.
///
/// `join_path("/", &["a"])` is `/a`, never `//a`.
pub fn join_path(parent: &str, children: &[&str]) -> String {
    let mut out = parent.to_string();
    for child in children {
        if !out.ends_with(SEPARATOR) {
            out.push(SEPARATOR);
        }
        out.push_str(child);
    }
    out
}

/// Parent of an absolute path. The root has no parent.
pub fn parent_path(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind(SEPARATOR) {
        Some(0) => Some(ROOT),
        Some(ix) => Some(&path[..ix]),
        None => None,
    }
}

/// Last segment of an absolute path.
pub fn base_name(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(ix) => &path[ix + 1..],
        None => path,
    }
}

/// Rebuild the tag name spelled by a trie node path below `root`.
///
/// `/tag-names/c/p/u` under root `/tag-names` spells `cpu`.
pub fn name_from_path(root: &str, path: &str) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .split(SEPARATOR)
        .collect()
}

/// Validate an absolute coordination path.
pub fn validate_path(path: &str) -> bool {
    if path == ROOT {
        return true;
    }
    path.starts_with(SEPARATOR)
        && !path.ends_with(SEPARATOR)
        && !path.contains("//")
}

/// Format the sequential suffix for a node, e.g. `0000000042`.
pub fn format_sequence(seq: u64) -> String {
    format!("{:0width$}", seq, width = SEQUENCE_WIDTH)
}

/// Parse the sequence number from a sequential node name or path.
///
/// The sequence is the text after the last `-`, e.g. `lock-0000000042`.
pub fn parse_sequence(name: &str) -> Result<u64, CoordinationError> {
    let name = base_name(name);
    name.rsplit_once('-')
        .and_then(|(_, digits)| digits.parse::<u64>().ok())
        .ok_or_else(|| CoordinationError::BadSequence(name.to_string()))
}
