//! Radix tree of tag values
//!
//! One `ValueRadixTree` exists per tag name. It maps every value seen for
//! that name to the node ids carrying it. The tree is compressed: edges are
//! labeled with substrings, and sibling labels never share a first character.
//!
//! # Sibling lookup
//!
//! Edges are kept sorted by label. Because at most one sibling can share a
//! prefix with a key, that sibling is either the edge at the key's insertion
//! point or the one just before it. Lookup is therefore a binary search plus
//! at most two common-prefix comparisons; no node is ever scanned linearly.
//!
//! # Query grammar
//!
//! `find_all_matched_nodes` walks the pattern down the tree. When the
//! pattern ends on a stored value, that value alone is returned; when it
//! ends anywhere else (inside an edge label, or on a node that is only a
//! branch point) everything beneath is returned. A single trailing `*`
//! always returns the node and everything beneath it. `*` anywhere else is
//! rejected; `?` is an ordinary character here.

use metaindex_core::{Error, NodeId, Result, TagValuePair};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::codec;

/// Length in bytes of the longest common prefix of `a` and `b`.
///
/// Always lands on a UTF-8 character boundary of both strings.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map(|((ix, _), _)| ix)
        .unwrap_or_else(|| a.len().min(b.len()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Terminal {
    pub(crate) value: String,
    pub(crate) node_ids: Vec<NodeId>,
}

impl Terminal {
    fn to_pair(&self) -> TagValuePair {
        TagValuePair::new(self.value.clone(), self.node_ids.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Edge {
    pub(crate) label: String,
    pub(crate) node: RadixNode,
}

impl Edge {
    /// Split this edge after `at` bytes, pushing the remainder one level down.
    fn split(&mut self, at: usize) {
        let suffix = self.label.split_off(at);
        let child = std::mem::take(&mut self.node);
        self.node = RadixNode {
            edges: vec![Edge {
                label: suffix,
                node: child,
            }],
            terminal: None,
        };
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RadixNode {
    pub(crate) edges: Vec<Edge>,
    pub(crate) terminal: Option<Terminal>,
}

/// Where an insertion goes next from a given node
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Edge label fully matched
    Descend { edge: usize, consumed: usize },
    /// Edge label partially matched
    Split { edge: usize, at: usize },
    /// No edge shares a prefix
    Insert { at: usize },
}

impl RadixNode {
    fn leaf(value: &str, node_id: NodeId) -> Self {
        Self {
            edges: Vec::new(),
            terminal: Some(Terminal {
                value: value.to_string(),
                node_ids: vec![node_id],
            }),
        }
    }

    fn insertion_point(&self, key: &str) -> usize {
        self.edges.partition_point(|edge| edge.label.as_str() < key)
    }

    /// The (at most two) siblings that may share a prefix with a key
    /// inserted at `ix`.
    fn candidates(&self, ix: usize) -> Range<usize> {
        if self.edges.is_empty() {
            return 0..0;
        }
        ix.saturating_sub(1)..(ix + 1).min(self.edges.len())
    }

    fn locate(&self, rest: &str) -> Step {
        let ix = self.insertion_point(rest);
        for i in self.candidates(ix) {
            let label = &self.edges[i].label;
            let m = common_prefix_len(label, rest);
            if m == label.len() {
                return Step::Descend {
                    edge: i,
                    consumed: m,
                };
            }
            if m > 0 {
                return Step::Split { edge: i, at: m };
            }
        }
        Step::Insert { at: ix }
    }

    fn mark_terminal(&mut self, value: &str, node_id: NodeId) {
        let terminal = self.terminal.get_or_insert_with(Terminal::default);
        terminal.value = value.to_string();
        terminal.node_ids.push(node_id);
    }

    fn collect(&self, out: &mut Vec<TagValuePair>) {
        if let Some(terminal) = &self.terminal {
            out.push(terminal.to_pair());
        }
        for edge in &self.edges {
            edge.node.collect(out);
        }
    }

    fn count_terminals(&self) -> usize {
        usize::from(self.terminal.is_some())
            + self
                .edges
                .iter()
                .map(|edge| edge.node.count_terminals())
                .sum::<usize>()
    }

    fn check_invariants(&self) -> std::result::Result<(), String> {
        for (i, edge) in self.edges.iter().enumerate() {
            if edge.label.is_empty() {
                return Err("empty edge label".to_string());
            }
            if i > 0 {
                let prev = &self.edges[i - 1].label;
                if prev >= &edge.label {
                    return Err(format!("edges out of order: '{}' >= '{}'", prev, edge.label));
                }
                if common_prefix_len(prev, &edge.label) > 0 {
                    return Err(format!(
                        "sibling edges share a prefix: '{}' / '{}'",
                        prev, edge.label
                    ));
                }
            }
            edge.node.check_invariants()?;
        }
        Ok(())
    }
}

/// Radix tree mapping tag values to node-id lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRadixTree {
    pub(crate) root: RadixNode,
}

impl ValueRadixTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `node_id` carries `value`.
    ///
    /// Repeated values accumulate ids in insertion order.
    pub fn add_tag_value(&mut self, value: &str, node_id: NodeId) {
        let mut node = &mut self.root;
        let mut rest = value;
        loop {
            if rest.is_empty() {
                node.mark_terminal(value, node_id);
                return;
            }
            match node.locate(rest) {
                Step::Descend { edge, consumed } => {
                    rest = &rest[consumed..];
                    node = &mut node.edges[edge].node;
                }
                Step::Split { edge, at } => {
                    node.edges[edge].split(at);
                    rest = &rest[at..];
                    node = &mut node.edges[edge].node;
                }
                Step::Insert { at } => {
                    node.edges.insert(
                        at,
                        Edge {
                            label: rest.to_string(),
                            node: RadixNode::leaf(value, node_id),
                        },
                    );
                    return;
                }
            }
        }
    }

    /// Find values matching `pattern`.
    ///
    /// - `intel` returns only the value `intel`, since it is stored
    /// - `int` and `intel-i` return every value starting with them
    /// - `intel*` returns `intel` and every value starting with it
    ///
    /// Results come back in lexicographic order of value. No match is an
    /// empty vector.
    ///
    /// # Errors
    ///
    /// `MalformedPattern` if `*` appears anywhere but the last position.
    pub fn find_all_matched_nodes(&self, pattern: &str) -> Result<Vec<TagValuePair>> {
        let (needle, whole_subtree) = match pattern.strip_suffix('*') {
            Some(prefix) => (prefix, true),
            None => (pattern, false),
        };
        if needle.contains('*') {
            return Err(Error::malformed(
                pattern,
                "'*' is only allowed as the last character of a value pattern",
            ));
        }

        let mut out = Vec::new();
        let mut node = &self.root;
        let mut rest = needle;
        'descend: loop {
            if rest.is_empty() {
                match &node.terminal {
                    Some(terminal) if !whole_subtree => out.push(terminal.to_pair()),
                    _ => node.collect(&mut out),
                }
                return Ok(out);
            }

            let ix = node.insertion_point(rest);
            for i in node.candidates(ix) {
                let edge = &node.edges[i];
                let m = common_prefix_len(&edge.label, rest);
                if m == edge.label.len() {
                    node = &edge.node;
                    rest = &rest[m..];
                    continue 'descend;
                }
                if m == rest.len() {
                    // The label absorbs the rest of the needle.
                    edge.node.collect(&mut out);
                    return Ok(out);
                }
            }
            return Ok(out);
        }
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.root.count_terminals()
    }

    /// True if no value has been added
    pub fn is_empty(&self) -> bool {
        self.root.edges.is_empty() && self.root.terminal.is_none()
    }

    /// All values with their node ids, in lexicographic order
    pub fn values(&self) -> Vec<TagValuePair> {
        let mut out = Vec::new();
        self.root.collect(&mut out);
        out
    }

    /// Serialize the whole tree; see [`codec`] for the format.
    pub fn encode_to_bytes(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }

    /// Rebuild a tree from [`encode_to_bytes`](Self::encode_to_bytes) output.
    pub fn decode_from_bytes(bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes)
    }

    pub(crate) fn check_invariants(&self) -> std::result::Result<(), String> {
        self.root.check_invariants()
    }
}
