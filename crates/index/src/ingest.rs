//! Batch ingestion of `name=value` lines
//!
//! One line describes one resource; its zero-based line number is the
//! resource's node id:
//!
//! ```text
//! cpu=intel,mem=16gb      <- node 0
//! cpu=amd                 <- node 1
//!                         <- node 2 (no tags)
//! cpu=intel-i7,disk=ssd   <- node 3
//! ```
//!
//! Names go to the shared [`NameTrie`] as soon as they are first seen.
//! Values accumulate in per-name radix trees in memory and reach the store
//! only on [`Ingestor::finish`].

use metaindex_coordination::Coordinator;
use metaindex_core::{Error, NodeId, Result, Tag};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;

use crate::name_trie::{validate_tag_name, NameTrie};
use crate::radix::ValueRadixTree;
use crate::store::{put_tree, IndexStore};

/// Parse one input line into its tags.
///
/// Pairs are separated by `,` and split at the first `=`. Whitespace around
/// pairs and names is ignored; empty pairs are skipped, so a blank line
/// yields no tags.
///
/// # Errors
///
/// `InvalidInput` naming `line_no` for a pair without `=` or an unusable
/// tag name.
pub fn parse_line(line_no: NodeId, line: &str) -> Result<Vec<Tag>> {
    let mut tags = Vec::new();
    for pair in line.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let Some((name, value)) = pair.split_once('=') else {
            return Err(Error::InvalidInput(format!(
                "line {}: expected name=value, got '{}'",
                line_no, pair
            )));
        };
        let name = name.trim();
        validate_tag_name(name)
            .map_err(|e| Error::InvalidInput(format!("line {}: {}", line_no, e)))?;
        tags.push(Tag::new(name, value.trim()));
    }
    Ok(tags)
}

/// Counters reported by [`Ingestor::finish`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines consumed, blank ones included
    pub lines: usize,
    /// `name=value` pairs indexed
    pub pairs: usize,
    /// Distinct tag names whose tree was written
    pub tag_names: usize,
}

/// Builds value trees for one batch of lines
pub struct Ingestor<'a, C: Coordinator + ?Sized, S: IndexStore + ?Sized> {
    trie: &'a NameTrie<C>,
    store: &'a S,
    trees: BTreeMap<String, ValueRadixTree>,
    next_node: NodeId,
    pairs: usize,
}

impl<'a, C: Coordinator + ?Sized, S: IndexStore + ?Sized> Ingestor<'a, C, S> {
    /// Start a batch; node ids begin at 0.
    pub fn new(trie: &'a NameTrie<C>, store: &'a S) -> Self {
        Self {
            trie,
            store,
            trees: BTreeMap::new(),
            next_node: 0,
            pairs: 0,
        }
    }

    /// Node id the next line will get
    pub fn next_node(&self) -> NodeId {
        self.next_node
    }

    /// Index one line and return its node id.
    ///
    /// New names are registered in the trie before any value is recorded, so
    /// a line that fails (to parse, or to reach the trie) is rejected whole:
    /// it leaves no values behind and does not consume a node id.
    pub fn ingest_line(&mut self, line: &str) -> Result<NodeId> {
        let node_id = self.next_node;
        let tags = parse_line(node_id, line)?;
        let next = node_id
            .checked_add(1)
            .ok_or_else(|| Error::InvalidInput("node id space exhausted".to_string()))?;

        let unseen: BTreeSet<&str> = tags
            .iter()
            .map(|tag| tag.name.as_str())
            .filter(|name| !self.trees.contains_key(*name))
            .collect();
        for name in unseen {
            self.trie.add_tag_name(name)?;
        }

        for tag in &tags {
            self.trees
                .entry(tag.name.clone())
                .or_default()
                .add_tag_value(&tag.value, node_id);
        }

        self.pairs += tags.len();
        self.next_node = next;
        Ok(node_id)
    }

    /// Index every line of `reader`; returns the number of lines read.
    pub fn ingest_reader<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        let mut count = 0;
        for line in reader.lines() {
            self.ingest_line(&line?)?;
            count += 1;
        }
        Ok(count)
    }

    /// Write every tree to the store, replacing earlier batches' trees for
    /// the same names.
    pub fn finish(self) -> Result<IngestStats> {
        for (name, tree) in &self.trees {
            put_tree(self.store, name, tree)?;
            tracing::debug!(tag_name = %name, values = tree.len(), "value tree stored");
        }

        let stats = IngestStats {
            lines: self.next_node as usize,
            pairs: self.pairs,
            tag_names: self.trees.len(),
        };
        tracing::info!(
            lines = stats.lines,
            pairs = stats.pairs,
            tag_names = stats.tag_names,
            "ingest batch flushed"
        );
        Ok(stats)
    }
}
