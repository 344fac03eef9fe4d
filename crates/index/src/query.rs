//! `name=valuePattern` queries over both trees
//!
//! The name half may use `?` and `*` anywhere and is resolved against the
//! trie. The value half may end in one `*`; without it, a stored value
//! matches only itself and a partial value matches everything extending it.
//! It is resolved against each matched name's stored radix tree.

use metaindex_coordination::Coordinator;
use metaindex_core::{Error, IndexConfig, NodeId, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::ingest::Ingestor;
use crate::name_trie::NameTrie;
use crate::store::{get_tree, open_store, IndexStore};

/// A parsed `namePattern=valuePattern` query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagQuery {
    name_pattern: String,
    value_pattern: String,
}

impl TagQuery {
    /// Build a query from its two halves, validating both.
    ///
    /// # Errors
    ///
    /// `MalformedPattern` for an empty name pattern, a name pattern with
    /// `/`, or a value pattern with `*` before its last character.
    pub fn new(name_pattern: impl Into<String>, value_pattern: impl Into<String>) -> Result<Self> {
        let name_pattern = name_pattern.into();
        let value_pattern = value_pattern.into();
        if name_pattern.is_empty() {
            return Err(Error::malformed(name_pattern, "name pattern must not be empty"));
        }
        if name_pattern.contains('/') {
            return Err(Error::malformed(name_pattern, "name pattern must not contain '/'"));
        }
        let head = value_pattern.strip_suffix('*').unwrap_or(value_pattern.as_str());
        if head.contains('*') {
            return Err(Error::malformed(
                value_pattern,
                "'*' is only allowed as the last character of a value pattern",
            ));
        }
        Ok(Self {
            name_pattern,
            value_pattern,
        })
    }

    /// Parse `name=value`, splitting at the first `=`.
    pub fn parse(query: &str) -> Result<Self> {
        let Some((name, value)) = query.split_once('=') else {
            return Err(Error::malformed(query, "expected namePattern=valuePattern"));
        };
        Self::new(name.trim(), value.trim())
    }

    /// Wildcard pattern over tag names
    pub fn name_pattern(&self) -> &str {
        &self.name_pattern
    }

    /// Pattern over tag values, optionally ending in `*`
    pub fn value_pattern(&self) -> &str {
        &self.value_pattern
    }
}

impl FromStr for TagQuery {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TagQuery::parse(s)
    }
}

impl fmt::Display for TagQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name_pattern, self.value_pattern)
    }
}

/// One matching value of one matching tag name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHit {
    /// Tag name that matched the name pattern
    pub tag_name: String,
    /// Value that matched the value pattern
    pub value: String,
    /// Nodes carrying `tag_name=value`
    pub node_ids: Vec<NodeId>,
}

/// Name trie and value store wired together
pub struct TagIndex<C: Coordinator + ?Sized> {
    trie: NameTrie<C>,
    store: Box<dyn IndexStore>,
}

impl<C: Coordinator + ?Sized> TagIndex<C> {
    /// Combine an opened trie with a store
    pub fn new(trie: NameTrie<C>, store: Box<dyn IndexStore>) -> Self {
        Self { trie, store }
    }

    /// Open the trie and store described by `config`.
    pub fn open(coord: Arc<C>, config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        let trie = NameTrie::open(coord, &config.trie_root)?;
        let store = open_store(config)?;
        Ok(Self::new(trie, store))
    }

    /// The tag-name trie
    pub fn trie(&self) -> &NameTrie<C> {
        &self.trie
    }

    /// The value-tree store
    pub fn store(&self) -> &dyn IndexStore {
        &*self.store
    }

    /// Start an ingestion batch against this index
    pub fn ingestor(&self) -> Ingestor<'_, C, dyn IndexStore> {
        Ingestor::new(&self.trie, &*self.store)
    }

    /// Run `query`; hits are ordered by tag name, then by value.
    ///
    /// A name present in the trie whose tree was never stored (its batch did
    /// not finish) contributes nothing.
    pub fn search(&self, query: &TagQuery) -> Result<Vec<QueryHit>> {
        let mut hits = Vec::new();
        for tag_name in self.trie.search_tag_name(query.name_pattern())? {
            let Some(tree) = get_tree(&*self.store, &tag_name)? else {
                tracing::debug!(tag_name = %tag_name, "no value tree stored, skipping");
                continue;
            };
            for pair in tree.find_all_matched_nodes(query.value_pattern())? {
                hits.push(QueryHit {
                    tag_name: tag_name.clone(),
                    value: pair.value,
                    node_ids: pair.node_ids,
                });
            }
        }
        tracing::debug!(query = %query, hits = hits.len(), "tag query");
        Ok(hits)
    }

    /// Parse and run a `name=value` query string
    pub fn query(&self, query: &str) -> Result<Vec<QueryHit>> {
        self.search(&TagQuery::parse(query)?)
    }

    /// Wipe both the trie and the store.
    ///
    /// Administrative; not coordinated with other clients.
    pub fn reset(&self) -> Result<()> {
        self.trie.reset()?;
        self.store.delete_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{put_tree, MemoryIndexStore};
    use crate::radix::ValueRadixTree;
    use metaindex_coordination::{MemoryEnsemble, MemorySession};

    fn index() -> TagIndex<MemorySession> {
        let ensemble = MemoryEnsemble::new();
        TagIndex::open(Arc::new(ensemble.connect()), &IndexConfig::default()).unwrap()
    }

    fn hit(tag_name: &str, value: &str, node_ids: Vec<NodeId>) -> QueryHit {
        QueryHit {
            tag_name: tag_name.to_string(),
            value: value.to_string(),
            node_ids,
        }
    }

    // ========================================================================
    // TagQuery
    // ========================================================================

    #[test]
    fn test_parse_query() {
        let query = TagQuery::parse("cpu=intel*").unwrap();
        assert_eq!(query.name_pattern(), "cpu");
        assert_eq!(query.value_pattern(), "intel*");
        assert_eq!(query.to_string(), "cpu=intel*");

        let query: TagQuery = "c?u = a=b".parse().unwrap();
        assert_eq!(query.name_pattern(), "c?u");
        assert_eq!(query.value_pattern(), "a=b");
    }

    #[test]
    fn test_parse_query_errors() {
        for bad in ["cpu", "=intel", "c/u=intel", "cpu=in*tel"] {
            assert!(
                matches!(TagQuery::parse(bad), Err(Error::MalformedPattern { .. })),
                "query {:?}",
                bad
            );
        }
    }

    // ========================================================================
    // TagIndex
    // ========================================================================

    #[test]
    fn test_search_across_names() {
        let index = index();
        let mut ingestor = index.ingestor();
        ingestor.ingest_line("cpu=intel,cpu_vendor=intel").unwrap();
        ingestor.ingest_line("cpu=amd").unwrap();
        ingestor.ingest_line("cpu=intel-i7").unwrap();
        ingestor.finish().unwrap();

        assert_eq!(
            index.query("cpu=intel").unwrap(),
            vec![hit("cpu", "intel", vec![0])]
        );
        assert_eq!(
            index.query("cpu*=intel").unwrap(),
            vec![hit("cpu", "intel", vec![0]), hit("cpu_vendor", "intel", vec![0])]
        );
        assert_eq!(
            index.query("cpu=intel*").unwrap(),
            vec![hit("cpu", "intel", vec![0]), hit("cpu", "intel-i7", vec![2])]
        );
        assert!(index.query("gpu*=anything*").unwrap().is_empty());
    }

    #[test]
    fn test_search_skips_names_without_tree() {
        let index = index();
        index.trie().add_tag_name("orphan").unwrap();

        let mut tree = ValueRadixTree::new();
        tree.add_tag_value("x", 9);
        put_tree(index.store(), "other", &tree).unwrap();
        index.trie().add_tag_name("other").unwrap();

        assert_eq!(index.query("*=x").unwrap(), vec![hit("other", "x", vec![9])]);
    }

    #[test]
    fn test_search_surfaces_corrupt_tree() {
        let index = index();
        index.trie().add_tag_name("cpu").unwrap();
        index.store().put("cpu", b"garbage").unwrap();
        assert!(matches!(index.query("cpu=x"), Err(Error::Codec(_))));
    }

    #[test]
    fn test_reset_clears_names_and_trees() {
        let index = index();
        let mut ingestor = index.ingestor();
        ingestor.ingest_line("cpu=intel").unwrap();
        ingestor.finish().unwrap();

        index.reset().unwrap();
        assert!(index.trie().list_tag_names().unwrap().is_empty());
        assert!(index.store().get("cpu").unwrap().is_none());
        assert!(index.query("*=*").unwrap().is_empty());
    }

    #[test]
    fn test_new_with_explicit_store() {
        let ensemble = MemoryEnsemble::new();
        let trie = NameTrie::open(Arc::new(ensemble.connect()), "/names").unwrap();
        let index = TagIndex::new(trie, Box::new(MemoryIndexStore::new()));
        assert_eq!(index.trie().root(), "/names");
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let ensemble = MemoryEnsemble::new();
        let config = IndexConfig {
            trie_root: "/".to_string(),
            ..IndexConfig::default()
        };
        assert!(matches!(
            TagIndex::open(Arc::new(ensemble.connect()), &config),
            Err(Error::Config(_))
        ));
    }
}
