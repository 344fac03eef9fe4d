//! metaindex - distributed, wildcard-searchable index over resource tags
//!
//! Resources carry `name=value` tags. Tag names live in a character trie
//! stored in a ZooKeeper-style coordination service, shared by every client
//! and searchable with `?` and `*` wildcards. Tag values live in one
//! compressed radix tree per name, serialized into a key-value store.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use metaindex::{IndexConfig, MemoryEnsemble, TagIndex};
//!
//! # fn main() -> metaindex::Result<()> {
//! let ensemble = MemoryEnsemble::new();
//! let index = TagIndex::open(Arc::new(ensemble.connect()), &IndexConfig::default())?;
//!
//! let mut ingestor = index.ingestor();
//! ingestor.ingest_line("cpu=intel-i7,mem=16gb")?;
//! ingestor.ingest_line("cpu=amd")?;
//! ingestor.finish()?;
//!
//! let hits = index.query("c?u=intel*")?;
//! assert_eq!(hits[0].node_ids, vec![0]);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `metaindex-core`: errors, configuration, path helpers, shared types
//! - `metaindex-coordination`: coordinator seam, in-process ensemble,
//!   distributed lock
//! - `metaindex-index`: name trie, value radix tree, store adapter,
//!   ingestion and queries

pub use metaindex_coordination::{
    Coordinator, CreateMode, DistributedLock, LockGuard, LockState, MemoryEnsemble,
    MemorySession,
};
pub use metaindex_core::{
    CoordinationError, Error, IndexConfig, NodeId, Result, Tag, TagValuePair, CONFIG_FILE_NAME,
};
pub use metaindex_index::{
    parse_line, DirIndexStore, IndexStore, IngestStats, Ingestor, MemoryIndexStore, NameTrie,
    QueryHit, TagIndex, TagQuery, ValueRadixTree,
};
