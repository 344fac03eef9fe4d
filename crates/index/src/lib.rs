//! Index layer for metaindex
//!
//! Two trees with different consistency models:
//!
//! - [`NameTrie`]: distributed trie of tag names living in the coordination
//!   service, mutated and searched under lock-crabbing
//! - [`ValueRadixTree`]: per-name radix tree of tag values, built in-process
//!   and persisted as an opaque blob through an [`IndexStore`]
//!
//! On top of them, [`Ingestor`] turns `name=value` lines into both trees and
//! [`TagIndex`] answers `name=valuePattern` queries.
//!
//! ```text
//!   ingest line ──► NameTrie.add_tag_name ──► coordination service
//!        │
//!        └────────► ValueRadixTree.add_tag_value ──finish──► codec ──► IndexStore
//!
//!   query ──► NameTrie.search_tag_name ──► IndexStore.get ──► codec ──► find_all_matched_nodes
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod ingest;
pub mod name_trie;
pub mod query;
pub mod radix;
pub mod store;

pub use ingest::{parse_line, IngestStats, Ingestor};
pub use name_trie::{validate_tag_name, NameTrie, END_OF_WORD};
pub use query::{QueryHit, TagIndex, TagQuery};
pub use radix::ValueRadixTree;
pub use store::{get_tree, open_store, put_tree, DirIndexStore, IndexStore, MemoryIndexStore};
