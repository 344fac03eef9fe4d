//! Distributed trie of tag names
//!
//! Each trie node is a coordination path; each edge is one character.
//! A name is present when its final node has an `eow` child:
//!
//! ```text
//! /tag-names
//! ├── lock/            (lock markers for the root)
//! └── c
//!     ├── lock/
//!     └── p
//!         ├── lock/
//!         ├── u
//!         │   └── eow   <- "cpu"
//!         └── a
//!             └── eow   <- "cpa"
//! ```
//!
//! `lock` and `eow` are multi-character, so they never collide with a
//! character edge. They are filtered out whenever children are enumerated.
//!
//! # Locking
//!
//! Every node carries its own [`DistributedLock`](metaindex_coordination::DistributedLock).
//! Insertion crabs: the child's lock is taken before the parent's is
//! released, so at most two locks are held at a time. Search crabs on
//! literals, releases early on `?`, and holds the parent across the fan-out
//! on `*`. Locks are only ever taken on strict descendants of a held node,
//! so there is no lock-order cycle between concurrent operations.

use metaindex_coordination::{
    delete_recursive, ensure_node, ensure_path, Coordinator, LockGuard, LOCK_NODE,
};
use metaindex_core::path::{join_path, name_from_path, validate_path, ROOT};
use metaindex_core::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Name of the child marking the end of a stored tag name
pub const END_OF_WORD: &str = "eow";

/// Characters a tag name may not contain
const FORBIDDEN_NAME_CHARS: [char; 5] = ['/', '*', '?', '=', ','];

/// Check that `name` can be stored in the trie.
///
/// # Errors
///
/// `InvalidInput` if the name is empty or contains a path separator, a
/// wildcard, `=` or `,`.
pub fn validate_tag_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("tag name must not be empty".to_string()));
    }
    if let Some(ch) = name.chars().find(|ch| FORBIDDEN_NAME_CHARS.contains(ch)) {
        return Err(Error::InvalidInput(format!(
            "tag name '{}' contains forbidden character '{}'",
            name, ch
        )));
    }
    Ok(())
}

fn is_reserved(child: &str) -> bool {
    child == LOCK_NODE || child == END_OF_WORD
}

/// Lock ownership of one search frame
///
/// A `*` frame recurses on its own node with the pattern advanced; that
/// inner frame runs under the outer frame's lock and must not release it.
enum NodeLock<'a, C: Coordinator + ?Sized> {
    Owned(LockGuard<'a, C>),
    Inherited,
}

impl<C: Coordinator + ?Sized> NodeLock<'_, C> {
    fn release(self) -> Result<()> {
        match self {
            NodeLock::Owned(guard) => guard.release(),
            NodeLock::Inherited => Ok(()),
        }
    }
}

/// Tag-name trie stored in a coordination service
pub struct NameTrie<C: Coordinator + ?Sized> {
    coord: Arc<C>,
    root: String,
}

impl<C: Coordinator + ?Sized> NameTrie<C> {
    /// Open the trie at `root`, creating the root path if needed.
    ///
    /// Safe to call concurrently from several clients.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if `root` is not an absolute path below `/`; a
    /// coordination error if the root cannot be created.
    pub fn open(coord: Arc<C>, root: &str) -> Result<Self> {
        if root == ROOT || !validate_path(root) {
            return Err(Error::InvalidInput(format!("invalid trie root '{}'", root)));
        }
        ensure_path(&*coord, root)?;
        Ok(Self {
            coord,
            root: root.to_string(),
        })
    }

    /// Coordination path of the trie root
    pub fn root(&self) -> &str {
        &self.root
    }

    /// The coordinator this trie talks to
    pub fn coordinator(&self) -> &Arc<C> {
        &self.coord
    }

    /// Child character edges of `path`, reserved children excluded
    fn trie_children(&self, path: &str) -> Result<Vec<String>> {
        let mut children = self.coord.children(path)?;
        children.retain(|child| !is_reserved(child));
        Ok(children)
    }

    fn lock(&self, path: &str) -> Result<LockGuard<'_, C>> {
        LockGuard::acquire(&*self.coord, path)
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Insert `name`, one node per character, under hand-over-hand locking.
    ///
    /// Inserting an existing name changes nothing. An insertion interrupted
    /// by an error leaves only persistent prefix nodes behind and can simply
    /// be retried.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an unusable name; a coordination error if the
    /// service fails (all locks taken so far are released).
    pub fn add_tag_name(&self, name: &str) -> Result<()> {
        validate_tag_name(name)?;

        let mut path = self.root.clone();
        let mut guard = self.lock(&path)?;
        let mut buf = [0u8; 4];
        for ch in name.chars() {
            let child = join_path(&path, &[&*ch.encode_utf8(&mut buf)]);
            ensure_node(&*self.coord, &child)?;
            let child_guard = self.lock(&child)?;
            guard.release()?;
            guard = child_guard;
            path = child;
        }

        let created = ensure_node(&*self.coord, &join_path(&path, &[END_OF_WORD]))?;
        guard.release()?;
        tracing::debug!(tag_name = %name, created, "tag name inserted");
        Ok(())
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Find every stored name matching `pattern`.
    ///
    /// `?` matches exactly one character and `*` matches any run of
    /// characters, including none. Both may appear anywhere. Results are
    /// unique and sorted.
    ///
    /// # Errors
    ///
    /// `MalformedPattern` for an empty pattern or one containing `/`; a
    /// coordination error aborts the search after releasing every lock the
    /// search holds.
    pub fn search_tag_name(&self, pattern: &str) -> Result<Vec<String>> {
        if pattern.is_empty() {
            return Err(Error::malformed(pattern, "name pattern must not be empty"));
        }
        if pattern.contains('/') {
            return Err(Error::malformed(pattern, "name pattern must not contain '/'"));
        }

        let chars: Vec<char> = pattern.chars().collect();
        let mut found = BTreeSet::new();
        let guard = self.lock(&self.root)?;
        self.search_from(&self.root, NodeLock::Owned(guard), &chars, &mut found)?;

        tracing::debug!(pattern = %pattern, matches = found.len(), "tag name search");
        Ok(found.into_iter().collect())
    }

    fn search_from(
        &self,
        path: &str,
        lock: NodeLock<'_, C>,
        pattern: &[char],
        found: &mut BTreeSet<String>,
    ) -> Result<()> {
        let Some((&head, tail)) = pattern.split_first() else {
            if self.coord.exists(&join_path(path, &[END_OF_WORD]))? {
                found.insert(name_from_path(&self.root, path));
            }
            return lock.release();
        };

        match head {
            '*' => {
                let children = self.trie_children(path)?;
                // Zero-width match, still under this frame's lock.
                self.search_from(path, NodeLock::Inherited, tail, found)?;
                for child in children {
                    let child_path = join_path(path, &[child.as_str()]);
                    let guard = self.lock(&child_path)?;
                    self.search_from(&child_path, NodeLock::Owned(guard), pattern, found)?;
                }
                lock.release()
            }
            '?' => {
                let children = self.trie_children(path)?;
                lock.release()?;
                for child in children {
                    let child_path = join_path(path, &[child.as_str()]);
                    let guard = self.lock(&child_path)?;
                    self.search_from(&child_path, NodeLock::Owned(guard), tail, found)?;
                }
                Ok(())
            }
            literal => {
                let mut buf = [0u8; 4];
                let child_path = join_path(path, &[&*literal.encode_utf8(&mut buf)]);
                if !self.coord.exists(&child_path)? {
                    return lock.release();
                }
                let guard = self.lock(&child_path)?;
                lock.release()?;
                self.search_from(&child_path, NodeLock::Owned(guard), tail, found)
            }
        }
    }

    /// Every stored name, sorted
    pub fn list_tag_names(&self) -> Result<Vec<String>> {
        self.search_tag_name("*")
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// Delete the whole trie and recreate an empty root.
    ///
    /// Not coordinated with concurrent inserts or searches; callers must
    /// quiesce other clients first.
    pub fn reset(&self) -> Result<()> {
        if self.coord.exists(&self.root)? {
            delete_recursive(&*self.coord, &self.root)?;
        }
        ensure_path(&*self.coord, &self.root)?;
        tracing::info!(root = %self.root, "tag name trie reset");
        Ok(())
    }
}
