//! In-process coordination service
//!
//! `MemoryEnsemble` holds one shared node tree; each `MemorySession` is an
//! independent client of it. Sessions behave like separate processes talking
//! to the same ensemble:
//!
//! - ephemeral nodes belong to the session that created them and are removed
//!   when it closes (explicitly or on drop)
//! - sequential suffixes are allocated per parent, strictly increasing
//! - watches are one-shot and fire on create/delete of the watched path, or
//!   with `SessionClosed` when the registering session closes
//!
//! All state sits behind a single mutex, so every operation is linearizable.

use metaindex_core::path::{base_name, format_sequence, parent_path, validate_path, ROOT};
use metaindex_core::CoordinationError;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::traits::{CoordResult, Coordinator, CreateMode, Watch, WatchEvent, WatchTrigger};

/// Identifier of a client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
struct ZNode {
    data: Vec<u8>,
    owner: Option<SessionId>,
    children: BTreeSet<String>,
    next_sequence: u64,
}

struct WatchEntry {
    session: SessionId,
    trigger: WatchTrigger,
}

struct Tree {
    nodes: HashMap<String, ZNode>,
    watches: HashMap<String, Vec<WatchEntry>>,
    closed: HashSet<SessionId>,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT.to_string(), ZNode::default());
        Self {
            nodes,
            watches: HashMap::new(),
            closed: HashSet::new(),
        }
    }

    fn check_open(&self, session: SessionId) -> CoordResult<()> {
        if self.closed.contains(&session) {
            return Err(CoordinationError::SessionClosed);
        }
        Ok(())
    }

    fn fire(&mut self, path: &str, event: WatchEvent) {
        if let Some(entries) = self.watches.remove(path) {
            for entry in entries {
                entry.trigger.fire(event.clone());
            }
        }
    }

    fn create(
        &mut self,
        session: SessionId,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> CoordResult<String> {
        // A sequential path may end in a prefix such as "lock-"; only its
        // directory part has to be well formed.
        if !mode.is_sequential() && !validate_path(path) {
            return Err(CoordinationError::NoNode(path.to_string()));
        }
        if path == ROOT {
            return Err(CoordinationError::NodeExists(path.to_string()));
        }
        let parent = parent_path(path)
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))?
            .to_string();
        if !validate_path(&parent) {
            return Err(CoordinationError::NoNode(parent));
        }

        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or_else(|| CoordinationError::NoNode(parent.clone()))?;

        let actual = if mode.is_sequential() {
            let seq = parent_node.next_sequence;
            parent_node.next_sequence += 1;
            format!("{}{}", path, format_sequence(seq))
        } else {
            path.to_string()
        };

        if self.nodes.contains_key(&actual) {
            return Err(CoordinationError::NodeExists(actual));
        }

        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.insert(base_name(&actual).to_string());
        }
        self.nodes.insert(
            actual.clone(),
            ZNode {
                data: data.to_vec(),
                owner: mode.is_ephemeral().then_some(session),
                ..ZNode::default()
            },
        );
        self.fire(&actual, WatchEvent::NodeCreated(actual.clone()));
        Ok(actual)
    }

    fn delete(&mut self, path: &str) -> CoordResult<()> {
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))?;
        if path == ROOT || !node.children.is_empty() {
            return Err(CoordinationError::NotEmpty(path.to_string()));
        }

        self.nodes.remove(path);
        if let Some(parent) = parent_path(path) {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.remove(base_name(path));
            }
        }
        self.fire(path, WatchEvent::NodeDeleted(path.to_string()));
        Ok(())
    }

    fn close_session(&mut self, session: SessionId) -> Vec<String> {
        if !self.closed.insert(session) {
            return Vec::new();
        }

        let mut owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.owner == Some(session))
            .map(|(path, _)| path.clone())
            .collect();
        // Deepest first so a parent is never deleted before its children.
        owned.sort_by_key(|path| std::cmp::Reverse(path.len()));

        let mut removed = Vec::with_capacity(owned.len());
        for path in owned {
            if self.delete(&path).is_ok() {
                removed.push(path);
            }
        }

        for entries in self.watches.values_mut() {
            entries.retain(|entry| {
                if entry.session == session {
                    entry.trigger.fire(WatchEvent::SessionClosed);
                    false
                } else {
                    true
                }
            });
        }
        self.watches.retain(|_, entries| !entries.is_empty());
        removed
    }
}

/// Shared in-process coordination service
pub struct MemoryEnsemble {
    tree: Mutex<Tree>,
}

impl MemoryEnsemble {
    /// Create an empty ensemble containing only `/`
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tree: Mutex::new(Tree::new()),
        })
    }

    /// Open a new client session
    pub fn connect(self: &Arc<Self>) -> MemorySession {
        let session = MemorySession {
            ensemble: Arc::clone(self),
            id: SessionId::new(),
        };
        tracing::debug!(session = %session.id, "coordination session opened");
        session
    }

    /// Number of nodes in the tree, including `/`
    pub fn node_count(&self) -> usize {
        self.tree.lock().nodes.len()
    }

    /// Data stored at `path`, if the node exists
    pub fn data(&self, path: &str) -> Option<Vec<u8>> {
        self.tree.lock().nodes.get(path).map(|node| node.data.clone())
    }

    /// Number of watches still waiting to fire
    pub fn pending_watches(&self) -> usize {
        self.tree.lock().watches.values().map(Vec::len).sum()
    }
}

/// One client session against a `MemoryEnsemble`
pub struct MemorySession {
    ensemble: Arc<MemoryEnsemble>,
    id: SessionId,
}

impl MemorySession {
    /// This session's identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The ensemble this session is connected to
    pub fn ensemble(&self) -> &Arc<MemoryEnsemble> {
        &self.ensemble
    }

    /// True once the session has been closed
    pub fn is_closed(&self) -> bool {
        self.ensemble.tree.lock().closed.contains(&self.id)
    }

    /// Close the session: remove its ephemeral nodes and cancel its watches
    pub fn close(&self) {
        let removed = self.ensemble.tree.lock().close_session(self.id);
        tracing::debug!(
            session = %self.id,
            ephemerals_removed = removed.len(),
            "coordination session closed"
        );
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close();
    }
}

impl Coordinator for MemorySession {
    fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> CoordResult<String> {
        let mut tree = self.ensemble.tree.lock();
        tree.check_open(self.id)?;
        tree.create(self.id, path, data, mode)
    }

    fn exists(&self, path: &str) -> CoordResult<bool> {
        let tree = self.ensemble.tree.lock();
        tree.check_open(self.id)?;
        Ok(tree.nodes.contains_key(path))
    }

    fn exists_watch(&self, path: &str) -> CoordResult<(bool, Watch)> {
        let mut tree = self.ensemble.tree.lock();
        tree.check_open(self.id)?;
        let exists = tree.nodes.contains_key(path);
        let (watch, trigger) = Watch::pair();
        tree.watches
            .entry(path.to_string())
            .or_default()
            .push(WatchEntry {
                session: self.id,
                trigger,
            });
        Ok((exists, watch))
    }

    fn children(&self, path: &str) -> CoordResult<Vec<String>> {
        let tree = self.ensemble.tree.lock();
        tree.check_open(self.id)?;
        tree.nodes
            .get(path)
            .map(|node| node.children.iter().cloned().collect())
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))
    }

    fn delete(&self, path: &str) -> CoordResult<()> {
        let mut tree = self.ensemble.tree.lock();
        tree.check_open(self.id)?;
        tree.delete(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_requires_parent() {
        let ensemble = MemoryEnsemble::new();
        let session = ensemble.connect();

        let err = session.create("/a/b", b"", CreateMode::Persistent).unwrap_err();
        assert_eq!(err, CoordinationError::NoNode("/a".to_string()));

        session.create("/a", b"", CreateMode::Persistent).unwrap();
        assert_eq!(
            session.create("/a/b", b"x", CreateMode::Persistent).unwrap(),
            "/a/b"
        );
        assert_eq!(ensemble.data("/a/b"), Some(b"x".to_vec()));
    }

    #[test]
    fn test_create_existing_fails() {
        let ensemble = MemoryEnsemble::new();
        let session = ensemble.connect();
        session.create("/a", b"", CreateMode::Persistent).unwrap();
        assert_eq!(
            session.create("/a", b"", CreateMode::Persistent),
            Err(CoordinationError::NodeExists("/a".to_string()))
        );
        assert!(matches!(
            session.create("/", b"", CreateMode::Persistent),
            Err(CoordinationError::NodeExists(_))
        ));
    }

    #[test]
    fn test_sequential_suffixes_increase_per_parent() {
        let ensemble = MemoryEnsemble::new();
        let session = ensemble.connect();
        session.create("/q", b"", CreateMode::Persistent).unwrap();

        let first = session
            .create("/q/item-", b"", CreateMode::PersistentSequential)
            .unwrap();
        let second = session
            .create("/q/item-", b"", CreateMode::PersistentSequential)
            .unwrap();
        assert_eq!(first, "/q/item-0000000000");
        assert_eq!(second, "/q/item-0000000001");

        // Deleting does not recycle sequence numbers.
        session.delete(&second).unwrap();
        let third = session
            .create("/q/item-", b"", CreateMode::PersistentSequential)
            .unwrap();
        assert_eq!(third, "/q/item-0000000002");
    }

    #[test]
    fn test_children_lists_names_sorted() {
        let ensemble = MemoryEnsemble::new();
        let session = ensemble.connect();
        session.create("/p", b"", CreateMode::Persistent).unwrap();
        for name in ["c", "a", "b"] {
            session
                .create(&format!("/p/{}", name), b"", CreateMode::Persistent)
                .unwrap();
        }
        assert_eq!(session.children("/p").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(session.children("/").unwrap(), vec!["p"]);
        assert!(matches!(
            session.children("/missing"),
            Err(CoordinationError::NoNode(_))
        ));
    }

    #[test]
    fn test_delete_rules() {
        let ensemble = MemoryEnsemble::new();
        let session = ensemble.connect();
        session.create("/p", b"", CreateMode::Persistent).unwrap();
        session.create("/p/c", b"", CreateMode::Persistent).unwrap();

        assert_eq!(
            session.delete("/p"),
            Err(CoordinationError::NotEmpty("/p".to_string()))
        );
        session.delete("/p/c").unwrap();
        session.delete("/p").unwrap();
        assert_eq!(
            session.delete("/p"),
            Err(CoordinationError::NoNode("/p".to_string()))
        );
        assert!(!session.exists("/p").unwrap());
    }

    #[test]
    fn test_ephemeral_removed_on_close() {
        let ensemble = MemoryEnsemble::new();
        let owner = ensemble.connect();
        let observer = ensemble.connect();

        owner.create("/e", b"", CreateMode::Ephemeral).unwrap();
        owner.create("/keep", b"", CreateMode::Persistent).unwrap();
        assert!(observer.exists("/e").unwrap());

        owner.close();
        assert!(owner.is_closed());
        assert!(!observer.exists("/e").unwrap());
        assert!(observer.exists("/keep").unwrap());
    }

    #[test]
    fn test_drop_closes_session() {
        let ensemble = MemoryEnsemble::new();
        let observer = ensemble.connect();
        {
            let owner = ensemble.connect();
            owner.create("/e", b"", CreateMode::Ephemeral).unwrap();
        }
        assert!(!observer.exists("/e").unwrap());
    }

    #[test]
    fn test_closed_session_rejects_operations() {
        let ensemble = MemoryEnsemble::new();
        let session = ensemble.connect();
        session.close();
        assert_eq!(session.exists("/"), Err(CoordinationError::SessionClosed));
        assert_eq!(
            session.create("/a", b"", CreateMode::Persistent),
            Err(CoordinationError::SessionClosed)
        );
    }

    #[test]
    fn test_watch_fires_on_delete() {
        let ensemble = MemoryEnsemble::new();
        let a = ensemble.connect();
        let b = ensemble.connect();
        a.create("/w", b"", CreateMode::Persistent).unwrap();

        let (exists, watch) = b.exists_watch("/w").unwrap();
        assert!(exists);
        assert!(watch.try_event().is_none());

        a.delete("/w").unwrap();
        assert_eq!(watch.wait(), WatchEvent::NodeDeleted("/w".to_string()));
        assert_eq!(ensemble.pending_watches(), 0);
    }

    #[test]
    fn test_watch_fires_on_create() {
        let ensemble = MemoryEnsemble::new();
        let session = ensemble.connect();
        let (exists, watch) = session.exists_watch("/later").unwrap();
        assert!(!exists);

        session.create("/later", b"", CreateMode::Persistent).unwrap();
        assert_eq!(watch.wait(), WatchEvent::NodeCreated("/later".to_string()));
    }

    #[test]
    fn test_watch_fires_on_ephemeral_expiry() {
        let ensemble = MemoryEnsemble::new();
        let owner = ensemble.connect();
        let observer = ensemble.connect();
        owner.create("/eph", b"", CreateMode::Ephemeral).unwrap();

        let (_, watch) = observer.exists_watch("/eph").unwrap();
        drop(owner);
        assert_eq!(watch.wait(), WatchEvent::NodeDeleted("/eph".to_string()));
    }

    #[test]
    fn test_close_cancels_own_watches() {
        let ensemble = MemoryEnsemble::new();
        let session = ensemble.connect();
        let (_, watch) = session.exists_watch("/never").unwrap();
        session.close();
        assert_eq!(watch.wait(), WatchEvent::SessionClosed);
        assert_eq!(ensemble.pending_watches(), 0);
    }

    #[test]
    fn test_node_count() {
        let ensemble = MemoryEnsemble::new();
        let session = ensemble.connect();
        assert_eq!(ensemble.node_count(), 1);
        session.create("/a", b"", CreateMode::Persistent).unwrap();
        assert_eq!(ensemble.node_count(), 2);
    }
}
