//! Key-value adapter for serialized value trees
//!
//! The index only needs three things from a store: put a blob under a tag
//! name, get it back byte-for-byte, and wipe everything. Two stores ship:
//!
//! - [`MemoryIndexStore`]: DashMap, sharded writes, lock-free reads
//! - [`DirIndexStore`]: one file per key, written via temp + rename

use dashmap::DashMap;
use metaindex_core::{Error, IndexConfig, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::radix::ValueRadixTree;

/// Blob store keyed by tag name
///
/// Thread safety: implementations must accept concurrent calls.
pub trait IndexStore: Send + Sync {
    /// Store `blob` under `key`, replacing any previous blob
    ///
    /// # Errors
    ///
    /// `Store` if the write fails.
    fn put(&self, key: &str, blob: &[u8]) -> Result<()>;

    /// Fetch the blob under `key`, or `None` if absent
    ///
    /// # Errors
    ///
    /// `Store` if the read fails.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove every blob
    fn delete_all(&self) -> Result<()>;
}

impl<S: IndexStore + ?Sized> IndexStore for Box<S> {
    fn put(&self, key: &str, blob: &[u8]) -> Result<()> {
        (**self).put(key, blob)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn delete_all(&self) -> Result<()> {
        (**self).delete_all()
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-process store backed by a DashMap
#[derive(Debug, Default)]
pub struct MemoryIndexStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryIndexStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl IndexStore for MemoryIndexStore {
    fn put(&self, key: &str, blob: &[u8]) -> Result<()> {
        self.blobs.insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(key).map(|entry| entry.value().clone()))
    }

    fn delete_all(&self) -> Result<()> {
        self.blobs.clear();
        Ok(())
    }
}

// ============================================================================
// Directory store
// ============================================================================

const BLOB_EXTENSION: &str = "tree";
const TEMP_EXTENSION: &str = "tree.tmp";

/// File-per-key store rooted at a directory
///
/// Keys are hex-encoded into file names, so any tag name maps to a portable
/// file name. Writes go to a temp file that is synced and then renamed over
/// the target; a reader sees either the old blob or the new one.
#[derive(Debug, Clone)]
pub struct DirIndexStore {
    dir: PathBuf,
}

fn hex_encode(key: &str) -> String {
    key.bytes().map(|b| format!("{:02x}", b)).collect()
}

fn store_err(action: &str, path: &Path, e: io::Error) -> Error {
    Error::Store(format!("{} {}: {}", action, path.display(), e))
}

impl DirIndexStore {
    /// Open (creating if needed) a store in `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| store_err("create", &dir, e))?;
        Ok(Self { dir })
    }

    /// Directory holding the blobs
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let mut path = self.dir.join(hex_encode(key));
        path.set_extension(BLOB_EXTENSION);
        path
    }
}

impl IndexStore for DirIndexStore {
    fn put(&self, key: &str, blob: &[u8]) -> Result<()> {
        let path = self.blob_path(key);
        let tmp_path = path.with_extension(TEMP_EXTENSION);
        {
            let mut file = fs::File::create(&tmp_path).map_err(|e| store_err("create", &tmp_path, e))?;
            file.write_all(blob)
                .and_then(|()| file.sync_all())
                .map_err(|e| store_err("write", &tmp_path, e))?;
        }
        fs::rename(&tmp_path, &path).map_err(|e| store_err("rename", &path, e))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_err("read", &path, e)),
        }
    }

    fn delete_all(&self) -> Result<()> {
        let entries = fs::read_dir(&self.dir).map_err(|e| store_err("list", &self.dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| store_err("list", &self.dir, e))?.path();
            let is_blob = path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.ends_with(".tree") || name.ends_with(".tree.tmp"));
            if is_blob {
                fs::remove_file(&path).map_err(|e| store_err("delete", &path, e))?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Open the store described by `config`: a directory store when `store_dir`
/// is set, otherwise an in-memory one.
pub fn open_store(config: &IndexConfig) -> Result<Box<dyn IndexStore>> {
    match &config.store_dir {
        Some(dir) => {
            tracing::debug!(dir = %dir.display(), "opening directory index store");
            Ok(Box::new(DirIndexStore::open(dir.clone())?))
        }
        None => Ok(Box::new(MemoryIndexStore::new())),
    }
}

/// Encode `tree` and store it under `tag_name`.
pub fn put_tree<S: IndexStore + ?Sized>(
    store: &S,
    tag_name: &str,
    tree: &ValueRadixTree,
) -> Result<()> {
    let bytes = tree.encode_to_bytes()?;
    store.put(tag_name, &bytes)
}

/// Fetch and decode the tree stored under `tag_name`.
pub fn get_tree<S: IndexStore + ?Sized>(
    store: &S,
    tag_name: &str,
) -> Result<Option<ValueRadixTree>> {
    match store.get(tag_name)? {
        Some(bytes) => Ok(Some(ValueRadixTree::decode_from_bytes(&bytes)?)),
        None => Ok(None),
    }
}
