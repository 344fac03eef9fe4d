//! Index configuration via `metaindex.toml`
//!
//! A default `metaindex.toml` can be written on first use. To change
//! settings, edit the file and restart the client.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::path::validate_path;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "metaindex.toml";

/// Default coordination path holding the tag-name trie
pub const DEFAULT_TRIE_ROOT: &str = "/tag-names";

/// Index configuration loaded from `metaindex.toml`.
///
/// # Example
///
/// ```toml
/// trie_root = "/tag-names"
/// # store_dir = "/var/lib/metaindex/values"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    /// Coordination path under which the tag-name trie lives
    #[serde(default = "default_trie_root")]
    pub trie_root: String,
    /// Directory for serialized value trees. In-memory store when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,
}

fn default_trie_root() -> String {
    DEFAULT_TRIE_ROOT.to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            trie_root: default_trie_root(),
            store_dir: None,
        }
    }
}

impl IndexConfig {
    /// Check that the trie root is a usable absolute path below `/`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the root is `/`, relative, or has a
    /// trailing separator.
    pub fn validate(&self) -> Result<()> {
        if self.trie_root == "/" || !validate_path(&self.trie_root) {
            return Err(Error::Config(format!(
                "Invalid trie_root '{}' in {}. Expected an absolute path such as \"{}\".",
                self.trie_root, CONFIG_FILE_NAME, DEFAULT_TRIE_ROOT
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# metaindex configuration
#
# Coordination-service path holding the tag-name trie.
trie_root = "/tag-names"

# Directory where serialized tag-value trees are stored, one file per tag name.
# Leave unset to keep them in memory.
# store_dir = "/var/lib/metaindex/values"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: IndexConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
