use std::path::{Path, PathBuf};

use crate::error::{GraphError, Result};

/// Environment variable naming the directory relative graph names resolve against.
pub const STORAGE_PATH_ENV: &str = "GRAPH_STORAGE_PATH";

const DEFAULT_STORAGE_PATH: &str = "data/graphs";

/// Where the filesystem store keeps graphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reads the root from `GRAPH_STORAGE_PATH`, falling back to `data/graphs`.
    pub fn from_env() -> Self {
        let root = std::env::var(STORAGE_PATH_ENV)
            .unwrap_or_else(|_| DEFAULT_STORAGE_PATH.to_string());
        Self::new(root)
    }

    /// Maps a graph name to its directory. Absolute names are used as-is.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if name.trim().is_empty() {
            return Err(GraphError::invalid_argument("graph name is empty"));
        }
        let path = Path::new(name);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.root.join(path))
        }
    }
}
