//! Store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which persistence backend a store opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Nothing survives the process. Tests and throwaway canvases.
    Memory,
    /// Append-only log plus LZ4 snapshot files in `path`.
    File,
    /// RocksDB database in `path` (requires the `rocksdb` feature).
    RocksDb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Data directory
    pub path: PathBuf,
    pub backend: BackendKind,
    /// Log records written before the file backend folds them into a
    /// snapshot (default: 1000)
    pub compaction_threshold: usize,
    /// fsync after every commit (default: false)
    pub sync_writes: bool,
    /// Commit records buffered per replication subscriber (default: 256)
    pub feed_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("drawx_data"),
            backend: BackendKind::File,
            compaction_threshold: 1000,
            sync_writes: false,
            feed_capacity: 256,
        }
    }
}

impl StoreConfig {
    /// In-memory store.
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Self::default()
        }
    }

    /// File-backed store at `path` with small thresholds so compaction
    /// actually happens in tests.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backend: BackendKind::File,
            compaction_threshold: 8,
            sync_writes: false,
            feed_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = StoreConfig::default();
        assert_eq!(c.backend, BackendKind::File);
        assert_eq!(c.compaction_threshold, 1000);
        assert!(!c.sync_writes);
    }

    #[test]
    fn test_backend_kind_json_names() {
        let c: StoreConfig = serde_json::from_str(r#"{"backend":"rocksdb","path":"/tmp/x"}"#).unwrap();
        assert_eq!(c.backend, BackendKind::RocksDb);
        assert_eq!(c.path, PathBuf::from("/tmp/x"));
        assert_eq!(c.feed_capacity, 256);
    }
}
