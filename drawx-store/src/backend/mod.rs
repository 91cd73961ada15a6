//! Persistence backends.
//!
//! ```text
//! ┌──────────────┐  persist(record, state)  ┌───────────────────────────┐
//! │ StrokeStore  │ ───────────────────────► │ Backend                   │
//! │ (in-memory   │                          │  MemoryBackend - nothing  │
//! │  snapshot)   │ ◄─────────────────────── │  FileBackend   - WAL+LZ4  │
//! └──────────────┘  recover() on open       │  RocksBackend  - RocksDB  │
//!                                           └───────────────────────────┘
//! ```
//!
//! A commit is persisted before it becomes visible to readers, so anything a
//! reader has seen survives a restart (modulo `sync_writes`).

pub mod file;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocks;
pub mod wal;

use drawx_core::Stroke;

use crate::config::{BackendKind, StoreConfig};
use crate::error::StoreError;
use crate::feed::CommitRecord;
use crate::snapshot::StrokeSnapshot;

pub use file::FileBackend;
pub use memory::{MemoryBackend, PersistFaults};
#[cfg(feature = "rocksdb")]
pub use rocks::RocksBackend;

/// State read back from durable storage on open.
#[derive(Debug, Default)]
pub struct Recovered {
    /// Version the base strokes correspond to.
    pub base_version: u64,
    pub strokes: Vec<Stroke>,
    /// Commits after `base_version`, in order, to replay on top.
    pub log: Vec<CommitRecord>,
}

pub trait Backend: Send {
    fn name(&self) -> &'static str;

    /// Read everything persisted so far.
    fn recover(&mut self) -> Result<Recovered, StoreError>;

    /// Durably record a commit. `state` is the collection after applying it.
    fn persist(&mut self, record: &CommitRecord, state: &StrokeSnapshot) -> Result<(), StoreError>;

    /// Push buffered writes to disk.
    fn flush(&mut self) -> Result<(), StoreError>;
}

/// Open the backend a config asks for.
pub fn open_backend(config: &StoreConfig) -> Result<Box<dyn Backend>, StoreError> {
    match config.backend {
        BackendKind::Memory => Ok(Box::new(MemoryBackend::new())),
        BackendKind::File => Ok(Box::new(FileBackend::open(config)?)),
        #[cfg(feature = "rocksdb")]
        BackendKind::RocksDb => Ok(Box::new(RocksBackend::open(config)?)),
        #[cfg(not(feature = "rocksdb"))]
        BackendKind::RocksDb => Err(StoreError::BackendUnavailable("rocksdb")),
    }
}
