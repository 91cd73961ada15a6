//! The stroke store.
//!
//! ```text
//!   writer thread                       render thread
//!   ─────────────                       ─────────────
//!   store.begin()  ── writer lock ──┐   store.query_all() ──► Arc<StrokeSnapshot>
//!   txn.append_point(..)            │          ▲
//!   txn.commit()                    │          │ swap
//!     1. backend.persist(record)    │   ┌──────┴───────┐
//!     2. swap snapshot  ────────────┼──►│ RwLock<Arc<…>>│
//!     3. bump change watch ─────────┼──► watchers wake
//!     4. publish to commit feed ────┘   replication subscribers
//! ```
//!
//! One transaction at a time holds the writer lock; readers never wait on
//! it. Readers holding an older `Arc<StrokeSnapshot>` keep seeing exactly
//! what was committed when they took it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use drawx_core::{Point, Stroke, StrokeId, StrokeOp};

use crate::backend::{open_backend, Backend, MemoryBackend};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::feed::{CommitFeed, CommitOrigin, CommitRecord, FeedStats};
use crate::snapshot::StrokeSnapshot;
use crate::watch::ChangeWatcher;

struct WriterState {
    backend: Box<dyn Backend>,
}

#[derive(Default)]
struct Counters {
    commits: AtomicU64,
    empty_commits: AtomicU64,
    remote_commits: AtomicU64,
    ops_applied: AtomicU64,
    rollbacks: AtomicU64,
}

struct StoreInner {
    snapshot: RwLock<Arc<StrokeSnapshot>>,
    writer: Mutex<WriterState>,
    version_tx: watch::Sender<u64>,
    feed: CommitFeed,
    counters: Counters,
    backend_name: &'static str,
    config: StoreConfig,
}

/// Store counters.
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub version: u64,
    pub strokes: usize,
    pub points: usize,
    pub commits: u64,
    /// Commits with no ops (no notification sent).
    pub empty_commits: u64,
    pub remote_commits: u64,
    pub ops_applied: u64,
    /// Transactions dropped without committing.
    pub rollbacks: u64,
    pub backend: &'static str,
    pub feed: FeedStats,
}

/// What a successful commit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    /// Store version after the commit.
    pub version: u64,
    pub ops: usize,
    /// Replication subscribers the record reached.
    pub subscribers: usize,
}

/// Handle to a stroke store. Cheap to clone; every clone sees the same data.
#[derive(Clone)]
pub struct StrokeStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for StrokeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrokeStore")
            .field("backend", &self.inner.backend_name)
            .field("version", &self.version())
            .finish()
    }
}

impl StrokeStore {
    /// Open a store, recovering whatever the configured backend holds.
    /// Blocking; async callers go through [`crate::connect`].
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let mut backend = open_backend(&config)?;
        let recovered = backend.recover()?;

        let mut snapshot = StrokeSnapshot::from_strokes(recovered.base_version, recovered.strokes);
        for record in &recovered.log {
            for op in &record.ops {
                snapshot.apply(op).map_err(|e| StoreError::Corrupt {
                    sequence: record.version,
                    reason: e.to_string(),
                })?;
            }
            snapshot.set_version(record.version);
        }

        log::info!(
            "Opened {} stroke store: {} stroke(s) at version {}",
            backend.name(),
            snapshot.len(),
            snapshot.version()
        );
        Ok(Self::from_parts(snapshot, backend, config))
    }

    /// Empty store that persists nothing.
    pub fn in_memory() -> Self {
        Self::from_parts(
            StrokeSnapshot::new(),
            Box::new(MemoryBackend::new()),
            StoreConfig::memory(),
        )
    }

    /// Empty store over a caller-supplied backend. Nothing is recovered.
    pub fn with_backend(backend: Box<dyn Backend>, config: StoreConfig) -> Self {
        Self::from_parts(StrokeSnapshot::new(), backend, config)
    }

    fn from_parts(snapshot: StrokeSnapshot, backend: Box<dyn Backend>, config: StoreConfig) -> Self {
        let (version_tx, _) = watch::channel(snapshot.version());
        let backend_name = backend.name();
        Self {
            inner: Arc::new(StoreInner {
                snapshot: RwLock::new(Arc::new(snapshot)),
                writer: Mutex::new(WriterState { backend }),
                version_tx,
                feed: CommitFeed::new(config.feed_capacity),
                counters: Counters::default(),
                backend_name,
                config,
            }),
        }
    }

    /// Start a local transaction. Blocks while another transaction is open.
    pub fn begin(&self) -> Transaction<'_> {
        self.begin_with_origin(CommitOrigin::Local)
    }

    fn begin_with_origin(&self, origin: CommitOrigin) -> Transaction<'_> {
        let guard = self
            .inner
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Taken under the writer lock, so nothing can commit past it.
        let working = (*self.query_all()).clone();
        Transaction {
            store: self,
            writer: guard,
            working,
            ops: Vec::new(),
            origin,
            finished: false,
        }
    }

    /// Current committed snapshot.
    pub fn query_all(&self) -> Arc<StrokeSnapshot> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn get(&self, id: &StrokeId) -> Option<Arc<Stroke>> {
        self.query_all().stroke_arc(id)
    }

    pub fn version(&self) -> u64 {
        *self.inner.version_tx.borrow()
    }

    /// Watcher that wakes on every commit after this call.
    pub fn changes(&self) -> ChangeWatcher {
        ChangeWatcher::new(self.inner.version_tx.subscribe())
    }

    /// Receive every commit record from now on.
    pub fn subscribe_commits(&self) -> broadcast::Receiver<Arc<CommitRecord>> {
        self.inner.feed.subscribe()
    }

    /// Remove every stroke in one transaction.
    pub fn delete_all(&self) -> Result<CommitInfo, StoreError> {
        let mut txn = self.begin();
        txn.delete_all();
        txn.commit()
    }

    /// Commit ops that another device already committed. The whole batch is
    /// rejected if any op breaks an invariant here.
    pub fn apply_remote(&self, device: Uuid, ops: Vec<StrokeOp>) -> Result<CommitInfo, StoreError> {
        let mut txn = self.begin_with_origin(CommitOrigin::Remote(device));
        for op in ops {
            txn.apply(op)?;
        }
        txn.commit()
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        let mut writer = self
            .inner
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writer.backend.flush()
    }

    pub fn stats(&self) -> StoreStats {
        let snapshot = self.query_all();
        let c = &self.inner.counters;
        StoreStats {
            version: snapshot.version(),
            strokes: snapshot.len(),
            points: snapshot.point_count(),
            commits: c.commits.load(Ordering::Relaxed),
            empty_commits: c.empty_commits.load(Ordering::Relaxed),
            remote_commits: c.remote_commits.load(Ordering::Relaxed),
            ops_applied: c.ops_applied.load(Ordering::Relaxed),
            rollbacks: c.rollbacks.load(Ordering::Relaxed),
            backend: self.inner.backend_name,
            feed: self.inner.feed.stats(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend_name
    }

    /// Whether two handles refer to the same store.
    pub fn same_store(&self, other: &StrokeStore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A write transaction.
///
/// Ops are applied to a private copy as they are added, so invariant
/// violations surface immediately. A rejected op leaves the copy untouched.
/// Nothing is visible to readers until `commit`; dropping the transaction
/// discards it.
pub struct Transaction<'a> {
    store: &'a StrokeStore,
    writer: MutexGuard<'a, WriterState>,
    working: StrokeSnapshot,
    ops: Vec<StrokeOp>,
    origin: CommitOrigin,
    finished: bool,
}

impl Transaction<'_> {
    /// Create an in-progress stroke with its first point. Returns the new id.
    pub fn create_stroke(&mut self, color: impl Into<String>, first: Point) -> Result<StrokeId, StoreError> {
        let id = Uuid::new_v4();
        self.apply(StrokeOp::Create {
            id,
            color: color.into(),
            point: first,
        })?;
        Ok(id)
    }

    pub fn append_point(&mut self, id: StrokeId, point: Point) -> Result<(), StoreError> {
        self.apply(StrokeOp::Append { id, point })
    }

    pub fn complete_stroke(&mut self, id: StrokeId) -> Result<(), StoreError> {
        self.apply(StrokeOp::Complete { id })
    }

    pub fn delete_all(&mut self) {
        // Clear cannot violate an invariant.
        self.working.apply(&StrokeOp::Clear).ok();
        self.ops.push(StrokeOp::Clear);
    }

    pub fn apply(&mut self, op: StrokeOp) -> Result<(), StoreError> {
        self.working.apply(&op)?;
        self.ops.push(op);
        Ok(())
    }

    /// A stroke as this transaction currently sees it.
    pub fn stroke(&self, id: &StrokeId) -> Option<&Stroke> {
        self.working.get(id)
    }

    pub fn snapshot(&self) -> &StrokeSnapshot {
        &self.working
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Persist, publish and notify. An empty transaction commits nothing and
    /// wakes nobody.
    pub fn commit(mut self) -> Result<CommitInfo, StoreError> {
        self.finished = true;
        let inner = &self.store.inner;

        if self.ops.is_empty() {
            inner.counters.empty_commits.fetch_add(1, Ordering::Relaxed);
            return Ok(CommitInfo {
                version: self.working.version(),
                ops: 0,
                subscribers: 0,
            });
        }

        let mut working = std::mem::take(&mut self.working);
        let ops = std::mem::take(&mut self.ops);
        let version = working.version() + 1;
        working.set_version(version);

        let record = CommitRecord {
            version,
            origin: self.origin,
            ops,
        };
        if let Err(e) = self.writer.backend.persist(&record, &working) {
            log::error!("Failed to persist commit {version}: {e}");
            inner.counters.rollbacks.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }

        let op_count = record.ops.len();
        *inner
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(working);
        inner.version_tx.send_replace(version);
        let subscribers = inner.feed.publish(Arc::new(record));

        inner.counters.commits.fetch_add(1, Ordering::Relaxed);
        inner
            .counters
            .ops_applied
            .fetch_add(op_count as u64, Ordering::Relaxed);
        if !matches!(self.origin, CommitOrigin::Local) {
            inner.counters.remote_commits.fetch_add(1, Ordering::Relaxed);
        }

        log::trace!("Committed version {version} ({op_count} op(s))");
        Ok(CommitInfo {
            version,
            ops: op_count,
            subscribers,
        })
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if !self.ops.is_empty() {
                log::debug!("Rolled back transaction with {} op(s)", self.ops.len());
            }
            self.store
                .inner
                .counters
                .rollbacks
                .fetch_add(1, Ordering::Relaxed);
        }
    }
}
