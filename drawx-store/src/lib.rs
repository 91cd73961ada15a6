//! # drawx-store: transactional, change-observable stroke store
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐ begin/commit ┌─────────────┐ persist ┌──────────────────┐
//! │ StrokeWriter │ ───────────► │ StrokeStore │ ──────► │ Backend          │
//! └──────────────┘              │  snapshot   │         │  memory | file | │
//!                               │  watch      │         │  rocksdb         │
//! ┌──────────────┐ query_all    │  feed       │         └──────────────────┘
//! │ RenderLoop   │ ◄─────────── │             │
//! │              │ ◄── changes ─┤             │ ──► subscribe_commits()
//! └──────────────┘              └─────────────┘     (replication layer)
//! ```
//!
//! ## Modules
//!
//! - [`store`]: `StrokeStore` handle and `Transaction`
//! - [`snapshot`]: immutable ordered view of the strokes
//! - [`watch`]: coalescing change notification
//! - [`feed`]: broadcast of committed records
//! - [`backend`]: persistence: in-memory, WAL + LZ4 snapshot file, RocksDB
//! - [`connect`]: async open with retry and the `StoreSlot` hand-off

pub mod backend;
pub mod config;
pub mod connect;
pub mod error;
pub mod feed;
pub mod snapshot;
pub mod store;
pub mod watch;

pub use config::{BackendKind, StoreConfig};
pub use connect::{connect, connect_with_retry, retry_connect, RetryPolicy, StoreSlot};
pub use error::StoreError;
pub use feed::{CommitFeed, CommitOrigin, CommitRecord, FeedStats};
pub use snapshot::StrokeSnapshot;
pub use store::{CommitInfo, StoreStats, StrokeStore, Transaction};
pub use watch::ChangeWatcher;
