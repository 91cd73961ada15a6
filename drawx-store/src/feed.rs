//! Commit feed: fan-out of committed transactions to replication subscribers.
//!
//! Every commit is published once as an `Arc<CommitRecord>` on a tokio
//! broadcast channel. Each subscriber gets an independent receiver buffering
//! up to `capacity` records; a subscriber that falls further behind sees
//! `RecvError::Lagged` and must resynchronize from a full snapshot.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use drawx_core::StrokeOp;

use crate::error::StoreError;

/// Where a commit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitOrigin {
    /// Written by this process.
    Local,
    /// Applied on behalf of a remote device.
    Remote(Uuid),
}

/// One committed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Store version after this commit.
    pub version: u64,
    pub origin: CommitOrigin,
    pub ops: Vec<StrokeOp>,
}

impl CommitRecord {
    /// Encode for the wire or the log (bincode, standard config).
    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serde::encode_to_vec(self, bincode::config::standard())?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        let (record, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(record)
    }

    pub fn is_local(&self) -> bool {
        self.origin == CommitOrigin::Local
    }
}

/// Feed counters.
#[derive(Debug, Clone, Default)]
pub struct FeedStats {
    pub records_published: u64,
    /// Records published while nobody was subscribed.
    pub records_unobserved: u64,
    pub subscribers: usize,
}

pub struct CommitFeed {
    sender: broadcast::Sender<Arc<CommitRecord>>,
    capacity: usize,
    published: AtomicU64,
    unobserved: AtomicU64,
}

impl CommitFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            capacity: capacity.max(1),
            published: AtomicU64::new(0),
            unobserved: AtomicU64::new(0),
        }
    }

    /// Publish a record. Returns how many subscribers will see it.
    pub fn publish(&self, record: Arc<CommitRecord>) -> usize {
        let count = self.sender.send(record).unwrap_or(0);
        self.published.fetch_add(1, Ordering::Relaxed);
        if count == 0 {
            self.unobserved.fetch_add(1, Ordering::Relaxed);
        }
        count
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<CommitRecord>> {
        self.sender.subscribe()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> FeedStats {
        FeedStats {
            records_published: self.published.load(Ordering::Relaxed),
            records_unobserved: self.unobserved.load(Ordering::Relaxed),
            subscribers: self.sender.receiver_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawx_core::Point;

    fn record(version: u64) -> Arc<CommitRecord> {
        Arc::new(CommitRecord {
            version,
            origin: CommitOrigin::Local,
            ops: vec![StrokeOp::Create {
                id: Uuid::new_v4(),
                color: "Dove".into(),
                point: Point::new(1.0, 2.0),
            }],
        })
    }

    #[tokio::test]
    async fn test_fan_out() {
        let feed = CommitFeed::new(16);
        let mut rx1 = feed.subscribe();
        let mut rx2 = feed.subscribe();

        assert_eq!(feed.publish(record(1)), 2);

        assert_eq!(rx1.recv().await.unwrap().version, 1);
        assert_eq!(rx2.recv().await.unwrap().version, 1);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let feed = CommitFeed::new(4);
        assert_eq!(feed.publish(record(1)), 0);
        let stats = feed.stats();
        assert_eq!(stats.records_published, 1);
        assert_eq!(stats.records_unobserved, 1);
        assert_eq!(stats.subscribers, 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber() {
        let feed = CommitFeed::new(2);
        let mut rx = feed.subscribe();
        for v in 1..=4 {
            feed.publish(record(v));
        }
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(n)) => assert_eq!(n, 2),
            other => panic!("expected lag, got {other:?}"),
        }
        assert_eq!(rx.recv().await.unwrap().version, 3);
    }

    #[test]
    fn test_record_wire_format() {
        let rec = CommitRecord {
            version: 42,
            origin: CommitOrigin::Remote(Uuid::new_v4()),
            ops: vec![StrokeOp::Clear],
        };
        let bytes = rec.encode().unwrap();
        assert_eq!(CommitRecord::decode(&bytes).unwrap(), rec);
        assert!(!rec.is_local());
    }

    #[test]
    fn test_capacity_floor() {
        assert_eq!(CommitFeed::new(0).capacity(), 1);
    }
}
