//! Change notification.
//!
//! The store keeps a `tokio::sync::watch` channel carrying its version. Every
//! non-empty commit bumps it. Watchers only ever see the latest value, so a
//! burst of commits between two wakes is coalesced into one.

use tokio::sync::watch;

use crate::error::StoreError;

pub struct ChangeWatcher {
    rx: watch::Receiver<u64>,
}

impl ChangeWatcher {
    pub(crate) fn new(rx: watch::Receiver<u64>) -> Self {
        Self { rx }
    }

    /// Wait until a commit lands that this watcher has not seen, returning the
    /// store version at wake-up. Cancel-safe, so it can sit in a `select!`.
    ///
    /// Fails with `StoreError::Closed` once every store handle is gone.
    pub async fn wait_for_change(&mut self) -> Result<u64, StoreError> {
        self.rx.changed().await.map_err(|_| StoreError::Closed)?;
        Ok(*self.rx.borrow_and_update())
    }

    /// Mark the current version as seen and return it. Call before reading a
    /// snapshot so a commit racing the read still wakes the next wait.
    pub fn mark_seen(&mut self) -> u64 {
        *self.rx.borrow_and_update()
    }

    /// Whether a commit landed since the last `mark_seen`/wake.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    pub fn version(&self) -> u64 {
        *self.rx.borrow()
    }
}

impl Clone for ChangeWatcher {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wakes_on_bump() {
        let (tx, rx) = watch::channel(0u64);
        let mut watcher = ChangeWatcher::new(rx);
        assert!(!watcher.has_changed());

        tx.send_replace(1);
        assert!(watcher.has_changed());
        assert_eq!(watcher.wait_for_change().await.unwrap(), 1);
        assert!(!watcher.has_changed());
    }

    #[tokio::test]
    async fn test_coalesces_bursts() {
        let (tx, rx) = watch::channel(0u64);
        let mut watcher = ChangeWatcher::new(rx);
        for v in 1..=5 {
            tx.send_replace(v);
        }
        assert_eq!(watcher.wait_for_change().await.unwrap(), 5);
        assert!(!watcher.has_changed());
    }

    #[tokio::test]
    async fn test_closed_when_sender_dropped() {
        let (tx, rx) = watch::channel(0u64);
        let mut watcher = ChangeWatcher::new(rx);
        drop(tx);
        assert!(matches!(
            watcher.wait_for_change().await,
            Err(StoreError::Closed)
        ));
    }

    #[test]
    fn test_mark_seen() {
        let (tx, rx) = watch::channel(0u64);
        let mut watcher = ChangeWatcher::new(rx);
        tx.send_replace(3);
        assert_eq!(watcher.mark_seen(), 3);
        assert!(!watcher.has_changed());
        assert_eq!(watcher.version(), 3);
    }
}
