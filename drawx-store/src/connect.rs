//! Asynchronous store acquisition.
//!
//! ```text
//!  connect task                         StoreSlot (watch)          observers
//!  ────────────                         ─────────────────          ─────────
//!  attempt 1 ── Err ─► sleep(initial)
//!  attempt 2 ── Err ─► sleep(initial·m)
//!  attempt 3 ── Ok(store) ───────────► Some(store) ──────────────► writer, render loop
//! ```
//!
//! Nobody polls for the handle. Whoever needs it awaits the slot.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::StrokeStore;

/// Open a store without blocking the async runtime.
pub async fn connect(config: StoreConfig) -> Result<StrokeStore, StoreError> {
    tokio::task::spawn_blocking(move || StrokeStore::open(config))
        .await
        .map_err(|e| StoreError::ConnectFailed {
            attempts: 1,
            reason: e.to_string(),
        })?
}

/// Exponential backoff between connect attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first (default: 5)
    pub max_attempts: u32,
    /// Delay before the first retry (default: 100ms)
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay (default: 5000ms)
    pub max_delay_ms: u64,
    /// Growth factor per retry (default: 2.0)
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Millisecond delays so retry tests run fast.
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            multiplier: 2.0,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31) as i32;
        let ms = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exp);
        Duration::from_millis(ms.min(self.max_delay_ms as f64) as u64)
    }
}

/// Run `attempt` until it succeeds or the policy gives up. The closure gets
/// the 1-based attempt number.
pub async fn retry_connect<F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Result<StrokeStore, StoreError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<StrokeStore, StoreError>>,
{
    let max = policy.max_attempts.max(1);
    let mut n = 1;
    loop {
        match attempt(n).await {
            Ok(store) => {
                if n > 1 {
                    log::info!("Store connected after {n} attempt(s)");
                }
                return Ok(store);
            }
            Err(e) if n >= max => {
                return Err(StoreError::ConnectFailed {
                    attempts: n,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                let delay = policy.delay_after(n);
                log::warn!("Store connect attempt {n}/{max} failed: {e}; retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                n += 1;
            }
        }
    }
}

/// [`connect`] under a retry policy.
pub async fn connect_with_retry(config: StoreConfig, policy: &RetryPolicy) -> Result<StrokeStore, StoreError> {
    retry_connect(policy, |_| connect(config.clone())).await
}

/// Where a resolved store handle is published for everyone waiting on it.
#[derive(Clone)]
pub struct StoreSlot {
    tx: Arc<watch::Sender<Option<StrokeStore>>>,
}

impl Default for StoreSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreSlot {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn publish(&self, store: StrokeStore) {
        log::info!("Store handle ready ({})", store.backend_name());
        self.tx.send_replace(Some(store));
    }

    /// Take the handle back out, e.g. when the session shuts down.
    pub fn clear(&self) -> Option<StrokeStore> {
        self.tx.send_replace(None)
    }

    /// The handle, if it has been published.
    pub fn get(&self) -> Option<StrokeStore> {
        self.tx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Receiver for `select!`-style waiting.
    pub fn watch(&self) -> watch::Receiver<Option<StrokeStore>> {
        self.tx.subscribe()
    }

    /// Wait until a handle is published.
    pub async fn wait(&self) -> StrokeStore {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(store) = rx.borrow_and_update().clone() {
                return store;
            }
            // `self` keeps the sender alive, so this only fails if it is
            // dropped concurrently, which `&self` rules out.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
