use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::backend::{Backend, Recovered};
use crate::error::StoreError;
use crate::feed::CommitRecord;
use crate::snapshot::StrokeSnapshot;

/// Shared switch that makes upcoming persists fail.
#[derive(Debug, Clone, Default)]
pub struct PersistFaults {
    remaining: Arc<AtomicU32>,
}

impl PersistFaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` persists.
    pub fn fail_next(&self, n: u32) {
        self.remaining.store(n, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Keeps nothing. The store's own snapshot is the only copy.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    commits: u64,
    faults: PersistFaults,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose persists fail on demand.
    pub fn with_faults(faults: PersistFaults) -> Self {
        Self { commits: 0, faults }
    }

    pub fn commits(&self) -> u64 {
        self.commits
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn recover(&mut self) -> Result<Recovered, StoreError> {
        Ok(Recovered::default())
    }

    fn persist(&mut self, record: &CommitRecord, _state: &StrokeSnapshot) -> Result<(), StoreError> {
        if self.faults.take() {
            let reason = format!("injected failure at version {}", record.version);
            return Err(io::Error::other(reason).into());
        }
        self.commits += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::CommitOrigin;

    #[test]
    fn test_faults_fail_then_recover() {
        let faults = PersistFaults::new();
        let mut backend = MemoryBackend::with_faults(faults.clone());
        let record = CommitRecord {
            version: 1,
            origin: CommitOrigin::Local,
            ops: Vec::new(),
        };
        let state = StrokeSnapshot::new();

        faults.fail_next(1);
        assert!(matches!(backend.persist(&record, &state), Err(StoreError::Io(_))));
        backend.persist(&record, &state).unwrap();
        assert_eq!(backend.commits(), 1);
    }
}
