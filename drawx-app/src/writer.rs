//! Stroke Writer: one short transaction per input event.
//!
//! The writer only holds the id of the stroke it has open. Every call looks
//! the store up in the slot, so input arriving before the store is ready is
//! dropped rather than queued.

use drawx_core::{OpError, Point, StrokeId};
use drawx_store::{StoreError, StoreSlot, StrokeStore};

/// What a writer call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Committed; the store is at `version`.
    Committed { version: u64 },
    /// No store yet. Input discarded.
    Dropped,
    /// Nothing to extend or finish.
    NoOpenStroke,
    /// The open stroke disappeared (cleared locally or remotely).
    StrokeLost,
}

impl WriteOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, WriteOutcome::Committed { .. })
    }
}

pub struct StrokeWriter {
    slot: StoreSlot,
    current: Option<StrokeId>,
}

impl StrokeWriter {
    pub fn new(slot: StoreSlot) -> Self {
        Self {
            slot,
            current: None,
        }
    }

    /// Id of the stroke being drawn.
    pub fn current(&self) -> Option<StrokeId> {
        self.current
    }

    fn store(&self, what: &str) -> Option<StrokeStore> {
        let store = self.slot.get();
        if store.is_none() {
            log::debug!("Dropping {what}: store not ready");
        }
        store
    }

    /// Create a new in-progress stroke with its first point.
    ///
    /// A stroke still open from a gesture that never ended is completed in
    /// the same transaction.
    pub fn begin_stroke(&mut self, point: Point, color: &str) -> Result<WriteOutcome, StoreError> {
        let Some(store) = self.store("stroke start") else {
            return Ok(WriteOutcome::Dropped);
        };
        let mut txn = store.begin();
        // Swapped only after the commit lands.
        if let Some(dangling) = self.current {
            match txn.complete_stroke(dangling) {
                Ok(()) => log::debug!("Completed dangling stroke {dangling}"),
                Err(e) => log::debug!("Dangling stroke {dangling} not completed: {e}"),
            }
        }
        let id = txn.create_stroke(color, point)?;
        let info = txn.commit()?;
        self.current = Some(id);
        log::trace!("Began stroke {id} in {color}");
        Ok(WriteOutcome::Committed {
            version: info.version,
        })
    }

    /// Append one point to the open stroke.
    pub fn extend_stroke(&mut self, point: Point) -> Result<WriteOutcome, StoreError> {
        self.write("extend", false, |txn, id| txn.append_point(id, point))
    }

    /// Append a final point and complete the stroke.
    pub fn finish_stroke(&mut self, point: Point) -> Result<WriteOutcome, StoreError> {
        self.write("finish", true, |txn, id| {
            txn.append_point(id, point)?;
            txn.complete_stroke(id)
        })
    }

    /// Complete the stroke without adding a point.
    pub fn abort_stroke(&mut self) -> Result<WriteOutcome, StoreError> {
        self.write("abort", true, |txn, id| txn.complete_stroke(id))
    }

    fn write<F>(&mut self, what: &str, closes: bool, ops: F) -> Result<WriteOutcome, StoreError>
    where
        F: FnOnce(&mut drawx_store::Transaction<'_>, StrokeId) -> Result<(), StoreError>,
    {
        let Some(id) = self.current else {
            log::warn!("Stroke {what} with no open stroke");
            return Ok(WriteOutcome::NoOpenStroke);
        };
        let Some(store) = self.store(what) else {
            return Ok(WriteOutcome::Dropped);
        };
        if closes {
            self.current = None;
        }

        let mut txn = store.begin();
        match ops(&mut txn, id) {
            Ok(()) => {}
            Err(StoreError::Op(OpError::UnknownStroke(_) | OpError::AlreadyCompleted(_))) => {
                log::warn!("Stroke {id} is gone, dropping {what}");
                self.current = None;
                return Ok(WriteOutcome::StrokeLost);
            }
            Err(e) => return Err(e),
        }
        let info = txn.commit()?;
        Ok(WriteOutcome::Committed {
            version: info.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawx_store::backend::{MemoryBackend, PersistFaults};
    use drawx_store::StoreConfig;

    fn ready_writer() -> (StrokeWriter, StrokeStore) {
        let slot = StoreSlot::new();
        let store = StrokeStore::in_memory();
        slot.publish(store.clone());
        (StrokeWriter::new(slot), store)
    }

    #[test]
    fn test_begin_extend_finish() {
        let (mut w, store) = ready_writer();
        assert!(w.begin_stroke(Point::new(0.0, 0.0), "Peach").unwrap().is_committed());
        let id = w.current().unwrap();
        w.extend_stroke(Point::new(10.0, 10.0)).unwrap();
        let out = w.finish_stroke(Point::new(20.0, 5.0)).unwrap();
        assert_eq!(out, WriteOutcome::Committed { version: 3 });
        assert!(w.current().is_none());

        let stroke = store.get(&id).unwrap();
        assert!(stroke.completed);
        assert_eq!(
            stroke.points,
            vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0), Point::new(20.0, 5.0)]
        );
    }

    #[test]
    fn test_dropped_without_store() {
        let mut w = StrokeWriter::new(StoreSlot::new());
        assert_eq!(
            w.begin_stroke(Point::new(0.0, 0.0), "Dove").unwrap(),
            WriteOutcome::Dropped
        );
        assert!(w.current().is_none());
    }

    #[test]
    fn test_no_open_stroke() {
        let (mut w, store) = ready_writer();
        assert_eq!(
            w.extend_stroke(Point::new(1.0, 1.0)).unwrap(),
            WriteOutcome::NoOpenStroke
        );
        assert_eq!(w.abort_stroke().unwrap(), WriteOutcome::NoOpenStroke);
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_abort_completes_without_point() {
        let (mut w, store) = ready_writer();
        w.begin_stroke(Point::new(3.0, 3.0), "Melon").unwrap();
        let id = w.current().unwrap();
        assert!(w.abort_stroke().unwrap().is_committed());
        let stroke = store.get(&id).unwrap();
        assert!(stroke.completed);
        assert_eq!(stroke.points.len(), 1);
    }

    #[test]
    fn test_begin_completes_dangling_stroke() {
        let (mut w, store) = ready_writer();
        w.begin_stroke(Point::new(0.0, 0.0), "Indigo").unwrap();
        let first = w.current().unwrap();
        w.begin_stroke(Point::new(5.0, 5.0), "Indigo").unwrap();
        let second = w.current().unwrap();

        assert_ne!(first, second);
        assert!(store.get(&first).unwrap().completed);
        assert!(!store.get(&second).unwrap().completed);
        assert_eq!(store.query_all().in_progress().count(), 1);
    }

    #[test]
    fn test_stroke_lost_after_clear() {
        let (mut w, store) = ready_writer();
        w.begin_stroke(Point::new(0.0, 0.0), "Flamingo").unwrap();
        store.delete_all().unwrap();

        assert_eq!(
            w.extend_stroke(Point::new(1.0, 1.0)).unwrap(),
            WriteOutcome::StrokeLost
        );
        assert!(w.current().is_none());
        assert_eq!(
            w.finish_stroke(Point::new(2.0, 2.0)).unwrap(),
            WriteOutcome::NoOpenStroke
        );
        assert!(store.query_all().is_empty());
    }

    #[test]
    fn test_failed_begin_keeps_dangling_stroke() {
        let faults = PersistFaults::new();
        let store = StrokeStore::with_backend(
            Box::new(MemoryBackend::with_faults(faults.clone())),
            StoreConfig::memory(),
        );
        let slot = StoreSlot::new();
        slot.publish(store.clone());
        let mut w = StrokeWriter::new(slot);

        w.begin_stroke(Point::new(0.0, 0.0), "Indigo").unwrap();
        let first = w.current().unwrap();

        faults.fail_next(1);
        assert!(matches!(
            w.begin_stroke(Point::new(5.0, 5.0), "Indigo"),
            Err(StoreError::Io(_))
        ));
        assert_eq!(w.current(), Some(first));
        assert!(!store.get(&first).unwrap().completed);

        w.begin_stroke(Point::new(5.0, 5.0), "Indigo").unwrap();
        assert_ne!(w.current(), Some(first));
        assert!(store.get(&first).unwrap().completed);
        assert_eq!(store.query_all().in_progress().count(), 1);
    }
}
