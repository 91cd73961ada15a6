//! Persistence integration tests.
//!
//! Verifies:
//! - Strokes committed through the file backend survive a reopen
//! - Recovery after compaction and after a clear
//! - A torn trailing log record is ignored
//! - Versions keep counting up across restarts

use std::fs::OpenOptions;
use std::io::Write;

use drawx_core::Point;
use drawx_store::{StoreConfig, StrokeStore};
use tempfile::tempdir;

fn draw(store: &StrokeStore, color: &str, points: &[(f64, f64)]) -> drawx_core::StrokeId {
    let mut txn = store.begin();
    let id = txn.create_stroke(color, points[0].into()).unwrap();
    txn.commit().unwrap();
    for &p in &points[1..] {
        let mut txn = store.begin();
        txn.append_point(id, p.into()).unwrap();
        txn.commit().unwrap();
    }
    let mut txn = store.begin();
    txn.complete_stroke(id).unwrap();
    txn.commit().unwrap();
    id
}

#[test]
fn test_strokes_survive_reopen() {
    let dir = tempdir().unwrap();
    let config = StoreConfig {
        compaction_threshold: 1000,
        ..StoreConfig::for_testing(dir.path())
    };

    let id = {
        let store = StrokeStore::open(config.clone()).unwrap();
        let id = draw(&store, "Peach", &[(0.0, 0.0), (10.0, 10.0), (20.0, 5.0)]);
        store.flush().unwrap();
        id
    };

    let store = StrokeStore::open(config).unwrap();
    let stroke = store.get(&id).unwrap();
    assert_eq!(stroke.color, "Peach");
    assert!(stroke.completed);
    assert_eq!(
        stroke.points,
        vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0), Point::new(20.0, 5.0)]
    );
    assert_eq!(store.version(), 4);
}

#[test]
fn test_recovery_after_compaction() {
    let dir = tempdir().unwrap();
    // for_testing compacts every 8 records.
    let config = StoreConfig::for_testing(dir.path());
    let points: Vec<(f64, f64)> = (0..25).map(|i| (i as f64, (i * 2) as f64)).collect();

    let (a, b) = {
        let store = StrokeStore::open(config.clone()).unwrap();
        let a = draw(&store, "Melon", &points);
        let b = draw(&store, "Dove", &points[..3]);
        (a, b)
    };

    let store = StrokeStore::open(config).unwrap();
    let snapshot = store.query_all();
    let order: Vec<_> = snapshot.iter().map(|s| s.id).collect();
    assert_eq!(order, vec![a, b]);
    assert_eq!(snapshot.get(&a).unwrap().points.len(), 25);
    assert_eq!(snapshot.get(&b).unwrap().points.len(), 3);
    assert_eq!(store.version(), 26 + 4);
}

#[test]
fn test_clear_survives_reopen() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::for_testing(dir.path());
    {
        let store = StrokeStore::open(config.clone()).unwrap();
        draw(&store, "Indigo", &[(1.0, 1.0), (2.0, 2.0)]);
        store.delete_all().unwrap();
        draw(&store, "Flamingo", &[(5.0, 5.0)]);
    }

    let store = StrokeStore::open(config).unwrap();
    let snapshot = store.query_all();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.iter().next().unwrap().color, "Flamingo");
}

#[test]
fn test_torn_tail_is_ignored() {
    let dir = tempdir().unwrap();
    let config = StoreConfig {
        compaction_threshold: 1000,
        ..StoreConfig::for_testing(dir.path())
    };
    let id = {
        let store = StrokeStore::open(config.clone()).unwrap();
        draw(&store, "Charcoal", &[(0.0, 0.0), (3.0, 4.0)])
    };

    // Half-written frame: a length header promising more bytes than follow.
    {
        let mut wal = OpenOptions::new()
            .append(true)
            .open(dir.path().join("strokes.wal"))
            .unwrap();
        wal.write_all(&[64, 0, 0, 0, 1, 2, 3]).unwrap();
    }

    let store = StrokeStore::open(config.clone()).unwrap();
    assert_eq!(store.get(&id).unwrap().points.len(), 2);
    let version = store.version();

    // New commits land after the truncated tail and are recovered too.
    draw(&store, "Elephant", &[(9.0, 9.0)]);
    drop(store);
    let store = StrokeStore::open(config).unwrap();
    assert_eq!(store.query_all().len(), 2);
    assert_eq!(store.version(), version + 2);
}

#[test]
fn test_in_progress_stroke_survives_reopen() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::for_testing(dir.path());
    let id = {
        let store = StrokeStore::open(config.clone()).unwrap();
        let mut txn = store.begin();
        let id = txn.create_stroke("Ultramarine", Point::new(1.0, 2.0)).unwrap();
        txn.commit().unwrap();
        id
    };

    let store = StrokeStore::open(config).unwrap();
    let stroke = store.get(&id).unwrap();
    assert!(!stroke.completed);

    // Still open, so it can be finished after the restart.
    let mut txn = store.begin();
    txn.append_point(id, Point::new(3.0, 4.0)).unwrap();
    txn.complete_stroke(id).unwrap();
    txn.commit().unwrap();
    assert!(store.get(&id).unwrap().completed);
}

#[test]
fn test_clear_survives_failed_compaction() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::for_testing(dir.path());

    let kept = {
        let store = StrokeStore::open(config.clone()).unwrap();
        draw(&store, "Peach", &[(0.0, 0.0), (5.0, 5.0)]);

        let blocker = dir.path().join("strokes.snapshot");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), b"x").unwrap();

        let info = store.delete_all().unwrap();
        assert_eq!(info.version, 4);
        assert!(store.query_all().is_empty());

        std::fs::remove_dir_all(&blocker).unwrap();
        let kept = draw(&store, "Melon", &[(1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(store.version(), 7);
        store.flush().unwrap();
        kept
    };

    let store = StrokeStore::open(config).unwrap();
    assert_eq!(store.version(), 7);
    let snapshot = store.query_all();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains(&kept));
}
