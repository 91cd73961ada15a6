//! Commit feed and concurrent access.

use std::sync::Arc;
use std::thread;

use drawx_core::{Point, StrokeOp};
use drawx_store::{CommitOrigin, StrokeStore};
use uuid::Uuid;

#[tokio::test]
async fn test_every_commit_published_once() {
    let store = StrokeStore::in_memory();
    let mut rx = store.subscribe_commits();

    let mut txn = store.begin();
    let id = txn.create_stroke("Peach", Point::new(0.0, 0.0)).unwrap();
    txn.commit().unwrap();
    let mut txn = store.begin();
    txn.append_point(id, Point::new(10.0, 10.0)).unwrap();
    txn.complete_stroke(id).unwrap();
    txn.commit().unwrap();
    store.delete_all().unwrap();

    let versions: Vec<u64> = vec![
        rx.recv().await.unwrap().version,
        rx.recv().await.unwrap().version,
        rx.recv().await.unwrap().version,
    ];
    assert_eq!(versions, vec![1, 2, 3]);
    assert!(rx.try_recv().is_err());
    assert_eq!(store.stats().feed.records_published, 3);
}

#[tokio::test]
async fn test_feed_replays_into_second_store() {
    let origin = StrokeStore::in_memory();
    let replica = StrokeStore::in_memory();
    let mut rx = origin.subscribe_commits();
    let device = Uuid::new_v4();

    let mut txn = origin.begin();
    let id = txn.create_stroke("GrapeJelly", Point::new(1.0, 1.0)).unwrap();
    txn.append_point(id, Point::new(2.0, 2.0)).unwrap();
    txn.commit().unwrap();
    let mut txn = origin.begin();
    txn.complete_stroke(id).unwrap();
    txn.commit().unwrap();

    for _ in 0..2 {
        let record = rx.recv().await.unwrap();
        assert_eq!(record.origin, CommitOrigin::Local);
        replica.apply_remote(device, record.ops.clone()).unwrap();
    }

    let a = origin.get(&id).unwrap();
    let b = replica.get(&id).unwrap();
    assert_eq!(*a, *b);
    assert_eq!(replica.stats().remote_commits, 2);
}

#[tokio::test]
async fn test_remote_commit_wakes_watchers() {
    let store = StrokeStore::in_memory();
    let mut watcher = store.changes();
    store
        .apply_remote(
            Uuid::new_v4(),
            vec![StrokeOp::Create {
                id: Uuid::new_v4(),
                color: "Mulberry".into(),
                point: Point::new(0.0, 0.0),
            }],
        )
        .unwrap();
    assert_eq!(watcher.wait_for_change().await.unwrap(), 1);
}

#[test]
fn test_readers_see_consistent_snapshots_during_writes() {
    let store = StrokeStore::in_memory();
    let mut txn = store.begin();
    let id = txn.create_stroke("Charcoal", Point::new(0.0, 0.0)).unwrap();
    txn.commit().unwrap();

    let writer = {
        let store = store.clone();
        thread::spawn(move || {
            for i in 1..=200 {
                let mut txn = store.begin();
                txn.append_point(id, Point::new(i as f64, i as f64)).unwrap();
                txn.commit().unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                let mut last = 0;
                for _ in 0..200 {
                    let snapshot: Arc<_> = store.query_all();
                    let stroke = snapshot.get(&id).unwrap();
                    // Point count and version always move together.
                    assert_eq!(stroke.points.len() as u64, snapshot.version());
                    assert!(snapshot.version() >= last);
                    last = snapshot.version();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(store.query_all().get(&id).unwrap().points.len(), 201);
}
