//! TTL and durability behavior of the snapshot store against real on-disk
//! records.

use chrono::Utc;
use tempfile::TempDir;
use toolward::undo::{DEFAULT_TTL_DAYS, OperationSnapshot, ReversibleOperationStore, UndoOutcome};

/// Persist a snapshot record whose creation time is `age_days` in the past,
/// the way a previous run of the store would have left it.
fn seed_aged_snapshot(dir: &std::path::Path, id: &str, age_days: i64) {
    let mut snapshot = OperationSnapshot::new(
        "task-1",
        "translate",
        None,
        "before".to_string(),
        "after".to_string(),
        "aged record",
    );
    snapshot.id = id.to_string();
    snapshot.created_at = Utc::now() - chrono::Duration::days(age_days);

    std::fs::create_dir_all(dir).expect("create snapshot dir");
    std::fs::write(
        dir.join(id),
        serde_json::to_string_pretty(&snapshot).expect("serialize"),
    )
    .expect("write snapshot file");
}

#[tokio::test]
async fn six_day_old_snapshot_still_restores() {
    let tmp = TempDir::new().expect("tempdir");
    let dir = tmp.path().join("undo");
    seed_aged_snapshot(&dir, "young", 6);

    let store = ReversibleOperationStore::open(&dir, DEFAULT_TTL_DAYS)
        .await
        .expect("open store");
    assert!(matches!(
        store.undo("young").await,
        UndoOutcome::Restored { .. }
    ));
}

#[tokio::test]
async fn eight_day_old_snapshot_is_expired_and_left_on_disk() {
    let tmp = TempDir::new().expect("tempdir");
    let dir = tmp.path().join("undo");
    seed_aged_snapshot(&dir, "stale", 8);

    let store = ReversibleOperationStore::open(&dir, DEFAULT_TTL_DAYS)
        .await
        .expect("open store");

    let before = std::fs::read_to_string(dir.join("stale")).expect("read record");
    assert!(matches!(store.undo("stale").await, UndoOutcome::Expired));

    // No destructive action was taken: the on-disk record is untouched.
    let after = std::fs::read_to_string(dir.join("stale")).expect("read record");
    assert_eq!(before, after);
}

#[tokio::test]
async fn cleanup_sweeps_only_expired_records() {
    let tmp = TempDir::new().expect("tempdir");
    let dir = tmp.path().join("undo");
    seed_aged_snapshot(&dir, "stale", 8);
    seed_aged_snapshot(&dir, "young", 1);

    let store = ReversibleOperationStore::open(&dir, DEFAULT_TTL_DAYS)
        .await
        .expect("open store");

    assert_eq!(store.cleanup_expired().await, 1);
    assert!(!dir.join("stale").exists());
    assert!(dir.join("young").exists());

    // After the sweep the expired id is gone entirely.
    assert!(matches!(store.undo("stale").await, UndoOutcome::NotFound));
    assert_eq!(store.list().await.len(), 1);
}

#[tokio::test]
async fn restore_removes_record_from_memory_and_disk() {
    let tmp = TempDir::new().expect("tempdir");
    let dir = tmp.path().join("undo");
    let target = tmp.path().join("doc.txt");
    std::fs::write(&target, "modified").expect("seed target");

    let store = ReversibleOperationStore::open(&dir, DEFAULT_TTL_DAYS)
        .await
        .expect("open store");
    let id = store
        .create(
            "task-1",
            "translate",
            Some(target.clone()),
            "original".to_string(),
            "modified".to_string(),
            "translate doc.txt",
        )
        .await
        .expect("create");
    assert!(dir.join(&id).exists());

    assert!(matches!(
        store.undo(&id).await,
        UndoOutcome::Restored { .. }
    ));
    assert_eq!(
        std::fs::read_to_string(&target).expect("read target"),
        "original"
    );
    assert!(!dir.join(&id).exists());
    assert!(matches!(store.undo(&id).await, UndoOutcome::NotFound));
}
