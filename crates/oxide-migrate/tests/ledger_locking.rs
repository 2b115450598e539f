//! Ledger behaviour under concurrent access.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fixed_clock, quick_lock_policy};
use oxide_migrate::prelude::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_batches_get_distinct_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");

    let mut handles = Vec::new();
    for writer in 0..8 {
        let path = path.clone();
        handles.push(tokio::spawn(async move {
            // Each writer has its own handle, like a separate process would.
            let ledger = Ledger::with_file_lock(path, quick_lock_policy(), fixed_clock());
            ledger
                .record_batch(&[
                    BatchItem::new(format!("w{writer}_a.schema"), "a"),
                    BatchItem::new(format!("w{writer}_b.schema"), "b"),
                ])
                .await
                .unwrap()
        }));
    }

    for handle in handles {
        let entries = handle.await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].batch, entries[1].batch);
    }

    let ledger = Ledger::with_file_lock(&path, quick_lock_policy(), fixed_clock());
    let state = ledger.load().await.unwrap();
    assert_eq!(state.current_batch, 8);
    assert_eq!(state.migrations.len(), 16);
    for batch in 1..=8 {
        let entries = state.entries_in_batch(batch);
        assert_eq!(entries.len(), 2, "batch {batch}");
        let writer = entries[0].filename.split('_').next().unwrap();
        assert!(entries.iter().all(|e| e.filename.starts_with(writer)));
    }
    assert!(!dir.path().join("ledger.json.lock").exists());
}

#[tokio::test]
async fn held_lock_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let policy = LockPolicy {
        timeout: Duration::from_millis(100),
        ..quick_lock_policy()
    };
    let ledger = Ledger::with_file_lock(&path, policy, fixed_clock());

    let other = FileLock::for_ledger(&path, policy);
    let guard = other.acquire().await.unwrap();

    let err = ledger
        .record_batch(&[BatchItem::new("a.schema", "a")])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MigrateError::Integrity(IntegrityError::LockTimeout { .. })
    ));
    assert!(!path.exists());

    drop(guard);
    ledger
        .record_batch(&[BatchItem::new("a.schema", "a")])
        .await
        .unwrap();
}

#[tokio::test]
async fn abandoned_lock_is_taken_over() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    std::fs::write(dir.path().join("ledger.json.lock"), "pid 99999\n").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let policy = LockPolicy {
        stale_after: Duration::from_millis(10),
        ..quick_lock_policy()
    };
    let ledger = Ledger::with_file_lock(&path, policy, fixed_clock());
    ledger
        .record_batch(&[BatchItem::new("a.schema", "a")])
        .await
        .unwrap();
    assert!(!dir.path().join("ledger.json.lock").exists());
}

#[tokio::test]
async fn lock_is_released_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    std::fs::write(&path, "[]").unwrap();

    let ledger = Ledger::with_file_lock(&path, quick_lock_policy(), fixed_clock());
    let err = ledger.load().await.unwrap_err();
    assert!(matches!(
        err,
        MigrateError::Integrity(IntegrityError::Corrupted { .. })
    ));
    assert!(!dir.path().join("ledger.json.lock").exists());
}

#[tokio::test]
async fn custom_lock_manager() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLock {
        released: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl LockManager for CountingLock {
        async fn acquire(&self) -> Result<LockGuard> {
            let released = self.released.clone();
            Ok(LockGuard::new(move || {
                released.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let released = Arc::new(AtomicUsize::new(0));
    let lock = Arc::new(CountingLock {
        released: released.clone(),
    });
    let ledger = Ledger::new(dir.path().join("ledger.json"), lock, fixed_clock());

    ledger
        .record_batch(&[BatchItem::new("a.schema", "a")])
        .await
        .unwrap();
    ledger.rollback_last_batch().await.unwrap();
    assert_eq!(released.load(Ordering::SeqCst), 2);
}
