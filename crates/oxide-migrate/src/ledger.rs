//! The migration ledger.
//!
//! The ledger records which migration files have been applied, with the
//! SHA-256 of the content that was applied and the batch it was applied in.
//! It is stored as pretty-printed JSON so operators can read it:
//!
//! ```json
//! {
//!   "migrations": [
//!     {
//!       "filename": "20240301120000_create_users.schema",
//!       "content_hash": "9f86d0…",
//!       "applied_at": "2024-03-01T12:00:00Z",
//!       "batch": 1
//!     }
//!   ],
//!   "current_batch": 1
//! }
//! ```
//!
//! Every read and write happens while holding the ledger lock, and every
//! mutation is a read-modify-write inside a single lock scope, so two
//! processes recording batches at the same time get distinct batch numbers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{IntegrityError, MigrateError, Result};
use crate::lock::{FileLock, LockManager, LockPolicy};

/// Suffix of the temporary file a new ledger is written to before it is
/// renamed into place.
const TEMP_SUFFIX: &str = ".tmp";

/// Returns the hex-encoded SHA-256 of a migration's content.
#[must_use]
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// One applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Migration filename.
    pub filename: String,
    /// SHA-256 of the applied content, hex encoded.
    pub content_hash: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
    /// Batch the migration was applied in. Starts at 1.
    pub batch: u32,
}

/// The persisted ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Applied migrations, in the order they were recorded.
    pub migrations: Vec<LedgerEntry>,
    /// Highest batch number in `migrations`, or 0 when empty.
    pub current_batch: u32,
}

impl LedgerState {
    /// Returns the entry for `filename`.
    #[must_use]
    pub fn entry(&self, filename: &str) -> Option<&LedgerEntry> {
        self.migrations.iter().find(|e| e.filename == filename)
    }

    /// Returns true if `filename` has been applied.
    #[must_use]
    pub fn is_applied(&self, filename: &str) -> bool {
        self.entry(filename).is_some()
    }

    /// Returns the entries of `batch`, in the order they were applied.
    #[must_use]
    pub fn entries_in_batch(&self, batch: u32) -> Vec<&LedgerEntry> {
        self.migrations.iter().filter(|e| e.batch == batch).collect()
    }

    /// Checks `content` against the hash recorded for `filename`.
    /// Files that were never applied have nothing to verify.
    ///
    /// # Errors
    ///
    /// Returns `IntegrityError::HashMismatch` if the content changed.
    pub fn verify(&self, filename: &str, content: &str) -> std::result::Result<(), IntegrityError> {
        match self.entry(filename) {
            Some(entry) if entry.content_hash != content_hash(content) => {
                Err(IntegrityError::HashMismatch {
                    filename: filename.to_string(),
                    applied_at: entry.applied_at,
                })
            }
            _ => Ok(()),
        }
    }

    /// Removes every entry of `batch` and returns them.
    fn remove_batch(&mut self, batch: u32) -> Vec<LedgerEntry> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.migrations)
            .into_iter()
            .partition(|e| e.batch == batch);
        self.migrations = kept;
        self.current_batch = if self.migrations.is_empty() {
            0
        } else {
            self.migrations.iter().map(|e| e.batch).max().unwrap_or(0)
        };
        removed
    }

    /// Checks the structural invariants of a loaded ledger.
    fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.migrations {
            if entry.batch == 0 {
                return Err(format!("entry '{}' has batch 0", entry.filename));
            }
            if entry.batch > self.current_batch {
                return Err(format!(
                    "entry '{}' has batch {} but current_batch is {}",
                    entry.filename, entry.batch, self.current_batch
                ));
            }
            if !seen.insert(entry.filename.as_str()) {
                return Err(format!("entry '{}' is recorded twice", entry.filename));
            }
        }

        let max = self.migrations.iter().map(|e| e.batch).max().unwrap_or(0);
        if max != self.current_batch {
            return Err(format!(
                "current_batch is {} but the highest recorded batch is {max}",
                self.current_batch
            ));
        }
        Ok(())
    }
}

/// A migration to record, with the exact content that was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Migration filename.
    pub filename: String,
    /// Content that was applied.
    pub content: String,
}

impl BatchItem {
    /// Creates a batch item.
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// Handle on the ledger file.
#[derive(Clone)]
pub struct Ledger {
    path: PathBuf,
    lock: Arc<dyn LockManager>,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    /// Creates a ledger handle using the given lock and clock.
    pub fn new(path: impl Into<PathBuf>, lock: Arc<dyn LockManager>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            lock,
            clock,
        }
    }

    /// Creates a ledger handle guarded by a [`FileLock`] next to `path`.
    pub fn with_file_lock(path: impl Into<PathBuf>, policy: LockPolicy, clock: Arc<dyn Clock>) -> Self {
        let path = path.into();
        let lock = Arc::new(FileLock::for_ledger(&path, policy));
        Self::new(path, lock, clock)
    }

    /// Returns the ledger file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the ledger. A missing file is an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns `IntegrityError::Corrupted` if the file cannot be trusted,
    /// or a lock/IO error.
    pub async fn load(&self) -> Result<LedgerState> {
        let _guard = self.lock.acquire().await?;
        self.read().await
    }

    /// Replaces the ledger with `state`.
    ///
    /// # Errors
    ///
    /// Returns a lock, IO or serialization error.
    pub async fn save(&self, state: &LedgerState) -> Result<()> {
        let _guard = self.lock.acquire().await?;
        self.write(state).await
    }

    /// Records `items` as one new batch and returns the new entries.
    /// Does nothing for an empty list.
    ///
    /// # Errors
    ///
    /// Returns `IntegrityError::AlreadyRecorded` if any file is already in
    /// the ledger (nothing is written then), or a lock/IO error.
    pub async fn record_batch(&self, items: &[BatchItem]) -> Result<Vec<LedgerEntry>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.lock.acquire().await?;
        let mut state = self.read().await?;

        let mut seen = std::collections::HashSet::new();
        for item in items {
            if state.is_applied(&item.filename) || !seen.insert(item.filename.as_str()) {
                return Err(IntegrityError::AlreadyRecorded {
                    filename: item.filename.clone(),
                }
                .into());
            }
        }

        let batch = state.current_batch + 1;
        let applied_at = self.clock.now();
        let entries: Vec<LedgerEntry> = items
            .iter()
            .map(|item| LedgerEntry {
                filename: item.filename.clone(),
                content_hash: content_hash(&item.content),
                applied_at,
                batch,
            })
            .collect();

        state.migrations.extend(entries.iter().cloned());
        state.current_batch = batch;
        self.write(&state).await?;

        info!(batch, count = entries.len(), "Recorded batch");
        Ok(entries)
    }

    /// Removes the current batch and returns its entries.
    ///
    /// # Errors
    ///
    /// Returns a lock, IO or integrity error.
    pub async fn rollback_last_batch(&self) -> Result<Vec<LedgerEntry>> {
        let _guard = self.lock.acquire().await?;
        let mut state = self.read().await?;
        self.remove_batch(&mut state).await
    }

    /// Removes batch `expected`, provided it is still the current batch.
    ///
    /// # Errors
    ///
    /// Returns `IntegrityError::BatchChanged` if another process changed the
    /// current batch since the caller looked, or a lock/IO error.
    pub async fn rollback_batch(&self, expected: u32) -> Result<Vec<LedgerEntry>> {
        let _guard = self.lock.acquire().await?;
        let mut state = self.read().await?;
        if state.current_batch != expected {
            return Err(IntegrityError::BatchChanged {
                expected,
                found: state.current_batch,
            }
            .into());
        }
        self.remove_batch(&mut state).await
    }

    /// Checks `content` against the hash recorded for `filename`.
    ///
    /// # Errors
    ///
    /// Returns `IntegrityError::HashMismatch` if the content changed.
    pub async fn verify_integrity(&self, filename: &str, content: &str) -> Result<()> {
        self.load().await?.verify(filename, content)?;
        Ok(())
    }

    async fn remove_batch(&self, state: &mut LedgerState) -> Result<Vec<LedgerEntry>> {
        if state.current_batch == 0 {
            return Ok(Vec::new());
        }
        let batch = state.current_batch;
        let removed = state.remove_batch(batch);
        self.write(state).await?;
        info!(batch, count = removed.len(), "Rolled back batch");
        Ok(removed)
    }

    /// Reads the ledger file. The caller holds the lock.
    async fn read(&self) -> Result<LedgerState> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No ledger yet, starting empty");
                return Ok(LedgerState::default());
            }
            Err(e) => return Err(MigrateError::file_io(&self.path)(e)),
        };

        let state: LedgerState =
            serde_json::from_slice(&bytes).map_err(|e| IntegrityError::Corrupted {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        state.validate().map_err(|reason| IntegrityError::Corrupted {
            path: self.path.clone(),
            reason,
        })?;

        debug!(
            path = %self.path.display(),
            migrations = state.migrations.len(),
            current_batch = state.current_batch,
            "Loaded ledger"
        );
        Ok(state)
    }

    /// Writes the ledger to a temporary file and renames it into place.
    /// The caller holds the lock.
    async fn write(&self, state: &LedgerState) -> Result<()> {
        let mut json = serde_json::to_string_pretty(state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(MigrateError::file_io(parent))?;
            }
        }

        let mut temp = self.path.as_os_str().to_owned();
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);

        let mut file = tokio::fs::File::create(&temp)
            .await
            .map_err(MigrateError::file_io(&temp))?;
        json.push('\n');
        file.write_all(json.as_bytes())
            .await
            .map_err(MigrateError::file_io(&temp))?;
        file.sync_all().await.map_err(MigrateError::file_io(&temp))?;
        drop(file);
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(MigrateError::file_io(&self.path))?;

        debug!(
            path = %self.path.display(),
            migrations = state.migrations.len(),
            current_batch = state.current_batch,
            "Saved ledger"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    fn ledger(dir: &Path) -> Ledger {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        Ledger::with_file_lock(dir.join("ledger.json"), LockPolicy::default(), Arc::new(clock))
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(content_hash("a"), content_hash("a "));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = ledger(dir.path()).load().await.unwrap();
        assert_eq!(state, LedgerState::default());
        assert!(!dir.path().join("ledger.json").exists());
    }

    #[tokio::test]
    async fn test_record_batch_assigns_one_batch_number() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(dir.path());

        let first = ledger
            .record_batch(&[BatchItem::new("a.schema", "A"), BatchItem::new("b.schema", "B")])
            .await
            .unwrap();
        assert!(first.iter().all(|e| e.batch == 1));

        let second = ledger
            .record_batch(&[BatchItem::new("c.schema", "C")])
            .await
            .unwrap();
        assert_eq!(second[0].batch, 2);

        let state = ledger.load().await.unwrap();
        assert_eq!(state.current_batch, 2);
        assert_eq!(state.entries_in_batch(1).len(), 2);
        assert_eq!(state.entry("b.schema").unwrap().content_hash, content_hash("B"));
        assert!(!dir.path().join("ledger.json.lock").exists());
    }

    #[tokio::test]
    async fn test_record_empty_batch_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(dir.path());
        assert!(ledger.record_batch(&[]).await.unwrap().is_empty());
        assert!(!dir.path().join("ledger.json").exists());
    }

    #[tokio::test]
    async fn test_record_refuses_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(dir.path());
        ledger
            .record_batch(&[BatchItem::new("a.schema", "A")])
            .await
            .unwrap();

        let err = ledger
            .record_batch(&[BatchItem::new("b.schema", "B"), BatchItem::new("a.schema", "A")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Integrity(IntegrityError::AlreadyRecorded { ref filename }) if filename == "a.schema"
        ));
        assert!(!ledger.load().await.unwrap().is_applied("b.schema"));
    }

    #[tokio::test]
    async fn test_rollback_to_empty_resets_batch() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(dir.path());
        ledger
            .record_batch(&[BatchItem::new("a.schema", "A")])
            .await
            .unwrap();

        let removed = ledger.rollback_last_batch().await.unwrap();
        assert_eq!(removed.len(), 1);
        let state = ledger.load().await.unwrap();
        assert_eq!(state, LedgerState::default());

        assert!(ledger.rollback_last_batch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_recomputes_current_batch() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(dir.path());
        ledger.record_batch(&[BatchItem::new("a.schema", "A")]).await.unwrap();
        ledger.record_batch(&[BatchItem::new("b.schema", "B")]).await.unwrap();

        let err = ledger.rollback_batch(1).await.unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Integrity(IntegrityError::BatchChanged { expected: 1, found: 2 })
        ));

        ledger.rollback_batch(2).await.unwrap();
        let state = ledger.load().await.unwrap();
        assert_eq!(state.current_batch, 1);
        assert!(state.is_applied("a.schema"));
    }

    #[tokio::test]
    async fn test_corrupted_ledger_is_not_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ledger(dir.path()).load().await.unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Integrity(IntegrityError::Corrupted { .. })
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_binary_ledger_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let err = ledger(dir.path()).load().await.unwrap_err();
        match err {
            MigrateError::Integrity(IntegrityError::Corrupted { path: ref reported, .. }) => {
                assert_eq!(reported, &path);
            }
            other => panic!("expected a corrupted ledger, got {other:?}"),
        }
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xff, 0xfe, 0x00]);
    }

    #[tokio::test]
    async fn test_write_failure_names_the_ledger() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("ledger.json")).unwrap();

        let err = ledger(dir.path())
            .save(&LedgerState::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::FileIo { ref path, .. } if path.ends_with("ledger.json")));
    }

    #[tokio::test]
    async fn test_missing_field_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ledger.json"), r#"{"migrations": []}"#).unwrap();
        let err = ledger(dir.path()).load().await.unwrap_err();
        assert!(err.to_string().contains("current_batch"));
    }

    #[tokio::test]
    async fn test_inconsistent_batch_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ledger.json"),
            r#"{"migrations": [{"filename": "a.schema", "content_hash": "00", "applied_at": "2024-03-01T12:00:00Z", "batch": 2}], "current_batch": 1}"#,
        )
        .unwrap();
        let err = ledger(dir.path()).load().await.unwrap_err();
        assert!(err.to_string().contains("has batch 2 but current_batch is 1"));
    }

    #[tokio::test]
    async fn test_verify_integrity() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(dir.path());
        ledger.record_batch(&[BatchItem::new("a.schema", "A")]).await.unwrap();

        ledger.verify_integrity("a.schema", "A").await.unwrap();
        let err = ledger.verify_integrity("a.schema", "A changed").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Integrity error: Migration 'a.schema' was modified after it was applied at 2024-03-01 12:00:00 UTC"
        );
    }

    #[tokio::test]
    async fn test_saved_file_is_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(dir.path());
        ledger.record_batch(&[BatchItem::new("a.schema", "A")]).await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("ledger.json")).unwrap();
        assert!(text.contains("\n  \"current_batch\": 1"));
        assert!(!dir.path().join("ledger.json.tmp").exists());
    }
}
