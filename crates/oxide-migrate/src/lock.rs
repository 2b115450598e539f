//! Mutual exclusion around ledger reads and writes.
//!
//! Several processes (two CI jobs, say) may run migrations against the same
//! ledger at once. Every ledger operation runs while holding a lock obtained
//! from a [`LockManager`]; the returned [`LockGuard`] releases it on drop, so
//! error paths release it too.
//!
//! [`FileLock`] is the default backend: an exclusively created marker file
//! next to the ledger. Marker files are not reliable on network file
//! systems (NFS, SMB); use a different `LockManager` there.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{IntegrityError, MigrateError, Result};

/// Suffix appended to the ledger path to form the lock marker path.
pub const LOCK_SUFFIX: &str = ".lock";

/// Suffix of the marker serializing takeovers of a stale lock.
const TAKEOVER_SUFFIX: &str = ".takeover";

/// Timing policy for lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPolicy {
    /// Give up after waiting this long.
    pub timeout: Duration,
    /// Pause between attempts.
    pub retry_interval: Duration,
    /// A marker older than this is considered abandoned.
    pub stale_after: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry_interval: Duration::from_millis(100),
            stale_after: Duration::from_secs(300),
        }
    }
}

/// A held lock. Dropping it releases the lock.
pub struct LockGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LockGuard {
    /// Creates a guard that runs `release` when dropped.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// Something that hands out an exclusive lock.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Blocks until the lock is held or the manager's timeout expires.
    ///
    /// # Errors
    ///
    /// Returns `IntegrityError::LockTimeout` on timeout, or an IO error.
    async fn acquire(&self) -> Result<LockGuard>;
}

/// A lock backed by an exclusively created marker file.
#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
    policy: LockPolicy,
}

impl FileLock {
    /// Creates a lock using the marker at `path`.
    pub fn new(path: impl Into<PathBuf>, policy: LockPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    /// Creates the lock guarding the ledger at `ledger_path`.
    pub fn for_ledger(ledger_path: &Path, policy: LockPolicy) -> Self {
        let mut path = ledger_path.as_os_str().to_owned();
        path.push(LOCK_SUFFIX);
        Self::new(path, policy)
    }

    /// Returns the marker path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the timing policy.
    #[must_use]
    pub fn policy(&self) -> &LockPolicy {
        &self.policy
    }

    /// Reads the current marker and its age, or `None` if there is no marker.
    async fn inspect(&self) -> Result<Option<Marker>> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MigrateError::file_io(&self.path)(e)),
        };
        let modified = metadata
            .modified()
            .map_err(MigrateError::file_io(&self.path))?;
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MigrateError::file_io(&self.path)(e)),
        };
        Ok(Some(Marker {
            contents,
            // A marker dated in the future counts as fresh.
            age: modified.elapsed().unwrap_or_default(),
        }))
    }

    async fn try_create(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await?;
        let marker = format!(
            "pid {}\ntoken {token}\nacquired_at {}\n",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );
        file.write_all(marker.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Removes the abandoned marker `stale`.
    ///
    /// Takeovers are serialized through a second exclusively created marker,
    /// and the lock marker is re-read under it: a waiter that judged a marker
    /// stale after another waiter already replaced it finds the new marker
    /// and leaves it alone. Returns false if another waiter is mid-takeover.
    async fn take_over(&self, stale: &Marker, token: &str) -> Result<bool> {
        let mut gate = self.path.as_os_str().to_owned();
        gate.push(TAKEOVER_SUFFIX);
        let gate = PathBuf::from(gate);

        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&gate)
            .await
        {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // Another waiter is taking over, unless it died doing so.
                let abandoned = tokio::fs::metadata(&gate)
                    .await
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .and_then(|modified| modified.elapsed().ok())
                    .is_some_and(|age| age > self.policy.stale_after);
                if abandoned {
                    let _ = tokio::fs::remove_file(&gate).await;
                }
                return Ok(false);
            }
            Err(e) => return Err(MigrateError::file_io(&gate)(e)),
        }

        let result = self.remove_if_unchanged(stale, token).await;
        if let Err(e) = tokio::fs::remove_file(&gate).await {
            warn!(path = %gate.display(), error = %e, "Failed to remove takeover marker");
        }
        result.map(|()| true)
    }

    /// Removes the lock marker if it is still `stale`. The caller holds the
    /// takeover marker.
    async fn remove_if_unchanged(&self, stale: &Marker, token: &str) -> Result<()> {
        match self.inspect().await? {
            Some(current) if current.contents == stale.contents => {}
            _ => return Ok(()),
        }

        // Rename first so a release and re-lock racing with us is detected.
        let mut aside = self.path.as_os_str().to_owned();
        aside.push(format!(".stale-{token}"));
        let aside = PathBuf::from(aside);
        match tokio::fs::rename(&self.path, &aside).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(MigrateError::file_io(&self.path)(e)),
        }

        let moved = tokio::fs::read(&aside)
            .await
            .map_err(MigrateError::file_io(&aside))?;
        if moved == stale.contents {
            warn!(
                path = %self.path.display(),
                age_secs = stale.age.as_secs(),
                "Removed stale lock"
            );
        } else if let Err(e) = tokio::fs::hard_link(&aside, &self.path).await {
            warn!(
                path = %self.path.display(),
                error = %e,
                "Moved a live lock marker and could not restore it"
            );
        }
        tokio::fs::remove_file(&aside)
            .await
            .map_err(MigrateError::file_io(&aside))
    }
}

/// A lock marker as read from disk.
struct Marker {
    contents: Vec<u8>,
    age: Duration,
}

/// Returns a token no other acquisition, in this or another process, uses.
fn unique_token() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!(
        "{}-{nanos}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// Removes the marker at `path` if it still carries `token`.
fn release(path: &Path, token: &str) {
    let owned = match std::fs::read_to_string(path) {
        Ok(contents) => contents.lines().any(|line| line.strip_prefix("token ") == Some(token)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Lock marker vanished while held");
            return;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read lock marker on release");
            return;
        }
    };
    if !owned {
        warn!(path = %path.display(), "Lock was taken over while held, leaving the marker");
        return;
    }
    if let Err(e) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "Failed to release lock");
    }
}

#[async_trait]
impl LockManager for FileLock {
    async fn acquire(&self) -> Result<LockGuard> {
        let started = Instant::now();
        let token = unique_token();

        loop {
            match self.try_create(&token).await {
                Ok(()) => {
                    debug!(path = %self.path.display(), "Acquired lock");
                    let path = self.path.clone();
                    return Ok(LockGuard::new(move || release(&path, &token)));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(MigrateError::file_io(&self.path)(e)),
            }

            match self.inspect().await? {
                // Released between our attempt and the check.
                None => continue,
                Some(marker) if marker.age > self.policy.stale_after => {
                    if self.take_over(&marker, &token).await? {
                        continue;
                    }
                }
                Some(_) => {}
            }

            let waited = started.elapsed();
            if waited >= self.policy.timeout {
                return Err(IntegrityError::LockTimeout {
                    path: self.path.clone(),
                    waited,
                }
                .into());
            }

            debug!(path = %self.path.display(), "Lock is held, waiting");
            tokio::time::sleep(self.policy.retry_interval).await;
        }
    }
}
