//! Runner configuration.

use std::path::PathBuf;

use oxide_ddl::Dialect;
use serde::{Deserialize, Serialize};

use crate::lock::LockPolicy;

/// Default directory holding migration files.
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Default ledger file name, inside the migrations directory.
pub const DEFAULT_LEDGER_FILE: &str = ".ledger.json";

/// Default migration file extension.
pub const DEFAULT_EXTENSION: &str = "schema";

/// Everything a [`MigrationRunner`](crate::runner::MigrationRunner) needs
/// besides the database itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Directory holding migration files.
    pub migrations_dir: PathBuf,
    /// Ledger file.
    pub ledger_path: PathBuf,
    /// Target SQL dialect.
    pub dialect: Dialect,
    /// Extension of migration files, without the dot.
    pub extension: String,
    /// Ledger lock timing.
    pub lock: LockPolicy,
}

impl RunnerConfig {
    /// Creates a configuration with the default layout under `migrations_dir`.
    pub fn new(migrations_dir: impl Into<PathBuf>, dialect: Dialect) -> Self {
        let migrations_dir = migrations_dir.into();
        Self {
            ledger_path: migrations_dir.join(DEFAULT_LEDGER_FILE),
            migrations_dir,
            dialect,
            extension: DEFAULT_EXTENSION.to_string(),
            lock: LockPolicy::default(),
        }
    }

    /// Sets the ledger path.
    #[must_use]
    pub fn ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = path.into();
        self
    }

    /// Sets the lock policy.
    #[must_use]
    pub fn lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock = policy;
        self
    }
}

/// Guesses the dialect from a database URL scheme.
#[must_use]
pub fn dialect_from_url(url: &str) -> Option<Dialect> {
    let scheme = url.split_once(':').map(|(scheme, _)| scheme)?;
    scheme.parse().ok()
}
