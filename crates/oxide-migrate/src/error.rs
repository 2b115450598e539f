//! Error types for the migration system.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use oxide_ddl::{GeneratorError, ParseError};

/// States the migration system refuses to repair on its own.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// The ledger file exists but cannot be trusted.
    #[error("Ledger at '{}' is corrupted: {reason}", .path.display())]
    Corrupted {
        /// Path to the ledger file.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// An applied migration file was modified afterwards.
    #[error("Migration '{filename}' was modified after it was applied at {applied_at}")]
    HashMismatch {
        /// The migration file.
        filename: String,
        /// When the original content was applied.
        applied_at: DateTime<Utc>,
    },

    /// An applied migration file is no longer on disk.
    #[error("Migration '{filename}' was applied at {applied_at} but the file is missing")]
    MissingFile {
        /// The migration file.
        filename: String,
        /// When it was applied.
        applied_at: DateTime<Utc>,
    },

    /// The lock could not be acquired in time.
    #[error("Lock acquisition timed out after {waited:?} waiting for '{}'", .path.display())]
    LockTimeout {
        /// Path to the lock marker.
        path: PathBuf,
        /// How long we waited.
        waited: Duration,
    },

    /// A migration is already recorded in the ledger.
    #[error("Migration '{filename}' is already recorded in the ledger")]
    AlreadyRecorded {
        /// The migration file.
        filename: String,
    },

    /// The ledger's current batch changed under us.
    #[error("Expected to roll back batch {expected}, but the ledger's current batch is {found}")]
    BatchChanged {
        /// Batch the caller meant to roll back.
        expected: u32,
        /// Batch found in the ledger.
        found: u32,
    },
}

/// Errors that can occur during migration operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A migration file is not valid schema DSL.
    #[error("Failed to parse migration '{file}': {source}")]
    Parse {
        /// The migration file.
        file: String,
        /// The parse error.
        #[source]
        source: ParseError,
    },

    /// A migration file could not be turned into SQL.
    #[error("Failed to generate SQL for migration '{file}': {source}")]
    Generate {
        /// The migration file.
        file: String,
        /// The generator error.
        #[source]
        source: GeneratorError,
    },

    /// The ledger or the migration files are in an inconsistent state.
    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// Could not connect to the database.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A migration's SQL failed; its transaction was rolled back.
    #[error("Migration '{file}' failed: {message}")]
    Execution {
        /// The migration file.
        file: String,
        /// Database error message.
        message: String,
    },

    /// The database was changed but the ledger could not record it.
    #[error(
        "Database changes for [{}] were committed but the ledger was not updated: {source}",
        .applied.join(", ")
    )]
    LedgerOutOfSync {
        /// Files whose SQL was committed.
        applied: Vec<String>,
        /// Why the ledger write failed.
        #[source]
        source: Box<MigrateError>,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error not tied to a single file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error on a specific file (a migration, the ledger or its lock).
    #[error("IO error on '{}': {source}", .path.display())]
    FileIo {
        /// The file being read or written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Migration file already exists.
    #[error("Migration file already exists: {}", .0.display())]
    MigrationExists(PathBuf),

    /// No migrations directory found.
    #[error("Migrations directory not found: {}", .0.display())]
    MigrationsDirNotFound(PathBuf),

    /// Migration name reduces to nothing once sanitized.
    #[error("Invalid migration name '{0}'")]
    InvalidName(String),

    /// A migration file could not be found in the migrations directory.
    #[error("Migration not found: {0}")]
    MigrationNotFound(String),
}

impl MigrateError {
    /// Returns a closure attaching `path` to an IO error, for `map_err`.
    pub(crate) fn file_io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::FileIo {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_out_of_sync_lists_files() {
        let err = MigrateError::LedgerOutOfSync {
            applied: vec!["a.schema".into(), "b.schema".into()],
            source: Box::new(MigrateError::Io(std::io::Error::other("disk full"))),
        };
        let message = err.to_string();
        assert!(message.contains("[a.schema, b.schema]"));
        assert!(message.contains("disk full"));
    }

    #[test]
    fn test_file_io_names_the_file() {
        let err = MigrateError::file_io(Path::new("migrations/20240101000000_a.schema"))(
            std::io::Error::new(std::io::ErrorKind::InvalidData, "stream did not contain valid UTF-8"),
        );
        assert_eq!(
            err.to_string(),
            "IO error on 'migrations/20240101000000_a.schema': stream did not contain valid UTF-8"
        );
    }

    #[test]
    fn test_integrity_error_is_wrapped() {
        let err: MigrateError = IntegrityError::BatchChanged {
            expected: 2,
            found: 3,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Integrity error: Expected to roll back batch 2, but the ledger's current batch is 3"
        );
    }
}
