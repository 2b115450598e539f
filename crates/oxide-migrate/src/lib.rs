//! Ledger-tracked schema migrations.
//!
//! `oxide-migrate` applies migration files written in the `oxide-ddl`
//! schema DSL to a database and keeps a ledger of what was applied:
//! - Every applied file is recorded with the SHA-256 of its content, so
//!   later edits or deletions are detected instead of silently ignored
//! - Files applied together form a batch, and batches are rolled back as a unit
//! - The ledger is only touched under a lock, so concurrent runs from
//!   several processes cannot interleave their writes
//!
//! # Architecture
//!
//! - **Runner** - Reconciles the migration files with the ledger and drives execution
//! - **Ledger** - JSON file of applied migrations, batch numbers and hashes
//! - **Lock** - Mutual exclusion around ledger reads and writes
//! - **Source** - Lists and reads migration files
//! - **Adapter** - Executes SQL against the database in transactions
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use oxide_migrate::prelude::*;
//!
//! let config = RunnerConfig::new("migrations", Dialect::Postgres);
//! let adapter = SqlxAdapter::new("postgres://localhost/app");
//! let mut runner = MigrationRunner::from_config(&config, adapter, Arc::new(SystemClock));
//!
//! let report = runner.up().await?;
//! println!("applied {:?} in batch {:?}", report.applied, report.batch);
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Create a new migration file
//! oxide-migrate create "create users"
//!
//! # Apply pending migrations
//! oxide-migrate up
//!
//! # Show migration status
//! oxide-migrate status
//!
//! # Roll back the last batch
//! oxide-migrate down
//! ```

pub mod adapter;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod naming;
pub mod runner;
pub mod source;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::adapter::{DatabaseAdapter, SqlxAdapter};
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::config::{dialect_from_url, RunnerConfig};
    pub use crate::error::{IntegrityError, MigrateError, Result};
    pub use crate::ledger::{content_hash, BatchItem, Ledger, LedgerEntry, LedgerState};
    pub use crate::lock::{FileLock, LockGuard, LockManager, LockPolicy};
    pub use crate::naming::{
        create_migration_file, is_migration_filename, migration_filename, sanitize_name,
    };
    pub use crate::runner::{
        compile, Direction, DownReport, MigrationRunner, MigrationState, MigrationStatus,
        PlannedMigration, UpReport,
    };
    pub use crate::source::{DirectorySource, MemorySource, MigrationSource};
    pub use oxide_ddl::Dialect;
}
