//! Migration runner.
//!
//! The runner reconciles the migration files against the ledger, compiles
//! pending files with `oxide-ddl`, executes them through a
//! [`DatabaseAdapter`] and records the result in the [`Ledger`].
//!
//! Every file is compiled before the database is touched, so parse and
//! generation errors never leave partial work behind. A batch is recorded
//! in the ledger only after every migration in it has executed.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use oxide_ddl::{Dialect, DialectGenerator};
use tracing::{error, info, warn};

use crate::adapter::DatabaseAdapter;
use crate::clock::Clock;
use crate::config::RunnerConfig;
use crate::error::{IntegrityError, MigrateError, Result};
use crate::ledger::{BatchItem, Ledger, LedgerState};
use crate::source::{DirectorySource, MigrationSource};

/// Which SQL to generate for a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `CREATE TABLE` statements and raw SQL.
    Apply,
    /// `DROP TABLE IF EXISTS` statements.
    Revert,
}

/// Compiles one migration's content into SQL statements.
///
/// # Errors
///
/// Returns `MigrateError::Parse` or `MigrateError::Generate` naming `filename`.
pub fn compile(
    dialect: Dialect,
    filename: &str,
    content: &str,
    direction: Direction,
) -> Result<Vec<String>> {
    let compiled = CompiledMigration::new(dialect.generator().as_ref(), filename, content)?;
    Ok(match direction {
        Direction::Apply => compiled.apply,
        Direction::Revert => compiled.revert,
    })
}

/// Outcome of [`MigrationRunner::up`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpReport {
    /// Files applied by this run, in order.
    pub applied: Vec<String>,
    /// Files that were already applied.
    pub skipped: Vec<String>,
    /// Batch the applied files were recorded in.
    pub batch: Option<u32>,
}

/// Outcome of [`MigrationRunner::down`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownReport {
    /// Files rolled back, in the order they were reverted.
    pub rolled_back: Vec<String>,
    /// Batch that was rolled back.
    pub batch: Option<u32>,
}

/// State of one migration file relative to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// Applied, and unchanged since.
    Applied,
    /// Not applied yet.
    Pending,
    /// Applied, but the file changed since.
    Modified,
    /// Applied, but the file is gone.
    Missing,
}

/// One row of [`MigrationRunner::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Migration filename.
    pub filename: String,
    /// Where the file stands.
    pub state: MigrationState,
    /// Batch it was applied in.
    pub batch: Option<u32>,
    /// When it was applied.
    pub applied_at: Option<DateTime<Utc>>,
}

/// SQL a run would execute for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMigration {
    /// Migration filename.
    pub filename: String,
    /// Statements, in execution order.
    pub statements: Vec<String>,
}

/// A migration compiled in both directions.
#[derive(Debug, Clone)]
struct CompiledMigration {
    filename: String,
    content: String,
    apply: Vec<String>,
    revert: Vec<String>,
}

impl CompiledMigration {
    fn new(generator: &dyn DialectGenerator, filename: &str, content: &str) -> Result<Self> {
        let document = oxide_ddl::parse(content).map_err(|source| MigrateError::Parse {
            file: filename.to_string(),
            source,
        })?;
        let generate_error = |source| MigrateError::Generate {
            file: filename.to_string(),
            source,
        };
        Ok(Self {
            filename: filename.to_string(),
            content: content.to_string(),
            apply: generator.generate_apply(&document).map_err(generate_error)?,
            revert: generator.generate_revert(&document).map_err(generate_error)?,
        })
    }
}

/// Applies and rolls back migrations.
pub struct MigrationRunner<A: DatabaseAdapter> {
    adapter: A,
    source: Arc<dyn MigrationSource>,
    ledger: Ledger,
    generator: Box<dyn DialectGenerator>,
}

impl<A: DatabaseAdapter> MigrationRunner<A> {
    /// Creates a runner from its collaborators.
    pub fn new(
        adapter: A,
        source: Arc<dyn MigrationSource>,
        ledger: Ledger,
        dialect: Dialect,
    ) -> Self {
        Self {
            adapter,
            source,
            ledger,
            generator: dialect.generator(),
        }
    }

    /// Creates a runner reading files from the configured directory and
    /// keeping a file-locked ledger.
    pub fn from_config(config: &RunnerConfig, adapter: A, clock: Arc<dyn Clock>) -> Self {
        let source = Arc::new(DirectorySource::new(
            &config.migrations_dir,
            &config.extension,
        ));
        let ledger = Ledger::with_file_lock(&config.ledger_path, config.lock, clock);
        Self::new(adapter, source, ledger, config.dialect)
    }

    /// Returns the adapter.
    #[must_use]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Returns the ledger.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Returns the target dialect.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.generator.dialect()
    }

    /// Applies every pending migration as one batch.
    ///
    /// # Errors
    ///
    /// - `Integrity` if an applied file is missing or modified
    /// - `Parse`/`Generate` if a pending file does not compile
    /// - `Connection`/`Execution` if the database rejects a migration;
    ///   the ledger is left unchanged
    /// - `LedgerOutOfSync` if the batch ran but could not be recorded
    pub async fn up(&mut self) -> Result<UpReport> {
        let state = self.ledger.load().await?;
        let files = self.source.list().await?;
        self.check_recorded(&state, &files).await?;

        let (skipped, pending): (Vec<String>, Vec<String>) =
            files.into_iter().partition(|f| state.is_applied(f));
        if pending.is_empty() {
            info!(skipped = skipped.len(), "No pending migrations");
            return Ok(UpReport {
                skipped,
                ..UpReport::default()
            });
        }

        let compiled = self.compile_pending(&pending).await?;

        let outcome = self.apply_batch(&compiled).await;
        self.disconnect().await;
        outcome?;

        let items: Vec<BatchItem> = compiled
            .iter()
            .map(|m| BatchItem::new(m.filename.as_str(), m.content.as_str()))
            .collect();
        match self.ledger.record_batch(&items).await {
            Ok(entries) => Ok(UpReport {
                applied: pending,
                skipped,
                batch: entries.first().map(|e| e.batch),
            }),
            Err(source) => {
                error!(
                    files = ?pending,
                    error = %source,
                    "Migrations were applied but the ledger could not be updated"
                );
                Err(MigrateError::LedgerOutOfSync {
                    applied: pending,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Reverts the most recent batch.
    ///
    /// # Errors
    ///
    /// - `Integrity` if a file of the batch is missing or modified
    /// - `Connection`/`Execution` if the database rejects a revert;
    ///   the ledger is left unchanged
    /// - `LedgerOutOfSync` if the batch was reverted but the ledger could
    ///   not be updated
    pub async fn down(&mut self) -> Result<DownReport> {
        let state = self.ledger.load().await?;
        let batch = state.current_batch;
        if batch == 0 {
            info!("Nothing to roll back");
            return Ok(DownReport::default());
        }

        let compiled = self.compile_last_batch(&state).await?;

        let outcome = self.revert_batch(&compiled).await;
        self.disconnect().await;
        outcome?;

        let rolled_back: Vec<String> = compiled.into_iter().map(|m| m.filename).collect();
        match self.ledger.rollback_batch(batch).await {
            Ok(_) => Ok(DownReport {
                rolled_back,
                batch: Some(batch),
            }),
            Err(source) => {
                error!(
                    files = ?rolled_back,
                    batch,
                    error = %source,
                    "Migrations were reverted but the ledger could not be updated"
                );
                Err(MigrateError::LedgerOutOfSync {
                    applied: rolled_back,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Reports every known migration file, sorted by filename.
    ///
    /// # Errors
    ///
    /// Returns a ledger or source error.
    pub async fn status(&self) -> Result<Vec<MigrationStatus>> {
        let state = self.ledger.load().await?;
        let files = self.source.list().await?;
        let on_disk: HashSet<&str> = files.iter().map(String::as_str).collect();

        let mut statuses = Vec::with_capacity(files.len());
        for filename in &files {
            let status = match state.entry(filename) {
                None => MigrationStatus {
                    filename: filename.clone(),
                    state: MigrationState::Pending,
                    batch: None,
                    applied_at: None,
                },
                Some(entry) => {
                    let file_state = match self.source.read(filename).await? {
                        None => MigrationState::Missing,
                        Some(content) if state.verify(filename, &content).is_err() => {
                            MigrationState::Modified
                        }
                        Some(_) => MigrationState::Applied,
                    };
                    MigrationStatus {
                        filename: filename.clone(),
                        state: file_state,
                        batch: Some(entry.batch),
                        applied_at: Some(entry.applied_at),
                    }
                }
            };
            statuses.push(status);
        }

        for entry in &state.migrations {
            if !on_disk.contains(entry.filename.as_str()) {
                statuses.push(MigrationStatus {
                    filename: entry.filename.clone(),
                    state: MigrationState::Missing,
                    batch: Some(entry.batch),
                    applied_at: Some(entry.applied_at),
                });
            }
        }

        statuses.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(statuses)
    }

    /// Checks that every applied migration is still on disk, unchanged.
    /// Returns the number of applied migrations checked.
    ///
    /// # Errors
    ///
    /// Returns `IntegrityError::MissingFile` or `IntegrityError::HashMismatch`
    /// for the first offending file.
    pub async fn verify(&self) -> Result<usize> {
        let state = self.ledger.load().await?;
        let files = self.source.list().await?;
        self.check_recorded(&state, &files).await?;
        info!(count = state.migrations.len(), "All applied migrations verified");
        Ok(state.migrations.len())
    }

    /// Returns the SQL `up` would execute, without connecting.
    ///
    /// # Errors
    ///
    /// Same validation errors as [`up`](Self::up).
    pub async fn plan_up(&self) -> Result<Vec<PlannedMigration>> {
        let state = self.ledger.load().await?;
        let files = self.source.list().await?;
        self.check_recorded(&state, &files).await?;

        let pending: Vec<String> = files
            .into_iter()
            .filter(|f| !state.is_applied(f))
            .collect();
        let compiled = self.compile_pending(&pending).await?;
        Ok(compiled
            .into_iter()
            .map(|m| PlannedMigration {
                filename: m.filename,
                statements: m.apply,
            })
            .collect())
    }

    /// Returns the SQL `down` would execute, without connecting.
    ///
    /// # Errors
    ///
    /// Same validation errors as [`down`](Self::down).
    pub async fn plan_down(&self) -> Result<Vec<PlannedMigration>> {
        let state = self.ledger.load().await?;
        if state.current_batch == 0 {
            return Ok(Vec::new());
        }
        let compiled = self.compile_last_batch(&state).await?;
        Ok(compiled
            .into_iter()
            .map(|m| PlannedMigration {
                filename: m.filename,
                statements: m.revert,
            })
            .collect())
    }

    /// Fails on the first applied migration that is missing or modified.
    async fn check_recorded(&self, state: &LedgerState, files: &[String]) -> Result<()> {
        let on_disk: HashSet<&str> = files.iter().map(String::as_str).collect();
        for entry in &state.migrations {
            let content = if on_disk.contains(entry.filename.as_str()) {
                self.source.read(&entry.filename).await?
            } else {
                None
            };
            let Some(content) = content else {
                error!(file = %entry.filename, "Applied migration is missing");
                return Err(IntegrityError::MissingFile {
                    filename: entry.filename.clone(),
                    applied_at: entry.applied_at,
                }
                .into());
            };
            state.verify(&entry.filename, &content).inspect_err(|_| {
                error!(file = %entry.filename, "Applied migration was modified");
            })?;
        }
        Ok(())
    }

    async fn compile_pending(&self, pending: &[String]) -> Result<Vec<CompiledMigration>> {
        let mut compiled = Vec::with_capacity(pending.len());
        for filename in pending {
            let content = self
                .source
                .read(filename)
                .await?
                .ok_or_else(|| MigrateError::MigrationNotFound(filename.clone()))?;
            compiled.push(CompiledMigration::new(
                self.generator.as_ref(),
                filename,
                &content,
            )?);
        }
        Ok(compiled)
    }

    /// Compiles the current batch, newest file first. Revert SQL is
    /// generated from the file as it was applied, so the file must be
    /// present and unchanged.
    async fn compile_last_batch(&self, state: &LedgerState) -> Result<Vec<CompiledMigration>> {
        let entries = state.entries_in_batch(state.current_batch);
        let mut compiled = Vec::with_capacity(entries.len());
        for entry in entries.into_iter().rev() {
            let content = self.source.read(&entry.filename).await?.ok_or_else(|| {
                IntegrityError::MissingFile {
                    filename: entry.filename.clone(),
                    applied_at: entry.applied_at,
                }
            })?;
            state.verify(&entry.filename, &content)?;
            compiled.push(CompiledMigration::new(
                self.generator.as_ref(),
                &entry.filename,
                &content,
            )?);
        }
        Ok(compiled)
    }

    async fn apply_batch(&mut self, compiled: &[CompiledMigration]) -> Result<()> {
        self.adapter.connect().await?;

        let mut executed: Vec<&CompiledMigration> = Vec::with_capacity(compiled.len());
        for migration in compiled {
            info!(
                file = %migration.filename,
                statements = migration.apply.len(),
                "Applying migration"
            );
            if let Err(e) = self.adapter.execute_transaction(&migration.apply).await {
                error!(file = %migration.filename, error = %e, "Migration failed");
                self.compensate(&executed).await;
                return Err(MigrateError::Execution {
                    file: migration.filename.clone(),
                    message: e.to_string(),
                });
            }
            executed.push(migration);
        }
        Ok(())
    }

    /// Best-effort revert of the migrations a failed batch already committed.
    async fn compensate(&mut self, executed: &[&CompiledMigration]) {
        for migration in executed.iter().rev() {
            warn!(file = %migration.filename, "Reverting migration of failed batch");
            if let Err(e) = self.adapter.execute_transaction(&migration.revert).await {
                warn!(
                    file = %migration.filename,
                    error = %e,
                    "Could not revert migration, database may hold its changes"
                );
            }
        }
    }

    async fn revert_batch(&mut self, compiled: &[CompiledMigration]) -> Result<()> {
        self.adapter.connect().await?;

        for migration in compiled {
            info!(
                file = %migration.filename,
                statements = migration.revert.len(),
                "Reverting migration"
            );
            if let Err(e) = self.adapter.execute_transaction(&migration.revert).await {
                error!(file = %migration.filename, error = %e, "Revert failed");
                return Err(MigrateError::Execution {
                    file: migration.filename.clone(),
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.adapter.disconnect().await {
            warn!(error = %e, "Failed to disconnect from database");
        }
    }
}
