#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use oxide_migrate::prelude::*;
use tempfile::TempDir;

/// What the adapter was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    Disconnect,
    Execute(Vec<String>),
    Failed(Vec<String>),
}

/// An in-memory adapter that records every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingAdapter {
    events: Arc<Mutex<Vec<Event>>>,
    fail_on: Option<String>,
    unreachable: bool,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails any transaction with a statement containing `pattern`.
    pub fn failing_on(pattern: &str) -> Self {
        Self {
            fail_on: Some(pattern.to_string()),
            ..Self::default()
        }
    }

    /// Fails to connect.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Statements of successful transactions, flattened.
    pub fn executed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Execute(statements) => Some(statements),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl DatabaseAdapter for RecordingAdapter {
    async fn connect(&mut self) -> Result<()> {
        if self.unreachable {
            return Err(MigrateError::Connection("connection refused".to_string()));
        }
        self.push(Event::Connect);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.push(Event::Disconnect);
        Ok(())
    }

    async fn execute_transaction(&mut self, statements: &[String]) -> Result<()> {
        let fails = self
            .fail_on
            .as_deref()
            .is_some_and(|pattern| statements.iter().any(|s| s.contains(pattern)));
        if fails {
            self.push(Event::Failed(statements.to_vec()));
            return Err(MigrateError::Connection("syntax error".to_string()));
        }
        self.push(Event::Execute(statements.to_vec()));
        Ok(())
    }
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ))
}

pub fn quick_lock_policy() -> LockPolicy {
    LockPolicy {
        timeout: Duration::from_secs(5),
        retry_interval: Duration::from_millis(5),
        stale_after: Duration::from_secs(300),
    }
}

/// A migrations directory with a runner over it.
pub struct Fixture {
    pub dir: TempDir,
    pub config: RunnerConfig,
    pub adapter: RecordingAdapter,
    pub runner: MigrationRunner<RecordingAdapter>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_adapter(RecordingAdapter::new())
    }

    pub fn with_adapter(adapter: RecordingAdapter) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let migrations = dir.path().join("migrations");
        std::fs::create_dir_all(&migrations).unwrap();

        let config = RunnerConfig::new(migrations, Dialect::Sqlite).lock_policy(quick_lock_policy());
        let runner = MigrationRunner::from_config(&config, adapter.clone(), fixed_clock());
        Self {
            dir,
            config,
            adapter,
            runner,
        }
    }

    pub fn path(&self, filename: &str) -> PathBuf {
        self.config.migrations_dir.join(filename)
    }

    pub fn write(&self, filename: &str, content: &str) {
        std::fs::write(self.path(filename), content).unwrap();
    }

    pub fn remove(&self, filename: &str) {
        std::fs::remove_file(self.path(filename)).unwrap();
    }

    pub async fn ledger_state(&self) -> LedgerState {
        self.runner.ledger().load().await.unwrap()
    }
}
