//! Database access used by the runner.

use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::debug;

use crate::error::{MigrateError, Result};

/// A database connection the runner executes migrations through.
#[async_trait]
pub trait DatabaseAdapter: Send {
    /// Opens the connection.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Connection` if the database is unreachable.
    async fn connect(&mut self) -> Result<()>;

    /// Closes the connection. Does nothing if not connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection could not be closed cleanly.
    async fn disconnect(&mut self) -> Result<()>;

    /// Executes `statements` in one transaction. If any statement fails,
    /// none of them take effect.
    ///
    /// # Errors
    ///
    /// Returns the first statement's error.
    async fn execute_transaction(&mut self, statements: &[String]) -> Result<()>;
}

/// [`DatabaseAdapter`] over a `sqlx` connection pool. The driver is chosen
/// from the URL scheme (`postgres://`, `mysql://`, `sqlite:`).
///
/// MySQL commits DDL implicitly, so on MySQL a failed migration may leave
/// the statements before the failing one applied.
#[derive(Debug)]
pub struct SqlxAdapter {
    url: String,
    pool: Option<AnyPool>,
}

impl SqlxAdapter {
    /// Creates an adapter for `url`. Nothing is opened until `connect`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: None,
        }
    }

    /// Returns the pool, if connected.
    #[must_use]
    pub fn pool(&self) -> Option<&AnyPool> {
        self.pool.as_ref()
    }
}

#[async_trait]
impl DatabaseAdapter for SqlxAdapter {
    async fn connect(&mut self) -> Result<()> {
        if self.pool.is_some() {
            return Ok(());
        }
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(&self.url)
            .await
            .map_err(|e| MigrateError::Connection(e.to_string()))?;
        debug!("Connected to database");
        self.pool = Some(pool);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            debug!("Disconnected from database");
        }
        Ok(())
    }

    async fn execute_transaction(&mut self, statements: &[String]) -> Result<()> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| MigrateError::Connection("not connected".to_string()))?;

        let mut tx = pool.begin().await?;
        for sql in statements {
            debug!(sql = %sql, "Executing SQL");
            sqlx::query(sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_requires_connection() {
        let mut adapter = SqlxAdapter::new("sqlite::memory:");
        let err = adapter
            .execute_transaction(&["SELECT 1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Connection(_)));
        adapter.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_transaction_is_atomic() {
        let mut adapter = SqlxAdapter::new("sqlite::memory:");
        adapter.connect().await.unwrap();

        let result = adapter
            .execute_transaction(&[
                "CREATE TABLE a (id INTEGER)".to_string(),
                "CREATE TABLE broken (".to_string(),
            ])
            .await;
        assert!(result.is_err());

        // `a` was rolled back with the failing statement, so it can be created again.
        adapter
            .execute_transaction(&["CREATE TABLE a (id INTEGER)".to_string()])
            .await
            .unwrap();
        adapter.disconnect().await.unwrap();
        assert!(adapter.pool().is_none());
    }

    #[tokio::test]
    async fn test_connect_failure_is_connection_error() {
        let mut adapter = SqlxAdapter::new("sqlite:///nonexistent-dir/for/sure/db.sqlite3");
        let err = adapter.connect().await.unwrap_err();
        assert!(matches!(err, MigrateError::Connection(_)));
    }
}
