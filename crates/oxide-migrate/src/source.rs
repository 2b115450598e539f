//! Where migration files come from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::naming::is_migration_filename;

/// A read-only set of migration files.
#[async_trait]
pub trait MigrationSource: Send + Sync {
    /// Lists migration filenames, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the set cannot be listed.
    async fn list(&self) -> Result<Vec<String>>;

    /// Reads a migration. Returns `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    async fn read(&self, filename: &str) -> Result<Option<String>>;
}

/// Migration files in a directory. Only files named
/// `<timestamp>_<name>.<extension>` are listed.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    extension: String,
}

impl DirectorySource {
    /// Creates a source over `dir` for files ending in `.{extension}`.
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// Returns the directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn has_extension(&self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .is_some_and(|ext| ext == self.extension.as_str())
    }
}

#[async_trait]
impl MigrationSource for DirectorySource {
    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MigrateError::MigrationsDirNotFound(self.dir.clone()));
            }
            Err(e) => return Err(MigrateError::file_io(&self.dir)(e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(MigrateError::file_io(&self.dir))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(MigrateError::file_io(&entry.path()))?;
            if !file_type.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                debug!(path = %entry.path().display(), "Skipping non UTF-8 filename");
                continue;
            };
            if !self.has_extension(&name) {
                continue;
            }
            if !is_migration_filename(&name, &self.extension) {
                debug!(file = %name, "Skipping file not named <timestamp>_<name>");
                continue;
            }
            files.push(name);
        }
        files.sort();
        Ok(files)
    }

    async fn read(&self, filename: &str) -> Result<Option<String>> {
        if filename.is_empty() || filename.contains(['/', '\\']) || filename == ".." {
            return Err(MigrateError::MigrationNotFound(filename.to_string()));
        }
        let path = self.dir.join(filename);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MigrateError::file_io(&path)(e)),
        }
    }
}

/// Migration files held in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn insert(&self, filename: impl Into<String>, content: impl Into<String>) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(filename.into(), content.into());
    }

    /// Removes a file.
    pub fn remove(&self, filename: &str) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(filename);
    }
}

impl<K, V> FromIterator<(K, V)> for MemorySource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let files = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            files: Mutex::new(files),
        }
    }
}

#[async_trait]
impl MigrationSource for MemorySource {
    async fn list(&self) -> Result<Vec<String>> {
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(files.keys().cloned().collect())
    }

    async fn read(&self, filename: &str) -> Result<Option<String>> {
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(files.get(filename).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_directory_lists_sorted_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("20240102000000_b.schema"), "").unwrap();
        std::fs::write(dir.path().join("20240101000000_a.schema"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::write(dir.path().join("ledger.json"), "").unwrap();
        std::fs::write(dir.path().join("scratch.schema"), "").unwrap();
        std::fs::write(dir.path().join("2024_short.schema"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested.schema")).unwrap();

        let source = DirectorySource::new(dir.path(), "schema");
        assert_eq!(
            source.list().await.unwrap(),
            vec!["20240101000000_a.schema", "20240102000000_b.schema"]
        );
    }

    #[tokio::test]
    async fn test_directory_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.schema"), "model A { id Int }").unwrap();
        let source = DirectorySource::new(dir.path(), "schema");

        assert_eq!(
            source.read("a.schema").await.unwrap().as_deref(),
            Some("model A { id Int }")
        );
        assert_eq!(source.read("b.schema").await.unwrap(), None);
        assert!(source.read("../a.schema").await.is_err());
    }

    #[tokio::test]
    async fn test_unreadable_file_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("20240101000000_bad.schema"), [0xff, 0xfe]).unwrap();
        let source = DirectorySource::new(dir.path(), "schema");

        let err = source.read("20240101000000_bad.schema").await.unwrap_err();
        assert!(matches!(err, MigrateError::FileIo { .. }));
        assert!(err.to_string().contains("20240101000000_bad.schema"));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path().join("missing"), "schema");
        assert!(matches!(
            source.list().await,
            Err(MigrateError::MigrationsDirNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_source() {
        let source: MemorySource = [("b.schema", "B"), ("a.schema", "A")].into_iter().collect();
        assert_eq!(source.list().await.unwrap(), vec!["a.schema", "b.schema"]);
        source.remove("a.schema");
        assert_eq!(source.read("a.schema").await.unwrap(), None);
    }
}
