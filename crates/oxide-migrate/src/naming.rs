//! Migration file naming.
//!
//! Files are named `<timestamp>_<name>.<ext>` where the timestamp is
//! `YYYYMMDDHHMMSS` (UTC) so that lexical order is chronological order.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::clock::Clock;
use crate::error::{MigrateError, Result};

/// `chrono` format of the filename timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]+").expect("valid sanitize regex"));

static UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("valid underscore regex"));

static STEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{14}_[a-z0-9_]+$").expect("valid stem regex"));

/// Reduces a free-form name to `[a-z0-9_]`, collapsing runs of `_` and
/// trimming them from both ends.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let replaced = DISALLOWED.replace_all(&lowered, "_");
    let collapsed = UNDERSCORES.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Builds a migration filename for `name` at the clock's current time.
///
/// # Errors
///
/// Returns `MigrateError::InvalidName` if nothing is left of `name` after
/// sanitizing.
pub fn migration_filename(clock: &dyn Clock, name: &str, extension: &str) -> Result<String> {
    let sanitized = sanitize_name(name);
    if sanitized.is_empty() {
        return Err(MigrateError::InvalidName(name.to_string()));
    }
    let timestamp = clock.now().format(TIMESTAMP_FORMAT);
    Ok(format!("{timestamp}_{sanitized}.{extension}"))
}

/// Returns true if `filename` follows the `<timestamp>_<name>.<ext>` scheme.
#[must_use]
pub fn is_migration_filename(filename: &str, extension: &str) -> bool {
    filename
        .strip_suffix(extension)
        .and_then(|rest| rest.strip_suffix('.'))
        .is_some_and(|stem| STEM.is_match(stem))
}

/// Creates a new, commented migration file in `dir` and returns its path.
///
/// # Errors
///
/// Returns `MigrateError::MigrationExists` instead of overwriting a file,
/// or an IO error.
pub async fn create_migration_file(
    dir: &Path,
    clock: &dyn Clock,
    name: &str,
    extension: &str,
) -> Result<PathBuf> {
    let filename = migration_filename(clock, name, extension)?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(MigrateError::file_io(dir))?;
    let path = dir.join(&filename);

    let mut file = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(MigrateError::MigrationExists(path));
        }
        Err(e) => return Err(MigrateError::file_io(&path)(e)),
    };
    file.write_all(template(&sanitize_name(name)).as_bytes())
        .await
        .map_err(MigrateError::file_io(&path))?;
    file.flush().await.map_err(MigrateError::file_io(&path))?;

    info!(path = %path.display(), "Created migration");
    Ok(path)
}

fn template(name: &str) -> String {
    format!(
        "# Migration: {name}\n\
         #\n\
         # model Example {{\n\
         #     id Serial @pk\n\
         #     name VarChar(255) @notnull @unique\n\
         #     owner_id Int @ref(User.id) @onDelete(CASCADE)\n\
         #     created_at Timestamp @default(now)\n\
         # }}\n\
         #\n\
         # Raw SQL lines start with '>' and end with ';'.\n"
    )
}
