//! SQLite dialect.
//!
//! SQLite uses type affinity, so most types collapse to INTEGER, REAL,
//! NUMERIC, TEXT or BLOB. Declared lengths are kept (`VARCHAR(255)` has TEXT
//! affinity) although SQLite does not enforce them.

use super::{ColumnType, Dialect, DialectGenerator};

/// SQLite dialect for DDL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGenerator;

impl SqliteGenerator {
    /// Creates a new SQLite generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DialectGenerator for SqliteGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    // SQLite documents no maximum identifier length.
    fn identifier_limit(&self) -> Option<usize> {
        None
    }

    fn map_type(&self, ty: &ColumnType) -> String {
        match ty {
            ColumnType::Serial
            | ColumnType::BigSerial
            | ColumnType::Int
            | ColumnType::BigInt
            | ColumnType::SmallInt
            | ColumnType::Boolean => "INTEGER".to_string(),
            ColumnType::Float | ColumnType::Double => "REAL".to_string(),
            ColumnType::Decimal { precision, scale } => format!("NUMERIC({precision}, {scale})"),
            ColumnType::VarChar(length) => format!("VARCHAR({length})"),
            ColumnType::Char(length) => format!("CHAR({length})"),
            ColumnType::Text
            | ColumnType::Date
            | ColumnType::Time
            | ColumnType::Timestamp
            | ColumnType::Json
            | ColumnType::Uuid
            | ColumnType::Enum(_) => "TEXT".to_string(),
            ColumnType::Blob => "BLOB".to_string(),
        }
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    fn serial_primary_key_suffix(&self) -> Option<&'static str> {
        Some("AUTOINCREMENT")
    }
}
