//! PostgreSQL dialect.

use super::{ColumnType, Dialect, DialectGenerator};

/// PostgreSQL rejects identifiers longer than `NAMEDATALEN - 1` bytes.
const IDENTIFIER_LIMIT: usize = 63;

/// PostgreSQL dialect for DDL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresGenerator;

impl PostgresGenerator {
    /// Creates a new PostgreSQL generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DialectGenerator for PostgresGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn identifier_limit(&self) -> Option<usize> {
        Some(IDENTIFIER_LIMIT)
    }

    fn map_type(&self, ty: &ColumnType) -> String {
        match ty {
            ColumnType::Serial => "SERIAL".to_string(),
            ColumnType::BigSerial => "BIGSERIAL".to_string(),
            ColumnType::Int => "INTEGER".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Float => "REAL".to_string(),
            ColumnType::Double => "DOUBLE PRECISION".to_string(),
            ColumnType::Decimal { precision, scale } => format!("NUMERIC({precision}, {scale})"),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Text | ColumnType::Enum(_) => "TEXT".to_string(),
            ColumnType::VarChar(n) => format!("VARCHAR({n})"),
            ColumnType::Char(n) => format!("CHAR({n})"),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Json => "JSONB".to_string(),
            ColumnType::Uuid => "UUID".to_string(),
            ColumnType::Blob => "BYTEA".to_string(),
        }
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn current_timestamp(&self) -> &'static str {
        "NOW()"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn apply(source: &str) -> Vec<String> {
        PostgresGenerator::new()
            .generate_apply(&parse(source).unwrap())
            .unwrap()
    }

    #[test]
    fn test_create_table_simple() {
        let sql = apply("model User { id Serial @pk; email VarChar(255) @unique }");
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE \"User\" (\n    \"id\" SERIAL PRIMARY KEY,\n    \"email\" VARCHAR(255) UNIQUE\n)"
            ]
        );
    }

    #[test]
    fn test_defaults() {
        let sql = apply(
            "model Post {\n  published Boolean @default(false)\n  created Timestamp @default(now)\n  title Text @default('it''s')\n  views Int @default(0)\n}",
        );
        assert!(sql[0].contains("\"published\" BOOLEAN DEFAULT FALSE"));
        assert!(sql[0].contains("\"created\" TIMESTAMP DEFAULT NOW()"));
        assert!(sql[0].contains("\"title\" TEXT DEFAULT 'it''s'"));
        assert!(sql[0].contains("\"views\" INTEGER DEFAULT 0"));
    }

    #[test]
    fn test_enum_as_check_constraint() {
        let sql = apply("model Post { status Enum('draft', 'live') @notnull }");
        assert!(sql[0]
            .contains("\"status\" TEXT NOT NULL CHECK (\"status\" IN ('draft', 'live'))"));
    }

    #[test]
    fn test_decimal_default_precision() {
        let sql = apply("model Item { price Decimal }");
        assert!(sql[0].contains("\"price\" NUMERIC(10, 2)"));
    }

    #[test]
    fn test_identifier_limit() {
        let name = "a".repeat(64);
        let doc = parse(&format!("model T {{ {name} Int }}")).unwrap();
        let err = PostgresGenerator::new().generate_apply(&doc).unwrap_err();
        assert_eq!(err.location, format!("T.{name}"));
        assert!(err.message.contains("the limit is 63"));
    }
}
