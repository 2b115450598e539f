//! MySQL dialect.

use super::rules::escape_string_literal;
use super::{ColumnType, Dialect, DialectGenerator};

/// MySQL limits table and column names to 64 characters.
const IDENTIFIER_LIMIT: usize = 64;

/// MySQL dialect for DDL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlGenerator;

impl MySqlGenerator {
    /// Creates a new MySQL generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DialectGenerator for MySqlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn identifier_limit(&self) -> Option<usize> {
        Some(IDENTIFIER_LIMIT)
    }

    fn map_type(&self, ty: &ColumnType) -> String {
        match ty {
            ColumnType::Serial | ColumnType::Int => "INT".to_string(),
            ColumnType::BigSerial | ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Double => "DOUBLE".to_string(),
            ColumnType::Decimal { precision, scale } => format!("DECIMAL({precision}, {scale})"),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::VarChar(n) => format!("VARCHAR({n})"),
            ColumnType::Char(n) => format!("CHAR({n})"),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Timestamp => "DATETIME".to_string(),
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Uuid => "CHAR(36)".to_string(),
            ColumnType::Blob => "BLOB".to_string(),
            ColumnType::Enum(values) => {
                let values: Vec<String> = values.iter().map(|v| escape_string_literal(v)).collect();
                format!("ENUM({})", values.join(", "))
            }
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

    fn native_enum(&self) -> bool {
        true
    }

    fn serial_type_suffix(&self) -> Option<&'static str> {
        Some("AUTO_INCREMENT")
    }

    // AUTO_INCREMENT columns must be defined as a key.
    fn serial_requires_key(&self) -> bool {
        true
    }

    fn quote_char(&self) -> char {
        '`'
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn apply(source: &str) -> Vec<String> {
        MySqlGenerator::new()
            .generate_apply(&parse(source).unwrap())
            .unwrap()
    }

    #[test]
    fn test_create_table_simple() {
        let sql = apply("model User { id Serial @pk; email VarChar(255) @unique }");
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE `User` (\n    `id` INT AUTO_INCREMENT PRIMARY KEY,\n    `email` VARCHAR(255) UNIQUE\n)"
            ]
        );
    }

    #[test]
    fn test_serial_outside_primary_key_is_unique() {
        let sql = apply("model Ticket { code VarChar(20) @pk; seq Serial }");
        assert!(sql[0].contains("`code` VARCHAR(20) PRIMARY KEY"));
        assert!(sql[0].contains("`seq` INT AUTO_INCREMENT UNIQUE"));

        let sql = apply("model Pair { a Serial @pk; b Int @pk }");
        assert!(sql[0].contains("`a` INT AUTO_INCREMENT NOT NULL UNIQUE"));
        assert!(sql[0].contains("PRIMARY KEY (`a`, `b`)"));

        let sql = apply("model Once { seq Serial @unique }");
        assert_eq!(sql[0].matches("UNIQUE").count(), 1);
    }

    #[test]
    fn test_native_enum() {
        let sql = apply("model Post { status Enum(draft, 'o''clock') }");
        assert!(sql[0].contains("`status` ENUM('draft', 'o''clock')"));
        assert!(!sql[0].contains("CHECK"));
    }

    #[test]
    fn test_boolean_default() {
        let sql = apply("model Flag { on Boolean @default(true) }");
        assert!(sql[0].contains("`on` BOOLEAN DEFAULT 1"));
    }

    #[test]
    fn test_revert_uses_backticks() {
        let doc = parse("model A { id Int }\nmodel B { id Int }").unwrap();
        let sql = MySqlGenerator::new().generate_revert(&doc).unwrap();
        assert_eq!(
            sql,
            vec!["DROP TABLE IF EXISTS `B`", "DROP TABLE IF EXISTS `A`"]
        );
    }
}
