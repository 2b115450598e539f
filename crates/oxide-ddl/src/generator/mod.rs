//! Dialect-specific DDL generation.
//!
//! Each dialect turns a [`SchemaDocument`] into an ordered list of SQL
//! statements, for applying the schema and for reverting it. The shared
//! rules (decorator arity, identifier validation, literal escaping) live in
//! [`rules`]; dialects only choose type names and spellings.

mod mysql;
mod postgres;
pub mod rules;
mod sqlite;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use mysql::MySqlGenerator;
pub use postgres::PostgresGenerator;
pub use rules::{ColumnType, DefaultValue, ForeignKey, ForeignKeyAction, ResolvedColumn};
pub use sqlite::SqliteGenerator;

use crate::ast::{ModelDecl, SchemaDocument};

/// A generation failure, always tied to the model (and column) it came from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{location}: {message}")]
pub struct GeneratorError {
    /// `Model` or `Model.column`.
    pub location: String,
    /// Model the error was found in.
    pub model: String,
    /// Column the error was found in, if any.
    pub column: Option<String>,
    /// What went wrong.
    pub message: String,
}

impl GeneratorError {
    /// Creates an error for a column of a model.
    #[must_use]
    pub fn column(model: &str, column: &str, message: impl Into<String>) -> Self {
        Self {
            location: format!("{model}.{column}"),
            model: model.to_string(),
            column: Some(column.to_string()),
            message: message.into(),
        }
    }

    /// Creates an error for a model as a whole.
    #[must_use]
    pub fn model(model: &str, message: impl Into<String>) -> Self {
        Self {
            location: model.to_string(),
            model: model.to_string(),
            column: None,
            message: message.into(),
        }
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// MySQL / MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// Returns the generator for this dialect.
    #[must_use]
    pub fn generator(self) -> Box<dyn DialectGenerator> {
        match self {
            Self::Postgres => Box::new(PostgresGenerator::new()),
            Self::MySql => Box::new(MySqlGenerator::new()),
            Self::Sqlite => Box::new(SqliteGenerator::new()),
        }
    }

    /// Returns the dialect name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a dialect name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dialect '{0}', expected one of: postgres, mysql, sqlite")]
pub struct UnknownDialect(pub String);

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

/// Trait for dialect-specific DDL generation.
///
/// The provided methods build statements from a handful of dialect hooks.
/// Generation is pure: the same document always yields the same statements.
pub trait DialectGenerator: Send + Sync {
    /// Returns the dialect this generator targets.
    fn dialect(&self) -> Dialect;

    /// Longest identifier the database accepts, in bytes. `None` if unlimited.
    fn identifier_limit(&self) -> Option<usize>;

    /// Maps a resolved column type to the dialect's type name.
    fn map_type(&self, ty: &ColumnType) -> String;

    /// Returns the dialect's literal for a boolean value.
    fn boolean_literal(&self, value: bool) -> &'static str;

    /// Returns the dialect's current-timestamp expression.
    fn current_timestamp(&self) -> &'static str;

    /// Returns true if `map_type` renders `Enum` as a native enum type.
    /// Otherwise a `CHECK (column IN (...))` constraint is emitted.
    fn native_enum(&self) -> bool {
        false
    }

    /// Keyword emitted right after the type of a serial column.
    fn serial_type_suffix(&self) -> Option<&'static str> {
        None
    }

    /// Returns true if a serial column must be indexed on its own. Such a
    /// column gets `UNIQUE` unless it is the table's inline primary key.
    fn serial_requires_key(&self) -> bool {
        false
    }

    /// Keyword emitted right after an inline `PRIMARY KEY` on a serial column.
    fn serial_primary_key_suffix(&self) -> Option<&'static str> {
        None
    }

    /// Returns the identifier quote character.
    fn quote_char(&self) -> char {
        '"'
    }

    /// Validates and quotes an identifier. Every table and column name in
    /// generated SQL goes through here.
    ///
    /// # Errors
    ///
    /// Returns a message if the name is not a valid identifier for this dialect.
    fn escape_identifier(&self, name: &str) -> Result<String, String> {
        rules::validate_identifier(name, self.identifier_limit())?;
        let q = self.quote_char();
        Ok(format!("{q}{name}{q}"))
    }

    /// Generates the statements that apply `document`: one `CREATE TABLE`
    /// per model in declaration order, then the raw SQL statements.
    ///
    /// # Errors
    ///
    /// Returns a `GeneratorError` naming the offending model/column.
    fn generate_apply(&self, document: &SchemaDocument) -> Result<Vec<String>, GeneratorError> {
        let mut statements =
            Vec::with_capacity(document.models.len() + document.raw_statements.len());
        for model in &document.models {
            statements.push(self.create_table(model)?);
        }
        statements.extend(document.raw_statements.iter().map(|raw| raw.sql.clone()));
        Ok(statements)
    }

    /// Generates the statements that revert `document`: one
    /// `DROP TABLE IF EXISTS` per model in reverse declaration order.
    /// Raw SQL is not replayed.
    ///
    /// # Errors
    ///
    /// Returns a `GeneratorError` naming the offending model.
    fn generate_revert(&self, document: &SchemaDocument) -> Result<Vec<String>, GeneratorError> {
        document
            .models
            .iter()
            .rev()
            .map(|model| self.drop_table(model))
            .collect()
    }

    /// Generates SQL for CREATE TABLE.
    ///
    /// # Errors
    ///
    /// Returns a `GeneratorError` naming the offending model/column.
    fn create_table(&self, model: &ModelDecl) -> Result<String, GeneratorError> {
        let table = self
            .escape_identifier(&model.name)
            .map_err(|message| GeneratorError::model(&model.name, message))?;

        let columns = model
            .columns
            .iter()
            .map(|column| ResolvedColumn::resolve(model, column))
            .collect::<Result<Vec<_>, _>>()?;

        let primary_keys: Vec<&ResolvedColumn> =
            columns.iter().filter(|c| c.primary_key).collect();
        let inline_primary_key = primary_keys.len() == 1;

        let mut definitions = Vec::with_capacity(columns.len());
        for column in &columns {
            definitions.push(self.column_definition(model, column, inline_primary_key)?);
        }

        if primary_keys.len() > 1 {
            let names = primary_keys
                .iter()
                .map(|c| self.column_identifier(model, &c.name))
                .collect::<Result<Vec<_>, _>>()?;
            definitions.push(format!("PRIMARY KEY ({})", names.join(", ")));
        }

        for column in &columns {
            if let Some(fk) = &column.foreign_key {
                definitions.push(self.foreign_key_constraint(model, column, fk)?);
            }
        }

        let body: Vec<String> = definitions.iter().map(|d| format!("    {d}")).collect();
        Ok(format!("CREATE TABLE {table} (\n{}\n)", body.join(",\n")))
    }

    /// Generates SQL for DROP TABLE.
    ///
    /// # Errors
    ///
    /// Returns a `GeneratorError` if the model name is not a valid identifier.
    fn drop_table(&self, model: &ModelDecl) -> Result<String, GeneratorError> {
        let table = self
            .escape_identifier(&model.name)
            .map_err(|message| GeneratorError::model(&model.name, message))?;
        Ok(format!("DROP TABLE IF EXISTS {table}"))
    }

    /// Generates SQL for a column definition.
    ///
    /// # Errors
    ///
    /// Returns a `GeneratorError` naming `Model.column`.
    fn column_definition(
        &self,
        model: &ModelDecl,
        column: &ResolvedColumn,
        inline_primary_key: bool,
    ) -> Result<String, GeneratorError> {
        let name = self.column_identifier(model, &column.name)?;
        let mut sql = format!("{name} {}", self.map_type(&column.ty));

        let serial = column.ty.is_serial();
        if serial {
            if let Some(suffix) = self.serial_type_suffix() {
                sql.push(' ');
                sql.push_str(suffix);
            }
        }

        let primary_key = column.primary_key && inline_primary_key;
        if primary_key {
            sql.push_str(" PRIMARY KEY");
            if serial {
                if let Some(suffix) = self.serial_primary_key_suffix() {
                    sql.push(' ');
                    sql.push_str(suffix);
                }
            }
        } else {
            if column.not_null || column.primary_key {
                sql.push_str(" NOT NULL");
            }
            if column.unique || (serial && self.serial_requires_key()) {
                sql.push_str(" UNIQUE");
            }
        }

        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.render_default(default));
        }

        if let ColumnType::Enum(values) = &column.ty {
            if !self.native_enum() {
                let values: Vec<String> = values
                    .iter()
                    .map(|v| rules::escape_string_literal(v))
                    .collect();
                sql.push_str(&format!(" CHECK ({name} IN ({}))", values.join(", ")));
            }
        }

        Ok(sql)
    }

    /// Generates a table-level FOREIGN KEY constraint.
    ///
    /// # Errors
    ///
    /// Returns a `GeneratorError` naming `Model.column` if the referenced
    /// names are not valid identifiers for this dialect.
    fn foreign_key_constraint(
        &self,
        model: &ModelDecl,
        column: &ResolvedColumn,
        fk: &ForeignKey,
    ) -> Result<String, GeneratorError> {
        let escape = |name: &str| {
            self.escape_identifier(name)
                .map_err(|message| GeneratorError::column(&model.name, &column.name, message))
        };

        let mut sql = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            escape(&column.name)?,
            escape(&fk.table)?,
            escape(&fk.column)?
        );
        if let Some(action) = fk.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.as_sql());
        }
        Ok(sql)
    }

    /// Renders a default value.
    fn render_default(&self, default: &DefaultValue) -> String {
        match default {
            DefaultValue::Now => self.current_timestamp().to_string(),
            DefaultValue::Null => "NULL".to_string(),
            DefaultValue::Boolean(value) => self.boolean_literal(*value).to_string(),
            DefaultValue::Number(value) => value.clone(),
            DefaultValue::Text(value) => rules::escape_string_literal(value),
        }
    }

    /// Escapes a column name of `model`.
    ///
    /// # Errors
    ///
    /// Returns a `GeneratorError` naming `Model.column`.
    fn column_identifier(&self, model: &ModelDecl, column: &str) -> Result<String, GeneratorError> {
        self.escape_identifier(column)
            .map_err(|message| GeneratorError::column(&model.name, column, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("postgresql".parse::<Dialect>(), Ok(Dialect::Postgres));
        assert_eq!("MySQL".parse::<Dialect>(), Ok(Dialect::MySql));
        assert_eq!("sqlite".parse::<Dialect>(), Ok(Dialect::Sqlite));
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_dialect_generator_selection() {
        for dialect in [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite] {
            assert_eq!(dialect.generator().dialect(), dialect);
        }
    }

    #[test]
    fn test_generator_error_display() {
        let err = GeneratorError::column("User", "email", "bad");
        assert_eq!(err.to_string(), "User.email: bad");
        let err = GeneratorError::model("User", "bad");
        assert_eq!(err.to_string(), "User: bad");
    }
}
