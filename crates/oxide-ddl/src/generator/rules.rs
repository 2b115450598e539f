//! Validation and escaping rules shared by every dialect.
//!
//! Decorator arity, type arguments, identifier shape and literal escaping
//! are decided here once; the dialects only choose spellings.

use std::sync::LazyLock;

use regex::Regex;

use crate::ast::{Argument, ColumnDecl, DecoratorName, DecoratorUse, ModelDecl, TypeName, TypeRef};

use super::GeneratorError;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

static NUMERIC_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").expect("valid numeric regex"));

/// Precision and scale used for `Decimal` without arguments.
pub const DEFAULT_DECIMAL: (u32, u32) = (10, 2);

/// Length used for `VarChar` without arguments.
pub const DEFAULT_VARCHAR_LENGTH: u32 = 255;

/// Length used for `Char` without arguments.
pub const DEFAULT_CHAR_LENGTH: u32 = 1;

/// Checks that `name` is a plain SQL identifier no longer than `limit` bytes.
///
/// # Errors
///
/// Returns a message describing why the name was rejected.
pub fn validate_identifier(name: &str, limit: Option<usize>) -> Result<(), String> {
    if !IDENTIFIER.is_match(name) {
        return Err(format!(
            "invalid identifier '{name}': must start with a letter or underscore \
             followed by letters, digits or underscores"
        ));
    }
    if let Some(limit) = limit {
        if name.len() > limit {
            return Err(format!(
                "identifier '{name}' is {} characters long, the limit is {limit}",
                name.len()
            ));
        }
    }
    Ok(())
}

/// Renders `value` as a single-quoted SQL string literal.
#[must_use]
pub fn escape_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Returns true for integer and decimal literals such as `42`, `-1`, `0.5`.
#[must_use]
pub fn is_numeric_literal(value: &str) -> bool {
    NUMERIC_LITERAL.is_match(value)
}

/// Referential action for `@onDelete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForeignKeyAction {
    /// Cascade the delete to referencing rows.
    Cascade,
    /// Set the referencing column to NULL.
    SetNull,
    /// Set the referencing column to its default value.
    SetDefault,
    /// Reject the delete immediately.
    Restrict,
    /// Reject the delete at the end of the statement.
    NoAction,
}

impl ForeignKeyAction {
    const ALL: [Self; 5] = [
        Self::Cascade,
        Self::SetNull,
        Self::SetDefault,
        Self::Restrict,
        Self::NoAction,
    ];

    /// Parses an action, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns a message listing the accepted actions.
    pub fn parse(value: &str) -> Result<Self, String> {
        let normalized = value
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|action| action.as_sql() == normalized)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(Self::as_sql).collect();
                format!(
                    "invalid @onDelete action '{value}', expected one of: {}",
                    valid.join(", ")
                )
            })
    }

    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
        }
    }
}

/// Value of a `@default` decorator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    /// `now`: the dialect's current timestamp.
    Now,
    /// `null`.
    Null,
    /// `true` / `false`.
    Boolean(bool),
    /// A numeric literal, emitted unquoted.
    Number(String),
    /// Anything else, emitted as an escaped string literal.
    Text(String),
}

impl DefaultValue {
    /// Classifies a `@default` argument. A quoted argument is always text,
    /// so `'007'` and `'null'` stay strings.
    #[must_use]
    pub fn from_argument(arg: &Argument) -> Self {
        if arg.quoted {
            Self::Text(arg.value.clone())
        } else {
            Self::from_literal(&arg.value)
        }
    }

    /// Classifies an unquoted `@default` argument.
    #[must_use]
    pub fn from_literal(value: &str) -> Self {
        match value {
            "now" => Self::Now,
            "null" => Self::Null,
            "true" => Self::Boolean(true),
            "false" => Self::Boolean(false),
            v if is_numeric_literal(v) => Self::Number(v.to_string()),
            v => Self::Text(v.to_string()),
        }
    }
}

/// A decorator with its arguments checked and typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decorator {
    /// `@pk`
    PrimaryKey,
    /// `@unique`
    Unique,
    /// `@notnull`
    NotNull,
    /// `@default(value)`
    Default(DefaultValue),
    /// `@ref(Table.column)`
    References {
        /// Referenced table.
        table: String,
        /// Referenced column.
        column: String,
    },
    /// `@onDelete(action)`
    OnDelete(ForeignKeyAction),
}

impl Decorator {
    /// Checks the arguments of a decorator use.
    ///
    /// # Errors
    ///
    /// Returns a message when the argument count or format is wrong.
    pub fn resolve(decorator: &DecoratorUse) -> Result<Self, String> {
        match decorator.name {
            DecoratorName::Pk => no_arguments(decorator).map(|()| Self::PrimaryKey),
            DecoratorName::Unique => no_arguments(decorator).map(|()| Self::Unique),
            DecoratorName::NotNull => no_arguments(decorator).map(|()| Self::NotNull),
            DecoratorName::Default => {
                let value = single_argument(decorator)?;
                Ok(Self::Default(DefaultValue::from_argument(value)))
            }
            DecoratorName::Ref => {
                let target = single_argument(decorator)?.value.as_str();
                let Some((table, column)) = target.split_once('.') else {
                    return Err(format!(
                        "@ref expects 'Table.column', got '{target}'"
                    ));
                };
                validate_identifier(table, None)?;
                validate_identifier(column, None)?;
                Ok(Self::References {
                    table: table.to_string(),
                    column: column.to_string(),
                })
            }
            DecoratorName::OnDelete => {
                let action = single_argument(decorator)?.value.as_str();
                ForeignKeyAction::parse(action).map(Self::OnDelete)
            }
        }
    }
}

fn no_arguments(decorator: &DecoratorUse) -> Result<(), String> {
    if decorator.args.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "{} takes no arguments, got {}",
            decorator.name,
            decorator.args.len()
        ))
    }
}

fn single_argument(decorator: &DecoratorUse) -> Result<&Argument, String> {
    match decorator.args.as_slice() {
        [value] => Ok(value),
        args => Err(format!(
            "{} takes exactly one argument, got {}",
            decorator.name,
            args.len()
        )),
    }
}

/// A column type with its arguments checked and defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Serial,
    BigSerial,
    Int,
    BigInt,
    SmallInt,
    Float,
    Double,
    Decimal { precision: u32, scale: u32 },
    Boolean,
    Text,
    VarChar(u32),
    Char(u32),
    Date,
    Time,
    Timestamp,
    Json,
    Uuid,
    Blob,
    Enum(Vec<String>),
}

impl ColumnType {
    /// Checks the arguments of a type reference.
    ///
    /// # Errors
    ///
    /// Returns a message when the arguments do not fit the type.
    pub fn resolve(ty: &TypeRef) -> Result<Self, String> {
        let simple = |resolved: Self| {
            if ty.args.is_empty() {
                Ok(resolved)
            } else {
                Err(format!("type {} takes no arguments", ty.name))
            }
        };

        match ty.name {
            TypeName::Serial => simple(Self::Serial),
            TypeName::BigSerial => simple(Self::BigSerial),
            TypeName::Int => simple(Self::Int),
            TypeName::BigInt => simple(Self::BigInt),
            TypeName::SmallInt => simple(Self::SmallInt),
            TypeName::Float => simple(Self::Float),
            TypeName::Double => simple(Self::Double),
            TypeName::Boolean => simple(Self::Boolean),
            TypeName::Text => simple(Self::Text),
            TypeName::Date => simple(Self::Date),
            TypeName::Time => simple(Self::Time),
            TypeName::Timestamp => simple(Self::Timestamp),
            TypeName::Json => simple(Self::Json),
            TypeName::Uuid => simple(Self::Uuid),
            TypeName::Blob => simple(Self::Blob),
            TypeName::VarChar => optional_length(ty, DEFAULT_VARCHAR_LENGTH).map(Self::VarChar),
            TypeName::Char => optional_length(ty, DEFAULT_CHAR_LENGTH).map(Self::Char),
            TypeName::Decimal => {
                let (precision, scale) = match ty.args.as_slice() {
                    [] => DEFAULT_DECIMAL,
                    [precision] => (positive_integer(ty.name, precision)?, 0),
                    [precision, scale] => (
                        positive_integer(ty.name, precision)?,
                        integer(ty.name, scale)?,
                    ),
                    _ => return Err("type Decimal takes at most two arguments".to_string()),
                };
                if scale > precision {
                    return Err(format!(
                        "Decimal scale {scale} exceeds precision {precision}"
                    ));
                }
                Ok(Self::Decimal { precision, scale })
            }
            TypeName::Enum => {
                if ty.args.is_empty() {
                    return Err("type Enum needs at least one value".to_string());
                }
                let mut values: Vec<String> = Vec::with_capacity(ty.args.len());
                for value in &ty.args {
                    if values.contains(value) {
                        return Err(format!("duplicate Enum value '{value}'"));
                    }
                    values.push(value.clone());
                }
                Ok(Self::Enum(values))
            }
        }
    }

    /// Returns true for auto-incrementing integer types.
    #[must_use]
    pub const fn is_serial(&self) -> bool {
        matches!(self, Self::Serial | Self::BigSerial)
    }
}

fn optional_length(ty: &TypeRef, default: u32) -> Result<u32, String> {
    match ty.args.as_slice() {
        [] => Ok(default),
        [length] => positive_integer(ty.name, length),
        _ => Err(format!("type {} takes at most one argument", ty.name)),
    }
}

fn integer(ty: TypeName, value: &str) -> Result<u32, String> {
    value
        .parse::<u32>()
        .map_err(|_| format!("type {ty} expects an integer argument, got '{value}'"))
}

fn positive_integer(ty: TypeName, value: &str) -> Result<u32, String> {
    match integer(ty, value)? {
        0 => Err(format!("type {ty} expects a positive argument, got '{value}'")),
        n => Ok(n),
    }
}

/// A foreign key declared with `@ref` (and optionally `@onDelete`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
    /// Action on delete of the referenced row.
    pub on_delete: Option<ForeignKeyAction>,
}

/// A column with its type and decorators resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    /// Column name.
    pub name: String,
    /// Resolved type.
    pub ty: ColumnType,
    /// `@pk`
    pub primary_key: bool,
    /// `@unique`
    pub unique: bool,
    /// `@notnull`
    pub not_null: bool,
    /// `@default`
    pub default: Option<DefaultValue>,
    /// `@ref` / `@onDelete`
    pub foreign_key: Option<ForeignKey>,
}

impl ResolvedColumn {
    /// Resolves a column of `model`, attaching `Model.column` to any error.
    ///
    /// # Errors
    ///
    /// Returns a `GeneratorError` for bad type arguments, bad decorator
    /// arguments, or `@onDelete` without `@ref`.
    pub fn resolve(model: &ModelDecl, column: &ColumnDecl) -> Result<Self, GeneratorError> {
        let fail = |message: String| GeneratorError::column(&model.name, &column.name, message);

        let ty = ColumnType::resolve(&column.ty).map_err(fail)?;
        let mut resolved = Self {
            name: column.name.clone(),
            ty,
            primary_key: false,
            unique: false,
            not_null: false,
            default: None,
            foreign_key: None,
        };

        let mut on_delete = None;
        for decorator in &column.decorators {
            match Decorator::resolve(decorator).map_err(fail)? {
                Decorator::PrimaryKey => resolved.primary_key = true,
                Decorator::Unique => resolved.unique = true,
                Decorator::NotNull => resolved.not_null = true,
                Decorator::Default(value) => resolved.default = Some(value),
                Decorator::References { table, column } => {
                    resolved.foreign_key = Some(ForeignKey {
                        table,
                        column,
                        on_delete: None,
                    });
                }
                Decorator::OnDelete(action) => on_delete = Some(action),
            }
        }

        if let Some(action) = on_delete {
            match resolved.foreign_key.as_mut() {
                Some(fk) => fk.on_delete = Some(action),
                None => {
                    return Err(fail(
                        "@onDelete requires @ref on the same column".to_string(),
                    ))
                }
            }
        }

        Ok(resolved)
    }
}
