//! Schema document produced by the parser and consumed by the generators.
//!
//! The tree is plain data: decorator and type arguments are kept as the raw
//! literal strings written in source, and decorator arguments remember
//! whether they were quoted. Their meaning is dialect-specific and is
//! resolved by the generators.

use std::fmt;

/// Root of a parsed schema file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDocument {
    /// Model declarations in source order.
    pub models: Vec<ModelDecl>,
    /// Raw SQL passthrough statements in source order.
    pub raw_statements: Vec<RawSql>,
}

impl SchemaDocument {
    /// Returns the model with the given name.
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&ModelDecl> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Returns true if the document declares nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty() && self.raw_statements.is_empty()
    }
}

/// A `model Name { ... }` block, one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDecl {
    /// Table name.
    pub name: String,
    /// Columns in source order. Never empty.
    pub columns: Vec<ColumnDecl>,
}

impl ModelDecl {
    /// Returns the column with the given name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDecl> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// One column line inside a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDecl {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub ty: TypeRef,
    /// Decorators in source order. Names are unique within a column.
    pub decorators: Vec<DecoratorUse>,
}

impl ColumnDecl {
    /// Returns the decorator with the given name.
    #[must_use]
    pub fn decorator(&self, name: DecoratorName) -> Option<&DecoratorUse> {
        self.decorators.iter().find(|d| d.name == name)
    }

    /// Returns true if the column carries the given decorator.
    #[must_use]
    pub fn has_decorator(&self, name: DecoratorName) -> bool {
        self.decorator(name).is_some()
    }
}

/// A column type with its raw arguments, e.g. `VarChar(255)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// Type name.
    pub name: TypeName,
    /// Raw literal arguments.
    pub args: Vec<String>,
}

impl TypeRef {
    /// Creates a type reference without arguments.
    #[must_use]
    pub const fn new(name: TypeName) -> Self {
        Self {
            name,
            args: Vec::new(),
        }
    }

    /// Adds arguments to the type reference.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Column types the DSL understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
    /// Auto-incrementing 32-bit integer.
    Serial,
    /// Auto-incrementing 64-bit integer.
    BigSerial,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    BigInt,
    /// 16-bit integer.
    SmallInt,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Exact numeric with precision and scale.
    Decimal,
    /// Boolean.
    Boolean,
    /// Unbounded text.
    Text,
    /// Variable-length string with a maximum length.
    VarChar,
    /// Fixed-length string.
    Char,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Date and time.
    Timestamp,
    /// JSON document.
    Json,
    /// UUID.
    Uuid,
    /// Binary large object.
    Blob,
    /// One of a fixed set of string values.
    Enum,
}

impl TypeName {
    const ALL: [Self; 19] = [
        Self::Serial,
        Self::BigSerial,
        Self::Int,
        Self::BigInt,
        Self::SmallInt,
        Self::Float,
        Self::Double,
        Self::Decimal,
        Self::Boolean,
        Self::Text,
        Self::VarChar,
        Self::Char,
        Self::Date,
        Self::Time,
        Self::Timestamp,
        Self::Json,
        Self::Uuid,
        Self::Blob,
        Self::Enum,
    ];

    /// Looks up a type by name, ignoring ASCII case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str().eq_ignore_ascii_case(name))
    }

    /// Returns the canonical spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Serial => "Serial",
            Self::BigSerial => "BigSerial",
            Self::Int => "Int",
            Self::BigInt => "BigInt",
            Self::SmallInt => "SmallInt",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::Decimal => "Decimal",
            Self::Boolean => "Boolean",
            Self::Text => "Text",
            Self::VarChar => "VarChar",
            Self::Char => "Char",
            Self::Date => "Date",
            Self::Time => "Time",
            Self::Timestamp => "Timestamp",
            Self::Json => "Json",
            Self::Uuid => "Uuid",
            Self::Blob => "Blob",
            Self::Enum => "Enum",
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decorator argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// The literal, with quotes removed and escapes resolved.
    pub value: String,
    /// True if the argument was written as a string literal.
    pub quoted: bool,
}

impl Argument {
    /// Creates an argument written without quotes (`now`, `42`, `User.id`).
    #[must_use]
    pub fn bare(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: false,
        }
    }

    /// Creates an argument written as a string literal (`'draft'`).
    #[must_use]
    pub fn quoted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: true,
        }
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Self::bare(value)
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Self::bare(value)
    }
}

impl PartialEq<&str> for Argument {
    fn eq(&self, other: &&str) -> bool {
        self.value == *other
    }
}

/// A decorator as written on a column, e.g. `@default('draft')`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratorUse {
    /// Decorator name.
    pub name: DecoratorName,
    /// Arguments in source order.
    pub args: Vec<Argument>,
}

impl DecoratorUse {
    /// Creates a decorator use.
    #[must_use]
    pub fn new<I, S>(name: DecoratorName, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Argument>,
    {
        Self {
            name,
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// The closed set of column decorators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoratorName {
    /// `@pk`
    Pk,
    /// `@unique`
    Unique,
    /// `@notnull`
    NotNull,
    /// `@default(value)`
    Default,
    /// `@ref(Table.column)`
    Ref,
    /// `@onDelete(action)`
    OnDelete,
}

impl DecoratorName {
    /// Looks up a decorator by its exact source name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pk" => Some(Self::Pk),
            "unique" => Some(Self::Unique),
            "notnull" => Some(Self::NotNull),
            "default" => Some(Self::Default),
            "ref" => Some(Self::Ref),
            "onDelete" => Some(Self::OnDelete),
            _ => None,
        }
    }

    /// Returns the source name without the `@` sigil.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pk => "pk",
            Self::Unique => "unique",
            Self::NotNull => "notnull",
            Self::Default => "default",
            Self::Ref => "ref",
            Self::OnDelete => "onDelete",
        }
    }
}

impl fmt::Display for DecoratorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.as_str())
    }
}

/// A raw SQL statement copied verbatim into generated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSql {
    /// The statement text, without a trailing `;`.
    pub sql: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_lookup_ignores_case() {
        assert_eq!(TypeName::from_name("VarChar"), Some(TypeName::VarChar));
        assert_eq!(TypeName::from_name("varchar"), Some(TypeName::VarChar));
        assert_eq!(TypeName::from_name("BIGSERIAL"), Some(TypeName::BigSerial));
        assert_eq!(TypeName::from_name("Money"), None);
    }

    #[test]
    fn test_decorator_lookup_is_exact() {
        assert_eq!(DecoratorName::from_name("onDelete"), Some(DecoratorName::OnDelete));
        assert_eq!(DecoratorName::from_name("ondelete"), None);
        assert_eq!(DecoratorName::Pk.to_string(), "@pk");
    }

    #[test]
    fn test_column_decorator_lookup() {
        let column = ColumnDecl {
            name: "id".into(),
            ty: TypeRef::new(TypeName::Serial),
            decorators: vec![DecoratorUse::new(DecoratorName::Pk, Vec::<String>::new())],
        };
        assert!(column.has_decorator(DecoratorName::Pk));
        assert!(!column.has_decorator(DecoratorName::Unique));
    }
}
