//! # oxide-ddl
//!
//! A compiler from a small schema DSL to dialect-specific DDL.
//!
//! A schema file declares tables as `model` blocks. Each column line has a
//! name, a type and optional decorators:
//!
//! ```text
//! # Users of the application
//! model User {
//!     id Serial @pk
//!     email VarChar(255) @unique @notnull
//!     created_at Timestamp @default(now)
//! }
//!
//! > CREATE INDEX user_created ON "User" (created_at);
//! ```
//!
//! Lines starting with `#` are comments. Lines starting with `>` are raw SQL,
//! copied verbatim after the generated tables; a statement may span several
//! `>` lines and ends with `;`.
//!
//! Compilation is two pure steps, parsing and generation:
//!
//! ```rust
//! use oxide_ddl::{parse, Dialect};
//!
//! let document = parse("model User { id Serial @pk; email VarChar(255) @unique }").unwrap();
//! let generator = Dialect::Postgres.generator();
//!
//! let apply = generator.generate_apply(&document).unwrap();
//! assert_eq!(
//!     apply[0],
//!     "CREATE TABLE \"User\" (\n    \"id\" SERIAL PRIMARY KEY,\n    \"email\" VARCHAR(255) UNIQUE\n)"
//! );
//!
//! let revert = generator.generate_revert(&document).unwrap();
//! assert_eq!(revert, vec!["DROP TABLE IF EXISTS \"User\""]);
//! ```

pub mod ast;
pub mod generator;
pub mod lexer;
pub mod parser;

pub use ast::{Argument, ColumnDecl, DecoratorName, ModelDecl, SchemaDocument, TypeName};
pub use generator::{
    Dialect, DialectGenerator, GeneratorError, MySqlGenerator, PostgresGenerator,
    SqliteGenerator, UnknownDialect,
};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{parse, ParseError, Parser};
