#![allow(dead_code)]

use oxide_ddl::{parse, Dialect, GeneratorError, ParseError, SchemaDocument};

pub const DIALECTS: [Dialect; 3] = [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite];

pub fn document(source: &str) -> SchemaDocument {
    parse(source).unwrap_or_else(|e| panic!("Failed to parse:\n{source}\nError: {e}"))
}

pub fn parse_err(source: &str) -> ParseError {
    parse(source).expect_err(&format!("Expected parse error for:\n{source}"))
}

pub fn apply(dialect: Dialect, source: &str) -> Vec<String> {
    dialect
        .generator()
        .generate_apply(&document(source))
        .unwrap_or_else(|e| panic!("Failed to generate {dialect} for:\n{source}\nError: {e}"))
}

pub fn revert(dialect: Dialect, source: &str) -> Vec<String> {
    dialect
        .generator()
        .generate_revert(&document(source))
        .unwrap_or_else(|e| panic!("Failed to generate {dialect} for:\n{source}\nError: {e}"))
}

pub fn generate_err(dialect: Dialect, source: &str) -> GeneratorError {
    dialect
        .generator()
        .generate_apply(&document(source))
        .expect_err(&format!("Expected {dialect} generation error for:\n{source}"))
}
