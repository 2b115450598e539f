//! Schema DSL parser.
//!
//! A hand-written recursive descent parser with one token of lookahead.

mod error;
mod parser;

pub use error::ParseError;
pub use parser::{parse, Parser};
