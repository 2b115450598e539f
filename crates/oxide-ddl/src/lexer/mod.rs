//! Schema DSL lexer.
//!
//! Turns source text into a stream of positioned tokens. The lexer never
//! fails: malformed input produces [`TokenKind::Error`] tokens that the
//! parser reports with their position.

mod position;
mod token;
mod tokenizer;

pub use position::Position;
pub use token::{Keyword, Token, TokenKind};
pub use tokenizer::{tokenize, Lexer};
