//! Parser error types.

use crate::lexer::{Position, TokenKind};

/// A parse error with the source location it was detected at.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// Line of the offending token.
    pub line: usize,
    /// Column of the offending token.
    pub column: usize,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            line: position.line,
            column: position.column,
        }
    }

    /// Creates an "unexpected token" error.
    #[must_use]
    pub fn unexpected(expected: &str, found: &TokenKind, position: Position) -> Self {
        let message = match found {
            TokenKind::Eof => format!("Unexpected end of input: expected {expected}"),
            TokenKind::Error(message) => message.clone(),
            other => format!("Unexpected token: expected {expected}, found {other}"),
        };
        Self::new(message, position)
    }

    /// Returns where the error was detected.
    #[must_use]
    pub const fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_position() {
        let err = ParseError::new("Model 'User' has no columns", Position::new(3, 7));
        assert_eq!(
            err.to_string(),
            "Model 'User' has no columns at line 3, column 7"
        );
    }

    #[test]
    fn test_unexpected_eof() {
        let err = ParseError::unexpected("'}'", &TokenKind::Eof, Position::new(9, 1));
        assert_eq!(err.message, "Unexpected end of input: expected '}'");
        assert_eq!(err.position(), Position::new(9, 1));
    }

    #[test]
    fn test_unexpected_lexer_error_keeps_its_message() {
        let err = ParseError::unexpected(
            "column type",
            &TokenKind::Error("Unterminated string literal".into()),
            Position::new(2, 4),
        );
        assert_eq!(err.message, "Unterminated string literal");
    }
}
