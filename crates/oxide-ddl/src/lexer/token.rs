//! Token types for the schema lexer.

use std::fmt;

use super::Position;

/// Reserved words of the schema DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// Starts a table declaration.
    Model,
}

impl Keyword {
    /// Attempts to parse a keyword from a word. Keywords are case-sensitive.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "model" => Some(Self::Model),
            _ => None,
        }
    }

    /// Returns the keyword as written in source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
        }
    }
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Reserved word (e.g., `model`)
    Keyword(Keyword),
    /// Identifier (e.g., `User`, `email`, `VarChar`)
    Identifier(String),
    /// Decorator marker with its name, without the `@` sigil
    Decorator(String),
    /// String literal contents with quotes removed and escapes resolved
    String(String),
    /// Number literal as written (e.g., `255`, `-1`, `3.5`)
    Number(String),
    /// A whole `>` line; the payload is the text after the marker
    RawSql(String),

    /// {
    LeftBrace,
    /// }
    RightBrace,
    /// (
    LeftParen,
    /// )
    RightParen,
    /// ,
    Comma,
    /// .
    Dot,
    /// ;
    Semicolon,

    /// End of input
    Eof,
    /// Invalid/unknown input
    Error(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword(kw) => write!(f, "keyword '{}'", kw.as_str()),
            Self::Identifier(name) => write!(f, "identifier '{name}'"),
            Self::Decorator(name) => write!(f, "decorator '@{name}'"),
            Self::String(value) => write!(f, "string '{value}'"),
            Self::Number(value) => write!(f, "number {value}"),
            Self::RawSql(_) => f.write_str("raw SQL line"),
            Self::LeftBrace => f.write_str("'{'"),
            Self::RightBrace => f.write_str("'}'"),
            Self::LeftParen => f.write_str("'('"),
            Self::RightParen => f.write_str("')'"),
            Self::Comma => f.write_str("','"),
            Self::Dot => f.write_str("'.'"),
            Self::Semicolon => f.write_str("';'"),
            Self::Eof => f.write_str("end of input"),
            Self::Error(message) => f.write_str(message),
        }
    }
}

/// A token with its source text and location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The exact source text the token was scanned from.
    pub lexeme: String,
    /// Where the token starts.
    pub position: Position,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            position,
        }
    }

    /// Returns true if this is an EOF token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Returns the keyword if this is a keyword token.
    #[must_use]
    pub const fn as_keyword(&self) -> Option<Keyword> {
        match &self.kind {
            TokenKind::Keyword(kw) => Some(*kw),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_from_str() {
        assert_eq!(Keyword::from_str("model"), Some(Keyword::Model));
        assert_eq!(Keyword::from_str("Model"), None);
        assert_eq!(Keyword::from_str("table"), None);
    }

    #[test]
    fn test_token_is_eof() {
        let eof = Token::new(TokenKind::Eof, "", Position::new(1, 1));
        let model = Token::new(TokenKind::Keyword(Keyword::Model), "model", Position::new(1, 1));
        assert!(eof.is_eof());
        assert!(!model.is_eof());
    }

    #[test]
    fn test_token_as_keyword() {
        let model = Token::new(TokenKind::Keyword(Keyword::Model), "model", Position::new(1, 1));
        let comma = Token::new(TokenKind::Comma, ",", Position::new(1, 7));
        assert_eq!(model.as_keyword(), Some(Keyword::Model));
        assert_eq!(comma.as_keyword(), None);
    }

    #[test]
    fn test_token_kind_display() {
        assert_eq!(TokenKind::Decorator("pk".into()).to_string(), "decorator '@pk'");
        assert_eq!(TokenKind::Eof.to_string(), "end of input");
    }
}
