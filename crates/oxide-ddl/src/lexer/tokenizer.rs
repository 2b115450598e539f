//! Schema DSL tokenizer implementation.

use super::{Keyword, Position, Token, TokenKind};

/// A lexer that tokenizes schema DSL input.
pub struct Lexer<'a> {
    /// The input source code.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// The byte position of the start of the current token.
    start: usize,
    /// Line/column of the next character.
    line: usize,
    column: usize,
    /// Line/column of the start of the current token.
    start_position: Position,
    /// True while only whitespace has been consumed on the current line.
    line_start: bool,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
            line: 1,
            column: 1,
            start_position: Position::new(1, 1),
            line_start: true,
        }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Returns the next character without advancing.
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advances to the next character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.line_start = true;
        } else {
            self.column += 1;
            if !c.is_whitespace() {
                self.line_start = false;
            }
        }
        Some(c)
    }

    /// Skips whitespace and `#` comment lines.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.advance();
            }

            if self.line_start && self.peek() == Some('#') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }

            break;
        }
    }

    /// Creates a token spanning from the token start to the current position.
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, &self.input[self.start..self.pos], self.start_position)
    }

    /// Scans an identifier or keyword.
    fn scan_identifier(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }

        let text = &self.input[self.start..self.pos];
        match Keyword::from_str(text) {
            Some(keyword) => self.make_token(TokenKind::Keyword(keyword)),
            None => self.make_token(TokenKind::Identifier(String::from(text))),
        }
    }

    /// Scans a decorator name after the `@` sigil.
    fn scan_decorator(&mut self) -> Token {
        if !self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return self.make_token(TokenKind::Error(String::from(
                "Expected decorator name after '@'",
            )));
        }

        let name_start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let name = String::from(&self.input[name_start..self.pos]);
        self.make_token(TokenKind::Decorator(name))
    }

    /// Scans a number, optionally signed and with a fractional part.
    fn scan_number(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance(); // consume .
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = String::from(&self.input[self.start..self.pos]);
        self.make_token(TokenKind::Number(text))
    }

    /// Scans a string literal. The opening quote has already been consumed.
    fn scan_string(&mut self, quote: char) -> Token {
        let mut value = String::new();

        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    // A doubled quote is an escaped quote
                    if self.peek_next() == Some(quote) {
                        value.push(quote);
                        self.advance();
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some('\n') | None => {
                    return self.make_token(TokenKind::Error(String::from(
                        "Unterminated string literal",
                    )));
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        self.advance(); // consume closing quote
        self.make_token(TokenKind::String(value))
    }

    /// Captures a whole `>` line verbatim.
    fn scan_raw_sql(&mut self) -> Token {
        self.advance(); // consume >
        let content_start = self.pos;
        while self.peek().is_some_and(|c| c != '\n') {
            self.advance();
        }
        let content = self.input[content_start..self.pos].trim();
        self.make_token(TokenKind::RawSql(String::from(content)))
    }

    /// Scans the next token.
    #[must_use]
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        self.start = self.pos;
        self.start_position = Position::new(self.line, self.column);

        if self.line_start && self.peek() == Some('>') {
            return self.scan_raw_sql();
        }

        let Some(c) = self.advance() else {
            return self.make_token(TokenKind::Eof);
        };

        match c {
            '{' => self.make_token(TokenKind::LeftBrace),
            '}' => self.make_token(TokenKind::RightBrace),
            '(' => self.make_token(TokenKind::LeftParen),
            ')' => self.make_token(TokenKind::RightParen),
            ',' => self.make_token(TokenKind::Comma),
            '.' => self.make_token(TokenKind::Dot),
            ';' => self.make_token(TokenKind::Semicolon),
            '@' => self.scan_decorator(),
            '\'' | '"' => self.scan_string(c),
            '-' if self.peek().is_some_and(|d| d.is_ascii_digit()) => self.scan_number(),
            c if c.is_ascii_digit() => self.scan_number(),
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(),
            other => self.make_token(TokenKind::Error(format!("Unexpected character '{other}'"))),
        }
    }
}

/// Tokenizes the whole input. The result always ends with an EOF token.
#[must_use]
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.is_eof();
        tokens.push(token);
        if done {
            return tokens;
        }
    }
}
