//! Schema DSL parser implementation.

use super::error::ParseError;
use crate::ast::{
    Argument, ColumnDecl, DecoratorName, DecoratorUse, ModelDecl, RawSql, SchemaDocument, TypeName,
    TypeRef,
};
use crate::lexer::{Keyword, Lexer, Position, Token, TokenKind};

/// Parses a complete schema file.
///
/// # Errors
///
/// Returns a `ParseError` on the first syntax error in `input`.
pub fn parse(input: &str) -> Result<SchemaDocument, ParseError> {
    Parser::new(input).parse_document()
}

/// Schema DSL parser.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given input.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self { lexer, current }
    }

    /// Parses the whole input into a schema document.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not a valid schema file.
    pub fn parse_document(&mut self) -> Result<SchemaDocument, ParseError> {
        let mut document = SchemaDocument::default();

        loop {
            match &self.current.kind {
                TokenKind::Eof => break,
                TokenKind::Keyword(Keyword::Model) => {
                    let position = self.current.position;
                    let model = self.parse_model()?;
                    if document.model(&model.name).is_some() {
                        return Err(ParseError::new(
                            format!("Duplicate model '{}'", model.name),
                            position,
                        ));
                    }
                    document.models.push(model);
                }
                TokenKind::RawSql(_) => {
                    let raw = self.parse_raw_sql()?;
                    document.raw_statements.push(raw);
                }
                other => {
                    return Err(ParseError::unexpected(
                        "'model' or a raw SQL line",
                        other,
                        self.current.position,
                    ))
                }
            }
        }

        Ok(document)
    }

    /// Parses `model Name { columns }`.
    fn parse_model(&mut self) -> Result<ModelDecl, ParseError> {
        let model_position = self.current.position;
        self.expect_keyword(Keyword::Model)?;
        let name = self.expect_identifier("model name")?;

        let brace_position = self.current.position;
        self.expect(&TokenKind::LeftBrace)?;

        let mut columns: Vec<ColumnDecl> = Vec::new();
        loop {
            match &self.current.kind {
                TokenKind::Semicolon => self.advance(),
                TokenKind::RightBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    return Err(ParseError::new(
                        format!("Unmatched '{{': model '{name}' is never closed"),
                        brace_position,
                    ));
                }
                TokenKind::RawSql(_) => {
                    return Err(ParseError::new(
                        format!("Raw SQL is not allowed inside model '{name}'"),
                        self.current.position,
                    ));
                }
                _ => {
                    let position = self.current.position;
                    let column = self.parse_column()?;
                    if columns.iter().any(|c| c.name == column.name) {
                        return Err(ParseError::new(
                            format!("Duplicate column '{}' in model '{name}'", column.name),
                            position,
                        ));
                    }
                    columns.push(column);
                }
            }
        }

        if columns.is_empty() {
            return Err(ParseError::new(
                format!("Model '{name}' must declare at least one column"),
                model_position,
            ));
        }

        Ok(ModelDecl { name, columns })
    }

    /// Parses `name Type[(args)] [@decorator[(args)] ...]`.
    fn parse_column(&mut self) -> Result<ColumnDecl, ParseError> {
        let name = self.expect_name("column name")?;

        let type_position = self.current.position;
        let type_name = self.expect_identifier("column type")?;
        let Some(type_name) = TypeName::from_name(&type_name) else {
            return Err(ParseError::new(
                format!("Unknown type '{type_name}' for column '{name}'"),
                type_position,
            ));
        };
        let type_args = if self.check(&TokenKind::LeftParen) {
            self.parse_argument_list()?
                .into_iter()
                .map(|arg| arg.value)
                .collect()
        } else {
            Vec::new()
        };

        let mut decorators: Vec<DecoratorUse> = Vec::new();
        while let TokenKind::Decorator(raw_name) = &self.current.kind {
            let position = self.current.position;
            let Some(decorator) = DecoratorName::from_name(raw_name) else {
                return Err(ParseError::new(
                    format!("Unknown decorator '@{raw_name}' on column '{name}'"),
                    position,
                ));
            };
            self.advance();

            if decorators.iter().any(|d| d.name == decorator) {
                return Err(ParseError::new(
                    format!("Duplicate decorator '{decorator}' on column '{name}'"),
                    position,
                ));
            }

            let args = if self.check(&TokenKind::LeftParen) {
                self.parse_argument_list()?
            } else {
                Vec::new()
            };
            decorators.push(DecoratorUse {
                name: decorator,
                args,
            });
        }

        Ok(ColumnDecl {
            name,
            ty: TypeRef {
                name: type_name,
                args: type_args,
            },
            decorators,
        })
    }

    /// Parses `( arg, arg, ... )`. Empty parentheses yield no arguments.
    fn parse_argument_list(&mut self) -> Result<Vec<Argument>, ParseError> {
        let open_position = self.current.position;
        self.expect(&TokenKind::LeftParen)?;

        let mut args = Vec::new();
        if self.check(&TokenKind::RightParen) {
            self.advance();
            return Ok(args);
        }

        loop {
            if self.current.is_eof() {
                return Err(ParseError::new(
                    "Unmatched '(' in argument list",
                    open_position,
                ));
            }
            args.push(self.parse_argument()?);

            match &self.current.kind {
                TokenKind::Comma => self.advance(),
                TokenKind::RightParen => {
                    self.advance();
                    return Ok(args);
                }
                TokenKind::Eof => {
                    return Err(ParseError::new(
                        "Unmatched '(' in argument list",
                        open_position,
                    ));
                }
                other => {
                    return Err(ParseError::unexpected(
                        "',' or ')'",
                        other,
                        self.current.position,
                    ))
                }
            }
        }
    }

    /// Parses one argument: a string, a number, a dotted path (`User.id`)
    /// or a run of words (`SET NULL`).
    fn parse_argument(&mut self) -> Result<Argument, ParseError> {
        match &self.current.kind {
            TokenKind::String(value) => {
                let arg = Argument::quoted(value.as_str());
                self.advance();
                Ok(arg)
            }
            TokenKind::Number(value) => {
                let arg = Argument::bare(value.as_str());
                self.advance();
                Ok(arg)
            }
            TokenKind::Identifier(_) | TokenKind::Keyword(_) => {
                let mut value = self.expect_name("argument")?;
                while self.check(&TokenKind::Dot) {
                    self.advance();
                    value.push('.');
                    value.push_str(&self.expect_name("name after '.'")?);
                }
                while let TokenKind::Identifier(word) = &self.current.kind {
                    value.push(' ');
                    value.push_str(word);
                    self.advance();
                }
                Ok(Argument::bare(value))
            }
            other => Err(ParseError::unexpected(
                "argument",
                other,
                self.current.position,
            )),
        }
    }

    /// Parses consecutive `>` lines up to the one ending in `;`.
    fn parse_raw_sql(&mut self) -> Result<RawSql, ParseError> {
        let start = self.current.position;
        let mut sql = String::new();

        loop {
            let TokenKind::RawSql(line) = &self.current.kind else {
                return Err(unterminated_raw_sql(start));
            };
            if !sql.is_empty() && !line.is_empty() {
                sql.push('\n');
            }
            sql.push_str(line);
            self.advance();

            if let Some(statement) = sql.strip_suffix(';') {
                let statement = statement.trim_end();
                if statement.is_empty() {
                    return Err(ParseError::new("Empty raw SQL statement", start));
                }
                return Ok(RawSql {
                    sql: statement.to_string(),
                });
            }
        }
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    /// Checks if the current token matches the given kind.
    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    /// Expects the current token to be the given kind.
    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                &kind.to_string(),
                &self.current.kind,
                self.current.position,
            ))
        }
    }

    /// Expects the current token to be the given keyword.
    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        if self.current.as_keyword() == Some(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                &format!("'{}'", keyword.as_str()),
                &self.current.kind,
                self.current.position,
            ))
        }
    }

    /// Expects and returns an identifier.
    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(ParseError::unexpected(what, other, self.current.position)),
        }
    }

    /// Expects an identifier, also accepting reserved words in name position.
    fn expect_name(&mut self, what: &str) -> Result<String, ParseError> {
        if let Some(keyword) = self.current.as_keyword() {
            self.advance();
            return Ok(keyword.as_str().to_string());
        }
        self.expect_identifier(what)
    }
}

fn unterminated_raw_sql(start: Position) -> ParseError {
    ParseError::new("Unterminated raw SQL statement (missing ';')", start)
}
