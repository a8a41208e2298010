//! Lexical scanner for the nyx DSL.
//!
//! Turns text such as `get('users','name').where('age','>','18')` into a
//! stream of [`Token`]s. Each token kind is recognized by a small nom
//! parser; the [`Lexer`] drives them left to right, tracking line and
//! column for error messages.
//!
//! Illegal characters do not abort the scan. The offending character is
//! skipped and reported as a [`LexError`], so [`tokenize`] can list every
//! problem in one pass.

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, satisfy},
    combinator::{map, opt, recognize, value},
    sequence::{pair, preceded},
    IResult,
};

use crate::error::{NyxError, NyxResult};

/// Reserved words of the DSL. They take priority over identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    GetAll,
    Get,
    Where,
    Limit,
    Insert,
    Into,
    Values,
    Set,
    Delete,
    CreateDatabase,
    CreateTable,
    Column,
    PrimaryKey,
    ForeignKey,
    References,
    AutoIncrement,
    NotNull,
    Unique,
    Default,
    Int,
    Varchar,
    Text,
    DateTime,
    Boolean,
    Float,
    Decimal,
    True,
    False,
    Null,
    As,
}

impl Keyword {
    /// Look up a reserved word. Matching is exact and case-sensitive.
    pub fn lookup(word: &str) -> Option<Keyword> {
        let kw = match word {
            "getAll" => Keyword::GetAll,
            "get" => Keyword::Get,
            "where" => Keyword::Where,
            "limit" => Keyword::Limit,
            "insert" => Keyword::Insert,
            "into" => Keyword::Into,
            "values" => Keyword::Values,
            "set" => Keyword::Set,
            "delete" => Keyword::Delete,
            "createDatabase" => Keyword::CreateDatabase,
            "createTable" => Keyword::CreateTable,
            "column" => Keyword::Column,
            "primaryKey" => Keyword::PrimaryKey,
            "foreignKey" => Keyword::ForeignKey,
            "references" => Keyword::References,
            "autoIncrement" => Keyword::AutoIncrement,
            "notNull" => Keyword::NotNull,
            "unique" => Keyword::Unique,
            "default" => Keyword::Default,
            "int" => Keyword::Int,
            "varchar" => Keyword::Varchar,
            "text" => Keyword::Text,
            "datetime" => Keyword::DateTime,
            "boolean" => Keyword::Boolean,
            "float" => Keyword::Float,
            "decimal" => Keyword::Decimal,
            "true" => Keyword::True,
            "false" => Keyword::False,
            "null" => Keyword::Null,
            "as" => Keyword::As,
            _ => return None,
        };
        Some(kw)
    }

    /// The source spelling of this keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::GetAll => "getAll",
            Keyword::Get => "get",
            Keyword::Where => "where",
            Keyword::Limit => "limit",
            Keyword::Insert => "insert",
            Keyword::Into => "into",
            Keyword::Values => "values",
            Keyword::Set => "set",
            Keyword::Delete => "delete",
            Keyword::CreateDatabase => "createDatabase",
            Keyword::CreateTable => "createTable",
            Keyword::Column => "column",
            Keyword::PrimaryKey => "primaryKey",
            Keyword::ForeignKey => "foreignKey",
            Keyword::References => "references",
            Keyword::AutoIncrement => "autoIncrement",
            Keyword::NotNull => "notNull",
            Keyword::Unique => "unique",
            Keyword::Default => "default",
            Keyword::Int => "int",
            Keyword::Varchar => "varchar",
            Keyword::Text => "text",
            Keyword::DateTime => "datetime",
            Keyword::Boolean => "boolean",
            Keyword::Float => "float",
            Keyword::Decimal => "decimal",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Null => "null",
            Keyword::As => "as",
        }
    }
}

/// What a token is, with its decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier-shaped text that is not a reserved word.
    Ident(String),
    /// Quoted string, delimiters stripped and escapes resolved.
    Str(String),
    Int(i64),
    Float(f64),
    Keyword(Keyword),
    Comma,
    Dot,
    LParen,
    RParen,
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
    Ne,
    Semicolon,
}

impl TokenKind {
    /// Short human-readable kind name, used in syntax errors.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("identifier `{}`", s),
            TokenKind::Str(s) => format!("string literal '{}'", s),
            TokenKind::Int(n) => format!("number {}", n),
            TokenKind::Float(n) => format!("number {}", n),
            TokenKind::Keyword(k) => format!("keyword `{}`", k.as_str()),
            other => format!("'{}'", other),
        }
    }

    /// The comparison operator spelled by this token, if any.
    pub fn as_operator(&self) -> Option<&'static str> {
        match self {
            TokenKind::Eq => Some("="),
            TokenKind::Gt => Some(">"),
            TokenKind::Lt => Some("<"),
            TokenKind::Gte => Some(">="),
            TokenKind::Lte => Some("<="),
            TokenKind::Ne => Some("!="),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "{}", s),
            TokenKind::Str(s) => write!(f, "'{}'", s),
            TokenKind::Int(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{}", n),
            TokenKind::Keyword(k) => write!(f, "{}", k.as_str()),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Eq => write!(f, "="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Gte => write!(f, ">="),
            TokenKind::Lte => write!(f, "<="),
            TokenKind::Ne => write!(f, "!="),
            TokenKind::Semicolon => write!(f, ";"),
        }
    }
}

/// Source location of a token. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// A single lexical token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

/// An unrecognized character (or unterminated string) found while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub ch: char,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' at line {}, column {}",
            self.message, self.ch, self.line, self.column
        )
    }
}

impl std::error::Error for LexError {}

/// Streaming scanner over a query string.
///
/// Yields `Ok(Token)` for each token and `Err(LexError)` for each skipped
/// character; iteration ends at end of input.
pub struct Lexer<'a> {
    src: &'a str,
    rest: &'a str,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            rest: src,
            line: 1,
            column: 1,
        }
    }

    fn current_position(&self) -> Position {
        Position {
            offset: self.src.len() - self.rest.len(),
            line: self.line,
            column: self.column,
        }
    }

    /// Current position, pointing just past the last consumed input.
    pub fn end_position(&self) -> Position {
        self.current_position()
    }

    /// Move to `rest`, counting lines and columns over the consumed text only.
    fn advance_to(&mut self, rest: &'a str) {
        let consumed = &self.rest[..self.rest.len() - rest.len()];
        for c in consumed.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.rest = rest;
    }

    /// Skip spaces, tabs, newlines and `#` comments.
    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest;
            match rest.chars().next() {
                Some(' ' | '\t' | '\r' | '\n') => self.advance_to(&rest[1..]),
                Some('#') => {
                    let end = rest.find('\n').unwrap_or(rest.len());
                    self.advance_to(&rest[end..]);
                }
                _ => break,
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_trivia();
        let input = self.rest;
        let first = input.chars().next()?;
        let position = self.current_position();

        match scan_token(input) {
            Ok((rest, Some(kind))) => {
                self.advance_to(rest);
                Some(Ok(Token { kind, position }))
            }
            Ok((rest, None)) => {
                // Integer literal that does not fit in i64.
                self.advance_to(rest);
                Some(Err(LexError {
                    ch: first,
                    line: position.line,
                    column: position.column,
                    message: "Integer literal out of range starting with".to_string(),
                }))
            }
            Err(_) => {
                self.advance_to(&input[first.len_utf8()..]);
                let message = if first == '\'' || first == '"' {
                    "Unterminated string literal opened by"
                } else {
                    "Illegal character"
                };
                Some(Err(LexError {
                    ch: first,
                    line: position.line,
                    column: position.column,
                    message: message.to_string(),
                }))
            }
        }
    }
}

/// Scan the whole input, returning the tokens and every lexical error.
pub fn scan(input: &str) -> (Vec<Token>, Vec<LexError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    for item in Lexer::new(input) {
        match item {
            Ok(tok) => tokens.push(tok),
            Err(e) => errors.push(e),
        }
    }
    (tokens, errors)
}

/// Tokenize a query string. Fails with every lexical error found in the pass.
pub fn tokenize(input: &str) -> NyxResult<Vec<Token>> {
    let (tokens, errors) = scan(input);
    if errors.is_empty() {
        tracing::debug!(count = tokens.len(), "tokenized input");
        Ok(tokens)
    } else {
        Err(NyxError::Lex(errors))
    }
}

/// Recognize one token. `None` means a numeric literal overflowed.
fn scan_token(input: &str) -> IResult<&str, Option<TokenKind>> {
    alt((
        map(string_literal, |s| Some(TokenKind::Str(s))),
        number,
        map(word, |w| {
            Some(match Keyword::lookup(w) {
                Some(kw) => TokenKind::Keyword(kw),
                None => TokenKind::Ident(w.to_string()),
            })
        }),
        map(punctuation, Some),
    ))(input)
}

/// Identifier-shaped text: `[A-Za-z_][A-Za-z0-9_]*`.
fn word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

/// `\d+(\.\d+)?`. A dot makes it a float.
fn number(input: &str) -> IResult<&str, Option<TokenKind>> {
    let (rest, text) = recognize(pair(digit1, opt(preceded(char('.'), digit1))))(input)?;
    let kind = if text.contains('.') {
        text.parse().ok().map(TokenKind::Float)
    } else {
        text.parse().ok().map(TokenKind::Int)
    };
    Ok((rest, kind))
}

/// Longest operators first so `>=` never lexes as `>` `=`.
fn punctuation(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::Gte, tag(">=")),
        value(TokenKind::Lte, tag("<=")),
        value(TokenKind::Ne, tag("!=")),
        value(TokenKind::Gt, char('>')),
        value(TokenKind::Lt, char('<')),
        value(TokenKind::Eq, char('=')),
        value(TokenKind::Comma, char(',')),
        value(TokenKind::Dot, char('.')),
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::Semicolon, char(';')),
    ))(input)
}

/// Single- or double-quoted string with backslash escapes.
///
/// A string may not span lines; a missing closing quote is an error.
fn string_literal(input: &str) -> IResult<&str, String> {
    let (body, quote) = alt((char('\''), char('"')))(input)?;
    let mut out = String::new();
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((&body[i + c.len_utf8()..], out)),
            '\n' => break,
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '0')) => out.push('\0'),
                Some((_, '\n')) | None => break,
                Some((_, other)) => out.push(other),
            },
            other => out.push(other),
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}
