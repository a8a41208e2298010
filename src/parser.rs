//! nyx parser.
//!
//! Recursive descent with one token of lookahead. Tokens are pulled from
//! the [`Lexer`] on demand; there is no backtracking and no pushback.
//!
//! # Grammar
//!
//! ```text
//! statement   := verb chain* ';'?
//! verb        := getAll(STR) | get(STR (, STR)*) | delete(STR)
//!              | createDatabase(STR)
//!              | createTable(STR) column_def*
//!              | insert(STR) .values(STR, lit (, STR, lit)*)
//! chain       := .where(STR, op (, lit)?) | .limit(INT | STR)
//! column_def  := .column(STR, type (, size | constraint)*)
//! ```
//!
//! Any mismatch aborts the parse with a single [`NyxError::Syntax`].

use crate::ast::*;
use crate::error::{NyxError, NyxResult};
use crate::lexer::{Keyword, Lexer, Token, TokenKind};

/// Parse a complete statement.
pub fn parse(input: &str) -> NyxResult<Statement> {
    let mut parser = Parser::new(input)?;
    let stmt = parser.parse_statement()?;
    tracing::debug!(kind = stmt.kind(), table = stmt.table_name(), "parsed statement");
    Ok(stmt)
}

/// Recursive-descent parser over a streaming token source.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Option<Token>,
}

/// `.where` / `.limit` suffixes shared by SELECT and DELETE.
#[derive(Default)]
struct Chain {
    filter: Option<Condition>,
    limit: Option<i64>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> NyxResult<Self> {
        let mut parser = Self {
            lexer: Lexer::new(input),
            lookahead: None,
        };
        parser.lookahead = parser.scan()?;
        Ok(parser)
    }

    /// Parse one statement and require end of input after it.
    pub fn parse_statement(&mut self) -> NyxResult<Statement> {
        let stmt = match self.peek() {
            Some(TokenKind::Keyword(Keyword::GetAll)) => self.parse_get_all()?,
            Some(TokenKind::Keyword(Keyword::Get)) => self.parse_get()?,
            Some(TokenKind::Keyword(Keyword::CreateDatabase)) => self.parse_create_database()?,
            Some(TokenKind::Keyword(Keyword::CreateTable)) => self.parse_create_table()?,
            Some(TokenKind::Keyword(Keyword::Insert)) => self.parse_insert()?,
            Some(TokenKind::Keyword(Keyword::Delete)) => self.parse_delete()?,
            _ => {
                return Err(self.error(
                    "expected getAll, get, createDatabase, createTable, insert or delete",
                ));
            }
        };

        if self.check(&TokenKind::Semicolon) {
            self.advance()?;
        }
        if self.lookahead.is_some() {
            return Err(self.error("expected end of input"));
        }
        Ok(stmt)
    }

    // ---------------------------------------------------------------
    // Token helpers
    // ---------------------------------------------------------------

    /// Pull the next token. On a lexical error, drain the rest of the
    /// input so every bad character is reported together.
    fn scan(&mut self) -> NyxResult<Option<Token>> {
        match self.lexer.next() {
            None => Ok(None),
            Some(Ok(tok)) => Ok(Some(tok)),
            Some(Err(first)) => {
                let mut errors = vec![first];
                errors.extend(self.lexer.by_ref().filter_map(Result::err));
                Err(NyxError::Lex(errors))
            }
        }
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.lookahead.as_ref().map(|t| &t.kind)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        self.check(&TokenKind::Keyword(kw))
    }

    /// Consume the lookahead and scan the next token.
    fn advance(&mut self) -> NyxResult<Token> {
        let next = self.scan()?;
        match std::mem::replace(&mut self.lookahead, next) {
            Some(tok) => Ok(tok),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> NyxResult<Token> {
        if self.check(&kind) {
            self.advance()
        } else {
            Err(self.error(format!("expected {}", kind.describe())))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> NyxResult<Token> {
        self.expect(TokenKind::Keyword(kw))
    }

    /// A quoted string argument such as a table or column name.
    fn expect_string(&mut self, what: &str) -> NyxResult<String> {
        match self.lookahead.take() {
            Some(Token {
                kind: TokenKind::Str(s),
                ..
            }) => {
                self.lookahead = self.scan()?;
                Ok(s)
            }
            other => {
                self.lookahead = other;
                Err(self.error(format!("expected {} as a quoted string", what)))
            }
        }
    }

    /// Syntax error at the lookahead token, or at end of input.
    fn error(&self, message: impl Into<String>) -> NyxError {
        match &self.lookahead {
            Some(tok) => error_at(tok, message),
            None => {
                let pos = self.lexer.end_position();
                NyxError::syntax(message, pos.line, pos.column, "end of input")
            }
        }
    }

    // ---------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------

    /// `(STR)` after a verb.
    fn parse_single_name(&mut self, what: &str) -> NyxResult<String> {
        self.expect(TokenKind::LParen)?;
        let name = self.expect_string(what)?;
        self.expect(TokenKind::RParen)?;
        Ok(name)
    }

    fn parse_get_all(&mut self) -> NyxResult<Statement> {
        self.expect_keyword(Keyword::GetAll)?;
        let table = self.parse_single_name("table name")?;
        let chain = self.parse_chain()?;
        Ok(Statement::Select(Select {
            table,
            columns: Projection::All,
            filter: chain.filter,
            limit: chain.limit,
        }))
    }

    fn parse_get(&mut self) -> NyxResult<Statement> {
        self.expect_keyword(Keyword::Get)?;
        self.expect(TokenKind::LParen)?;
        let table = self.expect_string("table name")?;
        let mut columns = Vec::new();
        while self.check(&TokenKind::Comma) {
            self.advance()?;
            columns.push(self.expect_string("column name")?);
        }
        self.expect(TokenKind::RParen)?;

        let chain = self.parse_chain()?;
        Ok(Statement::Select(Select {
            table,
            columns: Projection::from_names(columns),
            filter: chain.filter,
            limit: chain.limit,
        }))
    }

    fn parse_delete(&mut self) -> NyxResult<Statement> {
        self.expect_keyword(Keyword::Delete)?;
        let table = self.parse_single_name("table name")?;
        let chain = self.parse_chain()?;
        Ok(Statement::Delete(Delete {
            table,
            filter: chain.filter,
            limit: chain.limit,
        }))
    }

    fn parse_create_database(&mut self) -> NyxResult<Statement> {
        self.expect_keyword(Keyword::CreateDatabase)?;
        let name = self.parse_single_name("database name")?;
        Ok(Statement::CreateDatabase(CreateDatabase { name }))
    }

    fn parse_create_table(&mut self) -> NyxResult<Statement> {
        self.expect_keyword(Keyword::CreateTable)?;
        let mut node = CreateTable::new(self.parse_single_name("table name")?);

        while self.check(&TokenKind::Dot) {
            self.advance()?;
            if !self.check_keyword(Keyword::Column) {
                return Err(self.error("expected `column` after '.'"));
            }
            node.columns.push(self.parse_column_definition()?);
        }
        Ok(Statement::CreateTable(node))
    }

    fn parse_insert(&mut self) -> NyxResult<Statement> {
        self.expect_keyword(Keyword::Insert)?;
        let mut node = Insert::new(self.parse_single_name("table name")?);

        if !self.check(&TokenKind::Dot) {
            return Err(self.error("expected `.values(...)` after insert"));
        }
        self.advance()?;
        self.expect_keyword(Keyword::Values)?;
        self.expect(TokenKind::LParen)?;

        loop {
            let column = self.expect_string("column name")?;
            if !self.check(&TokenKind::Comma) {
                return Err(self.error(format!(
                    "values() expects column/value pairs, column '{}' has no value",
                    column
                )));
            }
            self.advance()?;
            let value = self.parse_literal()?;
            node.assign(column, value);

            if self.check(&TokenKind::Comma) {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(Statement::Insert(node))
    }

    // ---------------------------------------------------------------
    // Clauses
    // ---------------------------------------------------------------

    /// Zero or more `.where(...)` / `.limit(...)`. A repeated `.where`
    /// replaces the earlier condition.
    fn parse_chain(&mut self) -> NyxResult<Chain> {
        let mut chain = Chain::default();
        while self.check(&TokenKind::Dot) {
            self.advance()?;
            match self.peek() {
                Some(TokenKind::Keyword(Keyword::Where)) => {
                    let condition = self.parse_where()?;
                    if chain.filter.is_some() {
                        tracing::debug!(column = %condition.column, "where clause replaces an earlier one");
                    }
                    chain.filter = Some(condition);
                }
                Some(TokenKind::Keyword(Keyword::Limit)) => {
                    chain.limit = Some(self.parse_limit()?);
                }
                _ => return Err(self.error("expected `where` or `limit` after '.'")),
            }
        }
        Ok(chain)
    }

    /// `.where(column, op [, value])`
    fn parse_where(&mut self) -> NyxResult<Condition> {
        self.expect_keyword(Keyword::Where)?;
        self.expect(TokenKind::LParen)?;
        let column = self.expect_string("column name")?;
        self.expect(TokenKind::Comma)?;

        let op = match self.peek() {
            Some(TokenKind::Str(_)) => self.expect_string("operator")?,
            Some(kind) => match kind.as_operator() {
                Some(op) => {
                    self.advance()?;
                    op.to_string()
                }
                None => return Err(self.error("expected comparison operator")),
            },
            None => return Err(self.error("expected comparison operator")),
        };

        let value = if self.check(&TokenKind::Comma) {
            self.advance()?;
            Some(self.parse_literal()?)
        } else {
            None
        };
        self.expect(TokenKind::RParen)?;

        Ok(Condition { column, op, value })
    }

    /// `.limit(n)`; the argument must read as an integer.
    fn parse_limit(&mut self) -> NyxResult<i64> {
        self.expect_keyword(Keyword::Limit)?;
        self.expect(TokenKind::LParen)?;
        let n = match self.peek() {
            Some(TokenKind::Int(n)) => Some(*n),
            Some(TokenKind::Str(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        let Some(n) = n else {
            return Err(self.error("limit() expects an integer"));
        };
        self.advance()?;
        self.expect(TokenKind::RParen)?;
        Ok(n)
    }

    /// `.column(name, type [, size | constraint]*)`
    fn parse_column_definition(&mut self) -> NyxResult<ColumnDefinition> {
        self.expect_keyword(Keyword::Column)?;
        self.expect(TokenKind::LParen)?;
        let name = self.expect_string("column name")?;
        self.expect(TokenKind::Comma)?;
        let mut column = ColumnDefinition::new(name, self.parse_data_type()?);

        while self.check(&TokenKind::Comma) {
            self.advance()?;
            let tok = self.advance()?;
            match &tok.kind {
                TokenKind::Int(n) => set_size(&mut column, *n, &tok)?,
                TokenKind::Str(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                    let n = s
                        .parse::<i64>()
                        .map_err(|_| error_at(&tok, "column size out of range"))?;
                    set_size(&mut column, n, &tok)?;
                }
                TokenKind::Str(s) => match Constraint::parse(s) {
                    Some(c) => {
                        column.constraints.insert(c);
                    }
                    None => {
                        return Err(error_at(&tok, format!("unknown column constraint '{}'", s)));
                    }
                },
                TokenKind::Keyword(kw) => match constraint_keyword(*kw) {
                    Some(c) => {
                        column.constraints.insert(c);
                    }
                    None => return Err(error_at(&tok, "expected column size or constraint")),
                },
                _ => return Err(error_at(&tok, "expected column size or constraint")),
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(column)
    }

    /// Type name, quoted or as a bare type keyword.
    fn parse_data_type(&mut self) -> NyxResult<DataType> {
        let tok = match self.lookahead.clone() {
            Some(tok) => tok,
            None => return Err(self.error("expected column type")),
        };
        let ty = match &tok.kind {
            TokenKind::Str(s) => DataType::parse(s)
                .ok_or_else(|| error_at(&tok, format!("unsupported column type '{}'", s)))?,
            TokenKind::Keyword(kw) => match type_keyword(*kw) {
                Some(ty) => ty,
                None => return Err(self.error("expected column type")),
            },
            _ => return Err(self.error("expected column type")),
        };
        self.advance()?;
        Ok(ty)
    }

    /// String, number, `true`, `false` or `null`.
    fn parse_literal(&mut self) -> NyxResult<Value> {
        let value = match self.peek() {
            Some(TokenKind::Str(s)) => Value::Text(s.clone()),
            Some(TokenKind::Int(n)) => Value::Int(*n),
            Some(TokenKind::Float(n)) => Value::Float(*n),
            Some(TokenKind::Keyword(Keyword::True)) => Value::Bool(true),
            Some(TokenKind::Keyword(Keyword::False)) => Value::Bool(false),
            Some(TokenKind::Keyword(Keyword::Null)) => Value::Null,
            _ => return Err(self.error("expected a literal value")),
        };
        self.advance()?;
        Ok(value)
    }
}

fn error_at(tok: &Token, message: impl Into<String>) -> NyxError {
    NyxError::syntax(
        message,
        tok.position.line,
        tok.position.column,
        tok.kind.describe(),
    )
}

fn set_size(column: &mut ColumnDefinition, n: i64, tok: &Token) -> NyxResult<()> {
    if column.size.is_some() {
        return Err(error_at(
            tok,
            format!("column '{}' already has a size", column.name),
        ));
    }
    let size = u32::try_from(n).map_err(|_| error_at(tok, "column size out of range"))?;
    column.size = Some(size);
    Ok(())
}

fn constraint_keyword(kw: Keyword) -> Option<Constraint> {
    match kw {
        Keyword::PrimaryKey => Some(Constraint::PrimaryKey),
        Keyword::NotNull => Some(Constraint::NotNull),
        Keyword::Unique => Some(Constraint::Unique),
        Keyword::AutoIncrement => Some(Constraint::AutoIncrement),
        _ => None,
    }
}

fn type_keyword(kw: Keyword) -> Option<DataType> {
    match kw {
        Keyword::Int => Some(DataType::Int),
        Keyword::Varchar => Some(DataType::Varchar),
        Keyword::Text => Some(DataType::Text),
        Keyword::DateTime => Some(DataType::DateTime),
        Keyword::Boolean => Some(DataType::Boolean),
        Keyword::Float | Keyword::Decimal => Some(DataType::Float),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn syntax_message(input: &str) -> String {
        match parse(input) {
            Err(NyxError::Syntax { message, .. }) => message,
            other => panic!("expected syntax error for {:?}, got {:?}", input, other),
        }
    }

    #[test]
    fn test_get_all() {
        let stmt = parse("getAll('users')").unwrap();
        assert_eq!(stmt, Select::all("users").into());
    }

    #[test]
    fn test_get_with_columns_where_limit() {
        let stmt = parse("get('users','name').where('age','>','18').limit('5')").unwrap();
        assert_eq!(
            stmt,
            Select::columns("users", ["name"])
                .filter(Condition::new("age", ">", "18"))
                .limit(5)
                .into()
        );
    }

    #[test]
    fn test_get_without_columns_is_wildcard() {
        let stmt = parse("get(\"users\")").unwrap();
        assert_eq!(stmt, Select::all("users").into());
    }

    #[test]
    fn test_where_last_wins() {
        let stmt = parse("getAll('t').where('a','=',1).where('b','<',2)").unwrap();
        match stmt {
            Statement::Select(s) => assert_eq!(s.filter, Some(Condition::new("b", "<", 2))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_where_bare_operator_token() {
        let stmt = parse("getAll('t').where('age', >=, 21)").unwrap();
        match stmt {
            Statement::Select(s) => assert_eq!(s.filter, Some(Condition::new("age", ">=", 21))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_where_two_arguments_leaves_value_empty() {
        let stmt = parse("delete('t').where('id','=')").unwrap();
        match stmt {
            Statement::Delete(d) => {
                let cond = d.filter.unwrap();
                assert_eq!(cond.value, None);
                assert!(!cond.is_complete());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_operator_still_parses() {
        let stmt = parse("getAll('t').where('name','CONTAINS','x')").unwrap();
        match stmt {
            Statement::Select(s) => assert_eq!(s.filter.unwrap().op, "CONTAINS"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_limit_is_coerced_at_parse_time() {
        for input in ["getAll('t').limit(10)", "getAll('t').limit('10')", "getAll('t').limit(' 10 ')"] {
            match parse(input).unwrap() {
                Statement::Select(s) => assert_eq!(s.limit, Some(10)),
                other => panic!("unexpected {:?}", other),
            }
        }
        match parse("getAll('t').limit('-3')").unwrap() {
            Statement::Select(s) => assert_eq!(s.limit, Some(-3)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(syntax_message("getAll('t').limit('ten')"), "limit() expects an integer");
        assert_eq!(syntax_message("getAll('t').limit(2.5)"), "limit() expects an integer");
    }

    #[test]
    fn test_create_table_columns() {
        let stmt = parse(
            "createTable('users')\
             .column('id', 'int', 'primarykey', autoIncrement)\
             .column('name', varchar, '100', 'notnull')\
             .column('score', 'FLOAT')",
        )
        .unwrap();
        assert_eq!(
            stmt,
            CreateTable::new("users")
                .column(
                    ColumnDefinition::new("id", DataType::Int)
                        .constraint(Constraint::PrimaryKey)
                        .constraint(Constraint::AutoIncrement)
                )
                .column(
                    ColumnDefinition::new("name", DataType::Varchar)
                        .size(100)
                        .constraint(Constraint::NotNull)
                )
                .column(ColumnDefinition::new("score", DataType::Float))
                .into()
        );
    }

    #[test]
    fn test_create_table_rejects_unknowns() {
        assert_eq!(
            syntax_message("createTable('t').column('a','blob')"),
            "unsupported column type 'blob'"
        );
        assert_eq!(
            syntax_message("createTable('t').column('a','int','indexed')"),
            "unknown column constraint 'indexed'"
        );
        assert_eq!(
            syntax_message("createTable('t').column('a','varchar',10,'20')"),
            "column 'a' already has a size"
        );
        assert_eq!(
            syntax_message("createTable('t').where('a','=',1)"),
            "expected `column` after '.'"
        );
    }

    #[test]
    fn test_insert_pairs() {
        let stmt = parse("insert('users').values('name','John','age',25,'active',true)").unwrap();
        assert_eq!(
            stmt,
            Insert::new("users")
                .value("name", "John")
                .value("age", 25)
                .value("active", true)
                .into()
        );
    }

    #[test]
    fn test_insert_odd_argument_count() {
        assert_eq!(
            syntax_message("insert('users').values('name','John','age')"),
            "values() expects column/value pairs, column 'age' has no value"
        );
        assert_eq!(
            syntax_message("insert('users')"),
            "expected `.values(...)` after insert"
        );
    }

    #[test]
    fn test_create_database_and_semicolon() {
        assert_eq!(
            parse("createDatabase('shop');").unwrap(),
            CreateDatabase::new("shop").into()
        );
    }

    #[test]
    fn test_unknown_verb_and_trailing_input() {
        assert_eq!(
            syntax_message("update('users')"),
            "expected getAll, get, createDatabase, createTable, insert or delete"
        );
        assert_eq!(syntax_message("getAll('t') getAll('u')"), "expected end of input");
        assert_eq!(
            syntax_message("getAll('t').order('x')"),
            "expected `where` or `limit` after '.'"
        );
    }

    #[test]
    fn test_error_reports_expected_and_found() {
        match parse("getAll users") {
            Err(NyxError::Syntax { message, found, line, column }) => {
                assert_eq!(message, "expected '('");
                assert_eq!(found, "identifier `users`");
                assert_eq!((line, column), (1, 8));
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse("getAll('t'") {
            Err(NyxError::Syntax { found, .. }) => assert_eq!(found, "end of input"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_lex_errors_surface_together() {
        match parse("getAll('t') @ %") {
            Err(NyxError::Lex(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_is_deterministic() {
        let q = "get('users','id','name').where('name','LIKE','J%').limit(3)";
        assert_eq!(parse(q).unwrap(), parse(q).unwrap());
    }
}
