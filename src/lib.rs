//! # nyx
//!
//! A compiler for a fluent query notation. `getAll('users').where(...)`
//! goes in, dialect-correct SQL comes out, optionally executed against
//! MySQL or SQLite.
//!
//! ## Quick Example
//!
//! ```
//! use nyx::prelude::*;
//!
//! let stmt = nyx::parse("get('users','name').where('age','>','18').limit('5')").unwrap();
//!
//! let mut schema = Schema::new();
//! let mut analyzer = Analyzer::new();
//! assert!(analyzer.analyze(&stmt, &mut schema));
//!
//! let sql = compile(&stmt).unwrap();
//! assert_eq!(sql, "SELECT `name` FROM `users` WHERE `age` > 18 LIMIT 5;");
//! ```
//!
//! ## Verbs
//!
//! | Verb                               | SQL               |
//! |------------------------------------|-------------------|
//! | `getAll(t)`                        | `SELECT *`        |
//! | `get(t, c1, c2)`                   | `SELECT c1, c2`   |
//! | `insert(t).values(c, v, ...)`      | `INSERT INTO`     |
//! | `delete(t)`                        | `DELETE FROM`     |
//! | `createTable(t).column(c, ty, ..)` | `CREATE TABLE`    |
//! | `createDatabase(d)`                | `CREATE DATABASE` |
//!
//! `get`, `getAll` and `delete` chain `.where(col, op, val)` and `.limit(n)`.

pub mod ast;
pub mod backend;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod schema;
pub mod semantic;
pub mod session;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::backend::{Backend, QueryOutcome, Row, SqlxBackend};
    pub use crate::config::Config;
    pub use crate::error::*;
    pub use crate::parser::parse;
    pub use crate::schema::Schema;
    pub use crate::semantic::Analyzer;
    pub use crate::session::Session;
    pub use crate::transpiler::{Compiler, Dialect, ToSql, compile};
}

/// Parse a statement.
///
/// # Example
///
/// ```
/// use nyx::parse;
///
/// let stmt = parse("getAll('users').limit(10)").unwrap();
/// assert_eq!(stmt.table_name(), "users");
/// ```
pub fn parse(input: &str) -> error::NyxResult<ast::Statement> {
    parser::parse(input)
}
