//! A compiler session: one schema, one optional connection.
//!
//! ```
//! use nyx::session::Session;
//!
//! let mut session = Session::new();
//! session.register_schema("users", ["id", "name", "age"]);
//!
//! let stmt = session.parse("get('users','name').where('age','>','18').limit('5')").unwrap();
//! assert!(session.analyze(&stmt));
//! let sql = session.compile(&stmt).unwrap();
//! assert_eq!(sql, "SELECT `name` FROM `users` WHERE `age` > 18 LIMIT 5;");
//! assert_eq!(session.last_sql(), Some(sql.as_str()));
//! ```
//!
//! Sessions are not synchronized. Share one across tasks only behind a
//! lock that serializes `analyze` and `execute`.

use crate::ast::*;
use crate::backend::{Backend, ColumnMeta, QueryOutcome, SqlxBackend, TableCache, database_name};
use crate::config::Config;
use crate::error::{NyxError, NyxResult};
use crate::parser;
use crate::schema::Schema;
use crate::semantic::Analyzer;
use crate::transpiler::{Compiler, Dialect, coerce};

pub struct Session<B = SqlxBackend> {
    schema: Schema,
    analyzer: Analyzer,
    dialect: Dialect,
    last_sql: Option<String>,
    backend: Option<B>,
    table_cache: TableCache,
}

impl Session<SqlxBackend> {
    /// Text-only session for the default dialect.
    pub fn new() -> Self {
        Self::build(Dialect::default(), None)
    }

    /// Connect to `url` and target its dialect.
    pub async fn connect(url: &str) -> NyxResult<Self> {
        let backend = SqlxBackend::connect(url).await?;
        Ok(Self::with_backend(backend))
    }

    /// Build a session from configuration: connect if a URL is set and
    /// pre-seed the schema.
    pub async fn from_config(config: &Config) -> NyxResult<Self> {
        let mut session = match &config.database_url {
            Some(url) => Self::connect(url).await?,
            None => Self::new().with_dialect(config.dialect),
        };
        for (table, columns) in &config.schema {
            session.register_schema(table, columns.iter().map(String::as_str));
        }
        Ok(session)
    }
}

impl Default for Session<SqlxBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Session<B> {
    pub fn with_backend(backend: B) -> Self {
        Self::build(backend.dialect(), Some(backend))
    }

    fn build(dialect: Dialect, backend: Option<B>) -> Self {
        Self {
            schema: Schema::new(),
            analyzer: Analyzer::new(),
            dialect,
            last_sql: None,
            backend,
            table_cache: TableCache::default(),
        }
    }

    /// Override the output dialect. Ignored once a backend is attached,
    /// which always dictates its own.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        if self.backend.is_none() {
            self.dialect = dialect;
        }
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn parse(&self, text: &str) -> NyxResult<Statement> {
        parser::parse(text)
    }

    /// Validate against (and update) the session schema.
    pub fn analyze(&mut self, stmt: &Statement) -> bool {
        self.analyzer.analyze(stmt, &mut self.schema)
    }

    pub fn errors(&self) -> &[String] {
        self.analyzer.errors()
    }

    pub fn warnings(&self) -> &[String] {
        self.analyzer.warnings()
    }

    /// Render SQL and remember it as the last generated statement.
    ///
    /// Columns typed by an earlier `createTable` in this session format
    /// INSERT literals by type.
    pub fn compile(&mut self, stmt: &Statement) -> NyxResult<String> {
        let sql = Compiler::new(self.dialect)
            .with_catalog(&self.schema)
            .compile(stmt)?;
        self.last_sql = Some(sql.clone());
        Ok(sql)
    }

    pub fn last_sql(&self) -> Option<&str> {
        self.last_sql.as_deref()
    }

    pub fn register_schema<I, S>(&mut self, table: &str, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.register(table, columns);
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn table_cache(&self) -> &TableCache {
        &self.table_cache
    }

    /// Parse, analyze and execute in one step.
    pub async fn run(&mut self, text: &str) -> NyxResult<QueryOutcome> {
        let stmt = self.parse(text)?;
        if !self.analyze(&stmt) {
            return Err(NyxError::Semantic(self.errors().to_vec()));
        }
        self.execute(&stmt).await
    }

    /// Execute an analyzed statement against the attached backend.
    pub async fn execute(&mut self, stmt: &Statement) -> NyxResult<QueryOutcome> {
        if self.backend.is_none() {
            return Err(NyxError::Connection(
                "no database connection; statements can only be compiled".to_string(),
            ));
        }

        match stmt {
            Statement::CreateDatabase(node) => self.execute_create_database(stmt, node).await,
            Statement::CreateTable(node) => self.execute_create_table(stmt, node).await,
            Statement::Insert(node) => self.execute_insert(node).await,
            Statement::Select(_) => {
                let sql = self.compile(stmt)?;
                let rows = self.connection()?.fetch_rows(&sql).await?;
                tracing::debug!(rows = rows.len(), "select returned");
                Ok(QueryOutcome::Rows(rows))
            }
            Statement::Delete(_) => {
                let sql = self.compile(stmt)?;
                let result = self.connection()?.execute(&sql).await?;
                Ok(QueryOutcome::Affected(result.rows_affected))
            }
        }
    }

    fn connection(&self) -> NyxResult<&B> {
        self.backend
            .as_ref()
            .ok_or_else(|| NyxError::Connection("no database connection".to_string()))
    }

    async fn execute_create_database(
        &mut self,
        stmt: &Statement,
        node: &CreateDatabase,
    ) -> NyxResult<QueryOutcome> {
        let sql = self.compile(stmt)?;
        let name = node.name.as_str();

        let backend = self.connection()?;
        if database_name(backend.url()) == Some(name) {
            return Ok(QueryOutcome::status(
                false,
                format!("Database '{}' is already in use", name),
            ));
        }
        if backend.dialect() == Dialect::Sqlite {
            return Ok(QueryOutcome::status(
                false,
                "SQLite does not support creating databases",
            ));
        }

        match backend.database_exists(name).await {
            Ok(true) => {
                return Ok(QueryOutcome::status(
                    false,
                    format!("Database '{}' already exists", name),
                ));
            }
            Ok(false) => {}
            Err(e) => return Ok(failed("create database", e)),
        }
        if let Err(e) = backend.execute(&sql).await {
            return Ok(failed("create database", e));
        }

        if let Some(backend) = self.backend.as_mut() {
            backend.switch_database(name).await?;
        }
        self.table_cache.clear();
        tracing::info!(database = name, "table cache invalidated");

        Ok(QueryOutcome::status(
            true,
            format!("Database '{}' created", name),
        ))
    }

    async fn execute_create_table(
        &mut self,
        stmt: &Statement,
        node: &CreateTable,
    ) -> NyxResult<QueryOutcome> {
        let sql = self.compile(stmt)?;
        if let Err(e) = self.connection()?.execute(&sql).await {
            return Ok(failed("create table", e));
        }

        let columns = node
            .columns
            .iter()
            .map(|c| ColumnMeta {
                name: c.name.clone(),
                sql_type: c.data_type.to_string(),
                data_type: Some(c.data_type),
            })
            .collect();
        self.table_cache.insert(&node.table, columns);

        Ok(QueryOutcome::status(
            true,
            format!("Table '{}' created", node.table),
        ))
    }

    /// Values are coerced to the described column types before rendering,
    /// and those coerced values are what the outcome reports.
    async fn execute_insert(&mut self, node: &Insert) -> NyxResult<QueryOutcome> {
        if !self.table_cache.contains(&node.table) {
            let columns = self.connection()?.describe_table(&node.table).await?;
            if columns.is_empty() {
                return Err(NyxError::Backend(format!(
                    "table '{}' not found in database",
                    node.table
                )));
            }
            self.table_cache.insert(&node.table, columns);
        }

        let mut typed = Insert::new(&node.table);
        for (column, value) in &node.values {
            let ty = self
                .table_cache
                .get(&node.table)
                .and_then(|cols| cols.iter().find(|c| &c.name == column))
                .and_then(|c| c.data_type);
            let value = match ty {
                Some(ty) => coerce(value, ty),
                None => value.clone(),
            };
            typed.assign(column, value);
        }

        let sql = Compiler::new(self.dialect)
            .with_catalog(&self.table_cache)
            .compile(&Statement::Insert(typed.clone()))?;
        self.last_sql = Some(sql.clone());

        let result = self.connection()?.execute(&sql).await?;
        Ok(QueryOutcome::Inserted {
            id: result.last_insert_id,
            values: typed.values,
        })
    }
}

fn failed(what: &str, err: NyxError) -> QueryOutcome {
    tracing::warn!(error = %err, "{} failed", what);
    QueryOutcome::status(false, format!("Failed to {}: {}", what, err))
}
