//! SQL generation for nyx statements.
//!
//! Converts analyzed statements into SQL text for one [`Dialect`].
//! Identifiers are always backtick-quoted and every rendered statement ends
//! with `;`. Node shape is re-checked here, so a statement that skipped
//! analysis fails with [`NyxError::Generation`] instead of producing
//! broken SQL.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::ast::*;
use crate::error::{NyxError, NyxResult};
use crate::schema::TypeCatalog;

/// Target SQL dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    MySql,
    Sqlite,
}

impl Dialect {
    /// Infer the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Dialect> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "sqlite" => Some(Dialect::Sqlite),
            _ => None,
        }
    }

    /// Backtick-quote an identifier, doubling embedded backticks.
    pub fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// Single-quote a string literal.
    pub fn quote_str(&self, s: &str) -> String {
        match self {
            Dialect::MySql => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('\'');
                for ch in s.chars() {
                    match ch {
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\0' => out.push_str("\\0"),
                        c => out.push(c),
                    }
                }
                out.push('\'');
                out
            }
            Dialect::Sqlite => format!("'{}'", s.replace('\'', "''")),
        }
    }

    fn type_name(&self, column: &ColumnDefinition) -> String {
        match (column.data_type, self) {
            (DataType::Int, Dialect::MySql) => "INT".to_string(),
            (DataType::Int, Dialect::Sqlite) => "INTEGER".to_string(),
            (DataType::Varchar, _) => format!("VARCHAR({})", column.size.unwrap_or(255)),
            (ty, _) => ty.to_string(),
        }
    }

    fn constraint_sql(&self, constraint: Constraint) -> &'static str {
        match constraint {
            Constraint::PrimaryKey => "PRIMARY KEY",
            Constraint::NotNull => "NOT NULL",
            Constraint::Unique => "UNIQUE",
            Constraint::AutoIncrement => match self {
                Dialect::MySql => "AUTO_INCREMENT",
                Dialect::Sqlite => "AUTOINCREMENT",
            },
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::MySql => write!(f, "mysql"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(format!("unknown dialect '{}' (expected mysql or sqlite)", other)),
        }
    }
}

/// Trait for converting statements to SQL.
pub trait ToSql {
    /// Render this node without the trailing `;`.
    fn to_sql(&self, compiler: &Compiler<'_>) -> NyxResult<String>;
}

/// Renders statements for a dialect, optionally consulting a column-type
/// catalog for INSERT literal formatting.
#[derive(Clone, Copy, Default)]
pub struct Compiler<'a> {
    dialect: Dialect,
    catalog: Option<&'a dyn TypeCatalog>,
}

impl<'a> Compiler<'a> {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: &'a dyn TypeCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Render a full statement, terminated with `;`.
    pub fn compile(&self, stmt: &Statement) -> NyxResult<String> {
        let mut sql = stmt.to_sql(self)?;
        sql.push(';');
        tracing::debug!(dialect = %self.dialect, sql = %sql, "generated SQL");
        Ok(sql)
    }

    fn ident(&self, name: &str) -> String {
        self.dialect.quote_ident(name)
    }

    fn column_type(&self, table: &str, column: &str) -> Option<DataType> {
        self.catalog.and_then(|c| c.column_type(table, column))
    }

    /// INSERT literal. Quoted text unless the catalog types the column.
    fn insert_value(&self, table: &str, column: &str, value: &Value) -> String {
        match (value, self.column_type(table, column)) {
            (Value::Null, _) => "NULL".to_string(),
            (v, Some(ty)) => self.typed_literal(&coerce(v, ty)),
            (v, None) => self.dialect.quote_str(&v.as_text()),
        }
    }

    fn typed_literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Text(s) => self.dialect.quote_str(s),
        }
    }

    /// WHERE literal. Number-shaped text goes out unquoted.
    fn where_value(&self, value: &Value) -> String {
        match value {
            Value::Text(s) if is_plain_number(s) => s.clone(),
            v => self.typed_literal(v),
        }
    }

    fn condition(&self, cond: &Condition) -> NyxResult<String> {
        let op = cond
            .operator()
            .ok_or_else(|| NyxError::generation(format!("unsupported operator '{}'", cond.op)))?;
        let value = match (&cond.value, cond.column.is_empty()) {
            (Some(v), false) => v,
            _ => return Err(NyxError::generation("incomplete WHERE condition")),
        };

        let rhs = match (op, value) {
            (Operator::In, Value::Text(s)) => {
                let items: Vec<String> = s
                    .split(',')
                    .map(|item| self.where_value(&Value::Text(item.trim().to_string())))
                    .collect();
                format!("({})", items.join(", "))
            }
            (Operator::In, v) => format!("({})", self.where_value(v)),
            (_, v) => self.where_value(v),
        };
        Ok(format!("{} {} {}", self.ident(&cond.column), op, rhs))
    }

    fn filter_and_limit(&self, sql: &mut String, filter: Option<&Condition>, limit: Option<i64>) -> NyxResult<()> {
        if let Some(cond) = filter {
            sql.push_str(" WHERE ");
            sql.push_str(&self.condition(cond)?);
        }
        if let Some(n) = limit {
            if n <= 0 {
                return Err(NyxError::generation("LIMIT must be a positive number"));
            }
            sql.push_str(&format!(" LIMIT {}", n));
        }
        Ok(())
    }
}

impl fmt::Debug for Compiler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("dialect", &self.dialect)
            .field("catalog", &self.catalog.is_some())
            .finish()
    }
}

/// Compile with the default dialect and no type catalog.
pub fn compile(stmt: &Statement) -> NyxResult<String> {
    Compiler::default().compile(stmt)
}

impl ToSql for Statement {
    fn to_sql(&self, compiler: &Compiler<'_>) -> NyxResult<String> {
        match self {
            Statement::CreateDatabase(node) => node.to_sql(compiler),
            Statement::CreateTable(node) => node.to_sql(compiler),
            Statement::Insert(node) => node.to_sql(compiler),
            Statement::Select(node) => node.to_sql(compiler),
            Statement::Delete(node) => node.to_sql(compiler),
        }
    }
}

fn require_name(name: &str, what: &str) -> NyxResult<()> {
    if name.trim().is_empty() {
        return Err(NyxError::generation(format!("{} name is empty", what)));
    }
    Ok(())
}

impl ToSql for CreateDatabase {
    fn to_sql(&self, c: &Compiler<'_>) -> NyxResult<String> {
        require_name(&self.name, "Database")?;
        Ok(format!("CREATE DATABASE {}", c.ident(&self.name)))
    }
}

impl ToSql for CreateTable {
    fn to_sql(&self, c: &Compiler<'_>) -> NyxResult<String> {
        require_name(&self.table, "Table")?;
        if self.columns.is_empty() {
            return Err(NyxError::generation(format!(
                "table '{}' has no columns",
                self.table
            )));
        }

        let mut clauses = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            require_name(&col.name, "Column")?;
            let mut clause = format!("{} {}", c.ident(&col.name), c.dialect.type_name(col));
            // BTreeSet iteration is the canonical constraint order.
            for constraint in &col.constraints {
                clause.push(' ');
                clause.push_str(c.dialect.constraint_sql(*constraint));
            }
            clauses.push(clause);
        }

        Ok(format!(
            "CREATE TABLE {} ({})",
            c.ident(&self.table),
            clauses.join(", ")
        ))
    }
}

impl ToSql for Insert {
    fn to_sql(&self, c: &Compiler<'_>) -> NyxResult<String> {
        require_name(&self.table, "Table")?;
        if self.values.is_empty() {
            return Err(NyxError::generation(format!(
                "insert into '{}' has no values",
                self.table
            )));
        }

        let cols: Vec<String> = self.values.iter().map(|(col, _)| c.ident(col)).collect();
        let vals: Vec<String> = self
            .values
            .iter()
            .map(|(col, v)| c.insert_value(&self.table, col, v))
            .collect();

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            c.ident(&self.table),
            cols.join(", "),
            vals.join(", ")
        ))
    }
}

impl ToSql for Select {
    fn to_sql(&self, c: &Compiler<'_>) -> NyxResult<String> {
        require_name(&self.table, "Table")?;
        let mut sql = String::from("SELECT ");

        match &self.columns {
            Projection::All => sql.push('*'),
            Projection::Columns(cols) => {
                let cols: Vec<String> = cols.iter().map(|col| c.ident(col)).collect();
                sql.push_str(&cols.join(", "));
            }
        }

        sql.push_str(" FROM ");
        sql.push_str(&c.ident(&self.table));
        c.filter_and_limit(&mut sql, self.filter.as_ref(), self.limit)?;
        Ok(sql)
    }
}

impl ToSql for Delete {
    fn to_sql(&self, c: &Compiler<'_>) -> NyxResult<String> {
        require_name(&self.table, "Table")?;
        if self.limit.is_some() && c.dialect == Dialect::Sqlite {
            return Err(NyxError::generation("SQLite does not support LIMIT on DELETE"));
        }

        let mut sql = format!("DELETE FROM {}", c.ident(&self.table));
        c.filter_and_limit(&mut sql, self.filter.as_ref(), self.limit)?;
        Ok(sql)
    }
}

/// Parse a boolean spelling: `true/1/yes/on/t` or `false/0/no/off/f`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "t" => Some(true),
        "false" | "0" | "no" | "off" | "f" => Some(false),
        _ => None,
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Convert a literal to the representation a column type expects.
///
/// Values that do not convert are kept as they are (as text for scalar
/// types) and a warning is logged.
pub fn coerce(value: &Value, ty: DataType) -> Value {
    if let Value::Null = value {
        return Value::Null;
    }

    let converted = match ty {
        DataType::Int => match value {
            Value::Int(n) => Some(Value::Int(*n)),
            Value::Bool(b) => Some(Value::Int(i64::from(*b))),
            Value::Float(f) if f.fract() == 0.0 => Some(Value::Int(*f as i64)),
            Value::Text(s) => s.trim().parse().ok().map(Value::Int),
            _ => None,
        },
        DataType::Float => match value {
            Value::Int(n) => Some(Value::Float(*n as f64)),
            Value::Float(f) => Some(Value::Float(*f)),
            Value::Text(s) if is_plain_number(s.trim()) => s.trim().parse().ok().map(Value::Float),
            _ => None,
        },
        DataType::Boolean => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::Int(0) => Some(Value::Bool(false)),
            Value::Int(1) => Some(Value::Bool(true)),
            Value::Text(s) => parse_bool(s).map(Value::Bool),
            _ => None,
        },
        DataType::DateTime => parse_datetime(&value.as_text())
            .map(|dt| Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string())),
        DataType::Varchar | DataType::Text => Some(Value::Text(value.as_text())),
    };

    converted.unwrap_or_else(|| {
        tracing::warn!(value = %value, ty = %ty, "could not convert value, keeping it as text");
        Value::Text(value.as_text())
    })
}
