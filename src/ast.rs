//! Abstract Syntax Tree for nyx statements.
//!
//! A parsed query is one [`Statement`]: a closed enum over the five node
//! kinds. Each node is a plain struct with chainable constructors, so
//! callers can build statements directly instead of formatting DSL text.
//!
//! ```
//! use nyx::ast::*;
//!
//! let stmt: Statement = Select::columns("users", ["name"])
//!     .filter(Condition::new("age", ">", 18))
//!     .limit(5)
//!     .into();
//! assert_eq!(stmt.table_name(), "users");
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A parsed statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    CreateDatabase(CreateDatabase),
    CreateTable(CreateTable),
    Insert(Insert),
    Select(Select),
    Delete(Delete),
}

impl Statement {
    /// Target table, or the database name for `CreateDatabase`.
    pub fn table_name(&self) -> &str {
        match self {
            Statement::CreateDatabase(s) => &s.name,
            Statement::CreateTable(s) => &s.table,
            Statement::Insert(s) => &s.table,
            Statement::Select(s) => &s.table,
            Statement::Delete(s) => &s.table,
        }
    }

    /// Short name of the node kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::CreateDatabase(_) => "CreateDatabase",
            Statement::CreateTable(_) => "CreateTable",
            Statement::Insert(_) => "Insert",
            Statement::Select(_) => "Select",
            Statement::Delete(_) => "Delete",
        }
    }
}

/// `createDatabase(name)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDatabase {
    pub name: String,
}

impl CreateDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// `createTable(name).column(...)*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTable {
    pub table: String,
    pub columns: Vec<ColumnDefinition>,
}

impl CreateTable {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: vec![],
        }
    }

    /// Append a column definition.
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }
}

/// `insert(table).values(col, val, ...)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub table: String,
    /// Column assignments in source order. Column names are unique.
    pub values: Vec<(String, Value)>,
}

impl Insert {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: vec![],
        }
    }

    /// Assign a column. Re-assigning a column replaces the value in place.
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assign(column, value);
        self
    }

    pub fn assign(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.values.iter_mut().find(|(c, _)| *c == column) {
            Some((_, v)) => *v = value,
            None => self.values.push((column, value)),
        }
    }
}

/// `getAll(table)` / `get(table, cols...)` with `.where` / `.limit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub table: String,
    pub columns: Projection,
    pub filter: Option<Condition>,
    pub limit: Option<i64>,
}

impl Select {
    /// `SELECT *`
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Projection::All,
            filter: None,
            limit: None,
        }
    }

    /// `SELECT col, ...`. An empty list selects everything.
    pub fn columns<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cols: Vec<String> = columns.into_iter().map(Into::into).collect();
        Self {
            columns: Projection::from_names(cols),
            ..Self::all(table)
        }
    }

    /// Set the WHERE condition. A later call replaces an earlier one.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(condition);
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }
}

/// `delete(table)` with `.where` / `.limit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub table: String,
    pub filter: Option<Condition>,
    pub limit: Option<i64>,
}

impl Delete {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
            limit: None,
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(condition);
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }
}

macro_rules! into_statement {
    ($($node:ident),*) => {
        $(
            impl From<$node> for Statement {
                fn from(node: $node) -> Self {
                    Statement::$node(node)
                }
            }
        )*
    };
}

into_statement!(CreateDatabase, CreateTable, Insert, Select, Delete);

/// Column list of a SELECT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// `*`
    All,
    Columns(Vec<String>),
}

impl Projection {
    /// No names, or a lone `*`, means every column.
    pub fn from_names(names: Vec<String>) -> Self {
        if names.is_empty() || (names.len() == 1 && names[0] == "*") {
            Projection::All
        } else {
            Projection::Columns(names)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Projection::All)
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::All => write!(f, "*"),
            Projection::Columns(cols) => write!(f, "{}", cols.join(", ")),
        }
    }
}

/// Column types understood by the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Varchar,
    Text,
    Float,
    Boolean,
    DateTime,
}

impl DataType {
    /// Parse a DSL type name, case-insensitively.
    pub fn parse(name: &str) -> Option<DataType> {
        let ty = match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" | "bigint" | "smallint" => DataType::Int,
            "varchar" | "string" | "char" => DataType::Varchar,
            "text" => DataType::Text,
            "float" | "double" | "real" | "decimal" | "numeric" => DataType::Float,
            "boolean" | "bool" => DataType::Boolean,
            "datetime" | "timestamp" | "date" => DataType::DateTime,
            _ => return None,
        };
        Some(ty)
    }

    /// Classify a type name reported by a database catalog.
    pub fn from_sql_type(name: &str) -> Option<DataType> {
        let upper = name.to_ascii_uppercase();
        if upper.starts_with("TINYINT(1)") || upper.contains("BOOL") {
            Some(DataType::Boolean)
        } else if upper.contains("INT") {
            Some(DataType::Int)
        } else if upper.contains("CHAR") {
            Some(DataType::Varchar)
        } else if upper.contains("TEXT") || upper.contains("CLOB") {
            Some(DataType::Text)
        } else if ["REAL", "FLOA", "DOUB", "DEC", "NUMERIC"]
            .iter()
            .any(|t| upper.contains(t))
        {
            Some(DataType::Float)
        } else if upper.contains("DATE") || upper.contains("TIME") {
            Some(DataType::DateTime)
        } else {
            None
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int => "INT",
            DataType::Varchar => "VARCHAR",
            DataType::Text => "TEXT",
            DataType::Float => "FLOAT",
            DataType::Boolean => "BOOLEAN",
            DataType::DateTime => "DATETIME",
        };
        write!(f, "{}", name)
    }
}

/// Column constraints. The derived ordering is the canonical SQL order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Constraint {
    PrimaryKey,
    NotNull,
    Unique,
    AutoIncrement,
}

impl Constraint {
    /// Parse a constraint name, ignoring case, `_`, `-` and spaces.
    pub fn parse(name: &str) -> Option<Constraint> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "primarykey" | "pk" => Some(Constraint::PrimaryKey),
            "notnull" => Some(Constraint::NotNull),
            "unique" => Some(Constraint::Unique),
            "autoincrement" => Some(Constraint::AutoIncrement),
            _ => None,
        }
    }
}

/// One `.column(name, type, ...)` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    /// Only meaningful for `Varchar`.
    pub size: Option<u32>,
    pub constraints: BTreeSet<Constraint>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            size: None,
            constraints: BTreeSet::new(),
        }
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.insert(constraint);
        self
    }

    pub fn has(&self, constraint: Constraint) -> bool {
        self.constraints.contains(&constraint)
    }
}

/// Comparison operators accepted in `.where(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Like,
    In,
}

impl Operator {
    pub const ALL: [Operator; 8] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Gt,
        Operator::Lte,
        Operator::Gte,
        Operator::Like,
        Operator::In,
    ];

    /// Parse an operator spelling. `LIKE` and `IN` ignore case.
    pub fn parse(op: &str) -> Option<Operator> {
        let op = op.trim();
        Operator::ALL
            .into_iter()
            .find(|o| o.as_sql().eq_ignore_ascii_case(op))
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Lte => "<=",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::In => "IN",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// A single `.where(column, op, value)` condition.
///
/// The operator is kept as written; [`Condition::operator`] resolves it.
/// A two-argument `.where` leaves `value` empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub op: String,
    pub value: Option<Value>,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: op.into(),
            value: Some(value.into()),
        }
    }

    pub fn operator(&self) -> Option<Operator> {
        Operator::parse(&self.op)
    }

    /// Column, operator and value are all present.
    pub fn is_complete(&self) -> bool {
        !self.column.is_empty() && !self.op.trim().is_empty() && self.value.is_some()
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// The value as it would read in source text, without quotes.
    pub fn as_text(&self) -> String {
        self.to_string()
    }

    /// Integer or float, or text that reads as a plain integer or float.
    pub fn is_plain_number(&self) -> bool {
        match self {
            Value::Int(_) | Value::Float(_) => true,
            Value::Text(s) => is_plain_number(s),
            _ => false,
        }
    }

    /// Integer value, also accepting integer-shaped text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// `-?\d+(\.\d+)?` with nothing else around it.
pub fn is_plain_number(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let mut parts = digits.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    match parts.next() {
        Some(frac) => all_digits(int_part) && all_digits(frac),
        None => all_digits(int_part),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}
