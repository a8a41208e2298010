//! Semantic analysis of parsed statements against the session schema.
//!
//! [`Analyzer::analyze`] validates one statement, collecting every error
//! instead of stopping at the first, and registers tables it learns about
//! (`CreateTable`, or an `Insert`/`Select`/`Delete` on an unknown table).
//! Diagnostics are reset at the start of every call.

use serde::Serialize;

use crate::ast::*;
use crate::schema::Schema;

/// Errors and warnings from the most recent analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Stateless apart from the diagnostics buffer; the schema is passed in.
#[derive(Debug, Default)]
pub struct Analyzer {
    diagnostics: Diagnostics,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `stmt`, updating `schema` as a side effect.
    ///
    /// Returns true iff no errors were recorded. Warnings never affect the
    /// result.
    pub fn analyze(&mut self, stmt: &Statement, schema: &mut Schema) -> bool {
        self.diagnostics = Diagnostics::default();

        match stmt {
            Statement::CreateDatabase(node) => self.analyze_create_database(node, schema),
            Statement::CreateTable(node) => self.analyze_create_table(node, schema),
            Statement::Insert(node) => self.analyze_insert(node, schema),
            Statement::Select(node) => self.analyze_select(node, schema),
            Statement::Delete(node) => self.analyze_delete(node, schema),
        }

        for warning in &self.diagnostics.warnings {
            tracing::warn!("{}", warning);
        }
        if !self.diagnostics.errors.is_empty() {
            tracing::debug!(errors = ?self.diagnostics.errors, "semantic analysis failed");
        }
        self.diagnostics.is_valid()
    }

    pub fn errors(&self) -> &[String] {
        &self.diagnostics.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.diagnostics.warnings
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn error(&mut self, message: impl Into<String>) {
        self.diagnostics.errors.push(message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.diagnostics.warnings.push(message.into());
    }

    fn analyze_create_database(&mut self, node: &CreateDatabase, schema: &mut Schema) {
        if node.name.trim().is_empty() {
            self.error("Database name is empty");
            return;
        }
        schema.set_database(&node.name);
    }

    /// The new definition overwrites any earlier one for the same table.
    fn analyze_create_table(&mut self, node: &CreateTable, schema: &mut Schema) {
        if node.table.trim().is_empty() {
            self.error("Table name is empty");
            return;
        }
        if node.columns.is_empty() {
            self.error(format!("Table '{}' should have at least one column", node.table));
            return;
        }

        let mut seen: Vec<&str> = Vec::with_capacity(node.columns.len());
        for col in &node.columns {
            if col.name.trim().is_empty() {
                self.error(format!("Table '{}' has a column with an empty name", node.table));
                continue;
            }
            if seen.contains(&col.name.as_str()) {
                self.error(format!(
                    "Column '{}' is defined more than once in table '{}'",
                    col.name, node.table
                ));
            }
            seen.push(&col.name);

            match (col.data_type, col.size) {
                (DataType::Varchar, Some(0)) => self.error(format!(
                    "VARCHAR size of column '{}' must be greater than 0",
                    col.name
                )),
                (DataType::Varchar, _) | (_, None) => {}
                (ty, Some(size)) => self.warn(format!(
                    "Size {} ignored for column '{}' of type {}",
                    size, col.name, ty
                )),
            }
        }

        if self.diagnostics.errors.is_empty() {
            schema.define(node);
        }
    }

    fn analyze_insert(&mut self, node: &Insert, schema: &mut Schema) {
        if node.table.trim().is_empty() {
            self.error("Table name is empty");
            return;
        }
        if node.values.is_empty() {
            self.error(format!("Insert into '{}' must assign at least one value", node.table));
            return;
        }

        if !schema.has_table(&node.table) {
            self.warn_unknown_table(schema, &node.table, "registering it from the inserted columns");
            schema.register(&node.table, node.values.iter().map(|(c, _)| c.as_str()));
            return;
        }

        for (column, _) in &node.values {
            self.check_column(schema, &node.table, column);
        }
    }

    fn analyze_select(&mut self, node: &Select, schema: &mut Schema) {
        if node.table.trim().is_empty() {
            self.error("Table name is empty");
            return;
        }
        self.register_if_unknown(schema, &node.table, &node.columns);

        if let Projection::Columns(cols) = &node.columns {
            for column in cols {
                self.check_column(schema, &node.table, column);
            }
        }
        if let Some(cond) = &node.filter {
            self.check_condition(schema, &node.table, cond);
        }
        if let Some(limit) = node.limit {
            self.check_limit(limit);
        }
    }

    /// Same rules as a wildcard SELECT.
    fn analyze_delete(&mut self, node: &Delete, schema: &mut Schema) {
        if node.table.trim().is_empty() {
            self.error("Table name is empty");
            return;
        }
        self.register_if_unknown(schema, &node.table, &Projection::All);

        if let Some(cond) = &node.filter {
            self.check_condition(schema, &node.table, cond);
        }
        if let Some(limit) = node.limit {
            self.check_limit(limit);
        }
    }

    fn warn_unknown_table(&mut self, schema: &Schema, table: &str, action: &str) {
        let hint = schema
            .suggest_table(table)
            .map(|s| format!(" (did you mean '{}'?)", s))
            .unwrap_or_default();
        self.warn(format!("Table '{}' not found in schema{}, {}", table, hint, action));
    }

    /// Unknown tables get a best-effort entry: the selected columns, or a
    /// lone `id` for a wildcard.
    fn register_if_unknown(&mut self, schema: &mut Schema, table: &str, columns: &Projection) {
        if schema.has_table(table) {
            return;
        }
        self.warn_unknown_table(schema, table, "registering a basic structure");
        match columns {
            Projection::All => schema.register(table, ["id"]),
            Projection::Columns(cols) => schema.register(table, cols.iter().map(String::as_str)),
        }
    }

    fn check_column(&mut self, schema: &Schema, table: &str, column: &str) {
        if schema.has_column(table, column) {
            return;
        }
        match schema.suggest_column(table, column) {
            Some(sugg) => self.error(format!(
                "Column '{}' not found on table '{}'. Did you mean '{}'?",
                column, table, sugg
            )),
            None => self.error(format!("Column '{}' not found on table '{}'", column, table)),
        }
    }

    fn check_condition(&mut self, schema: &Schema, table: &str, cond: &Condition) {
        if !cond.is_complete() {
            self.error("WHERE condition is incomplete: expected column, operator and value");
            return;
        }
        self.check_column(schema, table, &cond.column);

        if cond.operator().is_none() {
            let supported: Vec<&str> = Operator::ALL.iter().map(|o| o.as_sql()).collect();
            self.error(format!(
                "Operator '{}' not supported (expected one of {})",
                cond.op,
                supported.join(", ")
            ));
        }
    }

    fn check_limit(&mut self, limit: i64) {
        if limit <= 0 {
            self.error("LIMIT must be a positive number");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn analyze(input: &str, schema: &mut Schema) -> (bool, Analyzer) {
        let stmt = parse(input).unwrap();
        let mut analyzer = Analyzer::new();
        let ok = analyzer.analyze(&stmt, schema);
        (ok, analyzer)
    }

    fn users_schema() -> Schema {
        let mut schema = Schema::new();
        schema.register("users", ["id", "name", "age"]);
        schema
    }

    #[test]
    fn test_create_database_records_name() {
        let mut schema = Schema::new();
        let (ok, _) = analyze("createDatabase('shop')", &mut schema);
        assert!(ok);
        assert_eq!(schema.database(), Some("shop"));

        let (ok, a) = analyze("createDatabase('')", &mut schema);
        assert!(!ok);
        assert_eq!(a.errors(), ["Database name is empty"]);
    }

    #[test]
    fn test_create_table_overwrites() {
        let mut schema = users_schema();
        let (ok, a) = analyze("createTable('users').column('uid','int')", &mut schema);
        assert!(ok);
        assert!(a.warnings().is_empty());
        assert_eq!(schema.columns("users"), Some(vec!["uid"]));
    }

    #[test]
    fn test_create_table_requires_columns() {
        let mut schema = Schema::new();
        let (ok, a) = analyze("createTable('empty')", &mut schema);
        assert!(!ok);
        assert_eq!(a.errors(), ["Table 'empty' should have at least one column"]);
        assert!(!schema.has_table("empty"));
    }

    #[test]
    fn test_create_table_column_checks() {
        let mut schema = Schema::new();
        let (ok, a) = analyze(
            "createTable('t').column('a','int').column('a','text').column('b','varchar',0).column('c','int',11)",
            &mut schema,
        );
        assert!(!ok);
        assert_eq!(
            a.errors(),
            [
                "Column 'a' is defined more than once in table 't'",
                "VARCHAR size of column 'b' must be greater than 0",
            ]
        );
        assert_eq!(a.warnings(), ["Size 11 ignored for column 'c' of type INT"]);
        assert!(!schema.has_table("t"));
    }

    #[test]
    fn test_insert_unknown_column_reports_all() {
        let mut schema = users_schema();
        let (ok, a) = analyze("insert('users').values('nmae','x','email','y','age',3)", &mut schema);
        assert!(!ok);
        assert_eq!(
            a.errors(),
            [
                "Column 'nmae' not found on table 'users'. Did you mean 'name'?",
                "Column 'email' not found on table 'users'",
            ]
        );
    }

    #[test]
    fn test_select_wildcard_registers_id() {
        let mut schema = Schema::new();
        let (ok, a) = analyze("getAll('logs')", &mut schema);
        assert!(ok);
        assert_eq!(a.warnings().len(), 1);
        assert!(a.warnings()[0].contains("'logs'"));
        assert_eq!(schema.columns("logs"), Some(vec!["id"]));
    }

    #[test]
    fn test_unknown_table_warning_suggests_near_match() {
        let mut schema = users_schema();
        let (ok, a) = analyze("getAll('usrs')", &mut schema);
        assert!(ok);
        assert_eq!(
            a.warnings(),
            ["Table 'usrs' not found in schema (did you mean 'users'?), registering a basic structure"]
        );
    }

    #[test]
    fn test_select_explicit_columns_register() {
        let mut schema = Schema::new();
        let (ok, _) = analyze("get('logs','level','msg')", &mut schema);
        assert!(ok);
        assert_eq!(schema.columns("logs"), Some(vec!["level", "msg"]));
    }

    #[test]
    fn test_where_checks() {
        let mut schema = users_schema();

        let (ok, a) = analyze("getAll('users').where('age','CONTAINS','1')", &mut schema);
        assert!(!ok);
        assert_eq!(a.errors().len(), 1);
        assert!(a.errors()[0].starts_with("Operator 'CONTAINS' not supported"));

        let (ok, a) = analyze("getAll('users').where('age','>')", &mut schema);
        assert!(!ok);
        assert!(a.errors()[0].starts_with("WHERE condition is incomplete"));

        let (ok, a) = analyze("getAll('users').where('height','>',1)", &mut schema);
        assert!(!ok);
        assert!(a.errors()[0].contains("'height'"));

        let (ok, _) = analyze("getAll('users').where('name','like','J%')", &mut schema);
        assert!(ok);
    }

    #[test]
    fn test_limit_must_be_positive() {
        let mut schema = users_schema();
        for q in ["getAll('users').limit(0)", "getAll('users').limit('-2')"] {
            let (ok, a) = analyze(q, &mut schema);
            assert!(!ok);
            assert_eq!(a.errors(), ["LIMIT must be a positive number"]);
        }
    }

    #[test]
    fn test_delete_follows_select_rules() {
        let mut schema = Schema::new();
        let (ok, a) = analyze("delete('sessions').where('id','=',3)", &mut schema);
        assert!(ok);
        assert_eq!(a.warnings().len(), 1);

        let (ok, a) = analyze("delete('sessions').where('token','=','x')", &mut schema);
        assert!(!ok);
        assert!(a.warnings().is_empty());
    }

    #[test]
    fn test_diagnostics_reset_each_call() {
        let mut schema = users_schema();
        let mut analyzer = Analyzer::new();
        assert!(!analyzer.analyze(&parse("get('users','bogus')").unwrap(), &mut schema));
        assert_eq!(analyzer.errors().len(), 1);
        assert!(analyzer.analyze(&parse("get('users','id')").unwrap(), &mut schema));
        assert!(analyzer.errors().is_empty());
        assert!(analyzer.warnings().is_empty());
    }
}
