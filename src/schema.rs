//! Session schema: table name → ordered column list.
//!
//! The schema is plain owned state. The semantic analyzer mutates it when
//! it sees `CreateTable` or auto-registers an unknown table; callers can
//! pre-seed it with [`Schema::register`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strsim::levenshtein;

use crate::ast::{CreateTable, DataType};

/// A column known to the schema. Auto-registered columns carry no type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub data_type: Option<DataType>,
}

impl SchemaColumn {
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
        }
    }
}

/// Table/column registry for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    database: Option<String>,
    tables: BTreeMap<String, Vec<SchemaColumn>>,
}

/// Source of column types for type-directed literal formatting.
pub trait TypeCatalog {
    fn column_type(&self, table: &str, column: &str) -> Option<DataType>;
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a table by column names.
    pub fn register<I, S>(&mut self, table: impl Into<String>, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cols = columns.into_iter().map(SchemaColumn::untyped).collect();
        self.tables.insert(table.into(), cols);
    }

    /// Replace a table's entry with the typed columns of a `CreateTable`.
    pub fn define(&mut self, node: &CreateTable) {
        let cols = node
            .columns
            .iter()
            .map(|c| SchemaColumn {
                name: c.name.clone(),
                data_type: Some(c.data_type),
            })
            .collect();
        self.tables.insert(node.table.clone(), cols);
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|cols| cols.iter().any(|c| c.name == column))
    }

    /// Column names of a table, in definition order.
    pub fn columns(&self, table: &str) -> Option<Vec<&str>> {
        self.tables
            .get(table)
            .map(|cols| cols.iter().map(|c| c.name.as_str()).collect())
    }

    pub fn table(&self, table: &str) -> Option<&[SchemaColumn]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    /// Table names in sorted order.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn set_database(&mut self, name: impl Into<String>) {
        self.database = Some(name.into());
    }

    /// Closest known column name, if any is near enough to be a typo.
    pub fn suggest_column(&self, table: &str, column: &str) -> Option<String> {
        let cols = self.tables.get(table)?;
        did_you_mean(column, cols.iter().map(|c| c.name.as_str()))
    }

    /// Closest known table name.
    pub fn suggest_table(&self, table: &str) -> Option<String> {
        did_you_mean(table, self.tables())
    }
}

impl TypeCatalog for Schema {
    fn column_type(&self, table: &str, column: &str) -> Option<DataType> {
        self.tables
            .get(table)?
            .iter()
            .find(|c| c.name == column)
            .and_then(|c| c.data_type)
    }
}

/// Best match by Levenshtein distance under a length-scaled threshold.
fn did_you_mean<'a>(input: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let threshold = match input.len() {
        0..=2 => 0,
        3..=5 => 2,
        _ => 3,
    };

    let mut best: Option<(&str, usize)> = None;
    for cand in candidates {
        let dist = levenshtein(input, cand);
        if dist <= threshold && best.is_none_or(|(_, d)| dist < d) {
            best = Some((cand, dist));
        }
    }
    best.map(|(c, _)| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ColumnDefinition, CreateTable};

    #[test]
    fn test_register_replaces_entry() {
        let mut schema = Schema::new();
        schema.register("users", ["id", "name"]);
        schema.register("users", ["id"]);
        assert_eq!(schema.columns("users"), Some(vec!["id"]));
        assert!(schema.has_column("users", "id"));
        assert!(!schema.has_column("users", "name"));
    }

    #[test]
    fn test_define_records_types() {
        let mut schema = Schema::new();
        schema.define(
            &CreateTable::new("users")
                .column(ColumnDefinition::new("id", DataType::Int))
                .column(ColumnDefinition::new("active", DataType::Boolean)),
        );
        assert_eq!(schema.column_type("users", "active"), Some(DataType::Boolean));
        assert_eq!(schema.column_type("users", "missing"), None);
        assert_eq!(schema.column_type("ghost", "id"), None);
    }

    #[test]
    fn test_did_you_mean() {
        let mut schema = Schema::new();
        schema.register("users", ["email", "password"]);
        schema.register("orders", ["id", "total"]);

        assert_eq!(schema.suggest_column("users", "emial"), Some("email".into()));
        assert_eq!(schema.suggest_column("users", "zz"), None);
        assert_eq!(schema.suggest_table("usr"), Some("users".into()));
    }
}
