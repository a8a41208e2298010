use std::cell::RefCell;
use std::collections::HashMap;

use nyx::backend::{ColumnMeta, ExecResult};
use nyx::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

/// Records every statement and answers from canned data.
#[derive(Default)]
struct MockBackend {
    url: String,
    dialect: Dialect,
    executed: RefCell<Vec<String>>,
    rows: Vec<Row>,
    tables: HashMap<String, Vec<ColumnMeta>>,
    databases: Vec<String>,
    describes: RefCell<usize>,
    fail_execute: bool,
}

impl MockBackend {
    fn mysql(db: &str) -> Self {
        Self {
            url: format!("mysql://root@localhost/{}", db),
            ..Self::default()
        }
    }

    fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }
}

impl Backend for MockBackend {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_rows(&self, sql: &str) -> NyxResult<Vec<Row>> {
        self.executed.borrow_mut().push(sql.to_string());
        Ok(self.rows.clone())
    }

    async fn execute(&self, sql: &str) -> NyxResult<ExecResult> {
        if self.fail_execute {
            return Err(NyxError::Backend("access denied".to_string()));
        }
        self.executed.borrow_mut().push(sql.to_string());
        Ok(ExecResult {
            rows_affected: 2,
            last_insert_id: Some(41),
        })
    }

    async fn describe_table(&self, table: &str) -> NyxResult<Vec<ColumnMeta>> {
        *self.describes.borrow_mut() += 1;
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }

    async fn database_exists(&self, name: &str) -> NyxResult<bool> {
        Ok(self.databases.iter().any(|d| d == name))
    }

    async fn switch_database(&mut self, name: &str) -> NyxResult<()> {
        self.url = format!("mysql://root@localhost/{}", name);
        Ok(())
    }
}

fn users_backend() -> MockBackend {
    let mut backend = MockBackend::mysql("app");
    backend.tables.insert(
        "users".to_string(),
        vec![
            ColumnMeta::new("id", "int(11)"),
            ColumnMeta::new("name", "varchar(100)"),
            ColumnMeta::new("age", "int(11)"),
            ColumnMeta::new("active", "tinyint(1)"),
        ],
    );
    backend
}

#[tokio::test]
async fn test_select_returns_ordered_rows() {
    let mut backend = users_backend();
    let row = json!({"name": "Ann", "age": 31});
    backend.rows = vec![row.as_object().cloned().unwrap()];

    let mut session = Session::with_backend(backend);
    session.register_schema("users", ["id", "name", "age"]);

    let outcome = session.run("get('users','name','age').where('age','>','18')").await.unwrap();
    let QueryOutcome::Rows(rows) = outcome else {
        panic!("expected rows");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["name", "age"]);
    assert_eq!(
        session.backend().unwrap().executed(),
        vec!["SELECT `name`, `age` FROM `users` WHERE `age` > 18;"]
    );
}

#[tokio::test]
async fn test_insert_coerces_and_reports_id() {
    let mut session = Session::with_backend(users_backend());
    session.register_schema("users", ["id", "name", "age", "active"]);

    let outcome = session
        .run("insert('users').values('name','Ann','age','31','active','yes')")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        QueryOutcome::Inserted {
            id: Some(41),
            values: vec![
                ("name".to_string(), Value::from("Ann")),
                ("age".to_string(), Value::Int(31)),
                ("active".to_string(), Value::Bool(true)),
            ],
        }
    );
    assert_eq!(
        session.last_sql(),
        Some("INSERT INTO `users` (`name`, `age`, `active`) VALUES ('Ann', 31, TRUE);")
    );
}

#[tokio::test]
async fn test_table_metadata_is_cached() {
    let mut session = Session::with_backend(users_backend());
    session.register_schema("users", ["id", "name", "age", "active"]);

    session.run("insert('users').values('name','a')").await.unwrap();
    session.run("insert('users').values('name','b')").await.unwrap();
    assert_eq!(*session.backend().unwrap().describes.borrow(), 1);
    assert!(session.table_cache().contains("users"));
}

#[tokio::test]
async fn test_insert_into_missing_table_fails() {
    let mut session = Session::with_backend(MockBackend::mysql("app"));
    let err = session.run("insert('ghost').values('x','1')").await.unwrap_err();
    assert!(matches!(err, NyxError::Backend(_)));
}

#[tokio::test]
async fn test_create_table_and_delete() {
    let mut session = Session::with_backend(MockBackend::mysql("app"));

    let outcome = session
        .run("createTable('logs').column('id','int','primarykey').column('level','varchar',16)")
        .await
        .unwrap();
    assert_eq!(outcome, QueryOutcome::status(true, "Table 'logs' created"));
    assert!(session.table_cache().contains("logs"));

    let outcome = session.run("delete('logs').where('level','=','debug').limit(10)").await.unwrap();
    assert_eq!(outcome, QueryOutcome::Affected(2));
    assert_eq!(
        session.backend().unwrap().executed(),
        vec![
            "CREATE TABLE `logs` (`id` INT PRIMARY KEY, `level` VARCHAR(16));",
            "DELETE FROM `logs` WHERE `level` = 'debug' LIMIT 10;",
        ]
    );
}

#[tokio::test]
async fn test_create_table_failure_is_a_status() {
    let mut backend = MockBackend::mysql("app");
    backend.fail_execute = true;
    let mut session = Session::with_backend(backend);

    match session.run("createTable('t').column('id','int')").await.unwrap() {
        QueryOutcome::Status { success, message } => {
            assert!(!success);
            assert!(message.contains("access denied"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_create_database_switches_and_clears_cache() {
    let mut session = Session::with_backend(users_backend());
    session.register_schema("users", ["id", "name", "age", "active"]);
    session.run("insert('users').values('name','a')").await.unwrap();
    assert!(!session.table_cache().is_empty());

    let outcome = session.run("createDatabase('shop')").await.unwrap();
    assert_eq!(outcome, QueryOutcome::status(true, "Database 'shop' created"));
    assert_eq!(session.backend().unwrap().url(), "mysql://root@localhost/shop");
    assert!(session.table_cache().is_empty());
    assert_eq!(session.schema().database(), Some("shop"));
}

#[tokio::test]
async fn test_create_database_refusals() {
    let mut session = Session::with_backend(MockBackend::mysql("app"));
    let outcome = session.run("createDatabase('app')").await.unwrap();
    assert_eq!(outcome, QueryOutcome::status(false, "Database 'app' is already in use"));

    let mut backend = MockBackend::mysql("app");
    backend.url = "mysql://root@localhost/app?ssl-mode=disabled".to_string();
    let mut session = Session::with_backend(backend);
    let outcome = session.run("createDatabase('app')").await.unwrap();
    assert_eq!(outcome, QueryOutcome::status(false, "Database 'app' is already in use"));

    let mut backend = MockBackend::mysql("app");
    backend.databases.push("shop".to_string());
    let mut session = Session::with_backend(backend);
    let outcome = session.run("createDatabase('shop')").await.unwrap();
    assert_eq!(outcome, QueryOutcome::status(false, "Database 'shop' already exists"));
    assert!(session.backend().unwrap().executed().is_empty());

    let backend = MockBackend {
        url: "sqlite://app.db".to_string(),
        dialect: Dialect::Sqlite,
        ..MockBackend::default()
    };
    let mut session = Session::with_backend(backend);
    let outcome = session.run("createDatabase('other')").await.unwrap();
    assert_eq!(
        outcome,
        QueryOutcome::status(false, "SQLite does not support creating databases")
    );
}

#[tokio::test]
async fn test_create_database_only_refuses_the_exact_active_name() {
    let mut session = Session::with_backend(MockBackend::mysql("myshop"));
    let outcome = session.run("createDatabase('shop')").await.unwrap();
    assert_eq!(outcome, QueryOutcome::status(true, "Database 'shop' created"));
    assert_eq!(
        session.backend().unwrap().executed(),
        vec!["CREATE DATABASE `shop`;"]
    );
    assert_eq!(session.backend().unwrap().url(), "mysql://root@localhost/shop");
}

#[tokio::test]
async fn test_backend_dialect_drives_generation() {
    let backend = MockBackend {
        url: "sqlite://app.db".to_string(),
        dialect: Dialect::Sqlite,
        ..MockBackend::default()
    };
    let mut session = Session::with_backend(backend).with_dialect(Dialect::MySql);
    assert_eq!(session.dialect(), Dialect::Sqlite);

    let stmt = session.parse("createTable('t').column('id','int','autoincrement','primarykey')").unwrap();
    assert!(session.analyze(&stmt));
    assert_eq!(
        session.compile(&stmt).unwrap(),
        "CREATE TABLE `t` (`id` INTEGER PRIMARY KEY AUTOINCREMENT);"
    );
}
