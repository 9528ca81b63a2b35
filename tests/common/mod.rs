//! Common test fixtures for the integration tests
#![allow(dead_code)]

use quarry_sql::{
    BaseSession, Catalog, Column, Config, Context, DataType, Expression, MemoryDatabase,
    MemoryTable, Value,
};
use std::sync::Arc;

/// The catalog every scenario starts from: one database `mydb` with a
/// table `test (col1 text, col2 text)` holding five rows.
pub fn catalog() -> Arc<Catalog> {
    let catalog = Arc::new(Catalog::new());
    catalog.add_database(database());
    catalog
}

pub fn database() -> Arc<MemoryDatabase> {
    let db = Arc::new(MemoryDatabase::new("mydb"));
    db.add_table(test_table());
    db
}

pub fn test_table() -> Arc<MemoryTable> {
    let table = Arc::new(MemoryTable::new(
        "test",
        vec![
            Column::new("col1", DataType::Text, true).with_source("test"),
            Column::new("col2", DataType::Text, true).with_source("test"),
        ],
    ));
    for i in 1..=5 {
        table
            .insert(vec![
                Value::Str(format!("col1_{i}")),
                Value::Str(format!("col2_{i}")),
            ])
            .unwrap();
    }
    table
}

/// A context whose session config inherits from the given global one.
pub fn session_context(global: &Arc<Config>) -> Context {
    let session = Arc::new(Config::from_parent(global.clone()));
    Context::new(Arc::new(BaseSession::new(session)))
}

/// A resolved reference to `test.col2`.
pub fn col2_field() -> Expression {
    Expression::GetField {
        index: 1,
        data_type: DataType::Text,
        name: "col2".into(),
        table: "test".into(),
        nullable: true,
    }
}

pub fn text_literal(s: &str) -> Expression {
    Expression::Literal(Value::Str(s.into()), DataType::Text)
}

pub fn int_literal(i: i64) -> Expression {
    Expression::Literal(Value::I64(i), DataType::I64)
}
