//! In-memory database and table backend
//!
//! The smallest possible row source: rows live in memory behind a
//! read-write lock and scans iterate a snapshot. Used by tests and by
//! callers embedding the engine without a storage layer.

use crate::catalog::{Database, Table};
use crate::error::{Error, Result};
use crate::execution::{RowIter, RowsIter};
use crate::types::{Context, Row, Schema};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A table holding its rows in memory.
pub struct MemoryTable {
    name: String,
    schema: Schema,
    rows: RwLock<Vec<Row>>,
}

impl MemoryTable {
    pub fn new(name: &str, schema: Schema) -> Self {
        MemoryTable {
            name: name.to_string(),
            schema,
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Append a row. The row arity must match the schema.
    pub fn insert(&self, row: Row) -> Result<()> {
        if row.len() != self.schema.len() {
            return Err(Error::InvalidValue(format!(
                "row has {} values, table {} has {} columns",
                row.len(),
                self.name,
                self.schema.len()
            )));
        }
        self.rows.write().push(row);
        Ok(())
    }
}

impl Table for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn scan(&self, _ctx: &Context) -> Result<Box<dyn RowIter>> {
        Ok(Box::new(RowsIter::new(self.rows.read().clone())))
    }
}

/// A database keeping its tables in memory.
pub struct MemoryDatabase {
    name: String,
    tables: RwLock<HashMap<String, Arc<dyn Table>>>,
}

impl MemoryDatabase {
    pub fn new(name: &str) -> Self {
        MemoryDatabase {
            name: name.to_string(),
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_table(&self, table: Arc<dyn Table>) {
        self.tables
            .write()
            .insert(table.name().to_string(), table);
    }
}

impl Database for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn tables(&self) -> HashMap<String, Arc<dyn Table>> {
        self.tables.read().clone()
    }
}
