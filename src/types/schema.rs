//! Plan node schemas

use super::data_type::DataType;
use serde::{Deserialize, Serialize};

/// A single output column of a plan node. `source` names the table the
/// column originates from, empty for computed columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub source: String,
}

impl Column {
    pub fn new(name: &str, data_type: DataType, nullable: bool) -> Self {
        Column {
            name: name.to_string(),
            data_type,
            nullable,
            source: String::new(),
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }
}

/// The ordered column list a plan node produces.
pub type Schema = Vec<Column>;

/// Find the index of the column matching the given table qualifier and
/// name. A missing qualifier matches any source.
pub fn column_index(schema: &Schema, table: Option<&str>, name: &str) -> Option<usize> {
    schema.iter().position(|c| {
        c.name == name && table.map(|t| c.source == t).unwrap_or(true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        vec![
            Column::new("a", DataType::I64, false).with_source("t1"),
            Column::new("b", DataType::Text, true).with_source("t1"),
            Column::new("a", DataType::F64, false).with_source("t2"),
        ]
    }

    #[test]
    fn test_column_index_unqualified() {
        assert_eq!(column_index(&schema(), None, "b"), Some(1));
        assert_eq!(column_index(&schema(), None, "a"), Some(0));
        assert_eq!(column_index(&schema(), None, "missing"), None);
    }

    #[test]
    fn test_column_index_qualified() {
        assert_eq!(column_index(&schema(), Some("t2"), "a"), Some(2));
        assert_eq!(column_index(&schema(), Some("t2"), "b"), None);
    }
}
