//! Core type and row model: values, column types, schemas, and the
//! per-query execution context.

pub mod context;
pub mod data_type;
pub mod schema;
pub mod value;

pub use context::{BaseSession, Context, Session};
pub use data_type::DataType;
pub use schema::{column_index, Column, Schema};
pub use value::{Row, Value};
