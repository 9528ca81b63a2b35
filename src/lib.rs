//! Core of a SQL query engine library
//!
//! This crate provides the pieces a SQL front-end plugs into: a logical
//! plan tree of polymorphic nodes and expressions with resolution
//! state, a rule-based analyzer that rewrites plans to a fixpoint, and
//! a pull-based row iterator pipeline including a parallel projection
//! operator. Parsing SQL text and durable storage live outside; callers
//! hand the analyzer an unresolved plan built against a catalog and
//! pull rows from the analyzed plan's iterator.

pub mod analyzer;
pub mod catalog;
pub mod config;
pub mod error;
pub mod execution;
pub mod expression;
pub mod memory;
pub mod plan;
pub mod types;

pub use analyzer::{Analyzer, Rule, ValidationRule, MAX_ANALYSIS_ITERATIONS};
pub use catalog::{Catalog, CatalogRef, Database, DatabaseRef, FunctionFactory, Table, TableRef};
pub use config::{Config, ConfigValue};
pub use error::{Error, Result};
pub use execution::{collect_rows, RowIter, RowsIter};
pub use expression::{AggBuffer, AggregateFunc, ArithmeticOp, CompareOp, Expression, ScalarFunc};
pub use memory::{MemoryDatabase, MemoryTable};
pub use plan::{
    DatabaseSource, Direction, Node, NullOrdering, Scope, SetUpdate, SortField,
};
pub use types::{BaseSession, Column, Context, DataType, Row, Schema, Session, Value};
