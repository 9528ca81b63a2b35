//! Catalog of databases, tables and registered functions

use crate::error::{Error, Result};
use crate::execution::RowIter;
use crate::expression::{AggregateFunc, Expression, ScalarFunc};
use crate::types::{Context, Schema};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A source of rows with a fixed schema.
pub trait Table: Send + Sync {
    fn name(&self) -> &str;
    fn schema(&self) -> &Schema;
    fn scan(&self, ctx: &Context) -> Result<Box<dyn RowIter>>;
}

/// A named collection of tables.
pub trait Database: Send + Sync {
    fn name(&self) -> &str;
    fn tables(&self) -> HashMap<String, Arc<dyn Table>>;
}

impl fmt::Debug for dyn Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Database({})", self.name())
    }
}

/// A shared table handle. Compares structurally by name and schema so
/// plan trees holding tables support the analyzer's fixpoint test.
#[derive(Clone)]
pub struct TableRef(pub Arc<dyn Table>);

impl PartialEq for TableRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.name() == other.0.name() && self.0.schema() == other.0.schema()
    }
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table({})", self.0.name())
    }
}

/// A shared database handle comparing by name.
#[derive(Clone)]
pub struct DatabaseRef(pub Arc<dyn Database>);

impl PartialEq for DatabaseRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.name() == other.0.name()
    }
}

impl fmt::Debug for DatabaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Database({})", self.0.name())
    }
}

/// A shared catalog handle comparing by identity.
#[derive(Clone)]
pub struct CatalogRef(pub Arc<Catalog>);

impl PartialEq for CatalogRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CatalogRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Catalog")
    }
}

/// A function factory consumes the call's argument expressions and
/// yields the expression implementing the call.
pub type FunctionFactory = fn(Vec<Expression>) -> Result<Expression>;

/// The registry of databases and functions available to the analyzer.
#[derive(Default)]
pub struct Catalog {
    databases: RwLock<Vec<Arc<dyn Database>>>,
    functions: RwLock<HashMap<String, FunctionFactory>>,
}

impl Catalog {
    /// Creates an empty catalog with the builtin functions registered.
    pub fn new() -> Self {
        let catalog = Catalog::default();
        catalog.register_defaults();
        catalog
    }

    pub fn add_database(&self, db: Arc<dyn Database>) {
        self.databases.write().push(db);
    }

    pub fn databases(&self) -> Vec<Arc<dyn Database>> {
        self.databases.read().clone()
    }

    pub fn database(&self, name: &str) -> Result<Arc<dyn Database>> {
        self.databases
            .read()
            .iter()
            .find(|db| db.name() == name)
            .cloned()
            .ok_or_else(|| Error::DatabaseNotFound(name.to_string()))
    }

    pub fn table(&self, database: &str, name: &str) -> Result<Arc<dyn Table>> {
        self.database(database)?
            .tables()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Register a function under a case-insensitive name.
    pub fn register_function(&self, name: &str, factory: FunctionFactory) {
        self.functions
            .write()
            .insert(name.to_lowercase(), factory);
    }

    /// Look up a registered function factory.
    pub fn function(&self, name: &str) -> Result<FunctionFactory> {
        self.functions
            .read()
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))
    }

    fn register_defaults(&self) {
        self.register_function("count", |args| {
            Ok(Expression::Aggregate {
                func: AggregateFunc::Count,
                arg: Box::new(one_arg("count", args)?),
            })
        });
        self.register_function("sum", |args| {
            Ok(Expression::Aggregate {
                func: AggregateFunc::Sum,
                arg: Box::new(one_arg("sum", args)?),
            })
        });
        self.register_function("avg", |args| {
            Ok(Expression::Aggregate {
                func: AggregateFunc::Avg,
                arg: Box::new(one_arg("avg", args)?),
            })
        });
        self.register_function("min", |args| {
            Ok(Expression::Aggregate {
                func: AggregateFunc::Min,
                arg: Box::new(one_arg("min", args)?),
            })
        });
        self.register_function("max", |args| {
            Ok(Expression::Aggregate {
                func: AggregateFunc::Max,
                arg: Box::new(one_arg("max", args)?),
            })
        });
        self.register_function("first", |args| {
            Ok(Expression::Aggregate {
                func: AggregateFunc::First,
                arg: Box::new(one_arg("first", args)?),
            })
        });

        self.register_function("lower", |args| {
            Ok(Expression::Scalar {
                func: ScalarFunc::Lower,
                args: vec![one_arg("lower", args)?],
            })
        });
        self.register_function("upper", |args| {
            Ok(Expression::Scalar {
                func: ScalarFunc::Upper,
                args: vec![one_arg("upper", args)?],
            })
        });
        self.register_function("length", |args| {
            Ok(Expression::Scalar {
                func: ScalarFunc::Length,
                args: vec![one_arg("length", args)?],
            })
        });
        self.register_function("concat", |args| {
            if args.is_empty() {
                return Err(Error::InvalidArgumentNumber {
                    function: "concat".to_string(),
                    got: 0,
                    want: 1,
                });
            }
            Ok(Expression::Scalar {
                func: ScalarFunc::Concat,
                args,
            })
        });
    }
}

fn one_arg(function: &str, mut args: Vec<Expression>) -> Result<Expression> {
    if args.len() != 1 {
        return Err(Error::InvalidArgumentNumber {
            function: function.to_string(),
            got: args.len(),
            want: 1,
        });
    }
    Ok(args.remove(0))
}
