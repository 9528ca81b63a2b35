//! Error types for the query engine core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error("unresolved reference: {}{name}", .table.as_deref().map(|t| format!("{t}.")).unwrap_or_default())]
    UnresolvedReference { name: String, table: Option<String> },

    #[error("ambiguous column reference: {0}")]
    AmbiguousColumn(String),

    #[error("invalid number of children for {node}: got {got}, want {want}")]
    InvalidChildrenNumber {
        node: String,
        got: usize,
        want: usize,
    },

    #[error("invalid number of arguments for {function}: got {got}, want {want}")]
    InvalidArgumentNumber {
        function: String,
        got: usize,
        want: usize,
    },

    #[error("config: value of key {key:?} is of type {stored} instead of {wanted}")]
    InvalidType {
        stored: String,
        wanted: String,
        key: String,
    },

    #[error("exceeded max analysis iterations ({0})")]
    ExceededMaxAnalysisIterations(usize),

    #[error("unable to access global config, session config parent is empty")]
    UnableToAccessGlobalConfig,

    #[error("no updatable table was found")]
    NotUpdatable,

    #[error("row evaluation failed: {0}")]
    RowEvaluation(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("query cancelled")]
    Cancelled,

    #[error("{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<Error>),
}

impl Error {
    /// Flatten a list of errors into a single error.
    pub fn join(mut errors: Vec<Error>) -> Error {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Error::Multiple(errors)
        }
    }
}
