//! Error types for sqlpipe.

use thiserror::Error;

/// The main error type for sqlpipe operations.
#[derive(Debug, Error)]
pub enum SqlPipeError {
    /// A column referenced by a query model is not part of the table schema.
    #[error("Unknown {clause}column \"{column}\"{}", did_you_mean(.suggestion))]
    UnknownColumn {
        clause: &'static str,
        column: String,
        suggestion: Option<String>,
    },

    /// The schema resolver does not know the table.
    #[error("Unknown table \"{0}\"")]
    UnknownTable(String),

    /// Wrong arity, missing expression text, unsupported mode or operator.
    #[error("{0}")]
    Shape(String),

    /// A value could not be coerced to the type its column or parameter requires.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Placeholder count in the resolved SQL differs from the bind value count.
    #[error("SQL parameter mismatch\nExpected ?: {expected}\nProvided: {provided}\nSQL: {sql}")]
    BindingMismatch {
        expected: usize,
        provided: usize,
        sql: String,
    },

    /// The backing store rejected a statement.
    #[error("SQL Execution Error\n{message}\n---\nSQL: {sql}\nBindings: {bindings}")]
    Execution {
        message: String,
        sql: String,
        bindings: String,
    },

    /// A `${...}` reference could not be turned into a parameter value.
    #[error("Interpolation error: {0}")]
    Interpolation(String),

    /// A post-result transform failed.
    #[error("Transform error: {0}")]
    Transform(String),

    /// The sanitizer refused to run a statement.
    #[error("Statement rejected: {0}")]
    Rejected(String),

    /// Begin, commit or rollback failed.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(". Did you mean \"{}\"?", s),
        None => String::new(),
    }
}

impl SqlPipeError {
    /// Create a shape error.
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }

    /// Create an unknown column error without suggestion.
    pub fn unknown_column(clause: &'static str, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            clause,
            column: column.into(),
            suggestion: None,
        }
    }
}

impl From<serde_json::Error> for SqlPipeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Shape(format!("Malformed query model: {}", e))
    }
}

/// Result type alias for sqlpipe operations.
pub type SqlPipeResult<T> = Result<T, SqlPipeError>;
