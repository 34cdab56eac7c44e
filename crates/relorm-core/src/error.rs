//! Error types for relorm operations.

use std::fmt;

/// The primary error type for all relorm operations.
#[derive(Debug)]
pub enum Error {
    /// Statement execution errors, optionally wrapped with operation context
    Query(QueryError),
    /// Value conversion and payload mapping errors
    Type(TypeError),
    /// Transaction errors (begin/commit/rollback failures)
    Transaction(TransactionError),
    /// Schema push / migration errors
    Schema(SchemaError),
    /// Configuration errors (unknown dialect, bad settings)
    Config(ConfigError),
    /// Caller-contract violations detected before any SQL is issued
    Validation(ValidationError),
    /// Relation loading errors, tagged with the relation name
    Relation(RelationError),
    /// I/O errors
    Io(std::io::Error),
    /// The `Cx` was cancelled mid-operation
    Cancelled,
    /// Free-form failure from a driver or caller
    Custom(String),
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Malformed statement, or a statement shape the builder cannot handle
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
    pub rust_type: Option<&'static str>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// BEGIN failed
    Begin,
    /// COMMIT failed
    Commit,
    /// ROLLBACK failed after an earlier failure
    RollbackFailed,
}

#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Invalid schema definition
    Invalid,
    /// Introspection result could not be read
    Introspection,
    /// Migration error
    Migration,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// A caller-contract violation, reported before any statement runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Operation that rejected the input (e.g. "update users")
    pub operation: String,
    pub message: String,
}

#[derive(Debug)]
pub struct RelationError {
    /// Name of the relation being loaded
    pub relation: String,
    pub source: Box<Error>,
}

impl Error {
    /// Wrap a statement error with the operation and target that issued it.
    ///
    /// The inner error is kept as the source so callers can still reach the
    /// driver's message.
    #[must_use]
    pub fn context(self, verb: &str, target: &str) -> Self {
        match self {
            Error::Cancelled => Error::Cancelled,
            Error::Validation(v) => Error::Validation(v),
            other => {
                let sql = other.sql().map(str::to_string);
                Error::Query(QueryError {
                    kind: QueryErrorKind::Database,
                    sql,
                    message: format!("{} {}: {}", verb, target, other),
                    source: Some(Box::new(other)),
                })
            }
        }
    }

    /// Tag an error with the relation that was being loaded.
    #[must_use]
    pub fn in_relation(self, relation: &str) -> Self {
        Error::Relation(RelationError {
            relation: relation.to_string(),
            source: Box::new(self),
        })
    }

    /// Shorthand for a validation failure.
    pub fn validation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation(ValidationError {
            operation: operation.into(),
            message: message.into(),
        })
    }

    /// Shorthand for a configuration failure.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }

    /// Shorthand for a statement failure carrying its SQL.
    pub fn query(kind: QueryErrorKind, sql: Option<&str>, message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind,
            sql: sql.map(str::to_string),
            message: message.into(),
            source: None,
        })
    }

    /// A rollback that failed while unwinding `original`.
    ///
    /// Both messages are kept; `original` stays reachable as the source.
    pub fn rollback_failed(original: Error, rollback: &Error) -> Self {
        Error::Transaction(TransactionError {
            kind: TransactionErrorKind::RollbackFailed,
            message: format!("rollback failed ({}) after: {}", rollback, original),
            source: Some(Box::new(original)),
        })
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            Error::Relation(r) => r.source.sql(),
            _ => None,
        }
    }

    /// Name of the relation this error was raised for, if any.
    ///
    /// Looks through operation context added by [`Error::context`].
    pub fn relation(&self) -> Option<&str> {
        match self {
            Error::Relation(r) => Some(&r.relation),
            Error::Query(q) => q
                .source
                .as_deref()
                .and_then(|s| s.downcast_ref::<Error>())
                .and_then(Error::relation),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Schema(e) => write!(f, "Schema error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Relation(e) => write!(f, "load relation {}: {}", e.relation, e.source),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Transaction(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Schema(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Relation(e) => Some(e.source.as_ref()),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Custom(format!("serialization error: {}", err))
    }
}

/// Result type alias for relorm operations.
pub type Result<T> = std::result::Result<T, Error>;
