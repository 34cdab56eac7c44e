//! Core types and traits for relorm.
//!
//! This crate provides the foundations the query and schema crates build on:
//!
//! - `Value` and `Row` for statement arguments and results
//! - `Connection`, `TransactionOps` and `Executor` for running statements
//! - `Dialect` with the Postgres, MySQL and SQLite variants
//! - `Model` and `FieldInfo`, the per-record mapping table
//! - `encode`/`decode` for moving records in and out of rows
//! - `Relation` descriptors and the name-keyed `Relations` registry
//! - `Outcome` and `Cx` re-exported from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod config;
pub mod connection;
pub mod decode;
pub mod dialect;
pub mod encode;
pub mod error;
pub mod field;
pub mod model;
pub mod relationship;
pub mod row;
pub mod schema;
pub mod value;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::EngineConfig;
pub use connection::{Connection, Executor, TransactionOps};
pub use decode::Decode;
pub use dialect::{
    Dialect, DialectKind, Mysql, Postgres, Sqlite, dialect_for, dialect_from_name,
    supports_returning,
};
pub use encode::{EncodedColumn, ZeroValue};
pub use error::{
    ConfigError, Error, QueryError, QueryErrorKind, RelationError, Result, SchemaError,
    SchemaErrorKind, TransactionError, TransactionErrorKind, TypeError, ValidationError,
};
pub use field::{Constraints, FieldInfo};
pub use model::Model;
pub use relationship::{Loaded, Relation, RelationKind, RelationLink, Relations};
pub use row::{Row, RowColumns};
pub use schema::{Column, ColumnInfo, ForeignKey, Index, IndexOrder, Migration, Table};
pub use value::{Value, ValueKey};
