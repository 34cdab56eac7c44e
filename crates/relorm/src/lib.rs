//! relorm - relational record mapping with a fluent query builder.
//!
//! relorm maps plain structs to table rows and provides:
//!
//! - A `#[derive(Model)]` mapping table per record type
//! - A stateful, dialect-aware `QueryBuilder` with RETURNING emulation
//! - `BaseModel` find/create/update/delete over `Params`
//! - Batched relation loading (one query per relation, never N+1)
//! - Schema push and migration scripts for Postgres, MySQL and SQLite
//!
//! # Quick Start
//!
//! ```ignore
//! use relorm::prelude::*;
//!
//! #[derive(Model, Debug, Clone, Default)]
//! struct User {
//!     #[relorm(column = "id", constraints = "primary key,auto_increment")]
//!     id: i64,
//!     #[relorm(column = "email", constraints = "unique,not null")]
//!     email: String,
//!     #[relorm(has_many(foreign_key = "user_id"))]
//!     posts: Vec<Post>,
//! }
//!
//! async fn example(cx: &Cx, conn: &impl Connection) {
//!     let users = BaseModel::<User>::new(DialectKind::Postgres);
//!
//!     // Insert; the generated key is written back
//!     let created = users
//!         .create(cx, Executor::Pool(conn), Params::new().data(User {
//!             email: "ann@example.com".into(),
//!             ..Default::default()
//!         }))
//!         .await;
//!
//!     // Query with relations, inside one transaction
//!     let Outcome::Ok(tx) = conn.begin(cx).await else { return };
//!     let found = users
//!         .find_many(cx, Executor::Transaction(&tx), Params::new().filter(eq("id", 1)).include("posts"))
//!         .await;
//!     let _ = tx.commit(cx).await;
//! }
//! ```

// Re-export all public types from sub-crates
pub use relorm_core::{
    // asupersync re-exports
    Cx,
    Outcome,
    // Core types
    Column,
    ColumnInfo,
    Connection,
    Dialect,
    DialectKind,
    EngineConfig,
    Error,
    Executor,
    FieldInfo,
    ForeignKey,
    Index,
    Loaded,
    Migration,
    Model,
    Mysql,
    Postgres,
    Relation,
    RelationKind,
    Relations,
    Result,
    Row,
    Sqlite,
    Table,
    TransactionOps,
    Value,
    dialect_for,
    dialect_from_name,
};

pub use relorm_macros::Model;

pub use relorm_query::{
    BaseModel, ClauseKind, Condition, Include, Logic, Operator, Params, QueryBuilder, and, eq,
    gt, gte, in_list, like, lt, lte, not_eq, or, raw_execute, raw_query,
};

/// Schema push, introspection and migration scripts.
pub use relorm_schema as schema;

// Session management
pub mod session;
pub use session::{Session, SessionBuilder};

/// Everything a typical caller needs, in one import.
pub mod prelude {
    pub use crate::{
        BaseModel, Condition, Connection, Cx, Dialect, DialectKind, EngineConfig, Error,
        Executor, Include, Model, Outcome, Params, QueryBuilder, Session, TransactionOps, Value,
        and, eq, gt, gte, in_list, like, lt, lte, not_eq, or,
    };
}
