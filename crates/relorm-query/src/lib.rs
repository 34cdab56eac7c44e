//! Query construction and execution for relorm.
//!
//! `relorm-query` is the **statement layer**. It turns record metadata from
//! `relorm-core` into SQL plus arguments and runs it through an `Executor`.
//!
//! # Role In The Architecture
//!
//! - **Conditions**: `Condition` and `Params` describe filters, selection,
//!   paging and includes for the facade.
//! - **Builder**: `QueryBuilder` assembles arbitrary statements fluently,
//!   qualifying bare columns and emulating RETURNING where needed.
//! - **Loader**: `load_relations` fetches each included relation with one
//!   batched query.
//! - **Facade**: `BaseModel` offers find/create/update/delete per record type.
//!
//! Most users access these through the `relorm` facade crate.

pub mod base;
pub mod builder;
pub mod condition;
pub mod loader;
pub mod qualify;
pub mod returning;

#[cfg(test)]
mod fixtures;

pub use base::BaseModel;
pub use builder::{ClauseKind, NO_ARGS, QueryBuilder};
pub use condition::{
    Condition, ConditionValue, Include, Logic, Operator, Params, and, eq, gt, gte, in_list, like,
    lt, lte, not_eq, or, render_conditions,
};
pub use loader::{load_relations, relation_query};
pub use returning::{ReturningPlan, StatementKind, extract_where_clause};

use asupersync::{Cx, Outcome};
use relorm_core::{Connection, Error, Executor, Row, Value};

/// Raw SQL query execution.
///
/// For statements the builder cannot express. Arguments are bound as given.
pub async fn raw_query<C: Connection>(
    cx: &Cx,
    exec: Executor<'_, '_, C>,
    sql: &str,
    params: &[Value],
) -> Outcome<Vec<Row>, Error> {
    if let Some(reason) = cx.cancel_reason() {
        return Outcome::Cancelled(reason);
    }
    tracing::debug!(sql = %sql, args = ?params, "executing raw query");
    exec.query(cx, sql, params).await
}

/// Raw SQL statement execution. Returns rows affected.
pub async fn raw_execute<C: Connection>(
    cx: &Cx,
    exec: Executor<'_, '_, C>,
    sql: &str,
    params: &[Value],
) -> Outcome<u64, Error> {
    if let Some(reason) = cx.cancel_reason() {
        return Outcome::Cancelled(reason);
    }
    tracing::debug!(sql = %sql, args = ?params, "executing raw statement");
    exec.execute(cx, sql, params).await
}
