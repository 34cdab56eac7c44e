//! RETURNING emulation for dialects without native support.
//!
//! The statement runs without its RETURNING list and a derived SELECT
//! fetches the requested columns, both inside one transaction: a fresh one
//! on a pool executor, a savepoint inside the caller's transaction
//! otherwise. Any failure rolls back and reports the statement's error; a
//! failed rollback is reported on top of it.

use crate::qualify::{count_markers, has_numbered_markers};
use asupersync::{Cx, Outcome};
use relorm_core::error::QueryErrorKind;
use relorm_core::{Connection, Dialect, Error, Executor, Result, Row, TransactionOps, Value};

/// Savepoint used when the caller already holds a transaction.
pub const SAVEPOINT: &str = "relorm_returning";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    /// Classify a statement by its leading keyword.
    pub fn detect(sql: &str) -> Self {
        let head = sql
            .trim_start()
            .trim_start_matches('(')
            .split_whitespace()
            .next()
            .unwrap_or_default();
        if head.eq_ignore_ascii_case("SELECT") || head.eq_ignore_ascii_case("WITH") {
            StatementKind::Select
        } else if head.eq_ignore_ascii_case("INSERT") {
            StatementKind::Insert
        } else if head.eq_ignore_ascii_case("UPDATE") {
            StatementKind::Update
        } else if head.eq_ignore_ascii_case("DELETE") {
            StatementKind::Delete
        } else {
            StatementKind::Other
        }
    }
}

/// Byte offsets of every top-level ` WHERE ` keyword (outside quotes and
/// parentheses), case-insensitive.
fn top_level_where(sql: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut hits = Vec::new();
    let mut depth = 0_usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else {
            match c {
                b'\'' | b'"' | b'`' => quote = Some(c),
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                _ if depth == 0
                    && c.is_ascii_whitespace()
                    && bytes.len() >= i + 7
                    && bytes[i + 1..i + 6].eq_ignore_ascii_case(b"WHERE")
                    && bytes[i + 6].is_ascii_whitespace() =>
                {
                    hits.push(i);
                }
                _ => {}
            }
        }
        i += 1;
    }
    hits
}

/// Text after the single top-level ` WHERE `, trailing `;` trimmed.
///
/// `None` when there is no WHERE or more than one at the top level.
pub fn extract_where_clause(sql: &str) -> Option<&str> {
    match top_level_where(sql).as_slice() {
        [at] => {
            let rest = sql[at + 7..].trim();
            let rest = rest.trim_end_matches(';').trim_end();
            (!rest.is_empty()).then_some(rest)
        }
        _ => None,
    }
}

/// Derived SELECT that fetches `fields` for an emulated RETURNING.
///
/// INSERT selects the row by its generated id (placeholder 1); UPDATE and
/// DELETE re-apply the statement's WHERE text.
#[allow(clippy::result_large_err)]
pub fn fallback_select_sql(
    kind: StatementKind,
    sql: &str,
    table: &str,
    fields: &[String],
    dialect: &dyn Dialect,
) -> Result<String> {
    let columns = fields.join(", ");
    match kind {
        StatementKind::Insert => Ok(format!(
            "SELECT {} FROM {} WHERE id = {};",
            columns,
            table,
            dialect.placeholder(1)
        )),
        StatementKind::Update | StatementKind::Delete => match extract_where_clause(sql) {
            Some(filter) => Ok(format!("SELECT {} FROM {} WHERE {};", columns, table, filter)),
            None => Err(Error::query(
                QueryErrorKind::Syntax,
                Some(sql),
                "cannot emulate RETURNING without a WHERE clause",
            )),
        },
        StatementKind::Select | StatementKind::Other => Err(Error::query(
            QueryErrorKind::Syntax,
            Some(sql),
            "unsupported statement for RETURNING emulation",
        )),
    }
}

/// Arguments for the derived SELECT of an UPDATE or DELETE.
///
/// Numbered placeholders keep their positions, so every argument is passed.
/// With bare `?` markers only the trailing arguments that belong to the
/// WHERE text are.
fn where_args(filter: &str, params: &[Value]) -> Vec<Value> {
    if has_numbered_markers(filter) {
        return params.to_vec();
    }
    let n = count_markers(filter).min(params.len());
    params[params.len() - n..].to_vec()
}

/// One statement whose RETURNING list must be emulated.
#[derive(Debug, Clone, Copy)]
pub struct ReturningPlan<'a> {
    /// Statement text without RETURNING
    pub sql: &'a str,
    pub params: &'a [Value],
    pub fields: &'a [String],
    pub table: &'a str,
}

/// Run `plan` and its derived SELECT in one transaction.
pub async fn emulate<C: Connection>(
    cx: &Cx,
    exec: Executor<'_, '_, C>,
    dialect: &dyn Dialect,
    plan: ReturningPlan<'_>,
) -> Outcome<Vec<Row>, Error> {
    let kind = StatementKind::detect(plan.sql);
    // Shape errors are reported before anything runs
    let select_sql = match fallback_select_sql(kind, plan.sql, plan.table, plan.fields, dialect) {
        Ok(sql) => sql,
        Err(e) => return Outcome::Err(e),
    };
    if let Some(reason) = cx.cancel_reason() {
        return Outcome::Cancelled(reason);
    }
    tracing::debug!(sql = %select_sql, "emulating RETURNING");

    match exec {
        Executor::Pool(conn) => {
            let tx = match conn.begin(cx).await {
                Outcome::Ok(tx) => tx,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            let outcome = run_steps(cx, Executor::<C>::Transaction(&tx), kind, &plan, &select_sql).await;
            match outcome {
                Outcome::Ok(rows) => match tx.commit(cx).await {
                    Outcome::Ok(()) => Outcome::Ok(rows),
                    Outcome::Err(e) => Outcome::Err(e),
                    Outcome::Cancelled(r) => Outcome::Cancelled(r),
                    Outcome::Panicked(p) => Outcome::Panicked(p),
                },
                Outcome::Err(e) => match tx.rollback(cx).await {
                    Outcome::Ok(()) => Outcome::Err(e),
                    Outcome::Err(rollback) => Outcome::Err(Error::rollback_failed(e, &rollback)),
                    Outcome::Cancelled(r) => Outcome::Cancelled(r),
                    Outcome::Panicked(p) => Outcome::Panicked(p),
                },
                Outcome::Cancelled(r) => {
                    // Best effort; the transaction is abandoned either way
                    let _ = tx.rollback(cx).await;
                    Outcome::Cancelled(r)
                }
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
        Executor::Transaction(tx) => {
            match tx.savepoint(cx, SAVEPOINT).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
            match run_steps(cx, exec, kind, &plan, &select_sql).await {
                Outcome::Ok(rows) => match tx.release(cx, SAVEPOINT).await {
                    Outcome::Ok(()) => Outcome::Ok(rows),
                    Outcome::Err(e) => Outcome::Err(e),
                    Outcome::Cancelled(r) => Outcome::Cancelled(r),
                    Outcome::Panicked(p) => Outcome::Panicked(p),
                },
                Outcome::Err(e) => match tx.rollback_to(cx, SAVEPOINT).await {
                    Outcome::Ok(()) => Outcome::Err(e),
                    Outcome::Err(rollback) => Outcome::Err(Error::rollback_failed(e, &rollback)),
                    Outcome::Cancelled(r) => Outcome::Cancelled(r),
                    Outcome::Panicked(p) => Outcome::Panicked(p),
                },
                other => other,
            }
        }
    }
}

/// The statement and its derived SELECT. DELETE selects first, since the
/// rows are gone afterwards.
async fn run_steps<C: Connection>(
    cx: &Cx,
    exec: Executor<'_, '_, C>,
    kind: StatementKind,
    plan: &ReturningPlan<'_>,
    select_sql: &str,
) -> Outcome<Vec<Row>, Error> {
    match kind {
        StatementKind::Insert => {
            let id = match exec.insert(cx, plan.sql, plan.params).await {
                Outcome::Ok(id) => id,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }
            exec.query(cx, select_sql, &[Value::BigInt(id)]).await
        }
        StatementKind::Delete => {
            let args = where_args(extract_where_clause(plan.sql).unwrap_or_default(), plan.params);
            let rows = match exec.query(cx, select_sql, &args).await {
                Outcome::Ok(rows) => rows,
                other => return other,
            };
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }
            exec.execute(cx, plan.sql, plan.params)
                .await
                .and_then(|_| Outcome::Ok(rows))
        }
        _ => {
            if let Outcome::Err(e) = exec.execute(cx, plan.sql, plan.params).await {
                return Outcome::Err(e);
            }
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }
            let args = where_args(extract_where_clause(plan.sql).unwrap_or_default(), plan.params);
            exec.query(cx, select_sql, &args).await
        }
    }
}
