//! Database connection traits.
//!
//! This module defines the abstractions every statement goes through:
//!
//! - [`Connection`] - a pool or standalone handle that can run statements and
//!   open transactions
//! - [`TransactionOps`] - an open transaction with savepoint support
//! - [`Executor`] - "pool or transaction", so one code path serves both
//!
//! All operations integrate with asupersync's structured concurrency via `Cx`
//! context for proper cancellation and timeout handling.

use crate::error::Error;
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};

/// A database handle capable of executing statements.
///
/// Implementations must be `Send + Sync` for use across async boundaries.
///
/// # Example
///
/// ```rust,ignore
/// let rows = conn.query(&cx, "SELECT * FROM users WHERE id = $1", &[Value::BigInt(1)]).await?;
///
/// let tx = conn.begin(&cx).await?;
/// tx.execute(&cx, "INSERT INTO logs (msg) VALUES ($1)", &[Value::Text("action".into())]).await?;
/// tx.commit(&cx).await?;
/// ```
pub trait Connection: Send + Sync {
    /// The transaction type returned by this connection.
    type Tx<'conn>: TransactionOps
    where
        Self: 'conn;

    /// Execute a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Execute a statement (INSERT, UPDATE, DELETE, DDL) and return rows affected.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Execute an INSERT and return the driver's last inserted id.
    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send;

    /// Begin a transaction.
    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send;
}

/// Operations on an open transaction.
///
/// Transactions must be explicitly committed or rolled back.
pub trait TransactionOps: Send + Sync {
    /// Execute a query within this transaction.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Execute a statement within this transaction.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Execute an INSERT within this transaction and return the last inserted id.
    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send;

    /// Create a savepoint within this transaction.
    fn savepoint(&self, cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Roll back to a previously created savepoint. The transaction stays open.
    fn rollback_to(&self, cx: &Cx, name: &str)
    -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Release a savepoint.
    fn release(&self, cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Commit the transaction, making all changes permanent.
    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Roll back the transaction, discarding all changes.
    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;
}

/// Where a statement runs: directly on a connection, or inside a caller's
/// open transaction.
///
/// Both lifetimes are needed because `C::Tx<'c>` is invariant in `'c`.
pub enum Executor<'e, 'c, C: Connection + 'c> {
    Pool(&'e C),
    Transaction(&'e C::Tx<'c>),
}

impl<'e, 'c, C: Connection + 'c> Clone for Executor<'e, 'c, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'e, 'c, C: Connection + 'c> Copy for Executor<'e, 'c, C> {}

impl<'e, 'c, C: Connection + 'c> std::fmt::Debug for Executor<'e, 'c, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Executor::Pool(_) => f.write_str("Executor::Pool"),
            Executor::Transaction(_) => f.write_str("Executor::Transaction"),
        }
    }
}

impl<'e, 'c, C: Connection + 'c> Executor<'e, 'c, C> {
    /// Whether statements run inside a caller-owned transaction.
    pub const fn in_transaction(&self) -> bool {
        matches!(self, Executor::Transaction(_))
    }

    pub async fn query(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<Vec<Row>, Error> {
        match self {
            Executor::Pool(conn) => conn.query(cx, sql, params).await,
            Executor::Transaction(tx) => tx.query(cx, sql, params).await,
        }
    }

    pub async fn execute(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<u64, Error> {
        match self {
            Executor::Pool(conn) => conn.execute(cx, sql, params).await,
            Executor::Transaction(tx) => tx.execute(cx, sql, params).await,
        }
    }

    pub async fn insert(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<i64, Error> {
        match self {
            Executor::Pool(conn) => conn.insert(cx, sql, params).await,
            Executor::Transaction(tx) => tx.insert(cx, sql, params).await,
        }
    }
}

impl<'e, 'c, C: Connection + 'c> From<&'e C> for Executor<'e, 'c, C> {
    fn from(conn: &'e C) -> Self {
        Executor::Pool(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnection;
    use asupersync::runtime::RuntimeBuilder;

    #[test]
    fn executor_dispatches_to_pool_and_transaction() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let conn = MockConnection::new();

        rt.block_on(async {
            let exec = Executor::Pool(&conn);
            assert!(!exec.in_transaction());
            match exec.execute(&cx, "DELETE FROM users", &[]).await {
                Outcome::Ok(_) => {}
                other => panic!("unexpected outcome: {other:?}"),
            }

            let tx = match conn.begin(&cx).await {
                Outcome::Ok(tx) => tx,
                other => panic!("begin failed: {other:?}"),
            };
            let exec = Executor::<MockConnection>::Transaction(&tx);
            assert!(exec.in_transaction());
            match exec.query(&cx, "SELECT 1", &[]).await {
                Outcome::Ok(rows) => assert!(rows.is_empty()),
                other => panic!("unexpected outcome: {other:?}"),
            }
        });

        let log = conn.statements();
        assert_eq!(log[0].sql, "DELETE FROM users");
        assert!(!log[0].in_transaction);
        assert_eq!(log.last().map(|s| s.sql.as_str()), Some("SELECT 1"));
        assert!(log.last().is_some_and(|s| s.in_transaction));
    }
}
