//! In-memory scripted connection for tests.
//!
//! [`MockConnection`] records every statement it sees and answers from FIFO
//! queues filled by the test. Statements whose SQL contains a registered
//! pattern fail instead.

#![allow(clippy::manual_async_fn)]

use crate::connection::{Connection, TransactionOps};
use crate::error::{Error, QueryErrorKind};
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Query,
    Execute,
    Insert,
    Begin,
    Commit,
    Rollback,
    Savepoint,
    RollbackTo,
    Release,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
    pub params: Vec<Value>,
    pub in_transaction: bool,
}

#[derive(Debug, Default)]
struct MockState {
    log: Vec<Statement>,
    rows: VecDeque<Vec<Row>>,
    affected: VecDeque<u64>,
    insert_ids: VecDeque<i64>,
    failures: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug)]
pub struct MockTransaction {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Log a call and return the configured failure for it, if any.
fn record(
    state: &Mutex<MockState>,
    kind: StatementKind,
    sql: &str,
    params: &[Value],
    in_transaction: bool,
) -> Option<Error> {
    let mut guard = lock(state);
    guard.log.push(Statement {
        kind,
        sql: sql.to_string(),
        params: params.to_vec(),
        in_transaction,
    });
    guard
        .failures
        .iter()
        .find(|(pattern, _)| sql.contains(pattern.as_str()))
        .map(|(_, message)| Error::query(QueryErrorKind::Database, Some(sql), message.clone()))
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next query.
    pub fn push_rows(&self, rows: Vec<Row>) -> &Self {
        lock(&self.state).rows.push_back(rows);
        self
    }

    /// Queue the affected-row count of the next execute.
    pub fn push_affected(&self, affected: u64) -> &Self {
        lock(&self.state).affected.push_back(affected);
        self
    }

    /// Queue the id returned by the next insert.
    pub fn push_insert_id(&self, id: i64) -> &Self {
        lock(&self.state).insert_ids.push_back(id);
        self
    }

    /// Fail every statement whose SQL contains `pattern`.
    pub fn fail_when(&self, pattern: &str, message: &str) -> &Self {
        lock(&self.state)
            .failures
            .push((pattern.to_string(), message.to_string()));
        self
    }

    /// Every call seen so far, in order.
    pub fn statements(&self) -> Vec<Statement> {
        lock(&self.state).log.clone()
    }

    /// SQL text of every call seen so far.
    pub fn sql_log(&self) -> Vec<String> {
        lock(&self.state).log.iter().map(|s| s.sql.clone()).collect()
    }

    /// Forget recorded calls, keeping queued results.
    pub fn clear_log(&self) {
        lock(&self.state).log.clear();
    }
}

fn run_query(
    state: &Mutex<MockState>,
    sql: &str,
    params: &[Value],
    in_tx: bool,
) -> Outcome<Vec<Row>, Error> {
    if let Some(err) = record(state, StatementKind::Query, sql, params, in_tx) {
        return Outcome::Err(err);
    }
    Outcome::Ok(lock(state).rows.pop_front().unwrap_or_default())
}

fn run_execute(
    state: &Mutex<MockState>,
    sql: &str,
    params: &[Value],
    in_tx: bool,
) -> Outcome<u64, Error> {
    if let Some(err) = record(state, StatementKind::Execute, sql, params, in_tx) {
        return Outcome::Err(err);
    }
    Outcome::Ok(lock(state).affected.pop_front().unwrap_or(0))
}

fn run_insert(
    state: &Mutex<MockState>,
    sql: &str,
    params: &[Value],
    in_tx: bool,
) -> Outcome<i64, Error> {
    if let Some(err) = record(state, StatementKind::Insert, sql, params, in_tx) {
        return Outcome::Err(err);
    }
    Outcome::Ok(lock(state).insert_ids.pop_front().unwrap_or(0))
}

fn run_control(state: &Mutex<MockState>, kind: StatementKind, sql: &str) -> Outcome<(), Error> {
    match record(state, kind, sql, &[], kind != StatementKind::Begin) {
        Some(err) => Outcome::Err(err),
        None => Outcome::Ok(()),
    }
}

impl Connection for MockConnection {
    type Tx<'conn>
        = MockTransaction
    where
        Self: 'conn;

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = run_query(&self.state, sql, params, false);
        async move { result }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = run_execute(&self.state, sql, params, false);
        async move { result }
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let result = run_insert(&self.state, sql, params, false);
        async move { result }
    }

    fn begin(&self, _cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            match run_control(&state, StatementKind::Begin, "BEGIN") {
                Outcome::Ok(()) => Outcome::Ok(MockTransaction { state }),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }
}

impl TransactionOps for MockTransaction {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = run_query(&self.state, sql, params, true);
        async move { result }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = run_execute(&self.state, sql, params, true);
        async move { result }
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let result = run_insert(&self.state, sql, params, true);
        async move { result }
    }

    fn savepoint(&self, _cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = run_control(
            &self.state,
            StatementKind::Savepoint,
            &format!("SAVEPOINT {}", name),
        );
        async move { result }
    }

    fn rollback_to(
        &self,
        _cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = run_control(
            &self.state,
            StatementKind::RollbackTo,
            &format!("ROLLBACK TO SAVEPOINT {}", name),
        );
        async move { result }
    }

    fn release(&self, _cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = run_control(
            &self.state,
            StatementKind::Release,
            &format!("RELEASE SAVEPOINT {}", name),
        );
        async move { result }
    }

    fn commit(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move { run_control(&self.state, StatementKind::Commit, "COMMIT") }
    }

    fn rollback(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move { run_control(&self.state, StatementKind::Rollback, "ROLLBACK") }
    }
}

/// Unwrap an outcome in test code, panicking with the failure.
#[allow(clippy::panic)]
pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

/// Unwrap the error of an outcome in test code.
#[allow(clippy::panic)]
pub fn expect_err<T>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        Outcome::Ok(_) => panic!("expected an error, got Ok"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}
