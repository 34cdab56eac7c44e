//! Stateful, fluent SQL builder.
//!
//! Each operation appends a fragment to the statement text and returns the
//! builder for chaining. The terminal operations render the statement, run it
//! through an [`Executor`] and reset the builder.

use crate::qualify::{is_expression, number_placeholders, qualify_condition, qualify_select_list, table_from_clause};
use crate::returning::{self, ReturningPlan, StatementKind};
use asupersync::{Cx, Outcome};
use relorm_core::error::QueryErrorKind;
use relorm_core::{Connection, Dialect, Error, Executor, Model, Row, Value};
use std::ops::Range;

/// No bound arguments, for `where_`/`and`/`or`/`not` calls without markers.
pub const NO_ARGS: [Value; 0] = [];

/// Kind of clause emitted so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    Select,
    SelectDistinct,
    From,
    Where,
    Insert,
    Update,
    Delete,
    Join,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Offset,
    Case,
    CaseEnd,
    Ddl,
}

/// Fluent SQL builder bound to one dialect.
///
/// The builder is single-user state: one statement is assembled at a time and
/// every terminal operation resets it, whether it succeeds or not. Share a
/// dialect between tasks, not a builder.
///
/// ```ignore
/// let mut qb = QueryBuilder::new(&Postgres);
/// let rows = qb
///     .select(&["id", "email"])
///     .from("users")
///     .where_("age > ?", [18])
///     .order_by(&["id"])
///     .execute(&cx, Executor::Pool(&conn))
///     .await;
/// ```
///
/// `where_`, `and`, `or` and `not` bind their arguments. The text helpers
/// (`like`, `in_list`, `between` and friends) inline values into the
/// statement text instead and must only see trusted input.
#[derive(Debug, Clone)]
pub struct QueryBuilder<'d> {
    dialect: &'d dyn Dialect,
    sql: String,
    params: Vec<Value>,
    current_table: Option<String>,
    clauses: Vec<ClauseKind>,
    returning: Vec<String>,
    /// Byte range of the SELECT list, rewritten once the table is known
    select_list: Option<Range<usize>>,
}

impl<'d> QueryBuilder<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
            current_table: None,
            clauses: Vec::new(),
            returning: Vec::new(),
            select_list: None,
        }
    }

    pub fn dialect(&self) -> &'d dyn Dialect {
        self.dialect
    }

    /// Table that bare column names are qualified with.
    pub fn current_table(&self) -> Option<&str> {
        self.current_table.as_deref()
    }

    pub fn clauses(&self) -> &[ClauseKind] {
        &self.clauses
    }

    // ==================== SELECT ====================

    /// `SELECT <fields>`, or `SELECT *` for an empty list.
    ///
    /// Bare names are qualified once `from` names the table.
    pub fn select(&mut self, fields: &[&str]) -> &mut Self {
        self.select_with("SELECT", ClauseKind::Select, fields)
    }

    pub fn select_distinct(&mut self, fields: &[&str]) -> &mut Self {
        self.select_with("SELECT DISTINCT", ClauseKind::SelectDistinct, fields)
    }

    fn select_with(&mut self, keyword: &str, kind: ClauseKind, fields: &[&str]) -> &mut Self {
        self.sql.push_str(keyword);
        self.clauses.push(kind);
        let list: Vec<&str> = fields.iter().map(|f| f.trim()).filter(|f| !f.is_empty()).collect();
        if list.is_empty() {
            self.sql.push_str(" *");
            return self;
        }
        self.sql.push(' ');
        let start = self.sql.len();
        self.sql.push_str(&list.join(", "));
        self.select_list = Some(start..self.sql.len());
        self
    }

    /// ` FROM <table>`; qualifies a pending SELECT list with the table name.
    ///
    /// An alias or schema prefix is accepted (`public.users u`); columns are
    /// qualified with the bare table name.
    pub fn from(&mut self, table: &str) -> &mut Self {
        let table = table.trim();
        if table.is_empty() {
            return self;
        }
        let name = table_from_clause(table);
        if let Some(range) = self.select_list.take() {
            let qualified = qualify_select_list(&self.sql[range.clone()], &name);
            self.sql.replace_range(range, &qualified);
        }
        self.current_table = Some(name);
        self.clauses.push(ClauseKind::From);
        self.sql.push_str(" FROM ");
        self.sql.push_str(table);
        self
    }

    // ==================== Predicates ====================

    /// ` WHERE <condition>` with bound arguments.
    ///
    /// Bare `?` markers are replaced with the dialect's placeholders,
    /// numbered after the arguments bound so far. Dialect placeholders
    /// written by the caller (`$1`) are kept as written.
    pub fn where_<I, V>(&mut self, condition: &str, args: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        if condition.trim().is_empty() {
            return self;
        }
        self.clauses.push(ClauseKind::Where);
        self.predicate("WHERE", condition, args)
    }

    pub fn and<I, V>(&mut self, condition: &str, args: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.predicate("AND", condition, args)
    }

    pub fn or<I, V>(&mut self, condition: &str, args: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.predicate("OR", condition, args)
    }

    /// ` AND NOT <condition>`, or ` WHERE NOT <condition>` when it is the
    /// first predicate.
    pub fn not<I, V>(&mut self, condition: &str, args: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        if condition.trim().is_empty() {
            return self;
        }
        if self.has_predicate() {
            self.predicate("AND NOT", condition, args)
        } else {
            self.clauses.push(ClauseKind::Where);
            self.predicate("WHERE NOT", condition, args)
        }
    }

    fn predicate<I, V>(&mut self, keyword: &str, condition: &str, args: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let condition = condition.trim();
        if condition.is_empty() {
            return self;
        }
        let condition = match &self.current_table {
            Some(table) => qualify_condition(condition, table),
            None => condition.to_string(),
        };
        let (condition, _) = number_placeholders(&condition, self.dialect, self.params.len() + 1);
        self.sql.push(' ');
        self.sql.push_str(keyword);
        self.sql.push(' ');
        self.sql.push_str(&condition);
        self.params.extend(args.into_iter().map(Into::into));
        self
    }

    fn has_predicate(&self) -> bool {
        self.clauses.contains(&ClauseKind::Where)
    }

    /// Emit a text-helper fragment after ` WHERE ` or ` AND `.
    fn inline_predicate(&mut self, fragment: &str) -> &mut Self {
        if self.has_predicate() {
            self.sql.push_str(" AND ");
        } else {
            self.clauses.push(ClauseKind::Where);
            self.sql.push_str(" WHERE ");
        }
        self.sql.push_str(fragment);
        self
    }

    fn column_ref(&self, column: &str) -> String {
        let column = column.trim();
        match &self.current_table {
            Some(table) if !is_expression(column) => format!("{}.{}", table, column),
            _ => column.to_string(),
        }
    }

    /// `<column> LIKE '<pattern>'`.
    ///
    /// The pattern is inlined as a quoted literal, not bound. Never pass
    /// untrusted input; use `where_` with a `?` marker instead.
    pub fn like(&mut self, column: &str, pattern: &str) -> &mut Self {
        let fragment = format!(
            "{} LIKE {}",
            self.column_ref(column),
            Value::from(pattern).to_sql_literal()
        );
        self.inline_predicate(&fragment)
    }

    /// `<column> NOT LIKE '<pattern>'`. The pattern is inlined, see [`Self::like`].
    pub fn not_like(&mut self, column: &str, pattern: &str) -> &mut Self {
        let fragment = format!(
            "{} NOT LIKE {}",
            self.column_ref(column),
            Value::from(pattern).to_sql_literal()
        );
        self.inline_predicate(&fragment)
    }

    /// `<column> IN (<values>)` with the values inlined as literals.
    ///
    /// Values are rendered into the statement text, not bound. Never pass
    /// untrusted input. An empty list matches nothing.
    pub fn in_list<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let fragment = match literal_list(values) {
            Some(list) => format!("{} IN ({})", self.column_ref(column), list),
            None => "1 = 0".to_string(),
        };
        self.inline_predicate(&fragment)
    }

    /// `<column> NOT IN (<values>)`, values inlined. An empty list matches
    /// everything.
    pub fn not_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let fragment = match literal_list(values) {
            Some(list) => format!("{} NOT IN ({})", self.column_ref(column), list),
            None => "1 = 1".to_string(),
        };
        self.inline_predicate(&fragment)
    }

    pub fn is_null(&mut self, column: &str) -> &mut Self {
        let fragment = format!("{} IS NULL", self.column_ref(column));
        self.inline_predicate(&fragment)
    }

    pub fn is_not_null(&mut self, column: &str) -> &mut Self {
        let fragment = format!("{} IS NOT NULL", self.column_ref(column));
        self.inline_predicate(&fragment)
    }

    /// `<column> BETWEEN <low> AND <high>` with both bounds inlined.
    ///
    /// Bounds are rendered into the statement text, not bound. Never pass
    /// untrusted input.
    pub fn between(&mut self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> &mut Self {
        let fragment = format!(
            "{} BETWEEN {} AND {}",
            self.column_ref(column),
            low.into().to_sql_literal(),
            high.into().to_sql_literal()
        );
        self.inline_predicate(&fragment)
    }

    /// `<column> NOT BETWEEN <low> AND <high>`, bounds inlined.
    pub fn not_between(
        &mut self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        let fragment = format!(
            "{} NOT BETWEEN {} AND {}",
            self.column_ref(column),
            low.into().to_sql_literal(),
            high.into().to_sql_literal()
        );
        self.inline_predicate(&fragment)
    }

    // ==================== DML ====================

    pub fn insert_into(&mut self, table: &str) -> &mut Self {
        self.target(ClauseKind::Insert, "INSERT INTO ", table)
    }

    /// ` (<columns>)` after `insert_into`.
    pub fn columns(&mut self, columns: &[&str]) -> &mut Self {
        self.sql.push_str(" (");
        self.sql.push_str(&columns.join(", "));
        self.sql.push(')');
        self
    }

    /// ` VALUES (<placeholders>)`, numbered from 1 on every call.
    pub fn values<I, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let marks: Vec<String> = (1..=values.len()).map(|i| self.dialect.placeholder(i)).collect();
        self.sql.push_str(" VALUES (");
        self.sql.push_str(&marks.join(", "));
        self.sql.push(')');
        self.params.extend(values);
        self
    }

    pub fn update(&mut self, table: &str) -> &mut Self {
        self.target(ClauseKind::Update, "UPDATE ", table)
    }

    /// ` SET a = <p1>, b = <p2>`, placeholders numbered from 1.
    ///
    /// A following `where_` continues with `?` markers numbered after these;
    /// explicit dialect placeholders in the condition must be offset by the
    /// caller.
    pub fn set<I, K, V>(&mut self, assignments: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut parts = Vec::new();
        for (i, (column, value)) in assignments.into_iter().enumerate() {
            parts.push(format!("{} = {}", column.as_ref(), self.dialect.placeholder(i + 1)));
            self.params.push(value.into());
        }
        self.sql.push_str(" SET ");
        self.sql.push_str(&parts.join(", "));
        self
    }

    pub fn delete(&mut self, table: &str) -> &mut Self {
        self.target(ClauseKind::Delete, "DELETE FROM ", table)
    }

    fn target(&mut self, kind: ClauseKind, keyword: &str, table: &str) -> &mut Self {
        let table = table.trim();
        self.clauses.push(kind);
        self.current_table = Some(table_from_clause(table));
        self.sql.push_str(keyword);
        self.sql.push_str(table);
        self
    }

    // ==================== Grouping, ordering, paging ====================

    pub fn group_by(&mut self, fields: &[&str]) -> &mut Self {
        self.clauses.push(ClauseKind::GroupBy);
        self.sql.push_str(" GROUP BY ");
        self.sql.push_str(&fields.join(", "));
        self
    }

    pub fn having(&mut self, condition: &str) -> &mut Self {
        self.clauses.push(ClauseKind::Having);
        self.sql.push_str(" HAVING ");
        self.sql.push_str(condition);
        self
    }

    pub fn order_by(&mut self, fields: &[&str]) -> &mut Self {
        if fields.is_empty() {
            return self;
        }
        self.clauses.push(ClauseKind::OrderBy);
        self.sql.push_str(" ORDER BY ");
        self.sql.push_str(&fields.join(", "));
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.clauses.push(ClauseKind::Limit);
        self.sql.push_str(&format!(" LIMIT {}", limit));
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.clauses.push(ClauseKind::Offset);
        self.sql.push_str(&format!(" OFFSET {}", offset));
        self
    }

    // ==================== Sub-queries ====================

    /// `(<query>)` appended as written.
    pub fn sub_query(&mut self, query: &str) -> &mut Self {
        self.sql.push('(');
        self.sql.push_str(query.trim().trim_end_matches(';'));
        self.sql.push(')');
        self
    }

    pub fn exists(&mut self, query: &str) -> &mut Self {
        self.sql.push_str(" EXISTS");
        self.sql.push(' ');
        self.sub_query(query)
    }

    pub fn not_exists(&mut self, query: &str) -> &mut Self {
        self.sql.push_str(" NOT EXISTS");
        self.sql.push(' ');
        self.sub_query(query)
    }

    // ==================== Joins ====================

    /// ` <kind> JOIN <table> ON <condition>`, written as given.
    pub fn join(&mut self, kind: &str, table: &str, condition: &str) -> &mut Self {
        self.clauses.push(ClauseKind::Join);
        self.sql.push_str(&format!(" {} JOIN {} ON {}", kind.trim(), table.trim(), condition.trim()));
        self
    }

    pub fn left_join(&mut self, table: &str, condition: &str) -> &mut Self {
        self.join("LEFT", table, condition)
    }

    pub fn right_join(&mut self, table: &str, condition: &str) -> &mut Self {
        self.join("RIGHT", table, condition)
    }

    pub fn inner_join(&mut self, table: &str, condition: &str) -> &mut Self {
        self.join("INNER", table, condition)
    }

    pub fn full_join(&mut self, table: &str, condition: &str) -> &mut Self {
        self.join("FULL", table, condition)
    }

    pub fn cross_join(&mut self, table: &str) -> &mut Self {
        self.clauses.push(ClauseKind::Join);
        self.sql.push_str(" CROSS JOIN ");
        self.sql.push_str(table.trim());
        self
    }

    // ==================== CASE ====================

    fn case_open(&self) -> bool {
        let last_case = self.clauses.iter().rposition(|c| *c == ClauseKind::Case);
        let last_end = self.clauses.iter().rposition(|c| *c == ClauseKind::CaseEnd);
        match (last_case, last_end) {
            (Some(c), Some(e)) => c > e,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// ` WHEN <when> THEN <then>`, opening the CASE on first use.
    pub fn case_when(&mut self, when: &str, then: &str) -> &mut Self {
        if !self.case_open() {
            self.clauses.push(ClauseKind::Case);
            self.sql.push_str(if self.sql.is_empty() || self.sql.ends_with(['(', ' ']) {
                "CASE"
            } else {
                " CASE"
            });
        }
        self.sql.push_str(&format!(" WHEN {} THEN {}", when, then));
        self
    }

    pub fn case_else(&mut self, value: &str) -> &mut Self {
        self.sql.push_str(" ELSE ");
        self.sql.push_str(value);
        self
    }

    pub fn case_end(&mut self) -> &mut Self {
        self.clauses.push(ClauseKind::CaseEnd);
        self.sql.push_str(" END");
        self
    }

    // ==================== DDL ====================

    pub fn alter_table(&mut self, table: &str) -> &mut Self {
        self.target(ClauseKind::Ddl, "ALTER TABLE ", table)
    }

    pub fn drop_column(&mut self, column: &str) -> &mut Self {
        if !self.sql.is_empty() {
            self.sql.push(' ');
        }
        self.sql.push_str("DROP COLUMN ");
        self.sql.push_str(column.trim());
        self
    }

    pub fn drop_table(&mut self, table: &str) -> &mut Self {
        self.target(ClauseKind::Ddl, "DROP TABLE ", table)
    }

    pub fn truncate(&mut self, table: &str) -> &mut Self {
        self.target(ClauseKind::Ddl, "TRUNCATE TABLE ", table)
    }

    pub fn cascade(&mut self) -> &mut Self {
        self.sql.push_str(" CASCADE");
        self
    }

    pub fn restart_identity(&mut self) -> &mut Self {
        self.sql.push_str(" RESTART IDENTITY");
        self
    }

    // ==================== Output ====================

    /// Columns the statement should return.
    ///
    /// Rendered as `RETURNING` on dialects that support it and emulated with
    /// a follow-up SELECT on the others.
    pub fn returning(&mut self, fields: &[&str]) -> &mut Self {
        self.returning.extend(fields.iter().map(|f| f.trim().to_string()));
        self
    }

    /// Final statement text, terminated with `;`.
    ///
    /// Requested RETURNING columns are appended, qualified with the table,
    /// only when the dialect supports RETURNING.
    pub fn get_sql(&self) -> String {
        let mut sql = self.sql.trim_end().trim_end_matches(';').to_string();
        if !self.returning.is_empty() && self.dialect.supports_returning() {
            let fields: Vec<String> = self
                .returning
                .iter()
                .map(|f| match &self.current_table {
                    Some(table) if !f.contains('.') && f != "*" => format!("{}.{}", table, f),
                    _ => f.clone(),
                })
                .collect();
            sql.push_str(" RETURNING ");
            sql.push_str(&fields.join(", "));
        }
        sql.push(';');
        sql
    }

    /// Arguments bound so far, in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Clear all state so the builder can assemble a new statement.
    pub fn reset(&mut self) {
        self.sql.clear();
        self.params.clear();
        self.current_table = None;
        self.clauses.clear();
        self.returning.clear();
        self.select_list = None;
    }

    /// Run the statement and reset the builder.
    ///
    /// SELECTs and statements with RETURNING yield their rows; other
    /// statements yield no rows. Without native RETURNING support the
    /// statement and a derived SELECT run in one transaction.
    #[tracing::instrument(level = "debug", skip_all, fields(dialect = self.dialect.name()))]
    pub async fn execute<C: Connection>(
        &mut self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
    ) -> Outcome<Vec<Row>, Error> {
        let sql = self.get_sql();
        let mut base_sql = self.sql.trim_end().trim_end_matches(';').to_string();
        base_sql.push(';');
        let params = std::mem::take(&mut self.params);
        let returning = std::mem::take(&mut self.returning);
        let table = self.current_table.take();
        self.reset();

        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }

        if !returning.is_empty() && !self.dialect.supports_returning() {
            let Some(table) = table else {
                return Outcome::Err(Error::query(
                    QueryErrorKind::Syntax,
                    Some(&base_sql),
                    "RETURNING needs a target table",
                ));
            };
            tracing::debug!(sql = %base_sql, args = ?params, "executing statement with emulated RETURNING");
            let plan = ReturningPlan {
                sql: &base_sql,
                params: &params,
                fields: &returning,
                table: &table,
            };
            return returning::emulate(cx, exec, self.dialect, plan).await;
        }

        tracing::debug!(sql = %sql, args = ?params, "executing statement");
        if !returning.is_empty() || StatementKind::detect(&sql) == StatementKind::Select {
            exec.query(cx, &sql, &params).await
        } else {
            exec.execute(cx, &sql, &params)
                .await
                .and_then(|affected| {
                    tracing::trace!(affected, "statement done");
                    Outcome::Ok(Vec::new())
                })
        }
    }

    /// Run the statement and decode every row into `M`.
    pub async fn scan<M: Model, C: Connection>(
        &mut self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
    ) -> Outcome<Vec<M>, Error> {
        self.execute(cx, exec).await.and_then(|rows| {
            let mut records = Vec::with_capacity(rows.len());
            for row in &rows {
                match M::from_row(row) {
                    Ok(record) => records.push(record),
                    Err(e) => return Outcome::Err(e),
                }
            }
            Outcome::Ok(records)
        })
    }

    /// Run the statement and decode the first row, if any.
    pub async fn scan_one<M: Model, C: Connection>(
        &mut self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
    ) -> Outcome<Option<M>, Error> {
        self.execute(cx, exec).await.and_then(|rows| match rows.first() {
            Some(row) => match M::from_row(row) {
                Ok(record) => Outcome::Ok(Some(record)),
                Err(e) => Outcome::Err(e),
            },
            None => Outcome::Ok(None),
        })
    }
}

fn literal_list<I, V>(values: I) -> Option<String>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let literals: Vec<String> = values.into_iter().map(|v| v.into().to_sql_literal()).collect();
    (!literals.is_empty()).then(|| literals.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::block_on;
    use relorm_core::testing::{MockConnection, StatementKind as Logged, expect_err, unwrap_outcome};
    use relorm_core::{Mysql, Postgres, Sqlite, TransactionErrorKind, TransactionOps};

    #[test]
    fn select_star_and_qualified_list() {
        let mut qb = QueryBuilder::new(&Postgres);
        qb.select(&[]).from("users");
        assert_eq!(qb.get_sql(), "SELECT * FROM users;");

        let mut qb = QueryBuilder::new(&Postgres);
        qb.select(&["id", " name ", "COUNT(*) AS n", "p.title", "email as mail"])
            .from("users");
        assert_eq!(
            qb.get_sql(),
            "SELECT users.id, users.name, COUNT(*) AS n, p.title, email as mail FROM users;"
        );
    }

    #[test]
    fn select_distinct_with_schema_and_alias() {
        let mut qb = QueryBuilder::new(&Postgres);
        qb.select_distinct(&["role"]).from("public.users u");
        assert_eq!(qb.get_sql(), "SELECT DISTINCT users.role FROM public.users u;");
        assert_eq!(qb.current_table(), Some("users"));
    }

    #[test]
    fn where_qualifies_and_numbers_markers() {
        let mut qb = QueryBuilder::new(&Postgres);
        qb.select(&["id"])
            .from("users")
            .where_("age > ? AND name = ?", [Value::Int(18), Value::from("bob")])
            .or("status = ?", ["active"]);
        assert_eq!(
            qb.get_sql(),
            "SELECT users.id FROM users WHERE users.age > $1 AND users.name = $2 OR users.status = $3;"
        );
        assert_eq!(qb.params().len(), 3);
    }

    #[test]
    fn where_keeps_caller_placeholders() {
        let mut qb = QueryBuilder::new(&Postgres);
        qb.select(&[]).from("users").where_("id = $1", [7_i64]);
        assert_eq!(qb.get_sql(), "SELECT * FROM users WHERE users.id = $1;");
        assert_eq!(qb.params(), &[Value::BigInt(7)]);
    }

    #[test]
    fn empty_condition_is_ignored() {
        let mut qb = QueryBuilder::new(&Sqlite);
        qb.select(&[]).from("users").where_("  ", NO_ARGS).and("", NO_ARGS);
        assert_eq!(qb.get_sql(), "SELECT * FROM users;");
    }

    #[test]
    fn not_opens_or_extends_predicate() {
        let mut qb = QueryBuilder::new(&Sqlite);
        qb.select(&[]).from("users").not("banned = ?", [true]);
        assert_eq!(qb.get_sql(), "SELECT * FROM users WHERE NOT users.banned = ?;");

        let mut qb = QueryBuilder::new(&Sqlite);
        qb.select(&[])
            .from("users")
            .where_("age > ?", [1])
            .not("banned = ?", [true]);
        assert_eq!(
            qb.get_sql(),
            "SELECT * FROM users WHERE users.age > ? AND NOT users.banned = ?;"
        );
    }

    #[test]
    fn text_helpers_inline_literals() {
        let mut qb = QueryBuilder::new(&Postgres);
        qb.select(&[])
            .from("users")
            .like("name", "o'b%")
            .in_list("id", [1, 2, 3])
            .between("age", 18, 30)
            .is_not_null("email");
        assert_eq!(
            qb.get_sql(),
            "SELECT * FROM users WHERE users.name LIKE 'o''b%' AND users.id IN (1, 2, 3) \
             AND users.age BETWEEN 18 AND 30 AND users.email IS NOT NULL;"
        );
        assert!(qb.params().is_empty());
    }

    #[test]
    fn text_helpers_after_where_and_empty_lists() {
        let mut qb = QueryBuilder::new(&Mysql);
        qb.select(&[])
            .from("users")
            .where_("age > ?", [18])
            .not_in("id", Vec::<i32>::new())
            .in_list("role", Vec::<&str>::new())
            .not_like("name", "x%")
            .not_between("score", 1, 2)
            .is_null("deleted_at");
        assert_eq!(
            qb.get_sql(),
            "SELECT * FROM users WHERE users.age > ? AND 1 = 1 AND 1 = 0 AND users.name NOT LIKE 'x%' \
             AND users.score NOT BETWEEN 1 AND 2 AND users.deleted_at IS NULL;"
        );
    }

    #[test]
    fn insert_values_number_from_one() {
        let mut qb = QueryBuilder::new(&Postgres);
        qb.insert_into("users")
            .columns(&["email", "age"])
            .values([Value::from("a@b"), Value::Int(3)]);
        assert_eq!(qb.get_sql(), "INSERT INTO users (email, age) VALUES ($1, $2);");
        assert_eq!(qb.current_table(), Some("users"));
    }

    #[test]
    fn update_set_then_where_continues_numbering() {
        let mut qb = QueryBuilder::new(&Postgres);
        qb.update("users")
            .set([("email", Value::from("x")), ("age", Value::Int(2))])
            .where_("id = ?", [9_i64]);
        assert_eq!(
            qb.get_sql(),
            "UPDATE users SET email = $1, age = $2 WHERE users.id = $3;"
        );
    }

    #[test]
    fn grouping_paging_joins_and_case() {
        let mut qb = QueryBuilder::new(&Postgres);
        qb.select(&["role", "COUNT(*)"])
            .from("users")
            .left_join("posts", "posts.user_id = users.id")
            .cross_join("tags")
            .group_by(&["users.role"])
            .having("COUNT(*) > 1")
            .order_by(&["users.role DESC"])
            .limit(10)
            .offset(20);
        assert_eq!(
            qb.get_sql(),
            "SELECT users.role, COUNT(*) FROM users LEFT JOIN posts ON posts.user_id = users.id \
             CROSS JOIN tags GROUP BY users.role HAVING COUNT(*) > 1 ORDER BY users.role DESC \
             LIMIT 10 OFFSET 20;"
        );

        let mut qb = QueryBuilder::new(&Postgres);
        qb.select(&["id"])
            .from("users")
            .full_join("teams", "teams.id = users.team_id")
            .where_("id > ?", [0])
            .and("EXISTS (SELECT 1 FROM bans WHERE bans.user_id = users.id)", NO_ARGS);
        assert!(qb.get_sql().contains(" FULL JOIN teams ON "));
        assert!(qb.get_sql().ends_with("AND EXISTS (SELECT 1 FROM bans WHERE bans.user_id = users.id);"));

        let mut qb = QueryBuilder::new(&Postgres);
        qb.case_when("age < 18", "'minor'").case_when("age < 65", "'adult'").case_else("'senior'").case_end();
        assert_eq!(
            qb.get_sql(),
            "CASE WHEN age < 18 THEN 'minor' WHEN age < 65 THEN 'adult' ELSE 'senior' END;"
        );
    }

    #[test]
    fn sub_queries_and_ddl() {
        let mut qb = QueryBuilder::new(&Postgres);
        qb.select(&[]).from("users").where_("active = ?", [true]).not_exists("SELECT 1 FROM bans;");
        assert_eq!(
            qb.get_sql(),
            "SELECT * FROM users WHERE users.active = $1 NOT EXISTS (SELECT 1 FROM bans);"
        );

        let mut qb = QueryBuilder::new(&Postgres);
        qb.truncate("users").restart_identity().cascade();
        assert_eq!(qb.get_sql(), "TRUNCATE TABLE users RESTART IDENTITY CASCADE;");

        let mut qb = QueryBuilder::new(&Postgres);
        qb.alter_table("users").drop_column("age");
        assert_eq!(qb.get_sql(), "ALTER TABLE users DROP COLUMN age;");

        let mut qb = QueryBuilder::new(&Postgres);
        qb.drop_table("users").cascade();
        assert_eq!(qb.get_sql(), "DROP TABLE users CASCADE;");
    }

    #[test]
    fn returning_rendered_only_when_supported() {
        let mut qb = QueryBuilder::new(&Postgres);
        qb.insert_into("users").columns(&["email"]).values(["a"]).returning(&["id", "email"]);
        assert_eq!(
            qb.get_sql(),
            "INSERT INTO users (email) VALUES ($1) RETURNING users.id, users.email;"
        );

        let mut qb = QueryBuilder::new(&Mysql);
        qb.insert_into("users").columns(&["email"]).values(["a"]).returning(&["id"]);
        assert_eq!(qb.get_sql(), "INSERT INTO users (email) VALUES (?);");
    }

    #[test]
    fn reset_clears_everything() {
        let mut qb = QueryBuilder::new(&Postgres);
        qb.select(&["id"]).from("users").where_("id = ?", [1]).returning(&["id"]);
        qb.reset();
        assert_eq!(qb.get_sql(), ";");
        assert!(qb.params().is_empty());
        assert!(qb.current_table().is_none());
        assert!(qb.clauses().is_empty());
    }

    #[test]
    fn execute_select_queries_and_resets() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.push_rows(vec![Row::from_pairs([("id", Value::BigInt(1))])]);

        block_on(async {
            let mut qb = QueryBuilder::new(&Postgres);
            qb.select(&["id"]).from("users").where_("id = ?", [1_i64]);
            let rows = unwrap_outcome(qb.execute(&cx, Executor::Pool(&conn)).await);
            assert_eq!(rows.len(), 1);
            assert!(qb.params().is_empty());
            assert_eq!(qb.get_sql(), ";");
        });

        let log = conn.statements();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, Logged::Query);
        assert_eq!(log[0].sql, "SELECT users.id FROM users WHERE users.id = $1;");
        assert_eq!(log[0].params, vec![Value::BigInt(1)]);
    }

    #[test]
    fn execute_dml_without_returning_uses_execute() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.push_affected(2);

        block_on(async {
            let mut qb = QueryBuilder::new(&Sqlite);
            qb.delete("users").where_("age < ?", [18]);
            let rows = unwrap_outcome(qb.execute(&cx, Executor::Pool(&conn)).await);
            assert!(rows.is_empty());
        });

        let log = conn.statements();
        assert_eq!(log[0].kind, Logged::Execute);
        assert_eq!(log[0].sql, "DELETE FROM users WHERE users.age < ?;");
    }

    #[test]
    fn execute_failure_still_resets() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.fail_when("FROM users", "no such table");

        block_on(async {
            let mut qb = QueryBuilder::new(&Sqlite);
            qb.select(&[]).from("users");
            let err = expect_err(qb.execute(&cx, Executor::Pool(&conn)).await);
            assert!(err.to_string().contains("no such table"));
            assert_eq!(qb.get_sql(), ";");
        });
    }

    #[test]
    fn native_returning_queries_rows() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.push_rows(vec![Row::from_pairs([("id", Value::BigInt(5))])]);

        block_on(async {
            let mut qb = QueryBuilder::new(&Postgres);
            qb.insert_into("users").columns(&["email"]).values(["a@b"]).returning(&["id"]);
            let rows = unwrap_outcome(qb.execute(&cx, Executor::Pool(&conn)).await);
            assert_eq!(rows[0].get_by_name("id"), Some(&Value::BigInt(5)));
        });

        let log = conn.statements();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, Logged::Query);
        assert!(log[0].sql.ends_with("RETURNING users.id;"));
    }

    #[test]
    fn emulated_insert_returning_runs_in_transaction() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.push_insert_id(42).push_rows(vec![Row::from_pairs([
            ("id", Value::BigInt(42)),
            ("email", Value::from("a@b")),
        ])]);

        block_on(async {
            let mut qb = QueryBuilder::new(&Sqlite);
            qb.insert_into("users")
                .columns(&["email"])
                .values(["a@b"])
                .returning(&["id", "email"]);
            let rows = unwrap_outcome(qb.execute(&cx, Executor::Pool(&conn)).await);
            assert_eq!(rows.len(), 1);
        });

        let log = conn.statements();
        let kinds: Vec<Logged> = log.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![Logged::Begin, Logged::Insert, Logged::Query, Logged::Commit]
        );
        assert_eq!(log[1].sql, "INSERT INTO users (email) VALUES (?);");
        assert_eq!(log[2].sql, "SELECT id, email FROM users WHERE id = ?;");
        assert_eq!(log[2].params, vec![Value::BigInt(42)]);
        assert!(log[1].in_transaction && log[2].in_transaction);
    }

    #[test]
    fn emulated_update_reuses_where_params() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.push_affected(1);

        block_on(async {
            let mut qb = QueryBuilder::new(&Mysql);
            qb.update("users")
                .set([("email", "new@b")])
                .where_("id = ?", [3_i64])
                .returning(&["email"]);
            unwrap_outcome(qb.execute(&cx, Executor::Pool(&conn)).await);
        });

        let log = conn.statements();
        assert_eq!(log[1].sql, "UPDATE users SET email = ? WHERE users.id = ?;");
        assert_eq!(log[2].sql, "SELECT email FROM users WHERE users.id = ?;");
        assert_eq!(log[2].params, vec![Value::BigInt(3)]);
        assert_eq!(log[3].kind, Logged::Commit);
    }

    #[test]
    fn emulated_update_ignores_dollar_inside_literals() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.push_affected(1);

        block_on(async {
            let mut qb = QueryBuilder::new(&Mysql);
            qb.update("items")
                .set([("name", "x")])
                .where_("price = '$5' AND id = ?", [3_i64])
                .returning(&["id"]);
            unwrap_outcome(qb.execute(&cx, Executor::Pool(&conn)).await);
        });

        let log = conn.statements();
        assert_eq!(
            log[2].sql,
            "SELECT id FROM items WHERE items.price = '$5' AND items.id = ?;"
        );
        assert_eq!(log[2].params, vec![Value::BigInt(3)]);
    }

    #[test]
    fn emulated_delete_selects_before_deleting() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.push_rows(vec![Row::from_pairs([("id", Value::BigInt(3))])]);

        block_on(async {
            let mut qb = QueryBuilder::new(&Sqlite);
            qb.delete("users").where_("id = ?", [3_i64]).returning(&["id"]);
            let rows = unwrap_outcome(qb.execute(&cx, Executor::Pool(&conn)).await);
            assert_eq!(rows.len(), 1);
        });

        let kinds: Vec<Logged> = conn.statements().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![Logged::Begin, Logged::Query, Logged::Execute, Logged::Commit]
        );
    }

    #[test]
    fn emulation_without_where_is_syntax_error() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();

        block_on(async {
            let mut qb = QueryBuilder::new(&Sqlite);
            qb.update("users").set([("email", "x")]).returning(&["id"]);
            let err = expect_err(qb.execute(&cx, Executor::Pool(&conn)).await);
            assert!(matches!(err, Error::Query(ref q) if q.kind == QueryErrorKind::Syntax));
        });
        // rejected before any statement ran
        assert!(conn.statements().is_empty());
    }

    #[test]
    fn emulation_failure_rolls_back() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.fail_when("INSERT INTO users", "unique violation");

        block_on(async {
            let mut qb = QueryBuilder::new(&Sqlite);
            qb.insert_into("users").columns(&["email"]).values(["a"]).returning(&["id"]);
            let err = expect_err(qb.execute(&cx, Executor::Pool(&conn)).await);
            assert!(err.to_string().contains("unique violation"));
        });

        let kinds: Vec<Logged> = conn.statements().iter().map(|s| s.kind).collect();
        assert_eq!(kinds.first(), Some(&Logged::Begin));
        assert_eq!(kinds.last(), Some(&Logged::Rollback));
        assert!(!kinds.contains(&Logged::Commit));
    }

    #[test]
    fn rollback_failure_is_reported_distinctly() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.fail_when("INSERT INTO users", "unique violation")
            .fail_when("ROLLBACK", "connection lost");

        block_on(async {
            let mut qb = QueryBuilder::new(&Sqlite);
            qb.insert_into("users").columns(&["email"]).values(["a"]).returning(&["id"]);
            let err = expect_err(qb.execute(&cx, Executor::Pool(&conn)).await);
            match err {
                Error::Transaction(t) => {
                    assert_eq!(t.kind, TransactionErrorKind::RollbackFailed);
                    assert!(t.message.contains("connection lost"));
                    assert!(t.message.contains("unique violation"));
                }
                other => panic!("expected rollback failure, got {other:?}"),
            }
        });
    }

    #[test]
    fn emulation_inside_transaction_uses_savepoint() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.push_insert_id(1);

        block_on(async {
            let tx = unwrap_outcome(conn.begin(&cx).await);
            let mut qb = QueryBuilder::new(&Mysql);
            qb.insert_into("users").columns(&["email"]).values(["a"]).returning(&["id"]);
            unwrap_outcome(qb.execute(&cx, Executor::<MockConnection>::Transaction(&tx)).await);
            unwrap_outcome(tx.commit(&cx).await);
        });

        let log = conn.statements();
        let kinds: Vec<Logged> = log.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                Logged::Begin,
                Logged::Savepoint,
                Logged::Insert,
                Logged::Query,
                Logged::Release,
                Logged::Commit
            ]
        );
        assert_eq!(log[1].sql, "SAVEPOINT relorm_returning");
    }

    #[test]
    fn scan_decodes_rows() {
        #[derive(Debug, Default, PartialEq)]
        struct Gadget {
            id: i64,
        }

        impl Model for Gadget {
            const TABLE_NAME: &'static str = "gadgets";
            const PRIMARY_KEY: &'static str = "id";

            fn fields() -> &'static [relorm_core::FieldInfo] {
                static FIELDS: [relorm_core::FieldInfo; 1] =
                    [relorm_core::FieldInfo::new("id", "id", "i64").primary_key(true)];
                &FIELDS
            }

            fn to_row(&self) -> Vec<(&'static str, Value)> {
                vec![("id", Value::BigInt(self.id))]
            }

            fn changed_row(&self) -> Vec<(&'static str, Value)> {
                self.to_row()
            }

            fn from_row(row: &Row) -> relorm_core::Result<Self> {
                Ok(Self {
                    id: relorm_core::decode::field(row, "id"),
                })
            }

            fn set_generated_id(&mut self, id: i64) {
                self.id = id;
            }
        }

        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.push_rows(vec![
            Row::from_pairs([("id", Value::BigInt(1))]),
            Row::from_pairs([("id", Value::BigInt(2))]),
        ])
        .push_rows(Vec::new());

        block_on(async {
            let mut qb = QueryBuilder::new(&Postgres);
            qb.select(&[]).from("gadgets");
            let all: Vec<Gadget> = unwrap_outcome(qb.scan(&cx, Executor::Pool(&conn)).await);
            assert_eq!(all, vec![Gadget { id: 1 }, Gadget { id: 2 }]);

            qb.select(&[]).from("gadgets").where_("id = ?", [9]);
            let one: Option<Gadget> = unwrap_outcome(qb.scan_one(&cx, Executor::Pool(&conn)).await);
            assert_eq!(one, None);
        });
    }
}
