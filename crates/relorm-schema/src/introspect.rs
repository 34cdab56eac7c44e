//! Live schema introspection.
//!
//! The catalog queries and row parsers live on the dialect; this module runs
//! them against an executor.

use asupersync::{Cx, Outcome};
use relorm_core::{ColumnInfo, Connection, Dialect, Error, Executor, ForeignKey, Row, Value};

/// Reads table, column and foreign key metadata for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct Introspector<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> Introspector<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Whether `table` exists in the current database/schema.
    pub async fn table_exists<C: Connection>(
        &self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
        table: &str,
    ) -> Outcome<bool, Error> {
        let (sql, args) = self.dialect.table_exists_query(table);
        match catalog(cx, exec, &sql, &args).await {
            Outcome::Ok(rows) => Outcome::Ok(self.dialect.parse_table_exists(&rows)),
            Outcome::Err(e) => Outcome::Err(e.context("table_exists", table)),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Columns of `table`, in catalog order.
    pub async fn get_columns<C: Connection>(
        &self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
        table: &str,
    ) -> Outcome<Vec<ColumnInfo>, Error> {
        let (sql, args) = self.dialect.columns_query(table);
        let rows = match catalog(cx, exec, &sql, &args).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e.context("get_columns", table)),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        match rows
            .iter()
            .map(|row| self.dialect.parse_column(row))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(columns) => Outcome::Ok(columns),
            Err(e) => Outcome::Err(e),
        }
    }

    /// Foreign keys declared on `table`.
    pub async fn get_foreign_keys<C: Connection>(
        &self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
        table: &str,
    ) -> Outcome<Vec<ForeignKey>, Error> {
        let (sql, args) = self.dialect.foreign_keys_query(table);
        let rows = match catalog(cx, exec, &sql, &args).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e.context("get_foreign_keys", table)),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        match rows
            .iter()
            .map(|row| self.dialect.parse_foreign_key(row))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(fks) => Outcome::Ok(fks),
            Err(e) => Outcome::Err(e),
        }
    }
}

async fn catalog<C: Connection>(
    cx: &Cx,
    exec: Executor<'_, '_, C>,
    sql: &str,
    args: &[Value],
) -> Outcome<Vec<Row>, Error> {
    if let Some(reason) = cx.cancel_reason() {
        return Outcome::Cancelled(reason);
    }
    tracing::trace!(sql = %sql, args = ?args, "catalog query");
    exec.query(cx, sql, args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_on;
    use relorm_core::testing::{MockConnection, expect_err, unwrap_outcome};
    use relorm_core::{Postgres, Sqlite};

    #[test]
    fn table_exists_reads_count() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.push_rows(vec![Row::from_pairs([("count", Value::BigInt(1))])]);
        conn.push_rows(Vec::new());
        let inspect = Introspector::new(&Sqlite);

        let (present, absent) = block_on(async {
            (
                unwrap_outcome(inspect.table_exists(&cx, Executor::Pool(&conn), "users").await),
                unwrap_outcome(inspect.table_exists(&cx, Executor::Pool(&conn), "ghosts").await),
            )
        });
        assert!(present);
        assert!(!absent);
        let log = conn.statements();
        assert_eq!(log[0].params, vec![Value::from("users")]);
        assert!(log[0].sql.contains("sqlite_master"));
    }

    #[test]
    fn sqlite_columns_and_foreign_keys() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.push_rows(vec![
            Row::from_pairs([
                ("name", Value::from("id")),
                ("type", Value::from("INTEGER")),
                ("notnull", Value::BigInt(0)),
                ("dflt_value", Value::Null),
                ("pk", Value::BigInt(1)),
            ]),
            Row::from_pairs([
                ("name", Value::from("email")),
                ("type", Value::from("varchar(255)")),
                ("notnull", Value::BigInt(1)),
                ("dflt_value", Value::Null),
                ("pk", Value::BigInt(0)),
            ]),
        ]);
        conn.push_rows(vec![Row::from_pairs([
            ("table", Value::from("teams")),
            ("from", Value::from("team_id")),
            ("to", Value::from("id")),
            ("on_delete", Value::from("CASCADE")),
        ])]);
        let inspect = Introspector::new(&Sqlite);

        let (columns, fks) = block_on(async {
            let exec = Executor::Pool(&conn);
            (
                unwrap_outcome(inspect.get_columns(&cx, exec, "members").await),
                unwrap_outcome(inspect.get_foreign_keys(&cx, exec, "members").await),
            )
        });
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].extra.as_deref(), Some("PRIMARY KEY"));
        assert!(!columns[1].is_nullable);
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].column, "team_id");
        assert_eq!(fks[0].ref_table, "teams");
        assert_eq!(fks[0].options, vec!["ON DELETE CASCADE".to_string()]);
    }

    #[test]
    fn unreadable_catalog_row_is_an_error() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.push_rows(vec![Row::from_pairs([("data_type", Value::from("text"))])]);
        let err = block_on(async {
            expect_err(
                Introspector::new(&Postgres)
                    .get_columns(&cx, Executor::Pool(&conn), "users")
                    .await,
            )
        });
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn catalog_failure_names_the_table() {
        let cx = Cx::for_testing();
        let conn = MockConnection::new();
        conn.fail_when("information_schema", "permission denied");
        let err = block_on(async {
            expect_err(
                Introspector::new(&Postgres)
                    .get_foreign_keys(&cx, Executor::Pool(&conn), "users")
                    .await,
            )
        });
        assert!(err.to_string().contains("get_foreign_keys users"));
    }
}
