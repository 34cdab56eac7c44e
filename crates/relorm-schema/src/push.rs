//! Bring a live database in line with a set of table definitions.
//!
//! Push is additive: missing tables are created with their indexes, and
//! existing tables gain missing columns and foreign keys. Nothing is dropped
//! or rewritten. Statements a dialect cannot express (SQLite ALTERs) are
//! skipped.

use crate::introspect::Introspector;
use asupersync::{Cx, Outcome};
use relorm_core::{Connection, Dialect, Error, Executor, Table, TransactionOps};

/// Applies table definitions to a database.
#[derive(Debug, Clone, Copy)]
pub struct SchemaPusher<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> SchemaPusher<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Push `tables`, returning the statements that were executed.
    ///
    /// On a pool executor the whole push is one transaction, rolled back on
    /// the first failure. Inside a caller's transaction the caller decides.
    #[tracing::instrument(level = "debug", skip_all, fields(dialect = self.dialect.name(), tables = tables.len()))]
    pub async fn push<C: Connection>(
        &self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
        tables: &[Table],
    ) -> Outcome<Vec<String>, Error> {
        let Executor::Pool(conn) = exec else {
            return self.push_tables(cx, exec, tables).await;
        };

        let tx = match conn.begin(cx).await {
            Outcome::Ok(tx) => tx,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        match self
            .push_tables(cx, Executor::<C>::Transaction(&tx), tables)
            .await
        {
            Outcome::Ok(executed) => match tx.commit(cx).await {
                Outcome::Ok(()) => {
                    tracing::info!(statements = executed.len(), "schema pushed");
                    Outcome::Ok(executed)
                }
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
                let _ = tx.rollback(cx).await;
                Outcome::Cancelled(r)
            }
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    async fn push_tables<C: Connection>(
        &self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
        tables: &[Table],
    ) -> Outcome<Vec<String>, Error> {
        let mut executed = Vec::new();
        for table in tables {
            let plan = match self.plan_table(cx, exec, table).await {
                Outcome::Ok(plan) => plan,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            for sql in plan {
                if let Some(reason) = cx.cancel_reason() {
                    return Outcome::Cancelled(reason);
                }
                tracing::debug!(table = %table.name, sql = %sql, "push statement");
                match exec.execute(cx, &sql, &[]).await {
                    Outcome::Ok(_) => executed.push(sql),
                    Outcome::Err(e) => return Outcome::Err(e.context("push", &table.name)),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
        }
        Outcome::Ok(executed)
    }

    /// Statements needed for one table, given what the database has now.
    async fn plan_table<C: Connection>(
        &self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
        table: &Table,
    ) -> Outcome<Vec<String>, Error> {
        let inspect = Introspector::new(self.dialect);
        let exists = match inspect.table_exists(cx, exec, &table.name).await {
            Outcome::Ok(exists) => exists,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        if !exists {
            return Outcome::Ok(self.create_statements(table));
        }

        let live_columns = match inspect.get_columns(cx, exec, &table.name).await {
            Outcome::Ok(columns) => columns,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let mut plan: Vec<String> = table
            .columns
            .iter()
            .filter(|c| !live_columns.iter().any(|l| l.name.eq_ignore_ascii_case(&c.name)))
            .map(|c| {
                self.dialect
                    .add_column_sql(&table.name, &c.name, &c.to_info())
            })
            .collect();

        let live_fks = match inspect.get_foreign_keys(cx, exec, &table.name).await {
            Outcome::Ok(fks) => fks,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        // Matched by shape: SQLite reports unnamed constraints
        for fk in &table.foreign_keys {
            let present = live_fks
                .iter()
                .any(|l| l.column == fk.column && l.ref_table == fk.ref_table);
            if present {
                continue;
            }
            match self.dialect.add_foreign_key_sql(&table.name, fk) {
                Some(sql) => plan.push(sql),
                None => tracing::debug!(
                    table = %table.name,
                    constraint = %fk.name,
                    dialect = self.dialect.name(),
                    "foreign key cannot be added to an existing table, skipped"
                ),
            }
        }
        Outcome::Ok(plan)
    }

    /// CREATE TABLE plus its indexes.
    pub fn create_statements(&self, table: &Table) -> Vec<String> {
        std::iter::once(self.dialect.create_table_sql(table))
            .chain(
                table
                    .indexes
                    .iter()
                    .map(|i| self.dialect.create_index_sql(&table.name, i)),
            )
            .collect()
    }
}
