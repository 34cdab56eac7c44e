//! Per-type CRUD facade.
//!
//! [`BaseModel`] binds a record type to a dialect and its relation registry.
//! Each call assembles its statement with a fresh [`QueryBuilder`], runs it
//! through the given [`Executor`] and maps the rows back to records.

use crate::builder::QueryBuilder;
use crate::condition::{Condition, Logic, Params};
use crate::loader::load_relations;
use asupersync::{Cx, Outcome};
use relorm_core::encode::{insert_columns, update_columns};
use relorm_core::error::TypeError;
use relorm_core::{
    Connection, Dialect, DialectKind, Error, Executor, Model, RelationLink, Relations, Value,
    dialect_for,
};

/// CRUD operations for one record type.
///
/// Every call takes a [`Params`] bundle; the fields an operation does not
/// use are ignored.
pub struct BaseModel<M: Model> {
    dialect: Box<dyn Dialect>,
    relations: Relations<M>,
}

impl<M: Model> std::fmt::Debug for BaseModel<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseModel")
            .field("table", &M::TABLE_NAME)
            .field("dialect", &self.dialect.name())
            .field("relations", &self.relations)
            .finish()
    }
}

/// Wrap an error with the operation and table that issued it.
fn in_context<T>(outcome: Outcome<T, Error>, verb: &str, table: &str) -> Outcome<T, Error> {
    match outcome {
        Outcome::Err(e) => Outcome::Err(e.context(verb, table)),
        other => other,
    }
}

fn missing_payload<M>() -> Error {
    Error::Type(TypeError {
        expected: "record payload",
        actual: "none".to_string(),
        column: None,
        rust_type: Some(std::any::type_name::<M>()),
    })
}

/// Append conditions as `where_`/`and`/`or` predicates.
///
/// Placeholders continue after the arguments already bound.
fn apply_conditions(qb: &mut QueryBuilder<'_>, conditions: &[Condition]) {
    for (i, cond) in conditions.iter().enumerate() {
        let (text, _) = cond.render(qb.dialect(), qb.params().len() + 1);
        let args = cond.value.values().to_vec();
        match (i, cond.logic) {
            (0, _) => qb.where_(&text, args),
            (_, Logic::And) => qb.and(&text, args),
            (_, Logic::Or) => qb.or(&text, args),
        };
    }
}

impl<M: Model> BaseModel<M> {
    pub fn new(kind: DialectKind) -> Self {
        Self::with_dialect(dialect_for(kind))
    }

    /// Facade over an explicit dialect. Relations come from
    /// `M::register_relations`.
    pub fn with_dialect(dialect: Box<dyn Dialect>) -> Self {
        Self {
            dialect,
            relations: Relations::for_model(),
        }
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn relations(&self) -> &Relations<M> {
        &self.relations
    }

    /// Add or replace a relation at runtime.
    pub fn register_relation<L>(&mut self, link: L) -> &mut Self
    where
        L: RelationLink<M> + 'static,
    {
        self.relations.register(link);
        self
    }

    fn builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self.dialect.as_ref())
    }

    /// SELECT for `find_many`/`find_first`; bare columns are qualified.
    fn select_query(&self, params: &Params<M>) -> QueryBuilder<'_> {
        let mut qb = self.builder();
        let columns: Vec<&str> = if params.select.is_empty() {
            M::columns()
        } else {
            let mut columns: Vec<&str> = params.select.iter().map(String::as_str).collect();
            // included relations are keyed on parent columns the projection may omit
            for name in params.include.keys() {
                if let Some(link) = self.relations.get(name) {
                    let key = link.parent_key_column();
                    if !columns.contains(&key) {
                        columns.push(key);
                    }
                }
            }
            columns
        };
        qb.select(&columns).from(M::TABLE_NAME);
        apply_conditions(&mut qb, &params.where_);
        let order: Vec<&str> = params.order_by.iter().map(String::as_str).collect();
        qb.order_by(&order);
        if let Some(limit) = params.limit {
            qb.limit(limit);
        }
        if let Some(offset) = params.offset {
            qb.offset(offset);
        }
        qb
    }

    /// Records matching `params`, with the requested relations loaded.
    #[tracing::instrument(level = "debug", skip_all, fields(table = M::TABLE_NAME))]
    pub async fn find_many<C: Connection>(
        &self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
        params: Params<M>,
    ) -> Outcome<Vec<M>, Error> {
        let mut qb = self.select_query(&params);
        let mut records = match qb.scan::<M, C>(cx, exec).await {
            Outcome::Ok(records) => records,
            other => return in_context(other, "find_many", M::TABLE_NAME),
        };
        if !params.include.is_empty() {
            let loaded = load_relations(
                cx,
                exec,
                self.dialect.as_ref(),
                &self.relations,
                &mut records,
                &params.include,
            )
            .await;
            match loaded {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => return Outcome::Err(e.context("find_many", M::TABLE_NAME)),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        Outcome::Ok(records)
    }

    /// First record matching `params`, if any. The limit is forced to 1.
    #[tracing::instrument(level = "debug", skip_all, fields(table = M::TABLE_NAME))]
    pub async fn find_first<C: Connection>(
        &self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
        params: Params<M>,
    ) -> Outcome<Option<M>, Error> {
        let params = params.limit(1);
        self.find_many(cx, exec, params)
            .await
            .and_then(|records| Outcome::Ok(records.into_iter().next()))
    }

    /// Insert `params.data` and return it with its generated key set.
    ///
    /// RETURNING-capable dialects read the key back from the statement;
    /// the others use the driver's last insert id.
    #[tracing::instrument(level = "debug", skip_all, fields(table = M::TABLE_NAME))]
    pub async fn create<C: Connection>(
        &self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
        params: Params<M>,
    ) -> Outcome<M, Error> {
        let Some(mut record) = params.data else {
            return Outcome::Err(missing_payload::<M>());
        };
        let encoded = insert_columns(&record, self.dialect.as_ref());
        let columns: Vec<&str> = encoded.iter().map(|c| c.column).collect();

        let mut qb = self.builder();
        qb.insert_into(M::TABLE_NAME)
            .columns(&columns)
            .values(encoded.into_iter().map(|c| c.value));
        let returning = self.dialect.supports_returning();
        if returning {
            qb.returning(&[M::PRIMARY_KEY]);
        }
        let sql = qb.get_sql();
        let args = qb.params().to_vec();
        qb.reset();

        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        tracing::debug!(sql = %sql, args = ?args, "executing statement");

        let id = if returning {
            match exec.query(cx, &sql, &args).await {
                Outcome::Ok(rows) => rows
                    .first()
                    .and_then(|row| row.get(0))
                    .and_then(Value::as_i64),
                Outcome::Err(e) => return Outcome::Err(e.context("create", M::TABLE_NAME)),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        } else {
            match exec.insert(cx, &sql, &args).await {
                Outcome::Ok(id) => Some(id),
                Outcome::Err(e) => return Outcome::Err(e.context("create", M::TABLE_NAME)),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        };
        match id {
            Some(id) => record.set_generated_id(id),
            None => tracing::debug!(table = M::TABLE_NAME, "no generated key returned"),
        }
        Outcome::Ok(record)
    }

    /// Write the non-zero fields of `params.data` to the rows matching
    /// `params.where_`. Returns the number of rows affected.
    ///
    /// A missing payload, an empty filter or a payload without changed
    /// fields is rejected before any statement runs.
    #[tracing::instrument(level = "debug", skip_all, fields(table = M::TABLE_NAME))]
    pub async fn update<C: Connection>(
        &self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
        params: Params<M>,
    ) -> Outcome<u64, Error> {
        let operation = format!("update {}", M::TABLE_NAME);
        let Some(record) = params.data.as_ref() else {
            return Outcome::Err(missing_payload::<M>());
        };
        if params.where_.is_empty() {
            return Outcome::Err(Error::validation(operation, "a where condition is required"));
        }
        let changed = update_columns(record, self.dialect.as_ref(), 1);
        if changed.is_empty() {
            return Outcome::Err(Error::validation(operation, "no changed columns to set"));
        }

        let mut qb = self.builder();
        qb.update(M::TABLE_NAME)
            .set(changed.into_iter().map(|c| (c.column, c.value)));
        apply_conditions(&mut qb, &params.where_);
        self.run_execute(cx, exec, &mut qb, "update").await
    }

    /// Delete the rows matching `params.where_`. Returns the number of rows
    /// affected. An empty filter is rejected before any statement runs.
    #[tracing::instrument(level = "debug", skip_all, fields(table = M::TABLE_NAME))]
    pub async fn delete<C: Connection>(
        &self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
        params: Params<M>,
    ) -> Outcome<u64, Error> {
        if params.where_.is_empty() {
            return Outcome::Err(Error::validation(
                format!("delete {}", M::TABLE_NAME),
                "a where condition is required",
            ));
        }
        let mut qb = self.builder();
        qb.delete(M::TABLE_NAME);
        apply_conditions(&mut qb, &params.where_);
        self.run_execute(cx, exec, &mut qb, "delete").await
    }

    /// Number of rows matching `params.where_`.
    #[tracing::instrument(level = "debug", skip_all, fields(table = M::TABLE_NAME))]
    pub async fn count<C: Connection>(
        &self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
        params: Params<M>,
    ) -> Outcome<u64, Error> {
        let mut qb = self.builder();
        qb.select(&["COUNT(*)"]).from(M::TABLE_NAME);
        apply_conditions(&mut qb, &params.where_);
        let rows = match qb.execute(cx, exec).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e.context("count", M::TABLE_NAME)),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let count = rows
            .first()
            .and_then(|row| row.get(0))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Outcome::Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn run_execute<C: Connection>(
        &self,
        cx: &Cx,
        exec: Executor<'_, '_, C>,
        qb: &mut QueryBuilder<'_>,
        verb: &str,
    ) -> Outcome<u64, Error> {
        let sql = qb.get_sql();
        let args = qb.params().to_vec();
        qb.reset();
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        tracing::debug!(sql = %sql, args = ?args, "executing statement");
        in_context(exec.execute(cx, &sql, &args).await, verb, M::TABLE_NAME)
    }
}
