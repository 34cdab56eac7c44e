//! Batched relation loading.
//!
//! Each requested include costs exactly one query, whatever the number of
//! parents: the parents' keys are collected into one `IN (...)` set and the
//! fetched rows are stitched back onto the parents by key.

use crate::condition::{Include, in_list, render_conditions};
use asupersync::{Cx, Outcome};
use indexmap::IndexMap;
use relorm_core::{
    Connection, Dialect, Error, Executor, Model, RelationLink, Relations, Result, Value,
};

/// Statement text and arguments for one relation lookup.
///
/// Fails before building anything when the include names a column the
/// target does not map.
#[allow(clippy::result_large_err)]
pub fn relation_query<P>(
    link: &dyn RelationLink<P>,
    include: &Include,
    keys: Vec<Value>,
    dialect: &dyn Dialect,
) -> Result<(String, Vec<Value>)> {
    include.check_columns(link.name(), &link.target_columns())?;
    let lookup = link.lookup_column();
    let mut columns: Vec<String> = if include.select.is_empty() {
        link.target_columns().into_iter().map(str::to_string).collect()
    } else {
        include.select.iter().cloned().collect()
    };
    // Stitching needs the lookup column back
    if !columns.iter().any(|c| c == lookup) {
        columns.push(lookup.to_string());
    }

    let (filter, mut args, next) = render_conditions(&include.where_, dialect, 1);
    let (membership, _) = in_list(lookup, keys.iter().cloned()).render(dialect, next);
    args.extend(keys);

    let mut sql = format!(
        "SELECT {} FROM {} WHERE ",
        columns.join(", "),
        link.target_table()
    );
    if !filter.is_empty() {
        sql.push_str(&format!("({}) AND ", filter));
    }
    sql.push_str(&membership);
    if !include.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&include.order_by.join(", "));
    }
    if let Some(limit) = include.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = include.offset {
        sql.push_str(&format!(" OFFSET {}", offset));
    }
    sql.push(';');
    Ok((sql, args))
}

/// Load every requested relation onto `parents`, in request order.
///
/// Unknown relation names are skipped. A failing relation aborts the
/// remaining ones and is reported with its name.
#[tracing::instrument(level = "debug", skip_all, fields(table = P::TABLE_NAME, parents = parents.len()))]
pub async fn load_relations<P: Model, C: Connection>(
    cx: &Cx,
    exec: Executor<'_, '_, C>,
    dialect: &dyn Dialect,
    relations: &Relations<P>,
    parents: &mut [P],
    includes: &IndexMap<String, Include>,
) -> Outcome<(), Error> {
    if parents.is_empty() {
        return Outcome::Ok(());
    }
    for (name, include) in includes {
        let Some(link) = relations.get(name) else {
            tracing::debug!(relation = %name, table = P::TABLE_NAME, "relation not registered, skipped");
            continue;
        };
        let keys = link.keys(parents);
        if keys.is_empty() {
            tracing::debug!(relation = %name, "no parent keys, nothing to load");
            continue;
        }

        let (sql, args) = match relation_query(link, include, keys, dialect) {
            Ok(query) => query,
            Err(e) => return Outcome::Err(e.in_relation(name)),
        };
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        tracing::debug!(relation = %name, sql = %sql, args = ?args, "loading relation");

        let rows = match exec.query(cx, &sql, &args).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e.in_relation(name)),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        match link.attach(parents, rows) {
            Ok(fetched) => tracing::trace!(relation = %name, fetched, "relation attached"),
            Err(e) => return Outcome::Err(e.in_relation(name)),
        }
    }
    Outcome::Ok(())
}
