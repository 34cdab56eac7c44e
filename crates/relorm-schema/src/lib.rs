//! Schema push and migration support for relorm.
//!
//! This crate provides:
//! - Table definitions derived from `Model` mapping tables
//! - Live introspection through the dialect's catalog queries
//! - Additive schema push (create missing tables, add missing columns and keys)
//! - Migration script rendering and timestamped file writing

pub mod introspect;
pub mod migrate;
pub mod push;
pub mod table;

pub use introspect::Introspector;
pub use migrate::{MigrationWriter, read_manifest, render_migration};
pub use push::SchemaPusher;
pub use table::{convert_type, snake_case, table_for, table_from_fields, table_name_for};

use relorm_core::{Dialect, Model};

/// CREATE TABLE and CREATE INDEX statements for a model type.
///
/// # Example
///
/// ```ignore
/// use relorm::{Model, Postgres, schema};
///
/// #[derive(Model)]
/// struct Hero {
///     #[relorm(column = "id", constraints = "primary key")]
///     id: i64,
///     #[relorm(column = "name", constraints = "not null")]
///     name: String,
/// }
///
/// for sql in schema::create_statements::<Hero>(&Postgres) {
///     println!("{sql};");
/// }
/// ```
pub fn create_statements<M: Model>(dialect: &dyn Dialect) -> Vec<String> {
    SchemaPusher::new(dialect).create_statements(&table_for::<M>(dialect))
}

#[cfg(test)]
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    asupersync::runtime::RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime")
        .block_on(future)
}
