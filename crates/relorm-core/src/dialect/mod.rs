//! SQL dialects.
//!
//! A [`Dialect`] supplies everything that differs between databases:
//! placeholder syntax, identifier quoting, the Rust-to-SQL type table,
//! catalog queries for introspection and DDL text. Nothing outside this
//! module branches on the database kind.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::Mysql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use crate::Result;
use crate::decode::Decode;
use crate::error::Error;
use crate::row::Row;
use crate::schema::{ColumnInfo, ForeignKey, Index, Table};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of supported databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DialectKind {
    Postgres,
    Mysql,
    Sqlite,
}

impl DialectKind {
    /// Canonical driver identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            DialectKind::Postgres => "pgx",
            DialectKind::Mysql => "mysql",
            DialectKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pgx" | "postgres" | "postgresql" => Ok(DialectKind::Postgres),
            "mysql" => Ok(DialectKind::Mysql),
            "sqlite" | "sqlite3" => Ok(DialectKind::Sqlite),
            other => Err(Error::config(format!("unsupported driver: {:?}", other))),
        }
    }
}

impl TryFrom<String> for DialectKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DialectKind> for String {
    fn from(kind: DialectKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Per-database SQL strategy.
///
/// Introspection is split into a catalog query and a row parser so the trait
/// stays object-safe; `relorm-schema` runs the queries.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn kind(&self) -> DialectKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Positional parameter marker for the 1-based `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Quote an identifier, doubling any embedded quote character.
    fn quote(&self, ident: &str) -> String;

    /// Whether `RETURNING` can be appended to INSERT/UPDATE/DELETE.
    fn supports_returning(&self) -> bool {
        false
    }

    /// Rust type name to SQL type, `Option` already peeled.
    fn type_map(&self) -> &'static [(&'static str, &'static str)];

    /// SQL column type for a Rust type as written in a record declaration.
    ///
    /// `Option<T>` maps like `T`; unknown types map to `text`.
    fn sql_type(&self, native: &str) -> String {
        let normalized = normalize_type(native);
        let map = self.type_map();
        let lookup = |name: &str| map.iter().find(|(k, _)| *k == name).map(|(_, v)| *v);
        lookup(&normalized)
            .or_else(|| {
                (!normalized.contains('<'))
                    .then(|| normalized.rsplit("::").next())
                    .flatten()
                    .and_then(lookup)
            })
            .unwrap_or("text")
            .to_string()
    }

    fn table_exists_query(&self, table: &str) -> (String, Vec<Value>);

    /// Read the single boolean-ish cell returned by `table_exists_query`.
    fn parse_table_exists(&self, rows: &[Row]) -> bool {
        rows.first()
            .and_then(|r| r.get(0))
            .and_then(bool::decode)
            .unwrap_or(false)
    }

    fn columns_query(&self, table: &str) -> (String, Vec<Value>);

    #[allow(clippy::result_large_err)]
    fn parse_column(&self, row: &Row) -> Result<ColumnInfo>;

    fn foreign_keys_query(&self, table: &str) -> (String, Vec<Value>);

    #[allow(clippy::result_large_err)]
    fn parse_foreign_key(&self, row: &Row) -> Result<ForeignKey>;

    fn create_table_sql(&self, table: &Table) -> String {
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let mut def = format!("{} {}", self.quote(&c.name), c.sql_type);
                for opt in &c.options {
                    def.push(' ');
                    def.push_str(opt);
                }
                def
            })
            .collect();
        parts.extend(
            table
                .foreign_keys
                .iter()
                .map(|fk| format!("CONSTRAINT {} {}", self.quote(&fk.name), self.fk_clause(fk))),
        );
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            self.quote(&table.name),
            parts.join(",\n  ")
        )
    }

    fn create_index_sql(&self, table: &str, index: &Index) -> String {
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote(&index.name),
            self.quote(table),
            self.quote_list(&index.columns)
        )
    }

    fn add_column_sql(&self, table: &str, column: &str, info: &ColumnInfo) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} {}{}",
            self.quote(table),
            self.quote(column),
            info.sql_type,
            info.options_sql()
        )
    }

    /// `None` when the database cannot change a column in place.
    fn modify_column_sql(&self, table: &str, column: &str, info: &ColumnInfo) -> Option<String>;

    /// `None` when the database cannot add a constraint to an existing table.
    fn add_foreign_key_sql(&self, table: &str, fk: &ForeignKey) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {}",
            self.quote(table),
            self.quote(&fk.name),
            self.fk_clause(fk)
        ))
    }

    fn drop_foreign_key_sql(&self, table: &str, fk: &ForeignKey) -> Option<String>;

    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote(table))
    }

    fn drop_index_sql(&self, _table: &str, index: &str) -> String {
        format!("DROP INDEX IF EXISTS {}", self.quote(index))
    }

    /// `FOREIGN KEY (c) REFERENCES t (r) <options>`
    fn fk_clause(&self, fk: &ForeignKey) -> String {
        let mut clause = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote(&fk.column),
            self.quote(&fk.ref_table),
            self.quote(&fk.ref_column)
        );
        for opt in &fk.options {
            clause.push(' ');
            clause.push_str(opt);
        }
        clause
    }

    fn quote_list(&self, idents: &[String]) -> String {
        idents
            .iter()
            .map(|i| self.quote(i))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Capability check used by the builder.
pub fn supports_returning(dialect: &dyn Dialect) -> bool {
    dialect.supports_returning()
}

/// Construct the dialect for a kind.
pub fn dialect_for(kind: DialectKind) -> Box<dyn Dialect> {
    match kind {
        DialectKind::Postgres => Box::new(Postgres),
        DialectKind::Mysql => Box::new(Mysql),
        DialectKind::Sqlite => Box::new(Sqlite),
    }
}

/// Construct the dialect for a driver identifier such as `"pgx"` or `"sqlite3"`.
#[allow(clippy::result_large_err)]
pub fn dialect_from_name(name: &str) -> Result<Box<dyn Dialect>> {
    name.parse().map(dialect_for)
}

/// Strip whitespace and any `Option<...>` wrappers.
fn normalize_type(native: &str) -> String {
    let mut ty: String = native.chars().filter(|c| !c.is_whitespace()).collect();
    loop {
        let inner = ["Option<", "std::option::Option<", "core::option::Option<"]
            .iter()
            .find_map(|p| ty.strip_prefix(p).and_then(|r| r.strip_suffix('>')));
        match inner {
            Some(i) => ty = i.to_string(),
            None => return ty,
        }
    }
}

fn quote_with(ident: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    format!(
        "{q}{}{q}",
        ident.replace(quote, &doubled),
        q = quote
    )
}

/// Read a catalog text column, tolerating bytes and NULL.
fn text(row: &Row, column: &str) -> Option<String> {
    row.get_by_name(column)
        .and_then(|v| Option::<String>::decode(v))
        .flatten()
}

fn required_text(row: &Row, column: &str) -> Result<String> {
    text(row, column).ok_or_else(|| {
        Error::Schema(crate::error::SchemaError {
            kind: crate::error::SchemaErrorKind::Introspection,
            message: format!("catalog row is missing '{}'", column),
            source: None,
        })
    })
}
