//! SQLite dialect.
//!
//! SQLite cannot alter columns or constraints of an existing table, so the
//! corresponding emitters return `None` and schema push skips them.

use super::{Dialect, DialectKind, quote_with, required_text, text};
use crate::Result;
use crate::decode::Decode;
use crate::row::Row;
use crate::schema::{ColumnInfo, ForeignKey};
use crate::value::Value;

const TYPES: &[(&str, &str)] = &[
    ("String", "varchar(255)"),
    ("&str", "varchar(255)"),
    ("i16", "integer"),
    ("i32", "integer"),
    ("u32", "integer"),
    ("i64", "bigint"),
    ("bool", "boolean"),
    ("f32", "real"),
    ("f64", "double"),
    ("Vec<u8>", "blob"),
    ("[u8;16]", "blob"),
    ("serde_json::Value", "text"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn quote(&self, ident: &str) -> String {
        quote_with(ident, '"')
    }

    fn type_map(&self) -> &'static [(&'static str, &'static str)] {
        TYPES
    }

    fn table_exists_query(&self, table: &str) -> (String, Vec<Value>) {
        (
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?".to_string(),
            vec![Value::from(table)],
        )
    }

    fn columns_query(&self, table: &str) -> (String, Vec<Value>) {
        (
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?)".to_string(),
            vec![Value::from(table)],
        )
    }

    fn parse_column(&self, row: &Row) -> Result<ColumnInfo> {
        let flag = |column: &str| {
            row.get_by_name(column)
                .and_then(i64::decode)
                .is_some_and(|v| v != 0)
        };
        Ok(ColumnInfo {
            name: required_text(row, "name")?,
            sql_type: text(row, "type").unwrap_or_default(),
            is_nullable: !flag("notnull"),
            default: text(row, "dflt_value"),
            extra: flag("pk").then(|| "PRIMARY KEY".to_string()),
        })
    }

    fn foreign_keys_query(&self, table: &str) -> (String, Vec<Value>) {
        (
            "SELECT \"table\", \"from\", \"to\", on_delete FROM pragma_foreign_key_list(?)"
                .to_string(),
            vec![Value::from(table)],
        )
    }

    // SQLite does not name foreign keys; the name is synthesized from the column
    fn parse_foreign_key(&self, row: &Row) -> Result<ForeignKey> {
        let column = required_text(row, "from")?;
        let ref_table = required_text(row, "table")?;
        Ok(ForeignKey {
            name: format!("fk_{}_{}", ref_table, column),
            column,
            ref_table,
            ref_column: text(row, "to").unwrap_or_else(|| "id".to_string()),
            options: text(row, "on_delete")
                .filter(|r| !r.eq_ignore_ascii_case("NO ACTION"))
                .map(|r| vec![format!("ON DELETE {}", r)])
                .unwrap_or_default(),
        })
    }

    fn modify_column_sql(&self, _table: &str, _column: &str, _info: &ColumnInfo) -> Option<String> {
        None
    }

    fn add_foreign_key_sql(&self, _table: &str, _fk: &ForeignKey) -> Option<String> {
        None
    }

    fn drop_foreign_key_sql(&self, _table: &str, _fk: &ForeignKey) -> Option<String> {
        None
    }
}
