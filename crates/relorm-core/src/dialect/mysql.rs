//! MySQL dialect.

use super::{Dialect, DialectKind, quote_with, required_text, text};
use crate::Result;
use crate::row::Row;
use crate::schema::{ColumnInfo, ForeignKey, Index};
use crate::value::Value;

const TYPES: &[(&str, &str)] = &[
    ("String", "varchar(255)"),
    ("&str", "varchar(255)"),
    ("i16", "smallint"),
    ("i32", "int"),
    ("u32", "int unsigned"),
    ("i64", "bigint"),
    ("bool", "tinyint(1)"),
    ("f32", "float"),
    ("f64", "double"),
    ("Vec<u8>", "blob"),
    ("[u8;16]", "binary(16)"),
    ("serde_json::Value", "json"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Mysql;

impl Dialect for Mysql {
    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn quote(&self, ident: &str) -> String {
        quote_with(ident, '`')
    }

    fn type_map(&self) -> &'static [(&'static str, &'static str)] {
        TYPES
    }

    fn table_exists_query(&self, table: &str) -> (String, Vec<Value>) {
        (
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?"
                .to_string(),
            vec![Value::from(table)],
        )
    }

    // information_schema reports upper-case column names on MySQL 8, hence the aliases
    fn columns_query(&self, table: &str) -> (String, Vec<Value>) {
        (
            "SELECT COLUMN_NAME AS column_name, COLUMN_TYPE AS column_type, \
             IS_NULLABLE AS is_nullable, COLUMN_DEFAULT AS column_default, EXTRA AS extra \
             FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? \
             ORDER BY ordinal_position"
                .to_string(),
            vec![Value::from(table)],
        )
    }

    fn parse_column(&self, row: &Row) -> Result<ColumnInfo> {
        Ok(ColumnInfo {
            name: required_text(row, "column_name")?,
            sql_type: required_text(row, "column_type")?,
            is_nullable: text(row, "is_nullable").is_some_and(|v| v.eq_ignore_ascii_case("YES")),
            default: text(row, "column_default"),
            extra: text(row, "extra").filter(|e| !e.is_empty()),
        })
    }

    fn foreign_keys_query(&self, table: &str) -> (String, Vec<Value>) {
        (
            "SELECT kcu.CONSTRAINT_NAME AS constraint_name, kcu.COLUMN_NAME AS column_name, \
             kcu.REFERENCED_TABLE_NAME AS referenced_table_name, \
             kcu.REFERENCED_COLUMN_NAME AS referenced_column_name, \
             rc.DELETE_RULE AS delete_rule \
             FROM information_schema.key_column_usage AS kcu \
             JOIN information_schema.referential_constraints AS rc \
               ON rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
              AND rc.CONSTRAINT_SCHEMA = kcu.TABLE_SCHEMA \
             WHERE kcu.TABLE_SCHEMA = DATABASE() AND kcu.TABLE_NAME = ? \
               AND kcu.REFERENCED_TABLE_NAME IS NOT NULL"
                .to_string(),
            vec![Value::from(table)],
        )
    }

    fn parse_foreign_key(&self, row: &Row) -> Result<ForeignKey> {
        Ok(ForeignKey {
            name: required_text(row, "constraint_name")?,
            column: required_text(row, "column_name")?,
            ref_table: required_text(row, "referenced_table_name")?,
            ref_column: required_text(row, "referenced_column_name")?,
            options: text(row, "delete_rule")
                .filter(|r| !r.eq_ignore_ascii_case("NO ACTION") && !r.eq_ignore_ascii_case("RESTRICT"))
                .map(|r| vec![format!("ON DELETE {}", r)])
                .unwrap_or_default(),
        })
    }

    // CREATE INDEX has no IF NOT EXISTS on MySQL
    fn create_index_sql(&self, table: &str, index: &Index) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote(&index.name),
            self.quote(table),
            self.quote_list(&index.columns)
        )
    }

    fn modify_column_sql(&self, table: &str, column: &str, info: &ColumnInfo) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} MODIFY COLUMN {} {}{}",
            self.quote(table),
            self.quote(column),
            info.sql_type,
            info.options_sql()
        ))
    }

    fn drop_foreign_key_sql(&self, table: &str, fk: &ForeignKey) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.quote(table),
            self.quote(&fk.name)
        ))
    }

    fn drop_index_sql(&self, table: &str, index: &str) -> String {
        format!("DROP INDEX {} ON {}", self.quote(index), self.quote(table))
    }
}
