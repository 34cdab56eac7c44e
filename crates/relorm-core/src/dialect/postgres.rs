//! PostgreSQL dialect.

use super::{Dialect, DialectKind, quote_with, required_text, text};
use crate::Result;
use crate::row::Row;
use crate::schema::{ColumnInfo, ForeignKey};
use crate::value::Value;

const TYPES: &[(&str, &str)] = &[
    ("String", "varchar(255)"),
    ("&str", "varchar(255)"),
    ("i16", "smallint"),
    ("i32", "integer"),
    ("u32", "bigint"),
    ("i64", "bigint"),
    ("bool", "boolean"),
    ("f32", "real"),
    ("f64", "double precision"),
    ("Vec<u8>", "bytea"),
    ("[u8;16]", "uuid"),
    ("serde_json::Value", "jsonb"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn quote(&self, ident: &str) -> String {
        quote_with(ident, '"')
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn type_map(&self) -> &'static [(&'static str, &'static str)] {
        TYPES
    }

    fn table_exists_query(&self, table: &str) -> (String, Vec<Value>) {
        (
            "SELECT EXISTS (SELECT 1 FROM pg_tables WHERE schemaname = 'public' AND tablename = $1)"
                .to_string(),
            vec![Value::from(table)],
        )
    }

    fn columns_query(&self, table: &str) -> (String, Vec<Value>) {
        (
            "SELECT column_name, data_type AS column_type, is_nullable, column_default, \
             CASE WHEN is_identity = 'YES' THEN 'GENERATED BY DEFAULT AS IDENTITY' ELSE '' END AS extra \
             FROM information_schema.columns \
             WHERE table_name = $1 AND table_schema = 'public' \
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
            "SELECT tc.constraint_name, kcu.column_name, \
             ccu.table_name AS referenced_table_name, ccu.column_name AS referenced_column_name, \
             rc.delete_rule \
             FROM information_schema.table_constraints AS tc \
             JOIN information_schema.key_column_usage AS kcu \
               ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
             JOIN information_schema.constraint_column_usage AS ccu \
               ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema \
             JOIN information_schema.referential_constraints AS rc \
               ON rc.constraint_name = tc.constraint_name AND rc.constraint_schema = tc.table_schema \
             WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_name = $1"
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
                .filter(|r| !r.eq_ignore_ascii_case("NO ACTION"))
                .map(|r| vec![format!("ON DELETE {}", r)])
                .unwrap_or_default(),
        })
    }

    fn modify_column_sql(&self, table: &str, column: &str, info: &ColumnInfo) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
            self.quote(table),
            self.quote(column),
            info.sql_type
        ))
    }

    fn drop_foreign_key_sql(&self, table: &str, fk: &ForeignKey) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote(table),
            self.quote(&fk.name)
        ))
    }
}
