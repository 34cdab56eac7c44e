//! Table definitions derived from record types.
//!
//! A record's mapping table carries everything needed for DDL: the column
//! type comes from the `type:`/`length:` annotations or the Rust type, and
//! the remaining annotations become column options and indexes. Columns named
//! `<ref>_id` are treated as references to `<ref>s(id)`.

use relorm_core::{Column, Constraints, Dialect, FieldInfo, ForeignKey, Index, Model, Table};

/// Build the table definition for `M`.
pub fn table_for<M: Model>(dialect: &dyn Dialect) -> Table {
    table_from_fields(M::TABLE_NAME, M::fields(), dialect)
}

/// Build a table definition from a mapping table.
///
/// Repeated column names keep their first declaration.
pub fn table_from_fields(name: &str, fields: &[FieldInfo], dialect: &dyn Dialect) -> Table {
    let mut table = Table {
        name: name.to_string(),
        ..Table::default()
    };

    for field in fields {
        if table.column(field.column).is_some() {
            tracing::trace!(table = name, column = field.column, "duplicate column skipped");
            continue;
        }
        let constraints = field.parsed_constraints();
        table.columns.push(Column {
            name: field.column.to_string(),
            sql_type: column_type(field, &constraints, dialect),
            options: column_options(field, &constraints),
        });

        if constraints.unique || constraints.index {
            push_index(&mut table.indexes, field.column, constraints.unique);
        }
        if let Some(target) = field.column.strip_suffix("_id").filter(|t| !t.is_empty()) {
            push_index(&mut table.indexes, field.column, false);
            table.foreign_keys.push(ForeignKey {
                name: format!("fk_{}_{}", name, target),
                column: field.column.to_string(),
                ref_table: format!("{}s", target),
                ref_column: "id".to_string(),
                options: vec!["ON DELETE CASCADE".to_string()],
            });
        }
    }
    table
}

/// Normalize a declared `type:` annotation.
pub fn convert_type(declared: &str) -> String {
    match declared.to_ascii_lowercase().as_str() {
        "serial" => "SERIAL".to_string(),
        "int" => "INTEGER".to_string(),
        "varchar" => "VARCHAR".to_string(),
        "text" => "TEXT".to_string(),
        "boolean" => "BOOLEAN".to_string(),
        "timestamp" => "TIMESTAMP".to_string(),
        _ => declared.to_ascii_uppercase(),
    }
}

/// `TeamMember` -> `team_member`.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if i > 0 && ch.is_ascii_uppercase() {
            out.push('_');
        }
        out.push(ch.to_ascii_lowercase());
    }
    out
}

/// Default table name for a record type: snake case plus `s`.
pub fn table_name_for(type_name: &str) -> String {
    format!("{}s", snake_case(type_name))
}

fn column_type(field: &FieldInfo, constraints: &Constraints, dialect: &dyn Dialect) -> String {
    match (&constraints.sql_type, constraints.length) {
        (Some(declared), Some(len)) => format!("{}({})", convert_type(declared), len),
        (Some(declared), None) => convert_type(declared),
        (None, Some(len)) => format!("varchar({})", len),
        (None, None) => dialect.sql_type(field.rust_type),
    }
}

fn column_options(field: &FieldInfo, constraints: &Constraints) -> Vec<String> {
    let mut options = Vec::new();
    if constraints.primary_key || field.primary_key {
        options.push("PRIMARY KEY".to_string());
    }
    if constraints.not_null {
        options.push("NOT NULL".to_string());
    }
    if let Some(default) = &constraints.default {
        options.push(format!("DEFAULT {}", default));
    }
    if let Some(check) = &constraints.check {
        options.push(format!("CHECK ({})", check));
    }
    options
}

fn push_index(indexes: &mut Vec<Index>, column: &str, unique: bool) {
    let name = format!("idx_{}", column);
    if indexes.iter().any(|i| i.name == name) {
        return;
    }
    indexes.push(Index {
        name,
        columns: vec![column.to_string()],
        unique,
    });
}
