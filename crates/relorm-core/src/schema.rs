//! Table and migration model shared by the dialects and the schema tool.

use serde::{Deserialize, Serialize};

/// A column as declared by a record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub sql_type: String,
    /// Rendered options, e.g. `["PRIMARY KEY", "NOT NULL"]`
    pub options: Vec<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            options: Vec::new(),
        }
    }

    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.options.iter().any(|o| o == "PRIMARY KEY")
    }

    /// Live-schema view of this column, used when adding it to a table.
    pub fn to_info(&self) -> ColumnInfo {
        let mut extra = Vec::new();
        let mut default = None;
        let mut nullable = true;
        for option in &self.options {
            if option == "NOT NULL" {
                nullable = false;
            } else if let Some(v) = option.strip_prefix("DEFAULT ") {
                default = Some(v.to_string());
            } else {
                extra.push(option.as_str());
            }
        }
        ColumnInfo {
            name: self.name.clone(),
            sql_type: self.sql_type.clone(),
            is_nullable: nullable,
            default,
            extra: (!extra.is_empty()).then(|| extra.join(" ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
    /// Trailing clauses, e.g. `["ON DELETE CASCADE"]`
    pub options: Vec<String>,
}

/// A column as reported by the live database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: String,
    pub is_nullable: bool,
    pub default: Option<String>,
    pub extra: Option<String>,
}

impl ColumnInfo {
    /// Options rendered after the type in ADD/MODIFY COLUMN.
    pub fn options_sql(&self) -> String {
        let mut opts = Vec::new();
        if !self.is_nullable {
            opts.push("NOT NULL".to_string());
        }
        if let Some(d) = self.default.as_deref().filter(|d| !d.is_empty()) {
            opts.push(format!("DEFAULT {}", d));
        }
        if let Some(e) = self.extra.as_deref().filter(|e| !e.is_empty()) {
            opts.push(e.to_string());
        }
        if opts.is_empty() {
            String::new()
        } else {
            format!(" {}", opts.join(" "))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOrder {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Everything needed to render one migration script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    pub name: String,
    pub timestamp: String,
    pub tables: Vec<Table>,
    /// Tables in the order they must be dropped on rollback
    pub drop_order: Vec<String>,
    pub index_order: Vec<IndexOrder>,
}

impl Migration {
    /// Build a migration; tables drop in reverse creation order.
    pub fn from_tables(
        name: impl Into<String>,
        timestamp: impl Into<String>,
        tables: Vec<Table>,
    ) -> Self {
        let drop_order = tables.iter().rev().map(|t| t.name.clone()).collect();
        let index_order = tables
            .iter()
            .flat_map(|t| {
                t.indexes.iter().map(|i| IndexOrder {
                    name: i.name.clone(),
                    table: t.name.clone(),
                    columns: i.columns.clone(),
                    unique: i.unique,
                })
            })
            .collect();
        Self {
            name: name.into(),
            timestamp: timestamp.into(),
            tables,
            drop_order,
            index_order,
        }
    }
}
