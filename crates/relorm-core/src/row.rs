//! Result rows.

use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column names shared by every row of one result set.
#[derive(Debug, Clone, Default)]
pub struct RowColumns {
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
}

impl RowColumns {
    pub fn new(names: Vec<String>) -> Self {
        // Duplicate names keep the first position, matching how drivers
        // resolve `row.get("id")` on a joined result.
        let mut name_to_index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            name_to_index.entry(name.clone()).or_insert(i);
        }
        Self {
            names,
            name_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single row returned from a query.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<RowColumns>,
}

impl Row {
    /// Create a row with its own column metadata.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            values,
            columns: Arc::new(RowColumns::new(column_names)),
        }
    }

    /// Create a row sharing column metadata with its siblings.
    pub fn with_columns(columns: Arc<RowColumns>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let (names, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self::new(names, values)
    }

    pub fn columns(&self) -> Arc<RowColumns> {
        Arc::clone(&self.columns)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.index_of(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Iterate over `(column, value)` pairs in result order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.column_names().zip(self.values.iter())
    }
}
