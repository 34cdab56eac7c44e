//! Record to statement-argument encoding.

use crate::dialect::Dialect;
use crate::model::Model;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// Whether a field holds its type's zero value.
///
/// Updates only write fields that are not zero, so a partially populated
/// record sets exactly the columns the caller filled in.
pub trait ZeroValue {
    fn is_zero_value(&self) -> bool;
}

macro_rules! impl_zero_numeric {
    ($($ty:ty),*) => {
        $(
            impl ZeroValue for $ty {
                #[allow(clippy::float_cmp)]
                fn is_zero_value(&self) -> bool {
                    *self == (0 as $ty)
                }
            }
        )*
    };
}

impl_zero_numeric!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl ZeroValue for bool {
    fn is_zero_value(&self) -> bool {
        !*self
    }
}

impl ZeroValue for String {
    fn is_zero_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> ZeroValue for Vec<T> {
    fn is_zero_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> ZeroValue for HashMap<K, V, S> {
    fn is_zero_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> ZeroValue for BTreeMap<K, V> {
    fn is_zero_value(&self) -> bool {
        self.is_empty()
    }
}

/// Only `None` is zero; `Some(0)` is an explicit value.
impl<T> ZeroValue for Option<T> {
    fn is_zero_value(&self) -> bool {
        self.is_none()
    }
}

impl ZeroValue for [u8; 16] {
    fn is_zero_value(&self) -> bool {
        self.iter().all(|b| *b == 0)
    }
}

impl ZeroValue for serde_json::Value {
    fn is_zero_value(&self) -> bool {
        self.is_null()
    }
}

impl ZeroValue for Value {
    fn is_zero_value(&self) -> bool {
        self.is_zero()
    }
}

/// One encoded column: name, placeholder text and bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedColumn {
    pub column: &'static str,
    pub placeholder: String,
    pub value: Value,
}

/// Columns for an INSERT, in field order, numbered from 1.
///
/// Auto-increment fields are left to the database.
pub fn insert_columns<M: Model>(model: &M, dialect: &dyn Dialect) -> Vec<EncodedColumn> {
    let skip: Vec<&str> = M::fields()
        .iter()
        .filter(|f| f.auto_increment)
        .map(|f| f.column)
        .collect();
    number(
        model
            .to_row()
            .into_iter()
            .filter(|(c, _)| !skip.contains(c)),
        dialect,
        1,
    )
}

/// Columns for an UPDATE's SET list, numbered from `start`.
///
/// Only fields holding a non-zero value are included. Auto-increment fields
/// are never rewritten.
pub fn update_columns<M: Model>(
    model: &M,
    dialect: &dyn Dialect,
    start: usize,
) -> Vec<EncodedColumn> {
    let skip: Vec<&str> = M::fields()
        .iter()
        .filter(|f| f.auto_increment)
        .map(|f| f.column)
        .collect();
    number(
        model
            .changed_row()
            .into_iter()
            .filter(|(c, _)| !skip.contains(c)),
        dialect,
        start,
    )
}

fn number(
    pairs: impl Iterator<Item = (&'static str, Value)>,
    dialect: &dyn Dialect,
    start: usize,
) -> Vec<EncodedColumn> {
    pairs
        .enumerate()
        .map(|(i, (column, value))| EncodedColumn {
            column,
            placeholder: dialect.placeholder(start + i),
            value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Postgres, Sqlite};
    use crate::model::fixtures::{Author, Book};

    #[test]
    fn zero_values() {
        assert!(0_i64.is_zero_value());
        assert!(String::new().is_zero_value());
        assert!(!true.is_zero_value());
        assert!(Vec::<u8>::new().is_zero_value());
        assert!(None::<i64>.is_zero_value());
        assert!(!Some(0_i64).is_zero_value());
        assert!(0.0_f64.is_zero_value());
    }

    #[test]
    fn insert_skips_auto_increment() {
        let book = Book {
            id: 9,
            author_id: 1,
            title: "Dune".into(),
            author: None,
        };
        let cols = insert_columns(&book, &Postgres);
        let names: Vec<_> = cols.iter().map(|c| c.column).collect();
        assert_eq!(names, vec!["author_id", "title"]);
        assert_eq!(cols[0].placeholder, "$1");
        assert_eq!(cols[1].placeholder, "$2");
        assert_eq!(cols[1].value, Value::Text("Dune".into()));
    }

    #[test]
    fn update_sets_only_changed_fields() {
        let author = Author {
            name: "New name".into(),
            ..Default::default()
        };
        let cols = update_columns(&author, &Postgres, 1);
        assert_eq!(cols.len(), 1);
        assert_eq!(cols[0].column, "name");
        assert_eq!(cols[0].placeholder, "$1");
    }

    #[test]
    fn update_numbering_starts_where_asked() {
        let book = Book {
            title: "t".into(),
            author_id: 4,
            ..Default::default()
        };
        let cols = update_columns(&book, &Postgres, 3);
        let ph: Vec<_> = cols.iter().map(|c| c.placeholder.as_str()).collect();
        assert_eq!(ph, vec!["$3", "$4"]);
        let cols = update_columns(&book, &Sqlite, 3);
        assert!(cols.iter().all(|c| c.placeholder == "?"));
    }
}
