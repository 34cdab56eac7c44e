//! Model trait for record-to-table mapping.
//!
//! The `Model` trait is the compile-time mapping table for one record type:
//! its table, its mapped fields and the glue to move values in and out of
//! rows. It is normally derived with `#[derive(Model)]` from `relorm-macros`.

use crate::Result;
use crate::field::FieldInfo;
use crate::relationship::Relations;
use crate::row::Row;
use crate::value::Value;

/// Trait for types that can be mapped to database tables.
///
/// # Example
///
/// ```ignore
/// use relorm::Model;
///
/// #[derive(Model, Debug, Clone, Default)]
/// #[relorm(table = "users")]
/// struct User {
///     #[relorm(column = "id", constraints = "primary key,auto_increment")]
///     id: i64,
///     #[relorm(column = "email", constraints = "unique,not null")]
///     email: String,
///     #[relorm(has_many(target = Post, foreign_key = "user_id", references = "id"))]
///     posts: Vec<Post>,
/// }
/// ```
pub trait Model: Sized + Send + Sync + 'static {
    /// The name of the database table.
    const TABLE_NAME: &'static str;

    /// The primary key column.
    const PRIMARY_KEY: &'static str;

    /// Mapping table of all column-mapped fields, in declaration order.
    fn fields() -> &'static [FieldInfo];

    /// Every mapped column with its current value, in field order.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Mapped columns whose field does not hold its type's zero value.
    fn changed_row(&self) -> Vec<(&'static str, Value)>;

    /// Decode a record from a result row.
    ///
    /// Decoding is lenient: unmatched columns are ignored and fields whose
    /// value cannot be coerced keep their default.
    #[allow(clippy::result_large_err)]
    fn from_row(row: &Row) -> Result<Self>;

    /// Store a database-generated primary key.
    fn set_generated_id(&mut self, id: i64);

    /// Register this type's relations. Called once per registry.
    fn register_relations(_relations: &mut Relations<Self>) {}

    /// Current value of a mapped column, if the column is mapped.
    fn column_value(&self, column: &str) -> Option<Value> {
        self.to_row()
            .into_iter()
            .find_map(|(c, v)| (c == column).then_some(v))
    }

    /// All mapped column names, in field order.
    fn columns() -> Vec<&'static str> {
        Self::fields().iter().map(|f| f.column).collect()
    }

    /// Mapping entry for a column.
    fn field_for_column(column: &str) -> Option<&'static FieldInfo> {
        Self::fields().iter().find(|f| f.column == column)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-written models for unit tests in this crate.

    use super::*;
    use crate::decode;
    use crate::encode::ZeroValue;
    use crate::relationship::{Loaded, Relation};

    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Author {
        pub id: i64,
        pub name: String,
        pub books: Vec<Book>,
        pub bio: Option<Bio>,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Book {
        pub id: i64,
        pub author_id: i64,
        pub title: String,
        pub author: Option<Author>,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Bio {
        pub author_id: i64,
        pub text: String,
    }

    static AUTHOR_FIELDS: &[FieldInfo] = &[
        FieldInfo::new("id", "id", "i64")
            .constraints("primary key,auto_increment")
            .primary_key(true)
            .auto_increment(true),
        FieldInfo::new("name", "name", "String").constraints("not null"),
    ];

    static BOOK_FIELDS: &[FieldInfo] = &[
        FieldInfo::new("id", "id", "i64")
            .constraints("primary key,auto_increment")
            .primary_key(true)
            .auto_increment(true),
        FieldInfo::new("author_id", "author_id", "i64"),
        FieldInfo::new("title", "title", "String"),
    ];

    static BIO_FIELDS: &[FieldInfo] = &[
        FieldInfo::new("author_id", "author_id", "i64").primary_key(true),
        FieldInfo::new("text", "text", "String"),
    ];

    impl Model for Author {
        const TABLE_NAME: &'static str = "authors";
        const PRIMARY_KEY: &'static str = "id";

        fn fields() -> &'static [FieldInfo] {
            AUTHOR_FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![("id", Value::from(self.id)), ("name", Value::from(&self.name))]
        }

        fn changed_row(&self) -> Vec<(&'static str, Value)> {
            let mut row = Vec::new();
            if !self.id.is_zero_value() {
                row.push(("id", Value::from(self.id)));
            }
            if !self.name.is_zero_value() {
                row.push(("name", Value::from(&self.name)));
            }
            row
        }

        fn from_row(row: &Row) -> Result<Self> {
            let mapped = decode::mapped_row::<Self>(row);
            Ok(Self {
                id: decode::field(&mapped, "id"),
                name: decode::field(&mapped, "name"),
                books: Vec::new(),
                bio: decode::nested(row, "bios", &Self::columns()),
            })
        }

        fn set_generated_id(&mut self, id: i64) {
            self.id = id;
        }

        fn register_relations(relations: &mut Relations<Self>) {
            relations.register(Relation::<Self, Book>::has_many(
                "books",
                "author_id",
                "id",
                |a, loaded| {
                    if let Loaded::Many(v) = loaded {
                        a.books = v;
                    }
                },
            ));
            relations.register(Relation::<Self, Bio>::has_one(
                "bio",
                "author_id",
                "id",
                |a, loaded| {
                    if let Loaded::One(v) = loaded {
                        a.bio = v;
                    }
                },
            ));
        }
    }

    impl Model for Book {
        const TABLE_NAME: &'static str = "books";
        const PRIMARY_KEY: &'static str = "id";

        fn fields() -> &'static [FieldInfo] {
            BOOK_FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("id", Value::from(self.id)),
                ("author_id", Value::from(self.author_id)),
                ("title", Value::from(&self.title)),
            ]
        }

        fn changed_row(&self) -> Vec<(&'static str, Value)> {
            self.to_row()
                .into_iter()
                .filter(|(_, v)| !v.is_zero())
                .collect()
        }

        fn from_row(row: &Row) -> Result<Self> {
            let mapped = decode::mapped_row::<Self>(row);
            Ok(Self {
                id: decode::field(&mapped, "id"),
                author_id: decode::field(&mapped, "author_id"),
                title: decode::field(&mapped, "title"),
                author: None,
            })
        }

        fn set_generated_id(&mut self, id: i64) {
            self.id = id;
        }

        fn register_relations(relations: &mut Relations<Self>) {
            relations.register(Relation::<Self, Author>::belongs_to(
                "author",
                "author_id",
                "id",
                |b, loaded| {
                    if let Loaded::One(v) = loaded {
                        b.author = v;
                    }
                },
            ));
        }
    }

    impl Model for Bio {
        const TABLE_NAME: &'static str = "bios";
        const PRIMARY_KEY: &'static str = "author_id";

        fn fields() -> &'static [FieldInfo] {
            BIO_FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("author_id", Value::from(self.author_id)),
                ("text", Value::from(&self.text)),
            ]
        }

        fn changed_row(&self) -> Vec<(&'static str, Value)> {
            self.to_row()
                .into_iter()
                .filter(|(_, v)| !v.is_zero())
                .collect()
        }

        fn from_row(row: &Row) -> Result<Self> {
            let mapped = decode::mapped_row::<Self>(row);
            Ok(Self {
                author_id: decode::field(&mapped, "author_id"),
                text: decode::field(&mapped, "text"),
            })
        }

        fn set_generated_id(&mut self, id: i64) {
            self.author_id = id;
        }
    }
}
