//! Relation descriptors and result stitching.
//!
//! A [`Relation`] is a typed descriptor for one related record type. The
//! [`Relations`] registry erases the child type behind [`RelationLink`] so a
//! parent type can look relations up by name, which is only needed where
//! includes arrive as external input. The loader in `relorm-query` builds and
//! runs the one batched query per relation; grouping and assignment happen
//! here.

use crate::Result;
use crate::model::Model;
use crate::row::Row;
use crate::value::{Value, ValueKey};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;

/// Cardinality of a relation, seen from the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Child rows carry the parent's key; at most one is kept per parent.
    HasOne,
    /// Child rows carry the parent's key; all are kept.
    HasMany,
    /// The parent carries the target's key.
    BelongsTo,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelationKind::HasOne => "has_one",
            RelationKind::HasMany => "has_many",
            RelationKind::BelongsTo => "belongs_to",
        })
    }
}

/// Records loaded for one parent.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<C> {
    Many(Vec<C>),
    One(Option<C>),
}

/// Typed descriptor for a relation from `P` to `C`.
///
/// For `HasOne`/`HasMany`, `foreign_key` is a column of `C` holding the value
/// of the parent's `references` column. For `BelongsTo`, `foreign_key` is a
/// column of `P` holding the value of the target's `references` column.
pub struct Relation<P, C> {
    name: &'static str,
    kind: RelationKind,
    foreign_key: &'static str,
    references: &'static str,
    assign: fn(&mut P, Loaded<C>),
    _marker: PhantomData<fn() -> C>,
}

impl<P, C> Relation<P, C> {
    pub fn new(
        name: &'static str,
        kind: RelationKind,
        foreign_key: &'static str,
        references: &'static str,
        assign: fn(&mut P, Loaded<C>),
    ) -> Self {
        Self {
            name,
            kind,
            foreign_key,
            references,
            assign,
            _marker: PhantomData,
        }
    }

    pub fn has_one(
        name: &'static str,
        foreign_key: &'static str,
        references: &'static str,
        assign: fn(&mut P, Loaded<C>),
    ) -> Self {
        Self::new(name, RelationKind::HasOne, foreign_key, references, assign)
    }

    pub fn has_many(
        name: &'static str,
        foreign_key: &'static str,
        references: &'static str,
        assign: fn(&mut P, Loaded<C>),
    ) -> Self {
        Self::new(name, RelationKind::HasMany, foreign_key, references, assign)
    }

    pub fn belongs_to(
        name: &'static str,
        foreign_key: &'static str,
        references: &'static str,
        assign: fn(&mut P, Loaded<C>),
    ) -> Self {
        Self::new(name, RelationKind::BelongsTo, foreign_key, references, assign)
    }

    pub fn foreign_key(&self) -> &'static str {
        self.foreign_key
    }

    pub fn references(&self) -> &'static str {
        self.references
    }

    /// The child column matched against the parent key.
    fn child_key_column(&self) -> &'static str {
        match self.kind {
            RelationKind::HasOne | RelationKind::HasMany => self.foreign_key,
            RelationKind::BelongsTo => self.references,
        }
    }
}

impl<P, C> fmt::Debug for Relation<P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("foreign_key", &self.foreign_key)
            .field("references", &self.references)
            .finish_non_exhaustive()
    }
}

/// Operations the loader needs from a relation, with the child type erased.
pub trait RelationLink<P>: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> RelationKind;
    fn target_table(&self) -> &'static str;
    fn target_columns(&self) -> Vec<&'static str>;

    /// The parent column whose value identifies a parent in the result.
    /// A parent query that projects columns must include it.
    fn parent_key_column(&self) -> &'static str;

    /// Target column filtered by the batched `IN (...)` predicate.
    fn lookup_column(&self) -> &'static str;

    /// Values for the `IN (...)` set, taken from the parents.
    ///
    /// Parents without a usable key are skipped. `BelongsTo` deduplicates,
    /// keeping first-seen order.
    fn keys(&self, parents: &[P]) -> Vec<Value>;

    /// Decode fetched rows and assign them onto the parents.
    ///
    /// Every parent is assigned, so one without matches gets an empty
    /// collection or `None`. Returns the number of rows decoded.
    #[allow(clippy::result_large_err)]
    fn attach(&self, parents: &mut [P], rows: Vec<Row>) -> Result<usize>;
}

fn key_of<M: Model>(record: &M, column: &str) -> Option<ValueKey> {
    record.column_value(column).as_ref().and_then(Value::key)
}

impl<P, C> RelationLink<P> for Relation<P, C>
where
    P: Model,
    C: Model + Clone,
{
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> RelationKind {
        self.kind
    }

    fn target_table(&self) -> &'static str {
        C::TABLE_NAME
    }

    fn target_columns(&self) -> Vec<&'static str> {
        C::columns()
    }

    fn parent_key_column(&self) -> &'static str {
        match self.kind {
            RelationKind::HasOne | RelationKind::HasMany => self.references,
            RelationKind::BelongsTo => self.foreign_key,
        }
    }

    fn lookup_column(&self) -> &'static str {
        self.child_key_column()
    }

    fn keys(&self, parents: &[P]) -> Vec<Value> {
        let column = self.parent_key_column();
        let mut seen = HashSet::new();
        let mut keys = Vec::with_capacity(parents.len());
        for parent in parents {
            let Some(value) = parent.column_value(column).filter(|v| !v.is_null()) else {
                tracing::debug!(
                    relation = self.name,
                    column,
                    "parent has no key value, skipped"
                );
                continue;
            };
            if self.kind == RelationKind::BelongsTo {
                if let Some(k) = value.key() {
                    if !seen.insert(k) {
                        continue;
                    }
                }
            }
            keys.push(value);
        }
        keys
    }

    fn attach(&self, parents: &mut [P], rows: Vec<Row>) -> Result<usize> {
        let child_column = self.child_key_column();
        let parent_column = self.parent_key_column();
        let fetched = rows.len();

        let mut groups: HashMap<ValueKey, Vec<C>> = HashMap::new();
        for row in &rows {
            let child = C::from_row(row)?;
            let Some(key) = key_of(&child, child_column) else {
                tracing::trace!(relation = self.name, "fetched row without key");
                continue;
            };
            let group = groups.entry(key).or_default();
            // HasOne and BelongsTo keep the first row seen per key
            if self.kind == RelationKind::HasMany || group.is_empty() {
                group.push(child);
            }
        }

        for parent in parents.iter_mut() {
            let group = key_of(parent, parent_column).and_then(|k| groups.get(&k));
            let loaded = match self.kind {
                RelationKind::HasMany => Loaded::Many(group.cloned().unwrap_or_default()),
                RelationKind::HasOne | RelationKind::BelongsTo => {
                    Loaded::One(group.and_then(|g| g.first().cloned()))
                }
            };
            (self.assign)(parent, loaded);
        }
        Ok(fetched)
    }
}

/// Name-keyed registry of a parent type's relations.
pub struct Relations<P> {
    links: Vec<Box<dyn RelationLink<P>>>,
}

impl<P> Default for Relations<P> {
    fn default() -> Self {
        Self { links: Vec::new() }
    }
}

impl<P: Model> Relations<P> {
    /// Registry filled from `P::register_relations`.
    pub fn for_model() -> Self {
        let mut relations = Self::default();
        P::register_relations(&mut relations);
        relations
    }
}

impl<P> Relations<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a relation. A relation with the same name is replaced.
    pub fn register<L>(&mut self, link: L) -> &mut Self
    where
        L: RelationLink<P> + 'static,
    {
        let boxed: Box<dyn RelationLink<P>> = Box::new(link);
        match self.links.iter_mut().find(|l| l.name() == boxed.name()) {
            Some(slot) => *slot = boxed,
            None => self.links.push(boxed),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn RelationLink<P>> {
        self.links
            .iter()
            .find(|l| l.name() == name)
            .map(|l| l.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(|l| l.name())
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl<P> fmt::Debug for Relations<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.links.iter().map(|l| (l.name(), l.kind())))
            .finish()
    }
}
