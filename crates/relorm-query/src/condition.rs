//! Predicates and query parameters.
//!
//! A [`Condition`] is one `field op value` predicate with the connective that
//! joins it to the previous one. [`Params`] bundles everything a
//! `BaseModel` call needs: payload, filters, selection, ordering, paging and
//! the relations to include.

use indexmap::IndexMap;
use relorm_core::{Dialect, Error, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Comparison or membership operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    In,
}

impl Operator {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::In => "IN",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Connective between a condition and the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Single(Value),
    List(Vec<Value>),
}

impl ConditionValue {
    /// Bound values in placeholder order.
    pub fn values(&self) -> &[Value] {
        match self {
            ConditionValue::Single(v) => std::slice::from_ref(v),
            ConditionValue::List(vs) => vs,
        }
    }
}

/// One WHERE predicate.
///
/// The connective of the first condition in a sequence is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub logic: Logic,
    pub field: String,
    pub op: Operator,
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            logic: Logic::And,
            field: field.into(),
            op,
            value: ConditionValue::Single(value.into()),
        }
    }

    /// Join to the previous condition with OR.
    #[must_use]
    pub fn or(mut self) -> Self {
        self.logic = Logic::Or;
        self
    }

    /// Join to the previous condition with AND.
    #[must_use]
    pub fn and(mut self) -> Self {
        self.logic = Logic::And;
        self
    }

    /// Render as `field op placeholder(s)` numbered from `start`.
    ///
    /// Returns the text and the next free placeholder index.
    pub fn render(&self, dialect: &dyn Dialect, start: usize) -> (String, usize) {
        match &self.value {
            ConditionValue::List(values) if values.is_empty() => ("1 = 0".to_string(), start),
            ConditionValue::List(values) => {
                let marks: Vec<String> = (0..values.len())
                    .map(|i| dialect.placeholder(start + i))
                    .collect();
                (
                    format!("{} {} ({})", self.field, self.op, marks.join(", ")),
                    start + values.len(),
                )
            }
            ConditionValue::Single(_) => (
                format!("{} {} {}", self.field, self.op, dialect.placeholder(start)),
                start + 1,
            ),
        }
    }
}

pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Condition {
    Condition::new(field, Operator::Eq, value)
}

pub fn not_eq(field: impl Into<String>, value: impl Into<Value>) -> Condition {
    Condition::new(field, Operator::NotEq, value)
}

pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Condition {
    Condition::new(field, Operator::Gt, value)
}

pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Condition {
    Condition::new(field, Operator::Lt, value)
}

pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Condition {
    Condition::new(field, Operator::Gte, value)
}

pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Condition {
    Condition::new(field, Operator::Lte, value)
}

pub fn like(field: impl Into<String>, pattern: impl Into<Value>) -> Condition {
    Condition::new(field, Operator::Like, pattern)
}

/// `field IN (...)`. An empty list matches nothing.
pub fn in_list<I, V>(field: impl Into<String>, values: I) -> Condition
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Condition {
        logic: Logic::And,
        field: field.into(),
        op: Operator::In,
        value: ConditionValue::List(values.into_iter().map(Into::into).collect()),
    }
}

/// Join every condition after the first with AND.
pub fn and(conditions: Vec<Condition>) -> Vec<Condition> {
    with_logic(conditions, Logic::And)
}

/// Join every condition after the first with OR.
pub fn or(conditions: Vec<Condition>) -> Vec<Condition> {
    with_logic(conditions, Logic::Or)
}

fn with_logic(mut conditions: Vec<Condition>, logic: Logic) -> Vec<Condition> {
    for c in conditions.iter_mut().skip(1) {
        c.logic = logic;
    }
    conditions
}

/// Render a condition sequence joined by its connectives.
///
/// Placeholders are numbered consecutively from `start`; `IN` takes one per
/// value. Returns the text, the bound values in order, and the next free
/// placeholder index.
pub fn render_conditions(
    conditions: &[Condition],
    dialect: &dyn Dialect,
    start: usize,
) -> (String, Vec<Value>, usize) {
    let mut sql = String::new();
    let mut args = Vec::new();
    let mut next = start;
    for (i, cond) in conditions.iter().enumerate() {
        if i > 0 {
            sql.push(' ');
            sql.push_str(cond.logic.as_sql());
            sql.push(' ');
        }
        let (text, after) = cond.render(dialect, next);
        sql.push_str(&text);
        args.extend(cond.value.values().iter().cloned());
        next = after;
    }
    (sql, args, next)
}

/// Parameters of an included relation: a nested [`Params`] without payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Include {
    pub where_: Vec<Condition>,
    pub select: BTreeSet<String>,
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Include {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.where_.push(condition);
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by.push(field.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Check every identifier against the target's mapped `columns`.
    ///
    /// Selection, filter fields and ordering are spliced into statement
    /// text, so anything else is refused. An ordering term is a column
    /// optionally followed by `ASC` or `DESC`.
    #[allow(clippy::result_large_err)]
    pub fn check_columns(&self, relation: &str, columns: &[&str]) -> relorm_core::Result<()> {
        let refuse = |part: &str, name: &str| -> relorm_core::Result<()> {
            Err(Error::validation(
                format!("include {}", relation),
                format!("unknown {} column '{}'", part, name),
            ))
        };
        let known = |name: &str| columns.contains(&name);

        if let Some(name) = self.select.iter().find(|f| !known(f)) {
            return refuse("select", name);
        }
        if let Some(cond) = self.where_.iter().find(|c| !known(&c.field)) {
            return refuse("filter", &cond.field);
        }
        for term in &self.order_by {
            let mut words = term.split_whitespace();
            let column = words.next().unwrap_or_default();
            let direction_ok = words.next().is_none_or(|d| {
                d.eq_ignore_ascii_case("ASC") || d.eq_ignore_ascii_case("DESC")
            });
            if !known(column) || !direction_ok || words.next().is_some() {
                return refuse("order", term);
            }
        }
        Ok(())
    }
}

/// Query parameters for one `BaseModel` call on `M`.
#[derive(Debug, Clone, PartialEq)]
pub struct Params<M> {
    /// Payload for create and update
    pub data: Option<M>,
    pub where_: Vec<Condition>,
    pub select: BTreeSet<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order_by: Vec<String>,
    /// Relations to load, in request order
    pub include: IndexMap<String, Include>,
}

impl<M> Default for Params<M> {
    fn default() -> Self {
        Self {
            data: None,
            where_: Vec::new(),
            select: BTreeSet::new(),
            limit: None,
            offset: None,
            order_by: Vec::new(),
            include: IndexMap::new(),
        }
    }
}

impl<M> Params<M> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn data(mut self, data: M) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.where_.push(condition);
        self
    }

    /// Append a whole condition sequence, e.g. from [`or`].
    #[must_use]
    pub fn filters(mut self, conditions: Vec<Condition>) -> Self {
        self.where_.extend(conditions);
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by.push(field.into());
        self
    }

    /// Include a relation with default parameters.
    #[must_use]
    pub fn include(self, relation: impl Into<String>) -> Self {
        self.include_with(relation, Include::default())
    }

    #[must_use]
    pub fn include_with(mut self, relation: impl Into<String>, params: Include) -> Self {
        self.include.insert(relation.into(), params);
        self
    }
}
