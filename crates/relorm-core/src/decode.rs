//! Row to record decoding.
//!
//! Decoding is lenient. Result columns are matched to mapped columns by name
//! (with `<prefix>_<column>` aliases resolved), unmatched columns are dropped,
//! and values that cannot be coerced leave the field at its default.

use crate::model::Model;
use crate::row::Row;
use crate::value::Value;

/// Lenient conversion from a driver value into a field type.
///
/// Drivers disagree on how they hand back untyped columns, so numeric,
/// boolean and string targets also accept text or bytes and parse them.
/// `None` means the combination is not supported.
pub trait Decode: Sized {
    fn decode(value: &Value) -> Option<Self>;
}

fn text_of(value: &Value) -> Option<&str> {
    match value {
        Value::Text(s) | Value::Decimal(s) => Some(s.as_str()),
        Value::Bytes(b) => std::str::from_utf8(b).ok(),
        _ => None,
    }
}

macro_rules! impl_decode_int {
    ($($ty:ty),*) => {
        $(
            impl Decode for $ty {
                fn decode(value: &Value) -> Option<Self> {
                    match value.as_i64() {
                        Some(v) => <$ty>::try_from(v).ok(),
                        None => text_of(value)?.trim().parse().ok(),
                    }
                }
            }
        )*
    };
}

impl_decode_int!(i16, i32, i64, u16, u32, u64);

impl Decode for bool {
    fn decode(value: &Value) -> Option<Self> {
        if let Some(b) = value.as_bool() {
            return Some(b);
        }
        match text_of(value)?.trim().to_ascii_lowercase().as_str() {
            "1" | "t" | "true" | "yes" => Some(true),
            "0" | "f" | "false" | "no" => Some(false),
            _ => None,
        }
    }
}

impl Decode for f64 {
    fn decode(value: &Value) -> Option<Self> {
        match value.as_f64() {
            Some(v) => Some(v),
            None => text_of(value)?.trim().parse().ok(),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
impl Decode for f32 {
    fn decode(value: &Value) -> Option<Self> {
        f64::decode(value).map(|v| v as f32)
    }
}

impl Decode for String {
    fn decode(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) | Value::Decimal(s) => Some(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone()).ok(),
            Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => {
                value.as_i64().map(|v| v.to_string())
            }
            Value::Float(_) | Value::Double(_) => value.as_f64().map(|v| v.to_string()),
            Value::Json(j) => Some(j.to_string()),
            _ => None,
        }
    }
}

impl Decode for Vec<u8> {
    fn decode(value: &Value) -> Option<Self> {
        value.as_bytes().map(<[u8]>::to_vec)
    }
}

impl Decode for [u8; 16] {
    fn decode(value: &Value) -> Option<Self> {
        match value {
            Value::Uuid(u) => Some(*u),
            Value::Bytes(b) => b.as_slice().try_into().ok(),
            _ => None,
        }
    }
}

impl Decode for serde_json::Value {
    fn decode(value: &Value) -> Option<Self> {
        match value {
            Value::Json(j) => Some(j.clone()),
            other => serde_json::from_str(text_of(other)?).ok(),
        }
    }
}

impl Decode for Value {
    fn decode(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::decode(value).map(Some)
        }
    }
}

/// Match a result column to one of `known` mapped columns.
///
/// An exact name wins. Otherwise the name is treated as `<prefix>_<column>`
/// and prefixes are stripped at successive underscores, longest remaining
/// suffix first, so `users_created_at` resolves to `created_at` before `at`.
pub fn resolve_column<'k>(result_column: &str, known: &[&'k str]) -> Option<&'k str> {
    if let Some(exact) = known.iter().find(|k| **k == result_column) {
        return Some(*exact);
    }
    result_column
        .match_indices('_')
        .map(|(i, _)| &result_column[i + 1..])
        .find_map(|suffix| known.iter().find(|k| **k == suffix).copied())
}

/// Re-key a result row onto `M`'s mapped columns.
///
/// When several aliases resolve to the same column (e.g. `users_id` and
/// `profiles_id` both to `id`), an exact name wins, then an alias prefixed
/// with the model's own table (or its singular), then the first one seen.
/// Columns that resolve to nothing are dropped.
pub fn mapped_row<M: Model>(row: &Row) -> Row {
    let known = M::columns();
    let own_prefixes = [M::TABLE_NAME, singular(M::TABLE_NAME)];

    // (column, value, rank) where lower rank wins
    let mut picked: Vec<(&'static str, &Value, u8)> = Vec::with_capacity(known.len());
    for (name, value) in row.iter() {
        let Some(column) = resolve_column(name, &known) else {
            tracing::trace!(column = name, table = M::TABLE_NAME, "unmatched result column");
            continue;
        };
        let rank = if name == column {
            0
        } else if own_prefixes
            .iter()
            .any(|p| name.strip_suffix(column).and_then(|n| n.strip_suffix('_')) == Some(*p))
        {
            1
        } else {
            2
        };
        match picked.iter_mut().find(|(c, _, _)| *c == column) {
            Some(slot) if rank < slot.2 => *slot = (column, value, rank),
            Some(_) => {}
            None => picked.push((column, value, rank)),
        }
    }
    Row::from_pairs(picked.into_iter().map(|(c, v, _)| (c, v.clone())))
}

/// Decode one field from a mapped row, falling back to `Default`.
pub fn field<T: Decode + Default>(mapped: &Row, column: &str) -> T {
    let Some(value) = mapped.get_by_name(column) else {
        return T::default();
    };
    T::decode(value).unwrap_or_else(|| {
        tracing::debug!(
            column,
            found = value.type_name(),
            target = std::any::type_name::<T>(),
            "value not coercible, field left at default"
        );
        T::default()
    })
}

/// Decode a one-level embedded relation from a joined row.
///
/// The relation is filled only when the row carries at least one
/// `<relation>_<sub>` or `<singular>_<sub>` column for one of `T`'s mapped
/// columns; otherwise the result is `None` rather than a zeroed record.
/// Prefixed names listed in `own` are the parent's columns (e.g. a
/// `writer_id` foreign key) and never count as embedded ones.
pub fn nested<T: Model>(row: &Row, relation: &str, own: &[&str]) -> Option<T> {
    let prefixes = [relation, singular(relation)];
    let mut pairs = Vec::new();
    for column in T::columns() {
        let hit = prefixes
            .iter()
            .map(|p| format!("{}_{}", p, column))
            .filter(|name| !own.contains(&name.as_str()))
            .find_map(|name| row.get_by_name(&name));
        if let Some(value) = hit {
            pairs.push((column, value.clone()));
        }
    }
    if pairs.is_empty() {
        return None;
    }
    match T::from_row(&Row::from_pairs(pairs)) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(relation, error = %e, "nested relation not decoded");
            None
        }
    }
}

/// Naive singular of a table or relation name: strips one trailing `s`.
pub fn singular(name: &str) -> &str {
    name.strip_suffix('s').unwrap_or(name)
}
