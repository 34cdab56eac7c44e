//! Column-qualification heuristics.
//!
//! The builder accepts SELECT lists and WHERE conditions as text. Once the
//! active table is known, bare column names are prefixed with it so joined
//! queries stay unambiguous. These are token-level heuristics, kept here as
//! pure functions so they can be tested in isolation.

use relorm_core::Dialect;

/// Split a comma-separated list at top-level commas.
///
/// Commas inside parentheses or quotes do not split. Items are trimmed and
/// empty items dropped.
pub fn split_fields(list: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut depth = 0_usize;
    let mut quote: Option<char> = None;

    for c in list.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    fields.push(current.trim().to_string());
                    current.clear();
                    continue;
                }
                _ => {}
            },
        }
        current.push(c);
    }
    fields.push(current.trim().to_string());
    fields.retain(|f| !f.is_empty());
    fields
}

/// Whether a select item must be left as written.
///
/// Function calls, `*`, already-qualified names, aliased items and
/// literals are expressions.
pub fn is_expression(field: &str) -> bool {
    let field = field.trim();
    field.contains('(')
        || field.contains('*')
        || field.contains('.')
        || field
            .split_whitespace()
            .any(|t| t.eq_ignore_ascii_case("as"))
        || field.starts_with(['\'', '"', '`', '$', '?'])
        || field.starts_with(|c: char| c.is_ascii_digit())
}

/// Qualify the bare column names of a SELECT list with `table`.
pub fn qualify_select_list(list: &str, table: &str) -> String {
    split_fields(list)
        .iter()
        .map(|f| {
            if is_expression(f) {
                f.clone()
            } else {
                format!("{}.{}", table, f)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Table name of a FROM clause: alias and schema prefix dropped.
///
/// `public.users u` gives `users`.
pub fn table_from_clause(from: &str) -> String {
    let first = from.split_whitespace().next().unwrap_or_default();
    let name = first.rsplit('.').next().unwrap_or(first);
    name.trim_matches(|c| c == '"' || c == '`').to_string()
}

const COMPARISONS: &[&str] = &[
    "=", "!=", "<>", "<", ">", "<=", ">=", "LIKE", "IN", "IS", "BETWEEN", "NOT",
];
const CONNECTIVES: &[&str] = &["AND", "OR", "WHERE", "NOT"];
const KEYWORDS: &[&str] = &[
    "AND", "OR", "NOT", "WHERE", "NULL", "TRUE", "FALSE", "IS", "IN", "LIKE", "BETWEEN", "EXISTS",
    "SELECT", "CASE", "WHEN", "THEN", "ELSE", "END", "ANY", "ALL",
];

fn is_one_of(token: &str, set: &[&str]) -> bool {
    set.iter().any(|k| token.eq_ignore_ascii_case(k))
}

/// Whether token `i` of a condition sits where a column name goes.
///
/// True when the next token is a comparison or membership operator, or the
/// previous token is a connective, `WHERE` or `NOT`. Qualified names,
/// calls, placeholders, literals and keywords never count.
pub fn is_column_position(tokens: &[&str], i: usize) -> bool {
    let Some(token) = tokens.get(i) else {
        return false;
    };
    if !is_bare_identifier(token) {
        return false;
    }
    let next_is_operator = tokens.get(i + 1).is_some_and(|n| is_one_of(n, COMPARISONS));
    let prev_is_connective = i > 0 && is_one_of(tokens[i - 1], CONNECTIVES);
    next_is_operator || prev_is_connective
}

fn is_bare_identifier(token: &str) -> bool {
    !token.is_empty()
        && !token.contains('.')
        && !token.contains('(')
        && !token.starts_with(['$', '?', '\'', '"', '`'])
        && token
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_')
        && !token.starts_with(|c: char| c.is_ascii_digit())
        && !is_one_of(token, KEYWORDS)
}

/// A token with its byte span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token<'a> {
    start: usize,
    text: &'a str,
}

/// Split condition text into words, operators, punctuation and quoted
/// literals, keeping byte offsets so the text can be patched in place.
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if c == b'\'' || c == b'"' || c == b'`' {
            i += 1;
            while i < bytes.len() {
                if bytes[i] == c {
                    // doubled quote is an escaped quote
                    if bytes.get(i + 1) == Some(&c) {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
        } else if matches!(c, b'=' | b'<' | b'>' | b'!') {
            while i < bytes.len() && matches!(bytes[i], b'=' | b'<' | b'>' | b'!') {
                i += 1;
            }
        } else if matches!(c, b'(' | b')' | b',') {
            i += 1;
        } else {
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && !matches!(
                    bytes[i],
                    b'=' | b'<' | b'>' | b'!' | b'(' | b')' | b',' | b'\'' | b'"' | b'`'
                )
            {
                i += 1;
            }
        }
        tokens.push(Token {
            start,
            text: &text[start..i],
        });
    }
    tokens
}

/// Qualify bare column names in a WHERE-style condition with `table`.
///
/// Spacing and everything that is not qualified is preserved.
pub fn qualify_condition(condition: &str, table: &str) -> String {
    let tokens = tokenize(condition);
    let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
    let mut out = String::with_capacity(condition.len() + 16);
    let mut copied = 0;
    for (i, token) in tokens.iter().enumerate() {
        if is_column_position(&texts, i) {
            out.push_str(&condition[copied..token.start]);
            out.push_str(table);
            out.push('.');
            copied = token.start;
        }
    }
    out.push_str(&condition[copied..]);
    out
}

/// Replace bare `?` markers with the dialect's placeholders, numbered from
/// `start`. Markers inside quoted literals are left alone.
///
/// Returns the text and the next free index.
pub fn number_placeholders(condition: &str, dialect: &dyn Dialect, start: usize) -> (String, usize) {
    let mut out = String::with_capacity(condition.len());
    let mut next = start;
    let mut copied = 0;
    for token in tokenize(condition) {
        if token.text == "?" {
            out.push_str(&condition[copied..token.start]);
            out.push_str(&dialect.placeholder(next));
            next += 1;
            copied = token.start + 1;
        }
    }
    out.push_str(&condition[copied..]);
    (out, next)
}

/// Count of bare `?` markers outside quoted literals.
pub fn count_markers(text: &str) -> usize {
    tokenize(text).iter().filter(|t| t.text == "?").count()
}

/// Whether `text` has a numbered `$N` placeholder outside quoted literals.
pub fn has_numbered_markers(text: &str) -> bool {
    tokenize(text).iter().any(|t| {
        t.text
            .strip_prefix('$')
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    })
}
