//! Field mapping metadata and constraint annotations.

/// One row of a record type's compile-time mapping table.
///
/// Generated by `#[derive(Model)]`; one entry per mapped field, in declaration
/// order. Fields without a column mapping do not appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Database column name
    pub column: &'static str,
    /// Rust type as written, used for SQL type inference
    pub rust_type: &'static str,
    /// Raw constraint annotation, e.g. `"primary key,auto_increment"`
    pub constraints: &'static str,
    pub primary_key: bool,
    pub auto_increment: bool,
}

impl FieldInfo {
    pub const fn new(name: &'static str, column: &'static str, rust_type: &'static str) -> Self {
        Self {
            name,
            column,
            rust_type,
            constraints: "",
            primary_key: false,
            auto_increment: false,
        }
    }

    pub const fn constraints(mut self, constraints: &'static str) -> Self {
        self.constraints = constraints;
        self
    }

    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    /// Parse this field's constraint annotation.
    pub fn parsed_constraints(&self) -> Constraints {
        Constraints::parse(self.constraints)
    }
}

/// SQL-level properties parsed from a constraint annotation.
///
/// The annotation is a comma-separated list of clauses:
/// `primary key`, `auto_increment`, `not null`, `default:<v>`, `check:(<e>)`,
/// `type:<t>`, `length:<n>`, `unique` and `index`. Keywords are
/// case-insensitive. Unknown clauses are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    pub primary_key: bool,
    pub auto_increment: bool,
    pub not_null: bool,
    pub unique: bool,
    pub index: bool,
    pub default: Option<String>,
    /// Check expression without its surrounding parentheses
    pub check: Option<String>,
    pub sql_type: Option<String>,
    pub length: Option<u32>,
}

impl Constraints {
    pub fn parse(annotation: &str) -> Self {
        let mut out = Constraints::default();
        for clause in split_clauses(annotation) {
            let (key, value) = match clause.split_once(':') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (clause, None),
            };
            match (key.to_ascii_lowercase().as_str(), value) {
                ("primary key", None) => out.primary_key = true,
                ("auto_increment", None) => out.auto_increment = true,
                ("not null", None) => out.not_null = true,
                ("unique", None) => out.unique = true,
                ("index", None) => out.index = true,
                ("default", Some(v)) => out.default = Some(v.to_string()),
                ("check", Some(v)) => out.check = Some(strip_parens(v).to_string()),
                ("type", Some(v)) if !v.is_empty() => out.sql_type = Some(v.to_string()),
                ("length", Some(v)) => out.length = v.parse().ok(),
                _ => {}
            }
        }
        out
    }
}

/// Split on top-level commas so `check:(a IN (1, 2))` stays one clause.
fn split_clauses(annotation: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in annotation.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                clauses.push(annotation[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    clauses.push(annotation[start..].trim());
    clauses.retain(|c| !c.is_empty());
    clauses
}

fn strip_parens(expr: &str) -> &str {
    expr.strip_prefix('(')
        .and_then(|e| e.strip_suffix(')'))
        .map_or(expr, str::trim)
}
