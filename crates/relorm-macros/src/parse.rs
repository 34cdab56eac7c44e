//! Parsing logic for the Model derive macro.
//!
//! This module extracts struct-level and field-level `#[relorm(...)]`
//! attributes from the derive input to build the `ModelDef` and `FieldDef`
//! structures used for code generation.

use proc_macro2::Span;
use quote::ToTokens;
use syn::{
    Attribute, Data, DeriveInput, Error, Field, Fields, GenericArgument, Generics, Ident, Lit,
    PathArguments, Result, Type,
};

/// Parsed model definition from a struct with `#[derive(Model)]`.
#[derive(Debug)]
pub struct ModelDef {
    /// The struct name (e.g., `User`).
    pub name: Ident,
    /// The SQL table name (e.g., `"users"`).
    pub table_name: String,
    pub fields: Vec<FieldDef>,
    pub generics: Generics,
}

/// Parsed field definition from a struct field.
#[derive(Debug)]
pub struct FieldDef {
    pub name: Ident,
    /// The SQL column name, when the field is mapped.
    pub column: Option<String>,
    pub ty: Type,
    /// Raw constraint annotation, e.g. `"primary key,auto_increment"`.
    pub constraints: String,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Relation carried by this field, if any.
    pub relation: Option<RelationAttr>,
    /// Prefix of an embedded relation decoded from joined columns.
    pub nested: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKindAttr {
    HasOne,
    HasMany,
    BelongsTo,
}

impl RelationKindAttr {
    pub const fn constructor(self) -> &'static str {
        match self {
            RelationKindAttr::HasOne => "has_one",
            RelationKindAttr::HasMany => "has_many",
            RelationKindAttr::BelongsTo => "belongs_to",
        }
    }
}

/// Parsed `has_many(...)`, `has_one(...)` or `belongs_to(...)` attribute.
#[derive(Debug, Clone)]
pub struct RelationAttr {
    pub kind: RelationKindAttr,
    /// Explicit target type; otherwise taken from the field type.
    pub target: Option<Type>,
    pub name: Option<String>,
    pub foreign_key: Option<String>,
    pub references: Option<String>,
    pub span: Span,
}

impl ModelDef {
    /// Fields mapped to a column, in declaration order.
    pub fn mapped_fields(&self) -> Vec<&FieldDef> {
        self.fields.iter().filter(|f| f.column.is_some()).collect()
    }

    /// The primary key column: the annotated one, else `id`.
    pub fn primary_key_column(&self) -> String {
        self.fields
            .iter()
            .find(|f| f.primary_key)
            .and_then(|f| f.column.clone())
            .unwrap_or_else(|| "id".to_string())
    }
}

impl FieldDef {
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or_default()
    }

    /// Field type as a compact string, e.g. `Option<String>`.
    pub fn type_name(&self) -> String {
        self.ty.to_token_stream().to_string().replace(' ', "")
    }
}

/// Parse a `DeriveInput` into a `ModelDef`.
pub fn parse_model(input: &DeriveInput) -> Result<ModelDef> {
    let name = input.ident.clone();
    let generics = input.generics.clone();
    let table_name = parse_struct_attrs(&input.attrs)?
        .unwrap_or_else(|| derive_table_name(&name.to_string()));

    let fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not unions",
            ));
        }
    };

    Ok(ModelDef {
        name,
        table_name,
        fields,
        generics,
    })
}

/// Parse struct-level `#[relorm(table = "...")]`.
fn parse_struct_attrs(attrs: &[Attribute]) -> Result<Option<String>> {
    let mut table_name = None;
    for attr in attrs {
        if !attr.path().is_ident("relorm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                table_name = Some(string_value(&meta, "table")?);
                Ok(())
            } else {
                Err(meta.error("unknown relorm struct attribute; expected `table`"))
            }
        })?;
    }
    Ok(table_name)
}

/// Default table name: snake_case of the struct name plus `s`.
fn derive_table_name(struct_name: &str) -> String {
    format!("{}s", to_snake_case(struct_name))
}

/// Convert PascalCase to snake_case.
///
/// Examples:
/// - `User` -> `user`
/// - `TeamMember` -> `team_member`
/// - `HTTPServer` -> `http_server`
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next = chars.get(i + 1).copied();
                let should_underscore = prev.is_lowercase()
                    || (prev.is_uppercase() && next.is_some_and(char::is_lowercase));
                if should_underscore {
                    result.push('_');
                }
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }

    result
}

fn parse_fields(fields: &Fields) -> Result<Vec<FieldDef>> {
    match fields {
        Fields::Named(named) => named.named.iter().map(parse_field).collect(),
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with named fields, not a tuple struct",
        )),
        Fields::Unit => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with fields, not a unit struct",
        )),
    }
}

/// Intermediate struct for collecting field attributes.
#[derive(Default)]
struct FieldAttrs {
    column: Option<String>,
    constraints: Option<String>,
    relation: Option<RelationAttr>,
    nested: Option<String>,
}

fn parse_field(field: &Field) -> Result<FieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;
    let attrs = parse_field_attrs(&field.attrs, &name)?;
    let constraints = attrs.constraints.unwrap_or_default();
    let clauses = constraint_clauses(&constraints);

    Ok(FieldDef {
        primary_key: clauses.iter().any(|c| c.eq_ignore_ascii_case("primary key")),
        auto_increment: clauses.iter().any(|c| c.eq_ignore_ascii_case("auto_increment")),
        name,
        column: attrs.column,
        ty: field.ty.clone(),
        constraints,
        relation: attrs.relation,
        nested: attrs.nested,
    })
}

/// Parse all `#[relorm(...)]` attributes on a field.
///
/// Supported keys:
/// - `column` or `column = "name"` maps the field (bare form uses the field name)
/// - `constraints = "primary key,auto_increment,..."`
/// - `nested` or `nested = "prefix"` decodes an embedded record from joined columns
/// - `has_one(..)`, `has_many(..)`, `belongs_to(..)` declare a relation
fn parse_field_attrs(attrs: &[Attribute], field_name: &Ident) -> Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("relorm") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("column") {
                result.column = if meta.input.peek(syn::Token![=]) {
                    Some(string_value(&meta, "column")?)
                } else {
                    Some(field_name.to_string())
                };
            } else if path.is_ident("constraints") {
                result.constraints = Some(string_value(&meta, "constraints")?);
            } else if path.is_ident("nested") {
                result.nested = if meta.input.peek(syn::Token![=]) {
                    Some(string_value(&meta, "nested")?)
                } else {
                    Some(field_name.to_string())
                };
            } else if let Some(kind) = relation_kind(path) {
                if result.relation.is_some() {
                    return Err(meta.error("a field can carry only one relation"));
                }
                result.relation = Some(parse_relation(&meta, kind)?);
            } else {
                return Err(meta.error(
                    "unknown relorm field attribute; expected `column`, `constraints`, \
                     `nested`, `has_one`, `has_many` or `belongs_to`",
                ));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

fn relation_kind(path: &syn::Path) -> Option<RelationKindAttr> {
    if path.is_ident("has_one") {
        Some(RelationKindAttr::HasOne)
    } else if path.is_ident("has_many") {
        Some(RelationKindAttr::HasMany)
    } else if path.is_ident("belongs_to") {
        Some(RelationKindAttr::BelongsTo)
    } else {
        None
    }
}

fn parse_relation(
    meta: &syn::meta::ParseNestedMeta<'_>,
    kind: RelationKindAttr,
) -> Result<RelationAttr> {
    let mut relation = RelationAttr {
        kind,
        target: None,
        name: None,
        foreign_key: None,
        references: None,
        span: meta.path.get_ident().map_or_else(Span::call_site, Ident::span),
    };

    // `has_many` without arguments relies on the defaults
    if !meta.input.peek(syn::token::Paren) {
        return Ok(relation);
    }

    meta.parse_nested_meta(|nested| {
        let path = &nested.path;
        if path.is_ident("target") {
            relation.target = Some(nested.value()?.parse::<Type>()?);
        } else if path.is_ident("name") {
            relation.name = Some(string_value(&nested, "name")?);
        } else if path.is_ident("foreign_key") {
            relation.foreign_key = Some(string_value(&nested, "foreign_key")?);
        } else if path.is_ident("references") {
            relation.references = Some(string_value(&nested, "references")?);
        } else {
            return Err(nested.error(
                "unknown relation key; expected `target`, `name`, `foreign_key` or `references`",
            ));
        }
        Ok(())
    })?;

    Ok(relation)
}

fn string_value(meta: &syn::meta::ParseNestedMeta<'_>, key: &str) -> Result<String> {
    let value: Lit = meta.value()?.parse()?;
    if let Lit::Str(lit_str) = value {
        Ok(lit_str.value())
    } else {
        Err(Error::new_spanned(
            value,
            format!("expected string literal for {}", key),
        ))
    }
}

/// Split a constraint annotation into trimmed clauses at top-level commas.
pub fn constraint_clauses(annotation: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut depth = 0_usize;
    let mut current = String::new();
    for c in annotation.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                clauses.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    clauses.push(current.trim().to_string());
    clauses.retain(|c| !c.is_empty());
    clauses
}

/// The single generic argument of `Wrapper<T>` when the last path segment is `wrapper`.
pub fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

/// Shape of a field holding related records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder {
    /// `Vec<T>`
    Many,
    /// `Option<T>`
    One,
    /// `Option<Box<T>>`
    OneBoxed,
}

/// Classify a relation field's type and return the record type it holds.
pub fn relation_holder(ty: &Type) -> Option<(Holder, &Type)> {
    if let Some(inner) = generic_inner(ty, "Vec") {
        return Some((Holder::Many, inner));
    }
    let inner = generic_inner(ty, "Option")?;
    match generic_inner(inner, "Box") {
        Some(boxed) => Some((Holder::OneBoxed, boxed)),
        None => Some((Holder::One, inner)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("User"), "user");
        assert_eq!(to_snake_case("TeamMember"), "team_member");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(derive_table_name("BlogPost"), "blog_posts");
    }

    #[test]
    fn test_constraint_clauses() {
        assert_eq!(
            constraint_clauses("primary key, auto_increment,check:(a, b),,"),
            vec!["primary key", "auto_increment", "check:(a, b)"]
        );
    }

    #[test]
    fn test_parse_model_fields() {
        let input: DeriveInput = parse_quote! {
            #[relorm(table = "people")]
            struct Person {
                #[relorm(column = "id", constraints = "Primary Key,auto_increment")]
                id: i64,
                #[relorm(column)]
                email: String,
                scratch: u8,
                #[relorm(has_many(foreign_key = "person_id", references = "id"))]
                posts: Vec<Post>,
            }
        };
        let model = parse_model(&input).unwrap();
        assert_eq!(model.table_name, "people");
        assert_eq!(model.primary_key_column(), "id");
        assert!(model.fields[0].primary_key && model.fields[0].auto_increment);
        assert_eq!(model.fields[1].column.as_deref(), Some("email"));
        assert!(model.fields[2].column.is_none());
        let rel = model.fields[3].relation.as_ref().unwrap();
        assert_eq!(rel.kind, RelationKindAttr::HasMany);
        assert_eq!(rel.foreign_key.as_deref(), Some("person_id"));
        assert_eq!(model.mapped_fields().len(), 2);
    }

    #[test]
    fn test_relation_holder() {
        let many: Type = parse_quote!(Vec<Post>);
        let one: Type = parse_quote!(Option<Profile>);
        let boxed: Type = parse_quote!(Option<Box<Author>>);
        let scalar: Type = parse_quote!(i64);
        assert_eq!(relation_holder(&many).map(|h| h.0), Some(Holder::Many));
        assert_eq!(relation_holder(&one).map(|h| h.0), Some(Holder::One));
        assert_eq!(relation_holder(&boxed).map(|h| h.0), Some(Holder::OneBoxed));
        assert!(relation_holder(&scalar).is_none());
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let input: DeriveInput = parse_quote! {
            struct Bad {
                #[relorm(colum = "id")]
                id: i64,
            }
        };
        assert!(parse_model(&input).is_err());
    }
}
