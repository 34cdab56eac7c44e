//! Procedural macros for relorm.
//!
//! `relorm-macros` is the compile-time codegen layer. `#[derive(Model)]`
//! turns a struct into its mapping table: table name, mapped columns with
//! their constraint annotations, encode/decode glue and relation
//! registration. Application crates use it through the `relorm` facade.

use proc_macro::TokenStream;
use quote::{format_ident, quote};

mod parse;
mod validate;

use parse::{FieldDef, Holder, ModelDef, RelationKindAttr, parse_model, relation_holder};

/// Derive macro for the `Model` trait.
///
/// # Attributes
///
/// - `#[relorm(table = "name")]` - Table name (defaults to snake_case struct name plus `s`)
/// - `#[relorm(column = "name")]` - Map the field to a column; bare `column` uses the field name.
///   Fields without `column` are left out of all generated SQL.
/// - `#[relorm(constraints = "...")]` - Comma-separated clauses: `primary key`,
///   `auto_increment`, `not null`, `default:<v>`, `check:(<e>)`, `type:<t>`,
///   `length:<n>`, `unique`, `index`. Unknown clauses are ignored.
/// - `#[relorm(has_many(..))]`, `#[relorm(has_one(..))]`, `#[relorm(belongs_to(..))]` -
///   Relation with optional `target = Type`, `name = ".."`, `foreign_key = ".."`
///   and `references = ".."`
/// - `#[relorm(nested = "prefix")]` - Decode an embedded record from
///   `<prefix>_<column>` result columns
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
///
///     #[relorm(column = "email", constraints = "unique,not null")]
///     email: String,
///
///     #[relorm(has_many(foreign_key = "user_id", references = "id"))]
///     posts: Vec<Post>,
///
///     #[relorm(has_one(foreign_key = "user_id"))]
///     profile: Option<Profile>,
/// }
/// ```
#[proc_macro_derive(Model, attributes(relorm))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let model = match parse_model(&input) {
        Ok(m) => m,
        Err(e) => return e.to_compile_error().into(),
    };

    if let Err(e) = validate::validate_model(&model) {
        return e.to_compile_error().into();
    }

    generate_model_impl(&model).into()
}

/// Generate the Model trait implementation from parsed model definition.
fn generate_model_impl(model: &ModelDef) -> proc_macro2::TokenStream {
    let name = &model.name;
    let table_name = &model.table_name;
    let primary_key = model.primary_key_column();
    let (impl_generics, ty_generics, where_clause) = model.generics.split_for_impl();

    let field_infos = generate_field_infos(model);
    let to_row_body = generate_to_row(model);
    let changed_row_body = generate_changed_row(model);
    let from_row_body = generate_from_row(model);
    let set_id_body = generate_set_generated_id(model);
    let relations_body = generate_relations(model);

    quote! {
        impl #impl_generics relorm_core::Model for #name #ty_generics #where_clause {
            const TABLE_NAME: &'static str = #table_name;
            const PRIMARY_KEY: &'static str = #primary_key;

            fn fields() -> &'static [relorm_core::FieldInfo] {
                static FIELDS: &[relorm_core::FieldInfo] = &[
                    #field_infos
                ];
                FIELDS
            }

            fn to_row(&self) -> Vec<(&'static str, relorm_core::Value)> {
                #to_row_body
            }

            fn changed_row(&self) -> Vec<(&'static str, relorm_core::Value)> {
                #changed_row_body
            }

            fn from_row(row: &relorm_core::Row) -> relorm_core::Result<Self> {
                #from_row_body
            }

            fn set_generated_id(&mut self, id: i64) {
                #set_id_body
            }

            fn register_relations(relations: &mut relorm_core::Relations<Self>) {
                #relations_body
            }
        }
    }
}

/// Generate the static FieldInfo entries, one per mapped field.
fn generate_field_infos(model: &ModelDef) -> proc_macro2::TokenStream {
    let infos = model.mapped_fields().into_iter().map(|field| {
        let field_name = field.name.to_string();
        let column = field.column_name();
        let rust_type = field.type_name();
        let constraints = &field.constraints;
        let primary_key = field.primary_key;
        let auto_increment = field.auto_increment;
        quote! {
            relorm_core::FieldInfo::new(#field_name, #column, #rust_type)
                .constraints(#constraints)
                .primary_key(#primary_key)
                .auto_increment(#auto_increment)
        }
    });
    quote! { #(#infos),* }
}

fn value_of(field: &FieldDef) -> proc_macro2::TokenStream {
    let field_name = &field.name;
    quote! { relorm_core::Value::from(::core::clone::Clone::clone(&self.#field_name)) }
}

/// Generate the to_row method body.
fn generate_to_row(model: &ModelDef) -> proc_macro2::TokenStream {
    let conversions = model.mapped_fields().into_iter().map(|field| {
        let column = field.column_name();
        let value = value_of(field);
        quote! { (#column, #value) }
    });
    quote! { vec![#(#conversions),*] }
}

/// Generate the changed_row method body: columns whose field is not zero.
fn generate_changed_row(model: &ModelDef) -> proc_macro2::TokenStream {
    let pushes = model.mapped_fields().into_iter().map(|field| {
        let field_name = &field.name;
        let column = field.column_name();
        let value = value_of(field);
        quote! {
            if !relorm_core::ZeroValue::is_zero_value(&self.#field_name) {
                row.push((#column, #value));
            }
        }
    });
    quote! {
        let mut row = Vec::new();
        #(#pushes)*
        row
    }
}

/// Generate the from_row method body.
///
/// Mapped fields decode leniently from the re-keyed row. Only `nested`
/// fields decode from prefixed joined columns; relation fields are left for
/// the loader and all other fields start at their default.
fn generate_from_row(model: &ModelDef) -> proc_macro2::TokenStream {
    let inits = model.fields.iter().map(|field| {
        let field_name = &field.name;
        if let Some(column) = &field.column {
            return quote! { #field_name: relorm_core::decode::field(&mapped, #column) };
        }
        match (&field.nested, relation_holder(&field.ty)) {
            (Some(prefix), Some((Holder::One, inner))) => quote! {
                #field_name: relorm_core::decode::nested::<#inner>(row, #prefix, &own)
            },
            (Some(prefix), Some((Holder::OneBoxed, inner))) => quote! {
                #field_name: relorm_core::decode::nested::<#inner>(row, #prefix, &own)
                    .map(::std::boxed::Box::new)
            },
            _ => quote! { #field_name: ::core::default::Default::default() },
        }
    });

    quote! {
        let mapped = relorm_core::decode::mapped_row::<Self>(row);
        let own = <Self as relorm_core::Model>::columns();
        let _ = &own;
        Ok(Self {
            #(#inits,)*
        })
    }
}

/// Generate set_generated_id: only an auto-increment primary key is written.
fn generate_set_generated_id(model: &ModelDef) -> proc_macro2::TokenStream {
    let Some(field) = model
        .fields
        .iter()
        .find(|f| f.primary_key && f.auto_increment)
    else {
        return quote! { let _ = id; };
    };
    let field_name = &field.name;
    let ty = &field.ty;
    quote! {
        if let Some(value) =
            <#ty as relorm_core::Decode>::decode(&relorm_core::Value::BigInt(id))
        {
            self.#field_name = value;
        }
    }
}

fn relation_name(field: &FieldDef) -> String {
    field
        .relation
        .as_ref()
        .and_then(|r| r.name.clone())
        .unwrap_or_else(|| field.name.to_string())
}

/// Generate register_relations: one typed descriptor per relation field.
fn generate_relations(model: &ModelDef) -> proc_macro2::TokenStream {
    let parent_singular = model
        .table_name
        .strip_suffix('s')
        .unwrap_or(&model.table_name);

    let registrations = model.fields.iter().filter_map(|field| {
        let relation = field.relation.as_ref()?;
        let (holder, inner) = relation_holder(&field.ty)?;
        let target = relation.target.as_ref().unwrap_or(inner);
        let field_name = &field.name;
        let name = relation_name(field);
        let constructor = format_ident!("{}", relation.kind.constructor());
        let foreign_key = relation.foreign_key.clone().unwrap_or_else(|| match relation.kind {
            RelationKindAttr::HasOne | RelationKindAttr::HasMany => {
                format!("{}_id", parent_singular)
            }
            RelationKindAttr::BelongsTo => format!("{}_id", field.name),
        });
        let references = relation
            .references
            .clone()
            .unwrap_or_else(|| "id".to_string());
        let assign = match holder {
            Holder::Many => quote! {
                if let relorm_core::Loaded::Many(items) = loaded {
                    parent.#field_name = items;
                }
            },
            Holder::One => quote! {
                if let relorm_core::Loaded::One(item) = loaded {
                    parent.#field_name = item;
                }
            },
            Holder::OneBoxed => quote! {
                if let relorm_core::Loaded::One(item) = loaded {
                    parent.#field_name = item.map(::std::boxed::Box::new);
                }
            },
        };
        Some(quote! {
            relations.register(relorm_core::Relation::<Self, #target>::#constructor(
                #name,
                #foreign_key,
                #references,
                |parent, loaded| {
                    #assign
                },
            ));
        })
    });

    quote! {
        let _ = &relations;
        #(#registrations)*
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expand(input: syn::DeriveInput) -> String {
        let model = parse_model(&input).unwrap();
        generate_model_impl(&model).to_string()
    }

    #[test]
    fn expands_mapping_table_and_relations() {
        let out = expand(parse_quote! {
            struct User {
                #[relorm(column = "id", constraints = "primary key,auto_increment")]
                id: i64,
                #[relorm(column = "email")]
                email: String,
                #[relorm(has_many(foreign_key = "user_id"))]
                posts: Vec<Post>,
                #[relorm(has_one)]
                profile: Option<Profile>,
            }
        });
        assert!(out.contains("TABLE_NAME"));
        assert!(out.contains("\"users\""));
        assert!(out.contains("Relation :: < Self , Post > :: has_many"));
        assert!(out.contains("\"user_id\""));
        assert!(!out.contains("decode :: nested"));
        assert!(out.contains("Value :: BigInt (id)"));
    }

    #[test]
    fn only_nested_fields_decode_joined_columns() {
        let out = expand(parse_quote! {
            struct Book {
                #[relorm(column = "id")]
                id: i64,
                #[relorm(column = "writer_id")]
                writer_id: i64,
                #[relorm(belongs_to)]
                writer: Option<Writer>,
                #[relorm(nested = "cover")]
                cover: Option<Box<Cover>>,
            }
        });
        assert!(out.contains("decode :: nested :: < Cover > (row , \"cover\" , & own)"));
        assert!(!out.contains("nested :: < Writer >"));
        assert!(out.contains("\"writer_id\""));
    }

    #[test]
    fn unmapped_fields_default() {
        let out = expand(parse_quote! {
            #[relorm(table = "notes")]
            struct Note {
                #[relorm(column)]
                body: String,
                cache: Vec<u8>,
            }
        });
        assert!(out.contains("Default :: default ()"));
        assert!(out.contains("let _ = id ;"));
        assert!(!out.contains("\"cache\""));
    }
}
