//! Compile-time validation for the Model derive macro.
//!
//! Problems are collected and reported together, each pointing at the
//! offending field.

use std::collections::HashSet;

use syn::Error;

use crate::parse::{FieldDef, Holder, ModelDef, RelationKindAttr, relation_holder};

/// Validate a parsed model definition.
pub fn validate_model(model: &ModelDef) -> Result<(), Error> {
    let mut errors = Vec::new();

    validate_has_columns(model, &mut errors);
    validate_no_duplicate_columns(model, &mut errors);
    validate_single_primary_key(model, &mut errors);

    for field in &model.fields {
        validate_field(field, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        let mut combined = errors.remove(0);
        for err in errors {
            combined.combine(err);
        }
        Err(combined)
    }
}

fn validate_has_columns(model: &ModelDef, errors: &mut Vec<Error>) {
    if model.mapped_fields().is_empty() {
        errors.push(Error::new(
            model.name.span(),
            "Model struct must map at least one field with `#[relorm(column)]`",
        ));
    }
}

fn validate_no_duplicate_columns(model: &ModelDef, errors: &mut Vec<Error>) {
    let mut seen = HashSet::new();
    for field in model.mapped_fields() {
        if !seen.insert(field.column_name()) {
            errors.push(Error::new(
                field.name.span(),
                format!("duplicate column name `{}`", field.column_name()),
            ));
        }
    }
}

fn validate_single_primary_key(model: &ModelDef, errors: &mut Vec<Error>) {
    for field in model.fields.iter().filter(|f| f.primary_key).skip(1) {
        errors.push(Error::new(
            field.name.span(),
            "only one field can be annotated `primary key`",
        ));
    }
}

fn validate_field(field: &FieldDef, errors: &mut Vec<Error>) {
    if (field.primary_key || field.auto_increment || !field.constraints.is_empty())
        && field.column.is_none()
    {
        errors.push(Error::new(
            field.name.span(),
            "constraints need a mapped column; add `column` to this field",
        ));
    }

    let Some(relation) = &field.relation else {
        let embeddable = matches!(
            relation_holder(&field.ty),
            Some((Holder::One | Holder::OneBoxed, _))
        );
        if field.nested.is_some() && !embeddable {
            errors.push(Error::new(
                field.name.span(),
                "`nested` fields must be `Option<T>` or `Option<Box<T>>`",
            ));
        }
        return;
    };

    if field.column.is_some() {
        errors.push(Error::new(
            relation.span,
            "a relation field cannot also be a mapped column",
        ));
    }

    let holder = relation_holder(&field.ty).map(|(h, _)| h);
    let ok = match relation.kind {
        RelationKindAttr::HasMany => holder == Some(Holder::Many),
        RelationKindAttr::HasOne | RelationKindAttr::BelongsTo => {
            matches!(holder, Some(Holder::One | Holder::OneBoxed))
        }
    };
    if !ok {
        let expected = match relation.kind {
            RelationKindAttr::HasMany => "`Vec<T>`",
            RelationKindAttr::HasOne | RelationKindAttr::BelongsTo => {
                "`Option<T>` or `Option<Box<T>>`"
            }
        };
        errors.push(Error::new(
            relation.span,
            format!("`{}` relation fields must be {}", relation.kind.constructor(), expected),
        ));
    }
}
