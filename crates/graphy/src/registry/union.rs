use super::{
    descriptor::{FieldSource, ObjectFields, TypeDescriptor, TypeKind},
    RegistrationError,
};
use crate::types::{FieldShape, HostValue, Resolved, TypeRef};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnionError {
    #[error("union {type_name}: all fields nil")]
    AllFieldsNil { type_name: String },
    #[error("union {type_name}: more than one field is not nil ({})", .fields.join(", "))]
    MultipleFieldsSet { type_name: String, fields: Vec<String> },
    #[error("union {type_name}: {message}")]
    Member { type_name: String, message: String },
}

/// Result of [`dereference_union_value`].
#[derive(Debug)]
pub enum Dereferenced {
    /// The value is not a union and is returned as is.
    Unchanged(HostValue),
    /// The single non-nil member of a union.
    Member { field: String, ty: TypeRef, value: Resolved },
}

/// Checks that every field of a union type can be nil.
pub(crate) fn classify(type_name: &str, fields: &ObjectFields) -> Result<(), RegistrationError> {
    for field in fields.fields() {
        let kind = if field.depth() > 0 {
            Some("embedded field".to_string())
        } else if field.source() == FieldSource::Method {
            Some("method".to_string())
        } else {
            match field.shape() {
                FieldShape::Pointer | FieldShape::Slice | FieldShape::Map | FieldShape::Interface => None,
                FieldShape::Value => Some("plain value".to_string()),
            }
        };

        if let Some(kind) = kind {
            return Err(RegistrationError::InvalidUnionFieldKind {
                type_name: type_name.to_string(),
                field: field.name().to_string(),
                kind,
            });
        }
    }

    Ok(())
}

/// Replaces a union value by its only non-nil member.
///
/// Values of types that are not unions are returned unchanged.
pub fn dereference_union_value(descriptor: &TypeDescriptor, value: HostValue) -> Result<Dereferenced, UnionError> {
    let TypeKind::Union(fields) = descriptor.kind() else {
        return Ok(Dereferenced::Unchanged(value));
    };

    let mut set = Vec::new();
    let mut selected = None;

    for field in fields.fields() {
        let resolved = (field.getter)(value.as_any()).map_err(|error| UnionError::Member {
            type_name: descriptor.name().to_string(),
            message: error.message,
        })?;

        if resolved.is_nil() {
            continue;
        }

        set.push(field.name().to_string());
        selected = Some((field, resolved));
    }

    match (set.len(), selected) {
        (1, Some((field, resolved))) => Ok(Dereferenced::Member {
            field: field.name().to_string(),
            ty: field.ty().clone(),
            value: resolved,
        }),
        (0, _) | (_, None) => Err(UnionError::AllFieldsNil {
            type_name: descriptor.name().to_string(),
        }),
        _ => Err(UnionError::MultipleFieldsSet {
            type_name: descriptor.name().to_string(),
            fields: set,
        }),
    }
}
