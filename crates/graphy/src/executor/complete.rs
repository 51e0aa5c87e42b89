use async_graphql_value::{ConstValue, Name};
use futures::{future::BoxFuture, FutureExt};
use indexmap::IndexMap;

use super::{ExecutionContext, ExecutionResult};
use crate::{
    error::ErrorPath,
    registry::{dereference_union_value, Dereferenced, ScalarKind, TypeDescriptor, TypeKind},
    response::ResponseValue,
    stub::FieldNode,
    types::{HostValue, Resolved, TypeRef},
    Error, ErrorCode,
};

impl ExecutionContext {
    /// Shapes a resolved value by its declared type and the selection set of `field`.
    pub(super) fn complete<'a>(
        &'a self,
        ty: &'a TypeRef,
        value: Resolved,
        field: &'a FieldNode,
        path: ErrorPath,
        depth: usize,
    ) -> BoxFuture<'a, ExecutionResult<ResponseValue>> {
        async move {
            if matches!(value, Resolved::Null) {
                return Ok(ResponseValue::Null);
            }

            match ty {
                TypeRef::Map { .. } => Ok(self.complete_leaf(ty, &value, field, &path)),
                TypeRef::List { item, .. } => {
                    let Resolved::List(mut items) = value else {
                        return Ok(self.field_error(
                            format!("field {} did not resolve to a list", field.name),
                            ErrorCode::ResolverError,
                            field,
                            &path,
                        ));
                    };

                    if let Some(limit) = self.guard.array_limit() {
                        if items.len() > limit {
                            tracing::warn!("Truncated {} items of {path} to {limit}", items.len());
                            items.truncate(limit);
                        }
                    }

                    let values = futures::future::try_join_all(
                        items
                            .into_iter()
                            .enumerate()
                            .map(|(index, value)| self.complete(item, value, field, path.index(index), depth)),
                    )
                    .await?;
                    Ok(ResponseValue::List(values))
                }
                TypeRef::Named { ty: named, .. } => {
                    let descriptor = match self.schema.registry.descriptor(*named) {
                        Ok(descriptor) => descriptor,
                        Err(error) => {
                            tracing::error!("Type {} could not be described: {error}", named.rust_name());
                            return Ok(self.field_error(
                                error.to_string(),
                                ErrorCode::InternalServerError,
                                field,
                                &path,
                            ));
                        }
                    };
                    self.complete_named(&descriptor, value, field, path, depth).await
                }
            }
        }
        .boxed()
    }

    async fn complete_named(
        &self,
        descriptor: &TypeDescriptor,
        value: Resolved,
        field: &FieldNode,
        path: ErrorPath,
        depth: usize,
    ) -> ExecutionResult<ResponseValue> {
        match descriptor.kind() {
            TypeKind::Scalar(_) | TypeKind::Enum(_) => Ok(self.complete_leaf_named(descriptor, &value, field, &path)),
            TypeKind::Object(_) => match value {
                Resolved::Host(host) => self.resolve_object(descriptor, host, field, path, depth).await,
                _ => Ok(self.unexpected(descriptor, field, &path)),
            },
            TypeKind::Union(_) => {
                let Resolved::Host(host) = value else {
                    return Ok(self.unexpected(descriptor, field, &path));
                };
                match dereference_union_value(descriptor, host) {
                    Ok(Dereferenced::Member { ty, value, .. }) => self.complete(&ty, value, field, path, depth).await,
                    Ok(Dereferenced::Unchanged(host)) => self.resolve_object(descriptor, host, field, path, depth).await,
                    Err(error) => Ok(self.field_error(error.to_string(), ErrorCode::ResolverError, field, &path)),
                }
            }
            TypeKind::Interface(interface) => {
                let Resolved::Host(host) = value else {
                    return Ok(self.unexpected(descriptor, field, &path));
                };
                if !interface.implementors().iter().any(|ty| ty.id() == host.type_id()) {
                    return Ok(self.field_error(
                        format!(
                            "{} does not implement interface {}",
                            host.named_type().rust_name(),
                            descriptor.name()
                        ),
                        ErrorCode::ResolverError,
                        field,
                        &path,
                    ));
                }
                match self.schema.registry.descriptor(host.named_type()) {
                    Ok(concrete) => self.resolve_object(&concrete, host, field, path, depth).await,
                    Err(error) => Ok(self.field_error(error.to_string(), ErrorCode::InternalServerError, field, &path)),
                }
            }
            TypeKind::InputObject(_) => Ok(self.field_error(
                format!("input object {} cannot be returned", descriptor.name()),
                ErrorCode::InternalServerError,
                field,
                &path,
            )),
        }
    }

    fn unexpected(&self, descriptor: &TypeDescriptor, field: &FieldNode, path: &ErrorPath) -> ResponseValue {
        self.field_error(
            format!("field {} did not resolve to a value of {}", field.name, descriptor.name()),
            ErrorCode::ResolverError,
            field,
            path,
        )
    }

    fn complete_leaf(&self, ty: &TypeRef, value: &Resolved, field: &FieldNode, path: &ErrorPath) -> ResponseValue {
        match self.serialize_leaf(ty, value) {
            Ok(value) => ResponseValue::Const(value),
            Err(error) => self.field_error(error.message, ErrorCode::ResolverError, field, path),
        }
    }

    fn complete_leaf_named(
        &self,
        descriptor: &TypeDescriptor,
        value: &Resolved,
        field: &FieldNode,
        path: &ErrorPath,
    ) -> ResponseValue {
        match self.serialize_named(descriptor, value) {
            Ok(value) => ResponseValue::Const(value),
            Err(error) => self.field_error(error.message, ErrorCode::ResolverError, field, path),
        }
    }

    /// JSON value of a leaf: a scalar, an enum or a map of them.
    fn serialize_leaf(&self, ty: &TypeRef, value: &Resolved) -> Result<ConstValue, Error> {
        if matches!(value, Resolved::Null) {
            return Ok(ConstValue::Null);
        }

        match (ty, value) {
            (TypeRef::Map { value: item, .. }, Resolved::Map(entries)) => {
                let mut object = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    object.insert(Name::new(key), self.serialize_leaf(item, value)?);
                }
                Ok(ConstValue::Object(object))
            }
            (TypeRef::List { item, .. }, Resolved::List(items)) => {
                let mut values = items.iter().map(|value| self.serialize_leaf(item, value)).collect::<Result<Vec<_>, _>>()?;
                if let Some(limit) = self.guard.array_limit() {
                    values.truncate(limit);
                }
                Ok(ConstValue::List(values))
            }
            (TypeRef::Named { ty, .. }, value) => {
                let descriptor = self.schema.registry.descriptor(*ty).map_err(|error| Error::new(error.to_string()))?;
                self.serialize_named(&descriptor, value)
            }
            (_, _) => Err(Error::new(format!("value does not match the declared type {}", ty.named_type().rust_name()))),
        }
    }

    fn serialize_named(&self, descriptor: &TypeDescriptor, value: &Resolved) -> Result<ConstValue, Error> {
        let host = match value {
            Resolved::Null => return Ok(ConstValue::Null),
            Resolved::Const(value) => return Ok(value.clone()),
            Resolved::Host(host) => host,
            Resolved::List(_) | Resolved::Map(_) => {
                return Err(Error::new(format!("{} expects a single value", descriptor.name())))
            }
        };

        if let Some(scalar) = self.schema.registry.scalar(host.type_id()) {
            return scalar.serialize(host.as_any());
        }

        match descriptor.kind() {
            TypeKind::Scalar(ScalarKind::Custom(scalar)) => scalar.serialize(host.as_any()),
            TypeKind::Scalar(ScalarKind::Host(scalar)) => scalar.serialize(host.as_any()),
            TypeKind::Enum(values) => values
                .iter()
                .find(|value| value.matches(host.as_any()))
                .map(|value| ConstValue::Enum(Name::new(value.name())))
                .ok_or_else(|| Error::new(format!("value is not a member of enum {}", descriptor.name()))),
            TypeKind::Scalar(ScalarKind::Builtin(_)) => Err(not_serializable(descriptor, host)),
            TypeKind::Object(_) | TypeKind::Union(_) | TypeKind::Interface(_) | TypeKind::InputObject(_) => {
                Err(not_serializable(descriptor, host))
            }
        }
    }
}

fn not_serializable(descriptor: &TypeDescriptor, host: &HostValue) -> Error {
    Error::new(format!(
        "{} cannot be serialized as {}",
        host.named_type().rust_name(),
        descriptor.name()
    ))
}
