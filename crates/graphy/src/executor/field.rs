use std::panic::AssertUnwindSafe;

use async_graphql_value::ConstValue;
use futures::{FutureExt, StreamExt};

use super::{arguments::bind_arguments, panic_message, Aborted, ExecutionContext, ExecutionResult};
use crate::{
    error::ErrorPath,
    operation::{OperationDescriptor, OperationResolver, ResolverStream},
    registry::{FieldDescriptor, ObjectFields, TypeDescriptor},
    response::ResponseValue,
    stub::{FieldNode, FieldTarget},
    types::{HostValue, InputContext, Resolved},
    ErrorCode, GraphqlError,
};

/// Events of a subscription resolver, not yet shaped by the selection set.
pub(crate) struct SubscriptionSource {
    pub(crate) stream: ResolverStream,
}

impl ExecutionContext {
    pub(super) async fn resolve_root_field(&self, field: &FieldNode) -> ExecutionResult<ResponseValue> {
        self.check_cancelled()?;
        self.guard.check_depth(1).map_err(|error| super::located(error, field.pos))?;

        let path = ErrorPath::root(&field.response_key);
        let operation = match &field.target {
            FieldTarget::Operation(operation) => operation,
            FieldTarget::Typename => {
                return Ok(ResponseValue::Const(ConstValue::String(
                    self.stub.kind.root_type_name().to_string(),
                )))
            }
            FieldTarget::Field { .. } | FieldTarget::InterfaceField => {
                return Err(Aborted(GraphqlError::internal_server_error()));
            }
        };

        self.guard
            .add_complexity(field.complexity)
            .map_err(|error| super::located(error, field.pos))?;

        let OperationResolver::Field(resolver) = &operation.resolver else {
            return Ok(self.field_error(
                format!("subscription {} used in {}", operation.name, self.stub.kind),
                ErrorCode::OperationValidationError,
                field,
                &path,
            ));
        };

        let Some(slot) = self.schema.slots.acquire(&self.token).await else {
            return Err(Aborted(GraphqlError::cancelled()));
        };

        let arguments = bind_arguments(operation, &field.arguments);
        let cx = InputContext::new(&self.schema.registry, &self.variables);
        let call = std::panic::catch_unwind(AssertUnwindSafe(|| {
            resolver.call(self.context.clone(), arguments, &cx)
        }));

        let future = match call {
            Ok(Ok(future)) => future,
            Ok(Err(error)) => {
                self.push_error(
                    error
                        .into_graphql_error(ErrorCode::ValidationError)
                        .with_location(field.pos)
                        .with_path(path),
                );
                return Ok(ResponseValue::Null);
            }
            Err(payload) => return Ok(self.resolver_panicked(operation, &*payload, field, &path)),
        };

        let resolved = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(resolved)) => resolved,
            Ok(Err(error)) => {
                self.push_error(
                    error
                        .into_graphql_error(ErrorCode::ResolverError)
                        .with_location(field.pos)
                        .with_path(path),
                );
                return Ok(ResponseValue::Null);
            }
            Err(payload) => return Ok(self.resolver_panicked(operation, &*payload, field, &path)),
        };
        drop(slot);

        self.complete(&field.ty, resolved, field, path, 1).await
    }

    fn resolver_panicked(
        &self,
        operation: &OperationDescriptor,
        payload: &(dyn std::any::Any + Send),
        field: &FieldNode,
        path: &ErrorPath,
    ) -> ResponseValue {
        let message = panic_message(payload);
        tracing::warn!("Resolver {} panicked: {message}", operation.name);
        self.field_error(
            format!("resolver {} panicked: {message}", operation.name),
            ErrorCode::InternalServerError,
            field,
            path,
        )
    }

    /// Starts the stream of a subscription root field.
    pub(crate) async fn subscribe(&self) -> ExecutionResult<Result<SubscriptionSource, GraphqlError>> {
        self.check_depth(&self.stub.selection_set, 1)?;
        let fields = self.collect_fields(&self.stub.selection_set, None)?;
        let Some(field) = fields.first().copied() else {
            return Ok(Err(GraphqlError::new(
                "the subscription root field is skipped",
                ErrorCode::OperationValidationError,
            )));
        };

        self.guard.check_depth(1).map_err(|error| super::located(error, field.pos))?;
        if field.aliased {
            self.guard.add_alias().map_err(|error| super::located(error, field.pos))?;
        }
        self.guard
            .add_complexity(field.complexity)
            .map_err(|error| super::located(error, field.pos))?;

        let located = |error: GraphqlError| error.with_location(field.pos).with_path(ErrorPath::root(&field.response_key));

        let FieldTarget::Operation(operation) = &field.target else {
            return Ok(Err(located(GraphqlError::new(
                "a subscription must select a subscription field",
                ErrorCode::OperationValidationError,
            ))));
        };
        let OperationResolver::Stream(resolver) = &operation.resolver else {
            return Ok(Err(located(GraphqlError::new(
                format!("{} {} used in subscription", operation.kind, operation.name),
                ErrorCode::OperationValidationError,
            ))));
        };

        let arguments = bind_arguments(operation, &field.arguments);
        let cx = InputContext::new(&self.schema.registry, &self.variables);
        let call = std::panic::catch_unwind(AssertUnwindSafe(|| {
            resolver.call(self.context.clone(), arguments, &cx)
        }));

        let future = match call {
            Ok(Ok(future)) => future,
            Ok(Err(error)) => return Ok(Err(located(error.into_graphql_error(ErrorCode::ValidationError)))),
            Err(payload) => {
                let message = panic_message(&*payload);
                tracing::warn!("Subscription resolver {} panicked: {message}", operation.name);
                return Ok(Err(located(GraphqlError::new(
                    format!("resolver {} panicked: {message}", operation.name),
                    ErrorCode::InternalServerError,
                ))));
            }
        };

        Ok(match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(stream)) => Ok(SubscriptionSource {
                stream: AssertUnwindSafe(stream)
                    .catch_unwind()
                    .scan((), |_, item| {
                        futures::future::ready(match item {
                            Ok(item) => Some(item),
                            Err(payload) => {
                                tracing::warn!("Subscription stream panicked: {}", panic_message(&*payload));
                                None
                            }
                        })
                    })
                    .boxed(),
            }),
            Ok(Err(error)) => Err(located(error.into_graphql_error(ErrorCode::ResolverError))),
            Err(payload) => Err(located(GraphqlError::new(
                format!("resolver {} panicked: {}", operation.name, panic_message(&*payload)),
                ErrorCode::InternalServerError,
            ))),
        })
    }

    /// Shapes one event of a subscription like a root field.
    pub(crate) async fn execute_event(&self, item: Resolved) -> ExecutionResult<ResponseValue> {
        let fields = self.collect_fields(&self.stub.selection_set, None)?;
        let Some(field) = fields.first().copied() else {
            return Ok(ResponseValue::object());
        };

        self.check_cancelled()?;
        let path = ErrorPath::root(&field.response_key);
        let value = self.complete(&field.ty, item, field, path, 1).await?;
        Ok(ResponseValue::Object(vec![(field.response_key.clone(), value)]))
    }

    /// Resolves the selection set of an object value.
    pub(super) async fn resolve_object(
        &self,
        descriptor: &TypeDescriptor,
        value: HostValue,
        parent: &FieldNode,
        path: ErrorPath,
        depth: usize,
    ) -> ExecutionResult<ResponseValue> {
        let fields = self.collect_fields(&parent.selection_set, Some(descriptor.type_id()))?;
        let depth = depth + 1;

        let entries = futures::future::try_join_all(fields.into_iter().map(|field| {
            let path = path.field(&field.response_key);
            let value = &value;
            async move {
                let resolved = self.resolve_field(descriptor, value, field, path, depth).await?;
                Ok::<_, Aborted>((field.response_key.clone(), resolved))
            }
        }))
        .await?;

        tracing::trace!("Resolved {} fields of {} at {path}", entries.len(), descriptor.name());

        Ok(ResponseValue::Object(entries))
    }

    async fn resolve_field(
        &self,
        descriptor: &TypeDescriptor,
        value: &HostValue,
        field: &FieldNode,
        path: ErrorPath,
        depth: usize,
    ) -> ExecutionResult<ResponseValue> {
        self.check_cancelled()?;
        self.guard.check_depth(depth).map_err(|error| super::located(error, field.pos))?;

        match &field.target {
            FieldTarget::Typename => Ok(ResponseValue::Const(ConstValue::String(descriptor.name().to_string()))),
            FieldTarget::Field { owner, index } => match owner.object_fields() {
                Some(fields) => self.read_field(fields, &fields.fields()[*index], value, field, path, depth).await,
                None => Err(Aborted(GraphqlError::internal_server_error())),
            },
            FieldTarget::InterfaceField => {
                let Some((fields, index)) = descriptor
                    .object_fields()
                    .and_then(|fields| Some((fields, fields.position(&field.name)?)))
                else {
                    return Ok(self.field_error(
                        format!("{} does not provide field {}", descriptor.name(), field.name),
                        ErrorCode::ResolverError,
                        field,
                        &path,
                    ));
                };
                self.read_field(fields, &fields.fields()[index], value, field, path, depth).await
            }
            FieldTarget::Operation(_) => Err(Aborted(GraphqlError::internal_server_error())),
        }
    }

    async fn read_field(
        &self,
        fields: &ObjectFields,
        descriptor: &FieldDescriptor,
        value: &HostValue,
        field: &FieldNode,
        path: ErrorPath,
        depth: usize,
    ) -> ExecutionResult<ResponseValue> {
        let target = match fields.navigate(descriptor, value.as_any()) {
            Ok(target) => target,
            Err(error) => return Ok(self.field_error(error.to_string(), ErrorCode::NavigationError, field, &path)),
        };

        let resolved = match std::panic::catch_unwind(AssertUnwindSafe(|| (descriptor.getter)(target))) {
            Ok(Ok(resolved)) => resolved,
            Ok(Err(error)) => {
                self.push_error(
                    error
                        .into_graphql_error(ErrorCode::ResolverError)
                        .with_location(field.pos)
                        .with_path(path),
                );
                return Ok(ResponseValue::Null);
            }
            Err(payload) => {
                let message = panic_message(&*payload);
                tracing::warn!("Field {} panicked: {message}", descriptor.name());
                return Ok(self.field_error(
                    format!("field {} panicked: {message}", descriptor.name()),
                    ErrorCode::InternalServerError,
                    field,
                    &path,
                ));
            }
        };

        self.complete(descriptor.ty(), resolved, field, path, depth).await
    }
}
