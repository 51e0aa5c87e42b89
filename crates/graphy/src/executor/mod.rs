//! Execution of request stubs.
//!
//! Sibling fields resolve concurrently, mutation root fields one after the other. Errors
//! of a field null that field and are collected, limit violations and cancellation abort
//! the whole request.

mod arguments;
mod complete;
mod field;

use std::{
    any::{Any, TypeId},
    sync::{Arc, Mutex, PoisonError},
};

use async_graphql_parser::Pos;
use async_graphql_value::{ConstValue, Value};
use tokio_util::sync::CancellationToken;

use crate::{
    context::Context,
    error::ErrorPath,
    limits::{LimitError, LimitGuard},
    operation::OperationKind,
    response::{Response, ResponseValue},
    schema::SchemaInner,
    stub::{Condition, FieldNode, RequestStub, SelectionSet},
    types::Variables,
    ErrorCode, GraphqlError,
};

pub(crate) use field::SubscriptionSource;

/// Error aborting the whole request.
#[derive(Debug)]
pub(crate) struct Aborted(pub(crate) GraphqlError);

impl From<LimitError> for Aborted {
    fn from(error: LimitError) -> Self {
        Aborted(error.into())
    }
}

pub(crate) type ExecutionResult<T> = Result<T, Aborted>;

/// State of one execution: a query, a mutation or a single subscription event.
pub(crate) struct ExecutionContext {
    pub(crate) schema: Arc<SchemaInner>,
    pub(crate) stub: Arc<RequestStub>,
    pub(crate) variables: Arc<Variables>,
    guard: LimitGuard,
    token: CancellationToken,
    context: Context,
    errors: Mutex<Vec<GraphqlError>>,
}

impl ExecutionContext {
    pub(crate) fn new(
        schema: Arc<SchemaInner>,
        stub: Arc<RequestStub>,
        variables: Arc<Variables>,
        token: CancellationToken,
    ) -> Self {
        let guard = LimitGuard::new(schema.config.limits);
        let context = Context::new(token.clone(), schema.data.clone());
        ExecutionContext {
            schema,
            stub,
            variables,
            guard,
            token,
            context,
            errors: Mutex::new(Vec::new()),
        }
    }

    /// Executes the root selection set of a query or mutation.
    pub(crate) async fn execute(self) -> Response {
        let result = self.execute_root().await;
        self.into_response(result)
    }

    async fn execute_root(&self) -> ExecutionResult<ResponseValue> {
        self.check_depth(&self.stub.selection_set, 1)?;
        let fields = self.collect_fields(&self.stub.selection_set, None)?;

        for field in &fields {
            if field.aliased {
                self.guard.add_alias().map_err(|error| located(error, field.pos))?;
            }
        }

        let entries = if self.stub.kind == OperationKind::Mutation {
            let mut entries = Vec::with_capacity(fields.len());
            for field in fields {
                let value = self.resolve_root_field(field).await?;
                entries.push((field.response_key.clone(), value));
            }
            entries
        } else {
            futures::future::try_join_all(fields.into_iter().map(|field| async move {
                let value = self.resolve_root_field(field).await?;
                Ok::<_, Aborted>((field.response_key.clone(), value))
            }))
            .await?
        };

        Ok(ResponseValue::Object(entries))
    }

    pub(crate) fn into_response(self, result: ExecutionResult<ResponseValue>) -> Response {
        match result {
            Ok(data) => Response::new(data, self.errors.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(Aborted(error)) => Response::from_error(error),
        }
    }

    /// Fields of a selection set applying to `concrete`, after `@skip` and `@include`.
    pub(crate) fn collect_fields<'s>(
        &self,
        selection_set: &'s SelectionSet,
        concrete: Option<TypeId>,
    ) -> ExecutionResult<Vec<&'s FieldNode>> {
        let mut fields = Vec::with_capacity(selection_set.fields.len());

        for field in &selection_set.fields {
            if let (Some(condition), Some(concrete)) = (&field.condition, concrete) {
                if condition.type_id != concrete {
                    continue;
                }
            }
            if self.is_included(field)? {
                fields.push(field);
            }
        }

        if let Some(field) = fields.first() {
            self.guard
                .check_fields(fields.len())
                .map_err(|error| located(error, field.pos))?;
        }

        Ok(fields)
    }

    /// Measures the depth of the selected fields before any resolver runs, whatever data
    /// the resolvers return later.
    fn check_depth(&self, selection_set: &SelectionSet, depth: usize) -> ExecutionResult<()> {
        if self.schema.config.limits.max_depth == 0 {
            return Ok(());
        }

        for field in &selection_set.fields {
            if !self.is_included(field)? {
                continue;
            }
            self.guard.check_depth(depth).map_err(|error| located(error, field.pos))?;
            self.check_depth(&field.selection_set, depth + 1)?;
        }

        Ok(())
    }

    fn is_included(&self, field: &FieldNode) -> ExecutionResult<bool> {
        for condition in &field.directives {
            let (name, value, expected) = match condition {
                Condition::Skip(value) => ("skip", value, false),
                Condition::Include(value) => ("include", value, true),
            };

            let flag = match value {
                Value::Boolean(flag) => Some(*flag),
                Value::Variable(variable) => match self.variables.get(variable) {
                    Some(ConstValue::Boolean(flag)) => Some(*flag),
                    _ => None,
                },
                _ => None,
            };

            match flag {
                Some(flag) if flag == expected => {}
                Some(_) => return Ok(false),
                None => {
                    return Err(Aborted(
                        GraphqlError::new(
                            format!("argument if of @{name} must be a Boolean"),
                            ErrorCode::VariableError,
                        )
                        .with_location(field.pos),
                    ))
                }
            }
        }

        Ok(true)
    }

    pub(crate) fn check_cancelled(&self) -> ExecutionResult<()> {
        if self.token.is_cancelled() {
            return Err(Aborted(GraphqlError::cancelled()));
        }
        Ok(())
    }

    /// Records a field error. The field resolves to null.
    pub(crate) fn push_error(&self, error: GraphqlError) {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).push(error);
    }

    pub(crate) fn field_error(
        &self,
        message: impl Into<std::borrow::Cow<'static, str>>,
        code: ErrorCode,
        field: &FieldNode,
        path: &ErrorPath,
    ) -> ResponseValue {
        self.push_error(
            GraphqlError::new(message, code)
                .with_location(field.pos)
                .with_path(path.clone()),
        );
        ResponseValue::Null
    }
}

fn located(error: LimitError, pos: Pos) -> Aborted {
    Aborted(GraphqlError::from(error).with_location(pos))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
