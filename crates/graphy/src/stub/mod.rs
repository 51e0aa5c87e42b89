//! Request stubs: queries compiled against the registered operations and types,
//! independently of the variable values.

mod cache;
mod compile;
mod error;

use std::{any::TypeId, sync::Arc};

use async_graphql_parser::{types::Type, Pos};
use async_graphql_value::{ConstValue, Name, Value};

pub use cache::{CachedStub, InMemoryStubCache, RequestStubCache};
pub use error::CompileError;

pub(crate) use cache::cache_key;
pub(crate) use compile::{compile, CompileOptions};

use crate::{
    operation::{OperationDescriptor, OperationKind},
    registry::TypeDescriptor,
    types::{TypeRef, Variables},
    ErrorCode, GraphqlError,
};

/// A compiled operation.
#[derive(Debug)]
pub struct RequestStub {
    pub(crate) kind: OperationKind,
    pub(crate) name: Option<String>,
    pub(crate) variables: Vec<VariableDefinition>,
    pub(crate) selection_set: SelectionSet,
}

impl RequestStub {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Estimated cost of the whole operation.
    pub fn complexity(&self) -> usize {
        self.selection_set.complexity()
    }

    /// Applies defaults and checks that every required variable is provided.
    pub(crate) fn coerce_variables(&self, mut provided: Variables) -> Result<Variables, GraphqlError> {
        let mut variables = Variables::default();

        for definition in &self.variables {
            let value = match provided.shift_remove(&definition.name) {
                None => definition.default.clone(),
                value => value,
            };

            match value {
                Some(ConstValue::Null) | None if !definition.ty.nullable => {
                    return Err(GraphqlError::new(
                        format!(
                            "variable ${} of required type {} was not provided",
                            definition.name, definition.ty
                        ),
                        ErrorCode::VariableError,
                    )
                    .with_location(definition.pos));
                }
                Some(value) => {
                    variables.insert(definition.name.clone(), value);
                }
                None => {}
            }
        }

        Ok(variables)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VariableDefinition {
    pub(crate) name: Name,
    pub(crate) ty: Type,
    pub(crate) default: Option<ConstValue>,
    pub(crate) pos: Pos,
}

/// Fields of a selection set, fragments inlined, in selection order.
#[derive(Debug, Default)]
pub(crate) struct SelectionSet {
    pub(crate) fields: Vec<FieldNode>,
}

impl SelectionSet {
    pub(crate) fn complexity(&self) -> usize {
        self.fields
            .iter()
            .fold(0usize, |total, field| total.saturating_add(field.complexity))
    }
}

#[derive(Debug)]
pub(crate) struct FieldNode {
    pub(crate) response_key: Name,
    pub(crate) aliased: bool,
    pub(crate) name: Name,
    pub(crate) pos: Pos,
    /// Concrete type the field applies to, when selected through a type condition.
    pub(crate) condition: Option<TypeCondition>,
    /// `@skip` and `@include` directives of the field and its enclosing fragments.
    pub(crate) directives: Vec<Condition>,
    pub(crate) arguments: Vec<(Name, Value)>,
    pub(crate) target: FieldTarget,
    pub(crate) ty: TypeRef,
    pub(crate) selection_set: SelectionSet,
    pub(crate) complexity: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TypeCondition {
    pub(crate) type_id: TypeId,
}

#[derive(Debug, Clone)]
pub(crate) enum Condition {
    Skip(Value),
    Include(Value),
}

#[derive(Debug)]
pub(crate) enum FieldTarget {
    Operation(Arc<OperationDescriptor>),
    Field { owner: Arc<TypeDescriptor>, index: usize },
    /// Looked up on the concrete implementor at execution.
    InterfaceField,
    Typename,
}
