use async_graphql_value::{Name, Value};

use crate::{
    operation::{Binding, OperationDescriptor},
    types::InputValue,
};

/// Values of the resolver parameters, in parameter order.
///
/// Values are left as written in the query, variables are resolved while parsing.
pub(super) fn bind_arguments(operation: &OperationDescriptor, arguments: &[(Name, Value)]) -> Vec<InputValue> {
    let literal = |name: &str| {
        arguments
            .iter()
            .find(|(argument, _)| argument.as_str() == name)
            .map_or(InputValue::Absent, |(_, value)| InputValue::Literal(value.clone()))
    };

    match &operation.binding {
        Binding::Struct { ty, .. } if arguments.is_empty() && ty.is_nullable() => vec![InputValue::Absent],
        Binding::Struct { .. } => vec![InputValue::Fields(
            arguments
                .iter()
                .map(|(name, value)| (name.clone(), InputValue::Literal(value.clone())))
                .collect(),
        )],
        Binding::Arguments(params) => params.iter().map(|param| literal(&param.name)).collect(),
    }
}
