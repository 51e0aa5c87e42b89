use std::{
    any::Any,
    ops::{Deref, DerefMut},
};

use async_graphql_value::{ConstValue, Name, Value};
use indexmap::IndexMap;

use super::{builtin::mismatch, InputType, NamedType};
use crate::{
    registry::{GraphQLType, ScalarKind, TypeKind, TypeRegistry},
    Error,
};

/// Request variables, keyed by name without the `$`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Variables(IndexMap<Name, ConstValue>);

impl Variables {
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        match value {
            serde_json::Value::Null => Ok(Variables::default()),
            value => serde_json::from_value(value),
        }
    }
}

impl Deref for Variables {
    type Target = IndexMap<Name, ConstValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Variables {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<(Name, ConstValue)> for Variables {
    fn from_iter<I: IntoIterator<Item = (Name, ConstValue)>>(iter: I) -> Self {
        Variables(iter.into_iter().collect())
    }
}

/// Where an input value came from. Custom scalars parse literals and variables separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Literal,
    Variable,
}

/// An argument or input field value, not yet coerced to its Rust type.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// Not provided at all.
    Absent,
    /// Written in the query text. May still reference variables.
    Literal(Value),
    /// Provided through the request variables.
    Variable(ConstValue),
    /// Arguments bound to the fields of a single input object.
    Fields(IndexMap<Name, InputValue>),
}

impl InputValue {
    /// Replaces a top-level variable reference by the variable value.
    #[must_use]
    pub fn resolve_variable(self, cx: &InputContext<'_>) -> InputValue {
        match self {
            InputValue::Literal(Value::Variable(name)) => cx
                .variables
                .get(&name)
                .cloned()
                .map_or(InputValue::Absent, InputValue::Variable),
            value => value,
        }
    }

    pub fn source(&self) -> ValueSource {
        match self {
            InputValue::Variable(_) => ValueSource::Variable,
            InputValue::Absent | InputValue::Literal(_) | InputValue::Fields(_) => ValueSource::Literal,
        }
    }

    /// Absent or explicitly null.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            InputValue::Absent | InputValue::Literal(Value::Null) | InputValue::Variable(ConstValue::Null)
        )
    }

    pub fn into_const(self, cx: &InputContext<'_>) -> Option<ConstValue> {
        match self.resolve_variable(cx) {
            InputValue::Absent => None,
            InputValue::Literal(value) => Some(
                value
                    .into_const_with(|name| {
                        Ok::<_, std::convert::Infallible>(cx.variables.get(&name).cloned().unwrap_or(ConstValue::Null))
                    })
                    .unwrap_or_else(|never| match never {}),
            ),
            InputValue::Variable(value) => Some(value),
            InputValue::Fields(fields) => Some(ConstValue::Object(
                fields
                    .into_iter()
                    .filter_map(|(name, value)| Some((name, value.into_const(cx)?)))
                    .collect(),
            )),
        }
    }

    /// Items of a list value. A single non-list value is coerced into a list of one.
    pub fn into_list(self, cx: &InputContext<'_>) -> Vec<InputValue> {
        match self.resolve_variable(cx) {
            InputValue::Absent => Vec::new(),
            InputValue::Literal(Value::List(items)) => items.into_iter().map(InputValue::Literal).collect(),
            InputValue::Variable(ConstValue::List(items)) => items.into_iter().map(InputValue::Variable).collect(),
            value => vec![value],
        }
    }

    pub fn into_fields(self, cx: &InputContext<'_>) -> Result<IndexMap<Name, InputValue>, Error> {
        match self.resolve_variable(cx) {
            InputValue::Fields(fields) => Ok(fields),
            InputValue::Literal(Value::Object(fields)) => Ok(fields
                .into_iter()
                .map(|(name, value)| (name, InputValue::Literal(value)))
                .collect()),
            InputValue::Variable(ConstValue::Object(fields)) => Ok(fields
                .into_iter()
                .map(|(name, value)| (name, InputValue::Variable(value)))
                .collect()),
            value => match value.into_const(cx) {
                Some(value) => Err(mismatch("input object", &value)),
                None => Err(Error::new("expected an input object, found null")),
            },
        }
    }
}

/// Everything needed to coerce input values: the variables and the type registry.
pub struct InputContext<'a> {
    pub(crate) registry: &'a TypeRegistry,
    pub(crate) variables: &'a Variables,
}

impl<'a> InputContext<'a> {
    pub fn new(registry: &'a TypeRegistry, variables: &'a Variables) -> Self {
        InputContext { registry, variables }
    }

    pub fn parse<T: InputType>(&self, value: InputValue) -> Result<T, Error> {
        T::parse(value, self)
    }

    pub(crate) fn parse_host<T: GraphQLType>(&self, value: InputValue) -> Result<T, Error> {
        let value = value.resolve_variable(self);
        let descriptor = self.registry.descriptor(NamedType::host::<T>())?;

        if value.is_missing() {
            return Err(Error::new(format!(
                "expected a value of type {}, found null",
                descriptor.name()
            )));
        }

        let parsed = match descriptor.kind() {
            TypeKind::Scalar(ScalarKind::Custom(scalar)) => {
                let source = value.source();
                let constant = value.into_const(self).unwrap_or(ConstValue::Null);
                scalar.parse(source, &constant)?
            }
            TypeKind::Scalar(ScalarKind::Host(scalar)) => {
                let constant = value.into_const(self).unwrap_or(ConstValue::Null);
                scalar.parse(&constant)?
            }
            TypeKind::Enum(values) => {
                let constant = value.into_const(self).unwrap_or(ConstValue::Null);
                let name = match &constant {
                    ConstValue::Enum(name) => name.as_str(),
                    ConstValue::String(name) => name.as_str(),
                    other => return Err(mismatch(descriptor.name(), other)),
                };
                values
                    .iter()
                    .find(|value| value.name() == name)
                    .ok_or_else(|| Error::new(format!("enum {} has no value {name}", descriptor.name())))?
                    .make()
            }
            TypeKind::InputObject(_) => {
                let mut fields = InputFields {
                    type_name: descriptor.name(),
                    fields: value.into_fields(self)?,
                    cx: self,
                };
                let parsed = T::from_input(&mut fields)?;
                fields.finish()?;
                parsed.validate()?;
                return Ok(parsed);
            }
            TypeKind::Scalar(ScalarKind::Builtin(_))
            | TypeKind::Object(_)
            | TypeKind::Union(_)
            | TypeKind::Interface(_) => {
                return Err(Error::new(format!(
                    "{} cannot be used as an input type",
                    descriptor.name()
                )))
            }
        };

        let parsed = downcast_input::<T>(parsed, descriptor.name())?;
        parsed.validate()?;
        Ok(parsed)
    }
}

fn downcast_input<T: 'static>(value: Box<dyn Any + Send>, type_name: &str) -> Result<T, Error> {
    value
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| Error::new(format!("parser of {type_name} produced a value of another type")))
}

/// Fields of an input object being parsed by [`GraphQLType::from_input`].
pub struct InputFields<'a> {
    type_name: &'a str,
    fields: IndexMap<Name, InputValue>,
    cx: &'a InputContext<'a>,
}

impl InputFields<'_> {
    /// Removes and parses a field. Absent fields parse as `None` for optional types.
    pub fn take<T: InputType>(&mut self, name: &str) -> Result<T, Error> {
        let value = self.fields.shift_remove(name).unwrap_or(InputValue::Absent);
        T::parse(value, self.cx)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn type_name(&self) -> &str {
        self.type_name
    }

    pub(crate) fn finish(self) -> Result<(), Error> {
        match self.fields.keys().next() {
            Some(name) => Err(Error::new(format!(
                "unknown field {name} for input object {}",
                self.type_name
            ))),
            None => Ok(()),
        }
    }
}
