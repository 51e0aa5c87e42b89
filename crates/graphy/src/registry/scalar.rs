use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

use async_graphql_value::ConstValue;

use super::descriptor::{downcast, Parser, Serializer};
use crate::{types::ValueSource, Error};

/// A custom scalar registered on the schema for a host type.
///
/// Registration takes precedence over the type's own description: values of the type are
/// serialized with `serialize` and variables parsed with `parse_value`. Literals written in
/// the query use the same parser unless [`ScalarDescriptor::with_literal_parser`] sets one.
pub struct ScalarDescriptor {
    name: String,
    description: Option<String>,
    type_id: TypeId,
    rust_name: &'static str,
    serialize: Serializer,
    parse_value: Parser,
    parse_literal: Parser,
}

impl ScalarDescriptor {
    pub fn new<T, S, V, E>(name: impl Into<String>, serialize: S, parse_value: V) -> Self
    where
        T: Send + Sync + 'static,
        S: Fn(&T) -> ConstValue + Send + Sync + 'static,
        V: Fn(&ConstValue) -> Result<T, E> + Send + Sync + 'static,
        E: Into<Error>,
    {
        let parse_value = erase_parser(parse_value);
        ScalarDescriptor {
            name: name.into(),
            description: None,
            type_id: TypeId::of::<T>(),
            rust_name: std::any::type_name::<T>(),
            serialize: Arc::new(move |value: &(dyn Any + 'static)| downcast::<T>(value).map(&serialize)),
            parse_literal: parse_value.clone(),
            parse_value,
        }
    }

    /// Parses literals written in the query text differently from variables.
    ///
    /// `T` must be the type the scalar was created for, values of any other type are
    /// rejected when the argument is bound.
    #[must_use]
    pub fn with_literal_parser<T, L, E>(mut self, parse_literal: L) -> Self
    where
        T: Send + 'static,
        L: Fn(&ConstValue) -> Result<T, E> + Send + Sync + 'static,
        E: Into<Error>,
    {
        self.parse_literal = erase_parser(parse_literal);
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    pub(crate) fn serialize(&self, value: &(dyn Any + 'static)) -> Result<ConstValue, Error> {
        (self.serialize)(value)
    }

    pub(crate) fn parse(&self, source: ValueSource, value: &ConstValue) -> Result<Box<dyn Any + Send>, Error> {
        match source {
            ValueSource::Literal => (self.parse_literal)(value),
            ValueSource::Variable => (self.parse_value)(value),
        }
    }
}

impl fmt::Debug for ScalarDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarDescriptor")
            .field("name", &self.name)
            .field("rust_name", &self.rust_name)
            .finish_non_exhaustive()
    }
}

pub(crate) fn erase_parser<T, P, E>(parse: P) -> Parser
where
    T: Send + 'static,
    P: Fn(&ConstValue) -> Result<T, E> + Send + Sync + 'static,
    E: Into<Error>,
{
    Arc::new(move |value: &ConstValue| {
        parse(value)
            .map(|value| Box::new(value) as Box<dyn Any + Send>)
            .map_err(Into::into)
    })
}
