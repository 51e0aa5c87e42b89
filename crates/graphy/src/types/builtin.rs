use std::{
    collections::HashMap,
    fmt,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use async_graphql_value::{ConstValue, Number};
use indexmap::IndexMap;

use super::{BuiltinScalar, FieldShape, InputContext, InputType, InputValue, NamedType, OutputType, Resolved, TypeRef};
use crate::Error;

/// The GraphQL `ID` scalar. Accepts strings and integers as input, always serializes as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ID(pub String);

impl Deref for ID {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ID {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<String> for ID {
    fn from(value: String) -> Self {
        ID(value)
    }
}

impl From<&str> for ID {
    fn from(value: &str) -> Self {
        ID(value.to_string())
    }
}

impl fmt::Display for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn builtin<T: 'static>(scalar: BuiltinScalar) -> TypeRef {
    TypeRef::named(NamedType::builtin::<T>(scalar))
}

pub(super) fn mismatch(expected: impl fmt::Display, found: &ConstValue) -> Error {
    Error::new(format!("expected a value of type {expected}, found {found}"))
}

fn expect_value(value: InputValue, cx: &InputContext<'_>, expected: BuiltinScalar) -> Result<ConstValue, Error> {
    match value.into_const(cx) {
        None | Some(ConstValue::Null) => Err(Error::new(format!(
            "expected a value of type {expected}, found null"
        ))),
        Some(value) => Ok(value),
    }
}

impl OutputType for String {
    fn type_ref() -> TypeRef {
        builtin::<String>(BuiltinScalar::String)
    }

    fn resolve(&self) -> Resolved {
        Resolved::Const(ConstValue::String(self.clone()))
    }
}

impl InputType for String {
    fn type_ref() -> TypeRef {
        builtin::<String>(BuiltinScalar::String)
    }

    fn parse(value: InputValue, cx: &InputContext<'_>) -> Result<Self, Error> {
        match expect_value(value, cx, BuiltinScalar::String)? {
            ConstValue::String(value) => Ok(value),
            other => Err(mismatch(BuiltinScalar::String, &other)),
        }
    }
}

impl OutputType for bool {
    fn type_ref() -> TypeRef {
        builtin::<bool>(BuiltinScalar::Boolean)
    }

    fn resolve(&self) -> Resolved {
        Resolved::Const(ConstValue::Boolean(*self))
    }
}

impl InputType for bool {
    fn type_ref() -> TypeRef {
        builtin::<bool>(BuiltinScalar::Boolean)
    }

    fn parse(value: InputValue, cx: &InputContext<'_>) -> Result<Self, Error> {
        match expect_value(value, cx, BuiltinScalar::Boolean)? {
            ConstValue::Boolean(value) => Ok(value),
            other => Err(mismatch(BuiltinScalar::Boolean, &other)),
        }
    }
}

macro_rules! integer {
    ($($ty:ty),*) => {
        $(
            impl OutputType for $ty {
                fn type_ref() -> TypeRef {
                    builtin::<$ty>(BuiltinScalar::Int)
                }

                fn resolve(&self) -> Resolved {
                    Resolved::Const(ConstValue::Number(Number::from(*self)))
                }
            }

            impl InputType for $ty {
                fn type_ref() -> TypeRef {
                    builtin::<$ty>(BuiltinScalar::Int)
                }

                fn parse(value: InputValue, cx: &InputContext<'_>) -> Result<Self, Error> {
                    match expect_value(value, cx, BuiltinScalar::Int)? {
                        ConstValue::Number(number) => number
                            .as_i64()
                            .and_then(|value| <$ty>::try_from(value).ok())
                            .ok_or_else(|| Error::new(format!("{number} is out of range for type Int"))),
                        other => Err(mismatch(BuiltinScalar::Int, &other)),
                    }
                }
            }
        )*
    };
}

integer!(i32, i64, u32);

impl OutputType for f64 {
    fn type_ref() -> TypeRef {
        builtin::<f64>(BuiltinScalar::Float)
    }

    fn resolve(&self) -> Resolved {
        Number::from_f64(*self).map_or(Resolved::Null, |number| Resolved::Const(ConstValue::Number(number)))
    }
}

impl InputType for f64 {
    fn type_ref() -> TypeRef {
        builtin::<f64>(BuiltinScalar::Float)
    }

    fn parse(value: InputValue, cx: &InputContext<'_>) -> Result<Self, Error> {
        match expect_value(value, cx, BuiltinScalar::Float)? {
            ConstValue::Number(number) => number
                .as_f64()
                .ok_or_else(|| Error::new(format!("{number} is not a valid Float"))),
            other => Err(mismatch(BuiltinScalar::Float, &other)),
        }
    }
}

impl OutputType for f32 {
    fn type_ref() -> TypeRef {
        builtin::<f32>(BuiltinScalar::Float)
    }

    fn resolve(&self) -> Resolved {
        f64::from(*self).resolve()
    }
}

impl InputType for f32 {
    fn type_ref() -> TypeRef {
        builtin::<f32>(BuiltinScalar::Float)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn parse(value: InputValue, cx: &InputContext<'_>) -> Result<Self, Error> {
        f64::parse(value, cx).map(|value| value as f32)
    }
}

impl OutputType for ID {
    fn type_ref() -> TypeRef {
        builtin::<ID>(BuiltinScalar::Id)
    }

    fn resolve(&self) -> Resolved {
        Resolved::Const(ConstValue::String(self.0.clone()))
    }
}

impl InputType for ID {
    fn type_ref() -> TypeRef {
        builtin::<ID>(BuiltinScalar::Id)
    }

    fn parse(value: InputValue, cx: &InputContext<'_>) -> Result<Self, Error> {
        match expect_value(value, cx, BuiltinScalar::Id)? {
            ConstValue::String(value) => Ok(ID(value)),
            ConstValue::Number(number) if number.is_i64() || number.is_u64() => Ok(ID(number.to_string())),
            other => Err(mismatch(BuiltinScalar::Id, &other)),
        }
    }
}

impl<T: OutputType> OutputType for Option<T> {
    fn type_ref() -> TypeRef {
        T::type_ref().into_nullable()
    }

    fn shape() -> FieldShape {
        FieldShape::Pointer
    }

    fn resolve(&self) -> Resolved {
        match self {
            Some(value) => value.resolve(),
            None => Resolved::Null,
        }
    }
}

impl<T: InputType> InputType for Option<T> {
    fn type_ref() -> TypeRef {
        T::type_ref().into_nullable()
    }

    fn parse(value: InputValue, cx: &InputContext<'_>) -> Result<Self, Error> {
        let value = value.resolve_variable(cx);
        if value.is_missing() {
            return Ok(None);
        }
        T::parse(value, cx).map(Some)
    }
}

impl<T: OutputType> OutputType for Vec<T> {
    fn type_ref() -> TypeRef {
        TypeRef::list(T::type_ref())
    }

    fn shape() -> FieldShape {
        FieldShape::Slice
    }

    fn resolve(&self) -> Resolved {
        Resolved::List(self.iter().map(OutputType::resolve).collect())
    }
}

impl<T: InputType> InputType for Vec<T> {
    fn type_ref() -> TypeRef {
        TypeRef::list(T::type_ref())
    }

    fn parse(value: InputValue, cx: &InputContext<'_>) -> Result<Self, Error> {
        let value = value.resolve_variable(cx);
        if value.is_missing() {
            return Err(Error::new("expected a list, found null"));
        }
        value.into_list(cx).into_iter().map(|item| T::parse(item, cx)).collect()
    }
}

impl<T: OutputType> OutputType for Arc<T> {
    fn type_ref() -> TypeRef {
        T::type_ref()
    }

    fn shape() -> FieldShape {
        T::shape()
    }

    fn resolve(&self) -> Resolved {
        T::resolve(self)
    }
}

impl<T: InputType + Sync> InputType for Arc<T> {
    fn type_ref() -> TypeRef {
        T::type_ref()
    }

    fn parse(value: InputValue, cx: &InputContext<'_>) -> Result<Self, Error> {
        T::parse(value, cx).map(Arc::new)
    }
}

impl<V: OutputType> OutputType for IndexMap<String, V> {
    fn type_ref() -> TypeRef {
        TypeRef::map(V::type_ref())
    }

    fn shape() -> FieldShape {
        FieldShape::Map
    }

    fn resolve(&self) -> Resolved {
        Resolved::Map(self.iter().map(|(key, value)| (key.clone(), value.resolve())).collect())
    }
}

impl<V: OutputType, S: std::hash::BuildHasher + Send + Sync + 'static> OutputType for HashMap<String, V, S> {
    fn type_ref() -> TypeRef {
        TypeRef::map(V::type_ref())
    }

    fn shape() -> FieldShape {
        FieldShape::Map
    }

    fn resolve(&self) -> Resolved {
        let mut entries = self
            .iter()
            .map(|(key, value)| (key.clone(), value.resolve()))
            .collect::<Vec<_>>();
        // Keys are sorted to keep responses stable.
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        Resolved::Map(entries)
    }
}
