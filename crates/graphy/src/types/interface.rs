use std::{fmt, marker::PhantomData};

use super::{FieldShape, HostValue, NamedType, OutputType, Resolved, TypeRef};
use crate::registry::GraphQLType;

/// A value exposed through the interface `I`.
///
/// The concrete type must be listed as an implementor of `I`, which is checked when the
/// value is resolved.
pub struct Dyn<I> {
    value: HostValue,
    _interface: PhantomData<fn() -> I>,
}

impl<I: GraphQLType> Dyn<I> {
    pub fn new<T: GraphQLType>(value: T) -> Self {
        Dyn {
            value: HostValue::new(value),
            _interface: PhantomData,
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

impl<I> Clone for Dyn<I> {
    fn clone(&self) -> Self {
        Dyn {
            value: self.value.clone(),
            _interface: PhantomData,
        }
    }
}

impl<I> fmt::Debug for Dyn<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dyn").field(&self.value).finish()
    }
}

impl<I: GraphQLType> OutputType for Dyn<I> {
    fn type_ref() -> TypeRef {
        TypeRef::named(NamedType::host::<I>())
    }

    fn shape() -> FieldShape {
        FieldShape::Interface
    }

    fn resolve(&self) -> Resolved {
        Resolved::Host(self.value.clone())
    }
}
