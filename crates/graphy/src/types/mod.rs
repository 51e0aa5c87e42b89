//! Mapping between Rust types and GraphQL types.
//!
//! [`OutputType`] and [`InputType`] are implemented for the builtin scalars, the
//! usual wrappers and every [`GraphQLType`]. They replace runtime reflection: each
//! implementation knows its [`TypeRef`] and how to turn a value into a [`Resolved`]
//! tree, or how to parse one out of an [`InputValue`].

mod builtin;
mod input;
mod interface;

use std::{any::TypeId, fmt, sync::Arc};

use async_graphql_value::ConstValue;

pub use builtin::ID;
pub use input::{InputContext, InputFields, InputValue, ValueSource, Variables};
pub use interface::Dyn;

use crate::{
    registry::{BuildStack, GraphQLType, TypeBuilder, TypeDescriptor, TypeRegistry},
    Error, RegistrationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
pub enum BuiltinScalar {
    String,
    Int,
    Float,
    Boolean,
    #[strum(serialize = "ID")]
    Id,
}

pub(crate) type BuildFn = fn(&TypeRegistry, &mut BuildStack) -> Result<TypeDescriptor, RegistrationError>;

#[derive(Clone, Copy)]
pub(crate) enum Origin {
    Builtin(BuiltinScalar),
    Host(BuildFn),
}

/// A named GraphQL type, identified by the `TypeId` of the Rust type backing it.
#[derive(Clone, Copy)]
pub struct NamedType {
    id: TypeId,
    rust_name: &'static str,
    origin: Origin,
}

impl NamedType {
    pub(crate) fn builtin<T: 'static>(scalar: BuiltinScalar) -> Self {
        NamedType {
            id: TypeId::of::<T>(),
            rust_name: std::any::type_name::<T>(),
            origin: Origin::Builtin(scalar),
        }
    }

    pub fn host<T: GraphQLType>() -> Self {
        NamedType {
            id: TypeId::of::<T>(),
            rust_name: std::any::type_name::<T>(),
            origin: Origin::Host(build_host::<T>),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    pub fn builtin_scalar(&self) -> Option<BuiltinScalar> {
        match self.origin {
            Origin::Builtin(scalar) => Some(scalar),
            Origin::Host(_) => None,
        }
    }

    pub(crate) fn origin(&self) -> Origin {
        self.origin
    }
}

fn build_host<T: GraphQLType>(registry: &TypeRegistry, stack: &mut BuildStack) -> Result<TypeDescriptor, RegistrationError> {
    let mut builder = TypeBuilder::<T>::new();
    T::describe(&mut builder);
    builder.finish(registry, stack)
}

impl PartialEq for NamedType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for NamedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamedType").field(&self.rust_name).finish()
    }
}

/// Reference to a GraphQL type with its wrapping: nullability, lists and maps.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Named { ty: NamedType, nullable: bool },
    List { item: Box<TypeRef>, nullable: bool },
    /// JSON object keyed by strings, always serialized as a leaf.
    Map { value: Box<TypeRef>, nullable: bool },
}

impl TypeRef {
    pub fn named(ty: NamedType) -> Self {
        TypeRef::Named { ty, nullable: false }
    }

    pub fn list(item: TypeRef) -> Self {
        TypeRef::List {
            item: Box::new(item),
            nullable: false,
        }
    }

    pub fn map(value: TypeRef) -> Self {
        TypeRef::Map {
            value: Box::new(value),
            nullable: false,
        }
    }

    #[must_use]
    pub fn into_nullable(mut self) -> Self {
        match &mut self {
            TypeRef::Named { nullable, .. } | TypeRef::List { nullable, .. } | TypeRef::Map { nullable, .. } => {
                *nullable = true;
            }
        }
        self
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            TypeRef::Named { nullable, .. } | TypeRef::List { nullable, .. } | TypeRef::Map { nullable, .. } => *nullable,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, TypeRef::List { .. })
    }

    /// The innermost named type.
    pub fn named_type(&self) -> NamedType {
        match self {
            TypeRef::Named { ty, .. } => *ty,
            TypeRef::List { item, .. } => item.named_type(),
            TypeRef::Map { value, .. } => value.named_type(),
        }
    }
}

/// Syntactic shape of a field type, used to classify union members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum FieldShape {
    Value,
    Pointer,
    Slice,
    Map,
    Interface,
}

/// A value of a registered host type, shared without copying.
#[derive(Clone)]
pub struct HostValue {
    ty: NamedType,
    value: Arc<dyn std::any::Any + Send + Sync>,
}

impl HostValue {
    pub(crate) fn new<T: GraphQLType>(value: T) -> Self {
        HostValue {
            ty: NamedType::host::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn named_type(&self) -> NamedType {
        self.ty
    }

    pub fn type_id(&self) -> TypeId {
        self.ty.id()
    }

    pub fn as_any(&self) -> &(dyn std::any::Any + 'static) {
        &*self.value
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostValue").field(&self.ty.rust_name()).finish()
    }
}

/// Output of a resolver or field accessor, before it is shaped by the selection set.
#[derive(Debug, Clone)]
pub enum Resolved {
    Null,
    Const(ConstValue),
    List(Vec<Resolved>),
    Map(Vec<(String, Resolved)>),
    Host(HostValue),
}

impl Resolved {
    /// Nil in the union sense: null, or an empty list or map.
    pub fn is_nil(&self) -> bool {
        match self {
            Resolved::Null => true,
            Resolved::List(items) => items.is_empty(),
            Resolved::Map(entries) => entries.is_empty(),
            Resolved::Const(_) | Resolved::Host(_) => false,
        }
    }
}

/// A Rust type that can be returned by resolvers and fields.
pub trait OutputType: Send + Sync + 'static {
    fn type_ref() -> TypeRef;

    fn shape() -> FieldShape {
        FieldShape::Value
    }

    fn resolve(&self) -> Resolved;
}

/// A Rust type that can be received as an argument.
pub trait InputType: Sized + Send + 'static {
    fn type_ref() -> TypeRef;

    fn parse(value: InputValue, cx: &InputContext<'_>) -> Result<Self, Error>;
}

impl<T: GraphQLType> OutputType for T {
    fn type_ref() -> TypeRef {
        TypeRef::named(NamedType::host::<T>())
    }

    fn resolve(&self) -> Resolved {
        Resolved::Host(HostValue::new(self.clone()))
    }
}

impl<T: GraphQLType> InputType for T {
    fn type_ref() -> TypeRef {
        TypeRef::named(NamedType::host::<T>())
    }

    fn parse(value: InputValue, cx: &InputContext<'_>) -> Result<Self, Error> {
        cx.parse_host::<T>(value)
    }
}
