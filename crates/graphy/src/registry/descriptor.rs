use std::{any::Any, any::TypeId, fmt, sync::Arc};

use async_graphql_value::ConstValue;
use fxhash::FxHashMap;

use super::ScalarDescriptor;
use crate::{
    types::{BuiltinScalar, FieldShape, NamedType, Resolved, TypeRef},
    Error,
};

pub(crate) type Getter = Arc<dyn Fn(&(dyn Any + 'static)) -> Result<Resolved, Error> + Send + Sync>;

pub(crate) type Projector =
    Arc<dyn for<'a> Fn(&'a (dyn Any + 'static)) -> Option<&'a (dyn Any + 'static)> + Send + Sync>;

pub(crate) type Parser = Arc<dyn Fn(&ConstValue) -> Result<Box<dyn Any + Send>, Error> + Send + Sync>;

pub(crate) type Serializer = Arc<dyn Fn(&(dyn Any + 'static)) -> Result<ConstValue, Error> + Send + Sync>;

pub(crate) fn getter<F>(f: F) -> Getter
where
    F: Fn(&(dyn Any + 'static)) -> Result<Resolved, Error> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn projector<F>(f: F) -> Projector
where
    F: for<'a> Fn(&'a (dyn Any + 'static)) -> Option<&'a (dyn Any + 'static)> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn downcast<'a, T: 'static>(value: &'a (dyn Any + 'static)) -> Result<&'a T, Error> {
    value
        .downcast_ref::<T>()
        .ok_or_else(|| Error::new(format!("expected a value of {}", std::any::type_name::<T>())))
}

/// Description and deprecation of a field, enum value or operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemMeta {
    pub description: Option<String>,
    pub deprecation: Option<String>,
}

impl ItemMeta {
    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn deprecated(&mut self, reason: impl Into<String>) -> &mut Self {
        self.deprecation = Some(reason.into());
        self
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecation.is_some()
    }
}

/// Everything the engine knows about a host type.
pub struct TypeDescriptor {
    pub(crate) ty: NamedType,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) kind: TypeKind,
}

impl TypeDescriptor {
    pub(crate) fn builtin(ty: NamedType, scalar: BuiltinScalar) -> Self {
        TypeDescriptor {
            ty,
            name: scalar.to_string(),
            description: None,
            kind: TypeKind::Scalar(ScalarKind::Builtin(scalar)),
        }
    }

    pub(crate) fn custom_scalar(ty: NamedType, scalar: Arc<ScalarDescriptor>) -> Self {
        TypeDescriptor {
            ty,
            name: scalar.name().to_string(),
            description: scalar.description().map(str::to_string),
            kind: TypeKind::Scalar(ScalarKind::Custom(scalar)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn type_id(&self) -> TypeId {
        self.ty.id()
    }

    pub fn named_type(&self) -> NamedType {
        self.ty
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Scalars and enums are serialized directly and accept no selection set.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar(_) | TypeKind::Enum(_))
    }

    /// Fields of objects and unions.
    pub fn object_fields(&self) -> Option<&ObjectFields> {
        match &self.kind {
            TypeKind::Object(fields) | TypeKind::Union(fields) => Some(fields),
            _ => None,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind: &'static str = (&self.kind).into();
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("rust_name", &self.ty.rust_name())
            .finish_non_exhaustive()
    }
}

#[derive(strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TypeKind {
    Object(ObjectFields),
    Union(ObjectFields),
    Interface(InterfaceShape),
    Enum(Vec<EnumValueDescriptor>),
    InputObject(Vec<InputFieldDescriptor>),
    Scalar(ScalarKind),
}

pub enum ScalarKind {
    Builtin(BuiltinScalar),
    /// Described by the type itself through [`TypeBuilder::scalar`](super::TypeBuilder::scalar).
    Host(HostScalar),
    /// Registered on the schema, taking precedence over the type's own description.
    Custom(Arc<ScalarDescriptor>),
}

pub struct HostScalar {
    pub(crate) serialize: Serializer,
    pub(crate) parse: Parser,
}

impl HostScalar {
    pub(crate) fn serialize(&self, value: &(dyn Any + 'static)) -> Result<ConstValue, Error> {
        (self.serialize)(value)
    }

    pub(crate) fn parse(&self, value: &ConstValue) -> Result<Box<dyn Any + Send>, Error> {
        (self.parse)(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Plain data read from the value.
    Field,
    /// Computed from the value, possibly failing.
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    Value,
    Pointer,
}

/// One indirection from a value to one of its embedded values.
#[derive(Clone)]
pub struct EmbedStep {
    pub(crate) kind: EmbedKind,
    pub(crate) type_name: String,
    pub(crate) project: Projector,
}

#[derive(Clone)]
pub struct FieldDescriptor {
    pub(crate) name: String,
    pub(crate) meta: ItemMeta,
    pub(crate) source: FieldSource,
    pub(crate) ty: TypeRef,
    pub(crate) shape: FieldShape,
    /// Indices into [`ObjectFields::steps`] leading to the value declaring the field.
    pub(crate) path: Vec<usize>,
    pub(crate) getter: Getter,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn source(&self) -> FieldSource {
        self.source
    }

    pub fn shape(&self) -> FieldShape {
        self.shape
    }

    pub fn meta(&self) -> &ItemMeta {
        &self.meta
    }

    /// Number of embeddings crossed to reach the field, 0 for fields declared directly.
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("shape", &self.shape)
            .field("depth", &self.path.len())
            .finish_non_exhaustive()
    }
}

/// Fields of an object or union type, promoted fields of embedded types included.
#[derive(Clone, Default)]
pub struct ObjectFields {
    pub(crate) steps: Vec<EmbedStep>,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) index: FxHashMap<String, usize>,
}

impl ObjectFields {
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn methods(&self) -> impl Iterator<Item = &FieldDescriptor> + '_ {
        self.fields.iter().filter(|field| field.source == FieldSource::Method)
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.position(name).map(|index| &self.fields[index])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

pub struct InterfaceShape {
    pub(crate) fields: Vec<InterfaceField>,
    pub(crate) implementors: Vec<NamedType>,
}

impl InterfaceShape {
    pub fn fields(&self) -> &[InterfaceField] {
        &self.fields
    }

    pub fn implementors(&self) -> &[NamedType] {
        &self.implementors
    }

    pub fn get(&self, name: &str) -> Option<&InterfaceField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

pub struct InterfaceField {
    pub(crate) name: String,
    pub(crate) ty: TypeRef,
    pub(crate) meta: ItemMeta,
}

impl InterfaceField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn meta(&self) -> &ItemMeta {
        &self.meta
    }
}

pub struct EnumValueDescriptor {
    pub(crate) name: String,
    pub(crate) meta: ItemMeta,
    pub(crate) matches: Arc<dyn Fn(&(dyn Any + 'static)) -> bool + Send + Sync>,
    pub(crate) make: Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>,
}

impl EnumValueDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> &ItemMeta {
        &self.meta
    }

    pub(crate) fn matches(&self, value: &(dyn Any + 'static)) -> bool {
        (self.matches)(value)
    }

    pub(crate) fn make(&self) -> Box<dyn Any + Send> {
        (self.make)()
    }
}

pub struct InputFieldDescriptor {
    pub(crate) name: String,
    pub(crate) ty: TypeRef,
    pub(crate) meta: ItemMeta,
}

impl InputFieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn meta(&self) -> &ItemMeta {
        &self.meta
    }
}
