//! Type registry: lazily built, cached descriptors of every host type reachable from
//! the registered operations, plus the custom scalars.

mod builder;
mod descriptor;
mod embedding;
mod error;
mod scalar;
mod union;

use std::{
    any::TypeId,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use fxhash::{FxHashMap, FxHashSet};

pub use builder::{GraphQLType, TypeBuilder};
pub(crate) use builder::is_valid_name;
pub use descriptor::{
    EmbedKind, EnumValueDescriptor, FieldDescriptor, FieldSource, HostScalar, InputFieldDescriptor, InterfaceField,
    InterfaceShape, ItemMeta, ObjectFields, ScalarKind, TypeDescriptor, TypeKind,
};
pub use embedding::NavigationError;
pub use error::RegistrationError;
pub use scalar::ScalarDescriptor;
pub use union::{dereference_union_value, Dereferenced, UnionError};

use crate::types::{BuiltinScalar, ID, NamedType, Origin, TypeRef};

/// Types currently being described, to detect types embedding themselves.
#[derive(Default)]
pub(crate) struct BuildStack(Vec<TypeId>);

#[derive(Default)]
pub struct TypeRegistry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    descriptors: FxHashMap<TypeId, Arc<TypeDescriptor>>,
    names: FxHashMap<String, (TypeId, &'static str)>,
    scalars: FxHashMap<TypeId, Arc<ScalarDescriptor>>,
    scalar_names: FxHashMap<String, TypeId>,
}

impl TypeRegistry {
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Descriptor of a type, built on first use.
    pub fn descriptor(&self, ty: NamedType) -> Result<Arc<TypeDescriptor>, RegistrationError> {
        self.descriptor_in(ty, &mut BuildStack::default())
    }

    pub(crate) fn descriptor_in(
        &self,
        ty: NamedType,
        stack: &mut BuildStack,
    ) -> Result<Arc<TypeDescriptor>, RegistrationError> {
        let scalar = {
            let inner = self.read();
            if let Some(descriptor) = inner.descriptors.get(&ty.id()) {
                return Ok(descriptor.clone());
            }
            inner.scalars.get(&ty.id()).cloned()
        };

        let descriptor = match (scalar, ty.origin()) {
            (Some(scalar), _) => TypeDescriptor::custom_scalar(ty, scalar),
            (None, Origin::Builtin(scalar)) => TypeDescriptor::builtin(ty, scalar),
            (None, Origin::Host(build)) => {
                if stack.0.contains(&ty.id()) {
                    return Err(RegistrationError::RecursiveEmbedding {
                        type_name: ty.rust_name().to_string(),
                    });
                }
                // The lock is not held while describing, descriptions of embedded types are
                // requested recursively.
                stack.0.push(ty.id());
                let built = build(self, stack);
                stack.0.pop();
                built?
            }
        };

        self.insert(descriptor)
    }

    fn insert(&self, descriptor: TypeDescriptor) -> Result<Arc<TypeDescriptor>, RegistrationError> {
        let mut inner = self.write();
        let id = descriptor.type_id();

        // Another request may have described the type in the meantime.
        if let Some(existing) = inner.descriptors.get(&id) {
            return Ok(existing.clone());
        }

        // Builtin scalars share names across Rust types: i32, i64 and u32 are all Int.
        if descriptor.named_type().builtin_scalar().is_none() {
            let rust_name = descriptor.named_type().rust_name();
            if let Some((other, other_rust_name)) = inner.names.get(descriptor.name()) {
                if *other != id {
                    return Err(RegistrationError::DuplicateTypeName {
                        name: descriptor.name().to_string(),
                        first: other_rust_name.to_string(),
                        second: rust_name.to_string(),
                    });
                }
            }
            inner.names.insert(descriptor.name().to_string(), (id, rust_name));
        }

        tracing::debug!("Registered type {} ({})", descriptor.name(), descriptor.named_type().rust_name());

        let descriptor = Arc::new(descriptor);
        inner.descriptors.insert(id, descriptor.clone());
        Ok(descriptor)
    }

    /// Cached descriptor of a type, if it was already built.
    pub fn get(&self, id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.read().descriptors.get(&id).cloned()
    }

    /// Cached descriptor of a type by its GraphQL name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        let inner = self.read();
        let (id, _) = inner.names.get(name)?;
        inner.descriptors.get(id).cloned()
    }

    /// Registers a custom scalar for its host type.
    ///
    /// A descriptor already built for the type is evicted and rebuilt as the scalar on next use.
    pub fn register_scalar(&self, scalar: ScalarDescriptor) -> Result<(), RegistrationError> {
        let id = scalar.type_id();
        let builtin = [
            TypeId::of::<String>(),
            TypeId::of::<bool>(),
            TypeId::of::<i32>(),
            TypeId::of::<i64>(),
            TypeId::of::<u32>(),
            TypeId::of::<f32>(),
            TypeId::of::<f64>(),
            TypeId::of::<ID>(),
        ];
        if builtin.contains(&id) {
            return Err(RegistrationError::BuiltinScalarOverride {
                type_name: scalar.rust_name().to_string(),
            });
        }

        if !is_valid_name(scalar.name())
            || [
                BuiltinScalar::String,
                BuiltinScalar::Int,
                BuiltinScalar::Float,
                BuiltinScalar::Boolean,
                BuiltinScalar::Id,
            ]
            .iter()
            .any(|builtin| builtin.to_string() == scalar.name())
        {
            return Err(RegistrationError::InvalidName {
                name: scalar.name().to_string(),
                context: format!("custom scalar for {}", scalar.rust_name()),
            });
        }

        let mut inner = self.write();

        if inner.scalar_names.contains_key(scalar.name()) {
            return Err(RegistrationError::DuplicateScalarName {
                name: scalar.name().to_string(),
            });
        }

        if inner.scalars.contains_key(&id) {
            return Err(RegistrationError::DuplicateScalarType {
                type_name: scalar.rust_name().to_string(),
            });
        }

        if let Some((other, other_rust_name)) = inner.names.get(scalar.name()) {
            if *other != id {
                return Err(RegistrationError::DuplicateTypeName {
                    name: scalar.name().to_string(),
                    first: other_rust_name.to_string(),
                    second: scalar.rust_name().to_string(),
                });
            }
        }

        if inner.descriptors.remove(&id).is_some() {
            inner.names.retain(|_, (other, _)| *other != id);
            tracing::debug!("Evicted the descriptor of {} for custom scalar {}", scalar.rust_name(), scalar.name());
        }

        tracing::info!("Registered custom scalar {} for {}", scalar.name(), scalar.rust_name());

        inner.scalar_names.insert(scalar.name().to_string(), id);
        inner.scalars.insert(id, Arc::new(scalar));
        Ok(())
    }

    pub fn scalar(&self, id: TypeId) -> Option<Arc<ScalarDescriptor>> {
        self.read().scalars.get(&id).cloned()
    }

    /// Describes every type reachable from `roots`, so that errors surface at registration.
    pub(crate) fn ensure_reachable<'a>(&self, roots: impl IntoIterator<Item = &'a TypeRef>) -> Result<(), RegistrationError> {
        let mut seen = FxHashSet::default();
        let mut queue = roots.into_iter().map(TypeRef::named_type).collect::<Vec<_>>();

        while let Some(ty) = queue.pop() {
            if !seen.insert(ty.id()) {
                continue;
            }

            let descriptor = self.descriptor(ty)?;
            match descriptor.kind() {
                TypeKind::Object(fields) | TypeKind::Union(fields) => {
                    queue.extend(fields.fields().iter().map(|field| field.ty().named_type()));
                }
                TypeKind::Interface(interface) => {
                    queue.extend(interface.fields().iter().map(|field| field.ty().named_type()));
                    queue.extend(interface.implementors().iter().copied());
                }
                TypeKind::InputObject(fields) => {
                    queue.extend(fields.iter().map(|field| field.ty().named_type()));
                }
                TypeKind::Enum(_) | TypeKind::Scalar(_) => {}
            }
        }

        Ok(())
    }
}
