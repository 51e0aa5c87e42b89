use std::{any::Any, marker::PhantomData, sync::Arc};

use async_graphql_value::ConstValue;

use super::{
    descriptor::{
        downcast, getter, projector, EmbedKind, EnumValueDescriptor, FieldDescriptor, FieldSource, HostScalar,
        InputFieldDescriptor, InterfaceField, InterfaceShape, ItemMeta, ScalarKind, TypeDescriptor, TypeKind,
    },
    embedding::{self, RawEmbed},
    scalar::erase_parser,
    union, BuildStack, RegistrationError, TypeRegistry,
};
use crate::{
    types::{BuiltinScalar, FieldShape, InputFields, InputType, NamedType, OutputType, TypeRef},
    Error,
};

/// A Rust type exposed through GraphQL.
///
/// `describe` declares what the type looks like: an object (with `field`, `method` or
/// `embed`), a union, an enum, a scalar, an input object or an interface. The description
/// runs once per schema, the result is cached in the [`TypeRegistry`].
///
/// ```ignore
/// #[derive(Clone)]
/// struct User {
///     name: String,
///     email: Option<String>,
/// }
///
/// impl GraphQLType for User {
///     fn describe(ty: &mut TypeBuilder<Self>) {
///         ty.field("name", |user| &user.name);
///         ty.field("email", |user| &user.email).deprecated("use contacts");
///         ty.method("initial", |user| user.name.chars().next().map(String::from));
///     }
/// }
/// ```
pub trait GraphQLType: Clone + Send + Sync + 'static {
    fn describe(ty: &mut TypeBuilder<Self>);

    /// Builds an input object out of its fields.
    fn from_input(fields: &mut InputFields<'_>) -> Result<Self, Error> {
        Err(Error::new(format!("{} cannot be built from input", fields.type_name())))
    }

    /// Called on every input value of this type, before any resolver runs.
    fn validate(&self) -> Result<(), Error> {
        Ok(())
    }
}

pub struct TypeBuilder<T> {
    name: Option<String>,
    description: Option<String>,
    union: bool,
    fields: Vec<FieldDescriptor>,
    embeds: Vec<RawEmbed>,
    enum_values: Vec<EnumValueDescriptor>,
    input_fields: Vec<InputFieldDescriptor>,
    interface_fields: Vec<InterfaceField>,
    implementors: Vec<NamedType>,
    scalar: Option<HostScalar>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: GraphQLType> TypeBuilder<T> {
    pub(crate) fn new() -> Self {
        TypeBuilder {
            name: None,
            description: None,
            union: false,
            fields: Vec::new(),
            embeds: Vec::new(),
            enum_values: Vec::new(),
            input_fields: Vec::new(),
            interface_fields: Vec::new(),
            implementors: Vec::new(),
            scalar: None,
            _marker: PhantomData,
        }
    }

    /// GraphQL name of the type, defaults to the Rust type name without its path.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn field<F, G>(&mut self, name: &str, get: G) -> &mut ItemMeta
    where
        F: OutputType,
        G: Fn(&T) -> &F + Send + Sync + 'static,
    {
        let getter = getter(move |value| downcast::<T>(value).map(|value| get(value).resolve()));
        self.push_field(name, FieldSource::Field, F::type_ref(), F::shape(), getter)
    }

    pub fn method<R, M>(&mut self, name: &str, method: M) -> &mut ItemMeta
    where
        R: OutputType,
        M: Fn(&T) -> R + Send + Sync + 'static,
    {
        let getter = getter(move |value| downcast::<T>(value).map(|value| method(value).resolve()));
        self.push_field(name, FieldSource::Method, R::type_ref(), R::shape(), getter)
    }

    /// A method whose error is reported on the field, which resolves to null.
    pub fn try_method<R, E, M>(&mut self, name: &str, method: M) -> &mut ItemMeta
    where
        R: OutputType,
        E: Into<Error>,
        M: Fn(&T) -> Result<R, E> + Send + Sync + 'static,
    {
        let getter = getter(move |value| {
            let value = downcast::<T>(value)?;
            method(value).map(|value| value.resolve()).map_err(Into::into)
        });
        self.push_field(name, FieldSource::Method, R::type_ref(), R::shape(), getter)
    }

    /// Promotes the fields of a value held by the type.
    pub fn embed<E, P>(&mut self, project: P) -> &mut Self
    where
        E: GraphQLType,
        P: Fn(&T) -> &E + Send + Sync + 'static,
    {
        self.embeds.push(RawEmbed {
            kind: EmbedKind::Value,
            target: NamedType::host::<E>(),
            project: projector(move |value| {
                value
                    .downcast_ref::<T>()
                    .map(|value| project(value) as &(dyn Any + 'static))
            }),
        });
        self
    }

    /// Promotes the fields of an optional value held by the type, such as an
    /// `Option<Box<E>>` or `Option<Arc<E>>`. Reading a promoted field while the value is
    /// missing fails with a nil embedded pointer error.
    pub fn embed_ptr<E, P>(&mut self, project: P) -> &mut Self
    where
        E: GraphQLType,
        P: Fn(&T) -> Option<&E> + Send + Sync + 'static,
    {
        self.embeds.push(RawEmbed {
            kind: EmbedKind::Pointer,
            target: NamedType::host::<E>(),
            project: projector(move |value| {
                value
                    .downcast_ref::<T>()
                    .and_then(&project)
                    .map(|value| value as &(dyn Any + 'static))
            }),
        });
        self
    }

    /// Turns the object into a union: exactly one of its fields must be non-nil.
    pub fn union(&mut self) -> &mut Self {
        self.union = true;
        self
    }

    pub fn enum_value(&mut self, name: &str, value: T) -> &mut ItemMeta
    where
        T: PartialEq,
    {
        let expected = value.clone();
        self.enum_values.push(EnumValueDescriptor {
            name: name.to_string(),
            meta: ItemMeta::default(),
            matches: Arc::new(move |candidate: &(dyn Any + 'static)| {
                candidate.downcast_ref::<T>().is_some_and(|candidate| *candidate == expected)
            }),
            make: Arc::new(move || Box::new(value.clone()) as Box<dyn Any + Send>),
        });
        let index = self.enum_values.len() - 1;
        &mut self.enum_values[index].meta
    }

    pub fn scalar<S, P, E>(&mut self, serialize: S, parse: P) -> &mut Self
    where
        S: Fn(&T) -> ConstValue + Send + Sync + 'static,
        P: Fn(&ConstValue) -> Result<T, E> + Send + Sync + 'static,
        E: Into<Error>,
    {
        self.scalar = Some(HostScalar {
            serialize: Arc::new(move |value: &(dyn Any + 'static)| downcast::<T>(value).map(&serialize)),
            parse: erase_parser(parse),
        });
        self
    }

    /// Declares a field of an input object. Values are read by [`GraphQLType::from_input`].
    pub fn input_field<F: InputType>(&mut self, name: &str) -> &mut ItemMeta {
        self.input_fields.push(InputFieldDescriptor {
            name: name.to_string(),
            ty: F::type_ref(),
            meta: ItemMeta::default(),
        });
        let index = self.input_fields.len() - 1;
        &mut self.input_fields[index].meta
    }

    pub fn interface_field<F: OutputType>(&mut self, name: &str) -> &mut ItemMeta {
        self.interface_fields.push(InterfaceField {
            name: name.to_string(),
            ty: F::type_ref(),
            meta: ItemMeta::default(),
        });
        let index = self.interface_fields.len() - 1;
        &mut self.interface_fields[index].meta
    }

    pub fn implementor<I: GraphQLType>(&mut self) -> &mut Self {
        self.implementors.push(NamedType::host::<I>());
        self
    }

    fn push_field(
        &mut self,
        name: &str,
        source: FieldSource,
        ty: TypeRef,
        shape: FieldShape,
        getter: super::descriptor::Getter,
    ) -> &mut ItemMeta {
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            meta: ItemMeta::default(),
            source,
            ty,
            shape,
            path: Vec::new(),
            getter,
        });
        let index = self.fields.len() - 1;
        &mut self.fields[index].meta
    }

    pub(crate) fn finish(self, registry: &TypeRegistry, stack: &mut BuildStack) -> Result<TypeDescriptor, RegistrationError> {
        let rust_name = std::any::type_name::<T>();
        let name = self.name.unwrap_or_else(|| default_name(rust_name));
        check_name(&name, || format!("type {rust_name}"))?;

        let declared = [
            ("object", self.union || !self.fields.is_empty() || !self.embeds.is_empty()),
            ("enum", !self.enum_values.is_empty()),
            ("input object", !self.input_fields.is_empty()),
            ("interface", !self.interface_fields.is_empty()),
            ("scalar", self.scalar.is_some()),
        ]
        .into_iter()
        .filter_map(|(kind, declared)| declared.then_some(kind))
        .collect::<Vec<_>>();

        let kind = match declared.as_slice() {
            [] => {
                return Err(RegistrationError::UnsupportedType {
                    type_name: name,
                    reason: "it declares no fields, values or scalar behavior and no custom scalar is registered for it"
                        .to_string(),
                })
            }
            ["object"] => {
                let fields = self.fields.iter().map(|field| field.name.as_str());
                check_names(&name, "field", fields)?;

                let mut embeds = Vec::with_capacity(self.embeds.len());
                for embed in self.embeds {
                    let descriptor = registry.descriptor_in(embed.target, stack)?;
                    embeds.push((embed, descriptor));
                }

                let fields = embedding::promote(&name, self.fields, embeds)?;
                if self.union {
                    union::classify(&name, &fields)?;
                    TypeKind::Union(fields)
                } else {
                    TypeKind::Object(fields)
                }
            }
            ["enum"] => {
                check_names(&name, "enum value", self.enum_values.iter().map(|value| value.name.as_str()))?;
                TypeKind::Enum(self.enum_values)
            }
            ["input object"] => {
                check_names(&name, "input field", self.input_fields.iter().map(|field| field.name.as_str()))?;
                TypeKind::InputObject(self.input_fields)
            }
            ["interface"] => {
                check_names(&name, "field", self.interface_fields.iter().map(|field| field.name.as_str()))?;
                for implementor in &self.implementors {
                    check_implementor(registry, stack, &name, &self.interface_fields, *implementor)?;
                }
                TypeKind::Interface(InterfaceShape {
                    fields: self.interface_fields,
                    implementors: self.implementors,
                })
            }
            ["scalar"] => {
                let scalar = self.scalar.ok_or_else(|| RegistrationError::UnsupportedType {
                    type_name: name.clone(),
                    reason: "it declares no scalar behavior".to_string(),
                })?;
                TypeKind::Scalar(ScalarKind::Host(scalar))
            }
            kinds => {
                return Err(RegistrationError::UnsupportedType {
                    type_name: name,
                    reason: format!("it is declared as more than one kind: {}", kinds.join(", ")),
                })
            }
        };

        tracing::trace!("Described {rust_name} as {name}");

        Ok(TypeDescriptor {
            ty: NamedType::host::<T>(),
            name,
            description: self.description,
            kind,
        })
    }
}

fn check_implementor(
    registry: &TypeRegistry,
    stack: &mut BuildStack,
    interface: &str,
    fields: &[InterfaceField],
    implementor: NamedType,
) -> Result<(), RegistrationError> {
    let descriptor = registry.descriptor_in(implementor, stack)?;
    let TypeKind::Object(object) = descriptor.kind() else {
        return Err(RegistrationError::InvalidImplementor {
            interface: interface.to_string(),
            implementor: descriptor.name().to_string(),
        });
    };

    match fields.iter().find(|field| object.get(&field.name).is_none()) {
        Some(missing) => Err(RegistrationError::MissingInterfaceField {
            interface: interface.to_string(),
            implementor: descriptor.name().to_string(),
            field: missing.name.clone(),
        }),
        None => Ok(()),
    }
}

fn default_name(rust_name: &str) -> String {
    let without_generics = rust_name.split('<').next().unwrap_or(rust_name);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .to_string()
}

pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !name.starts_with("__")
}

fn check_name(name: &str, context: impl FnOnce() -> String) -> Result<(), RegistrationError> {
    let reserved = [
        BuiltinScalar::String,
        BuiltinScalar::Int,
        BuiltinScalar::Float,
        BuiltinScalar::Boolean,
        BuiltinScalar::Id,
    ]
    .iter()
    .any(|scalar| scalar.to_string() == name);

    if is_valid_name(name) && !reserved {
        Ok(())
    } else {
        Err(RegistrationError::InvalidName {
            name: name.to_string(),
            context: context(),
        })
    }
}

fn check_names<'a>(
    type_name: &str,
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), RegistrationError> {
    let mut seen = fxhash::FxHashSet::default();
    for name in names {
        if !is_valid_name(name) {
            return Err(RegistrationError::InvalidName {
                name: name.to_string(),
                context: format!("{kind} of {type_name}"),
            });
        }
        if !seen.insert(name) {
            return Err(RegistrationError::DuplicateName {
                type_name: type_name.to_string(),
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
