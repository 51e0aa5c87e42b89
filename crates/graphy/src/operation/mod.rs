//! Root operations: queries, mutations and subscriptions backed by resolver functions.

mod resolver;

use std::sync::Arc;

use fxhash::FxHashMap;

pub(crate) use resolver::{ErasedResolver, ErasedSubscriptionResolver, ResolverStream};
pub use resolver::{IntoResolver, IntoSubscriptionResolver, Signature};

use resolver::FnResolver;

use crate::{
    registry::{is_valid_name, ItemMeta, RegistrationError, TypeKind, TypeRegistry},
    types::TypeRef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// Name of the root type the operation hangs off.
    pub fn root_type_name(self) -> &'static str {
        match self {
            OperationKind::Query => "Query",
            OperationKind::Mutation => "Mutation",
            OperationKind::Subscription => "Subscription",
        }
    }
}

impl From<async_graphql_parser::types::OperationType> for OperationKind {
    fn from(kind: async_graphql_parser::types::OperationType) -> Self {
        use async_graphql_parser::types::OperationType;

        match kind {
            OperationType::Query => OperationKind::Query,
            OperationType::Mutation => OperationKind::Mutation,
            OperationType::Subscription => OperationKind::Subscription,
        }
    }
}

/// How GraphQL arguments are bound to the parameters of a resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ParamMode {
    /// Struct mode for a single input object parameter without declared names, named
    /// mode when names are declared and positional mode otherwise.
    #[default]
    Auto,
    /// All arguments are the fields of the single input object parameter.
    Struct,
    /// Arguments are matched to parameters by the declared names.
    Named,
    /// Arguments are named `arg1`, `arg2` and so on.
    Positional,
}

#[derive(Clone)]
pub(crate) enum OperationResolver {
    Field(Arc<dyn ErasedResolver>),
    Stream(Arc<dyn ErasedSubscriptionResolver>),
}

/// A root operation waiting to be registered on a schema.
///
/// ```ignore
/// schema.register(
///     Operation::query("greeting", |_: Context, name: String| async move {
///         Ok::<_, Error>(format!("Hello, {name}"))
///     })
///     .param_names(["name"]),
/// )?;
/// ```
pub struct Operation {
    kind: OperationKind,
    name: String,
    meta: ItemMeta,
    mode: ParamMode,
    names: Vec<String>,
    signature: Signature,
    resolver: OperationResolver,
}

impl Operation {
    pub fn query<F, Args>(name: impl Into<String>, resolver: F) -> Self
    where
        F: IntoResolver<Args>,
        Args: 'static,
    {
        Self::field(OperationKind::Query, name.into(), resolver)
    }

    /// Mutation root fields of a request run one after the other, in selection order.
    pub fn mutation<F, Args>(name: impl Into<String>, resolver: F) -> Self
    where
        F: IntoResolver<Args>,
        Args: 'static,
    {
        Self::field(OperationKind::Mutation, name.into(), resolver)
    }

    pub fn subscription<F, Args>(name: impl Into<String>, resolver: F) -> Self
    where
        F: IntoSubscriptionResolver<Args>,
        Args: 'static,
    {
        Operation {
            kind: OperationKind::Subscription,
            name: name.into(),
            meta: ItemMeta::default(),
            mode: ParamMode::Auto,
            names: Vec::new(),
            signature: F::signature(),
            resolver: OperationResolver::Stream(Arc::new(FnResolver::<F, Args>::new(resolver))),
        }
    }

    fn field<F, Args>(kind: OperationKind, name: String, resolver: F) -> Self
    where
        F: IntoResolver<Args>,
        Args: 'static,
    {
        Operation {
            kind,
            name,
            meta: ItemMeta::default(),
            mode: ParamMode::Auto,
            names: Vec::new(),
            signature: F::signature(),
            resolver: OperationResolver::Field(Arc::new(FnResolver::<F, Args>::new(resolver))),
        }
    }

    #[must_use]
    pub fn param_mode(mut self, mode: ParamMode) -> Self {
        self.mode = mode;
        self
    }

    /// GraphQL argument names of the parameters, in declaration order.
    #[must_use]
    pub fn param_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description(description);
        self
    }

    #[must_use]
    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.meta.deprecated(reason);
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the parameter binding and describes every type reachable from the operation.
    pub(crate) fn into_descriptor(self, registry: &TypeRegistry) -> Result<OperationDescriptor, RegistrationError> {
        let invalid = |reason: &str| RegistrationError::InvalidParameters {
            operation: self.name.clone(),
            reason: reason.to_string(),
        };

        if !is_valid_name(&self.name) {
            return Err(RegistrationError::InvalidName {
                name: self.name.clone(),
                context: format!("{} operation", self.kind),
            });
        }

        let params = &self.signature.params;
        let struct_fields = match params.as_slice() {
            [param] if !param.is_list() => input_object_fields(registry, param)?,
            _ => None,
        };

        let mode = match self.mode {
            ParamMode::Auto if struct_fields.is_some() && self.names.is_empty() => ParamMode::Struct,
            ParamMode::Auto if self.names.is_empty() => ParamMode::Positional,
            ParamMode::Auto => ParamMode::Named,
            mode => mode,
        };

        let binding = match mode {
            ParamMode::Struct => {
                if !self.names.is_empty() {
                    return Err(invalid("parameter names are not allowed in struct mode"));
                }
                let Some(fields) = struct_fields else {
                    return Err(invalid("struct mode requires a single input object parameter"));
                };
                Binding::Struct {
                    ty: params[0].clone(),
                    fields,
                }
            }
            ParamMode::Named => {
                if self.names.len() != params.len() {
                    return Err(invalid(&format!(
                        "{} parameter names declared for {} parameters",
                        self.names.len(),
                        params.len()
                    )));
                }
                let mut seen = fxhash::FxHashSet::default();
                for name in &self.names {
                    if !is_valid_name(name) {
                        return Err(RegistrationError::InvalidName {
                            name: name.clone(),
                            context: format!("parameter of {}", self.name),
                        });
                    }
                    if !seen.insert(name.as_str()) {
                        return Err(invalid(&format!("parameter name {name} is declared more than once")));
                    }
                }
                Binding::Arguments(
                    self.names
                        .iter()
                        .zip(params)
                        .map(|(name, ty)| ParamDescriptor {
                            name: name.clone(),
                            ty: ty.clone(),
                        })
                        .collect(),
                )
            }
            ParamMode::Positional | ParamMode::Auto => {
                if !self.names.is_empty() {
                    return Err(invalid("parameter names are not allowed in positional mode"));
                }
                Binding::Arguments(
                    params
                        .iter()
                        .enumerate()
                        .map(|(index, ty)| ParamDescriptor {
                            name: format!("arg{}", index + 1),
                            ty: ty.clone(),
                        })
                        .collect(),
                )
            }
        };

        registry.ensure_reachable(params.iter().chain(std::iter::once(&self.signature.output)))?;

        Ok(OperationDescriptor {
            kind: self.kind,
            name: self.name,
            meta: self.meta,
            output: self.signature.output,
            mode,
            binding,
            resolver: self.resolver,
        })
    }
}

fn input_object_fields(registry: &TypeRegistry, param: &TypeRef) -> Result<Option<Vec<String>>, RegistrationError> {
    let descriptor = registry.descriptor(param.named_type())?;
    Ok(match descriptor.kind() {
        TypeKind::InputObject(fields) => Some(fields.iter().map(|field| field.name().to_string()).collect()),
        _ => None,
    })
}

/// Registered operations, one namespace per operation kind.
#[derive(Default)]
pub(crate) struct Operations {
    query: FxHashMap<String, Arc<OperationDescriptor>>,
    mutation: FxHashMap<String, Arc<OperationDescriptor>>,
    subscription: FxHashMap<String, Arc<OperationDescriptor>>,
}

impl Operations {
    fn map(&self, kind: OperationKind) -> &FxHashMap<String, Arc<OperationDescriptor>> {
        match kind {
            OperationKind::Query => &self.query,
            OperationKind::Mutation => &self.mutation,
            OperationKind::Subscription => &self.subscription,
        }
    }

    /// Replaces any operation of the same kind and name.
    pub(crate) fn insert(&mut self, operation: OperationDescriptor) -> Option<Arc<OperationDescriptor>> {
        let map = match operation.kind {
            OperationKind::Query => &mut self.query,
            OperationKind::Mutation => &mut self.mutation,
            OperationKind::Subscription => &mut self.subscription,
        };
        map.insert(operation.name.clone(), Arc::new(operation))
    }

    pub(crate) fn get(&self, kind: OperationKind, name: &str) -> Option<&Arc<OperationDescriptor>> {
        self.map(kind).get(name)
    }

    pub(crate) fn names(&self, kind: OperationKind) -> Vec<&str> {
        let mut names = self.map(kind).keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

/// A parameter bound to a GraphQL argument.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub(crate) enum Binding {
    /// Every argument is a field of the single input object parameter.
    Struct { ty: TypeRef, fields: Vec<String> },
    /// One argument per parameter, in parameter order.
    Arguments(Vec<ParamDescriptor>),
}

/// A registered root operation.
pub struct OperationDescriptor {
    pub(crate) kind: OperationKind,
    pub(crate) name: String,
    pub(crate) meta: ItemMeta,
    pub(crate) output: TypeRef,
    pub(crate) mode: ParamMode,
    pub(crate) binding: Binding,
    pub(crate) resolver: OperationResolver,
}

impl OperationDescriptor {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> &ItemMeta {
        &self.meta
    }

    pub fn output(&self) -> &TypeRef {
        &self.output
    }

    /// Binding mode after resolution of [`ParamMode::Auto`].
    pub fn param_mode(&self) -> ParamMode {
        self.mode
    }

    /// Names of the GraphQL arguments accepted by the operation.
    pub fn argument_names(&self) -> Vec<&str> {
        match &self.binding {
            Binding::Struct { fields, .. } => fields.iter().map(String::as_str).collect(),
            Binding::Arguments(params) => params.iter().map(|param| param.name.as_str()).collect(),
        }
    }
}

impl std::fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}
