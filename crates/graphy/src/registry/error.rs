/// Failure to describe a host type or to register an operation.
///
/// Always reported while the schema is being set up, never during a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("{type_name} cannot be exposed through GraphQL: {reason}")]
    UnsupportedType { type_name: String, reason: String },
    #[error("invalid GraphQL name {name:?} in {context}")]
    InvalidName { name: String, context: String },
    #[error("{kind} {name} is declared more than once in {type_name}")]
    DuplicateName {
        type_name: String,
        kind: &'static str,
        name: String,
    },
    #[error("field {field} of {type_name} is ambiguous: more than one embedded type provides it at the same depth")]
    AmbiguousField { type_name: String, field: String },
    #[error("{type_name} cannot embed {embedded}: only object types can be embedded")]
    InvalidEmbedding { type_name: String, embedded: String },
    #[error("{type_name} embeds itself")]
    RecursiveEmbedding { type_name: String },
    #[error("field {field} of union {type_name} cannot be a member ({kind}): members must be optional values, lists, maps or interfaces")]
    InvalidUnionFieldKind {
        type_name: String,
        field: String,
        kind: String,
    },
    #[error("{implementor} cannot implement interface {interface}: it is not an object type")]
    InvalidImplementor { interface: String, implementor: String },
    #[error("{implementor} does not provide field {field} of interface {interface}")]
    MissingInterfaceField {
        interface: String,
        implementor: String,
        field: String,
    },
    #[error("GraphQL type name {name} is used by both {first} and {second}")]
    DuplicateTypeName {
        name: String,
        first: String,
        second: String,
    },
    #[error("a custom scalar named {name} is already registered")]
    DuplicateScalarName { name: String },
    #[error("a custom scalar is already registered for {type_name}")]
    DuplicateScalarType { type_name: String },
    #[error("builtin scalar {type_name} cannot be replaced by a custom scalar")]
    BuiltinScalarOverride { type_name: String },
    #[error("invalid parameters for operation {operation}: {reason}")]
    InvalidParameters { operation: String, reason: String },
}
