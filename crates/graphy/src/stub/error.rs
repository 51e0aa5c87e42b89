use async_graphql_parser::Pos;

use crate::{operation::OperationKind, ErrorCode, GraphqlError, RegistrationError};

/// Failure to compile a request into a [`RequestStub`](super::RequestStub).
///
/// Reported before any resolver runs. Cached alongside successful stubs so repeated
/// invalid requests are not parsed again.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("{message}")]
    Syntax { message: String, locations: Vec<Pos> },
    #[error("unknown operation named {0}")]
    UnknownOperation(String),
    #[error("an operation name is required when the document contains more than one operation")]
    AmbiguousOperation,
    #[error("the document contains no operation")]
    MissingOperation,
    #[error("unknown fragment {name}")]
    UnknownFragment { name: String, pos: Pos },
    #[error("fragment {name} references itself")]
    FragmentCycle { name: String, pos: Pos },
    #[error("unknown field {field} on type {parent}")]
    UnknownField { field: String, parent: String, pos: Pos },
    #[error("unknown argument {argument} on field {parent}.{field}")]
    UnknownArgument {
        argument: String,
        parent: String,
        field: String,
        pos: Pos,
    },
    #[error("duplicate alias {alias} in selection of {parent}")]
    DuplicateAlias { alias: String, parent: String, pos: Pos },
    #[error("field {field} of type {ty} must not have a selection")]
    UnexpectedSelection { field: String, ty: String, pos: Pos },
    #[error("field {field} of type {ty} must have a selection of subfields")]
    MissingSelection { field: String, ty: String, pos: Pos },
    #[error("fragment on {condition} cannot be spread within {parent}")]
    InvalidTypeCondition { condition: String, parent: String, pos: Pos },
    #[error("variable ${name} is not defined")]
    UndefinedVariable { name: String, pos: Pos },
    #[error("unknown directive @{name}")]
    UnknownDirective { name: String, pos: Pos },
    #[error("directive @{name} requires an `if` argument")]
    MissingDirectiveArgument { name: String, pos: Pos },
    #[error("subscription {name} must select exactly one root field, found {count}")]
    SubscriptionRootFields { name: String, count: usize, pos: Pos },
    #[error("{kind} {name} used in {entry_point}")]
    WrongEntryPoint {
        kind: OperationKind,
        name: String,
        entry_point: &'static str,
    },
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

impl CompileError {
    pub fn locations(&self) -> Vec<Pos> {
        match self {
            CompileError::Syntax { locations, .. } => locations.clone(),
            CompileError::UnknownFragment { pos, .. }
            | CompileError::FragmentCycle { pos, .. }
            | CompileError::UnknownField { pos, .. }
            | CompileError::UnknownArgument { pos, .. }
            | CompileError::DuplicateAlias { pos, .. }
            | CompileError::UnexpectedSelection { pos, .. }
            | CompileError::MissingSelection { pos, .. }
            | CompileError::InvalidTypeCondition { pos, .. }
            | CompileError::UndefinedVariable { pos, .. }
            | CompileError::UnknownDirective { pos, .. }
            | CompileError::MissingDirectiveArgument { pos, .. }
            | CompileError::SubscriptionRootFields { pos, .. } => vec![*pos],
            CompileError::UnknownOperation(_)
            | CompileError::AmbiguousOperation
            | CompileError::MissingOperation
            | CompileError::WrongEntryPoint { .. }
            | CompileError::Registration(_) => Vec::new(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            CompileError::Syntax { .. }
            | CompileError::UnknownOperation(_)
            | CompileError::AmbiguousOperation
            | CompileError::MissingOperation => ErrorCode::OperationParsingError,
            CompileError::Registration(_) => ErrorCode::InternalServerError,
            _ => ErrorCode::OperationValidationError,
        }
    }
}

impl From<async_graphql_parser::Error> for CompileError {
    fn from(error: async_graphql_parser::Error) -> Self {
        CompileError::Syntax {
            message: error.to_string(),
            locations: error.positions().collect(),
        }
    }
}

impl From<CompileError> for GraphqlError {
    fn from(error: CompileError) -> Self {
        let locations = error.locations();
        let mut graphql_error = GraphqlError::new(error.to_string(), error.code());
        graphql_error.locations = locations;
        graphql_error
    }
}
