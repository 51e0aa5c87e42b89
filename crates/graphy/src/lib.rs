//! A GraphQL engine whose schema is derived from plain Rust functions and types.
//!
//! Operations are async functions registered on a [`Schema`]. The types they accept and
//! return describe themselves through [`GraphQLType`], and the schema builds a descriptor
//! for every type reachable from the registered operations. Queries are compiled into
//! request stubs, cached by query text, and executed concurrently under the configured
//! [`QueryLimits`].

#![cfg_attr(test, allow(unused_crate_dependencies))]

mod config;
mod context;
mod error;
mod executor;
mod limits;
mod operation;
mod registry;
mod request;
mod response;
mod schema;
mod stub;
mod subscription;
mod types;

pub use config::{Config, MemoryLimits, OperationCacheConfig, PayloadError, QueryLimits};
pub use context::{Context, Data};
pub use error::{Error, ErrorCode, ErrorPath, ErrorPathSegment, GraphqlError, GraphqlResult};
pub use limits::{ComplexityScorer, DefaultComplexityScorer, LimitError};
pub use operation::{
    IntoResolver, IntoSubscriptionResolver, Operation, OperationDescriptor, OperationKind, ParamDescriptor, ParamMode,
    Signature,
};
pub use registry::{
    dereference_union_value, Dereferenced, EmbedKind, EnumValueDescriptor, FieldDescriptor, FieldSource, GraphQLType,
    HostScalar, InputFieldDescriptor, InterfaceField, InterfaceShape, ItemMeta, NavigationError, ObjectFields, RegistrationError,
    ScalarDescriptor, ScalarKind, TypeBuilder, TypeDescriptor, TypeKind, TypeRegistry, UnionError,
};
pub use request::{Request, RequestError};
pub use response::{Response, ResponseValue};
pub use schema::{Schema, SchemaBuilder};
pub use stub::{CachedStub, CompileError, InMemoryStubCache, RequestStub, RequestStubCache};
pub use subscription::Connection;
pub use types::{
    BuiltinScalar, Dyn, FieldShape, HostValue, InputContext, InputFields, InputType, InputValue, NamedType,
    OutputType, Resolved, TypeRef, ValueSource, Variables, ID,
};

pub use async_graphql_value::{ConstValue, Name, Value};
pub use tokio_util::sync::CancellationToken;
