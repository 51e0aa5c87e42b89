use std::sync::{Arc, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    config::Config,
    context::Data,
    executor::ExecutionContext,
    limits::{ComplexityScorer, DefaultComplexityScorer, ResolverSlots},
    operation::{Operation, OperationDescriptor, OperationKind, Operations},
    registry::{RegistrationError, ScalarDescriptor, TypeRegistry},
    request::{parse_variables, Request, RequestError},
    response::Response,
    stub::{cache_key, compile, CompileError, CompileOptions, InMemoryStubCache, RequestStub, RequestStubCache},
};

/// Registered operations and types, shared by every request.
///
/// Cloning is cheap, clones share the same registrations.
#[derive(Clone)]
pub struct Schema(pub(crate) Arc<SchemaInner>);

pub(crate) struct SchemaInner {
    pub(crate) config: Config,
    pub(crate) registry: TypeRegistry,
    pub(crate) operations: RwLock<Operations>,
    pub(crate) scorer: Box<dyn ComplexityScorer>,
    pub(crate) stub_cache: Option<Box<dyn RequestStubCache>>,
    pub(crate) slots: ResolverSlots,
    pub(crate) data: Arc<Data>,
}

#[derive(Default)]
pub struct SchemaBuilder {
    config: Config,
    stub_cache: Option<Box<dyn RequestStubCache>>,
    scorer: Option<Box<dyn ComplexityScorer>>,
    data: Data,
}

impl SchemaBuilder {
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Replaces the in-memory request stub cache.
    #[must_use]
    pub fn with_stub_cache(mut self, cache: impl RequestStubCache) -> Self {
        self.stub_cache = Some(Box::new(cache));
        self
    }

    #[must_use]
    pub fn complexity_scorer(mut self, scorer: impl ComplexityScorer) -> Self {
        self.scorer = Some(Box::new(scorer));
        self
    }

    /// Data readable by every resolver through [`Context::data`](crate::Context::data).
    #[must_use]
    pub fn data<T: std::any::Any + Send + Sync>(mut self, value: T) -> Self {
        self.data.insert(value);
        self
    }

    pub fn finish(self) -> Schema {
        let SchemaBuilder {
            config,
            stub_cache,
            scorer,
            data,
        } = self;

        let stub_cache = stub_cache.or_else(|| {
            config
                .operation_cache
                .enabled
                .then(|| Box::new(InMemoryStubCache::new(config.operation_cache.limit)) as Box<dyn RequestStubCache>)
        });

        Schema(Arc::new(SchemaInner {
            slots: ResolverSlots::new(config.limits.max_concurrent_resolvers),
            registry: TypeRegistry::default(),
            operations: RwLock::new(Operations::default()),
            scorer: scorer.unwrap_or_else(|| Box::new(DefaultComplexityScorer)),
            stub_cache,
            data: Arc::new(data),
            config,
        }))
    }
}

impl Default for Schema {
    fn default() -> Self {
        Schema::builder().finish()
    }
}

impl Schema {
    pub fn new(config: Config) -> Self {
        Schema::builder().config(config).finish()
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn config(&self) -> &Config {
        &self.0.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.0.registry
    }

    /// Registers an operation, replacing any operation of the same kind and name.
    ///
    /// Every type reachable from the operation is described here, so unsupported types
    /// are reported before any request runs.
    pub fn register(&self, operation: Operation) -> Result<(), RegistrationError> {
        let descriptor = operation.into_descriptor(&self.0.registry)?;
        let (kind, name) = (descriptor.kind(), descriptor.name().to_string());

        let replaced = self
            .0
            .operations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(descriptor);

        if replaced.is_some() {
            tracing::info!("Replaced {kind} {name}");
        } else {
            tracing::info!("Registered {kind} {name}");
        }

        self.clear_stub_cache();
        Ok(())
    }

    /// Registers a custom scalar. See [`TypeRegistry::register_scalar`].
    pub fn register_scalar(&self, scalar: ScalarDescriptor) -> Result<(), RegistrationError> {
        self.0.registry.register_scalar(scalar)?;
        self.clear_stub_cache();
        Ok(())
    }

    pub fn operation(&self, kind: OperationKind, name: &str) -> Option<Arc<OperationDescriptor>> {
        self.0
            .operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind, name)
            .cloned()
    }

    /// Names of the registered operations of a kind, sorted.
    pub fn operation_names(&self, kind: OperationKind) -> Vec<String> {
        self.0
            .operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .names(kind)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn clear_stub_cache(&self) {
        if let Some(cache) = &self.0.stub_cache {
            cache.clear();
        }
    }

    /// Compiles a request, going through the request stub cache.
    pub fn prepare(&self, query: &str, operation_name: Option<&str>) -> Result<Arc<RequestStub>, CompileError> {
        let key = cache_key(operation_name, query);

        if let Some(cache) = &self.0.stub_cache {
            if let Some(cached) = cache.get(&key) {
                tracing::debug!("Request stub cache hit");
                return cached;
            }
            tracing::debug!("Request stub cache miss");
        }

        let compiled = {
            let operations = self.0.operations.read().unwrap_or_else(PoisonError::into_inner);
            let options = CompileOptions {
                registry: &self.0.registry,
                operations: &operations,
                scorer: self.0.scorer.as_ref(),
                list_size_estimate: self.0.config.limits.list_size_estimate,
            };
            compile(&options, query, operation_name).map(Arc::new)
        };

        if let Some(cache) = &self.0.stub_cache {
            cache.set(&key, compiled.clone());
        }

        compiled
    }

    /// Executes a query or a mutation.
    pub async fn execute(&self, request: impl Into<Request>) -> Response {
        self.execute_with_cancellation(request, CancellationToken::new()).await
    }

    /// Executes a query or a mutation until `token` is cancelled.
    pub async fn execute_with_cancellation(&self, request: impl Into<Request>, token: CancellationToken) -> Response {
        let request = request.into();

        let stub = match self.prepare(&request.query, request.operation_name.as_deref()) {
            Ok(stub) => stub,
            Err(error) => return Response::from_error(error),
        };

        if stub.kind() == OperationKind::Subscription {
            return Response::from_error(wrong_entry_point(&stub, "query"));
        }

        let variables = match stub.coerce_variables(request.variables) {
            Ok(variables) => variables,
            Err(error) => return Response::from_error(error),
        };

        let span = tracing::debug_span!("execute", operation_kind = %stub.kind());
        ExecutionContext::new(self.0.clone(), stub, Arc::new(variables), token)
            .execute()
            .instrument(span)
            .await
    }

    /// Executes a query or a mutation from its text and JSON variables, returning the JSON response.
    ///
    /// Errors of the operation itself are part of the response, only oversized payloads,
    /// malformed variables and serialization failures are returned as errors.
    pub async fn execute_query_or_mutation(
        &self,
        token: CancellationToken,
        query: &str,
        variables: &str,
    ) -> Result<String, RequestError> {
        let request = self.json_request(query, variables)?;
        let response = self.execute_with_cancellation(request, token).await;
        Ok(response.to_json()?)
    }

    /// Builds a request of the JSON entry points, enforcing the payload size limits.
    pub(crate) fn json_request(&self, query: &str, variables: &str) -> Result<Request, RequestError> {
        let memory = &self.0.config.memory;
        memory.check_body(query.len() + variables.len())?;
        memory.check_variables(variables.len())?;

        Ok(Request::new(query).variables(parse_variables(variables)?))
    }
}

pub(crate) fn wrong_entry_point(stub: &RequestStub, entry_point: &'static str) -> CompileError {
    let name = stub
        .selection_set
        .fields
        .first()
        .map(|field| field.name.to_string())
        .or_else(|| stub.name().map(str::to_string))
        .unwrap_or_default();

    CompileError::WrongEntryPoint {
        kind: stub.kind(),
        name,
        entry_point,
    }
}
