use std::sync::Arc;

use super::{CompileError, RequestStub};

/// Outcome of a compilation, errors included.
pub type CachedStub = Result<Arc<RequestStub>, CompileError>;

/// Cache of compiled requests, shared by all in-flight requests of a schema.
///
/// Keys combine the operation name and the query text.
pub trait RequestStubCache: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<CachedStub>;

    fn set(&self, key: &str, stub: CachedStub);

    /// Called when the registered operations change, cached stubs refer to the old ones.
    fn clear(&self) {}
}

/// Bounded in-memory cache, installed when `operation_cache.enabled` is set.
pub struct InMemoryStubCache {
    inner: quick_cache::sync::Cache<String, CachedStub>,
}

impl InMemoryStubCache {
    pub fn new(limit: usize) -> Self {
        InMemoryStubCache {
            inner: quick_cache::sync::Cache::new(limit.max(1)),
        }
    }
}

impl RequestStubCache for InMemoryStubCache {
    fn get(&self, key: &str) -> Option<CachedStub> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, stub: CachedStub) {
        self.inner.insert(key.to_string(), stub);
    }

    fn clear(&self) {
        self.inner.clear();
    }
}

pub(crate) fn cache_key(operation_name: Option<&str>, query: &str) -> String {
    let operation_name = operation_name.unwrap_or_default();
    let mut key = String::with_capacity(operation_name.len() + query.len() + 1);
    key.push_str(operation_name);
    key.push('\n');
    key.push_str(query);
    key
}
