//! Engine configuration. Every numeric limit uses `0` for "unlimited".

#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Guards applied to every executed operation.
    pub limits: QueryLimits,
    /// Memory related settings, mostly consumed by the transport.
    pub memory: MemoryLimits,
    /// Caching of compiled request stubs.
    pub operation_cache: OperationCacheConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryLimits {
    /// Deepest allowed field nesting, root fields being at depth 1.
    pub max_depth: usize,
    /// Maximum number of fields in a single selection set.
    pub max_fields: usize,
    /// Maximum number of explicitly aliased root fields.
    pub max_aliases: usize,
    /// Maximum accumulated complexity score of an operation.
    pub max_complexity: usize,
    /// Lists longer than this are truncated in the response.
    pub max_array_size: usize,
    /// Maximum number of resolvers running at the same time, shared by all requests.
    pub max_concurrent_resolvers: usize,
    /// Assumed number of items of a list when scoring complexity.
    pub list_size_estimate: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        QueryLimits {
            max_depth: 0,
            max_fields: 0,
            max_aliases: 0,
            max_complexity: 0,
            max_array_size: 0,
            max_concurrent_resolvers: 0,
            list_size_estimate: 10,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryLimits {
    /// Maximum size in bytes of a request body, checked by the transport.
    pub max_body_size: usize,
    /// Maximum size in bytes of the serialized variables, checked by the transport.
    pub max_variable_size: usize,
    /// Number of undelivered messages buffered per subscription.
    pub subscription_buffer_size: usize,
    /// Maximum number of concurrent subscriptions of a single connection.
    pub max_subscriptions_per_connection: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("request body of {size} bytes exceeds the maximum allowed size of {max} bytes")]
    BodyTooLarge { size: usize, max: usize },
    #[error("variables of {size} bytes exceed the maximum allowed size of {max} bytes")]
    VariablesTooLarge { size: usize, max: usize },
}

impl MemoryLimits {
    pub fn check_body(&self, size: usize) -> Result<(), PayloadError> {
        match self.max_body_size {
            max if max > 0 && size > max => Err(PayloadError::BodyTooLarge { size, max }),
            _ => Ok(()),
        }
    }

    pub fn check_variables(&self, size: usize) -> Result<(), PayloadError> {
        match self.max_variable_size {
            max if max > 0 && size > max => Err(PayloadError::VariablesTooLarge { size, max }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperationCacheConfig {
    /// If true, compiled request stubs are kept in memory.
    pub enabled: bool,
    /// Maximum number of cached request stubs.
    pub limit: usize,
}

impl Default for OperationCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 1000,
        }
    }
}
