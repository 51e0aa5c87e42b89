//! Query limits and the resolver concurrency guard.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::{config::QueryLimits, error::ErrorCode, GraphqlError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitError {
    #[error("query depth {depth} exceeds maximum allowed depth of {max}")]
    Depth { depth: usize, max: usize },
    #[error("selection of {count} fields exceeds maximum allowed fields of {max}")]
    Fields { count: usize, max: usize },
    #[error("{count} aliases exceeds maximum allowed aliases of {max}")]
    Aliases { count: usize, max: usize },
    #[error("query complexity {complexity} exceeds maximum allowed complexity of {max}")]
    Complexity { complexity: usize, max: usize },
}

impl From<LimitError> for GraphqlError {
    fn from(error: LimitError) -> Self {
        GraphqlError::new(error.to_string(), ErrorCode::LimitExceeded)
    }
}

/// Scores the cost of fields for the complexity limit.
pub trait ComplexityScorer: Send + Sync + 'static {
    fn score_field(&self, type_name: &str, field_name: &str) -> usize;

    /// Cost of a list field whose items cost `item_score` each.
    fn score_list(&self, item_score: usize, estimated_size: usize) -> usize;
}

/// Every field costs 1, lists cost their item score times the estimated size.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultComplexityScorer;

impl ComplexityScorer for DefaultComplexityScorer {
    fn score_field(&self, _type_name: &str, _field_name: &str) -> usize {
        1
    }

    fn score_list(&self, item_score: usize, estimated_size: usize) -> usize {
        item_score.saturating_mul(estimated_size)
    }
}

/// Per request accounting of the limits.
#[derive(Debug)]
pub(crate) struct LimitGuard {
    limits: QueryLimits,
    complexity: AtomicUsize,
    aliases: AtomicUsize,
}

impl LimitGuard {
    pub(crate) fn new(limits: QueryLimits) -> Self {
        LimitGuard {
            limits,
            complexity: AtomicUsize::new(0),
            aliases: AtomicUsize::new(0),
        }
    }

    pub(crate) fn check_depth(&self, depth: usize) -> Result<(), LimitError> {
        match self.limits.max_depth {
            max if max > 0 && depth > max => Err(LimitError::Depth { depth, max }),
            _ => Ok(()),
        }
    }

    pub(crate) fn check_fields(&self, count: usize) -> Result<(), LimitError> {
        match self.limits.max_fields {
            max if max > 0 && count > max => Err(LimitError::Fields { count, max }),
            _ => Ok(()),
        }
    }

    pub(crate) fn add_alias(&self) -> Result<(), LimitError> {
        let count = self.aliases.fetch_add(1, Ordering::Relaxed) + 1;
        match self.limits.max_aliases {
            max if max > 0 && count > max => Err(LimitError::Aliases { count, max }),
            _ => Ok(()),
        }
    }

    pub(crate) fn add_complexity(&self, score: usize) -> Result<(), LimitError> {
        let previous = self
            .complexity
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_add(score))
            })
            .unwrap_or_else(|current| current);
        let complexity = previous.saturating_add(score);
        match self.limits.max_complexity {
            max if max > 0 && complexity > max => Err(LimitError::Complexity { complexity, max }),
            _ => Ok(()),
        }
    }

    /// Maximum number of list items kept in the response, if limited.
    pub(crate) fn array_limit(&self) -> Option<usize> {
        Some(self.limits.max_array_size).filter(|max| *max > 0)
    }
}

/// Caps the number of resolvers running at the same time across all requests.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolverSlots(Option<Arc<Semaphore>>);

impl ResolverSlots {
    pub(crate) fn new(max: usize) -> Self {
        ResolverSlots((max > 0).then(|| Arc::new(Semaphore::new(max))))
    }

    /// Waits for a free slot. Returns `None` when cancelled first. The slot is released
    /// when the permit is dropped, whatever the outcome of the resolver.
    pub(crate) async fn acquire(&self, token: &CancellationToken) -> Option<Slot> {
        let Some(semaphore) = &self.0 else {
            return Some(Slot(None));
        };

        tokio::select! {
            biased;
            () = token.cancelled() => None,
            permit = semaphore.clone().acquire_owned() => permit.ok().map(|permit| Slot(Some(permit))),
        }
    }
}

pub(crate) struct Slot(#[allow(dead_code)] Option<OwnedSemaphorePermit>);
