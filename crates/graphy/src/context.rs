use std::{
    any::{Any, TypeId},
    sync::Arc,
};

use fxhash::FxHashMap;
use tokio_util::sync::CancellationToken;

/// Values shared with every resolver, keyed by their type.
#[derive(Default)]
pub struct Data(FxHashMap<TypeId, Box<dyn Any + Send + Sync>>);

impl Data {
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.0.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.get(&TypeId::of::<T>()).and_then(|value| value.downcast_ref())
    }
}

/// First parameter of every resolver.
///
/// Carries the cancellation signal of the request and the data registered on the schema.
#[derive(Clone)]
pub struct Context {
    token: CancellationToken,
    data: Arc<Data>,
}

impl Context {
    pub(crate) fn new(token: CancellationToken, data: Arc<Data>) -> Self {
        Context { token, data }
    }

    pub fn data<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.data.get()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the request is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
