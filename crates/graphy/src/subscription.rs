//! Subscription streams and the per-connection subscription manager.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};

use futures::{stream::BoxStream, StreamExt};
use fxhash::FxHashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    executor::{Aborted, ExecutionContext, SubscriptionSource},
    operation::OperationKind,
    request::{Request, RequestError},
    response::Response,
    schema::{wrong_entry_point, Schema, SchemaInner},
    stub::RequestStub,
    types::Variables,
    ErrorCode, GraphqlError,
};

impl Schema {
    /// Starts a subscription.
    ///
    /// The returned stream yields one response per event of the subscription resolver. It ends
    /// when the resolver stream ends, when `token` is cancelled or when it is dropped.
    pub async fn subscribe(
        &self,
        request: impl Into<Request>,
        token: CancellationToken,
    ) -> Result<BoxStream<'static, Response>, GraphqlError> {
        let request = request.into();

        let stub = self.prepare(&request.query, request.operation_name.as_deref())?;
        if stub.kind() != OperationKind::Subscription {
            return Err(wrong_entry_point(&stub, "subscription").into());
        }

        let variables = Arc::new(stub.coerce_variables(request.variables)?);
        let token = token.child_token();

        let cx = ExecutionContext::new(self.0.clone(), stub.clone(), variables.clone(), token.clone());
        let source = match cx.subscribe().await {
            Ok(Ok(source)) => source,
            Ok(Err(error)) | Err(Aborted(error)) => return Err(error),
        };

        Ok(forward(self.0.clone(), stub, variables, token, source))
    }

    /// Starts a subscription from its text and JSON variables, streaming JSON responses.
    pub async fn execute_subscription(
        &self,
        token: CancellationToken,
        query: &str,
        variables: &str,
    ) -> Result<BoxStream<'static, String>, RequestError> {
        let request = self.json_request(query, variables)?;
        let stream = self.subscribe(request, token).await.map_err(RequestError::Rejected)?;

        Ok(stream
            .filter_map(|response| {
                futures::future::ready(match response.to_json() {
                    Ok(json) => Some(json),
                    Err(error) => {
                        tracing::error!("Failed to serialize a subscription response: {error}");
                        None
                    }
                })
            })
            .boxed())
    }
}

enum Sender {
    Bounded(mpsc::Sender<Response>),
    Unbounded(mpsc::UnboundedSender<Response>),
}

impl Sender {
    async fn send(&self, response: Response) -> bool {
        match self {
            Sender::Bounded(sender) => sender.send(response).await.is_ok(),
            Sender::Unbounded(sender) => sender.send(response).is_ok(),
        }
    }
}

enum Receiver {
    Bounded(mpsc::Receiver<Response>),
    Unbounded(mpsc::UnboundedReceiver<Response>),
}

impl Receiver {
    async fn recv(&mut self) -> Option<Response> {
        match self {
            Receiver::Bounded(receiver) => receiver.recv().await,
            Receiver::Unbounded(receiver) => receiver.recv().await,
        }
    }
}

fn channel(buffer: usize) -> (Sender, Receiver) {
    if buffer == 0 {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Sender::Unbounded(sender), Receiver::Unbounded(receiver))
    } else {
        let (sender, receiver) = mpsc::channel(buffer);
        (Sender::Bounded(sender), Receiver::Bounded(receiver))
    }
}

/// Executes every event of `source` on a separate task, forwarding the responses through a
/// channel of `subscription_buffer_size` messages.
fn forward(
    schema: Arc<SchemaInner>,
    stub: Arc<RequestStub>,
    variables: Arc<Variables>,
    token: CancellationToken,
    source: SubscriptionSource,
) -> BoxStream<'static, Response> {
    let (sender, receiver) = channel(schema.config.memory.subscription_buffer_size);

    let cancelled = token.clone();
    let mut events = source
        .stream
        .take_until(Box::pin(async move { cancelled.cancelled().await }));

    let task_token = token.clone();
    let span = tracing::debug_span!("subscription", operation_kind = %stub.kind());
    tokio::spawn(
        async move {
            while let Some(item) = events.next().await {
                let cx = ExecutionContext::new(schema.clone(), stub.clone(), variables.clone(), task_token.clone());
                let result = cx.execute_event(item).await;
                if task_token.is_cancelled() {
                    break;
                }
                if !sender.send(cx.into_response(result)).await {
                    break;
                }
            }
            tracing::debug!("Subscription finished");
        }
        .instrument(span),
    );

    // Dropping the stream stops the task, even while the resolver stream is idle.
    let guard = token.drop_guard();
    futures::stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
        let response = receiver.recv().await?;
        Some((response, (receiver, guard)))
    })
    .boxed()
}

/// Subscriptions of a single client connection, keyed by their id.
///
/// Starting a subscription with the id of an active one replaces it. Closing or dropping the
/// connection cancels all of them.
pub struct Connection {
    schema: Schema,
    token: CancellationToken,
    subscriptions: Arc<Mutex<FxHashMap<String, Active>>>,
    generation: AtomicU64,
}

struct Active {
    generation: u64,
    token: CancellationToken,
}

impl Connection {
    pub fn new(schema: &Schema) -> Self {
        Connection {
            schema: schema.clone(),
            token: CancellationToken::new(),
            subscriptions: Arc::default(),
            generation: AtomicU64::new(0),
        }
    }

    /// Starts the subscription `id`, cancelling any subscription already running under it
    /// once the new one has started. A request that fails to start leaves it running.
    pub async fn subscribe(
        &self,
        id: impl Into<String>,
        request: impl Into<Request>,
    ) -> Result<BoxStream<'static, Response>, GraphqlError> {
        let id = id.into();
        self.check_quota(&id)?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = self.token.child_token();
        let stream = self.schema.subscribe(request, token.clone()).await?;

        {
            let mut subscriptions = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(error) = self.quota(&subscriptions, &id) {
                token.cancel();
                return Err(error);
            }

            let active = Active { generation, token };
            if let Some(previous) = subscriptions.insert(id.clone(), active) {
                tracing::debug!("Subscription {id} replaced");
                previous.token.cancel();
            }
        }

        let registration = Registration {
            subscriptions: self.subscriptions.clone(),
            id,
            generation,
        };

        Ok(futures::stream::unfold(
            (stream, registration),
            |(mut stream, registration)| async move {
                let response = stream.next().await?;
                Some((response, (stream, registration)))
            },
        )
        .boxed())
    }

    fn check_quota(&self, id: &str) -> Result<(), GraphqlError> {
        let subscriptions = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        self.quota(&subscriptions, id)
    }

    /// Replacing a running subscription does not take another slot.
    fn quota(&self, subscriptions: &FxHashMap<String, Active>, id: &str) -> Result<(), GraphqlError> {
        let max = self.schema.config().memory.max_subscriptions_per_connection;

        if max > 0 && !subscriptions.contains_key(id) && subscriptions.len() >= max {
            return Err(GraphqlError::new(
                format!("connection exceeds maximum allowed subscriptions of {max}"),
                ErrorCode::LimitExceeded,
            ));
        }

        Ok(())
    }

    /// Cancels the subscription `id`. Returns whether it was running.
    pub fn stop(&self, id: &str) -> bool {
        let removed = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);

        match removed {
            Some(active) => {
                active.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of running subscriptions.
    pub fn active(&self) -> usize {
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Cancels every subscription of the connection.
    pub fn close(&self) {
        self.token.cancel();
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Frees the slot of a subscription once its stream ends or is dropped, unless it was
/// replaced in the meantime.
struct Registration {
    subscriptions: Arc<Mutex<FxHashMap<String, Active>>>,
    id: String,
    generation: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut subscriptions = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        if subscriptions
            .get(&self.id)
            .is_some_and(|active| active.generation == self.generation)
        {
            subscriptions.remove(&self.id);
        }
    }
}
