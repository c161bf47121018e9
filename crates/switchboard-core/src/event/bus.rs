//! Broadcast event bus for distributing `RouterEvent` to multiple subscribers.
//!
//! Built on `tokio::sync::broadcast`. Publishing never waits on subscribers:
//! with no receivers the event is dropped, and a slow receiver lags instead of
//! applying backpressure to the dispatcher.

use switchboard_types::event::{EventKind, RouterEvent};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Multi-consumer event bus for routing lifecycle events.
///
/// Cloning the bus clones the sender, allowing multiple producers and
/// consumers on one channel.
pub struct EventBus {
    sender: broadcast::Sender<RouterEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: RouterEvent) {
        let _ = self.sender.send(event);
    }

    /// Invoke `handler` for every future event of `kind`.
    ///
    /// The handler runs on its own task, never on the dispatch path. Events
    /// missed while the handler falls behind are skipped with a warning.
    /// Must be called from within a Tokio runtime.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(RouterEvent) + Send + Sync + 'static,
    {
        let mut rx = self.sender.subscribe();
        let token = CancellationToken::new();
        let child = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) if event.kind() == kind => handler(event),
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(?kind, skipped, "Event handler lagged, events skipped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        Subscription { token, handle }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

/// Handle to a handler registered with [`EventBus::on`].
///
/// Dropping the handle leaves the handler running; call
/// [`Subscription::cancel`] to stop it.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop the handler and wait for its task to finish.
    pub async fn cancel(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}
