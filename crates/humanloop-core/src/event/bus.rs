//! Fan-out of coordinator events to notification collaborators.
//!
//! A state change publishes after it commits and never waits on a listener.
//! Subscribers that fall behind lose the oldest events and are told how many.

use humanloop_types::event::CoordinatorEvent;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Events buffered per subscriber before the slowest one starts lagging.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoordinatorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream {
            rx: self.sender.subscribe(),
            lagged: 0,
        }
    }

    /// Hand `event` to every current subscriber without waiting.
    pub fn publish(&self, event: CoordinatorEvent) {
        let kind = event.kind();
        let execution_id = event.execution_id();
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(event = kind, %execution_id, receivers, "event published");
            }
            Err(_) => {
                tracing::trace!(event = kind, %execution_id, "no event subscribers; dropped");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// One subscriber's view of the bus.
pub struct EventStream {
    rx: broadcast::Receiver<CoordinatorEvent>,
    lagged: u64,
}

impl EventStream {
    /// Next event, skipping past any gap left by lagging.
    ///
    /// Returns `None` once every `EventBus` handle is dropped.
    pub async fn recv(&mut self) -> Option<CoordinatorEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    self.lagged += skipped;
                    tracing::warn!(skipped, total = self.lagged, "event subscriber lagged; events lost");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Events this subscriber has missed so far.
    pub fn lagged(&self) -> u64 {
        self.lagged
    }
}
