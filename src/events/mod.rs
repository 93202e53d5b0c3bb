use tokio::sync::broadcast;
use tracing::debug;

use crate::models::event::DispatchEvent;

/// Live channel for tracking views and the driver app. Subscribers that are
/// not connected when an event is published never see it.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DispatchEvent>,
}

impl EventBus {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: DispatchEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(event = name, "no live subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
