//! Push notifications from the backend to the view.
//!
//! The backend emits [`HubEvent`]s into an [`EventHub`]. Each view holds one
//! [`Subscription`] and routes what it receives to its [`HubRenderer`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Name the event is published under on the wire.
pub const HUB_EVENT: &str = "HubEvent";

/// A build directory reported by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubEvent {
    /// Position the entry should be inserted at.
    pub index: usize,
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_build: Option<DateTime<Utc>>,
}

impl HubEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

/// Something that draws hub events into a panel.
pub trait HubRenderer {
    fn render_hub_event(&mut self, event: &HubEvent);
}

/// Sink for backend notifications.
pub trait Emitter: Send + Sync {
    fn emit(&self, event: HubEvent);
}

/// Fan-out publisher. Cloning shares the subscriber list.
#[derive(Clone, Default)]
pub struct EventHub {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<HubEvent>>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        Subscription { receiver: rx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .map(|subscribers| subscribers.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

impl Emitter for EventHub {
    fn emit(&self, event: HubEvent) {
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        tracing::trace!(event = HUB_EVENT, index = event.index, path = %event.path, "emitted");
    }
}

/// Receiving end handed out by [`EventHub::subscribe`].
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<HubEvent>,
}

impl Subscription {
    /// Waits for the next event. `None` once every hub handle is dropped.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.receiver.recv().await
    }

    /// Everything queued right now, without waiting.
    pub fn drain(&mut self) -> Vec<HubEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}
