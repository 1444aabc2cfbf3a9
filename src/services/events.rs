//! Event fan-out: in-process subscribers plus optional NATS publishing.

use tokio::sync::broadcast;
use crate::domain::events::{DomainEvent, EventEnvelope};

#[derive(Clone)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
    local: broadcast::Sender<DomainEvent>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self {
        let (local, _) = broadcast::channel(256);
        Self { nats, local }
    }

    pub fn disabled() -> Self { Self::new(None) }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> { self.local.subscribe() }

    /// Delivery failures are logged and never surface to the caller.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            if let Some(client) = &self.nats {
                match serde_json::to_vec(&EventEnvelope::new(event.clone())) {
                    Ok(payload) => {
                        if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
                            tracing::warn!(subject = event.subject(), error = %e, "event publish failed");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "event encode failed"),
                }
            }
            // No local subscribers is not an error.
            let _ = self.local.send(event);
        }
    }
}
