//! Event publishing
//!
//! Publishing never fails the write that produced the event: errors are logged and dropped.

use async_trait::async_trait;

use crate::domain::events::DomainEvent;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent);
}

pub struct NatsPublisher { client: async_nats::Client }

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: DomainEvent) {
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => { tracing::warn!(error = %e, "failed to encode event"); return; }
        };
        if let Err(e) = self.client.publish(event.subject().to_string(), payload.into()).await {
            tracing::warn!(error = %e, subject = event.subject(), "failed to publish event");
        }
    }
}

/// Used when no broker is configured.
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: DomainEvent) {
        tracing::debug!(subject = event.subject(), ?event, "event");
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct RecordingPublisher(parking_lot::Mutex<Vec<DomainEvent>>);

#[cfg(test)]
impl RecordingPublisher {
    pub fn events(&self) -> Vec<DomainEvent> { self.0.lock().clone() }
}

#[cfg(test)]
#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: DomainEvent) { self.0.lock().push(event); }
}
