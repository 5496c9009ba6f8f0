use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, EventPublisher, InternalEvent};
use common::nats::JetStreamPublisher;
use std::sync::Arc;
use tracing::{debug, info};

/// Publishes internal events to JetStream under `{subject_prefix}.{event type}`
pub struct NatsEventPublisher {
    jetstream: Arc<dyn JetStreamPublisher>,
    subject_prefix: String,
}

impl NatsEventPublisher {
    pub fn new(jetstream: Arc<dyn JetStreamPublisher>, subject_prefix: String) -> Self {
        info!(
            "Created NatsEventPublisher with subject prefix: {}",
            subject_prefix
        );
        Self {
            jetstream,
            subject_prefix,
        }
    }
}

#[async_trait]
impl EventPublisher for NatsEventPublisher {
    async fn publish(&self, event: &InternalEvent) -> DomainResult<()> {
        let payload = event.to_payload_json()?;
        let subject = event.routing_key(&self.subject_prefix);

        debug!(
            subject = %subject,
            actor_id = %event.actor_id,
            size_bytes = payload.len(),
            "Publishing internal event"
        );

        self.jetstream
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| DomainError::PublishFailure(e.to_string()))?;

        debug!(subject = %subject, "Internal event acknowledged");
        Ok(())
    }
}
