use common::domain::{
    EventPublisher, InternalEvent, MappedEventRepository, PublishStatus, RawEventRepository,
    RawEventStatus, UpdatePublishStatusRepoInput, UpdateRawEventStatusRepoInput,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Sent,
    Failed(String),
}

impl PublishOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, PublishOutcome::Sent)
    }
}

/// Makes one publish attempt and records its outcome on both stored records.
///
/// Publisher errors never escape: they become `PublishOutcome::Failed` and
/// the failure reason is written to the mapped and raw events.
pub struct PublishCoordinator {
    publisher: Arc<dyn EventPublisher>,
    raw_event_repository: Arc<dyn RawEventRepository>,
    mapped_event_repository: Arc<dyn MappedEventRepository>,
}

impl PublishCoordinator {
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        raw_event_repository: Arc<dyn RawEventRepository>,
        mapped_event_repository: Arc<dyn MappedEventRepository>,
    ) -> Self {
        Self {
            publisher,
            raw_event_repository,
            mapped_event_repository,
        }
    }

    pub async fn attempt(
        &self,
        raw_event_id: &str,
        mapped_event_id: &str,
        event: &InternalEvent,
    ) -> PublishOutcome {
        let outcome = match self.publisher.publish(event).await {
            Ok(()) => {
                debug!(
                    raw_event_id = %raw_event_id,
                    routing_label = %event.routing_label(),
                    "Event published"
                );
                PublishOutcome::Sent
            }
            Err(e) => {
                warn!(
                    raw_event_id = %raw_event_id,
                    error = %e,
                    "Publishing failed"
                );
                PublishOutcome::Failed(e.to_string())
            }
        };

        self.record(raw_event_id, mapped_event_id, &outcome).await;
        outcome
    }

    // Patch failures leave the records Pending; they are logged, not returned
    async fn record(&self, raw_event_id: &str, mapped_event_id: &str, outcome: &PublishOutcome) {
        let (publish_status, raw_status, reason) = match outcome {
            PublishOutcome::Sent => (PublishStatus::Sent, RawEventStatus::Processed, None),
            PublishOutcome::Failed(reason) => (
                PublishStatus::Failed,
                RawEventStatus::Failed,
                Some(reason.clone()),
            ),
        };

        if let Err(e) = self
            .mapped_event_repository
            .update_publish_status(UpdatePublishStatusRepoInput {
                mapped_event_id: mapped_event_id.to_string(),
                publish_status,
                failure_reason: reason.clone(),
            })
            .await
        {
            error!(
                mapped_event_id = %mapped_event_id,
                error = %e,
                "Failed to record publish status"
            );
        }

        if let Err(e) = self
            .raw_event_repository
            .update_raw_event_status(UpdateRawEventStatusRepoInput {
                raw_event_id: raw_event_id.to_string(),
                status: raw_status,
                error_message: reason,
            })
            .await
        {
            error!(
                raw_event_id = %raw_event_id,
                error = %e,
                "Failed to record raw event status"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::domain::{
        CanonicalMap, CreateMappedEventRepoInput, CreateRawEventRepoInput, DomainError,
    };
    use common::memory::InMemoryEventStore;
    use common::{MockEventPublisher, MockMappedEventRepository, MockRawEventRepository};
    use rust_decimal::Decimal;

    fn event() -> InternalEvent {
        InternalEvent {
            actor_id: "p1".to_string(),
            amount: Decimal::from(10),
            currency: "GEL".to_string(),
            occurred_at: Utc::now(),
            event_type: Some("Deposit".to_string()),
            extensions: CanonicalMap::new(),
        }
    }

    async fn seeded_store() -> InMemoryEventStore {
        let store = InMemoryEventStore::new();
        store
            .create_raw_event(CreateRawEventRepoInput {
                raw_event_id: "raw-1".to_string(),
                received_at: Utc::now(),
                raw_payload: "{}".to_string(),
            })
            .await
            .unwrap();
        store
            .create_mapped_event(CreateMappedEventRepoInput {
                mapped_event_id: "mapped-1".to_string(),
                raw_event_id: "raw-1".to_string(),
                actor_id: "p1".to_string(),
                amount: Decimal::from(10),
                currency: "GEL".to_string(),
                event_type: Some("Deposit".to_string()),
                occurred_at: Utc::now(),
                payload: "{}".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
    }

    fn coordinator(publisher: MockEventPublisher, store: &InMemoryEventStore) -> PublishCoordinator {
        PublishCoordinator::new(
            Arc::new(publisher),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
        )
    }

    #[tokio::test]
    async fn test_success_marks_sent_and_processed() {
        let store = seeded_store().await;
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().times(1).returning(|_| Ok(()));

        let outcome = coordinator(publisher, &store)
            .attempt("raw-1", "mapped-1", &event())
            .await;

        assert_eq!(outcome, PublishOutcome::Sent);
        let mapped = store.get_mapped_event("mapped-1").await.unwrap().unwrap();
        assert_eq!(mapped.publish_status, PublishStatus::Sent);
        assert_eq!(mapped.failure_reason, None);
        let raw = store.get_raw_event("raw-1").await.unwrap().unwrap();
        assert_eq!(raw.status, RawEventStatus::Processed);
        assert_eq!(raw.error_message, None);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_not_raised() {
        let store = seeded_store().await;
        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish()
            .times(1)
            .returning(|_| Err(DomainError::PublishFailure("broker unreachable".to_string())));

        let outcome = coordinator(publisher, &store)
            .attempt("raw-1", "mapped-1", &event())
            .await;

        let reason = "Publish failure: broker unreachable".to_string();
        assert_eq!(outcome, PublishOutcome::Failed(reason.clone()));
        let mapped = store.get_mapped_event("mapped-1").await.unwrap().unwrap();
        assert_eq!(mapped.publish_status, PublishStatus::Failed);
        assert_eq!(mapped.failure_reason, Some(reason.clone()));
        let raw = store.get_raw_event("raw-1").await.unwrap().unwrap();
        assert_eq!(raw.status, RawEventStatus::Failed);
        assert_eq!(raw.error_message, Some(reason));
    }

    #[tokio::test]
    async fn test_patch_failure_keeps_outcome() {
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().times(1).returning(|_| Ok(()));

        let mut mapped_repo = MockMappedEventRepository::new();
        mapped_repo
            .expect_update_publish_status()
            .times(1)
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("db down"))));

        let mut raw_repo = MockRawEventRepository::new();
        raw_repo
            .expect_update_raw_event_status()
            .withf(|input| input.status == RawEventStatus::Processed)
            .times(1)
            .returning(|_| Ok(()));

        let coordinator =
            PublishCoordinator::new(Arc::new(publisher), Arc::new(raw_repo), Arc::new(mapped_repo));

        let outcome = coordinator.attempt("raw-1", "mapped-1", &event()).await;
        assert!(outcome.is_sent());
    }
}
