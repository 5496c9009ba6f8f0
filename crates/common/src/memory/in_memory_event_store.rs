use crate::domain::{
    CreateMappedEventRepoInput, CreateRawEventRepoInput, DomainError, DomainResult, MappedEvent,
    MappedEventRepository, PublishStatus, RawEvent, RawEventRepository, RawEventStatus,
    UpdatePublishStatusRepoInput, UpdateRawEventStatusRepoInput,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct EventTables {
    raw_events: HashMap<String, RawEvent>,
    mapped_events: HashMap<String, MappedEvent>,
    /// raw_event_id -> mapped_event_id
    mapped_by_raw: HashMap<String, String>,
}

/// In-memory durable event store implementing both event repositories.
///
/// Enforces the same constraints as the PostgreSQL schema: a mapped event
/// needs an existing raw event, at most one mapped event per raw event, and
/// statuses only leave Pending once.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    tables: Arc<RwLock<EventTables>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn raw_events(&self) -> Vec<RawEvent> {
        let tables = self.tables.read().await;
        let mut events: Vec<RawEvent> = tables.raw_events.values().cloned().collect();
        events.sort_by(|a, b| {
            a.received_at
                .cmp(&b.received_at)
                .then_with(|| a.raw_event_id.cmp(&b.raw_event_id))
        });
        events
    }

    pub async fn mapped_events(&self) -> Vec<MappedEvent> {
        let tables = self.tables.read().await;
        let mut events: Vec<MappedEvent> = tables.mapped_events.values().cloned().collect();
        events.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.mapped_event_id.cmp(&b.mapped_event_id))
        });
        events
    }
}

#[async_trait]
impl RawEventRepository for InMemoryEventStore {
    async fn create_raw_event(&self, input: CreateRawEventRepoInput) -> DomainResult<RawEvent> {
        let mut tables = self.tables.write().await;
        if tables.raw_events.contains_key(&input.raw_event_id) {
            return Err(DomainError::RepositoryError(anyhow::anyhow!(
                "raw event {} already exists",
                input.raw_event_id
            )));
        }

        let event = RawEvent {
            raw_event_id: input.raw_event_id,
            received_at: input.received_at,
            raw_payload: input.raw_payload,
            status: RawEventStatus::Pending,
            error_message: None,
        };
        tables
            .raw_events
            .insert(event.raw_event_id.clone(), event.clone());
        Ok(event)
    }

    async fn get_raw_event(&self, raw_event_id: &str) -> DomainResult<Option<RawEvent>> {
        let tables = self.tables.read().await;
        Ok(tables.raw_events.get(raw_event_id).cloned())
    }

    async fn update_raw_event_status(
        &self,
        input: UpdateRawEventStatusRepoInput,
    ) -> DomainResult<()> {
        if !input.status.is_terminal() {
            return Err(DomainError::ValidationError(
                "raw event status can only move to a terminal value".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        let event = tables
            .raw_events
            .get_mut(&input.raw_event_id)
            .ok_or_else(|| DomainError::RawEventNotFound(input.raw_event_id.clone()))?;

        if event.status.is_terminal() {
            return Err(DomainError::StatusAlreadySettled(input.raw_event_id));
        }

        event.status = input.status;
        event.error_message = input.error_message;
        Ok(())
    }
}

#[async_trait]
impl MappedEventRepository for InMemoryEventStore {
    async fn create_mapped_event(
        &self,
        input: CreateMappedEventRepoInput,
    ) -> DomainResult<MappedEvent> {
        let mut tables = self.tables.write().await;

        if !tables.raw_events.contains_key(&input.raw_event_id) {
            return Err(DomainError::RawEventNotFound(input.raw_event_id));
        }
        if tables.mapped_by_raw.contains_key(&input.raw_event_id) {
            return Err(DomainError::RepositoryError(anyhow::anyhow!(
                "raw event {} already has a mapped event",
                input.raw_event_id
            )));
        }

        let event = MappedEvent {
            mapped_event_id: input.mapped_event_id,
            raw_event_id: input.raw_event_id,
            actor_id: input.actor_id,
            amount: input.amount,
            currency: input.currency,
            event_type: input.event_type,
            occurred_at: input.occurred_at,
            payload: input.payload,
            publish_status: PublishStatus::Pending,
            failure_reason: None,
            created_at: input.created_at,
        };
        tables
            .mapped_by_raw
            .insert(event.raw_event_id.clone(), event.mapped_event_id.clone());
        tables
            .mapped_events
            .insert(event.mapped_event_id.clone(), event.clone());
        Ok(event)
    }

    async fn get_mapped_event(&self, mapped_event_id: &str) -> DomainResult<Option<MappedEvent>> {
        let tables = self.tables.read().await;
        Ok(tables.mapped_events.get(mapped_event_id).cloned())
    }

    async fn get_mapped_event_by_raw_event_id(
        &self,
        raw_event_id: &str,
    ) -> DomainResult<Option<MappedEvent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .mapped_by_raw
            .get(raw_event_id)
            .and_then(|id| tables.mapped_events.get(id))
            .cloned())
    }

    async fn update_publish_status(&self, input: UpdatePublishStatusRepoInput) -> DomainResult<()> {
        if input.publish_status == PublishStatus::Pending {
            return Err(DomainError::ValidationError(
                "publish status can only move to Sent or Failed".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        let event = tables
            .mapped_events
            .get_mut(&input.mapped_event_id)
            .ok_or_else(|| DomainError::MappedEventNotFound(input.mapped_event_id.clone()))?;

        if event.publish_status != PublishStatus::Pending {
            return Err(DomainError::StatusAlreadySettled(input.mapped_event_id));
        }

        event.publish_status = input.publish_status;
        event.failure_reason = input.failure_reason;
        Ok(())
    }
}
