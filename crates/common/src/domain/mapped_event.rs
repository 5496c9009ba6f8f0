use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Delivery outcome recorded against a mapped event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    Pending,
    Sent,
    Failed,
}

impl PublishStatus {
    pub fn code(self) -> i16 {
        match self {
            PublishStatus::Pending => 0,
            PublishStatus::Sent => 1,
            PublishStatus::Failed => 2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(PublishStatus::Pending),
            1 => Some(PublishStatus::Sent),
            2 => Some(PublishStatus::Failed),
            _ => None,
        }
    }
}

/// Durable record of the canonical event derived from a raw event
#[derive(Debug, Clone, PartialEq)]
pub struct MappedEvent {
    pub mapped_event_id: String,
    pub raw_event_id: String,
    pub actor_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub event_type: Option<String>,
    pub occurred_at: DateTime<Utc>,
    /// Serialized internal event, extension fields included
    pub payload: String,
    pub publish_status: PublishStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a mapped event (always stored as Pending)
#[derive(Debug, Clone, PartialEq)]
pub struct CreateMappedEventRepoInput {
    pub mapped_event_id: String,
    pub raw_event_id: String,
    pub actor_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub event_type: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePublishStatusRepoInput {
    pub mapped_event_id: String,
    pub publish_status: PublishStatus,
    pub failure_reason: Option<String>,
}

/// Repository trait for mapped event persistence
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MappedEventRepository: Send + Sync {
    /// Fails with `RawEventNotFound` when the owning raw event does not exist
    async fn create_mapped_event(&self, input: CreateMappedEventRepoInput)
        -> DomainResult<MappedEvent>;

    async fn get_mapped_event(&self, mapped_event_id: &str) -> DomainResult<Option<MappedEvent>>;

    async fn get_mapped_event_by_raw_event_id(
        &self,
        raw_event_id: &str,
    ) -> DomainResult<Option<MappedEvent>>;

    /// Move a Pending mapped event to Sent or Failed
    async fn update_publish_status(&self, input: UpdatePublishStatusRepoInput)
        -> DomainResult<()>;
}
