use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Lifecycle of a received payload. Pending settles exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventStatus {
    Pending,
    Processed,
    Failed,
}

impl RawEventStatus {
    pub fn code(self) -> i16 {
        match self {
            RawEventStatus::Pending => 0,
            RawEventStatus::Processed => 1,
            RawEventStatus::Failed => 2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(RawEventStatus::Pending),
            1 => Some(RawEventStatus::Processed),
            2 => Some(RawEventStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RawEventStatus::Pending)
    }
}

/// Durable record of a payload exactly as received
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub raw_event_id: String,
    pub received_at: DateTime<Utc>,
    pub raw_payload: String,
    pub status: RawEventStatus,
    pub error_message: Option<String>,
}

/// Input for recording a new raw event (always stored as Pending)
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRawEventRepoInput {
    pub raw_event_id: String,
    pub received_at: DateTime<Utc>,
    pub raw_payload: String,
}

/// Input for settling a raw event
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRawEventStatusRepoInput {
    pub raw_event_id: String,
    pub status: RawEventStatus,
    pub error_message: Option<String>,
}

/// Repository trait for raw event persistence
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RawEventRepository: Send + Sync {
    async fn create_raw_event(&self, input: CreateRawEventRepoInput) -> DomainResult<RawEvent>;

    async fn get_raw_event(&self, raw_event_id: &str) -> DomainResult<Option<RawEvent>>;

    /// Move a Pending raw event to a terminal status.
    ///
    /// Fails with `StatusAlreadySettled` if the event is no longer Pending and
    /// with `ValidationError` if the requested status is Pending.
    async fn update_raw_event_status(&self, input: UpdateRawEventStatusRepoInput)
        -> DomainResult<()>;
}
