use crate::domain::{
    build_internal_event, map_fields, MappingRuleResolver, PublishCoordinator, PublishOutcome,
};
use chrono::Utc;
use common::domain::{
    CreateMappedEventRepoInput, CreateRawEventRepoInput, DomainError, DomainResult,
    EventPublisher, InternalEvent, MappedEventRepository, MappingRuleRepository, RawEventRepository,
    RawEventStatus, RawPayload, UpdateRawEventStatusRepoInput,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Span};

/// Checkpoints of one ingestion attempt, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStage {
    Received,
    RawPersisted,
    Mapped,
    Validated,
    MappedPersisted,
    PublishAttempted,
    Done,
}

impl IngestionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStage::Received => "received",
            IngestionStage::RawPersisted => "raw_persisted",
            IngestionStage::Mapped => "mapped",
            IngestionStage::Validated => "validated",
            IngestionStage::MappedPersisted => "mapped_persisted",
            IngestionStage::PublishAttempted => "publish_attempted",
            IngestionStage::Done => "done",
        }
    }
}

impl fmt::Display for IngestionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReceipt {
    pub raw_event_id: String,
    pub mapped_event_id: String,
    pub publish_outcome: PublishOutcome,
}

/// Caller-facing verdict of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestionResult {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Verdict plus whether resubmitting the same body could change it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionVerdict {
    pub result: IngestionResult,
    /// True only when nothing was recorded because the raw write failed
    pub retryable: bool,
}

#[derive(Debug)]
struct StageFailure {
    stage: IngestionStage,
    error: DomainError,
}

impl StageFailure {
    fn at(stage: IngestionStage) -> impl FnOnce(DomainError) -> StageFailure {
        move |error| StageFailure { stage, error }
    }
}

/// Runs the ingestion pipeline: persist raw, map, validate, persist mapped,
/// publish.
pub struct IngestionService {
    mapping_rule_repository: Arc<dyn MappingRuleRepository>,
    raw_event_repository: Arc<dyn RawEventRepository>,
    mapped_event_repository: Arc<dyn MappedEventRepository>,
    coordinator: PublishCoordinator,
}

impl IngestionService {
    pub fn new(
        mapping_rule_repository: Arc<dyn MappingRuleRepository>,
        raw_event_repository: Arc<dyn RawEventRepository>,
        mapped_event_repository: Arc<dyn MappedEventRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let coordinator = PublishCoordinator::new(
            publisher,
            raw_event_repository.clone(),
            mapped_event_repository.clone(),
        );
        Self {
            mapping_rule_repository,
            raw_event_repository,
            mapped_event_repository,
            coordinator,
        }
    }

    /// Ingest one payload.
    ///
    /// Succeeds once the mapped event is stored, whatever the publish outcome.
    /// Fails when the raw event cannot be stored, or when mapping, validation
    /// or the mapped write fail (the raw event is then marked Failed).
    pub async fn ingest(&self, payload: RawPayload) -> DomainResult<IngestionReceipt> {
        self.run(payload).await.map_err(|failure| failure.error)
    }

    /// Parse and ingest a JSON submission body
    pub async fn ingest_json(&self, body: &str) -> IngestionResult {
        self.submit(body).await.result
    }

    pub async fn submit(&self, body: &str) -> SubmissionVerdict {
        let payload = match RawPayload::from_json_str(body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Rejected malformed submission");
                return SubmissionVerdict {
                    result: IngestionResult::failed(e.to_string()),
                    retryable: false,
                };
            }
        };

        match self.run(payload).await {
            Ok(_) => SubmissionVerdict {
                result: IngestionResult::succeeded(),
                retryable: false,
            },
            Err(failure) => SubmissionVerdict {
                result: IngestionResult::failed(failure.error.to_string()),
                retryable: failure.stage == IngestionStage::Received,
            },
        }
    }

    #[instrument(
        name = "ingest",
        skip(self, payload),
        fields(
            field_count = payload.len(),
            raw_event_id = tracing::field::Empty,
            stage = tracing::field::Empty
        )
    )]
    async fn run(&self, payload: RawPayload) -> Result<IngestionReceipt, StageFailure> {
        enter(IngestionStage::Received);

        let raw_event_id = xid::new().to_string();
        Span::current().record("raw_event_id", raw_event_id.as_str());

        self.raw_event_repository
            .create_raw_event(CreateRawEventRepoInput {
                raw_event_id: raw_event_id.clone(),
                received_at: Utc::now(),
                raw_payload: payload.to_json_string(),
            })
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to store raw event");
                StageFailure {
                    stage: IngestionStage::Received,
                    error: e,
                }
            })?;
        enter(IngestionStage::RawPersisted);

        let (mapped_event_id, event) = match self.map_and_store(&raw_event_id, &payload).await {
            Ok(stored) => stored,
            Err(failure) => {
                if failure.error.is_event_validation() {
                    warn!(error = %failure.error, stage = %failure.stage, "Event rejected");
                } else {
                    error!(error = %failure.error, stage = %failure.stage, "Failed to ingest event");
                }
                self.mark_raw_failed(&raw_event_id, &failure.error).await;
                enter(IngestionStage::Done);
                return Err(failure);
            }
        };

        enter(IngestionStage::PublishAttempted);
        let publish_outcome = self
            .coordinator
            .attempt(&raw_event_id, &mapped_event_id, &event)
            .await;
        enter(IngestionStage::Done);

        info!(
            mapped_event_id = %mapped_event_id,
            published = publish_outcome.is_sent(),
            "Event ingested"
        );

        Ok(IngestionReceipt {
            raw_event_id,
            mapped_event_id,
            publish_outcome,
        })
    }

    async fn map_and_store(
        &self,
        raw_event_id: &str,
        payload: &RawPayload,
    ) -> Result<(String, InternalEvent), StageFailure> {
        // A fresh snapshot on every attempt
        let resolver = MappingRuleResolver::load(self.mapping_rule_repository.as_ref())
            .await
            .map_err(StageFailure::at(IngestionStage::RawPersisted))?;

        let canonical = map_fields(payload, &resolver);
        enter(IngestionStage::Mapped);

        let event =
            build_internal_event(&canonical).map_err(StageFailure::at(IngestionStage::Mapped))?;
        enter(IngestionStage::Validated);

        let payload_json = event
            .to_payload_json()
            .map_err(StageFailure::at(IngestionStage::Validated))?;

        let mapped_event_id = xid::new().to_string();
        self.mapped_event_repository
            .create_mapped_event(CreateMappedEventRepoInput {
                mapped_event_id: mapped_event_id.clone(),
                raw_event_id: raw_event_id.to_string(),
                actor_id: event.actor_id.clone(),
                amount: event.amount,
                currency: event.currency.clone(),
                event_type: event.event_type.clone(),
                occurred_at: event.occurred_at,
                payload: payload_json,
                created_at: Utc::now(),
            })
            .await
            .map_err(StageFailure::at(IngestionStage::Validated))?;
        enter(IngestionStage::MappedPersisted);

        Ok((mapped_event_id, event))
    }

    async fn mark_raw_failed(&self, raw_event_id: &str, cause: &DomainError) {
        if let Err(e) = self
            .raw_event_repository
            .update_raw_event_status(UpdateRawEventStatusRepoInput {
                raw_event_id: raw_event_id.to_string(),
                status: RawEventStatus::Failed,
                error_message: Some(cause.to_string()),
            })
            .await
        {
            error!(raw_event_id = %raw_event_id, error = %e, "Failed to mark raw event as failed");
        }
    }
}

fn enter(stage: IngestionStage) {
    Span::current().record("stage", stage.as_str());
    debug!(stage = %stage, "Ingestion stage reached");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlwaysFail, FaultInjectingPublisher};
    use chrono::TimeZone;
    use common::domain::{MappedEvent, PublishStatus, RawEvent, DEFAULT_MAPPING_RULES};
    use common::memory::{InMemoryEventStore, InMemoryMappingRuleRepository};
    use common::{MockEventPublisher, MockMappingRuleRepository, MockRawEventRepository};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    struct Harness {
        service: IngestionService,
        store: InMemoryEventStore,
    }

    impl Harness {
        async fn raw_events(&self) -> Vec<RawEvent> {
            self.store.raw_events().await
        }

        async fn mapped_events(&self) -> Vec<MappedEvent> {
            self.store.mapped_events().await
        }
    }

    fn harness_with(publisher: Arc<dyn EventPublisher>) -> Harness {
        let store = InMemoryEventStore::new();
        let rules = Arc::new(InMemoryMappingRuleRepository::with_rules(DEFAULT_MAPPING_RULES));
        let service = IngestionService::new(
            rules,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            publisher,
        );
        Harness { service, store }
    }

    fn harness() -> Harness {
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().returning(|_| Ok(()));
        harness_with(Arc::new(publisher))
    }

    const VALID: &str = r#"{"usr":"p1","amt":"10.5","curr":"USD","ts":"2024-01-01T00:00:00Z","etype":"Deposit"}"#;

    #[tokio::test]
    async fn test_valid_payload_creates_both_records() {
        let h = harness();

        let result = h.service.ingest_json(VALID).await;
        assert_eq!(result, IngestionResult::succeeded());

        let raw = h.raw_events().await;
        let mapped = h.mapped_events().await;
        assert_eq!(raw.len(), 1);
        assert_eq!(mapped.len(), 1);
        assert_eq!(raw[0].status, RawEventStatus::Processed);
        assert_eq!(raw[0].raw_payload, VALID);
        assert_eq!(mapped[0].raw_event_id, raw[0].raw_event_id);
        assert_eq!(mapped[0].publish_status, PublishStatus::Sent);
    }

    #[tokio::test]
    async fn test_mapped_fields_follow_rules() {
        let h = harness();
        let receipt = h
            .service
            .ingest(RawPayload::from_json_str(VALID).unwrap())
            .await
            .unwrap();

        let mapped = h
            .store
            .get_mapped_event(&receipt.mapped_event_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(mapped.actor_id, "p1");
        assert_eq!(mapped.amount, Decimal::from_str("10.5").unwrap());
        assert_eq!(mapped.currency, "USD");
        assert_eq!(mapped.event_type.as_deref(), Some("Deposit"));
        assert_eq!(
            mapped.occurred_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(receipt.publish_outcome, PublishOutcome::Sent);
    }

    #[tokio::test]
    async fn test_missing_required_field_fails_and_marks_raw() {
        let cases = [
            (r#"{"amt":"1","ts":"2024-01-01"}"#, "ActorId"),
            (r#"{"usr":"p1","ts":"2024-01-01"}"#, "Amount"),
            (r#"{"usr":"p1","amt":"1"}"#, "OccurredAt"),
        ];

        for (body, field) in cases {
            let h = harness();
            let result = h.service.ingest_json(body).await;

            let expected = format!("Missing required internal field: {}", field);
            assert_eq!(result, IngestionResult::failed(expected.clone()));

            let raw = h.raw_events().await;
            assert_eq!(raw.len(), 1);
            assert_eq!(raw[0].status, RawEventStatus::Failed);
            assert_eq!(raw[0].error_message, Some(expected));
            assert!(h.mapped_events().await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_invalid_amount_names_field() {
        let h = harness();
        let result = h
            .service
            .ingest_json(r#"{"usr":"p1","amt":"lots","ts":"2024-01-01"}"#)
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Amount"));
        assert!(h.mapped_events().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_amount_reported_before_missing_timestamp() {
        let h = harness();
        let result = h.service.ingest_json(r#"{"usr":"p1","amt":"x"}"#).await;

        let expected = "Amount has invalid value 'x'".to_string();
        assert_eq!(result, IngestionResult::failed(expected.clone()));

        let raw = h.raw_events().await;
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].status, RawEventStatus::Failed);
        assert_eq!(raw[0].error_message, Some(expected));
        assert!(h.mapped_events().await.is_empty());
    }

    #[tokio::test]
    async fn test_unmapped_field_gets_default_name() {
        let h = harness();
        h.service
            .ingest_json(r#"{"usr":"p1","amt":"1","ts":"2024-01-01","foo":"bar"}"#)
            .await;

        let mapped = h.mapped_events().await;
        let payload: serde_json::Value = serde_json::from_str(&mapped[0].payload).unwrap();
        assert_eq!(payload["Foo"], "bar");
        assert!(payload.get("foo").is_none());
    }

    #[tokio::test]
    async fn test_currency_defaults_to_gel() {
        let h = harness();
        h.service
            .ingest_json(r#"{"usr":"p1","amt":"1","ts":"2024-01-01"}"#)
            .await;

        assert_eq!(h.mapped_events().await[0].currency, "GEL");
    }

    #[tokio::test]
    async fn test_publish_failure_still_succeeds() {
        let mut inner = MockEventPublisher::new();
        inner.expect_publish().times(0);
        let publisher = FaultInjectingPublisher::new(Arc::new(inner), Arc::new(AlwaysFail));
        let h = harness_with(Arc::new(publisher));

        let result = h.service.ingest_json(VALID).await;
        assert!(result.success);

        let mapped = h.mapped_events().await;
        assert_eq!(mapped[0].publish_status, PublishStatus::Failed);
        assert!(!mapped[0].failure_reason.as_deref().unwrap_or("").is_empty());

        let raw = h.raw_events().await;
        assert_eq!(raw[0].status, RawEventStatus::Failed);
        assert_eq!(raw[0].error_message, mapped[0].failure_reason);
    }

    #[tokio::test]
    async fn test_identical_payloads_are_independent() {
        let h = harness();
        h.service.ingest_json(VALID).await;
        h.service.ingest_json(VALID).await;

        let raw = h.raw_events().await;
        let mapped = h.mapped_events().await;
        assert_eq!(raw.len(), 2);
        assert_eq!(mapped.len(), 2);
        assert_ne!(raw[0].raw_event_id, raw[1].raw_event_id);
        assert_ne!(mapped[0].raw_event_id, mapped[1].raw_event_id);
    }

    #[tokio::test]
    async fn test_malformed_json_persists_nothing() {
        let h = harness();

        let verdict = h.service.submit("{not json").await;
        assert!(!verdict.result.success);
        assert!(!verdict.retryable);

        let verdict = h.service.submit("[1,2,3]").await;
        assert!(!verdict.result.success);

        assert!(h.raw_events().await.is_empty());
    }

    #[tokio::test]
    async fn test_rule_snapshot_failure_marks_raw_failed() {
        let store = InMemoryEventStore::new();
        let mut rules = MockMappingRuleRepository::new();
        rules
            .expect_list_all_rules()
            .returning(|| Err(DomainError::RepositoryError(anyhow::anyhow!("rules unavailable"))));
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().times(0);

        let service = IngestionService::new(
            Arc::new(rules),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(publisher),
        );

        let verdict = service.submit(VALID).await;
        assert!(!verdict.result.success);
        assert!(!verdict.retryable);

        let raw = store.raw_events().await;
        assert_eq!(raw[0].status, RawEventStatus::Failed);
        assert!(raw[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("rules unavailable"));
        assert!(store.mapped_events().await.is_empty());
    }

    #[tokio::test]
    async fn test_raw_write_failure_is_retryable() {
        let store = InMemoryEventStore::new();
        let mut raw_repo = MockRawEventRepository::new();
        raw_repo
            .expect_create_raw_event()
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("disk full"))));
        raw_repo.expect_update_raw_event_status().times(0);

        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().times(0);

        let service = IngestionService::new(
            Arc::new(InMemoryMappingRuleRepository::with_rules(DEFAULT_MAPPING_RULES)),
            Arc::new(raw_repo),
            Arc::new(store.clone()),
            Arc::new(publisher),
        );

        let verdict = service.submit(VALID).await;
        assert!(!verdict.result.success);
        assert!(verdict.retryable);
        assert!(store.mapped_events().await.is_empty());

        let err = service
            .ingest(RawPayload::from_json_str(VALID).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::RepositoryError(_)));
    }

    #[tokio::test]
    async fn test_rules_reloaded_per_attempt() {
        let h = harness();
        let rules = Arc::new(InMemoryMappingRuleRepository::new());
        let service = IngestionService::new(
            rules.clone(),
            Arc::new(h.store.clone()),
            Arc::new(h.store.clone()),
            {
                let mut publisher = MockEventPublisher::new();
                publisher.expect_publish().returning(|_| Ok(()));
                Arc::new(publisher)
            },
        );

        let body = r#"{"player":"p9","amount":"3","occurredAt":"2024-01-01"}"#;
        let first = service.ingest_json(body).await;
        assert_eq!(
            first,
            IngestionResult::failed("Missing required internal field: ActorId")
        );

        rules
            .upsert_rule(common::domain::UpsertMappingRuleRepoInput {
                external_name: "player".to_string(),
                internal_name: "ActorId".to_string(),
            })
            .await
            .unwrap();

        assert!(service.ingest_json(body).await.success);
    }
}
