use crate::domain::IngestionService;
use anyhow::Result;
use common::nats::{link_span_to_headers, BatchProcessor, ProcessingResult, ReceivedMessage};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};

/// Batch processor that runs every submission through the ingestion service.
///
/// A message is rejected for redelivery only when nothing was recorded for
/// it. Every other verdict, failures included, is final and acknowledged.
pub fn create_submission_processor(service: Arc<IngestionService>) -> BatchProcessor {
    Box::new(
        move |messages: Vec<ReceivedMessage>| -> BoxFuture<'static, Result<ProcessingResult>> {
            let service = service.clone();
            Box::pin(async move { Ok(process_submissions(&service, messages).await) })
        },
    )
}

pub async fn process_submissions(
    service: &IngestionService,
    messages: Vec<ReceivedMessage>,
) -> ProcessingResult {
    let mut ack = Vec::with_capacity(messages.len());
    let mut nak = Vec::new();

    for (index, message) in messages.into_iter().enumerate() {
        let span = info_span!("submission", subject = %message.subject, index);
        link_span_to_headers(&span, message.headers.as_ref());

        let body = match std::str::from_utf8(&message.payload) {
            Ok(body) => body,
            Err(e) => {
                span.in_scope(|| warn!(error = %e, "Dropping submission that is not UTF-8"));
                ack.push(index);
                continue;
            }
        };

        let verdict = service.submit(body).instrument(span.clone()).await;
        span.in_scope(|| {
            debug!(
                success = verdict.result.success,
                retryable = verdict.retryable,
                "Submission settled"
            )
        });

        if verdict.retryable {
            nak.push((index, verdict.result.error));
        } else {
            ack.push(index);
        }
    }

    ProcessingResult::new(ack, nak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use common::domain::{DomainError, DEFAULT_MAPPING_RULES};
    use common::memory::{InMemoryEventStore, InMemoryMappingRuleRepository};
    use common::{MockEventPublisher, MockRawEventRepository};

    const VALID: &str = r#"{"usr":"p1","amt":"10.5","curr":"USD","ts":"2024-01-01T00:00:00Z","etype":"Deposit"}"#;
    const MISSING_AMOUNT: &str = r#"{"usr":"p1","ts":"2024-01-01T00:00:00Z"}"#;

    fn message(body: impl Into<Bytes>) -> ReceivedMessage {
        ReceivedMessage {
            subject: "submissions.games".to_string(),
            payload: body.into(),
            headers: None,
        }
    }

    fn accepting_publisher() -> Arc<MockEventPublisher> {
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().returning(|_| Ok(()));
        Arc::new(publisher)
    }

    fn service(store: &InMemoryEventStore) -> Arc<IngestionService> {
        Arc::new(IngestionService::new(
            Arc::new(InMemoryMappingRuleRepository::with_rules(DEFAULT_MAPPING_RULES)),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            accepting_publisher(),
        ))
    }

    #[tokio::test]
    async fn test_final_verdicts_are_acked() {
        let store = InMemoryEventStore::new();
        let service = service(&store);

        let result = process_submissions(
            &service,
            vec![
                message(VALID),
                message("not json"),
                message(MISSING_AMOUNT),
                message(vec![0xff, 0xfe]),
            ],
        )
        .await;

        assert_eq!(result, ProcessingResult::new(vec![0, 1, 2, 3], vec![]));
        // the malformed and non UTF-8 bodies leave no trace
        assert_eq!(store.raw_events().await.len(), 2);
        assert_eq!(store.mapped_events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unrecorded_submission_is_naked() {
        let mut raw_repo = MockRawEventRepository::new();
        raw_repo.expect_create_raw_event().returning(|_| {
            Err(DomainError::RepositoryError(anyhow::anyhow!(
                "connection refused"
            )))
        });

        let store = InMemoryEventStore::new();
        let service = IngestionService::new(
            Arc::new(InMemoryMappingRuleRepository::with_rules(DEFAULT_MAPPING_RULES)),
            Arc::new(raw_repo),
            Arc::new(store),
            accepting_publisher(),
        );

        let result = process_submissions(&service, vec![message("[]"), message(VALID)]).await;

        assert_eq!(result.ack, vec![0]);
        assert_eq!(result.nak.len(), 1);
        assert_eq!(result.nak[0].0, 1);
        assert!(result.nak[0]
            .1
            .as_deref()
            .unwrap()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn test_processor_closure_delegates() {
        let store = InMemoryEventStore::new();
        let processor = create_submission_processor(service(&store));

        let result = processor(vec![message(VALID), message(VALID)]).await.unwrap();

        assert_eq!(result, ProcessingResult::ack_all(2));
        assert_eq!(store.mapped_events().await.len(), 2);
    }
}
