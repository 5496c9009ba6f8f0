use anyhow::Result;
use common::nats::{link_span_to_headers, BatchProcessor, ProcessingResult, ReceivedMessage};
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{info, info_span, warn};

/// Routing label of a published event: the last subject token
pub fn event_label(subject: &str) -> &str {
    subject.rsplit('.').next().unwrap_or(subject)
}

/// Batch processor that logs every published internal event and acks it.
///
/// Bodies that are not JSON are logged and acked so they never redeliver.
pub fn create_event_log_processor() -> BatchProcessor {
    Box::new(
        |messages: Vec<ReceivedMessage>| -> BoxFuture<'static, Result<ProcessingResult>> {
            Box::pin(async move { Ok(log_events(&messages)) })
        },
    )
}

pub fn log_events(messages: &[ReceivedMessage]) -> ProcessingResult {
    for message in messages {
        let label = event_label(&message.subject);
        let span = info_span!("published_event", subject = %message.subject, label);
        link_span_to_headers(&span, message.headers.as_ref());
        let _guard = span.enter();

        match serde_json::from_slice::<Value>(&message.payload) {
            Ok(event) => info!(
                actor_id = event["actorId"].as_str().unwrap_or_default(),
                amount = %event["amount"],
                currency = event["currency"].as_str().unwrap_or_default(),
                payload = %event,
                "Received {} event",
                label
            ),
            Err(e) => warn!(error = %e, "Received event that is not JSON"),
        }
    }

    ProcessingResult::ack_all(messages.len())
}
