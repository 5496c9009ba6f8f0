use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, EventPublisher, InternalEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Bounds every publish call; an elapsed deadline becomes `PublishFailure`
pub struct TimeoutPublisher {
    inner: Arc<dyn EventPublisher>,
    timeout: Duration,
}

impl TimeoutPublisher {
    pub fn new(inner: Arc<dyn EventPublisher>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl EventPublisher for TimeoutPublisher {
    async fn publish(&self, event: &InternalEvent) -> DomainResult<()> {
        match tokio::time::timeout(self.timeout, self.inner.publish(event)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis(), "Publish timed out");
                Err(DomainError::PublishFailure(format!(
                    "publish timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::domain::CanonicalMap;
    use rust_decimal::Decimal;

    struct SlowPublisher(Duration);

    #[async_trait]
    impl EventPublisher for SlowPublisher {
        async fn publish(&self, _event: &InternalEvent) -> DomainResult<()> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    fn event() -> InternalEvent {
        InternalEvent {
            actor_id: "p1".to_string(),
            amount: Decimal::from(1),
            currency: "GEL".to_string(),
            occurred_at: Utc::now(),
            event_type: None,
            extensions: CanonicalMap::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_deadline_is_publish_failure() {
        let publisher = TimeoutPublisher::new(
            Arc::new(SlowPublisher(Duration::from_secs(60))),
            Duration::from_secs(5),
        );

        let err = publisher.publish(&event()).await.unwrap_err();
        assert!(matches!(err, DomainError::PublishFailure(ref msg) if msg.contains("5000ms")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_publish_passes_through() {
        let publisher = TimeoutPublisher::new(
            Arc::new(SlowPublisher(Duration::from_millis(10))),
            Duration::from_secs(5),
        );

        assert!(publisher.publish(&event()).await.is_ok());
    }
}
