use anyhow::Result;
use async_trait::async_trait;

/// Publishing side of a JetStream context
///
/// Kept behind a trait so event publishers can be tested without a server.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamPublisher: Send + Sync {
    /// Publish a message to a subject and await the stream acknowledgment
    async fn publish(&self, subject: String, payload: bytes::Bytes) -> Result<()>;
}
