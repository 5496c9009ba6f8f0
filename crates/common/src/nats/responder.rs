use anyhow::{Context, Result};
use async_nats::{HeaderMap, Subscriber};
use bytes::Bytes;
use futures::{future::BoxFuture, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Owned copy of a core NATS request
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub subject: String,
    pub payload: Bytes,
    pub headers: Option<HeaderMap>,
}

/// Turns one request into the reply body
pub type RequestHandler = Box<dyn Fn(ReceivedRequest) -> BoxFuture<'static, Bytes> + Send + Sync>;

/// Core NATS subscription that answers each request on its reply subject.
///
/// Requests without a reply subject are dropped.
pub struct NatsResponder {
    client: async_nats::Client,
    subscriber: Subscriber,
    subject: String,
    handler: RequestHandler,
}

impl NatsResponder {
    pub async fn new(
        client: &async_nats::Client,
        subject: String,
        handler: RequestHandler,
    ) -> Result<Self> {
        let subscriber = client
            .subscribe(subject.clone())
            .await
            .context("Failed to subscribe for requests")?;

        info!(subject = %subject, "Request responder subscribed");

        Ok(Self {
            client: client.clone(),
            subscriber,
            subject,
            handler,
        })
    }

    pub async fn run(mut self, ctx: CancellationToken) -> Result<()> {
        info!(subject = %self.subject, "Starting responder loop");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping responder");
                    break;
                }
                next = self.subscriber.next() => {
                    match next {
                        Some(message) => self.respond(message).await,
                        None => {
                            warn!(subject = %self.subject, "Request subscription closed");
                            break;
                        }
                    }
                }
            }
        }

        if let Err(e) = self.subscriber.unsubscribe().await {
            warn!(error = %e, "Failed to unsubscribe responder");
        }

        info!("Responder stopped gracefully");
        Ok(())
    }

    async fn respond(&self, message: async_nats::Message) {
        let Some(reply) = message.reply.clone() else {
            debug!(subject = %message.subject, "Ignoring request without reply subject");
            return;
        };

        let request = ReceivedRequest {
            subject: message.subject.to_string(),
            payload: message.payload,
            headers: message.headers,
        };
        let body = (self.handler)(request).await;

        if let Err(e) = self.client.publish(reply, body).await {
            error!(error = %e, "Failed to send reply");
        }
    }
}
