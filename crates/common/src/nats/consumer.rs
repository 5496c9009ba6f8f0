use anyhow::{Context, Result};
use async_nats::jetstream::{self, consumer::PullConsumer, Message};
use async_nats::HeaderMap;
use bytes::Bytes;
use futures::{future::BoxFuture, StreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-message verdicts for one fetched batch, by index into the batch
#[derive(Debug, Default, PartialEq)]
pub struct ProcessingResult {
    pub ack: Vec<usize>,
    /// Messages to hand back for redelivery, with the reason
    pub nak: Vec<(usize, Option<String>)>,
}

impl ProcessingResult {
    pub fn ack_all(count: usize) -> Self {
        Self {
            ack: (0..count).collect(),
            nak: Vec::new(),
        }
    }

    pub fn nak_all(count: usize, error: Option<String>) -> Self {
        Self {
            ack: Vec::new(),
            nak: (0..count).map(|i| (i, error.clone())).collect(),
        }
    }

    pub fn new(ack: Vec<usize>, nak: Vec<(usize, Option<String>)>) -> Self {
        Self { ack, nak }
    }
}

/// Owned copy of the parts of a JetStream message a processor needs
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub subject: String,
    pub payload: Bytes,
    pub headers: Option<HeaderMap>,
}

impl From<&Message> for ReceivedMessage {
    fn from(msg: &Message) -> Self {
        Self {
            subject: msg.subject.to_string(),
            payload: msg.payload.clone(),
            headers: msg.headers.clone(),
        }
    }
}

pub type BatchProcessor =
    Box<dyn Fn(Vec<ReceivedMessage>) -> BoxFuture<'static, Result<ProcessingResult>> + Send + Sync>;

/// Settings for a durable pull consumer
#[derive(Debug, Clone)]
pub struct NatsConsumerConfig {
    pub stream_name: String,
    pub consumer_name: String,
    pub subject_filter: String,
    pub batch_size: usize,
    pub max_wait: Duration,
}

/// Durable JetStream pull consumer that hands fetched batches to a processor
/// and settles each message according to the returned `ProcessingResult`.
pub struct NatsConsumer {
    consumer: PullConsumer,
    batch_size: usize,
    max_wait: Duration,
    processor: BatchProcessor,
}

impl NatsConsumer {
    pub async fn new(
        jetstream: &jetstream::Context,
        config: NatsConsumerConfig,
        processor: BatchProcessor,
    ) -> Result<Self> {
        debug!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            subject = %config.subject_filter,
            "Creating JetStream consumer"
        );

        let consumer = jetstream
            .create_consumer_on_stream(
                jetstream::consumer::pull::Config {
                    name: Some(config.consumer_name.clone()),
                    durable_name: Some(config.consumer_name.clone()),
                    filter_subject: config.subject_filter.clone(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
                config.stream_name.as_str(),
            )
            .await
            .context("Failed to create consumer")?;

        info!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            "Consumer created successfully"
        );

        Ok(Self {
            consumer,
            batch_size: config.batch_size,
            max_wait: config.max_wait,
            processor,
        })
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!("Starting consumer loop");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping consumer");
                    break;
                }
                result = self.fetch_and_process_batch() => {
                    if let Err(e) = result {
                        error!(error = %e, "Error processing batch");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        info!("Consumer stopped gracefully");
        Ok(())
    }

    async fn fetch_and_process_batch(&self) -> Result<()> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(self.batch_size)
            .expires(self.max_wait)
            .messages()
            .await
            .context("Failed to fetch messages")?;

        let mut batch = Vec::new();
        while let Some(result) = messages.next().await {
            match result {
                Ok(msg) => batch.push(msg),
                Err(e) => warn!(error = %e, "Error receiving message from batch"),
            }
        }

        if batch.is_empty() {
            return Ok(());
        }

        debug!(message_count = batch.len(), "Received message batch");

        let received = batch.iter().map(ReceivedMessage::from).collect();
        let result = match (self.processor)(received).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Processor returned error, rejecting all messages");
                ProcessingResult::nak_all(batch.len(), Some(e.to_string()))
            }
        };

        for idx in result.ack {
            match batch.get(idx) {
                Some(msg) => {
                    if let Err(e) = msg.ack().await {
                        error!(error = %e, message_index = idx, "Failed to acknowledge message");
                    }
                }
                None => warn!(message_index = idx, "Invalid ack index in ProcessingResult"),
            }
        }

        for (idx, reason) in result.nak {
            match batch.get(idx) {
                Some(msg) => {
                    warn!(
                        message_index = idx,
                        subject = %msg.subject,
                        reason = reason.as_deref().unwrap_or("unspecified"),
                        "Rejecting message for redelivery"
                    );
                    if let Err(e) = msg.ack_with(jetstream::AckKind::Nak(None)).await {
                        error!(error = %e, message_index = idx, "Failed to reject message");
                    }
                }
                None => warn!(message_index = idx, "Invalid nak index in ProcessingResult"),
            }
        }

        Ok(())
    }
}
