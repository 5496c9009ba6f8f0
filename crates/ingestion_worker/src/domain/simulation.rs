use crate::domain::{IngestionResult, IngestionService};
use anyhow::Result;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use common::domain::RawPayload;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const CURRENCIES: [&str; 3] = ["GEL", "USD", "EUR"];
const EVENT_TYPES: [&str; 3] = ["BetPlaced", "Deposit", "Withdrawal"];

/// Random submission in the external vocabulary
pub fn sample_event<R: Rng>(rng: &mut R) -> RawPayload {
    let player = rng.random_range(1..1000);
    let amount = rng.random::<f64>() * 100.0;
    let currency = CURRENCIES[rng.random_range(0..CURRENCIES.len())];
    let event_type = EVENT_TYPES[rng.random_range(0..EVENT_TYPES.len())];
    let occurred_at = Utc::now() - ChronoDuration::minutes(rng.random_range(0..1000));

    RawPayload::new()
        .with_field("usr", format!("player_{}", player))
        .with_field("amt", format!("{:.2}", amount))
        .with_field("curr", currency)
        .with_field("ts", occurred_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .with_field("etype", event_type)
}

fn fixed_sample() -> RawPayload {
    RawPayload::new()
        .with_field("usr", "player_123")
        .with_field("amt", "25.50")
        .with_field("curr", "GEL")
        .with_field("ts", Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        .with_field("etype", "BetPlaced")
}

/// Tally of one simulated batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub success_count: usize,
    pub fail_count: usize,
    /// Distinct failure messages in the order first seen
    pub errors: Vec<String>,
}

impl BatchSummary {
    fn record(&mut self, result: IngestionResult) {
        self.total += 1;
        if result.success {
            self.success_count += 1;
            return;
        }

        self.fail_count += 1;
        if let Some(error) = result.error {
            if !self.errors.contains(&error) {
                self.errors.push(error);
            }
        }
    }
}

/// Feeds synthetic traffic through the ingestion pipeline
pub struct Simulator {
    service: Arc<IngestionService>,
}

impl Simulator {
    pub fn new(service: Arc<IngestionService>) -> Self {
        Self { service }
    }

    pub async fn publish_one(&self) -> IngestionResult {
        self.ingest(fixed_sample()).await
    }

    pub async fn publish_batch(&self, count: usize) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for _ in 0..count {
            // ThreadRng is not Send, keep it out of the await
            let payload = sample_event(&mut rand::rng());
            summary.record(self.ingest(payload).await);
        }
        summary
    }

    async fn ingest(&self, payload: RawPayload) -> IngestionResult {
        match self.service.ingest(payload).await {
            Ok(_) => IngestionResult::succeeded(),
            Err(e) => IngestionResult::failed(e.to_string()),
        }
    }
}

pub struct SimulationConfig {
    pub interval: Duration,
    pub batch_size: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            batch_size: 100,
        }
    }
}

/// Publish a random batch every interval until cancelled
pub async fn run_simulation_producer(
    ctx: CancellationToken,
    config: SimulationConfig,
    simulator: Simulator,
) -> Result<()> {
    info!(
        interval_ms = config.interval.as_millis() as u64,
        batch_size = config.batch_size,
        "Simulation producer started"
    );

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                info!("Received shutdown signal, stopping simulation producer");
                break;
            }
            _ = tokio::time::sleep(config.interval) => {
                let summary = simulator.publish_batch(config.batch_size).await;
                if summary.fail_count > 0 {
                    warn!(
                        total = summary.total,
                        success_count = summary.success_count,
                        fail_count = summary.fail_count,
                        errors = ?summary.errors,
                        "Simulated batch had failures"
                    );
                } else {
                    debug!(total = summary.total, "Simulated batch ingested");
                }
            }
        }
    }

    info!("Simulation producer stopped gracefully");
    Ok(())
}
