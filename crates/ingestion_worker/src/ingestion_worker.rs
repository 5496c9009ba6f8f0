use crate::domain::{
    run_simulation_producer, IngestionService, MappingRuleService, SimulationConfig, Simulator,
};
use crate::nats::{
    create_control_request_handler, create_event_log_processor, create_submission_processor,
    ControlHandler,
};
use common::nats::{NatsClient, NatsConsumer, NatsConsumerConfig, NatsResponder};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub type WorkerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
pub type WorkerProcess = Box<dyn FnOnce(CancellationToken) -> WorkerFuture + Send>;

pub struct IngestionWorkerConfig {
    pub submissions_stream: String,
    pub submissions_subject: String,
    pub submissions_consumer_name: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    pub simulation_enabled: bool,
    pub simulation_interval_secs: u64,
    pub simulation_batch_size: usize,
    pub control_enabled: bool,
    pub control_subject_prefix: String,
    pub events_stream: String,
    pub event_log_enabled: bool,
    pub event_log_consumer_name: String,
}

/// Consumes submissions from JetStream. Optional processes feed simulated
/// traffic, answer control requests and log the published events.
pub struct IngestionWorker {
    submission_consumer: NatsConsumer,
    simulation: Option<(SimulationConfig, Simulator)>,
    control_responder: Option<NatsResponder>,
    event_log_consumer: Option<NatsConsumer>,
}

impl IngestionWorker {
    pub async fn new(
        service: Arc<IngestionService>,
        rules: Arc<MappingRuleService>,
        nats_client: Arc<NatsClient>,
        config: IngestionWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("Initializing ingestion worker");

        let processor = create_submission_processor(service.clone());
        let submission_consumer = NatsConsumer::new(
            nats_client.jetstream(),
            NatsConsumerConfig {
                stream_name: config.submissions_stream.clone(),
                consumer_name: config.submissions_consumer_name.clone(),
                subject_filter: config.submissions_subject.clone(),
                batch_size: config.nats_batch_size,
                max_wait: Duration::from_secs(config.nats_batch_wait_secs),
            },
            processor,
        )
        .await?;

        let simulation = config.simulation_enabled.then(|| {
            (
                SimulationConfig {
                    interval: Duration::from_secs(config.simulation_interval_secs),
                    batch_size: config.simulation_batch_size,
                },
                Simulator::new(service.clone()),
            )
        });

        let control_responder = if config.control_enabled {
            let handler = Arc::new(ControlHandler::new(
                rules,
                Arc::new(Simulator::new(service)),
                config.control_subject_prefix.clone(),
            ));
            let responder = NatsResponder::new(
                nats_client.client(),
                handler.subscription_subject(),
                create_control_request_handler(handler),
            )
            .await?;
            Some(responder)
        } else {
            None
        };

        let event_log_consumer = if config.event_log_enabled {
            let consumer = NatsConsumer::new(
                nats_client.jetstream(),
                NatsConsumerConfig {
                    stream_name: config.events_stream.clone(),
                    consumer_name: config.event_log_consumer_name.clone(),
                    subject_filter: format!("{}.>", config.events_stream),
                    batch_size: config.nats_batch_size,
                    max_wait: Duration::from_secs(config.nats_batch_wait_secs),
                },
                create_event_log_processor(),
            )
            .await?;
            Some(consumer)
        } else {
            None
        };

        info!(
            simulation_enabled = simulation.is_some(),
            control_enabled = control_responder.is_some(),
            event_log_enabled = event_log_consumer.is_some(),
            "Ingestion worker initialized"
        );

        Ok(Self {
            submission_consumer,
            simulation,
            control_responder,
            event_log_consumer,
        })
    }

    /// Named processes for the runner
    pub fn into_runner_processes(self) -> Vec<(&'static str, WorkerProcess)> {
        let consumer = self.submission_consumer;
        let consumer_process: WorkerProcess =
            Box::new(move |ctx: CancellationToken| -> WorkerFuture {
                Box::pin(async move { consumer.run(ctx).await })
            });
        let mut processes = vec![("submission_consumer", consumer_process)];

        if let Some((config, simulator)) = self.simulation {
            let simulation_process: WorkerProcess =
                Box::new(move |ctx: CancellationToken| -> WorkerFuture {
                    Box::pin(async move { run_simulation_producer(ctx, config, simulator).await })
                });
            processes.push(("simulation_producer", simulation_process));
        }

        if let Some(responder) = self.control_responder {
            let control_process: WorkerProcess =
                Box::new(move |ctx: CancellationToken| -> WorkerFuture {
                    Box::pin(async move { responder.run(ctx).await })
                });
            processes.push(("control_responder", control_process));
        }

        if let Some(consumer) = self.event_log_consumer {
            let event_log_process: WorkerProcess =
                Box::new(move |ctx: CancellationToken| -> WorkerFuture {
                    Box::pin(async move { consumer.run(ctx).await })
                });
            processes.push(("event_log_consumer", event_log_process));
        }

        processes
    }
}
