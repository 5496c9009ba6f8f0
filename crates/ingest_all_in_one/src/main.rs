mod config;

use common::domain::{
    EventPublisher, MappedEventRepository, MappingRuleRepository, RawEventRepository,
};
use common::nats::NatsClient;
use common::postgres::{
    PostgresClient, PostgresConnectionSettings, PostgresMappedEventRepository,
    PostgresMappingRuleRepository, PostgresRawEventRepository,
};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use config::ServiceConfig;
use goose::MigrationRunner;
use ingest_runner::Runner;
use ingestion_worker::domain::{
    fault_injector_for_rate, FaultInjectingPublisher, IngestionService, MappingRuleService,
    TimeoutPublisher,
};
use ingestion_worker::ingestion_worker::{IngestionWorker, IngestionWorkerConfig};
use ingestion_worker::nats::NatsEventPublisher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        otel_endpoint = %config.otel_endpoint,
        "Starting event-ingest service"
    );
    debug!("Configuration: {:?}", config);

    let (postgres_repos, nats_client) = match initialize_shared_dependencies(&config).await {
        Ok(deps) => deps,
        Err(e) => {
            error!("Failed to initialize shared dependencies: {:#}", e);
            std::process::exit(1);
        }
    };

    let mapping_rule_service = Arc::new(MappingRuleService::new(
        postgres_repos.mapping_rule.clone(),
    ));
    if config.seed_default_rules {
        match mapping_rule_service.seed_default_rules().await {
            Ok(seeded) => info!(seeded, "Mapping rules ready"),
            Err(e) => {
                error!("Failed to seed default mapping rules: {}", e);
                std::process::exit(1);
            }
        }
    }

    let ingestion_service = Arc::new(IngestionService::new(
        postgres_repos.mapping_rule,
        postgres_repos.raw_event,
        postgres_repos.mapped_event,
        build_event_publisher(&config, &nats_client),
    ));

    let ingestion_worker = match IngestionWorker::new(
        ingestion_service,
        mapping_rule_service,
        nats_client.clone(),
        IngestionWorkerConfig {
            submissions_stream: config.submissions_stream.clone(),
            submissions_subject: config.submissions_subject.clone(),
            submissions_consumer_name: config.submissions_consumer_name.clone(),
            nats_batch_size: config.nats_batch_size,
            nats_batch_wait_secs: config.nats_batch_wait_secs,
            simulation_enabled: config.simulation_enabled,
            simulation_interval_secs: config.simulation_interval_secs,
            simulation_batch_size: config.simulation_batch_size,
            control_enabled: config.control_enabled,
            control_subject_prefix: config.control_subject_prefix.clone(),
            events_stream: config.events_stream.clone(),
            event_log_enabled: config.event_log_enabled,
            event_log_consumer_name: config.event_log_consumer_name.clone(),
        },
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) => {
            error!("Failed to initialize ingestion worker: {:#}", e);
            std::process::exit(1);
        }
    };

    let mut runner = Runner::new();
    for (name, process) in ingestion_worker.into_runner_processes() {
        runner = runner.with_named_process(name, process);
    }

    runner = runner
        .with_closer({
            let nats_for_close = Arc::clone(&nats_client);
            drop(nats_client);
            move || async move {
                info!("Running cleanup tasks...");
                match Arc::try_unwrap(nats_for_close) {
                    Ok(client) => {
                        if let Err(e) = client.close().await {
                            error!("Failed to close NATS connection: {:#}", e);
                        }
                    }
                    Err(_) => debug!("NATS client still shared, skipping explicit close"),
                }

                // Flush pending traces and logs
                shutdown_telemetry(telemetry_providers);

                info!("Cleanup complete");
                Ok(())
            }
        })
        .with_closer_timeout(Duration::from_secs(10));

    runner.run().await;
}

struct PostgresRepositories {
    mapping_rule: Arc<dyn MappingRuleRepository>,
    raw_event: Arc<dyn RawEventRepository>,
    mapped_event: Arc<dyn MappedEventRepository>,
}

async fn initialize_shared_dependencies(
    config: &ServiceConfig,
) -> anyhow::Result<(PostgresRepositories, Arc<NatsClient>)> {
    info!("Initializing PostgreSQL...");
    let settings = postgres_settings(config);
    run_postgres_migrations(config, &settings).await?;
    let postgres_client = PostgresClient::new(&settings)?;
    postgres_client.ping().await?;
    let postgres_repos = PostgresRepositories {
        mapping_rule: Arc::new(PostgresMappingRuleRepository::new(postgres_client.clone())),
        raw_event: Arc::new(PostgresRawEventRepository::new(postgres_client.clone())),
        mapped_event: Arc::new(PostgresMappedEventRepository::new(postgres_client)),
    };

    info!("Initializing NATS...");
    let nats_client = Arc::new(
        NatsClient::connect(
            &config.nats_url,
            Duration::from_secs(config.startup_timeout_secs),
        )
        .await?,
    );
    ensure_nats_streams(&nats_client, config).await?;

    Ok((postgres_repos, nats_client))
}

fn postgres_settings(config: &ServiceConfig) -> PostgresConnectionSettings {
    PostgresConnectionSettings {
        host: config.postgres_host.clone(),
        port: config.postgres_port,
        database: config.postgres_database.clone(),
        username: config.postgres_username.clone(),
        password: config.postgres_password.clone(),
        max_pool_size: config.postgres_max_pool_size,
    }
}

async fn run_postgres_migrations(
    config: &ServiceConfig,
    settings: &PostgresConnectionSettings,
) -> anyhow::Result<()> {
    let runner = MigrationRunner::new(
        config.postgres_goose_binary_path.clone(),
        config.postgres_migrations_dir.clone(),
        "postgres".to_string(),
        settings.dsn(),
    );
    runner.run_migrations().await
}

async fn ensure_nats_streams(client: &NatsClient, config: &ServiceConfig) -> anyhow::Result<()> {
    client
        .ensure_stream(&config.events_stream, "Canonical internal events")
        .await?;
    client
        .ensure_stream(&config.submissions_stream, "Inbound external submissions")
        .await?;
    Ok(())
}

/// JetStream publisher wrapped with a deadline, then optional fault injection
fn build_event_publisher(
    config: &ServiceConfig,
    nats_client: &NatsClient,
) -> Arc<dyn EventPublisher> {
    let nats_publisher = Arc::new(NatsEventPublisher::new(
        nats_client.create_publisher_client(),
        config.events_stream.clone(),
    ));
    let timed = Arc::new(TimeoutPublisher::new(
        nats_publisher,
        Duration::from_millis(config.publish_timeout_ms),
    ));

    if config.publish_failure_rate > 0.0 {
        info!(
            failure_rate = config.publish_failure_rate,
            "Publish fault injection enabled"
        );
    }
    Arc::new(FaultInjectingPublisher::new(
        timed,
        fault_injector_for_rate(config.publish_failure_rate),
    ))
}
