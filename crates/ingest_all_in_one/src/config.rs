use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Stream receiving internal events, also the subject prefix for routing keys
    #[serde(default = "default_events_stream")]
    pub events_stream: String,

    /// Stream carrying inbound submissions
    #[serde(default = "default_submissions_stream")]
    pub submissions_stream: String,

    /// Subject filter for the submission consumer
    #[serde(default = "default_submissions_subject")]
    pub submissions_subject: String,

    /// Durable consumer name for submissions
    #[serde(default = "default_submissions_consumer_name")]
    pub submissions_consumer_name: String,

    /// Batch size for consumer
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // PostgreSQL configuration
    /// PostgreSQL host
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    /// PostgreSQL port
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    /// PostgreSQL database name
    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    /// PostgreSQL username
    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    /// PostgreSQL password
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Maximum pooled connections
    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Path to PostgreSQL migrations directory
    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    /// Path to goose binary
    #[serde(default = "default_postgres_goose_binary_path")]
    pub postgres_goose_binary_path: String,

    // Publishing
    /// Deadline for a single publish, in milliseconds
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,

    /// Probability in [0, 1] that a publish is failed on purpose
    #[serde(default = "default_publish_failure_rate")]
    pub publish_failure_rate: f64,

    /// Seed the default mapping rules when the rule store is empty
    #[serde(default = "default_seed_default_rules")]
    pub seed_default_rules: bool,

    // Simulation
    /// Run the traffic simulator alongside the consumer
    #[serde(default = "default_simulation_enabled")]
    pub simulation_enabled: bool,

    /// Seconds between simulated batches
    #[serde(default = "default_simulation_interval_secs")]
    pub simulation_interval_secs: u64,

    /// Events per simulated batch
    #[serde(default = "default_simulation_batch_size")]
    pub simulation_batch_size: usize,

    // Control
    /// Answer rule management and simulation requests over NATS
    #[serde(default = "default_control_enabled")]
    pub control_enabled: bool,

    /// Subject prefix for control requests
    #[serde(default = "default_control_subject_prefix")]
    pub control_subject_prefix: String,

    /// Log every published event from a durable consumer on the events stream
    #[serde(default = "default_event_log_enabled")]
    pub event_log_enabled: bool,

    /// Durable consumer name for the event log
    #[serde(default = "default_event_log_consumer_name")]
    pub event_log_consumer_name: String,

    // OpenTelemetry configuration
    /// OpenTelemetry OTLP endpoint (gRPC)
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Enable OpenTelemetry export
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    /// Service name for OpenTelemetry resource
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_events_stream() -> String {
    "events".to_string()
}

fn default_submissions_stream() -> String {
    "submissions".to_string()
}

fn default_submissions_subject() -> String {
    "submissions.>".to_string()
}

fn default_submissions_consumer_name() -> String {
    "event-ingest-submissions".to_string()
}

fn default_nats_batch_size() -> usize {
    30
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_startup_timeout_secs() -> u64 {
    30
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "ingest".to_string()
}

fn default_postgres_username() -> String {
    "ingest".to_string()
}

fn default_postgres_password() -> String {
    "ingest".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    5
}

fn default_postgres_migrations_dir() -> String {
    "crates/common/migrations/postgres".to_string()
}

fn default_postgres_goose_binary_path() -> String {
    "goose".to_string()
}

fn default_publish_timeout_ms() -> u64 {
    5000
}

fn default_publish_failure_rate() -> f64 {
    0.0
}

fn default_seed_default_rules() -> bool {
    true
}

fn default_simulation_enabled() -> bool {
    false
}

fn default_simulation_interval_secs() -> u64 {
    10
}

fn default_simulation_batch_size() -> usize {
    100
}

fn default_control_enabled() -> bool {
    true
}

fn default_control_subject_prefix() -> String {
    "ingest.control".to_string()
}

fn default_event_log_enabled() -> bool {
    false
}

fn default_event_log_consumer_name() -> String {
    "event-ingest-event-log".to_string()
}

// OpenTelemetry defaults
fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_service_name() -> String {
    "event-ingest".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("INGEST"))
            .build()?
            .try_deserialize()
    }
}
