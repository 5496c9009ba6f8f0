pub mod domain;
pub mod ingestion_worker;
pub mod nats;

pub use domain::*;
pub use ingestion_worker::*;
pub use nats::*;
