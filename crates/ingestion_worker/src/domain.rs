mod default_name;
mod event_builder;
mod fault_injection;
mod field_mapper;
mod ingestion_service;
mod mapping_rule_resolver;
mod mapping_rule_service;
mod publish_coordinator;
mod simulation;
mod timeout_publisher;

pub use default_name::*;
pub use event_builder::*;
pub use fault_injection::*;
pub use field_mapper::*;
pub use ingestion_service::*;
pub use mapping_rule_resolver::*;
pub use mapping_rule_service::*;
pub use publish_coordinator::*;
pub use simulation::*;
pub use timeout_publisher::*;
