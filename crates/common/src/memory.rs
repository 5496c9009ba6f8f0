mod in_memory_event_store;
mod in_memory_mapping_rule_repository;

pub use in_memory_event_store::*;
pub use in_memory_mapping_rule_repository::*;
