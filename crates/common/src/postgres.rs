mod client;
mod mapped_event_repository;
mod mapping_rule_repository;
mod raw_event_repository;

pub use client::*;
pub use mapped_event_repository::*;
pub use mapping_rule_repository::*;
pub use raw_event_repository::*;
