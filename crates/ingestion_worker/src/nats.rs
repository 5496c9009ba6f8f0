mod control_handler;
mod event_log_processor;
mod event_publisher;
mod submission_processor;

pub use control_handler::*;
pub use event_log_processor::*;
pub use event_publisher::*;
pub use submission_processor::*;
