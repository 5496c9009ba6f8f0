mod internal_event;
mod mapped_event;
mod mapping_rule;
mod payload;
mod raw_event;
mod result;

pub use internal_event::*;
pub use mapped_event::*;
pub use mapping_rule::*;
pub use payload::*;
pub use raw_event::*;
pub use result::*;
