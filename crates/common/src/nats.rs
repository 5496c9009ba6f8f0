mod client;
mod consumer;
mod responder;
mod trace_context;
mod traits;

pub use client::*;
pub use consumer::*;
pub use responder::*;
pub use trace_context::*;
pub use traits::*;
