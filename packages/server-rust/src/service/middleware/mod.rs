//! Tower middleware layers around the command dispatcher.
//!
//! - [`metrics`]: dispatch timing, outcome and counters via `tracing` spans
//! - [`stack`]: composes the layers into a single service

pub mod metrics;
pub mod stack;

pub use metrics::MetricsLayer;
pub use stack::{build_dispatch_stack, DispatchStack};
