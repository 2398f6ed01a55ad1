//! Broker collaborator: delivery types, the consumed stream interface, and
//! an in-memory queue broker with its publisher.
//!
//! The pipeline only depends on [`DeliveryStream`]. Acknowledgment is
//! implicit on receipt: a delivery handed out by a stream is never
//! redelivered, even if processing it later fails.

pub mod delivery;
pub mod memory;
pub mod publisher;

use async_trait::async_trait;
use itemq_core::EncodeError;

pub use delivery::{Delivery, HeaderValue, Headers};
pub use memory::{MemoryBroker, MemoryConsumer};
pub use publisher::Publisher;

/// Errors raised by the broker collaborator.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("queue not declared: {name}")]
    QueueNotFound { name: String },
    #[error("queue {queue} is closed")]
    Disconnected { queue: String },
    #[error("timed out after {timeout_ms}ms handing message to queue {queue}")]
    Timeout { queue: String, timeout_ms: u64 },
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Connection or channel level failure; fatal to the consumption loop.
    #[error("broker fault: {0}")]
    Fault(String),
}

/// Source of inbound deliveries consumed by the pipeline.
///
/// `None` means the stream has ended. An `Err` item is a broker fault and
/// ends consumption.
#[async_trait]
pub trait DeliveryStream: Send {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>>;
}
