//! itemq server: consumes item commands from a broker queue, runs them on a
//! fixed worker pool, and applies them to a shared insertion-ordered store.

pub mod app;
pub mod broker;
pub mod cli;
pub mod pipeline;
pub mod producer;
pub mod service;
pub mod shutdown;
pub mod storage;

pub use app::ItemQueueServer;
pub use broker::{BrokerError, Delivery, DeliveryStream, MemoryBroker, Publisher};
pub use pipeline::{MessageProcessor, Pipeline, PipelineError};
pub use service::{
    CommandDispatcher, DispatchError, DispatchResponse, PoolError, ServerConfig, WorkerPool,
};
pub use shutdown::{ServiceState, ShutdownController};
pub use storage::{OrderedStorage, StorageEngine};

