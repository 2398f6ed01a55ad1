//! Server assembly: wires store, dispatch stack, worker pool, broker and
//! shutdown controller into one runnable unit.

use std::sync::Arc;

use itemq_core::CommandType;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::broker::{MemoryBroker, Publisher};
use crate::pipeline::{MessageProcessor, Pipeline, PipelineError};
use crate::producer::{run_producer, ProducerError};
use crate::service::{
    build_dispatch_stack, CommandDispatcher, PoolError, PoolStats, ServerConfig, WorkerPool,
};
use crate::shutdown::ShutdownController;
use crate::storage::{OrderedStorage, StorageEngine};

/// A fully wired item queue server backed by the in-memory broker.
pub struct ItemQueueServer {
    config: ServerConfig,
    store: Arc<dyn StorageEngine>,
    broker: Arc<MemoryBroker>,
    pool: Arc<WorkerPool>,
    shutdown: Arc<ShutdownController>,
    pipeline: Pipeline,
}

impl ItemQueueServer {
    /// Builds a server with an empty ordered store.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(OrderedStorage::new()))
    }

    /// Builds a server around an existing store. The command queue is
    /// declared immediately.
    #[must_use]
    pub fn with_store(config: ServerConfig, store: Arc<dyn StorageEngine>) -> Self {
        let broker = Arc::new(MemoryBroker::new(config.queue_capacity));
        broker.declare_queue(&config.queue_name);

        let pool = Arc::new(WorkerPool::new(config.worker_count));
        let shutdown = Arc::new(ShutdownController::new());
        let processor = MessageProcessor::new(build_dispatch_stack(CommandDispatcher::new(
            Arc::clone(&store),
        )));
        let pipeline = Pipeline::new(processor, Arc::clone(&pool), Arc::clone(&shutdown));

        Self {
            config,
            store,
            broker,
            pool,
            shutdown,
            pipeline,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn StorageEngine> {
        &self.store
    }

    #[must_use]
    pub fn broker(&self) -> &Arc<MemoryBroker> {
        &self.broker
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> &Arc<ShutdownController> {
        &self.shutdown
    }

    /// Publisher for the command queue, bounded by the publish timeout.
    #[must_use]
    pub fn publisher(&self) -> Publisher {
        self.broker
            .publisher(&self.config.queue_name, self.config.publish_timeout)
    }

    /// Starts the worker pool and marks the server ready.
    ///
    /// # Errors
    ///
    /// Returns the pool's error if it was already started or quit.
    pub fn start(&self) -> Result<(), PoolError> {
        self.pool.start()?;
        self.shutdown.set_ready();
        info!(
            queue = %self.config.queue_name,
            workers = self.pool.size(),
            "itemq server ready"
        );
        Ok(())
    }

    /// Consumes the command queue until it is closed, shutdown is
    /// requested, or the broker faults.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Broker` on a broker fault.
    pub async fn run(&self) -> Result<(), PipelineError> {
        let mut consumer = self.broker.consumer(&self.config.queue_name)?;
        self.pipeline.run(&mut consumer).await
    }

    /// Spawns one random producer per entry of `command_types`.
    #[must_use]
    pub fn spawn_producers(
        &self,
        command_types: &[CommandType],
    ) -> Vec<JoinHandle<Result<(), ProducerError>>> {
        command_types
            .iter()
            .map(|&command_type| {
                tokio::spawn(run_producer(
                    self.publisher(),
                    command_type,
                    self.config.max_send_delay,
                    self.shutdown.subscribe(),
                ))
            })
            .collect()
    }

    /// Stops consumption and producers, then waits for units in flight.
    ///
    /// Returns the pool statistics observed after the drain.
    pub async fn shutdown(&self) -> PoolStats {
        self.shutdown.trigger_shutdown();
        self.pool.quit();

        if self.shutdown.wait_for_drain(self.config.drain_timeout).await {
            self.pool.shutdown().await;
        } else {
            warn!(
                in_flight = self.shutdown.in_flight_count(),
                "units still running after drain timeout"
            );
        }

        let stats = self.pool.stats();
        info!(
            completed = stats.completed,
            failed = stats.failed,
            panicked = stats.panicked,
            items = self.store.len(),
            "itemq server stopped"
        );
        stats
    }
}

impl std::fmt::Debug for ItemQueueServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemQueueServer")
            .field("config", &self.config)
            .field("items", &self.store.len())
            .field("pool", &self.pool)
            .field("state", &self.shutdown.state())
            .finish_non_exhaustive()
    }
}
