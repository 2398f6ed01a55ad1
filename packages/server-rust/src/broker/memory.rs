//! In-process queue broker.
//!
//! Each named queue is a bounded tokio mpsc channel. Queues are declared on
//! demand and live as long as the broker; any number of consumers may
//! compete for deliveries of the same queue. Closing a queue lets consumers
//! drain what is left and then ends their streams.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::delivery::Delivery;
use super::publisher::Publisher;
use super::{BrokerError, DeliveryStream};

/// A single named queue.
#[derive(Debug)]
pub(crate) struct Queue {
    pub(crate) name: String,
    tx: parking_lot::Mutex<Option<mpsc::Sender<Delivery>>>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Delivery>>>,
    next_delivery_id: AtomicU64,
}

impl Queue {
    fn new(name: &str, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            name: name.to_string(),
            tx: parking_lot::Mutex::new(Some(tx)),
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            next_delivery_id: AtomicU64::new(1),
        }
    }

    /// Sender for a single publish, or `None` once the queue is closed.
    pub(crate) fn sender(&self) -> Option<mpsc::Sender<Delivery>> {
        self.tx.lock().clone()
    }

    pub(crate) fn next_delivery_id(&self) -> String {
        let seq = self.next_delivery_id.fetch_add(1, Ordering::Relaxed);
        format!("{}-{seq}", self.name)
    }

    fn close(&self) {
        self.tx.lock().take();
    }
}

// ---------------------------------------------------------------------------
// MemoryBroker
// ---------------------------------------------------------------------------

/// Registry of named in-memory queues.
#[derive(Debug)]
pub struct MemoryBroker {
    queues: DashMap<String, Arc<Queue>>,
    capacity: usize,
}

impl MemoryBroker {
    /// Creates a broker whose queues buffer up to `capacity` messages each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: DashMap::new(),
            capacity,
        }
    }

    /// Declares a queue. Declaring an existing queue is a no-op.
    pub fn declare_queue(&self, name: &str) {
        self.queue_or_declare(name);
    }

    fn queue_or_declare(&self, name: &str) -> Arc<Queue> {
        self.queues
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(queue = name, capacity = self.capacity, "queue declared");
                Arc::new(Queue::new(name, self.capacity))
            })
            .clone()
    }

    fn queue(&self, name: &str) -> Result<Arc<Queue>, BrokerError> {
        self.queues
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BrokerError::QueueNotFound {
                name: name.to_string(),
            })
    }

    /// Publisher for `name`, declaring the queue if needed.
    #[must_use]
    pub fn publisher(&self, name: &str, publish_timeout: Duration) -> Publisher {
        Publisher::new(self.queue_or_declare(name), publish_timeout)
    }

    /// Consumer for a declared queue.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::QueueNotFound` if the queue was never declared.
    pub fn consumer(&self, name: &str) -> Result<MemoryConsumer, BrokerError> {
        let queue = self.queue(name)?;
        Ok(MemoryConsumer {
            queue: queue.name.clone(),
            rx: Arc::clone(&queue.rx),
        })
    }

    /// Stops accepting publishes on `name`. Consumers receive what is
    /// already queued and then see the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::QueueNotFound` if the queue was never declared.
    pub fn close_queue(&self, name: &str) -> Result<(), BrokerError> {
        self.queue(name)?.close();
        info!(queue = name, "queue closed");
        Ok(())
    }

    /// Closes every queue.
    pub fn close(&self) {
        for entry in &self.queues {
            entry.value().close();
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryConsumer
// ---------------------------------------------------------------------------

/// Delivery stream over one in-memory queue.
#[derive(Debug, Clone)]
pub struct MemoryConsumer {
    queue: String,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Delivery>>>,
}

impl MemoryConsumer {
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue
    }
}

#[async_trait]
impl DeliveryStream for MemoryConsumer {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>> {
        let delivery = self.rx.lock().await.recv().await;
        if delivery.is_none() {
            debug!(queue = %self.queue, "queue drained and closed");
        }
        delivery.map(Ok)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
