//! Command-line interface definitions and parsing

use std::time::Duration;

use clap::Parser;
use itemq_core::CommandType;

use crate::service::config::{ServerConfig, DEFAULT_WORKER_COUNT};

#[derive(Debug, Parser)]
#[command(author, version, about = "Consume item commands from a queue and apply them to an ordered store", long_about = None)]
pub struct Cli {
    /// Queue commands are published to and consumed from
    #[arg(long, env = "ITEMQ_QUEUE", default_value = "items")]
    pub queue: String,

    /// Number of pool workers
    #[arg(long, env = "ITEMQ_WORKERS", default_value_t = DEFAULT_WORKER_COUNT)]
    pub workers: usize,

    /// Buffered messages per queue
    #[arg(long, env = "ITEMQ_QUEUE_CAPACITY", default_value_t = 1024)]
    pub queue_capacity: usize,

    /// Maximum wait when handing a message to the queue
    #[arg(long, env = "ITEMQ_PUBLISH_TIMEOUT_MS", default_value_t = 5000)]
    pub publish_timeout_ms: u64,

    /// Maximum wait for in-flight commands on shutdown
    #[arg(long, env = "ITEMQ_DRAIN_TIMEOUT_MS", default_value_t = 10_000)]
    pub drain_timeout_ms: u64,

    /// Start a random producer for this command type (repeatable)
    #[arg(long = "producer", env = "ITEMQ_PRODUCERS", value_delimiter = ',')]
    pub producers: Vec<CommandType>,

    /// Upper bound of the random pause between produced commands
    #[arg(long, env = "ITEMQ_MAX_SEND_DELAY_MS", default_value_t = 10_000)]
    pub max_send_delay_ms: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "ITEMQ_LOG_JSON")]
    pub log_json: bool,
}

impl Cli {
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            queue_name: self.queue.clone(),
            worker_count: self.workers,
            queue_capacity: self.queue_capacity,
            publish_timeout: Duration::from_millis(self.publish_timeout_ms),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
            max_send_delay: Duration::from_millis(self.max_send_delay_ms),
        }
    }
}
