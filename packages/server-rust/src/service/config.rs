use std::time::Duration;

/// Number of pool workers started when nothing else is configured.
pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Server-level configuration for the command-processing pipeline.
///
/// Controls the consumed queue, pool size, and the timeouts of the publish
/// and shutdown paths. Built from CLI flags and environment by
/// [`Cli`](crate::cli::Cli), or directly in tests.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Name of the durable queue commands are consumed from.
    pub queue_name: String,
    /// Fixed number of pool workers.
    pub worker_count: usize,
    /// Capacity of each in-memory broker queue.
    pub queue_capacity: usize,
    /// Maximum time the publish path waits to hand a message to the broker.
    pub publish_timeout: Duration,
    /// Maximum time shutdown waits for in-flight units of work.
    pub drain_timeout: Duration,
    /// Upper bound (exclusive) of the random pause between produced commands.
    pub max_send_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            queue_name: "items".to_string(),
            worker_count: DEFAULT_WORKER_COUNT,
            queue_capacity: 1024,
            publish_timeout: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(10),
            max_send_delay: Duration::from_secs(10),
        }
    }
}
