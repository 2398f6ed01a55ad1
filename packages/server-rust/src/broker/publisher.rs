//! Publish path: encodes commands and hands them to a queue within a timeout.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use itemq_core::messages::{encode_command, CONTENT_TYPE};
use itemq_core::{Command, TraceContext, TRACE_ID_HEADER};
use tokio::sync::mpsc;
use tracing::info;

use super::delivery::{Delivery, Headers};
use super::memory::Queue;
use super::BrokerError;

/// Publishes command envelopes to one queue.
///
/// Publishing waits at most `timeout` for queue capacity. This bound is the
/// only timeout of the whole command path.
#[derive(Debug, Clone)]
pub struct Publisher {
    queue: Arc<Queue>,
    timeout: Duration,
}

impl Publisher {
    pub(crate) fn new(queue: Arc<Queue>, timeout: Duration) -> Self {
        Self { queue, timeout }
    }

    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue.name
    }

    /// Encodes `command`, attaches the trace id header, and enqueues it.
    /// Returns the delivery id assigned to the message.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Encode` if the command cannot be encoded,
    /// `BrokerError::Timeout` if the queue stays full for the whole timeout,
    /// and `BrokerError::Disconnected` if the queue is closed.
    pub async fn publish(
        &self,
        command: &Command,
        trace: &TraceContext,
    ) -> Result<String, BrokerError> {
        let trace_id = trace.trace_id();
        info!(
            trace_id,
            command_type = %command.command_type(),
            command = %command,
            "sending command"
        );

        let body = encode_command(command)?;
        let mut headers = Headers::new();
        headers.insert(TRACE_ID_HEADER.to_string(), trace_id.into());

        let delivery_id = self.publish_raw(Bytes::from(body), headers).await?;
        info!(trace_id, delivery_id = %delivery_id, "sent message");
        Ok(delivery_id)
    }

    /// Enqueues an already-encoded body with the given headers.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Timeout` or `BrokerError::Disconnected` as for
    /// [`Publisher::publish`].
    pub async fn publish_raw(&self, body: Bytes, headers: Headers) -> Result<String, BrokerError> {
        let tx = self.queue.sender().ok_or_else(|| self.disconnected())?;

        let delivery_id = self.queue.next_delivery_id();
        let delivery = Delivery {
            delivery_id: delivery_id.clone(),
            headers,
            content_type: Some(CONTENT_TYPE.to_string()),
            body,
        };

        match tokio::time::timeout(self.timeout, tx.send(delivery)).await {
            Ok(Ok(())) => Ok(delivery_id),
            Ok(Err(mpsc::error::SendError(_))) => Err(self.disconnected()),
            Err(_) => Err(BrokerError::Timeout {
                queue: self.queue.name.clone(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    fn disconnected(&self) -> BrokerError {
        BrokerError::Disconnected {
            queue: self.queue.name.clone(),
        }
    }
}
