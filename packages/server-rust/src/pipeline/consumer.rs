//! Consumption loop: turns broker deliveries into pool units of work.

use std::sync::Arc;

use itemq_core::messages::{decode_command, CONTENT_TYPE};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::processor::MessageProcessor;
use super::{extract_trace_context, PipelineError};
use crate::broker::{Delivery, DeliveryStream};
use crate::service::{PoolError, WorkerPool};
use crate::shutdown::ShutdownController;

/// Counter of deliveries dropped because their body failed to decode.
pub const DECODE_ERRORS_TOTAL: &str = "itemq_decode_errors_total";

/// Decodes deliveries and hands them to the worker pool.
///
/// The pipeline is the only producer into its pool. Submission suspends
/// while every worker is busy, which in turn stops pulling deliveries.
#[derive(Debug, Clone)]
pub struct Pipeline {
    processor: Arc<MessageProcessor>,
    pool: Arc<WorkerPool>,
    shutdown: Arc<ShutdownController>,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        processor: MessageProcessor,
        pool: Arc<WorkerPool>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            processor: Arc::new(processor),
            pool,
            shutdown,
        }
    }

    /// Decodes one delivery and submits its unit of work.
    ///
    /// Returns once the unit has been handed to a worker, not when it has
    /// finished; the unit's own outcome is logged by the worker side.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Decode` for a malformed body (the message is
    /// dropped) and `PipelineError::Pool` if the pool is closed.
    pub async fn handle_delivery(&self, delivery: Delivery) -> Result<(), PipelineError> {
        let Delivery {
            delivery_id,
            headers,
            content_type,
            body,
        } = delivery;
        let trace = extract_trace_context(&headers);

        if let Some(declared) = content_type.as_deref().filter(|ct| *ct != CONTENT_TYPE) {
            warn!(
                trace_id = %trace,
                delivery_id = %delivery_id,
                content_type = declared,
                expected = CONTENT_TYPE,
                "unexpected content type, decoding anyway"
            );
        }

        let command = decode_command(&body).map_err(|e| {
            metrics::counter!(DECODE_ERRORS_TOTAL).increment(1);
            warn!(
                trace_id = %trace,
                delivery_id = %delivery_id,
                error = %e,
                "dropping undecodable message"
            );
            e
        })?;

        let guard = self.shutdown.in_flight_guard();
        let processor = Arc::clone(&self.processor);
        self.pool
            .submit(async move {
                let _guard = guard;
                processor.process(command, trace, &delivery_id).await?;
                Ok::<(), anyhow::Error>(())
            })
            .await?;
        Ok(())
    }

    /// Consumes `stream` until it ends, shutdown is requested, or the
    /// broker faults.
    ///
    /// Decode failures are logged and skipped. A closed pool ends
    /// consumption normally.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Broker` when the stream yields a fault.
    pub async fn run<S>(&self, stream: &mut S) -> Result<(), PipelineError>
    where
        S: DeliveryStream + ?Sized,
    {
        let mut stop = self.shutdown.subscribe();
        info!(workers = self.pool.size(), "consuming deliveries");

        loop {
            let next = tokio::select! {
                biased;
                () = stop_requested(&mut stop) => {
                    info!("shutdown requested, consumption stopped");
                    break;
                }
                next = stream.next_delivery() => next,
            };

            let delivery = match next {
                None => {
                    info!("delivery stream ended");
                    break;
                }
                Some(Err(e)) => {
                    error!(error = %e, "broker fault, consumption stopped");
                    return Err(e.into());
                }
                Some(Ok(delivery)) => delivery,
            };

            match self.handle_delivery(delivery).await {
                Ok(()) => {}
                Err(PipelineError::Pool(PoolError::Closed)) => {
                    info!("worker pool closed, consumption stopped");
                    break;
                }
                Err(e) => debug!(error = %e, "delivery skipped"),
            }
        }
        Ok(())
    }
}

/// Resolves once the stop flag is set, or once its sender is gone.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopping| *stopping).await;
}
