//! Runs one decoded command through the dispatch stack.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use itemq_core::{Command, TraceContext};
use tower::ServiceExt;
use tracing::{error, info};

use super::PipelineError;
use crate::service::worker::panic_message;
use crate::service::{DispatchRequest, DispatchResponse, DispatchStack};

/// Body of every unit of work: dispatches one command and logs the outcome
/// under its trace id.
#[derive(Debug, Clone)]
pub struct MessageProcessor {
    stack: DispatchStack,
}

impl MessageProcessor {
    #[must_use]
    pub fn new(stack: DispatchStack) -> Self {
        Self { stack }
    }

    /// Dispatches `command` and logs the result.
    ///
    /// A panic anywhere below the stack is caught here and returned as
    /// `PipelineError::Panicked`, so the executing worker is unaffected.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Dispatch` for rejected commands and
    /// `PipelineError::Panicked` for contained panics.
    pub async fn process(
        &self,
        command: Command,
        trace: TraceContext,
        delivery_id: &str,
    ) -> Result<DispatchResponse, PipelineError> {
        let trace_id = trace.trace_id.clone();
        let request = DispatchRequest::new(command, trace);

        let result = match AssertUnwindSafe(self.stack.clone().oneshot(request))
            .catch_unwind()
            .await
        {
            Ok(dispatched) => dispatched.map_err(PipelineError::from),
            Err(payload) => Err(PipelineError::Panicked {
                trace_id: trace_id.clone(),
                message: panic_message(payload.as_ref()),
            }),
        };

        match &result {
            Ok(response) => info!(
                trace_id = %trace_id,
                delivery_id,
                response = ?response,
                "message processed"
            ),
            Err(e) => error!(
                trace_id = %trace_id,
                delivery_id,
                error = %e,
                "message processing failed"
            ),
        }
        result
    }
}
