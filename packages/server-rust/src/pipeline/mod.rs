//! Per-delivery processing: decode, trace extraction, pool submission and
//! dispatch, plus the consumption loop that drives it.

pub mod consumer;
pub mod processor;

use itemq_core::{DecodeError, TraceContext, TRACE_ID_HEADER};
use tracing::warn;

use crate::broker::{BrokerError, HeaderValue, Headers};
use crate::service::{DispatchError, PoolError};

pub use consumer::{Pipeline, DECODE_ERRORS_TOTAL};
pub use processor::MessageProcessor;

/// Errors surfaced by the processing pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
    /// A panic raised while dispatching, caught at the unit boundary.
    #[error("command processing panicked (trace_id={trace_id:?}): {message}")]
    Panicked { trace_id: String, message: String },
}

/// Reads the trace id from the `X-Trace-ID` header.
///
/// A missing header or a non-string value yields an empty trace id and a
/// warning; processing continues either way.
#[must_use]
pub fn extract_trace_context(headers: &Headers) -> TraceContext {
    match headers.get(TRACE_ID_HEADER) {
        Some(HeaderValue::String(trace_id)) => TraceContext::new(trace_id.as_str()),
        Some(other) => {
            warn!(header = TRACE_ID_HEADER, value = ?other, "trace id header is not a string");
            TraceContext::empty()
        }
        None => {
            warn!(header = TRACE_ID_HEADER, "message has no trace id header");
            TraceContext::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_header_becomes_trace_id() {
        let mut headers = Headers::new();
        headers.insert(TRACE_ID_HEADER.to_string(), "abc".into());
        assert_eq!(extract_trace_context(&headers), TraceContext::new("abc"));
    }

    #[test]
    fn missing_header_yields_empty_trace_id() {
        assert!(extract_trace_context(&Headers::new()).is_empty());
    }

    #[test]
    fn non_string_header_yields_empty_trace_id() {
        let mut headers = Headers::new();
        headers.insert(TRACE_ID_HEADER.to_string(), 42_i64.into());
        assert!(extract_trace_context(&headers).is_empty());

        headers.insert(TRACE_ID_HEADER.to_string(), HeaderValue::Bool(true));
        assert!(extract_trace_context(&headers).is_empty());
    }
}
