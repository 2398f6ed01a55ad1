use std::fmt;

/// Message header carrying the correlation identifier of a command.
pub const TRACE_ID_HEADER: &str = "X-Trace-ID";

/// Correlation context threaded explicitly through decode, dispatch and store calls.
///
/// Lives for the duration of one command's processing and is never stored
/// in process-wide state. An empty `trace_id` means the producer did not
/// attach one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TraceContext {
    /// Opaque identifier correlating all log lines of one command.
    pub trace_id: String,
}

impl TraceContext {
    /// Creates a context for the given trace identifier.
    #[must_use]
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
        }
    }

    /// Context used when the inbound message carried no usable trace id.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trace_id.is_empty()
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.trace_id)
    }
}
