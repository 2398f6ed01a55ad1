//! `itemq` core: item model, command envelopes, and trace context.

pub mod context;
pub mod messages;
pub mod types;

pub use context::{TraceContext, TRACE_ID_HEADER};
pub use messages::{Command, CommandType, DecodeError, EncodeError};
pub use types::{Item, ItemId};
