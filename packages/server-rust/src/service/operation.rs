//! Request, response and error types of the command dispatcher.

use itemq_core::{Command, Item, ItemId, TraceContext};

/// A decoded command together with the trace context it is processed under.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub command: Command,
    pub trace: TraceContext,
}

impl DispatchRequest {
    #[must_use]
    pub fn new(command: Command, trace: TraceContext) -> Self {
        Self { command, trace }
    }
}

/// Observed result of applying one command to the store.
///
/// Nothing is sent back to the command's originator; responses exist so the
/// pipeline can log them and tests can assert on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResponse {
    /// `AddItem` stored the item. `replaced` is true when the id was present.
    Added { id: ItemId, replaced: bool },
    /// `RemoveItem` ran. `existed` is false when the id was absent (no-op).
    Removed { id: ItemId, existed: bool },
    /// `GetItem` result; `None` means the id is not stored.
    Item { id: ItemId, item: Option<Item> },
    /// `GetAllItems` snapshot in insertion order.
    Items(Vec<Item>),
}

/// Errors returned by the command dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown command type: {raw_type}")]
    UnknownCommand { raw_type: i32 },
}
