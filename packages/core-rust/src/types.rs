use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller-supplied identifier of an item. Unique as a store key.
pub type ItemId = i64;

/// A single entry of the shared item collection.
///
/// The identifier is chosen by the command producer, not generated by the
/// store. Storing a second item under the same id replaces its payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    /// Store key.
    pub id: ItemId,
    /// Opaque UTF-8 payload.
    pub payload: String,
}

impl Item {
    /// Creates an item from its id and payload.
    #[must_use]
    pub fn new(id: ItemId, payload: impl Into<String>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{id: {}, payload: {:?}}}", self.id, self.payload)
    }
}
