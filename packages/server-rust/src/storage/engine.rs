//! Storage engine trait for the shared item collection.
//!
//! Defines [`StorageEngine`], the single store every worker reads and
//! mutates. Implementations must be safe to call from many workers at once
//! and must enumerate items in insertion order.

use itemq_core::{Item, ItemId};

/// Thread-safe keyed item storage with insertion-ordered enumeration.
///
/// All operations are synchronous and take `&self`; implementations guard
/// their state internally. Wrapped in `Arc<dyn StorageEngine>` for sharing
/// across workers.
///
/// Ordering contract:
/// - `get_all` returns items in the order their ids were first inserted.
/// - Re-adding a present id replaces the payload and keeps the position.
/// - A removed id that is added again is appended at the end.
pub trait StorageEngine: Send + Sync + 'static {
    /// Insert an item or replace the payload of an existing one.
    /// Returns the previous item stored under the same id, if any.
    fn add(&self, item: Item) -> Option<Item>;

    /// Remove an item by id, returning it. Absent ids are a no-op.
    fn remove(&self, id: ItemId) -> Option<Item>;

    /// Retrieve an item by id, or `None` if not present.
    fn get(&self, id: ItemId) -> Option<Item>;

    /// Point-in-time snapshot of all items in insertion order.
    fn get_all(&self) -> Vec<Item>;

    /// Return the number of items.
    fn len(&self) -> usize;

    /// Check if the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
