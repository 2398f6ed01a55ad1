//! Insertion-ordered [`StorageEngine`] backed by a hash map plus an order index.
//!
//! Every id is assigned a monotonically increasing sequence number the first
//! time it is inserted. The sequence number is kept across payload updates and
//! discarded on removal, so a re-added id lands at the end of the order.

use std::collections::BTreeMap;

use ahash::AHashMap;
use itemq_core::{Item, ItemId};
use parking_lot::RwLock;

use crate::storage::engine::StorageEngine;

#[derive(Debug)]
struct Slot {
    seq: u64,
    payload: String,
}

#[derive(Debug, Default)]
struct Inner {
    slots: AHashMap<ItemId, Slot>,
    /// Insertion sequence -> id. Iterating this map yields enumeration order.
    order: BTreeMap<u64, ItemId>,
    next_seq: u64,
}

/// Ordered item store guarded by a single reader/writer lock.
///
/// Readers (`get`, `get_all`, `len`) share the lock; writers (`add`,
/// `remove`) hold it exclusively. The lock is scoped to this
/// instance, never global.
#[derive(Debug, Default)]
pub struct OrderedStorage {
    inner: RwLock<Inner>,
}

impl OrderedStorage {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageEngine for OrderedStorage {
    fn add(&self, item: Item) -> Option<Item> {
        let mut inner = self.inner.write();
        if let Some(slot) = inner.slots.get_mut(&item.id) {
            let previous = std::mem::replace(&mut slot.payload, item.payload);
            return Some(Item::new(item.id, previous));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, item.id);
        inner.slots.insert(
            item.id,
            Slot {
                seq,
                payload: item.payload,
            },
        );
        None
    }

    fn remove(&self, id: ItemId) -> Option<Item> {
        let mut inner = self.inner.write();
        let slot = inner.slots.remove(&id)?;
        inner.order.remove(&slot.seq);
        Some(Item::new(id, slot.payload))
    }

    fn get(&self, id: ItemId) -> Option<Item> {
        let inner = self.inner.read();
        inner
            .slots
            .get(&id)
            .map(|slot| Item::new(id, slot.payload.clone()))
    }

    fn get_all(&self) -> Vec<Item> {
        let inner = self.inner.read();
        inner
            .order
            .values()
            .filter_map(|id| {
                inner
                    .slots
                    .get(id)
                    .map(|slot| Item::new(*id, slot.payload.clone()))
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.inner.read().slots.len()
    }
}
