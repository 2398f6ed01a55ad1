//! Concrete [`StorageEngine`](super::StorageEngine) implementations.

pub mod ordered;

pub use ordered::OrderedStorage;
