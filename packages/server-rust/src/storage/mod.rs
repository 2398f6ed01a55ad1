//! In-memory item storage shared by all pool workers.
//!
//! - [`StorageEngine`]: the store contract (add, remove, get, ordered snapshot)
//! - [`engines::OrderedStorage`]: reader/writer-locked implementation that
//!   keeps insertion order

pub mod engine;
pub mod engines;

pub use engine::StorageEngine;
pub use engines::OrderedStorage;
