//! Tessera Storage - committed block storage
//!
//! This crate provides the block store: a height index and a hash index
//! kept consistent behind a single reader/writer lock, with an optional
//! durable snapshot backend.

pub mod backend;
pub mod error;
pub mod store;

pub use backend::{BlockBackend, FileBackend, MemoryBackend};
pub use error::StorageError;
pub use store::{BlockStore, StoreOutcome};
