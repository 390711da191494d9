pub mod file;
pub mod memory;

use tessera_core::Block;

use crate::error::StorageError;

/// Durable record behind the block store's in-memory indexes.
pub trait BlockBackend: Send + Sync {
    /// Blocks appended by a previous run, in the order they were stored
    fn load(&self) -> Result<Vec<Block>, StorageError>;

    /// Record one stored block. Called with the store's write lock held.
    fn append(&mut self, block: &Block) -> Result<(), StorageError>;
}

pub use file::FileBackend;
pub use memory::MemoryBackend;
