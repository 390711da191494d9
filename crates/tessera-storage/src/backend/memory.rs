use tessera_core::Block;

use super::BlockBackend;
use crate::error::StorageError;

/// No durability: blocks live only in the store's indexes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBackend;

impl BlockBackend for MemoryBackend {
    fn load(&self) -> Result<Vec<Block>, StorageError> {
        Ok(Vec::new())
    }

    fn append(&mut self, _block: &Block) -> Result<(), StorageError> {
        Ok(())
    }
}
