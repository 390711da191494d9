use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Snapshot encoding error: {0}")]
    Serialization(String),

    #[error("Core error: {0}")]
    Core(#[from] tessera_core::CoreError),
}
