use tessera_core::{CoreError, Hash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderingError {
    #[error("Transaction {0} does not carry its quorum of signatures")]
    NotFullySigned(Hash),

    #[error("Transaction {0} is already queued")]
    AlreadyQueued(Hash),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}
