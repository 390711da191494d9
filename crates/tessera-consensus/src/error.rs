use std::time::Duration;

use tessera_core::{CoreError, Hash};
use tessera_storage::StorageError;
use thiserror::Error;

/// Failure talking to one peer. Never fatal to a round as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Peer unreachable: {0}")]
    Unreachable(String),

    #[error("Peer rejected request with status {0}")]
    Rejected(u16),

    #[error("Invalid response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("Block height mismatch: expected {expected}, got {got}")]
    HeightMismatch { expected: u64, got: u64 },

    #[error("Previous hash mismatch")]
    PrevHashMismatch,

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Transaction {0} lacks its signature quorum")]
    InvalidTransaction(Hash),

    #[error("Invalid vote: {0}")]
    InvalidVote(String),

    #[error("Insufficient votes: have {have}, need {need}")]
    InsufficientVotes { have: usize, need: usize },

    #[error("Validator not found: {0}")]
    ValidatorNotFound(String),

    #[error("Peer {peer} unreachable after {attempts} attempts: {reason}")]
    PeerUnreachable {
        peer: String,
        attempts: u32,
        reason: TransportError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}
