use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessera_core::{Hash, PublicKey, Transaction};

/// Immutable, ordered group of fully signed transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Per-gateway sequence, strictly increasing from 1
    pub sequence: u64,
    pub transactions: Vec<Transaction>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// A batch offered by the proposer of `round`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub round: u64,
    pub proposer: PublicKey,
    pub batch: Batch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedTransaction {
    pub fingerprint: Hash,
    pub reason: String,
}

/// Everything one flush produced
#[derive(Debug, Clone, Default)]
pub struct FlushReport {
    pub batch: Option<Arc<Batch>>,
    pub proposal: Option<Arc<Proposal>>,
    pub dropped: Vec<DroppedTransaction>,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.batch.is_none() && self.dropped.is_empty()
    }
}
