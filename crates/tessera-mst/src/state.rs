use serde::{Deserialize, Serialize};
use tessera_core::{Hash, PublicKey, Transaction, TransactionPayload};

use crate::error::MstError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Complete,
    Expired,
}

/// One pending transaction as seen by a peer. The fingerprint must be the
/// digest of the carried payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MstStateEntry {
    pub fingerprint: Hash,
    pub transaction: Transaction,
}

/// Partial-signature view exchanged between peers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MstState {
    pub entries: Vec<MstStateEntry>,
}

impl MstState {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Published whenever the visible signer set of an entry changes,
/// and once more when the entry expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MstStateUpdate {
    pub fingerprint: Hash,
    /// Payload with the signatures collected so far
    pub transaction: Transaction,
    pub status: EntryStatus,
}

impl MstStateUpdate {
    pub fn signers(&self) -> Vec<PublicKey> {
        self.transaction
            .signatures
            .iter()
            .map(|entry| entry.public_key)
            .collect()
    }

    pub fn to_state(&self) -> MstState {
        MstState {
            entries: vec![MstStateEntry {
                fingerprint: self.fingerprint,
                transaction: self.transaction.clone(),
            }],
        }
    }
}

/// Read-only snapshot of a pending entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingView {
    pub fingerprint: Hash,
    pub payload: TransactionPayload,
    pub signers: Vec<PublicKey>,
    pub quorum: u32,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
}

/// Result of merging one or more signatures into a single entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The signer set grew but the quorum is not reached yet
    Pending { signatures: usize, quorum: u32 },
    /// Every offered signer was already known
    Unchanged,
    /// The quorum was reached by this merge
    Completed(Transaction),
    /// The fingerprint completed earlier; the signatures were discarded
    AlreadyCompleted,
}

#[derive(Debug)]
pub struct RejectedSignature {
    pub fingerprint: Hash,
    pub signer: PublicKey,
    pub error: MstError,
}

/// Aggregate result of `submit` or `merge_remote_state`
#[derive(Debug, Default)]
pub struct MergeReport {
    pub outcomes: Vec<(Hash, MergeOutcome)>,
    pub rejected: Vec<RejectedSignature>,
    /// Fingerprints whose remote view was malformed and skipped entirely
    pub ignored: Vec<Hash>,
}

impl MergeReport {
    pub fn completed(&self) -> impl Iterator<Item = &Transaction> {
        self.outcomes.iter().filter_map(|(_, outcome)| match outcome {
            MergeOutcome::Completed(tx) => Some(tx),
            _ => None,
        })
    }

    pub fn changed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| {
                matches!(
                    outcome,
                    MergeOutcome::Pending { .. } | MergeOutcome::Completed(_)
                )
            })
            .count()
    }
}
