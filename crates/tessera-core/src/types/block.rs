use serde::{Deserialize, Serialize};

use crate::crypto::{hash_blake3, merkle_root, sign, Hash, KeyPair};
use crate::error::CoreError;
use crate::serialize;
use crate::types::transaction::{SignatureEntry, Transaction};

/// Signed-over portion of a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPayload {
    /// Height in the chain, starting at 1
    pub height: u64,
    /// Hash of the block at `height - 1` (zero for the first block)
    pub prev_hash: Hash,
    /// Milliseconds since the Unix epoch
    pub created_time: u64,
    /// Merkle root over transaction fingerprints
    pub tx_root: Hash,
    pub transactions: Vec<Transaction>,
}

/// A block. The cached `hash` is checked by [`Block::verify_integrity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    payload: BlockPayload,
    hash: Hash,
    signatures: Vec<SignatureEntry>,
}

impl Block {
    pub fn new(
        height: u64,
        prev_hash: Hash,
        created_time: u64,
        transactions: Vec<Transaction>,
    ) -> Result<Self, CoreError> {
        let tx_root = Self::compute_tx_root(&transactions)?;
        let payload = BlockPayload {
            height,
            prev_hash,
            created_time,
            tx_root,
            transactions,
        };
        let hash = Self::payload_hash(&payload)?;
        Ok(Block {
            payload,
            hash,
            signatures: Vec::new(),
        })
    }

    fn payload_hash(payload: &BlockPayload) -> Result<Hash, CoreError> {
        Ok(hash_blake3(&serialize::to_bytes(payload)?))
    }

    fn compute_tx_root(transactions: &[Transaction]) -> Result<Hash, CoreError> {
        let leaves = transactions
            .iter()
            .map(Transaction::fingerprint)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(merkle_root(&leaves))
    }

    pub fn height(&self) -> u64 {
        self.payload.height
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn prev_hash(&self) -> Hash {
        self.payload.prev_hash
    }

    pub fn created_time(&self) -> u64 {
        self.payload.created_time
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.payload.transactions
    }

    pub fn payload(&self) -> &BlockPayload {
        &self.payload
    }

    pub fn signatures(&self) -> &[SignatureEntry] {
        &self.signatures
    }

    /// Sign the block hash with `keypair`; a repeated signer is ignored.
    pub fn sign(mut self, keypair: &KeyPair) -> Self {
        if !self
            .signatures
            .iter()
            .any(|entry| entry.public_key == keypair.public)
        {
            self.signatures.push(SignatureEntry {
                public_key: keypair.public,
                signature: sign(&keypair.secret, self.hash.as_bytes()),
            });
        }
        self
    }

    pub fn add_signature(&mut self, entry: SignatureEntry) {
        if !self
            .signatures
            .iter()
            .any(|existing| existing.public_key == entry.public_key)
        {
            self.signatures.push(entry);
        }
    }

    /// True when both the cached hash and the tx root match the payload.
    pub fn verify_integrity(&self) -> Result<bool, CoreError> {
        Ok(Self::payload_hash(&self.payload)? == self.hash
            && Self::compute_tx_root(&self.payload.transactions)? == self.payload.tx_root)
    }
}
