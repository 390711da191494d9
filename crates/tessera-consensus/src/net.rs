use serde::{Deserialize, Serialize};
use tessera_core::{Block, Hash, PublicKey, Sig, SignatureEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub block: Block,
}

/// A peer's verdict on a candidate block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub responder: PublicKey,
    pub block_hash: Hash,
    pub accepted: bool,
    pub reason: Option<String>,
    /// Signature over the block hash, present when accepted
    pub signature: Option<Sig>,
}

impl VerifyResponse {
    pub fn accept(responder: PublicKey, block_hash: Hash, signature: Sig) -> Self {
        VerifyResponse {
            responder,
            block_hash,
            accepted: true,
            reason: None,
            signature: Some(signature),
        }
    }

    pub fn reject(responder: PublicKey, block_hash: Hash, reason: impl Into<String>) -> Self {
        VerifyResponse {
            responder,
            block_hash,
            accepted: false,
            reason: Some(reason.into()),
            signature: None,
        }
    }

    /// The responder's vote, if it accepted
    pub fn vote(&self) -> Option<SignatureEntry> {
        match (self.accepted, self.signature) {
            (true, Some(signature)) => Some(SignatureEntry {
                public_key: self.responder,
                signature,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub block: Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub status: String,
    pub height: u64,
    pub hash: String,
}
