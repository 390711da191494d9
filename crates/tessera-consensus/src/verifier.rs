use std::sync::Arc;

use tessera_core::{sign, Block, Hash, KeyPair, PublicKey};
use tessera_storage::BlockStore;
use tracing::{debug, info};

use crate::error::ConsensusError;
use crate::net::VerifyResponse;

/// Responder side of `Verify`: judges a candidate block against the local
/// chain and signs it when acceptable.
pub struct BlockVerifier {
    keypair: KeyPair,
    store: Arc<BlockStore>,
}

impl BlockVerifier {
    pub fn new(keypair: KeyPair, store: Arc<BlockStore>) -> Self {
        BlockVerifier { keypair, store }
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public
    }

    /// Check that `block` extends the local top and that every
    /// transaction carries its signature quorum.
    pub async fn check(&self, block: &Block) -> Result<(), ConsensusError> {
        let (expected_height, expected_prev) = match self.store.get_top_block().await {
            Some(top) => (top.height() + 1, top.hash()),
            None => (1, Hash::ZERO),
        };

        if block.height() != expected_height {
            return Err(ConsensusError::HeightMismatch {
                expected: expected_height,
                got: block.height(),
            });
        }
        if block.prev_hash() != expected_prev {
            return Err(ConsensusError::PrevHashMismatch);
        }
        if !block.verify_integrity()? {
            return Err(ConsensusError::InvalidBlock(
                "hash does not match payload".to_string(),
            ));
        }
        for tx in block.transactions() {
            if !tx.is_fully_signed()? {
                return Err(ConsensusError::InvalidTransaction(tx.fingerprint()?));
            }
        }
        Ok(())
    }

    pub async fn verify(&self, block: &Block) -> VerifyResponse {
        let block_hash = block.hash();
        match self.check(block).await {
            Ok(()) => {
                debug!(
                    "Validator {} signed block {}",
                    self.keypair.public, block_hash
                );
                let signature = sign(&self.keypair.secret, block_hash.as_bytes());
                VerifyResponse::accept(self.keypair.public, block_hash, signature)
            }
            Err(e) => {
                info!(
                    "Rejecting block {} at height {}: {}",
                    block_hash,
                    block.height(),
                    e
                );
                VerifyResponse::reject(self.keypair.public, block_hash, e.to_string())
            }
        }
    }
}
