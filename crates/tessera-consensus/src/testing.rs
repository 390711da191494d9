//! In-process transport used by this crate's tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tessera_core::{sign, Block, KeyPair, Peer, PublicKey};
use tessera_mst::MstState;
use tessera_ordering::{Batch, Proposal};

use crate::error::TransportError;
use crate::net::VerifyResponse;
use crate::transport::ConsensusTransport;

#[derive(Clone)]
pub(crate) enum PeerBehavior {
    /// Answer verify requests by signing with this key
    Accept(KeyPair),
    Reject,
    Unreachable,
    Hang,
    /// Fail this many probes, then answer normally
    FlakyProbe(u32),
}

#[derive(Default)]
pub(crate) struct FakeTransport {
    behaviors: Mutex<HashMap<PublicKey, PeerBehavior>>,
    delivered: Mutex<Vec<(&'static str, PublicKey)>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, key: PublicKey, behavior: PeerBehavior) {
        self.behaviors.lock().unwrap().insert(key, behavior);
    }

    pub(crate) fn delivered(&self, kind: &str) -> Vec<PublicKey> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, key)| *key)
            .collect()
    }

    fn behavior(&self, key: &PublicKey) -> Option<PeerBehavior> {
        self.behaviors.lock().unwrap().get(key).cloned()
    }

    async fn deliver(&self, kind: &'static str, peer: &Peer) -> Result<(), TransportError> {
        match self.behavior(&peer.public_key) {
            Some(PeerBehavior::Unreachable) => {
                Err(TransportError::Unreachable("connection refused".to_string()))
            }
            Some(PeerBehavior::Hang) => std::future::pending().await,
            _ => {
                self.delivered.lock().unwrap().push((kind, peer.public_key));
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ConsensusTransport for FakeTransport {
    async fn verify(&self, peer: &Peer, block: &Block) -> Result<VerifyResponse, TransportError> {
        match self.behavior(&peer.public_key) {
            Some(PeerBehavior::Accept(keypair)) => Ok(VerifyResponse::accept(
                keypair.public,
                block.hash(),
                sign(&keypair.secret, block.hash().as_bytes()),
            )),
            Some(PeerBehavior::Hang) => std::future::pending().await,
            Some(PeerBehavior::Unreachable) | None => {
                Err(TransportError::Unreachable("connection refused".to_string()))
            }
            Some(_) => Ok(VerifyResponse::reject(
                peer.public_key,
                block.hash(),
                "rejected",
            )),
        }
    }

    async fn send_commit(&self, peer: &Peer, _block: &Block) -> Result<(), TransportError> {
        self.deliver("commit", peer).await
    }

    async fn send_mst_state(&self, peer: &Peer, _state: &MstState) -> Result<(), TransportError> {
        self.deliver("mst", peer).await
    }

    async fn send_batch(&self, peer: &Peer, _batch: &Batch) -> Result<(), TransportError> {
        self.deliver("batch", peer).await
    }

    async fn send_proposal(&self, peer: &Peer, _proposal: &Proposal) -> Result<(), TransportError> {
        self.deliver("proposal", peer).await
    }

    async fn probe(&self, peer: &Peer) -> Result<(), TransportError> {
        let mut behaviors = self.behaviors.lock().unwrap();
        match behaviors.get_mut(&peer.public_key) {
            Some(PeerBehavior::FlakyProbe(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Err(TransportError::Unreachable("not ready".to_string()))
            }
            Some(PeerBehavior::Unreachable) => {
                Err(TransportError::Unreachable("connection refused".to_string()))
            }
            _ => Ok(()),
        }
    }
}
