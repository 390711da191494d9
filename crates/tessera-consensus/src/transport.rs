use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tessera_core::{Block, Peer};
use tessera_mst::MstState;
use tessera_ordering::{Batch, Proposal};

use crate::error::TransportError;
use crate::net::{CommitRequest, VerifyRequest, VerifyResponse};

/// Messages this node sends to other peers.
///
/// Implementations report failures per call; callers bound each call with
/// their own timeout.
#[async_trait]
pub trait ConsensusTransport: Send + Sync {
    async fn verify(&self, peer: &Peer, block: &Block) -> Result<VerifyResponse, TransportError>;

    async fn send_commit(&self, peer: &Peer, block: &Block) -> Result<(), TransportError>;

    async fn send_mst_state(&self, peer: &Peer, state: &MstState) -> Result<(), TransportError>;

    async fn send_batch(&self, peer: &Peer, batch: &Batch) -> Result<(), TransportError>;

    async fn send_proposal(&self, peer: &Peer, proposal: &Proposal) -> Result<(), TransportError>;

    /// Liveness check used before a peer is registered
    async fn probe(&self, peer: &Peer) -> Result<(), TransportError>;
}

/// JSON over HTTP, one POST per message
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        HttpTransport { client }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        peer: &Peer,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, TransportError> {
        let response = self
            .client
            .post(peer.url(path))
            .json(body)
            .send()
            .await
            .map_err(map_reqwest)?;

        if !response.status().is_success() {
            return Err(TransportError::Rejected(response.status().as_u16()));
        }
        Ok(response)
    }

    async fn post_for<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        peer: &Peer,
        path: &str,
        body: &B,
    ) -> Result<R, TransportError> {
        self.post(peer, path, body)
            .await?
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

fn map_reqwest(error: reqwest::Error) -> TransportError {
    match error.status() {
        Some(status) => TransportError::Rejected(status.as_u16()),
        None => TransportError::Unreachable(error.to_string()),
    }
}

#[async_trait]
impl ConsensusTransport for HttpTransport {
    async fn verify(&self, peer: &Peer, block: &Block) -> Result<VerifyResponse, TransportError> {
        let request = VerifyRequest {
            block: block.clone(),
        };
        self.post_for(peer, "/consensus/verify", &request).await
    }

    async fn send_commit(&self, peer: &Peer, block: &Block) -> Result<(), TransportError> {
        let request = CommitRequest {
            block: block.clone(),
        };
        self.post(peer, "/consensus/commit", &request).await?;
        Ok(())
    }

    async fn send_mst_state(&self, peer: &Peer, state: &MstState) -> Result<(), TransportError> {
        self.post(peer, "/mst/state", state).await?;
        Ok(())
    }

    async fn send_batch(&self, peer: &Peer, batch: &Batch) -> Result<(), TransportError> {
        self.post(peer, "/ordering/batch", batch).await?;
        Ok(())
    }

    async fn send_proposal(&self, peer: &Peer, proposal: &Proposal) -> Result<(), TransportError> {
        self.post(peer, "/ordering/proposal", proposal).await?;
        Ok(())
    }

    async fn probe(&self, peer: &Peer) -> Result<(), TransportError> {
        let response = self
            .client
            .get(peer.url("/health"))
            .send()
            .await
            .map_err(map_reqwest)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Rejected(response.status().as_u16()))
        }
    }
}

