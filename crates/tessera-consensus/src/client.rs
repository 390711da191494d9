use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tessera_core::diagnostics::tracing_sink;
use tessera_core::{Block, Diagnostic, DiagnosticSink, Peer, PublicKey};
use tessera_mst::MstState;
use tessera_ordering::{Batch, Proposal};

use crate::error::TransportError;
use crate::net::VerifyResponse;
use crate::transport::ConsensusTransport;

const COMPONENT: &str = "round_client";

/// Per-peer delivery result of a gossip fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<PublicKey>,
    pub failed: Vec<(PublicKey, TransportError)>,
}

impl BroadcastReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Bounded-time access to peers over a [`ConsensusTransport`].
///
/// Every call is wrapped in a timeout and a failing peer never affects
/// delivery to the others.
pub struct RoundClient<T> {
    transport: Arc<T>,
    gossip_timeout: Duration,
    sink: Arc<dyn DiagnosticSink>,
}

impl<T: ConsensusTransport> RoundClient<T> {
    pub fn new(transport: Arc<T>, gossip_timeout: Duration) -> Self {
        Self::with_sink(transport, gossip_timeout, tracing_sink())
    }

    pub fn with_sink(
        transport: Arc<T>,
        gossip_timeout: Duration,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        RoundClient {
            transport,
            gossip_timeout,
            sink,
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Ask `peer` to verify `block`, giving up after `timeout`.
    pub async fn verify(
        &self,
        peer: &Peer,
        block: &Block,
        timeout: Duration,
    ) -> Result<VerifyResponse, TransportError> {
        match tokio::time::timeout(timeout, self.transport.verify(peer, block)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    /// Verify with every peer concurrently; results keep peer order.
    pub async fn verify_all(
        &self,
        peers: &[Peer],
        block: &Block,
        timeout: Duration,
    ) -> Vec<(PublicKey, Result<VerifyResponse, TransportError>)> {
        join_all(peers.iter().map(|peer| async move {
            let result = self.verify(peer, block, timeout).await;
            if let Err(e) = &result {
                self.report_failure(peer, "verify", e);
            }
            (peer.public_key, result)
        }))
        .await
    }

    pub async fn broadcast_mst_state(&self, peers: &[Peer], state: &MstState) -> BroadcastReport {
        self.fan_out(peers, "mst state", |peer| {
            self.transport.send_mst_state(peer, state)
        })
        .await
    }

    pub async fn broadcast_batch(&self, peers: &[Peer], batch: &Batch) -> BroadcastReport {
        self.fan_out(peers, "batch", |peer| self.transport.send_batch(peer, batch))
            .await
    }

    pub async fn broadcast_proposal(&self, peers: &[Peer], proposal: &Proposal) -> BroadcastReport {
        self.fan_out(peers, "proposal", |peer| {
            self.transport.send_proposal(peer, proposal)
        })
        .await
    }

    pub async fn broadcast_commit(&self, peers: &[Peer], block: &Block) -> BroadcastReport {
        self.fan_out(peers, "commit", |peer| self.transport.send_commit(peer, block))
            .await
    }

    async fn fan_out<'a, F, Fut>(
        &'a self,
        peers: &'a [Peer],
        what: &'static str,
        send: F,
    ) -> BroadcastReport
    where
        F: Fn(&'a Peer) -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        let timeout = self.gossip_timeout;
        let results = join_all(peers.iter().map(|peer| {
            let delivery = send(peer);
            async move {
                let result = match tokio::time::timeout(timeout, delivery).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(timeout)),
                };
                (peer, result)
            }
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (peer, result) in results {
            match result {
                Ok(()) => report.delivered.push(peer.public_key),
                Err(e) => {
                    self.report_failure(peer, what, &e);
                    report.failed.push((peer.public_key, e));
                }
            }
        }
        report
    }

    fn report_failure(&self, peer: &Peer, what: &str, error: &TransportError) {
        self.sink.report(
            COMPONENT,
            Diagnostic::PeerUnreachable {
                peer: peer.to_string(),
                reason: format!("{what}: {error}"),
            },
        );
    }
}
