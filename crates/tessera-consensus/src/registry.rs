use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tessera_core::diagnostics::tracing_sink;
use tessera_core::{Diagnostic, DiagnosticSink, Peer, PublicKey};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ConsensusError, TransportError};
use crate::transport::ConsensusTransport;

const COMPONENT: &str = "peer_registry";

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub attempts: u32,
    /// Pause between failed probes
    pub backoff: Duration,
    /// Bound on a single probe
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            attempts: 5,
            backoff: Duration::from_secs(1),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Peers that answered a liveness probe, keyed by public key
pub struct PeerRegistry<T> {
    transport: Arc<T>,
    config: ProbeConfig,
    peers: RwLock<BTreeMap<PublicKey, Peer>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl<T: ConsensusTransport> PeerRegistry<T> {
    pub fn new(transport: Arc<T>, config: ProbeConfig) -> Self {
        Self::with_sink(transport, config, tracing_sink())
    }

    pub fn with_sink(transport: Arc<T>, config: ProbeConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        PeerRegistry {
            transport,
            config,
            peers: RwLock::new(BTreeMap::new()),
            sink,
        }
    }

    /// Probe `peer` until it answers, then register it. Resolves with an
    /// error once every attempt has failed.
    pub async fn add_peer(&self, peer: Peer) -> Result<(), ConsensusError> {
        let attempts = self.config.attempts.max(1);
        let mut last_error = TransportError::Unreachable("not probed".to_string());

        for attempt in 1..=attempts {
            let probe = tokio::time::timeout(self.config.timeout, self.transport.probe(&peer)).await;
            match probe {
                Ok(Ok(())) => {
                    self.sink.report(
                        COMPONENT,
                        Diagnostic::PeerRegistered {
                            peer: peer.to_string(),
                        },
                    );
                    self.peers.write().await.insert(peer.public_key, peer);
                    return Ok(());
                }
                Ok(Err(e)) => last_error = e,
                Err(_) => last_error = TransportError::Timeout(self.config.timeout),
            }
            debug!(
                "Probe {}/{} of {} failed: {}",
                attempt, attempts, peer, last_error
            );
            if attempt < attempts {
                tokio::time::sleep(self.config.backoff).await;
            }
        }

        self.sink.report(
            COMPONENT,
            Diagnostic::PeerUnreachable {
                peer: peer.to_string(),
                reason: last_error.to_string(),
            },
        );
        Err(ConsensusError::PeerUnreachable {
            peer: peer.to_string(),
            attempts,
            reason: last_error,
        })
    }

    pub async fn remove_peer(&self, key: &PublicKey) -> Option<Peer> {
        self.peers.write().await.remove(key)
    }

    pub async fn get(&self, key: &PublicKey) -> Option<Peer> {
        self.peers.read().await.get(key).cloned()
    }

    pub async fn peers(&self) -> Vec<Peer> {
        self.peers.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, PeerBehavior};
    use tessera_core::{KeyPair, NoopSink};

    fn registry(transport: Arc<FakeTransport>) -> PeerRegistry<FakeTransport> {
        PeerRegistry::with_sink(
            transport,
            ProbeConfig {
                attempts: 3,
                backoff: Duration::from_millis(100),
                timeout: Duration::from_millis(100),
            },
            Arc::new(NoopSink),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_peer_retries_until_probe_succeeds() {
        let key = KeyPair::generate().public;
        let transport = Arc::new(FakeTransport::new());
        transport.set(key, PeerBehavior::FlakyProbe(2));
        let registry = registry(transport);

        registry.add_peer(Peer::new("b:1", key)).await.unwrap();
        assert_eq!(registry.get(&key).await.unwrap().address, "b:1");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_peer_gives_up() {
        let key = KeyPair::generate().public;
        let transport = Arc::new(FakeTransport::new());
        transport.set(key, PeerBehavior::Unreachable);
        let registry = registry(transport);

        let result = registry.add_peer(Peer::new("b:1", key)).await;
        assert!(matches!(
            result,
            Err(ConsensusError::PeerUnreachable { attempts: 3, .. })
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_peer() {
        let key = KeyPair::generate().public;
        let registry = registry(Arc::new(FakeTransport::new()));
        registry.add_peer(Peer::new("b:1", key)).await.unwrap();

        assert!(registry.remove_peer(&key).await.is_some());
        assert!(registry.peers().await.is_empty());
    }
}
