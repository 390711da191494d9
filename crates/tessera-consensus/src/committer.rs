use std::sync::Arc;
use std::time::Duration;

use tessera_core::{now_millis, Block, Hash, KeyPair, PublicKey};
use tessera_ordering::Proposal;
use tessera_storage::{BlockStore, StoreOutcome};
use tracing::{debug, info, warn};

use crate::client::RoundClient;
use crate::error::ConsensusError;
use crate::registry::PeerRegistry;
use crate::transport::ConsensusTransport;
use crate::verifier::BlockVerifier;
use crate::votes::{collect_votes, VoteCollector};

/// Turns proposals into committed blocks and accepts commits from peers.
pub struct Committer<T> {
    validators: Vec<PublicKey>,
    store: Arc<BlockStore>,
    verifier: BlockVerifier,
    client: Arc<RoundClient<T>>,
    registry: Arc<PeerRegistry<T>>,
    verify_timeout: Duration,
}

impl<T: ConsensusTransport> Committer<T> {
    pub fn new(
        keypair: KeyPair,
        validators: Vec<PublicKey>,
        store: Arc<BlockStore>,
        client: Arc<RoundClient<T>>,
        registry: Arc<PeerRegistry<T>>,
        verify_timeout: Duration,
    ) -> Self {
        Committer {
            validators,
            verifier: BlockVerifier::new(keypair, Arc::clone(&store)),
            store,
            client,
            registry,
            verify_timeout,
        }
    }

    pub fn verifier(&self) -> &BlockVerifier {
        &self.verifier
    }

    pub fn validators(&self) -> &[PublicKey] {
        &self.validators
    }

    /// Build the next block from `proposal`, gather votes from registered
    /// peers, store it and announce the commit.
    pub async fn commit_proposal(&self, proposal: &Proposal) -> Result<Arc<Block>, ConsensusError> {
        let (height, prev_hash) = match self.store.get_top_block().await {
            Some(top) => (top.height() + 1, top.hash()),
            None => (1, Hash::ZERO),
        };
        let block = Block::new(
            height,
            prev_hash,
            now_millis(),
            proposal.batch.transactions.clone(),
        )?;

        let local = self.verifier.verify(&block).await;
        if !local.accepted {
            return Err(ConsensusError::InvalidBlock(
                local.reason.unwrap_or_default(),
            ));
        }

        let peers = self.registry.peers().await;
        let responses = self
            .client
            .verify_all(&peers, &block, self.verify_timeout)
            .await;
        let remote = responses
            .into_iter()
            .filter_map(|(peer, result)| match result {
                Ok(response) => Some(response),
                Err(e) => {
                    warn!("Verify request to {} failed: {}", peer, e);
                    None
                }
            });
        let votes = collect_votes(
            block.hash(),
            &self.validators,
            std::iter::once(local).chain(remote),
        )?;

        let mut block = block;
        for vote in &votes {
            block.add_signature(*vote);
        }
        self.store.store_block(block.clone()).await?;

        info!(
            "Committed block {} at height {} with {} votes",
            block.hash(),
            block.height(),
            votes.len()
        );

        let report = self.client.broadcast_commit(&peers, &block).await;
        if !report.all_delivered() {
            debug!("Commit reached {} of {} peers", report.delivered.len(), peers.len());
        }
        Ok(Arc::new(block))
    }

    /// Store a block committed elsewhere once its votes are checked.
    pub async fn accept_commit(&self, block: Block) -> Result<StoreOutcome, ConsensusError> {
        if !block.verify_integrity()? {
            return Err(ConsensusError::InvalidBlock(
                "hash does not match payload".to_string(),
            ));
        }

        let mut votes = VoteCollector::new(block.hash(), &self.validators);
        for entry in block.signatures() {
            if let Err(e) = votes.add_signature(*entry) {
                debug!("Ignoring commit signature: {}", e);
            }
        }
        if !votes.has_quorum() {
            return Err(ConsensusError::InsufficientVotes {
                have: votes.count(),
                need: votes.threshold(),
            });
        }

        Ok(self.store.store_block(block).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProbeConfig;
    use crate::testing::{FakeTransport, PeerBehavior};
    use tessera_core::{Command, NoopSink, Peer, Transaction, TransactionPayload};
    use tessera_ordering::Batch;

    fn signed_tx(n: u64) -> Transaction {
        Transaction::new(TransactionPayload {
            creator_account_id: "alice@wonderland".to_string(),
            created_time: n,
            quorum: 1,
            commands: vec![Command::SetAccountQuorum {
                account_id: "alice@wonderland".to_string(),
                quorum: 1,
            }],
        })
        .sign(&KeyPair::generate())
        .unwrap()
    }

    fn proposal(local: PublicKey, txs: Vec<Transaction>) -> Proposal {
        Proposal {
            round: 1,
            proposer: local,
            batch: Batch {
                sequence: 1,
                transactions: txs,
            },
        }
    }

    struct Network {
        local: KeyPair,
        peers: Vec<KeyPair>,
        transport: Arc<FakeTransport>,
        store: Arc<BlockStore>,
        committer: Committer<FakeTransport>,
    }

    async fn network(peer_behaviors: Vec<fn(&KeyPair) -> PeerBehavior>) -> Network {
        let local = KeyPair::generate();
        let peers: Vec<KeyPair> = peer_behaviors.iter().map(|_| KeyPair::generate()).collect();
        let transport = Arc::new(FakeTransport::new());
        let registry = Arc::new(PeerRegistry::with_sink(
            Arc::clone(&transport),
            ProbeConfig::default(),
            Arc::new(NoopSink),
        ));
        for (i, (keypair, behavior)) in peers.iter().zip(&peer_behaviors).enumerate() {
            registry
                .add_peer(Peer::new(format!("peer{i}:1"), keypair.public))
                .await
                .unwrap();
            transport.set(keypair.public, behavior(keypair));
        }

        let mut validators = vec![local.public];
        validators.extend(peers.iter().map(|k| k.public));
        let store = Arc::new(BlockStore::with_sink(Arc::new(NoopSink)));
        let client = Arc::new(RoundClient::with_sink(
            Arc::clone(&transport),
            Duration::from_millis(200),
            Arc::new(NoopSink),
        ));
        let committer = Committer::new(
            local.clone(),
            validators,
            Arc::clone(&store),
            client,
            registry,
            Duration::from_millis(200),
        );
        Network {
            local,
            peers,
            transport,
            store,
            committer,
        }
    }

    fn accept(keypair: &KeyPair) -> PeerBehavior {
        PeerBehavior::Accept(keypair.clone())
    }

    fn reject(_: &KeyPair) -> PeerBehavior {
        PeerBehavior::Reject
    }

    fn hang(_: &KeyPair) -> PeerBehavior {
        PeerBehavior::Hang
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_with_one_silent_peer() {
        // four validators need three votes: local plus two of three peers
        let net = network(vec![accept, accept, hang]).await;
        let proposal = proposal(net.local.public, vec![signed_tx(1), signed_tx(2)]);

        let block = net.committer.commit_proposal(&proposal).await.unwrap();
        assert_eq!(block.height(), 1);
        assert_eq!(block.signatures().len(), 3);
        assert_eq!(block.transactions().len(), 2);
        assert_eq!(net.store.get_top_block().await.unwrap().hash(), block.hash());

        let mut delivered = net.transport.delivered("commit");
        delivered.sort();
        let mut expected = vec![net.peers[0].public, net.peers[1].public];
        expected.sort();
        assert_eq!(delivered, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_fails_without_quorum() {
        let net = network(vec![accept, reject, hang]).await;
        let proposal = proposal(net.local.public, vec![signed_tx(1)]);

        let result = net.committer.commit_proposal(&proposal).await;
        assert!(matches!(
            result,
            Err(ConsensusError::InsufficientVotes { have: 2, need: 3 })
        ));
        assert!(net.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_accept_commit_checks_votes() {
        let net = network(vec![accept, accept, accept]).await;
        let block = Block::new(1, Hash::ZERO, 1, vec![signed_tx(1)]).unwrap();

        let under_signed = block.clone().sign(&net.peers[0]);
        assert!(matches!(
            net.committer.accept_commit(under_signed).await,
            Err(ConsensusError::InsufficientVotes { have: 1, need: 3 })
        ));

        let signed = block
            .sign(&net.peers[0])
            .sign(&net.peers[1])
            .sign(&net.local);
        let outcome = net.committer.accept_commit(signed).await.unwrap();
        assert!(!outcome.overwrote());
        assert_eq!(net.store.height().await, 1);
    }
}
