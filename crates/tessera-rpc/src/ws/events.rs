use serde::Serialize;
use tessera_core::Block;
use tessera_mst::{EntryStatus, MstStateUpdate};
use tessera_ordering::{Batch, Proposal};
use tokio::sync::broadcast;
use tracing::debug;

/// Events pushed to WebSocket observers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum NodeEvent {
    BlockCommitted {
        height: u64,
        hash: String,
        tx_count: usize,
        timestamp: u64,
    },
    MstStateChanged {
        fingerprint: String,
        signers: Vec<String>,
        quorum: u32,
        status: EntryStatus,
    },
    BatchProduced {
        sequence: u64,
        size: usize,
    },
    ProposalProduced {
        round: u64,
        size: usize,
    },
    BatchReceived {
        sequence: u64,
        size: usize,
    },
    ProposalReceived {
        round: u64,
        proposer: String,
        size: usize,
    },
}

impl NodeEvent {
    /// Variant name, as it appears in the `type` field on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            NodeEvent::BlockCommitted { .. } => "BlockCommitted",
            NodeEvent::MstStateChanged { .. } => "MstStateChanged",
            NodeEvent::BatchProduced { .. } => "BatchProduced",
            NodeEvent::ProposalProduced { .. } => "ProposalProduced",
            NodeEvent::BatchReceived { .. } => "BatchReceived",
            NodeEvent::ProposalReceived { .. } => "ProposalReceived",
        }
    }

    pub fn block_committed(block: &Block) -> Self {
        NodeEvent::BlockCommitted {
            height: block.height(),
            hash: block.hash().to_hex(),
            tx_count: block.transactions().len(),
            timestamp: block.created_time(),
        }
    }

    pub fn mst_state_changed(update: &MstStateUpdate) -> Self {
        NodeEvent::MstStateChanged {
            fingerprint: update.fingerprint.to_hex(),
            signers: update.signers().iter().map(|key| key.to_hex()).collect(),
            quorum: update.transaction.quorum(),
            status: update.status,
        }
    }

    pub fn batch_produced(batch: &Batch) -> Self {
        NodeEvent::BatchProduced {
            sequence: batch.sequence,
            size: batch.len(),
        }
    }

    pub fn proposal_produced(proposal: &Proposal) -> Self {
        NodeEvent::ProposalProduced {
            round: proposal.round,
            size: proposal.batch.len(),
        }
    }

    pub fn batch_received(batch: &Batch) -> Self {
        NodeEvent::BatchReceived {
            sequence: batch.sequence,
            size: batch.len(),
        }
    }

    pub fn proposal_received(proposal: &Proposal) -> Self {
        NodeEvent::ProposalReceived {
            round: proposal.round,
            proposer: proposal.proposer.to_hex(),
            size: proposal.batch.len(),
        }
    }
}

/// Event broadcaster for WebSocket clients
pub struct EventBroadcaster {
    sender: broadcast::Sender<NodeEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventBroadcaster { sender }
    }

    /// Broadcast an event to all connected clients
    pub fn broadcast(&self, event: NodeEvent) {
        match self.sender.send(event) {
            Ok(count) => {
                debug!("Broadcast event to {} subscribers", count);
            }
            Err(_) => {
                // No receivers, that's okay
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(1000)
    }
}
