use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tessera_consensus::{
    CommitRequest, CommitResponse, Committer, ConsensusTransport, PeerRegistry, VerifyRequest,
    VerifyResponse,
};
use tessera_core::{Block, Hash, PublicKey, Transaction};
use tessera_mst::{MergeOutcome, MstAggregator, MstState, PendingView};
use tessera_ordering::{Batch, OrderingGateway, Proposal};
use tessera_storage::BlockStore;
use tracing::{debug, info};

use crate::error::RpcError;
use crate::ws::events::{EventBroadcaster, NodeEvent};

/// Application state shared with handlers
pub struct AppState<T> {
    pub public_key: PublicKey,
    pub store: Arc<BlockStore>,
    pub mst: Arc<MstAggregator>,
    pub gateway: Arc<OrderingGateway>,
    pub committer: Arc<Committer<T>>,
    pub registry: Arc<PeerRegistry<T>>,
    pub broadcaster: Arc<EventBroadcaster>,
}

// Response types

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub public_key: String,
    pub height: u64,
    pub top_hash: Option<String>,
    pub pending_mst: usize,
    pub queue_len: usize,
    pub peers: usize,
    pub round: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    /// Fully signed and waiting in the ordering queue
    Queued,
    /// Collecting signatures in the MST aggregator
    PendingSignatures,
    /// Completed by this submission and handed to ordering
    Completed,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub fingerprint: String,
    pub status: SubmitStatus,
    pub rejected: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MstMergeResponse {
    pub changed: usize,
    pub completed: usize,
    pub rejected: usize,
    pub ignored: usize,
}

/// GET /health - Liveness probe
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /status - Node status
pub async fn get_status<T: ConsensusTransport>(
    State(state): State<Arc<AppState<T>>>,
) -> Result<Json<StatusResponse>, RpcError> {
    let height = state.store.height().await;
    let top_hash = if height > 0 {
        state
            .store
            .get_block_by_height(height)
            .await
            .map(|block| block.hash().to_hex())
    } else {
        None
    };

    Ok(Json(StatusResponse {
        public_key: state.public_key.to_hex(),
        height,
        top_hash,
        pending_mst: state.mst.pending_count().await,
        queue_len: state.gateway.queue_len().await,
        peers: state.registry.len().await,
        round: state.gateway.schedule().current_round(),
    }))
}

/// POST /tx - Submit a transaction
///
/// A transaction that already carries its quorum goes straight to ordering;
/// anything else is handed to the MST aggregator.
pub async fn submit_tx<T: ConsensusTransport>(
    State(state): State<Arc<AppState<T>>>,
    Json(tx): Json<Transaction>,
) -> Result<Json<SubmitResponse>, RpcError> {
    let fingerprint = tx.fingerprint()?;

    if tx.quorum() > 0 && tx.is_fully_signed()? {
        state.gateway.enqueue(tx).await?;
        info!("Queued fully signed transaction {}", fingerprint);
        return Ok(Json(SubmitResponse {
            fingerprint: fingerprint.to_hex(),
            status: SubmitStatus::Queued,
            rejected: Vec::new(),
        }));
    }

    let report = state.mst.submit(tx).await?;
    let rejected: Vec<String> = report
        .rejected
        .iter()
        .map(|rejection| rejection.error.to_string())
        .collect();

    let status = match report.outcomes.first() {
        Some((_, MergeOutcome::Completed(_))) => SubmitStatus::Completed,
        Some((_, MergeOutcome::AlreadyCompleted)) => SubmitStatus::Completed,
        Some(_) => SubmitStatus::PendingSignatures,
        None if rejected.is_empty() => {
            return Err(RpcError::BadRequest(
                "Transaction carries no signatures".to_string(),
            ))
        }
        None => return Err(RpcError::BadRequest(rejected.join("; "))),
    };

    Ok(Json(SubmitResponse {
        fingerprint: fingerprint.to_hex(),
        status,
        rejected,
    }))
}

/// GET /block/top - Block with the greatest height
pub async fn get_top_block<T: ConsensusTransport>(
    State(state): State<Arc<AppState<T>>>,
) -> Result<Json<Block>, RpcError> {
    state
        .store
        .get_top_block()
        .await
        .map(|block| Json((*block).clone()))
        .ok_or_else(|| RpcError::NotFound("Block store is empty".to_string()))
}

/// GET /block/:height - Block by height
pub async fn get_block<T: ConsensusTransport>(
    State(state): State<Arc<AppState<T>>>,
    Path(height): Path<u64>,
) -> Result<Json<Block>, RpcError> {
    state
        .store
        .get_block_by_height(height)
        .await
        .map(|block| Json((*block).clone()))
        .ok_or_else(|| RpcError::NotFound(format!("Block at height {} not found", height)))
}

/// GET /block/hash/:hash - Block by hash
pub async fn get_block_by_hash<T: ConsensusTransport>(
    State(state): State<Arc<AppState<T>>>,
    Path(hash_hex): Path<String>,
) -> Result<Json<Block>, RpcError> {
    let hash = Hash::from_hex(&hash_hex)
        .map_err(|_| RpcError::BadRequest("Invalid block hash".to_string()))?;

    state
        .store
        .get_block_by_hash(&hash)
        .await
        .map(|block| Json((*block).clone()))
        .ok_or_else(|| RpcError::NotFound(format!("Block {} not found", hash_hex)))
}

/// GET /mst/:fingerprint - Pending multi-signature entry
pub async fn get_pending_mst<T: ConsensusTransport>(
    State(state): State<Arc<AppState<T>>>,
    Path(fingerprint_hex): Path<String>,
) -> Result<Json<PendingView>, RpcError> {
    let fingerprint = Hash::from_hex(&fingerprint_hex)
        .map_err(|_| RpcError::BadRequest("Invalid fingerprint".to_string()))?;

    state
        .mst
        .pending(&fingerprint)
        .await
        .map(Json)
        .ok_or_else(|| {
            RpcError::NotFound(format!("No pending transaction {}", fingerprint_hex))
        })
}

/// POST /mst/state - Merge a peer's partial-signature view
pub async fn merge_mst_state<T: ConsensusTransport>(
    State(state): State<Arc<AppState<T>>>,
    Json(remote): Json<MstState>,
) -> Result<Json<MstMergeResponse>, RpcError> {
    let report = state.mst.merge_remote_state(remote).await;
    debug!(
        "Merged remote MST state: {} changed, {} rejected",
        report.changed(),
        report.rejected.len()
    );

    Ok(Json(MstMergeResponse {
        changed: report.changed(),
        completed: report.completed().count(),
        rejected: report.rejected.len(),
        ignored: report.ignored.len(),
    }))
}

/// POST /consensus/verify - Judge a candidate block
pub async fn consensus_verify<T: ConsensusTransport>(
    State(state): State<Arc<AppState<T>>>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, RpcError> {
    Ok(Json(state.committer.verifier().verify(&request.block).await))
}

/// POST /consensus/commit - Store a block committed by the proposer
pub async fn consensus_commit<T: ConsensusTransport>(
    State(state): State<Arc<AppState<T>>>,
    Json(request): Json<CommitRequest>,
) -> Result<Json<CommitResponse>, RpcError> {
    let block = request.block;
    let height = block.height();
    let hash = block.hash();

    state.committer.accept_commit(block.clone()).await?;
    state.gateway.schedule().advance_round(height + 1);
    state
        .broadcaster
        .broadcast(NodeEvent::block_committed(&block));
    info!("Accepted commit of block {} at height {}", hash, height);

    Ok(Json(CommitResponse {
        status: "committed".to_string(),
        height,
        hash: hash.to_hex(),
    }))
}

/// POST /ordering/batch - A peer's batch, published to observers
pub async fn receive_batch<T: ConsensusTransport>(
    State(state): State<Arc<AppState<T>>>,
    Json(batch): Json<Batch>,
) -> Json<Value> {
    state.broadcaster.broadcast(NodeEvent::batch_received(&batch));
    Json(json!({ "status": "received", "sequence": batch.sequence }))
}

/// POST /ordering/proposal - A peer's proposal, published to observers
pub async fn receive_proposal<T: ConsensusTransport>(
    State(state): State<Arc<AppState<T>>>,
    Json(proposal): Json<Proposal>,
) -> Json<Value> {
    state
        .broadcaster
        .broadcast(NodeEvent::proposal_received(&proposal));
    Json(json!({ "status": "received", "round": proposal.round }))
}
