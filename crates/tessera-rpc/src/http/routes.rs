use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tessera_consensus::ConsensusTransport;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    consensus_commit, consensus_verify, get_block, get_block_by_hash, get_pending_mst,
    get_status, get_top_block, health, merge_mst_state, receive_batch, receive_proposal,
    submit_tx, AppState,
};

/// Create the HTTP router
pub fn create_router<T: ConsensusTransport + 'static>(state: Arc<AppState<T>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/status", get(get_status::<T>))
        .route("/tx", post(submit_tx::<T>))
        .route("/block/top", get(get_top_block::<T>))
        .route("/block/{height}", get(get_block::<T>))
        .route("/block/hash/{hash}", get(get_block_by_hash::<T>))
        .route("/mst/state", post(merge_mst_state::<T>))
        .route("/mst/{fingerprint}", get(get_pending_mst::<T>))
        .route("/consensus/verify", post(consensus_verify::<T>))
        .route("/consensus/commit", post(consensus_commit::<T>))
        .route("/ordering/batch", post(receive_batch::<T>))
        .route("/ordering/proposal", post(receive_proposal::<T>))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
