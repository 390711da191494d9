//! Tessera RPC - HTTP and WebSocket API
//!
//! This crate carries every inbound network event of a node: client
//! submissions, peer gossip, verify and commit requests, and the event
//! stream for observers.

pub mod error;
pub mod http;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tessera_consensus::ConsensusTransport;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use http::create_router;
use ws::create_ws_router;

pub use error::RpcError;
pub use http::handlers::{
    AppState, MstMergeResponse, StatusResponse, SubmitResponse, SubmitStatus,
};
pub use ws::{EventBroadcaster, NodeEvent};

/// RPC server configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// HTTP bind address
    pub http_addr: SocketAddr,
    /// Enable WebSocket
    pub enable_ws: bool,
}

impl Default for RpcConfig {
    fn default() -> Self {
        RpcConfig {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            enable_ws: true,
        }
    }
}

/// RPC server
pub struct RpcServer<T> {
    config: RpcConfig,
    app_state: Arc<AppState<T>>,
}

impl<T: ConsensusTransport + 'static> RpcServer<T> {
    pub fn new(config: RpcConfig, app_state: Arc<AppState<T>>) -> Self {
        RpcServer { config, app_state }
    }

    pub fn broadcaster(&self) -> Arc<EventBroadcaster> {
        Arc::clone(&self.app_state.broadcaster)
    }

    /// Create the combined router
    pub fn router(&self) -> Router {
        let http_router = create_router(Arc::clone(&self.app_state));

        if self.config.enable_ws {
            let ws_router = create_ws_router(Arc::clone(&self.app_state.broadcaster));
            http_router.merge(ws_router)
        } else {
            http_router
        }
    }

    /// Serve on an already bound listener until `cancel` fires.
    pub async fn serve(
        self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), std::io::Error> {
        let router = self.router();
        info!("RPC server listening on {}", listener.local_addr()?);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
    }

    /// Bind the configured address and serve until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.config.http_addr).await?;
        self.serve(listener, cancel).await
    }
}
