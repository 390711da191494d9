use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Ordering error: {0}")]
    Ordering(#[from] tessera_ordering::OrderingError),

    #[error("MST error: {0}")]
    Mst(#[from] tessera_mst::MstError),

    #[error("Consensus error: {0}")]
    Consensus(#[from] tessera_consensus::ConsensusError),

    #[error("Storage error: {0}")]
    Storage(#[from] tessera_storage::StorageError),

    #[error("Core error: {0}")]
    Core(#[from] tessera_core::CoreError),
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = match &self {
            RpcError::NotFound(_) => StatusCode::NOT_FOUND,
            RpcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::Ordering(tessera_ordering::OrderingError::AlreadyQueued(_)) => {
                StatusCode::CONFLICT
            }
            RpcError::Ordering(_) | RpcError::Mst(_) => StatusCode::BAD_REQUEST,
            RpcError::Consensus(tessera_consensus::ConsensusError::Storage(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RpcError::Consensus(_) => StatusCode::BAD_REQUEST,
            RpcError::Internal(_) | RpcError::Storage(_) | RpcError::Core(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}
