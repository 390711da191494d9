use tessera_core::{CoreError, PublicKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MstError {
    #[error("Invalid signature from {0}")]
    InvalidSignature(PublicKey),

    #[error("{signer} is not a signatory of {account}")]
    UnauthorizedSigner { signer: PublicKey, account: String },

    #[error("Transaction quorum must be at least 1")]
    InvalidQuorum,

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}
