//! Tessera MST - multi-signature transaction aggregation
//!
//! Collects signatures for transactions whose quorum exceeds one, merges
//! partial views gossiped by peers, and hands completed transactions to
//! ordering.

pub mod aggregator;
pub mod error;
pub mod state;
pub mod validator;

pub use aggregator::{MstAggregator, MstConfig};
pub use error::MstError;
pub use state::{
    EntryStatus, MergeOutcome, MergeReport, MstState, MstStateEntry, MstStateUpdate, PendingView,
    RejectedSignature,
};
pub use validator::{Ed25519Validator, SignatureValidator};
