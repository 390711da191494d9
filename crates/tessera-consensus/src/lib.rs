//! Tessera Consensus - round client, peer registry and block verification
//!
//! This crate provides the transport contract used to talk to other
//! validators, the fan-out client built on it, and both sides of the
//! verify/commit exchange.

pub mod client;
pub mod committer;
pub mod error;
pub mod net;
pub mod registry;
pub mod transport;
pub mod verifier;
pub mod votes;

#[cfg(test)]
mod testing;

pub use client::{BroadcastReport, RoundClient};
pub use committer::Committer;
pub use error::{ConsensusError, TransportError};
pub use net::{CommitRequest, CommitResponse, VerifyRequest, VerifyResponse};
pub use registry::{PeerRegistry, ProbeConfig};
pub use transport::{ConsensusTransport, HttpTransport};
pub use verifier::BlockVerifier;
pub use votes::{collect_votes, vote_threshold, VoteCollector};
