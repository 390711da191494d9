//! Injected diagnostic reporting.
//!
//! Components never log through global state directly; they hold an
//! `Arc<dyn DiagnosticSink>` and report typed [`Diagnostic`]s. The node wires
//! in [`TracingSink`]; tests use [`NoopSink`] or [`RecordingSink`].

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::crypto::{Hash, PublicKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// Which block index a diagnostic refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKey {
    Height(u64),
    Hash(Hash),
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKey::Height(height) => write!(f, "height {height}"),
            BlockKey::Hash(hash) => write!(f, "hash {hash}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    BlockStored { height: u64, hash: Hash },
    BlockOverwritten { key: BlockKey },
    BlockNotFound { key: BlockKey },
    StoreEmpty,
    SignatureMerged { fingerprint: Hash, signer: PublicKey, count: usize, quorum: u32 },
    SignatureRejected { fingerprint: Hash, signer: PublicKey, reason: String },
    MstCompleted { fingerprint: Hash },
    MstExpired { fingerprint: Hash, signatures: usize },
    RemoteViewIgnored { fingerprint: Hash, reason: String },
    TransactionDropped { fingerprint: Hash, reason: String },
    QueueBacklog { len: usize, threshold: usize },
    BatchProduced { sequence: u64, size: usize },
    ProposalProduced { round: u64, size: usize },
    PeerUnreachable { peer: String, reason: String },
    PeerRegistered { peer: String },
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::SignatureMerged { .. }
            | Diagnostic::BatchProduced { .. }
            | Diagnostic::ProposalProduced { .. } => Severity::Debug,
            Diagnostic::BlockStored { .. }
            | Diagnostic::BlockNotFound { .. }
            | Diagnostic::StoreEmpty
            | Diagnostic::MstCompleted { .. }
            | Diagnostic::MstExpired { .. }
            | Diagnostic::PeerRegistered { .. } => Severity::Info,
            Diagnostic::BlockOverwritten { .. }
            | Diagnostic::SignatureRejected { .. }
            | Diagnostic::RemoteViewIgnored { .. }
            | Diagnostic::TransactionDropped { .. }
            | Diagnostic::QueueBacklog { .. }
            | Diagnostic::PeerUnreachable { .. } => Severity::Warn,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::BlockStored { height, hash } => {
                write!(f, "Stored block {} at height {}", hash.short(), height)
            }
            Diagnostic::BlockOverwritten { key } => write!(f, "Overwriting block with {key}."),
            Diagnostic::BlockNotFound { key } => {
                write!(f, "Requested block with {key} not found in block storage.")
            }
            Diagnostic::StoreEmpty => {
                write!(f, "Requested top block, but the block storage is empty.")
            }
            Diagnostic::SignatureMerged {
                fingerprint,
                signer,
                count,
                quorum,
            } => write!(
                f,
                "Merged signature from {} into {}, total: {}/{}",
                &signer.to_hex()[..8],
                fingerprint.short(),
                count,
                quorum
            ),
            Diagnostic::SignatureRejected {
                fingerprint,
                signer,
                reason,
            } => write!(
                f,
                "Rejected signature from {} for {}: {}",
                &signer.to_hex()[..8],
                fingerprint.short(),
                reason
            ),
            Diagnostic::MstCompleted { fingerprint } => {
                write!(f, "Transaction {} reached quorum", fingerprint.short())
            }
            Diagnostic::MstExpired {
                fingerprint,
                signatures,
            } => write!(
                f,
                "Expired pending transaction {} with {} signatures",
                fingerprint.short(),
                signatures
            ),
            Diagnostic::RemoteViewIgnored {
                fingerprint,
                reason,
            } => write!(
                f,
                "Ignored remote view of {}: {}",
                fingerprint.short(),
                reason
            ),
            Diagnostic::TransactionDropped {
                fingerprint,
                reason,
            } => write!(
                f,
                "Dropped transaction {} before batching: {}",
                fingerprint.short(),
                reason
            ),
            Diagnostic::QueueBacklog { len, threshold } => write!(
                f,
                "Ordering queue holds {len} transactions (threshold {threshold})"
            ),
            Diagnostic::BatchProduced { sequence, size } => {
                write!(f, "Produced batch #{sequence} with {size} transactions")
            }
            Diagnostic::ProposalProduced { round, size } => {
                write!(f, "Produced proposal for round {round} with {size} transactions")
            }
            Diagnostic::PeerUnreachable { peer, reason } => {
                write!(f, "Peer {peer} unreachable: {reason}")
            }
            Diagnostic::PeerRegistered { peer } => write!(f, "Registered peer {peer}"),
        }
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, component: &'static str, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing` at their own severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, component: &'static str, diagnostic: Diagnostic) {
        match diagnostic.severity() {
            Severity::Debug => debug!(component, "{}", diagnostic),
            Severity::Info => info!(component, "{}", diagnostic),
            Severity::Warn => warn!(component, "{}", diagnostic),
            Severity::Error => error!(component, "{}", diagnostic),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn report(&self, _component: &'static str, _diagnostic: Diagnostic) {}
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(&'static str, Diagnostic)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<(&'static str, Diagnostic)> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, predicate: impl Fn(&Diagnostic) -> bool) -> usize {
        self.records()
            .iter()
            .filter(|(_, diagnostic)| predicate(diagnostic))
            .count()
    }

    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.records()
            .into_iter()
            .filter(|(_, diagnostic)| diagnostic.severity() >= Severity::Warn)
            .map(|(_, diagnostic)| diagnostic)
            .collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, component: &'static str, diagnostic: Diagnostic) {
        if let Ok(mut records) = self.records.lock() {
            records.push((component, diagnostic));
        }
    }
}

/// Default sink for components constructed without one
pub fn tracing_sink() -> Arc<dyn DiagnosticSink> {
    Arc::new(TracingSink)
}
