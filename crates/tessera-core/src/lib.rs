//! Tessera Core - shared types, cryptography, builders and diagnostics
//!
//! This crate provides the foundational types used by every Tessera
//! subsystem: digests and keys, blocks and transactions, the fluent
//! builders, and the injected diagnostic sink.

pub mod builder;
pub mod crypto;
pub mod diagnostics;
pub mod error;
pub mod serialize;
pub mod types;

pub use crypto::{hash_blake3, merkle_root, sign, verify, Hash, KeyPair, PublicKey, SecretKey, Sig};
pub use diagnostics::{Diagnostic, DiagnosticSink, NoopSink, RecordingSink, TracingSink};
pub use error::CoreError;
pub use types::*;

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
