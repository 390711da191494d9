//! Tessera Node - configuration and wiring of a validator node
//!
//! This crate assembles storage, MST aggregation, ordering, consensus and
//! RPC into a running node.

pub mod config;
pub mod node;

pub use config::{generate_sample_config, NodeConfig, PeerConfig};
pub use node::Node;
